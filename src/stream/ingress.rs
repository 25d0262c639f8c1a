use std::collections::BTreeSet;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, error};

use super::{Delivery, Ingress};
use crate::error::{Error, Result};
use crate::model::PositionEvent;

/// Reads one JSON position event per line. The line number is the offset and
/// the partition is derived from the vehicle id, so a vehicle always lands on
/// the same partition.
///
/// Lines are read as raw bytes: a line that is not UTF-8 or not a position
/// event is a [`Error::Decode`] at its offset and reading carries on. A
/// failure of the reader itself is an [`Error::Io`] and ends the stream.
pub struct JsonLinesIngress<R> {
    reader: R,
    buf: Vec<u8>,
    partitions: u32,
    next_offset: u64,
    exhausted: bool,
    in_flight: BTreeSet<(u32, u64)>,
}

impl<R: AsyncBufRead + Unpin + Send> JsonLinesIngress<R> {
    pub fn new(reader: R, partitions: u32) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            partitions: partitions.max(1),
            next_offset: 0,
            exhausted: false,
            in_flight: BTreeSet::new(),
        }
    }

    fn decode(&mut self, line: &[u8], offset: u64) -> Result<Delivery> {
        let line = std::str::from_utf8(line).map_err(|e| Error::Decode {
            offset,
            message: format!("line is not valid UTF-8: {e}"),
        })?;
        let event: PositionEvent = serde_json::from_str(line).map_err(|e| Error::Decode {
            offset,
            message: e.to_string(),
        })?;

        let partition = partition_for(&event.vehicle_id, self.partitions);
        self.in_flight.insert((partition, offset));
        debug!(partition, offset, "Record decoded");
        Ok(Delivery {
            partition,
            offset,
            key: event.vehicle_id.clone(),
            event,
        })
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> Ingress for JsonLinesIngress<R> {
    async fn recv(&mut self) -> Option<Result<Delivery>> {
        while !self.exhausted {
            // `buf` is only drained once a line is complete, so a cancelled
            // read resumes where it stopped
            match self.reader.read_until(b'\n', &mut self.buf).await {
                Ok(n) => {
                    if n == 0 {
                        self.exhausted = true;
                    }
                    let line = std::mem::take(&mut self.buf);
                    if line.iter().all(u8::is_ascii_whitespace) {
                        if n > 0 {
                            self.next_offset += 1;
                        }
                        continue;
                    }

                    let offset = self.next_offset;
                    self.next_offset += 1;
                    return Some(self.decode(&line, offset));
                }
                Err(source) => {
                    let offset = self.next_offset;
                    error!(error = %source, offset, "Input stream read failed");
                    self.exhausted = true;
                    return Some(Err(Error::Io { offset, source }));
                }
            }
        }
        None
    }

    async fn commit(&mut self, partition: u32, offset: u64) -> Result<()> {
        self.in_flight.remove(&(partition, offset));
        Ok(())
    }

    fn uncommitted(&self) -> Vec<(u32, u64)> {
        self.in_flight.iter().copied().collect()
    }
}

/// Stable partition for a message key (FNV-1a, independent of process or
/// toolchain version).
pub fn partition_for(key: &str, partitions: u32) -> u32 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0100_0000_01b3;

    let hash = key
        .bytes()
        .fold(OFFSET_BASIS, |h, b| (h ^ u64::from(b)).wrapping_mul(PRIME));
    (hash % u64::from(partitions.max(1))) as u32
}
