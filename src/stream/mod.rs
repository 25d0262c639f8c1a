//! Ingress and egress adapters around the signal processor.
//!
//! Ingress hands out position events with a (partition, offset) identity and
//! expects a commit once processing finishes; anything left uncommitted is
//! redelivered by the source on its next start. Egress accepts schedule
//! events keyed by vehicle id.

mod egress;
mod ingress;

pub use egress::{CsvEgress, JsonLinesEgress, MemoryEgress};
pub use ingress::{JsonLinesIngress, partition_for};

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{PositionEvent, ScheduleEvent};

/// One position event as delivered by the ingress stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub partition: u32,
    pub offset: u64,
    /// Message key, the vehicle id.
    pub key: String,
    pub event: PositionEvent,
}

#[async_trait]
pub trait Ingress: Send {
    /// Next delivery, or `None` once the stream is exhausted.
    ///
    /// An unreadable record is an [`Error::Decode`](crate::Error::Decode) and
    /// the stream goes on. A broken stream is an [`Error::Io`](crate::Error::Io)
    /// and is followed by `None`. Must be cancel safe: the consumer polls it
    /// alongside its acknowledgment channel.
    async fn recv(&mut self) -> Option<Result<Delivery>>;

    /// Acknowledges the delivery at `(partition, offset)`.
    async fn commit(&mut self, partition: u32, offset: u64) -> Result<()>;

    /// Deliveries handed out but never committed.
    fn uncommitted(&self) -> Vec<(u32, u64)>;
}

#[async_trait]
pub trait Egress: Send + Sync {
    /// Publishes `event` under `key`. Failures are reported, never retried here.
    async fn publish(&self, key: &str, event: &ScheduleEvent) -> Result<()>;
}
