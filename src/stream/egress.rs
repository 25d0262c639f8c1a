use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use csv::WriterBuilder;
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use super::Egress;
use crate::error::{Error, Result};
use crate::model::ScheduleEvent;

#[derive(Serialize)]
struct Envelope<'a> {
    topic: &'a str,
    key: &'a str,
    value: &'a ScheduleEvent,
}

/// Writes one `{"topic", "key", "value"}` JSON envelope per line.
pub struct JsonLinesEgress {
    topic: String,
    writer: tokio::sync::Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
}

impl JsonLinesEgress {
    pub fn new(writer: Box<dyn AsyncWrite + Send + Unpin>, topic: &str) -> Self {
        Self {
            topic: topic.to_string(),
            writer: tokio::sync::Mutex::new(writer),
        }
    }

    pub fn stdout(topic: &str) -> Self {
        Self::new(Box::new(tokio::io::stdout()), topic)
    }

    /// Appends to `path`, creating it if needed.
    pub async fn file(path: impl AsRef<Path>, topic: &str) -> Result<Self> {
        let file = tokio::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(path.as_ref())
            .await
            .map_err(|e| Error::Publish(format!("cannot open {}: {e}", path.as_ref().display())))?;
        Ok(Self::new(Box::new(file), topic))
    }
}

#[async_trait]
impl Egress for JsonLinesEgress {
    async fn publish(&self, key: &str, event: &ScheduleEvent) -> Result<()> {
        let envelope = Envelope {
            topic: &self.topic,
            key,
            value: event,
        };
        let mut line =
            serde_json::to_vec(&envelope).map_err(|e| Error::Publish(e.to_string()))?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer
            .write_all(&line)
            .await
            .map_err(|e| Error::Publish(e.to_string()))?;
        writer
            .flush()
            .await
            .map_err(|e| Error::Publish(e.to_string()))
    }
}

/// Appends each event as a CSV row. The header is written only when the
/// file is created. Writes run on the blocking pool.
pub struct CsvEgress {
    file: Arc<CsvFile>,
}

struct CsvFile {
    path: PathBuf,
    lock: Mutex<()>,
}

impl CsvEgress {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: Arc::new(CsvFile {
                path: path.into(),
                lock: Mutex::new(()),
            }),
        }
    }
}

impl CsvFile {
    fn append_record(&self, event: &ScheduleEvent) -> anyhow::Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());

        let file_exists = self.path.exists();
        debug!(path = %self.path.display(), file_exists, "Appending CSV record");

        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)?;

        let mut writer = WriterBuilder::new()
            .has_headers(!file_exists)
            .from_writer(file);

        writer.serialize(event)?;
        writer.flush()?;

        Ok(())
    }
}

#[async_trait]
impl Egress for CsvEgress {
    async fn publish(&self, _key: &str, event: &ScheduleEvent) -> Result<()> {
        let file = Arc::clone(&self.file);
        let event = event.clone();
        tokio::task::spawn_blocking(move || file.append_record(&event))
            .await
            .map_err(|e| Error::Publish(format!("CSV writer task failed: {e}")))?
            .map_err(|e| Error::Publish(format!("{e:#}")))
    }
}

/// Keeps published events in memory, in publish order.
#[derive(Default)]
pub struct MemoryEgress {
    published: Mutex<Vec<(String, ScheduleEvent)>>,
    fail: bool,
}

impl MemoryEgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// An egress whose every publish fails.
    pub fn failing() -> Self {
        Self {
            published: Mutex::default(),
            fail: true,
        }
    }

    pub fn published(&self) -> Vec<(String, ScheduleEvent)> {
        self.published
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl Egress for MemoryEgress {
    async fn publish(&self, key: &str, event: &ScheduleEvent) -> Result<()> {
        if self.fail {
            return Err(Error::Publish("egress unavailable".to_string()));
        }
        self.published
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((key.to_string(), event.clone()));
        Ok(())
    }
}
