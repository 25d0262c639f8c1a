//! Error types shared by the processor, the stop catalog and the stream adapters.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A stop id whose numeric suffix cannot be read as an ordinal.
    #[error("invalid stop id '{0}': expected a prefix character followed by digits")]
    InvalidStopId(String),

    /// An input record that could not be decoded into a position event.
    #[error("failed to decode position event at offset {offset}: {message}")]
    Decode { offset: u64, message: String },

    /// The input stream itself failed; nothing more can be read from it.
    #[error("input stream failed at offset {offset}: {source}")]
    Io {
        offset: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to publish schedule event: {0}")]
    Publish(String),

    #[error("failed to load stop catalog: {0}")]
    Catalog(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Short machine-readable code, used as a structured log field.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidStopId(_) => "invalid_stop_id",
            Error::Decode { .. } => "decode",
            Error::Io { .. } => "io",
            Error::Publish(_) => "publish",
            Error::Catalog(_) => "catalog",
            Error::Config(_) => "config",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
