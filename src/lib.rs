pub mod api;
pub mod config;
pub mod consumer;
pub mod error;
pub mod fetch;
pub mod geo;
pub mod model;
pub mod processor;
pub mod stats;
pub mod stops;
pub mod stream;

pub use error::{Error, Result};
