//! Configuration and control surface error types

mod environment;
mod error;

pub use environment::{Config, ConfigError, Environment, Secret};
pub use error::AppError;
