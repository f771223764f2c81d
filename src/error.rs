use thiserror::Error;

use crate::bus::EventError;
use crate::plugin::PluginError;

#[derive(Error, Debug)]
pub enum Error {
    // event bus
    #[error("Event error: {0}")]
    Event(#[from] EventError),
    // plugin resolution and execution
    #[error("Plugin error: {0}")]
    Plugin(#[from] PluginError),
    #[error("Config error: {message}")]
    Config { message: String },
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type EngineResult<T> = Result<T, Error>;

impl Error {
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Error::Internal(message.into())
    }

    pub fn config<S: Into<String>>(message: S) -> Self {
        Error::Config {
            message: message.into(),
        }
    }
}
