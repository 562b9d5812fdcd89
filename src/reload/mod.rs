//! Configuration reload without dropping service.
//!
//! The whole server state derived from a configuration is bundled into a
//! [`Generation`]. The [`ReloadCoordinator`] keeps the live generation in
//! an [`ArcSwap`][arc_swap::ArcSwap] and replaces it only after a
//! candidate built from the new configuration passed every check. Sockets
//! for addresses present in both configurations are handed over to the
//! new generation instead of being rebound.

mod coordinator;
mod generation;
mod listeners;

use core::fmt;
use std::io;

use crate::chain::SetupError;
use crate::config::{ConfigError, ListenAddr};

pub use self::coordinator::{ReloadCoordinator, ReloadState};
pub use self::generation::Generation;
pub use self::listeners::{BoundSocket, ListenerSet};

//============ Error Types ===================================================

//------------ ValidationError -----------------------------------------------

/// A candidate configuration was rejected.
#[derive(Debug)]
pub enum ValidationError {
    Config(ConfigError),
    Setup(SetupError),

    /// A listener could not be set up.
    Bind(ListenAddr, io::Error),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ValidationError::Config(err) => err.fmt(f),
            ValidationError::Setup(err) => err.fmt(f),
            ValidationError::Bind(addr, err) => {
                write!(f, "cannot listen on {addr}: {err}")
            }
        }
    }
}

impl std::error::Error for ValidationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ValidationError::Config(err) => Some(err),
            ValidationError::Setup(err) => Some(err),
            ValidationError::Bind(_, err) => Some(err),
        }
    }
}

//------------ ReloadError ---------------------------------------------------

/// A generation could not be built.
#[derive(Debug)]
pub enum ReloadError {
    ValidationFailed(ValidationError),
}

impl From<ConfigError> for ReloadError {
    fn from(err: ConfigError) -> Self {
        ReloadError::ValidationFailed(ValidationError::Config(err))
    }
}

impl From<SetupError> for ReloadError {
    fn from(err: SetupError) -> Self {
        ReloadError::ValidationFailed(ValidationError::Setup(err))
    }
}

impl From<ValidationError> for ReloadError {
    fn from(err: ValidationError) -> Self {
        ReloadError::ValidationFailed(err)
    }
}

impl fmt::Display for ReloadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ReloadError::ValidationFailed(err) => {
                write!(f, "validation failed: {err}")
            }
        }
    }
}

impl std::error::Error for ReloadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReloadError::ValidationFailed(err) => Some(err),
        }
    }
}
