//! Error type shared by the simulation core.

use thiserror::Error;

use crate::physics::BodyHandle;

/// Failures the core can report to its caller.
///
/// Per-entity problems inside a tick are logged and skipped instead of being
/// returned; these variants cover construction and explicit API misuse.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("body {0:?} is not alive in the physics world")]
    StaleBody(BodyHandle),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("grid of {width}x{height} tiles is too small")]
    GridTooSmall { width: usize, height: usize },
}

pub type SimResult<T> = Result<T, SimError>;
