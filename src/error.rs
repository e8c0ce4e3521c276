//! Error taxonomy shared by every public entry point of the engine core.
//!
//! Nothing here is fatal: each error is reported with `log::warn!` at the call
//! boundary and returned to the caller, leaving engine state untouched.
//! Idempotent operations (cancelling an unknown async id, detaching an
//! unattached behavior, removing an unknown listener) do not error at all and
//! return `bool` instead.

use bevy_ecs::entity::Entity;
use thiserror::Error;

/// Errors surfaced by [`Engine`](crate::engine::Engine) operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed call: empty event name, wrong entity kind, bad argument.
    #[error("usage error: {0}")]
    Usage(String),

    /// A category-specialized behavior declined to attach to an owner.
    #[error("behavior '{behavior}' refused owner {owner}: {reason}")]
    StructuralRefusal {
        behavior: &'static str,
        owner: Entity,
        reason: String,
    },

    /// A referenced script object or asset key does not exist.
    #[error("missing resource: {0}")]
    MissingResource(String),

    /// The entity handle no longer refers to a live entity.
    #[error("entity {0} does not exist")]
    StaleEntity(Entity),

    #[cfg(feature = "lua")]
    #[error("script error: {0}")]
    Script(#[from] mlua::Error),
}

impl EngineError {
    pub fn usage(message: impl Into<String>) -> Self {
        EngineError::Usage(message.into())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
