//! Error taxonomy for recipe acquisition and the build bridge.
//!
//! Faults that block a user action (denied directory access, a missing
//! builder script, a failed sandbox bootstrap) surface through [`Error`].
//! Recoverable faults (cache misses, soft repository-shape warnings, stale
//! snapshots) are logged where they happen and never reach this type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The user declined the directory grant.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Directory grants are not available in this context.
    #[error("Directory access is not supported: {0}")]
    Unsupported(String),

    /// The directory grant requires a secure context.
    #[error("Insecure context: {0}")]
    InsecureContext(String),

    /// The granted directory is not a usable recipe repository.
    #[error("Invalid repository: {0}")]
    InvalidRepository(String),

    #[error("No local directory is open")]
    NoDirectoryOpen,

    /// A handle issued under an earlier directory grant was used.
    #[error("Handle for '{0}' belongs to a closed directory grant")]
    StaleHandle(String),

    /// Remote fetch failed and no cached copy could stand in.
    #[error("Remote fetch failed: {0}")]
    TransientFetchFailure(String),

    /// The sandbox could not be provisioned; it is unusable until restart.
    #[error("Sandbox provisioning failed: {0}")]
    SandboxProvisioningFailure(String),

    /// A single sandbox call failed; the sandbox stays usable.
    #[error("Sandbox call failed: {0}")]
    SandboxFailure(String),

    #[error("Serialization failed: {0}")]
    SerializationFailure(String),

    #[error("Recipe '{0}' not found")]
    RecipeNotFound(String),

    #[error("No recipe is being edited")]
    NoActiveRecipe,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether the fault should be shown to the user as an actionable message.
    pub fn is_user_actionable(&self) -> bool {
        matches!(
            self,
            Error::PermissionDenied(_)
                | Error::Unsupported(_)
                | Error::InsecureContext(_)
                | Error::InvalidRepository(_)
                | Error::SandboxProvisioningFailure(_)
                | Error::RecipeNotFound(_)
        )
    }
}
