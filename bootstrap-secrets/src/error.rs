use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Everything that can abort a provisioning run.
///
/// None of these are recoverable within a run. The only remedy is to fix the
/// cause and run again from a clean sink.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("secure random source failed: {0}")]
    EntropySourceFailure(#[from] rand_core::Error),

    #[error("cannot write secrets header '{}': {}", .path.display(), .source)]
    SinkUnwritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid component count '{0}': expected a positive integer")]
    InvalidComponentCount(String),

    #[error("RSA modulus of {bits} bits is below the {minimum}-bit minimum")]
    WeakModulusRequested { bits: usize, minimum: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid macro name '{0}'")]
    InvalidMacroName(String),

    #[error("macro '{0}' emitted twice")]
    DuplicateMacro(String),

    #[error("RSA key generation failed: {0}")]
    KeyGeneration(#[from] rsa::Error),

    #[error("RSA key encoding failed: {0}")]
    KeyEncoding(String),
}

pub type Result<T> = std::result::Result<T, ProvisionError>;
