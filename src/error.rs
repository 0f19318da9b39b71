//! Error types for gempack

use std::path::PathBuf;
use thiserror::Error;

/// Result type for pack operations
pub type PackResult<T> = Result<T, PackError>;

/// Errors that can occur during packing
#[derive(Error, Debug)]
pub enum PackError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Unresolved placeholder token in a template
    #[error("Unresolved placeholder {token} in template '{template}'")]
    Template {
        /// The offending token, including the `@@` delimiters
        token: String,
        /// Name of the template being rendered
        template: String,
    },

    /// An external tool exited with a nonzero status
    #[error("{tool} failed with exit code {code}")]
    ExternalTool {
        /// Tool name (venv, pip, cmake, ldd)
        tool: String,
        /// Exit code, or -1 if the tool could not be spawned
        code: i32,
    },

    /// Expected build artifact was not produced
    #[error("Cannot find built executable: {0}")]
    MissingArtifact(PathBuf),

    /// Shared-library dependency resolution failed
    #[error("Library resolution failed: {0}")]
    LibraryResolution(String),
}
