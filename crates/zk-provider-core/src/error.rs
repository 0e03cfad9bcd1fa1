//! Unified error types for the zk-provider facade.

use thiserror::Error;

/// Coarse classification of a [`ProviderError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Syntax, type or import-resolution failure during compilation.
    Compile,
    /// Argument mismatch or unsatisfied constraint during witness computation.
    Witness,
    /// Trusted or universal setup failed.
    Setup,
    /// Proof generation failed.
    Proof,
    /// The verifier rejected its inputs (not a failed verification, which is `Ok(false)`).
    Verify,
    /// Verifier contract export failed.
    Export,
    /// Proof formatting failed.
    Format,
    /// A handle was used after release or was otherwise invalid.
    Resource,
    /// A caller-supplied callback raised.
    Callback,
    /// Call arguments could not be encoded.
    Encoding,
    /// The engine is missing, misconfigured, or the host failed (I/O, task join).
    Environment,
}

/// All errors that can occur while driving the proof toolchain.
#[derive(Error, Debug)]
pub enum ProviderError {
    // --- Engine failures ---

    /// The engine failed to compile the program, including unresolved imports.
    #[error("compilation failed: {0}")]
    Compile(String),

    /// The engine failed to compute a witness for the given arguments.
    #[error("witness computation failed: {0}")]
    Witness(String),

    /// The engine failed to run a (universal) setup.
    #[error("setup failed: {0}")]
    Setup(String),

    /// The engine failed to generate a proof.
    #[error("proof generation failed: {0}")]
    Proof(String),

    /// The engine could not run verification (key/proof shape or scheme mismatch).
    #[error("verification failed to run: {0}")]
    Verify(String),

    /// The engine failed to export a verifier contract.
    #[error("verifier export failed: {0}")]
    Export(String),

    /// The engine failed to format a proof.
    #[error("proof formatting failed: {0}")]
    Format(String),

    // --- Handles ---

    /// An engine handle was accessed after release or was invalid.
    #[error("invalid handle in {operation}: {detail}")]
    Resource {
        operation: &'static str,
        detail: String,
    },

    /// Extracting a field from an engine handle failed.
    #[error("{operation}: failed to extract `{field}`")]
    Extraction {
        operation: &'static str,
        field: &'static str,
        #[source]
        source: Box<ProviderError>,
    },

    // --- Callbacks and arguments ---

    /// A caller-supplied callback raised and aborted the call.
    #[error("{operation}: {callback} callback failed")]
    Callback {
        operation: &'static str,
        callback: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// Witness arguments could not be serialized.
    #[error("failed to encode arguments")]
    ArgumentEncoding(#[source] serde_json::Error),

    // --- Environment ---

    /// A required external tool (e.g. `zokrates`) is not installed.
    #[error("required tool '{name}' not found — install: {install}")]
    MissingTool { name: String, install: String },

    /// A blocking engine task panicked or was cancelled.
    #[error("engine task did not complete")]
    TaskJoin(#[from] tokio::task::JoinError),

    /// A filesystem I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A catch-all for errors from dependencies.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ProviderError {
    /// Classify this error. Extraction failures report the kind of their cause.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Compile(_) => ErrorKind::Compile,
            Self::Witness(_) => ErrorKind::Witness,
            Self::Setup(_) => ErrorKind::Setup,
            Self::Proof(_) => ErrorKind::Proof,
            Self::Verify(_) => ErrorKind::Verify,
            Self::Export(_) => ErrorKind::Export,
            Self::Format(_) => ErrorKind::Format,
            Self::Resource { .. } => ErrorKind::Resource,
            Self::Extraction { source, .. } => source.kind(),
            Self::Callback { .. } => ErrorKind::Callback,
            Self::ArgumentEncoding(_) => ErrorKind::Encoding,
            Self::MissingTool { .. } | Self::TaskJoin(_) | Self::Io(_) | Self::Other(_) => {
                ErrorKind::Environment
            }
        }
    }
}

/// Alias for `Result<T, ProviderError>`.
pub type Result<T> = std::result::Result<T, ProviderError>;
