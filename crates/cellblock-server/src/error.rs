//! Error types for the server binary.
//!
//! [`ServerError`] wraps every failure mode during startup and shutdown so
//! `main` can propagate with `?`.

/// Top-level error for the server binary.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: cellblock_core::ConfigError,
    },

    /// Connecting to or talking with the entity store failed.
    #[error("store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: cellblock_store::StoreError,
    },

    /// An engine operation failed during startup.
    #[error("engine error: {source}")]
    Engine {
        /// The underlying engine error.
        #[from]
        source: cellblock_core::EngineError,
    },

    /// The seed entity file could not be read or parsed.
    #[error("seed error: {message}")]
    Seed {
        /// Description of the seeding failure.
        message: String,
    },

    /// Logging could not be initialized.
    #[error("logging error: {message}")]
    Logging {
        /// Description of the logging failure.
        message: String,
    },

    /// Waiting for the shutdown signal failed.
    #[error("signal error: {source}")]
    Signal {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}
