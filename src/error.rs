//! Error type shared by key handling, certificate building and the CA store.

use std::path::PathBuf;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CaError>;

/// Represents errors that can occur while managing the root CA or issuing leaves.
///
/// Key generation, construction, encoding and filesystem failures are fatal to
/// [`RootCa::open`](crate::root_ca::RootCa::open) and are returned per call by
/// [`RootCa::issue`](crate::root_ca::RootCa::issue). Trust-store failures are
/// logged and never abort startup.
#[derive(Debug, Error)]
pub enum CaError {
    /// Error during key generation.
    #[error("Key generation error: {0}")]
    KeyGeneration(String),

    /// Error while building a certificate or certification request.
    #[error("Certificate construction error: {0}")]
    CertificateBuild(String),

    /// Error during data encoding.
    #[error("Failed to encode data: {0}")]
    EncodingError(String),

    /// Error during data decoding, including malformed or missing PEM blocks.
    #[error("Failed to decode data: {0}")]
    DecodingError(String),

    /// Filesystem failure on a specific path.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The platform trust store rejected an operation.
    #[error("Trust store error: {0}")]
    TrustStore(String),

    /// The operation is not available on this platform.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Error due to invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The issuance lock was poisoned by a panicking thread.
    #[error("Issuance lock poisoned")]
    LockPoisoned,
}

impl CaError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CaError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<der::Error> for CaError {
    /// Converts a `der::Error` into a `CaError`.
    fn from(err: der::Error) -> Self {
        CaError::DecodingError(err.to_string())
    }
}

impl From<rsa::Error> for CaError {
    fn from(err: rsa::Error) -> Self {
        CaError::KeyGeneration(err.to_string())
    }
}

impl From<rsa::pkcs1::Error> for CaError {
    fn from(err: rsa::pkcs1::Error) -> Self {
        CaError::DecodingError(err.to_string())
    }
}

impl From<pem::PemError> for CaError {
    fn from(err: pem::PemError) -> Self {
        CaError::DecodingError(err.to_string())
    }
}
