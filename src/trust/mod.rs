//! Operating-system trust store integration.
//!
//! Trust mutation is machine-global, so it lives behind [`TrustStore`] and is
//! handed to [`RootCa::open`](crate::root_ca::RootCa::open) explicitly. Tests and
//! embedders that manage trust themselves pass [`NoopTrustStore`].

use std::path::Path;

use crate::cert::Certificate;
use crate::error::Result;

mod common;
#[cfg(target_os = "macos")]
mod macos;
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
mod unsupported;
#[cfg(target_os = "windows")]
mod windows;

#[cfg(target_os = "macos")]
use macos::PlatformTrustBackend;
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
use unsupported::PlatformTrustBackend;
#[cfg(target_os = "windows")]
use windows::PlatformTrustBackend;

/// The root certificate being checked, imported or replaced.
#[derive(Debug, Clone, Copy)]
pub struct TrustAnchor<'a> {
    pub name: &'a str,
    /// PEM file holding the certificate, for tools that import from disk.
    pub cert_path: &'a Path,
    pub certificate: &'a Certificate,
}

/// A store of trusted root certificates.
pub trait TrustStore: Send + Sync {
    /// Whether this store can be queried at all. When false the root CA store
    /// skips trust integration entirely.
    fn is_supported(&self) -> bool;

    /// Whether `anchor` currently verifies against the store's roots.
    fn is_trusted(&self, anchor: &TrustAnchor<'_>) -> Result<bool>;

    fn import_ca(&self, anchor: &TrustAnchor<'_>) -> Result<()>;

    /// Removes every trusted root whose common name is `name`.
    fn remove_ca(&self, name: &str) -> Result<()>;
}

/// The current platform's trust store: the login keychain on macOS, the
/// current user's `Root` store on Windows. Other platforms are unsupported.
#[derive(Debug, Default)]
pub struct SystemTrustStore {
    backend: PlatformTrustBackend,
}

impl TrustStore for SystemTrustStore {
    fn is_supported(&self) -> bool {
        PlatformTrustBackend::SUPPORTED
    }

    fn is_trusted(&self, anchor: &TrustAnchor<'_>) -> Result<bool> {
        self.backend.is_trusted(anchor)
    }

    fn import_ca(&self, anchor: &TrustAnchor<'_>) -> Result<()> {
        self.backend.import_ca(anchor)
    }

    fn remove_ca(&self, name: &str) -> Result<()> {
        self.backend.remove_ca(name)
    }
}

/// Never touches any trust store.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTrustStore;

impl TrustStore for NoopTrustStore {
    fn is_supported(&self) -> bool {
        false
    }

    fn is_trusted(&self, _anchor: &TrustAnchor<'_>) -> Result<bool> {
        Ok(false)
    }

    fn import_ca(&self, _anchor: &TrustAnchor<'_>) -> Result<()> {
        Ok(())
    }

    fn remove_ca(&self, _name: &str) -> Result<()> {
        Ok(())
    }
}
