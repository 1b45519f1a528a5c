use crate::error::{CaError, Result};

use super::TrustAnchor;

#[derive(Debug, Default)]
pub(crate) struct PlatformTrustBackend;

impl PlatformTrustBackend {
    pub(crate) const SUPPORTED: bool = false;

    pub(crate) fn is_trusted(&self, _anchor: &TrustAnchor<'_>) -> Result<bool> {
        Err(CaError::UnsupportedOperation(
            "system trust query unsupported on this platform".to_string(),
        ))
    }

    pub(crate) fn import_ca(&self, _anchor: &TrustAnchor<'_>) -> Result<()> {
        Err(CaError::UnsupportedOperation(
            "system trust import unsupported on this platform".to_string(),
        ))
    }

    pub(crate) fn remove_ca(&self, _name: &str) -> Result<()> {
        Err(CaError::UnsupportedOperation(
            "system trust removal unsupported on this platform".to_string(),
        ))
    }
}
