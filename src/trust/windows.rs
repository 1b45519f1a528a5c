use crate::error::Result;

use super::TrustAnchor;
use super::common::{operation_error, path_arg, run_command};

#[derive(Debug, Default)]
pub(crate) struct PlatformTrustBackend;

impl PlatformTrustBackend {
    pub(crate) const SUPPORTED: bool = true;

    pub(crate) fn is_trusted(&self, anchor: &TrustAnchor<'_>) -> Result<bool> {
        let cert_path = path_arg("verify_ca", anchor.cert_path)?;
        let outcome = run_command("verify_ca", "certutil", ["-verify", cert_path])?;
        Ok(outcome.success)
    }

    pub(crate) fn import_ca(&self, anchor: &TrustAnchor<'_>) -> Result<()> {
        let cert_path = path_arg("import_ca", anchor.cert_path)?;
        let outcome = run_command(
            "import_ca",
            "certutil",
            ["-user", "-f", "-addstore", "Root", cert_path],
        )?;
        if !outcome.success {
            return Err(operation_error("import_ca", outcome.stderr));
        }
        Ok(())
    }

    pub(crate) fn remove_ca(&self, name: &str) -> Result<()> {
        let outcome = run_command(
            "remove_ca",
            "certutil",
            ["-user", "-delstore", "Root", name],
        )?;
        if !outcome.success && !outcome.reports_missing() {
            return Err(operation_error("remove_ca", outcome.stderr));
        }
        Ok(())
    }
}
