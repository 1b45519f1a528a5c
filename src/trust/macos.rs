use std::path::PathBuf;

use crate::error::{CaError, Result};

use super::TrustAnchor;
use super::common::{operation_error, path_arg, remove_until_missing, run_command};

/// Upper bound on `delete-certificate` calls for one name.
const MAX_REMOVE_ATTEMPTS: usize = 16;

#[derive(Debug, Default)]
pub(crate) struct PlatformTrustBackend;

impl PlatformTrustBackend {
    pub(crate) const SUPPORTED: bool = true;

    pub(crate) fn is_trusted(&self, anchor: &TrustAnchor<'_>) -> Result<bool> {
        let cert_path = path_arg("verify_ca", anchor.cert_path)?;
        // -L: no network fetches, local trust settings only.
        let outcome = run_command("verify_ca", "security", ["verify-cert", "-L", "-c", cert_path])?;
        Ok(outcome.success)
    }

    pub(crate) fn import_ca(&self, anchor: &TrustAnchor<'_>) -> Result<()> {
        let keychain = login_keychain_path()?;
        let outcome = run_command(
            "import_ca",
            "security",
            [
                "add-trusted-cert",
                "-r",
                "trustRoot",
                "-k",
                path_arg("import_ca", &keychain)?,
                path_arg("import_ca", anchor.cert_path)?,
            ],
        )?;
        if !outcome.success {
            return Err(operation_error("import_ca", outcome.stderr));
        }
        Ok(())
    }

    pub(crate) fn remove_ca(&self, name: &str) -> Result<()> {
        let keychain = login_keychain_path()?;
        let keychain = path_arg("remove_ca", &keychain)?;
        // delete-certificate removes one match per call.
        remove_until_missing("remove_ca", name, MAX_REMOVE_ATTEMPTS, || {
            run_command(
                "remove_ca",
                "security",
                ["delete-certificate", "-t", "-c", name, keychain],
            )
        })
    }
}

fn login_keychain_path() -> Result<PathBuf> {
    let Some(home) = std::env::var_os("HOME") else {
        return Err(CaError::UnsupportedOperation(
            "HOME is not set; cannot resolve macOS login keychain".to_string(),
        ));
    };
    Ok(PathBuf::from(home).join("Library/Keychains/login.keychain-db"))
}
