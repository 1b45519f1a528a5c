use std::path::PathBuf;

use bon::Builder;
use time::Duration;

use crate::cert::params::Validity;
use crate::error::{CaError, Result};

pub const DEFAULT_CA_NAME: &str = "InterceptCA";
pub const DEFAULT_KEY_BITS: usize = 2048;
pub const DEFAULT_CERT_DIR: &str = "certs";
pub const MIN_KEY_BITS: usize = 1024;

/// Settings for opening a [`RootCa`](crate::root_ca::RootCa).
///
/// ```
/// use interceptca::config::CaConfig;
///
/// let config = CaConfig::builder()
///     .name("My Proxy CA".to_string())
///     .cert_dir("leaf-certs".into())
///     .build();
/// assert_eq!(config.key_bits, 2048);
/// config.validate().unwrap();
/// ```
#[derive(Clone, Debug, Builder)]
pub struct CaConfig {
    /// Display name; used for the subject, the file stem and the trust-store entry.
    #[builder(default = DEFAULT_CA_NAME.to_string())]
    pub name: String,
    /// Lifetime of a freshly generated root certificate.
    #[builder(default = Duration::days(3650))]
    pub validity: Duration,
    /// RSA modulus size for a freshly generated root key.
    #[builder(default = DEFAULT_KEY_BITS)]
    pub key_bits: usize,
    /// Directory holding `<name>.key` and `<name>.crt`; the working directory
    /// when unset.
    #[builder(into)]
    pub ca_dir: Option<PathBuf>,
    /// Directory holding the leaf certificate cache.
    #[builder(default = PathBuf::from(DEFAULT_CERT_DIR))]
    pub cert_dir: PathBuf,
    /// Anchor CA files and the cache directory next to the running executable.
    #[builder(default)]
    pub portable: bool,
    /// Lifetime used by [`RootCa::issue_default`](crate::root_ca::RootCa::issue_default).
    #[builder(default = Duration::days(180))]
    pub leaf_validity: Duration,
    /// RSA modulus size used by [`RootCa::issue_default`](crate::root_ca::RootCa::issue_default).
    #[builder(default = DEFAULT_KEY_BITS)]
    pub leaf_key_bits: usize,
}

impl Default for CaConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl CaConfig {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CaError::InvalidInput("CA name must not be empty".to_string()));
        }
        if self.name.contains(['/', '\\']) {
            return Err(CaError::InvalidInput(format!(
                "CA name {:?} must not contain path separators",
                self.name
            )));
        }
        for (what, bits) in [("key_bits", self.key_bits), ("leaf_key_bits", self.leaf_key_bits)] {
            if bits < MIN_KEY_BITS {
                return Err(CaError::InvalidInput(format!(
                    "{what} must be at least {MIN_KEY_BITS}, got {bits}"
                )));
            }
        }
        for (what, validity) in [("validity", self.validity), ("leaf_validity", self.leaf_validity)] {
            if !validity.is_positive() {
                return Err(CaError::InvalidInput(format!(
                    "{what} must be positive, got {validity}"
                )));
            }
            Validity::backdated(validity)
                .map_err(|e| CaError::InvalidInput(format!("{what}: {e}")))?;
        }
        Ok(())
    }
}
