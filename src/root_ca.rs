//! The long-lived root certificate authority.
//!
//! A [`RootCa`] is opened once per process and then shared (usually behind an
//! `Arc`) by every connection that needs a leaf certificate. Opening either
//! loads `<name>.key`/`<name>.crt` or generates and saves a fresh pair, makes a
//! best-effort attempt to get the certificate trusted by the operating system,
//! and prepares the leaf cache directory.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use time::Duration;
use tracing::{debug, error, info, warn};

use crate::cert::params::{
    CertificationRequestInfo, DistinguishedName, ExtendedKeyUsageOption, Validity,
};
use crate::cert::{Certificate, CertificateWithPrivateKey};
use crate::config::CaConfig;
use crate::error::{CaError, Result};
use crate::key::{KeyPair, KeySource, OsRngKeySource};
use crate::pem_utils::{
    CERTIFICATE_LABEL, PRIVATE_KEY_LABEL, der_to_pem, is_private_key_label, parse_blocks,
};
use crate::trust::{TrustAnchor, TrustStore};

/// Serial number of every generated root certificate.
const ROOT_SERIAL: [u8; 1] = [1];

/// A root CA key and certificate, plus the leaf cache it issues into.
pub struct RootCa {
    name: String,
    key_bits: usize,
    key_path: PathBuf,
    cert_path: PathBuf,
    pub(crate) cert_dir: PathBuf,
    pub(crate) leaf_validity: Duration,
    pub(crate) leaf_key_bits: usize,
    pub(crate) authority: CertificateWithPrivateKey,
    der: Vec<u8>,
    pub(crate) issue_lock: Mutex<()>,
    pub(crate) key_source: Arc<dyn KeySource>,
    pub(crate) counters: IssuerCounters,
}

/// Point-in-time issuance counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IssuerMetrics {
    /// Requests answered from a certificate already in the cache directory.
    pub cache_hits: u64,
    /// Leaf certificates generated and written to the cache directory.
    pub leaves_issued: u64,
}

#[derive(Debug, Default)]
pub(crate) struct IssuerCounters {
    pub(crate) cache_hits: AtomicU64,
    pub(crate) leaves_issued: AtomicU64,
}

impl RootCa {
    /// Loads or creates the root CA described by `config`.
    ///
    /// `trust` decides whether and how the certificate is installed into the
    /// system trust store; pass [`NoopTrustStore`](crate::trust::NoopTrustStore)
    /// to leave trust alone.
    pub fn open(config: &CaConfig, trust: &dyn TrustStore) -> Result<Self> {
        Self::open_with_key_source(config, trust, Arc::new(OsRngKeySource))
    }

    /// Like [`RootCa::open`], drawing every RSA key (root and leaves) from
    /// `key_source`.
    pub fn open_with_key_source(
        config: &CaConfig,
        trust: &dyn TrustStore,
        key_source: Arc<dyn KeySource>,
    ) -> Result<Self> {
        config.validate()?;
        let paths = CaPaths::resolve(config)?;

        let (authority, der) = if paths.cert_path.exists() {
            load(&paths)?
        } else {
            generate_and_save(config, &paths, key_source.as_ref())?
        };

        let ca = RootCa {
            name: config.name.clone(),
            key_bits: authority.key.bits(),
            key_path: paths.key_path,
            cert_path: paths.cert_path,
            cert_dir: paths.cert_dir,
            leaf_validity: config.leaf_validity,
            leaf_key_bits: config.leaf_key_bits,
            authority,
            der,
            issue_lock: Mutex::new(()),
            key_source,
            counters: IssuerCounters::default(),
        };

        ca.ensure_trusted(trust);

        fs::create_dir_all(&ca.cert_dir).map_err(|e| CaError::io(&ca.cert_dir, e))?;
        debug!(
            name = %ca.name,
            cert_dir = %ca.cert_dir.display(),
            "root CA ready"
        );
        Ok(ca)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Modulus size of the root key actually in use, which may differ from
    /// the configured size when the key was loaded from disk.
    pub fn key_bits(&self) -> usize {
        self.key_bits
    }

    pub fn cert_dir(&self) -> &Path {
        &self.cert_dir
    }

    pub fn cert_path(&self) -> &Path {
        &self.cert_path
    }

    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    pub fn certificate(&self) -> &Certificate {
        &self.authority.cert
    }

    /// The root certificate exactly as encoded on disk.
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn cert_pem(&self) -> String {
        der_to_pem(&self.der, CERTIFICATE_LABEL)
    }

    pub fn metrics(&self) -> IssuerMetrics {
        IssuerMetrics {
            cache_hits: self.counters.cache_hits.load(Ordering::Relaxed),
            leaves_issued: self.counters.leaves_issued.load(Ordering::Relaxed),
        }
    }

    fn ensure_trusted(&self, trust: &dyn TrustStore) {
        if !trust.is_supported() {
            debug!(name = %self.name, "system trust store not supported, skipping");
            return;
        }

        let anchor = TrustAnchor {
            name: &self.name,
            cert_path: &self.cert_path,
            certificate: self.certificate(),
        };
        match trust.is_trusted(&anchor) {
            Ok(true) => return,
            Ok(false) => warn!(name = %self.name, "root CA is not trusted by the system"),
            Err(e) => warn!(name = %self.name, error = %e, "failed to verify root CA trust"),
        }

        if let Err(e) = trust.remove_ca(&self.name) {
            error!(name = %self.name, error = %e, "failed to remove stale root CA");
        }
        match trust.import_ca(&anchor) {
            Ok(()) => {
                info!(name = %self.name, "imported root CA into the system trust store");
                // Leaves signed by a previous root are useless now.
                if let Err(e) = self.purge_cache() {
                    error!(cert_dir = %self.cert_dir.display(), error = %e, "failed to purge leaf cache");
                }
            }
            Err(e) => error!(name = %self.name, error = %e, "failed to import root CA"),
        }
    }

    fn purge_cache(&self) -> Result<()> {
        let entries = match fs::read_dir(&self.cert_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(CaError::io(&self.cert_dir, e)),
        };
        for entry in entries {
            let path = entry.map_err(|e| CaError::io(&self.cert_dir, e))?.path();
            if path.is_file() {
                fs::remove_file(&path).map_err(|e| CaError::io(&path, e))?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for RootCa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootCa")
            .field("name", &self.name)
            .field("key_bits", &self.key_bits)
            .field("cert_path", &self.cert_path)
            .field("cert_dir", &self.cert_dir)
            .finish_non_exhaustive()
    }
}

struct CaPaths {
    key_path: PathBuf,
    cert_path: PathBuf,
    cert_dir: PathBuf,
}

impl CaPaths {
    fn resolve(config: &CaConfig) -> Result<Self> {
        let anchor = if config.portable {
            let exe = std::env::current_exe().map_err(|e| CaError::io("<current exe>", e))?;
            exe.parent().map(Path::to_path_buf).unwrap_or_default()
        } else {
            PathBuf::new()
        };
        let ca_dir = anchor.join(config.ca_dir.as_deref().unwrap_or(Path::new("")));
        Ok(CaPaths {
            key_path: ca_dir.join(format!("{}.key", config.name)),
            cert_path: ca_dir.join(format!("{}.crt", config.name)),
            cert_dir: anchor.join(&config.cert_dir),
        })
    }
}

fn generate_and_save(
    config: &CaConfig,
    paths: &CaPaths,
    key_source: &dyn KeySource,
) -> Result<(CertificateWithPrivateKey, Vec<u8>)> {
    info!(
        name = %config.name,
        bits = config.key_bits,
        cert_path = %paths.cert_path.display(),
        "generating root CA"
    );
    let validity = Validity::backdated(config.validity)?;
    let key = key_source.generate_rsa(config.key_bits)?;
    let subject = DistinguishedName::builder()
        .common_name(config.name.clone())
        .organization(config.name.clone())
        .build();
    let info = CertificationRequestInfo::builder()
        .subject(subject)
        .subject_public_key(key.public_key())
        .usages(vec![
            ExtendedKeyUsageOption::ServerAuth,
            ExtendedKeyUsageOption::ClientAuth,
        ])
        .is_ca(true)
        .build();
    let cert = Certificate::new_self_signed(
        &info,
        &key,
        validity,
        &ROOT_SERIAL,
    )?;
    let der = cert.to_der()?;

    if let Some(parent) = paths.key_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| CaError::io(parent, e))?;
    }
    write_public_file(
        &paths.key_path,
        &der_to_pem(&key.to_pkcs1_der()?, PRIVATE_KEY_LABEL),
    )?;
    write_public_file(&paths.cert_path, &der_to_pem(&der, CERTIFICATE_LABEL))?;

    Ok((CertificateWithPrivateKey::new(cert, key)?, der))
}

/// Writes `contents` and sets mode 0644 on Unix.
fn write_public_file(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).map_err(|e| CaError::io(path, e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o644))
            .map_err(|e| CaError::io(path, e))?;
    }
    Ok(())
}

/// Reads the key and certificate files; either block may live in either file.
fn load(paths: &CaPaths) -> Result<(CertificateWithPrivateKey, Vec<u8>)> {
    let mut cert: Option<(Certificate, Vec<u8>)> = None;
    let mut key: Option<KeyPair> = None;

    for path in [&paths.key_path, &paths.cert_path] {
        let data = match fs::read(path) {
            Ok(data) => data,
            // A bundle in the certificate file alone is enough.
            Err(e) if e.kind() == io::ErrorKind::NotFound && path == &paths.key_path => continue,
            Err(e) => return Err(CaError::io(path, e)),
        };
        // Every recognized block must parse; the first of each kind wins.
        for block in parse_blocks(&data)? {
            if block.tag() == CERTIFICATE_LABEL {
                let der = block.contents().to_vec();
                let parsed = Certificate::from_der(&der)?;
                cert.get_or_insert((parsed, der));
            } else if is_private_key_label(block.tag()) {
                let parsed = KeyPair::import_from_der(block.contents())?;
                key.get_or_insert(parsed);
            }
        }
    }

    let Some((cert, der)) = cert else {
        return Err(CaError::DecodingError(format!(
            "no {CERTIFICATE_LABEL} block in {} or {}",
            paths.cert_path.display(),
            paths.key_path.display()
        )));
    };
    let Some(key) = key else {
        return Err(CaError::DecodingError(format!(
            "no private key block in {} or {}",
            paths.key_path.display(),
            paths.cert_path.display()
        )));
    };
    info!(
        subject = %cert.subject_name(),
        cert_path = %paths.cert_path.display(),
        "loaded root CA"
    );
    Ok((CertificateWithPrivateKey::new(cert, key)?, der))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::cert::extensions::{BasicConstraints, KeyUsage, KeyUsages};
    use crate::trust::NoopTrustStore;

    fn config(dir: &Path) -> CaConfig {
        CaConfig::builder()
            .name("Unit CA".to_string())
            .key_bits(1024)
            .leaf_key_bits(1024)
            .ca_dir(dir)
            .cert_dir(dir.join("certs"))
            .build()
    }

    #[derive(Default)]
    struct RecordingTrust {
        trusted: bool,
        fail_import: bool,
        removed: AtomicUsize,
        imported: AtomicUsize,
    }

    impl TrustStore for RecordingTrust {
        fn is_supported(&self) -> bool {
            true
        }

        fn is_trusted(&self, _anchor: &TrustAnchor<'_>) -> Result<bool> {
            Ok(self.trusted)
        }

        fn import_ca(&self, anchor: &TrustAnchor<'_>) -> Result<()> {
            assert!(anchor.cert_path.exists());
            self.imported.fetch_add(1, Ordering::SeqCst);
            if self.fail_import {
                return Err(CaError::TrustStore("denied".to_string()));
            }
            Ok(())
        }

        fn remove_ca(&self, name: &str) -> Result<()> {
            assert_eq!(name, "Unit CA");
            self.removed.fetch_add(1, Ordering::SeqCst);
            Err(CaError::TrustStore("nothing to remove".to_string()))
        }
    }

    #[test]
    fn test_generates_root_with_ca_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let ca = RootCa::open(&config(dir.path()), &NoopTrustStore).unwrap();

        assert!(ca.key_path().exists());
        assert!(ca.cert_path().exists());
        assert!(ca.cert_dir().is_dir());
        assert_eq!(ca.key_bits(), 1024);

        let cert = ca.certificate();
        assert_eq!(cert.serial_number(), ROOT_SERIAL.to_vec());
        let subject = cert.subject().unwrap();
        assert_eq!(subject.common_name, "Unit CA");
        assert_eq!(subject.organization.as_deref(), Some("Unit CA"));
        assert_eq!(
            cert.extension::<BasicConstraints>().unwrap(),
            Some(BasicConstraints {
                is_ca: true,
                max_path_length: None
            })
        );
        assert_eq!(
            cert.extension::<KeyUsage>().unwrap(),
            Some(KeyUsage(
                KeyUsages::KeyEncipherment | KeyUsages::DigitalSignature | KeyUsages::KeyCertSign
            ))
        );
        assert_eq!(ca.cert_pem(), fs::read_to_string(ca.cert_path()).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_ca_files_are_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let ca = RootCa::open(&config(dir.path()), &NoopTrustStore).unwrap();
        for path in [ca.key_path(), ca.cert_path()] {
            let mode = fs::metadata(path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o644);
        }
    }

    #[test]
    fn test_loads_bundle_from_cert_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let original = RootCa::open(&config(dir.path()), &NoopTrustStore).unwrap();

        let mut bundle = fs::read_to_string(original.key_path()).unwrap();
        bundle.push_str(&original.cert_pem());
        fs::write(original.cert_path(), bundle).unwrap();
        fs::remove_file(original.key_path()).unwrap();

        let reopened = RootCa::open(&config(dir.path()), &NoopTrustStore).unwrap();
        assert_eq!(reopened.der(), original.der());
    }

    #[test]
    fn test_missing_key_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let original = RootCa::open(&config(dir.path()), &NoopTrustStore).unwrap();
        fs::remove_file(original.key_path()).unwrap();

        let err = RootCa::open(&config(dir.path()), &NoopTrustStore).unwrap_err();
        assert!(matches!(err, CaError::DecodingError(_)), "{err}");
    }

    #[test]
    fn test_mismatched_key_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let original = RootCa::open(&config(dir.path()), &NoopTrustStore).unwrap();
        let stranger = KeyPair::generate_rsa(1024).unwrap();
        fs::write(
            original.key_path(),
            der_to_pem(&stranger.to_pkcs1_der().unwrap(), "RSA PRIVATE KEY"),
        )
        .unwrap();

        let err = RootCa::open(&config(dir.path()), &NoopTrustStore).unwrap_err();
        assert!(matches!(err, CaError::DecodingError(_)), "{err}");
    }

    #[test]
    fn test_malformed_later_block_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let original = RootCa::open(&config(dir.path()), &NoopTrustStore).unwrap();

        let mut bundle = original.cert_pem();
        bundle.push_str(&der_to_pem(b"not a certificate", CERTIFICATE_LABEL));
        fs::write(original.cert_path(), bundle).unwrap();

        let err = RootCa::open(&config(dir.path()), &NoopTrustStore).unwrap_err();
        assert!(matches!(err, CaError::DecodingError(_)), "{err}");
    }

    #[test]
    fn test_first_of_each_block_wins() {
        let dir = tempfile::tempdir().unwrap();
        let original = RootCa::open(&config(dir.path()), &NoopTrustStore).unwrap();
        let other_dir = tempfile::tempdir().unwrap();
        let other = RootCa::open(&config(other_dir.path()), &NoopTrustStore).unwrap();

        let mut bundle = original.cert_pem();
        bundle.push_str(&other.cert_pem());
        fs::write(original.cert_path(), bundle).unwrap();

        let reopened = RootCa::open(&config(dir.path()), &NoopTrustStore).unwrap();
        assert_eq!(reopened.der(), original.der());
    }

    #[test]
    fn test_portable_paths_sit_next_to_executable() {
        let exe_dir = std::env::current_exe()
            .unwrap()
            .parent()
            .unwrap()
            .to_path_buf();

        let config = CaConfig::builder()
            .name("Portable CA".to_string())
            .portable(true)
            .build();
        let paths = CaPaths::resolve(&config).unwrap();
        assert_eq!(paths.key_path, exe_dir.join("Portable CA.key"));
        assert_eq!(paths.cert_path, exe_dir.join("Portable CA.crt"));
        assert_eq!(paths.cert_dir, exe_dir.join("certs"));

        let absolute = tempfile::tempdir().unwrap();
        let config = CaConfig::builder()
            .name("Portable CA".to_string())
            .portable(true)
            .cert_dir(absolute.path().join("leaves"))
            .build();
        let paths = CaPaths::resolve(&config).unwrap();
        assert!(paths.key_path.starts_with(&exe_dir));
        assert_eq!(paths.cert_dir, absolute.path().join("leaves"));
    }

    #[test]
    fn test_non_portable_paths_are_relative() {
        let config = CaConfig::builder().name("Local CA".to_string()).build();
        let paths = CaPaths::resolve(&config).unwrap();
        assert_eq!(paths.key_path, PathBuf::from("Local CA.key"));
        assert_eq!(paths.cert_path, PathBuf::from("Local CA.crt"));
        assert_eq!(paths.cert_dir, PathBuf::from("certs"));
    }

    #[test]
    fn test_out_of_range_root_validity_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = CaConfig::builder()
            .name("Unit CA".to_string())
            .key_bits(1024)
            .validity(Duration::days(3_000_000))
            .ca_dir(dir.path())
            .build();
        let err = RootCa::open(&config, &NoopTrustStore).unwrap_err();
        assert!(matches!(err, CaError::InvalidInput(_)), "{err}");
        assert!(!dir.path().join("Unit CA.crt").exists());
        assert!(!dir.path().join("Unit CA.key").exists());
    }

    #[test]
    fn test_rejects_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = CaConfig::builder()
            .name("bad/name".to_string())
            .ca_dir(dir.path())
            .build();
        assert!(matches!(
            RootCa::open(&config, &NoopTrustStore),
            Err(CaError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_untrusted_root_is_reimported_and_cache_purged() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("certs");
        fs::create_dir_all(&cache).unwrap();
        fs::write(cache.join("stale.example.com.crt"), "stale").unwrap();

        let trust = RecordingTrust::default();
        RootCa::open(&config(dir.path()), &trust).unwrap();

        assert_eq!(trust.removed.load(Ordering::SeqCst), 1);
        assert_eq!(trust.imported.load(Ordering::SeqCst), 1);
        assert!(!cache.join("stale.example.com.crt").exists());
        assert!(cache.is_dir());
    }

    #[test]
    fn test_failed_import_is_not_fatal_and_keeps_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("certs");
        fs::create_dir_all(&cache).unwrap();
        fs::write(cache.join("kept.example.com.crt"), "kept").unwrap();

        let trust = RecordingTrust {
            fail_import: true,
            ..Default::default()
        };
        RootCa::open(&config(dir.path()), &trust).unwrap();
        assert!(cache.join("kept.example.com.crt").exists());
    }

    #[test]
    fn test_trusted_root_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let trust = RecordingTrust {
            trusted: true,
            ..Default::default()
        };
        RootCa::open(&config(dir.path()), &trust).unwrap();
        assert_eq!(trust.removed.load(Ordering::SeqCst), 0);
        assert_eq!(trust.imported.load(Ordering::SeqCst), 0);
    }
}
