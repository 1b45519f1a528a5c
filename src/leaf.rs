//! On-demand leaf certificates, cached on disk per common name.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use rustls_pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs1KeyDer};
use time::{Duration, OffsetDateTime};
use tracing::debug;

use crate::cert::params::{
    CertificationRequestInfo, DistinguishedName, ExtendedKeyUsageOption, Validity,
};
use crate::cert::extensions::KeyUsages;
use crate::cert::{Certificate, CertificateWithPrivateKey};
use crate::common_name;
use crate::csr::CertificationRequest;
use crate::error::{CaError, Result};
use crate::issuer::Issuer;
use crate::key::KeyPair;
use crate::pem_utils::{
    CERTIFICATE_LABEL, PRIVATE_KEY_LABEL, der_to_pem, is_private_key_label, parse_blocks,
};
use crate::root_ca::RootCa;

/// Country written into every leaf subject.
const LEAF_COUNTRY: &str = "CN";

static LAST_SERIAL: AtomicU64 = AtomicU64::new(0);

/// A leaf certificate and its private key, ready to hand to a TLS server.
#[derive(Debug)]
pub struct LeafIdentity {
    /// The leaf certificate alone; the root is expected to be trusted by the client.
    pub cert_chain: Vec<CertificateDer<'static>>,
    /// PKCS#1 encoding of the leaf key.
    pub key: PrivateKeyDer<'static>,
    /// The parsed leaf certificate.
    pub certificate: Certificate,
}

impl RootCa {
    /// Where the leaf for `common_name` is cached.
    ///
    /// A leading `*` is dropped, so `*.example.com` and `.example.com` share a
    /// file.
    pub fn cache_path(&self, common_name: &str) -> PathBuf {
        let stem = common_name.strip_prefix('*').unwrap_or(common_name);
        self.cert_dir.join(format!("{stem}.crt"))
    }

    /// Returns the cached leaf for `common_name`, issuing and caching one first
    /// if none exists.
    ///
    /// Concurrent callers asking for the same uncached name generate exactly one
    /// key and write exactly one file. A cached certificate is returned as is;
    /// `validity` and `key_bits` only apply to newly issued leaves.
    pub fn issue(
        &self,
        common_name: &str,
        validity: Duration,
        key_bits: usize,
    ) -> Result<LeafIdentity> {
        check_common_name(common_name)?;
        let path = self.cache_path(common_name);

        if path.exists() {
            self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
            debug!(common_name, path = %path.display(), "leaf cache hit");
            return load_identity(&path);
        }

        {
            let _guard = self.issue_lock.lock().map_err(|_| CaError::LockPoisoned)?;
            if path.exists() {
                self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
                debug!(common_name, path = %path.display(), "leaf issued by another caller");
            } else {
                self.write_leaf(common_name, validity, key_bits, &path)?;
                self.counters.leaves_issued.fetch_add(1, Ordering::Relaxed);
            }
        }

        load_identity(&path)
    }

    /// Issues for the common name [`common_name::resolve`] picks for `host`.
    pub fn issue_for_host(
        &self,
        host: &str,
        validity: Duration,
        key_bits: usize,
    ) -> Result<LeafIdentity> {
        self.issue(&common_name::resolve(host), validity, key_bits)
    }

    /// [`RootCa::issue_for_host`] with the configured leaf validity and key size.
    pub fn issue_default(&self, host: &str) -> Result<LeafIdentity> {
        self.issue_for_host(host, self.leaf_validity, self.leaf_key_bits)
    }

    fn write_leaf(
        &self,
        common_name: &str,
        validity: Duration,
        key_bits: usize,
        path: &Path,
    ) -> Result<()> {
        let validity = Validity::backdated(validity)?;
        let key = self.key_source.generate_rsa(key_bits)?;

        let subject = DistinguishedName::builder()
            .common_name(common_name.to_string())
            .country(LEAF_COUNTRY.to_string())
            .organization(common_name.to_string())
            .organization_unit(self.name().to_string())
            .build();
        let request = CertificationRequest::new(&subject, &key)?;
        let request = CertificationRequest::from_der(&request.to_der()?)?;
        request.verify()?;

        let info = CertificationRequestInfo::builder()
            .subject(request.subject()?)
            .subject_public_key(request.public_key()?)
            .usages(vec![
                ExtendedKeyUsageOption::ServerAuth,
                ExtendedKeyUsageOption::ClientAuth,
            ])
            .key_usage(KeyUsages::KeyCertSign.into())
            .dns_names(vec![common_name.to_string()])
            .build();
        let serial = next_serial();
        let cert = self
            .authority
            .issue(&info, validity, &serial)?;

        let mut contents = cert.to_pem()?;
        contents.push_str(&der_to_pem(&key.to_pkcs1_der()?, PRIVATE_KEY_LABEL));
        write_atomically(&self.cert_dir, path, contents.as_bytes())?;

        debug!(
            common_name,
            bits = key_bits,
            path = %path.display(),
            "issued leaf certificate"
        );
        Ok(())
    }
}

fn check_common_name(common_name: &str) -> Result<()> {
    if common_name.is_empty() || common_name == "*" {
        return Err(CaError::InvalidInput(format!(
            "cannot issue for common name {common_name:?}"
        )));
    }
    if common_name.contains(['/', '\\']) || common_name.contains("..") {
        return Err(CaError::InvalidInput(format!(
            "common name {common_name:?} is not a valid cache file name"
        )));
    }
    Ok(())
}

/// Nanoseconds since the epoch, bumped past the last value handed out.
fn next_serial() -> Vec<u8> {
    let now = u64::try_from(OffsetDateTime::now_utc().unix_timestamp_nanos()).unwrap_or(0);
    let previous = LAST_SERIAL
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(now.max(last + 1))
        })
        .unwrap_or_else(|last| last);
    now.max(previous + 1).to_be_bytes().to_vec()
}

fn write_atomically(dir: &Path, path: &Path, contents: &[u8]) -> Result<()> {
    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(|e| CaError::io(dir, e))?;
    temp.write_all(contents)
        .and_then(|()| temp.as_file().sync_all())
        .map_err(|e| CaError::io(temp.path(), e))?;
    temp.persist(path).map_err(|e| CaError::io(path, e.error))?;
    Ok(())
}

/// Reads the first certificate and first private key from a cache file.
fn load_identity(path: &Path) -> Result<LeafIdentity> {
    let data = fs::read(path).map_err(|e| CaError::io(path, e))?;
    let blocks = parse_blocks(&data)?;

    let cert_block = blocks
        .iter()
        .find(|block| block.tag() == CERTIFICATE_LABEL)
        .ok_or_else(|| {
            CaError::DecodingError(format!("no {CERTIFICATE_LABEL} block in {}", path.display()))
        })?;
    let key_block = blocks
        .iter()
        .find(|block| is_private_key_label(block.tag()))
        .ok_or_else(|| {
            CaError::DecodingError(format!("no private key block in {}", path.display()))
        })?;

    let cert_der = cert_block.contents().to_vec();
    let certificate = Certificate::from_der(&cert_der)?;
    let key = KeyPair::import_from_der(key_block.contents())?;
    let pair = CertificateWithPrivateKey::new(certificate, key)?;

    Ok(LeafIdentity {
        cert_chain: vec![CertificateDer::from(cert_der)],
        key: PrivateKeyDer::Pkcs1(PrivatePkcs1KeyDer::from(pair.key.to_pkcs1_der()?)),
        certificate: pair.cert,
    })
}
