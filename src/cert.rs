pub mod extensions;
pub mod params;

use der::{Decode, DecodePem, Encode, EncodePem};
use extensions::{BasicConstraints, SubjectKeyIdentifier, ToAndFromX509Extension};
use params::{CertificationRequestInfo, DistinguishedName, Validity};
use time::OffsetDateTime;
use x509_cert::certificate::CertificateInner;
use x509_cert::name::Name;

use crate::error::{CaError, Result};
use crate::issuer::Issuer;
use crate::key::{KeyPair, PublicKey};

/// Represents the supported signature algorithms for certificates.
#[derive(Debug, Clone)]
pub enum SignatureAlgorithm {
    /// SHA-256 with RSA encryption (PKCS#1 v1.5).
    Sha256WithRSA,
}

impl From<SignatureAlgorithm> for x509_cert::spki::AlgorithmIdentifierOwned {
    /// Converts a `SignatureAlgorithm` into an `AlgorithmIdentifierOwned`.
    ///
    /// RFC 4055 requires explicit NULL parameters for the PKCS#1 v1.5 family.
    fn from(value: SignatureAlgorithm) -> Self {
        match value {
            SignatureAlgorithm::Sha256WithRSA => x509_cert::spki::AlgorithmIdentifierOwned {
                oid: const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION,
                parameters: Some(der::asn1::Any::from(der::asn1::AnyRef::NULL)),
            },
        }
    }
}

/// Represents an X.509 certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    /// The inner representation of the certificate.
    pub inner: CertificateInner,
}

impl Certificate {
    pub fn from_der(der: &[u8]) -> Result<Self> {
        Ok(Self {
            inner: CertificateInner::from_der(der)?,
        })
    }

    pub fn from_pem(pem: &str) -> Result<Self> {
        Ok(Self {
            inner: CertificateInner::from_pem(pem)?,
        })
    }

    /// Encodes the certificate into DER format.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.inner
            .to_der()
            .map_err(|e| CaError::EncodingError(e.to_string()))
    }

    /// Encodes the certificate into PEM format.
    pub fn to_pem(&self) -> Result<String> {
        self.inner
            .to_pem(pkcs8::LineEnding::LF)
            .map_err(|e| CaError::EncodingError(e.to_string()))
    }

    /// Serial number as big-endian bytes, exactly as encoded.
    pub fn serial_number(&self) -> Vec<u8> {
        self.inner
            .tbs_certificate
            .serial_number
            .as_bytes()
            .to_vec()
    }

    pub fn subject_name(&self) -> &Name {
        &self.inner.tbs_certificate.subject
    }

    pub fn issuer_name(&self) -> &Name {
        &self.inner.tbs_certificate.issuer
    }

    pub fn subject(&self) -> Result<DistinguishedName> {
        DistinguishedName::from_x509_name(self.subject_name())
    }

    pub fn public_key(&self) -> Result<PublicKey> {
        PublicKey::from_x509spki(&self.inner.tbs_certificate.subject_public_key_info)
    }

    pub fn not_before(&self) -> OffsetDateTime {
        OffsetDateTime::from(
            self.inner
                .tbs_certificate
                .validity
                .not_before
                .to_system_time(),
        )
    }

    pub fn not_after(&self) -> OffsetDateTime {
        OffsetDateTime::from(
            self.inner
                .tbs_certificate
                .validity
                .not_after
                .to_system_time(),
        )
    }

    /// Decodes the first extension of type `E`, if the certificate carries one.
    pub fn extension<E: ToAndFromX509Extension>(&self) -> Result<Option<E>> {
        let Some(extensions) = &self.inner.tbs_certificate.extensions else {
            return Ok(None);
        };
        extensions
            .iter()
            .find(|ext| ext.extn_id == E::OID)
            .map(|ext| E::from_x509_extension_value(ext.extn_value.as_bytes()))
            .transpose()
    }

    pub fn is_ca(&self) -> bool {
        matches!(
            self.extension::<BasicConstraints>(),
            Ok(Some(BasicConstraints { is_ca: true, .. }))
        )
    }

    pub fn subject_key_identifier(&self) -> Option<Vec<u8>> {
        self.extension::<SubjectKeyIdentifier>()
            .ok()
            .flatten()
            .map(|ski| ski.0)
    }

    /// Checks that this certificate names `issuer` as its issuer and carries a
    /// valid signature made by the issuer's key.
    pub fn verify_issued_by(&self, issuer: &Certificate) -> Result<()> {
        if self.issuer_name() != issuer.subject_name() {
            return Err(CaError::CertificateBuild(format!(
                "issuer {} does not match {}",
                self.issuer_name(),
                issuer.subject_name()
            )));
        }
        if self.inner.signature_algorithm.oid != const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION
        {
            return Err(CaError::DecodingError(format!(
                "unsupported signature algorithm {}",
                self.inner.signature_algorithm.oid
            )));
        }
        let signature = self.inner.signature.as_bytes().ok_or_else(|| {
            CaError::DecodingError("signature has unused bits".to_string())
        })?;
        let tbs = self.inner.tbs_certificate.to_der()?;
        issuer.public_key()?.verify(&tbs, signature)
    }

    /// Creates a new self-signed certificate.
    ///
    /// # Arguments
    /// * `cert_info` - The certification request information.
    /// * `key` - The key pair used to sign the certificate.
    /// * `validity` - The validity window.
    /// * `serial_number` - Big-endian serial number bytes.
    pub fn new_self_signed(
        cert_info: &CertificationRequestInfo,
        key: &KeyPair,
        validity: Validity,
        serial_number: &[u8],
    ) -> Result<Self> {
        // For self-signed certificates, the issuer is the same as the subject
        let self_issuer = SelfIssuer {
            name: cert_info.subject.as_x509_name()?,
            key,
        };
        self_issuer.issue(cert_info, validity, serial_number)
    }
}

// Helper struct for self-signed certificates
struct SelfIssuer<'a> {
    name: Name,
    key: &'a KeyPair,
}

impl Issuer for SelfIssuer<'_> {
    fn issuer_name(&self) -> Name {
        self.name.clone()
    }

    fn signing_key(&self) -> &KeyPair {
        self.key
    }
}

/// A certificate together with the private key matching its public key.
#[derive(Debug, Clone)]
pub struct CertificateWithPrivateKey {
    pub cert: Certificate,
    pub key: KeyPair,
}

impl CertificateWithPrivateKey {
    /// Pairs `cert` with `key`, rejecting keys that do not match the certificate.
    pub fn new(cert: Certificate, key: KeyPair) -> Result<Self> {
        if cert.public_key()? != key.public_key() {
            return Err(CaError::DecodingError(
                "private key does not match certificate public key".to_string(),
            ));
        }
        Ok(Self { cert, key })
    }
}

impl Issuer for CertificateWithPrivateKey {
    fn issuer_name(&self) -> Name {
        // The name of the issuer is the subject of the certificate
        self.cert.subject_name().clone()
    }

    fn signing_key(&self) -> &KeyPair {
        &self.key
    }

    fn key_identifier(&self) -> Result<Vec<u8>> {
        match self.cert.subject_key_identifier() {
            Some(ski) => Ok(ski),
            None => crate::issuer::key_identifier_for(&self.key.public_key()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::extensions::{
        AuthorityKeyIdentifier, ExtendedKeyUsage, ExtendedKeyUsageOption, KeyUsage, KeyUsages,
        SubjectAltName,
    };
    use super::params::BACKDATE;
    use super::*;

    fn ca_with_key() -> CertificateWithPrivateKey {
        let key = KeyPair::generate_rsa(1024).unwrap();
        let info = CertificationRequestInfo::builder()
            .subject(
                DistinguishedName::builder()
                    .common_name("Test CA".to_string())
                    .organization("Test CA".to_string())
                    .build(),
            )
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
            Validity::backdated(time::Duration::days(365)).unwrap(),
            &[1],
        )
        .unwrap();
        CertificateWithPrivateKey::new(cert, key).unwrap()
    }

    #[test]
    fn test_self_signed_ca_shape() {
        let ca = ca_with_key();
        let cert = &ca.cert;

        assert!(cert.is_ca());
        assert_eq!(cert.serial_number(), vec![1]);
        assert_eq!(cert.subject_name(), cert.issuer_name());
        assert!(cert.subject_key_identifier().is_some());
        assert_eq!(
            cert.extension::<KeyUsage>().unwrap().unwrap(),
            KeyUsage(
                KeyUsages::DigitalSignature | KeyUsages::KeyEncipherment | KeyUsages::KeyCertSign
            )
        );
        let eku = cert.extension::<ExtendedKeyUsage>().unwrap().unwrap();
        assert_eq!(
            eku.usage,
            vec![
                ExtendedKeyUsageOption::ServerAuth,
                ExtendedKeyUsageOption::ClientAuth
            ]
        );
        assert!(cert.extension::<AuthorityKeyIdentifier>().unwrap().is_none());
        cert.verify_issued_by(cert).unwrap();

        let skew = OffsetDateTime::now_utc() - cert.not_before();
        assert!(skew >= BACKDATE - time::Duration::minutes(1));
    }

    #[test]
    fn test_issued_leaf_chains_to_ca() {
        let ca = ca_with_key();
        let leaf_key = KeyPair::generate_rsa(1024).unwrap();
        let info = CertificationRequestInfo::builder()
            .subject(
                DistinguishedName::builder()
                    .common_name("*.example.com".to_string())
                    .build(),
            )
            .subject_public_key(leaf_key.public_key())
            .usages(vec![ExtendedKeyUsageOption::ServerAuth])
            .dns_names(vec!["*.example.com".to_string()])
            .build();
        let leaf = ca
            .issue(&info, Validity::for_days(30).unwrap(), &[0x7f, 0x01])
            .unwrap();

        assert!(!leaf.is_ca());
        assert_eq!(leaf.issuer_name(), ca.cert.subject_name());
        leaf.verify_issued_by(&ca.cert).unwrap();
        assert_eq!(
            leaf.extension::<AuthorityKeyIdentifier>()
                .unwrap()
                .unwrap()
                .key_identifier,
            ca.cert.subject_key_identifier().unwrap()
        );
        assert_eq!(
            leaf.extension::<SubjectAltName>().unwrap().unwrap().names,
            vec!["*.example.com".to_string()]
        );
        assert_eq!(leaf.public_key().unwrap(), leaf_key.public_key());
    }

    #[test]
    fn test_leaf_does_not_verify_against_other_ca() {
        let ca = ca_with_key();
        let other = ca_with_key();
        let leaf_key = KeyPair::generate_rsa(1024).unwrap();
        let info = CertificationRequestInfo::builder()
            .subject(
                DistinguishedName::builder()
                    .common_name("Test CA".to_string())
                    .organization("Test CA".to_string())
                    .build(),
            )
            .subject_public_key(leaf_key.public_key())
            .build();
        let leaf = ca.issue(&info, Validity::for_days(1).unwrap(), &[2]).unwrap();
        // Same subject name, different key.
        assert!(leaf.verify_issued_by(&other.cert).is_err());
    }

    #[test]
    fn test_der_and_pem_round_trip() {
        let ca = ca_with_key();
        let der = ca.cert.to_der().unwrap();
        assert_eq!(Certificate::from_der(&der).unwrap(), ca.cert);
        let pem = ca.cert.to_pem().unwrap();
        assert_eq!(Certificate::from_pem(&pem).unwrap(), ca.cert);
    }

    #[test]
    fn test_mismatched_key_is_rejected() {
        let ca = ca_with_key();
        let stranger = KeyPair::generate_rsa(1024).unwrap();
        assert!(matches!(
            CertificateWithPrivateKey::new(ca.cert.clone(), stranger),
            Err(CaError::DecodingError(_))
        ));
    }
}
