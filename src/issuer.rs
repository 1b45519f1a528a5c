use der::Encode;
use der::flagset::FlagSet;
use sha1::Sha1;
use x509_cert::certificate::CertificateInner;
use x509_cert::name::Name;

use crate::cert::Certificate;
use crate::cert::SignatureAlgorithm;
use crate::cert::extensions::AuthorityKeyIdentifier;
use crate::cert::extensions::BasicConstraints;
use crate::cert::extensions::ExtendedKeyUsage;
use crate::cert::extensions::ExtendedKeyUsageOption;
use crate::cert::extensions::KeyUsage;
use crate::cert::extensions::KeyUsages;
use crate::cert::extensions::SubjectAltName;
use crate::cert::extensions::SubjectKeyIdentifier;
use crate::cert::params::Validity;
use crate::cert::params::{CertificationRequestInfo, ExtensionParam};
use crate::error::{CaError, Result};
use crate::key::{KeyPair, PublicKey};
use crate::tbs_certificate::TbsCertificate;

/// Represents an entity capable of issuing certificates.
///
/// This trait provides methods to retrieve issuer details and issue certificates.
pub trait Issuer {
    /// Returns the encoded distinguished name placed in the `issuer` field.
    fn issuer_name(&self) -> Name;

    /// Returns the signing key of the issuer.
    fn signing_key(&self) -> &KeyPair;

    /// Key identifier written into the authority key identifier of issued
    /// certificates.
    fn key_identifier(&self) -> Result<Vec<u8>> {
        key_identifier_for(&self.signing_key().public_key())
    }

    /// Issues a certificate based on the provided certification request information.
    ///
    /// Key usage combines the request's explicit flags with those implied by
    /// its extended key usages, plus `keyCertSign` for CA requests. Requests
    /// whose key differs from the signing key get an authority key identifier.
    ///
    /// # Arguments
    /// * `cert_request` - Subject, public key and usages of the certificate to issue.
    /// * `validity` - The validity window.
    /// * `serial_number` - Big-endian serial number bytes.
    fn issue(
        &self,
        cert_request: &CertificationRequestInfo,
        validity: Validity,
        serial_number: &[u8],
    ) -> Result<Certificate> {
        let signature_algo = SignatureAlgorithm::Sha256WithRSA;
        let self_signed = cert_request.subject_public_key == self.signing_key().public_key();

        let mut extensions: Vec<ExtensionParam> = Vec::new();

        if cert_request.is_ca {
            let basic_constraints = BasicConstraints {
                is_ca: true,
                max_path_length: None,
            };
            extensions.push(ExtensionParam::from_extension(basic_constraints, true)?);
            let ski = SubjectKeyIdentifier(key_identifier_for(&cert_request.subject_public_key)?);
            extensions.push(ExtensionParam::from_extension(ski, false)?);
        }

        if !self_signed {
            let authority_key_id = AuthorityKeyIdentifier {
                key_identifier: self.key_identifier()?,
            };
            extensions.push(ExtensionParam::from_extension(authority_key_id, false)?);
        }

        let mut key_usage_flags: FlagSet<KeyUsages> = cert_request.key_usage;

        if cert_request.is_ca {
            key_usage_flags |= KeyUsages::KeyCertSign;
        }

        for usage in &cert_request.usages {
            match usage {
                ExtendedKeyUsageOption::ClientAuth | ExtendedKeyUsageOption::ServerAuth => {
                    key_usage_flags |= KeyUsages::KeyEncipherment;
                    key_usage_flags |= KeyUsages::DigitalSignature;
                }
            }
        }

        if !key_usage_flags.is_empty() {
            let key_usage = KeyUsage(key_usage_flags);
            extensions.push(ExtensionParam::from_extension(key_usage, true)?);
        }

        if !cert_request.usages.is_empty() {
            let extended_key_usage = ExtendedKeyUsage {
                usage: cert_request.usages.clone(),
            };
            extensions.push(ExtensionParam::from_extension(extended_key_usage, false)?);
        }

        if !cert_request.dns_names.is_empty() {
            let san = SubjectAltName {
                names: cert_request.dns_names.clone(),
            };
            extensions.push(ExtensionParam::from_extension(san, false)?);
        }

        let combined_extensions = extensions
            .into_iter()
            .chain(cert_request.extensions.iter().cloned())
            .collect();

        let tbs_cert = TbsCertificate {
            serial_number: serial_number.to_vec(),
            signature_algorithm: signature_algo.clone(),
            issuer: self.issuer_name(),
            not_before: validity.not_before,
            not_after: validity.not_after,
            subject: cert_request.subject.as_x509_name()?,
            subject_public_key: cert_request.subject_public_key.clone(),
            extensions: combined_extensions,
        };

        let tbs_cert_inner = tbs_cert.to_tbs_certificate_inner()?;
        let tbs_der = tbs_cert_inner
            .to_der()
            .map_err(|e| CaError::EncodingError(e.to_string()))?;

        let signature = self.signing_key().sign_data(&tbs_der)?;

        let cert_inner = CertificateInner {
            tbs_certificate: tbs_cert_inner,
            signature_algorithm: signature_algo.into(),
            signature: der::asn1::BitString::from_bytes(&signature)?,
        };

        Ok(Certificate { inner: cert_inner })
    }
}

/// RFC 5280 §4.2.1.2 method (1): SHA-1 over the subjectPublicKey bit string.
pub fn key_identifier_for(public_key: &PublicKey) -> Result<Vec<u8>> {
    let spki = public_key.to_spki()?;
    let key_id = <Sha1 as sha1::Digest>::digest(spki.subject_public_key.raw_bytes());
    Ok(key_id.to_vec())
}
