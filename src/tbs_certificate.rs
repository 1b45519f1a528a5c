use std::time::SystemTime;

use der::asn1::OctetString;
use x509_cert::Version;
use x509_cert::certificate::TbsCertificateInner;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;

use crate::cert::SignatureAlgorithm;
use crate::cert::params::ExtensionParam;
use crate::error::{CaError, Result};
use crate::key::PublicKey;

/// Represents the "To Be Signed" (TBS) portion of an X.509 certificate.
///
/// Names are kept in their encoded form so that a leaf's issuer matches the
/// CA's subject byte for byte, even for CA certificates loaded from disk.
///
/// # Fields
/// * `serial_number` - Big-endian, unsigned serial number bytes.
/// * `signature_algorithm` - The algorithm used to sign the certificate.
/// * `issuer` - The distinguished name of the certificate issuer.
/// * `not_before` - The start of the certificate's validity period.
/// * `not_after` - The end of the certificate's validity period.
/// * `subject` - The distinguished name of the certificate subject.
/// * `subject_public_key` - The public key of the certificate subject.
/// * `extensions` - Additional X.509 extensions for the certificate.
pub struct TbsCertificate {
    pub serial_number: Vec<u8>,
    pub signature_algorithm: SignatureAlgorithm,
    pub issuer: Name,
    pub not_before: time::OffsetDateTime,
    pub not_after: time::OffsetDateTime,
    pub subject: Name,
    pub subject_public_key: PublicKey,
    pub extensions: Vec<ExtensionParam>,
}

impl TbsCertificate {
    /// Converts the `TbsCertificate` into a `TbsCertificateInner` for DER encoding.
    pub fn to_tbs_certificate_inner(&self) -> Result<TbsCertificateInner> {
        let algorithm_id: x509_cert::spki::AlgorithmIdentifierOwned =
            self.signature_algorithm.clone().into();

        let extensions = self
            .extensions
            .iter()
            .map(|ext| -> Result<x509_cert::ext::Extension> {
                Ok(x509_cert::ext::Extension {
                    extn_id: ext.oid,
                    critical: ext.critical,
                    extn_value: OctetString::new(ext.value.clone())?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        // UTCTime before 2050, GeneralizedTime after.
        let validity = x509_cert::time::Validity {
            not_before: x509_cert::time::Time::try_from(SystemTime::from(self.not_before))?,
            not_after: x509_cert::time::Time::try_from(SystemTime::from(self.not_after))?,
        };

        let serial_number = SerialNumber::new(&positive_integer_bytes(&self.serial_number))
            .map_err(|e| CaError::CertificateBuild(format!("invalid serial number: {e}")))?;

        Ok(TbsCertificateInner {
            version: Version::V3,
            serial_number,
            signature: algorithm_id,
            issuer: self.issuer.clone(),
            validity,
            subject: self.subject.clone(),
            subject_public_key_info: self.subject_public_key.to_spki()?,
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: if extensions.is_empty() {
                None
            } else {
                Some(extensions)
            },
        })
    }
}

/// Minimal two's-complement encoding of an unsigned big-endian integer.
fn positive_integer_bytes(raw: &[u8]) -> Vec<u8> {
    let first_significant = raw.iter().position(|b| *b != 0).unwrap_or(raw.len());
    let trimmed = &raw[first_significant..];
    match trimmed.first() {
        None => vec![0],
        Some(b) if b & 0x80 != 0 => {
            let mut padded = Vec::with_capacity(trimmed.len() + 1);
            padded.push(0);
            padded.extend_from_slice(trimmed);
            padded
        }
        Some(_) => trimmed.to_vec(),
    }
}
