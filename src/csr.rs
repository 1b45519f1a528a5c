//! PKCS#10 certification requests.
//!
//! Leaf issuance round-trips through a signed request so that the issued
//! certificate is built only from what a request can carry: a subject and a
//! public key, bound together by proof of possession.

use der::asn1::{BitString, SetOfVec};
use der::{Decode, Encode};
use x509_cert::request::{CertReq, CertReqInfo, Version};

use crate::cert::SignatureAlgorithm;
use crate::cert::params::DistinguishedName;
use crate::error::{CaError, Result};
use crate::key::{KeyPair, PublicKey};

/// A DER-encodable PKCS#10 request signed with SHA-256/RSA.
#[derive(Debug, Clone)]
pub struct CertificationRequest {
    pub inner: CertReq,
}

impl CertificationRequest {
    /// Builds and signs a request for `subject` with `key`.
    pub fn new(subject: &DistinguishedName, key: &KeyPair) -> Result<Self> {
        let info = CertReqInfo {
            version: Version::V1,
            subject: subject.as_x509_name()?,
            public_key: key.as_spki()?,
            attributes: SetOfVec::new(),
        };
        let info_der = info
            .to_der()
            .map_err(|e| CaError::EncodingError(e.to_string()))?;
        let signature = key.sign_data(&info_der)?;

        Ok(Self {
            inner: CertReq {
                info,
                algorithm: SignatureAlgorithm::Sha256WithRSA.into(),
                signature: BitString::from_bytes(&signature)?,
            },
        })
    }

    pub fn from_der(der: &[u8]) -> Result<Self> {
        Ok(Self {
            inner: CertReq::from_der(der)?,
        })
    }

    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.inner
            .to_der()
            .map_err(|e| CaError::EncodingError(e.to_string()))
    }

    pub fn subject(&self) -> Result<DistinguishedName> {
        DistinguishedName::from_x509_name(&self.inner.info.subject)
    }

    pub fn public_key(&self) -> Result<PublicKey> {
        PublicKey::from_x509spki(&self.inner.info.public_key)
    }

    /// Checks the request's proof of possession.
    pub fn verify(&self) -> Result<()> {
        if self.inner.algorithm.oid != const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION {
            return Err(CaError::DecodingError(format!(
                "unsupported request signature algorithm {}",
                self.inner.algorithm.oid
            )));
        }
        let signature = self.inner.signature.as_bytes().ok_or_else(|| {
            CaError::DecodingError("request signature has unused bits".to_string())
        })?;
        let info_der = self.inner.info.to_der()?;
        self.public_key()?.verify(&info_der, signature)
    }
}
