use der::Encode;
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::error::{CaError, Result};

/// An RSA key pair used for certificate signing and TLS identities.
#[derive(Clone, Debug)]
pub struct KeyPair {
    private: Box<RsaPrivateKey>,
    public: RsaPublicKey,
}

impl KeyPair {
    /// Generate an RSA key pair with the specified number of bits.
    pub fn generate_rsa(bits: usize) -> Result<Self> {
        let mut rng = rand_core::OsRng;
        let private = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| CaError::KeyGeneration(format!("{bits}-bit RSA: {e}")))?;
        Ok(Self::from_private(private))
    }

    fn from_private(private: RsaPrivateKey) -> Self {
        let public = RsaPublicKey::from(&private);
        KeyPair {
            private: Box::new(private),
            public,
        }
    }

    /// Import a PKCS#1 `RSAPrivateKey`, falling back to PKCS#8 `PrivateKeyInfo`.
    pub fn import_from_der(der: &[u8]) -> Result<Self> {
        let private = match RsaPrivateKey::from_pkcs1_der(der) {
            Ok(private) => private,
            Err(pkcs1_err) => RsaPrivateKey::from_pkcs8_der(der).map_err(|pkcs8_err| {
                CaError::DecodingError(format!(
                    "not a PKCS#1 ({pkcs1_err}) or PKCS#8 ({pkcs8_err}) RSA private key"
                ))
            })?,
        };
        Ok(Self::from_private(private))
    }

    /// PKCS#1 DER encoding of the private key.
    pub fn to_pkcs1_der(&self) -> Result<Vec<u8>> {
        let document = self
            .private
            .to_pkcs1_der()
            .map_err(|e| CaError::EncodingError(e.to_string()))?;
        Ok(document.as_bytes().to_vec())
    }

    /// Modulus size in bits.
    pub fn bits(&self) -> usize {
        self.public.size() * 8
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.public.clone())
    }

    pub fn as_spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        self.public_key().to_spki()
    }

    /// Signs `data` with RSASSA-PKCS1-v1_5 over SHA-256.
    pub fn sign_data(&self, data: &[u8]) -> Result<Vec<u8>> {
        let signing_key = SigningKey::<Sha256>::new((*self.private).clone());
        let signature = signing_key
            .try_sign(data)
            .map_err(|e| CaError::CertificateBuild(format!("RSA signing failed: {e}")))?;
        Ok(signature.to_vec())
    }
}

/// The public half of an RSA key pair, as carried in certificates and requests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKey(RsaPublicKey);

impl PublicKey {
    pub fn from_key_pair(key_pair: &KeyPair) -> Self {
        key_pair.public_key()
    }

    /// Extracts an RSA public key from a `SubjectPublicKeyInfo`.
    ///
    /// Non-RSA keys are rejected with [`CaError::DecodingError`].
    pub fn from_x509spki(spki: &SubjectPublicKeyInfoOwned) -> Result<Self> {
        let der = spki.to_der()?;
        let public = RsaPublicKey::from_public_key_der(&der)
            .map_err(|e| CaError::DecodingError(format!("unsupported public key: {e}")))?;
        Ok(PublicKey(public))
    }

    pub fn to_spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        SubjectPublicKeyInfoOwned::from_key(self.0.clone())
            .map_err(|e| CaError::EncodingError(e.to_string()))
    }

    /// Checks an RSASSA-PKCS1-v1_5/SHA-256 signature over `data`.
    pub fn verify(&self, data: &[u8], signature: &[u8]) -> Result<()> {
        let verifying_key = VerifyingKey::<Sha256>::new(self.0.clone());
        let signature = Signature::try_from(signature)
            .map_err(|e| CaError::DecodingError(format!("malformed signature: {e}")))?;
        verifying_key
            .verify(data, &signature)
            .map_err(|e| CaError::CertificateBuild(format!("signature verification failed: {e}")))
    }
}

/// Source of fresh RSA key material.
///
/// Leaf issuance goes through this trait so embedders can pool keys or count
/// generations.
pub trait KeySource: Send + Sync {
    fn generate_rsa(&self, bits: usize) -> Result<KeyPair>;
}

/// Generates keys from the operating system RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRngKeySource;

impl KeySource for OsRngKeySource {
    fn generate_rsa(&self, bits: usize) -> Result<KeyPair> {
        KeyPair::generate_rsa(bits)
    }
}
