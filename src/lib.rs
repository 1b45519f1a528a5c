//! # interceptca - Root CA and Leaf Issuance for TLS-Intercepting Proxies
//!
//! interceptca keeps a long-lived RSA root certificate authority on disk and
//! issues per-host leaf certificates on demand, caching each one as a single
//! PEM file. It is built entirely on rustcrypto libraries; OpenSSL is only used
//! by the test suite to cross-check the certificates it produces.
//!
//! ## Key Features
//!
//! - **Root CA store**: generates `<name>.key`/`<name>.crt` on first run and
//!   reloads them byte-for-byte afterwards
//! - **System trust**: best-effort import of the root into the macOS keychain
//!   or the Windows user `Root` store, behind the [`trust::TrustStore`] trait
//! - **Leaf cache**: one `<common name>.crt` file per issued name, written
//!   atomically, with at most one key generation per name under concurrency
//! - **Wildcard folding**: [`common_name::resolve`] maps `www.example.com` and
//!   `api.example.com` to the same `*.example.com` certificate
//! - **rustls-ready output**: leaves come back as [`rustls_pki_types`] DER values
//!
//! ## Quick Start
//!
//! ### Opening the Root CA and Issuing a Leaf
//!
//! ```rust,no_run
//! use interceptca::{config::CaConfig, root_ca::RootCa, trust::SystemTrustStore};
//!
//! # fn main() -> Result<(), interceptca::error::CaError> {
//! let config = CaConfig::builder()
//!     .name("My Proxy CA".to_string())
//!     .cert_dir("certs".into())
//!     .build();
//!
//! let ca = RootCa::open(&config, &SystemTrustStore::default())?;
//!
//! // `www.example.com` resolves to `*.example.com` and is cached under certs/
//! let identity = ca.issue_default("www.example.com")?;
//! println!("{}", identity.certificate.to_pem()?);
//! # Ok(())
//! # }
//! ```
//!
//! ### Building Certificates Directly
//!
//! The X.509 toolkit underneath the store is usable on its own.
//!
//! ```rust,no_run
//! use interceptca::{
//!     key::KeyPair,
//!     cert::{Certificate, CertificateWithPrivateKey, params::{CertificationRequestInfo, DistinguishedName, Validity}},
//!     issuer::Issuer,
//! };
//!
//! # fn main() -> Result<(), interceptca::error::CaError> {
//! let ca_key = KeyPair::generate_rsa(2048)?;
//! let ca_info = CertificationRequestInfo::builder()
//!     .subject(DistinguishedName::builder().common_name("Example CA".to_string()).build())
//!     .subject_public_key(ca_key.public_key())
//!     .is_ca(true)
//!     .build();
//! let ca_cert = Certificate::new_self_signed(&ca_info, &ca_key, Validity::for_days(365)?, &[1])?;
//! let ca = CertificateWithPrivateKey::new(ca_cert, ca_key)?;
//!
//! let server_key = KeyPair::generate_rsa(2048)?;
//! let server_info = CertificationRequestInfo::builder()
//!     .subject(DistinguishedName::builder().common_name("example.com".to_string()).build())
//!     .subject_public_key(server_key.public_key())
//!     .dns_names(vec!["example.com".to_string()])
//!     .build();
//! let server_cert = ca.issue(&server_info, Validity::for_days(90)?, &[2])?;
//! server_cert.verify_issued_by(&ca.cert)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Logging
//!
//! Everything is reported through [`tracing`]; install a subscriber to see it.
//! Trust-store failures are logged and never abort [`root_ca::RootCa::open`].

pub mod cert;
pub mod common_name;
pub mod config;
pub mod csr;
pub mod error;
pub mod issuer;
pub mod key;
pub mod leaf;
pub mod pem_utils;
pub mod root_ca;
pub mod tbs_certificate;
pub mod trust;

pub use config::CaConfig;
pub use error::{CaError, Result};
pub use leaf::LeafIdentity;
pub use root_ca::{IssuerMetrics, RootCa};
