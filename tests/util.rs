#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use interceptca::config::CaConfig;
use interceptca::error::{CaError, Result};
use interceptca::key::{KeyPair, KeySource, OsRngKeySource};
use interceptca::root_ca::RootCa;
use interceptca::trust::NoopTrustStore;

pub const TEST_KEY_BITS: usize = 1024;

/// Counts every key it hands out.
#[derive(Debug, Default)]
pub struct CountingKeySource {
    generated: AtomicUsize,
}

impl CountingKeySource {
    pub fn generated(&self) -> usize {
        self.generated.load(Ordering::SeqCst)
    }
}

impl KeySource for CountingKeySource {
    fn generate_rsa(&self, bits: usize) -> Result<KeyPair> {
        self.generated.fetch_add(1, Ordering::SeqCst);
        OsRngKeySource.generate_rsa(bits)
    }
}

/// Generates keys until told to fail.
#[derive(Debug, Default)]
pub struct FlakyKeySource {
    failing: AtomicBool,
}

impl FlakyKeySource {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl KeySource for FlakyKeySource {
    fn generate_rsa(&self, bits: usize) -> Result<KeyPair> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CaError::KeyGeneration("entropy source unavailable".to_string()));
        }
        OsRngKeySource.generate_rsa(bits)
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn test_config(dir: &Path) -> CaConfig {
    CaConfig::builder()
        .name("Integration Test CA".to_string())
        .key_bits(TEST_KEY_BITS)
        .leaf_key_bits(TEST_KEY_BITS)
        .ca_dir(dir)
        .cert_dir(dir.join("certs"))
        .build()
}

pub fn open_ca(dir: &Path) -> RootCa {
    init_tracing();
    RootCa::open(&test_config(dir), &NoopTrustStore).unwrap()
}

pub fn open_counting_ca(dir: &Path) -> (Arc<RootCa>, Arc<CountingKeySource>) {
    init_tracing();
    let keys = Arc::new(CountingKeySource::default());
    let ca = RootCa::open_with_key_source(&test_config(dir), &NoopTrustStore, keys.clone()).unwrap();
    (Arc::new(ca), keys)
}

pub fn open_flaky_ca(dir: &Path) -> (Arc<RootCa>, Arc<FlakyKeySource>) {
    init_tracing();
    let keys = Arc::new(FlakyKeySource::default());
    let ca = RootCa::open_with_key_source(&test_config(dir), &NoopTrustStore, keys.clone()).unwrap();
    (Arc::new(ca), keys)
}
