//! Opens (or creates) a root CA in the working directory and issues a leaf for
//! every host given on the command line.
//!
//! ```text
//! cargo run --example issue -- www.example.com api.example.com
//! ```

use interceptca::config::CaConfig;
use interceptca::root_ca::RootCa;
use interceptca::trust::NoopTrustStore;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let ca = RootCa::open(&CaConfig::default(), &NoopTrustStore)?;
    println!("root CA: {}", ca.cert_path().display());

    for host in std::env::args().skip(1) {
        let identity = ca.issue_default(&host)?;
        println!(
            "{host}: {} (serial {})",
            identity.certificate.subject_name(),
            hex(&identity.certificate.serial_number())
        );
    }
    println!("{:?}", ca.metrics());
    Ok(())
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
