use crate::error::{CaError, Result};

pub const CERTIFICATE_LABEL: &str = "CERTIFICATE";
pub const PRIVATE_KEY_LABEL: &str = "PRIVATE KEY";
pub const RSA_PRIVATE_KEY_LABEL: &str = "RSA PRIVATE KEY";

/// Convert DER‑encoded data into a PEM‑encoded string with the provided label.
pub fn der_to_pem(der: &[u8], label: &str) -> String {
    let pem = pem::Pem::new(label, der);
    pem::encode_config(
        &pem,
        pem::EncodeConfig::new().set_line_ending(pem::LineEnding::LF),
    )
}

/// Every PEM block in `data`, in file order.
pub fn parse_blocks(data: &[u8]) -> Result<Vec<pem::Pem>> {
    pem::parse_many(data).map_err(|e| CaError::DecodingError(e.to_string()))
}

pub fn is_private_key_label(label: &str) -> bool {
    label == PRIVATE_KEY_LABEL || label == RSA_PRIVATE_KEY_LABEL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks_keep_file_order() {
        let mut bundle = der_to_pem(&[1, 2, 3], CERTIFICATE_LABEL);
        bundle.push_str(&der_to_pem(&[4, 5], PRIVATE_KEY_LABEL));

        let blocks = parse_blocks(bundle.as_bytes()).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].tag(), CERTIFICATE_LABEL);
        assert_eq!(blocks[0].contents(), &[1, 2, 3]);
        assert_eq!(blocks[1].tag(), PRIVATE_KEY_LABEL);
        assert!(!bundle.contains('\r'));
    }
}
