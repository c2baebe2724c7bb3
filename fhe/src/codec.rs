//! Wire encoding of revealed plaintext totals.

use crate::error::FheError;

/// Encode plaintext totals as delivered by the decryption oracle.
pub fn encode_totals(totals: &[u128]) -> Result<Vec<u8>, FheError> {
    bincode::serialize(totals).map_err(|e| FheError::Codec(e.to_string()))
}

/// Decode plaintext totals received in an oracle callback.
pub fn decode_totals(bytes: &[u8]) -> Result<Vec<u128>, FheError> {
    bincode::deserialize(bytes).map_err(|e| FheError::Codec(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_totals_roundtrip() {
        let totals = vec![1000u128, 1300, 700];
        let bytes = encode_totals(&totals).unwrap();
        assert_eq!(decode_totals(&bytes).unwrap(), totals);
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(decode_totals(&[0xff, 0x01]), Err(FheError::Codec(_))));
    }
}
