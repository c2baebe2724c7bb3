//! Opaque handle and proof types exchanged with the confidential backend.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Reference to an encrypted value held by the backend.
///
/// Handles can be combined through [`crate::ConfidentialBackend`] but never
/// inspected locally.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ciphertext([u8; 32]);

impl Ciphertext {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl Serialize for Ciphertext {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.collect_str(self)
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for Ciphertext {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let text = String::deserialize(deserializer)?;
            let raw = hex::decode(&text).map_err(serde::de::Error::custom)?;
            let bytes: [u8; 32] = raw
                .try_into()
                .map_err(|_| serde::de::Error::custom("ciphertext handle must be 32 bytes"))?;
            Ok(Self(bytes))
        } else {
            <[u8; 32]>::deserialize(deserializer).map(Self)
        }
    }
}

impl fmt::Debug for Ciphertext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ciphertext({})", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for Ciphertext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Client-produced ciphertext blob, not yet validated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedInput(pub Vec<u8>);

/// Zero-knowledge proof accompanying a batch of [`EncryptedInput`]s.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputProof(pub Vec<u8>);

/// Proof that a set of plaintexts is the decryption of a set of handles.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptionProof(pub Vec<u8>);

/// Statement an [`InputProof`] must attest about its batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputConstraint {
    /// Every value fits in `bits` bits.
    Bits(u8),
    /// Every value fits in `bits` bits and is strictly below `bound`.
    LessThan { bits: u8, bound: u128 },
    /// Every value fits in `bits` bits and the batch sums to `total`.
    SumEquals { bits: u8, total: u128 },
}

impl InputConstraint {
    pub fn bits(&self) -> u8 {
        match *self {
            Self::Bits(bits) | Self::LessThan { bits, .. } | Self::SumEquals { bits, .. } => bits,
        }
    }

    /// Whether `values` satisfy this constraint.
    ///
    /// Backends that hold plaintexts (simulators) use this directly; real
    /// backends rely on proof soundness instead.
    pub fn is_satisfied_by(&self, values: &[u128]) -> bool {
        let bits = self.bits();
        let fits = |v: u128| bits >= 128 || v < (1u128 << bits);
        if !values.iter().all(|v| fits(*v)) {
            return false;
        }
        match *self {
            Self::Bits(_) => true,
            Self::LessThan { bound, .. } => values.iter().all(|v| *v < bound),
            Self::SumEquals { total, .. } => values
                .iter()
                .try_fold(0u128, |acc, v| acc.checked_add(*v))
                .map_or(false, |sum| sum == total),
        }
    }

    /// Stable byte encoding, bound into input proofs.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(18);
        match *self {
            Self::Bits(bits) => {
                out.push(0);
                out.push(bits);
            }
            Self::LessThan { bits, bound } => {
                out.push(1);
                out.push(bits);
                out.extend_from_slice(&bound.to_be_bytes());
            }
            Self::SumEquals { bits, total } => {
                out.push(2);
                out.push(bits);
                out.extend_from_slice(&total.to_be_bytes());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_constraint() {
        let c = InputConstraint::Bits(8);
        assert!(c.is_satisfied_by(&[0, 255]));
        assert!(!c.is_satisfied_by(&[256]));
    }

    #[test]
    fn test_less_than_constraint() {
        let c = InputConstraint::LessThan { bits: 8, bound: 3 };
        assert!(c.is_satisfied_by(&[2]));
        assert!(!c.is_satisfied_by(&[3]));
    }

    #[test]
    fn test_sum_constraint() {
        let c = InputConstraint::SumEquals { bits: 8, total: 100 };
        assert!(c.is_satisfied_by(&[60, 30, 10]));
        assert!(!c.is_satisfied_by(&[60, 30, 20]));
        assert!(!c.is_satisfied_by(&[]));
    }

    #[test]
    fn test_wide_bits_never_overflow() {
        let c = InputConstraint::Bits(128);
        assert!(c.is_satisfied_by(&[u128::MAX]));
    }

    #[test]
    fn test_constraint_encodings_differ() {
        let a = InputConstraint::Bits(8).to_bytes();
        let b = InputConstraint::LessThan { bits: 8, bound: 0 }.to_bytes();
        assert_ne!(a, b);
    }
}
