use proptest::prelude::*;

use ciphervote_types::{Address, ProposalId, Timestamp};

proptest! {
    /// Address text form parses back to the same bytes.
    #[test]
    fn address_display_roundtrip(bytes in prop::array::uniform20(0u8..)) {
        let addr = Address::from_bytes(bytes);
        let parsed: Address = addr.to_string().parse().unwrap();
        prop_assert_eq!(parsed, addr);
    }

    /// Address::is_zero is true only for all-zero bytes.
    #[test]
    fn address_is_zero_correct(bytes in prop::array::uniform20(0u8..)) {
        prop_assert_eq!(Address::from_bytes(bytes).is_zero(), bytes == [0u8; 20]);
    }

    /// Escrow addresses are injective over proposal ids.
    #[test]
    fn escrow_address_injective(a in 0u64..u64::MAX, b in 0u64..u64::MAX) {
        let ea = ProposalId::new(a).escrow_address();
        let eb = ProposalId::new(b).escrow_address();
        prop_assert_eq!(ea == eb, a == b);
    }

    /// Timestamp ordering: new(a) <= new(b) iff a <= b.
    #[test]
    fn timestamp_ordering(a in 0u64..u64::MAX, b in 0u64..u64::MAX) {
        let ta = Timestamp::new(a);
        let tb = Timestamp::new(b);
        prop_assert_eq!(ta <= tb, a <= b);
        prop_assert_eq!(ta == tb, a == b);
    }

    /// Timestamp bincode serialization roundtrip.
    #[test]
    fn timestamp_bincode_roundtrip(secs in 0u64..u64::MAX) {
        let ts = Timestamp::new(secs);
        let encoded = bincode::serialize(&ts).unwrap();
        let decoded: Timestamp = bincode::deserialize(&encoded).unwrap();
        prop_assert_eq!(decoded, ts);
    }

    /// elapsed_since never underflows.
    #[test]
    fn elapsed_since_saturates(a in 0u64..u64::MAX, b in 0u64..u64::MAX) {
        let elapsed = Timestamp::new(a).elapsed_since(Timestamp::new(b));
        prop_assert_eq!(elapsed, b.saturating_sub(a));
    }
}
