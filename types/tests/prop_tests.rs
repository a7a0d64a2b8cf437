use proptest::prelude::*;

use parlay_types::{Timestamp, TokenAmount, UsdAmount, UserId};

proptest! {
    /// UsdAmount cents roundtrip.
    #[test]
    fn usd_cents_roundtrip(cents in 0u64..u64::MAX) {
        let amount = UsdAmount::from_cents(cents);
        prop_assert_eq!(amount.cents(), cents);
    }

    /// from_dollars is exactly 100x cents.
    #[test]
    fn usd_dollars_scale(dollars in 0u64..u64::MAX / 100) {
        let amount = UsdAmount::from_dollars(dollars);
        prop_assert_eq!(amount.cents(), dollars * 100);
    }

    /// checked_add(a, b) == Some(a + b) when no overflow.
    #[test]
    fn usd_checked_add(a in 0u64..u64::MAX / 2, b in 0u64..u64::MAX / 2) {
        let sum = UsdAmount::from_cents(a).checked_add(UsdAmount::from_cents(b));
        prop_assert_eq!(sum, Some(UsdAmount::from_cents(a + b)));
    }

    /// checked_sub returns None exactly when b > a.
    #[test]
    fn usd_checked_sub_underflow(a in 0u64..1_000_000, b in 0u64..1_000_000) {
        let result = UsdAmount::from_cents(a).checked_sub(UsdAmount::from_cents(b));
        if b > a {
            prop_assert!(result.is_none());
        } else {
            prop_assert_eq!(result, Some(UsdAmount::from_cents(a - b)));
        }
    }

    /// saturating_sub never panics and floors at ZERO.
    #[test]
    fn usd_saturating_sub(a in 0u64..1_000_000, b in 0u64..1_000_000) {
        let result = UsdAmount::from_cents(a).saturating_sub(UsdAmount::from_cents(b));
        if b > a {
            prop_assert_eq!(result, UsdAmount::ZERO);
        } else {
            prop_assert_eq!(result, UsdAmount::from_cents(a - b));
        }
    }

    /// checked_double agrees with checked_add of self.
    #[test]
    fn usd_double_is_self_add(cents in 0u64..u64::MAX) {
        let amount = UsdAmount::from_cents(cents);
        prop_assert_eq!(amount.checked_double(), amount.checked_add(amount));
    }

    /// Amount ordering matches the underlying integer ordering.
    #[test]
    fn usd_ordering(a in 0u64..u64::MAX, b in 0u64..u64::MAX) {
        prop_assert_eq!(
            UsdAmount::from_cents(a) <= UsdAmount::from_cents(b),
            a <= b
        );
    }

    /// TokenAmount checked arithmetic mirrors u64 semantics.
    #[test]
    fn token_checked_ops(a in 0u64..u64::MAX / 2, b in 0u64..u64::MAX / 2) {
        let ta = TokenAmount::new(a);
        let tb = TokenAmount::new(b);
        prop_assert_eq!(ta.checked_add(tb), Some(TokenAmount::new(a + b)));
        if b > a {
            prop_assert!(ta.checked_sub(tb).is_none());
        } else {
            prop_assert_eq!(ta.checked_sub(tb), Some(TokenAmount::new(a - b)));
        }
    }

    /// UsdAmount bincode serialization roundtrip.
    #[test]
    fn usd_bincode_roundtrip(cents in 0u64..u64::MAX) {
        let amount = UsdAmount::from_cents(cents);
        let encoded = bincode::serialize(&amount).unwrap();
        let decoded: UsdAmount = bincode::deserialize(&encoded).unwrap();
        prop_assert_eq!(decoded, amount);
    }

    /// UserId bincode serialization roundtrip.
    #[test]
    fn user_id_bincode_roundtrip(raw in "[a-z0-9-]{1,40}") {
        let id = UserId::new(raw.clone());
        let encoded = bincode::serialize(&id).unwrap();
        let decoded: UserId = bincode::deserialize(&encoded).unwrap();
        prop_assert_eq!(decoded.as_str(), raw.as_str());
    }

    /// Timestamp elapsed_until: later - earlier, saturating at zero.
    #[test]
    fn timestamp_elapsed(base in 0u64..1_000_000_000, offset in 0u64..1_000_000_000) {
        let t = Timestamp::from_millis(base);
        let later = Timestamp::from_millis(base + offset);
        prop_assert_eq!(t.elapsed_until(later), offset);
        prop_assert_eq!(later.elapsed_until(t), 0);
    }
}
