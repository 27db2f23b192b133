use chrono::{DateTime, Duration, TimeZone, Utc};
use lunchbot_core::{PairingLedger, PersonId};
use proptest::prelude::*;

const NAMES: [&str; 6] = ["ana", "ben", "cho", "dev", "eli", "fay"];

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).single().expect("valid date")
}

fn person(idx: usize) -> PersonId {
    PersonId::from(NAMES[idx])
}

fn arb_ledger() -> impl Strategy<Value = PairingLedger> {
    let entry = (0..NAMES.len(), 0..NAMES.len(), 0_i64..200);
    (prop::collection::vec(entry, 0..20), 0_i64..30).prop_map(|(entries, floor)| {
        let mut ledger = PairingLedger::new(base() + Duration::days(floor));
        for (a, b, offset) in entries {
            if a != b {
                ledger
                    .set(&person(a), &person(b), base() + Duration::days(offset))
                    .expect("distinct people");
            }
        }
        ledger
    })
}

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(256))]

    #[test]
    fn lookups_are_symmetric(ledger in arb_ledger(), a in 0..NAMES.len(), b in 0..NAMES.len()) {
        prop_assume!(a != b);
        prop_assert_eq!(
            ledger.get(&person(a), &person(b)).expect("distinct"),
            ledger.get(&person(b), &person(a)).expect("distinct")
        );
    }

    #[test]
    fn merge_commutative(a in arb_ledger(), b in arb_ledger()) {
        prop_assert_eq!(a.merge(&b), b.merge(&a));
    }

    #[test]
    fn merge_associative(a in arb_ledger(), b in arb_ledger(), c in arb_ledger()) {
        prop_assert_eq!(a.merge(&b).merge(&c), a.merge(&b.merge(&c)));
    }

    #[test]
    fn merge_idempotent(a in arb_ledger()) {
        prop_assert_eq!(a.merge(&a), a);
    }

    #[test]
    fn merge_never_forgets_a_meeting(a in arb_ledger(), b in arb_ledger()) {
        let merged = a.merge(&b);
        for (x, y, date) in a.pairs().chain(b.pairs()) {
            prop_assert!(merged.get(x, y).expect("distinct") >= date);
        }
    }

    #[test]
    fn json_round_trip(ledger in arb_ledger()) {
        let json = serde_json::to_string(&ledger).expect("serialize");
        let back: PairingLedger = serde_json::from_str(&json).expect("deserialize");
        prop_assert_eq!(back, ledger);
    }

    #[test]
    fn set_max_is_monotone(ledger in arb_ledger(), a in 0..NAMES.len(), b in 0..NAMES.len(), offset in 0_i64..200) {
        prop_assume!(a != b);
        let mut updated = ledger.clone();
        let before = ledger.get(&person(a), &person(b)).expect("distinct");
        updated.set_max(&person(a), &person(b), base() + Duration::days(offset)).expect("distinct");
        let after = updated.get(&person(a), &person(b)).expect("distinct");
        prop_assert!(after >= before);
        prop_assert!(after >= base() + Duration::days(offset));
    }
}
