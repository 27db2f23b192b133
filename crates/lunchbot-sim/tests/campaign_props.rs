use lunchbot_sim::campaign::{CampaignConfig, collect_violations, replay_seed, run_campaign};
use lunchbot_sim::{SimulationConfig, Simulator};
use proptest::prelude::*;

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(24))]

    #[test]
    fn any_seed_and_shape_upholds_invariants(
        seed in any::<u64>(),
        people in 1_usize..40,
        group_size in 1_usize..8,
        attendance in 0_u8..=100,
        late in 0_u8..=30,
    ) {
        let config = SimulationConfig {
            seed,
            people,
            rounds: 5,
            attendance_percent: attendance,
            late_percent: late,
            group_size,
            samples: 3,
            payer_percent: 30,
        };
        let result = Simulator::new(config).expect("valid config").run().expect("run");
        let violations = result
            .rounds
            .iter()
            .flat_map(|r| r.oracle.violations.clone())
            .collect::<Vec<_>>();
        prop_assert!(violations.is_empty(), "{:?}", violations);
    }
}

#[test]
fn campaign_report_serializes() {
    let config = CampaignConfig {
        seed_range: 10..13,
        rounds: 3,
        samples: 2,
        ..CampaignConfig::default()
    };
    let report = run_campaign(&config).expect("campaign");
    let json = serde_json::to_value(&report).expect("serialize");
    assert_eq!(json["seeds_run"], 3);
    assert_eq!(json["first_failure"], serde_json::Value::Null);
}

#[test]
fn replayed_rounds_serialize_with_dates() {
    let config = CampaignConfig {
        rounds: 2,
        ..CampaignConfig::default()
    };
    let result = replay_seed(7, &config).expect("replay");
    assert!(collect_violations(&result).is_empty());
    let json = serde_json::to_value(&result).expect("serialize");
    assert_eq!(json["rounds"][0]["date"], "2024-01-03T00:00:00Z");
    assert_eq!(json["rounds"][1]["date"], "2024-01-10T00:00:00Z");
}
