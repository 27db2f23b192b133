#![forbid(unsafe_code)]

use anyhow::Result;
use lunchbot_sim::{SimulationConfig, Simulator};

fn main() -> Result<()> {
    let mut simulator = Simulator::new(SimulationConfig::default())?;
    let result = simulator.run()?;

    println!(
        "simulation complete: rounds={} pairs={} passed={} fingerprint={:016x}",
        result.rounds.len(),
        result.ledger_pairs,
        result.passed(),
        result.fingerprint
    );

    Ok(())
}
