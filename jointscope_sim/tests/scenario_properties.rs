//! Seed sweeps over the replay scenarios.

use jointscope_core::ingest::parse_movement;
use jointscope_sim::scenarios::ScenarioId;
use jointscope_sim::{write_csv, MotionGenerator, ScenarioRunner};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn playback_scenarios_hold_for_any_seed(seed in any::<u64>()) {
        let runner = ScenarioRunner::new(seed);
        for scenario in [ScenarioId::EndOfData, ScenarioId::PauseResume, ScenarioId::Seek] {
            let result = runner.run(scenario);
            prop_assert!(result.passed, "{} seed={}: {:?}", scenario, seed, result.failure_reason);
        }
    }

    #[test]
    fn generated_recordings_parse_back(
        seed in any::<u64>(),
        frames in 1usize..200,
        dropout in 0.0f64..0.3,
    ) {
        let series = MotionGenerator::new(seed).with_dropout(dropout).generate(frames);
        let mut buf = Vec::new();
        write_csv(&series, &mut buf).unwrap();

        let (parsed, report) = parse_movement(buf.as_slice()).unwrap();
        prop_assert_eq!(parsed.len(), frames);
        prop_assert_eq!(report.unparseable_cells, series.missing_samples());
        prop_assert_eq!(parsed.channels(), series.channels());
    }
}

#[test]
fn every_scenario_passes_on_a_few_seeds() {
    for seed in 100..104 {
        let runner = ScenarioRunner::new(seed);
        for scenario in ScenarioId::all() {
            let result = runner.run(scenario);
            assert!(
                result.passed,
                "{} seed={}: {:?}",
                scenario,
                seed,
                result.failure_reason
            );
            assert!(result.metrics.robots_loaded > 0);
        }
    }
}

#[test]
fn lossy_scenario_reports_unparseable_cells() {
    let result = ScenarioRunner::new(5).run(ScenarioId::LossyFrames);
    assert!(result.passed, "{:?}", result.failure_reason);
    assert!(result.metrics.unparseable_cells > 0);
    assert!(result.metrics.chart_draws > 0);
}
