//! Parameter recovery through the full pipeline: simulate a pool of
//! prior-drawn datasets, reduce to summary statistics per condition, and
//! check that ABC concentrates the posterior near the drift that generated
//! the target data.

use eam_abc::{
    build_abc_input, resample_abc, run_abc, stats, AbcConfig, Agg, NamedAgg, SpecAtom,
    SummaryStatSpec, SummaryTable,
};
use eam_formula::{Binding, Expr};
use eam_sim::{run_simulation, SimulationConfig};
use eam_store::{map_by_condition, MapOptions, Table};

const TRUE_DRIFT: f64 = 1.5;

/// Pool config: each condition draws its own drift from the prior.
fn pool_config(n_conditions: usize, seed: u64) -> SimulationConfig {
    let mut config = SimulationConfig::new("ddm-2b");
    config.prior_formulas = vec![
        Binding::new("V", Expr::uniform(Expr::constant(0.2), Expr::constant(3.0))),
        Binding::new("A_upper", Expr::constant(1.0)),
        Binding::new("A_lower", Expr::constant(-1.0)),
        Binding::new("sd", Expr::constant(1.0)),
    ];
    config.n_conditions = n_conditions;
    config.n_trials_per_condition = 60;
    config.max_t = 4.0;
    config.dt = 5e-3;
    config.rand_seed = Some(seed);
    config
}

/// Target config: one condition at the known drift.
fn target_config(seed: u64) -> SimulationConfig {
    let mut config = pool_config(1, seed);
    config.prior_formulas[0] = Binding::new("V", Expr::constant(TRUE_DRIFT));
    config
}

/// Per-condition summaries: mean/median rt and mean choice.
fn summary_spec() -> SummaryStatSpec {
    SummaryStatSpec::new(
        SpecAtom::new(
            vec![
                NamedAgg::new("mean_rt", Agg::Mean("rt".into())),
                NamedAgg::new("median_rt", Agg::Median("rt".into())),
                NamedAgg::new("mean_choice", Agg::Mean("choice".into())),
            ],
            vec!["condition_idx".into()],
            vec!["condition_idx".into()],
        )
        .unwrap(),
    )
}

fn summarise(output: &eam_sim::SimulationOutput) -> SummaryTable {
    let spec = summary_spec();
    let ds = output.open_dataset().unwrap();
    let table = map_by_condition(
        &ds,
        |cond: &Table| Ok(spec.apply(cond)?.table),
        MapOptions::default(),
    )
    .unwrap();
    SummaryTable { table, wider_by: vec!["condition_idx".into()] }
}

#[test]
fn abc_recovers_the_generating_drift() {
    let dir = tempfile::tempdir().unwrap();

    let pool = run_simulation(&pool_config(80, 101), &dir.path().join("pool")).unwrap();
    let target = run_simulation(&target_config(909), &dir.path().join("target")).unwrap();

    let params = pool.open_conditions().unwrap().read_all().unwrap();
    let sim_stats = summarise(&pool);
    let target_stats = summarise(&target);

    let input =
        build_abc_input(&params, &["V".to_string()], &sim_stats, &target_stats).unwrap();
    assert_eq!(input.n_rows(), 80);

    let result = run_abc(&input, &AbcConfig::rejection(0.15)).unwrap();
    let accepted = result.posterior_samples().column("V").unwrap();
    assert_eq!(accepted.len(), 12);

    // The accepted drifts concentrate near the truth relative to the prior.
    let posterior_median = stats::median(&accepted);
    assert!(
        (posterior_median - TRUE_DRIFT).abs() < 0.5,
        "posterior median {posterior_median} too far from {TRUE_DRIFT}"
    );
    let prior = input.param.column("V").unwrap();
    let prior_spread = stats::sd(&prior);
    let posterior_spread = stats::sd(&accepted);
    assert!(
        posterior_spread < prior_spread,
        "posterior ({posterior_spread}) should be tighter than prior ({prior_spread})"
    );
}

#[test]
fn resample_pipeline_produces_stable_medians() {
    let dir = tempfile::tempdir().unwrap();

    let pool = run_simulation(&pool_config(60, 55), &dir.path().join("pool")).unwrap();
    let target = run_simulation(&target_config(77), &dir.path().join("target")).unwrap();

    let params = pool.open_conditions().unwrap().read_all().unwrap();
    let input = build_abc_input(
        &params,
        &["V".to_string()],
        &summarise(&pool),
        &summarise(&target),
    )
    .unwrap();

    let results =
        resample_abc(&input, 6, 60, true, &AbcConfig::rejection(0.2), 404).unwrap();
    assert_eq!(results.len(), 6);

    let summary = eam_abc::summarise_resample_medians(&results, 0.9).unwrap();
    assert_eq!(summary.rows.len(), 1);
    let row = &summary.rows[0];
    assert_eq!(row.parameter, "V");
    assert!(row.lower <= row.median && row.median <= row.upper);
    assert!(
        (row.median - TRUE_DRIFT).abs() < 0.7,
        "resampled median {} too far from {TRUE_DRIFT}",
        row.median
    );
}
