use crate::cli::args::CheckArgs;
use agentreg_core::aggregate::summarize;
use agentreg_core::baseline;
use agentreg_core::cases::load_suite;
use agentreg_core::config::load_config;
use agentreg_core::errors::ConfigError;
use agentreg_core::flakiness::compute_stability;
use agentreg_core::gate;
use agentreg_core::report::markdown::render_gate_report;
use agentreg_core::storage::RecordStore;
use anyhow::Context;
use chrono::Utc;

pub fn cmd_check(args: CheckArgs) -> anyhow::Result<i32> {
    let store = RecordStore::new(&args.log_dir);

    let (run_id, records) = match &args.run_id {
        Some(id) => (id.clone(), store.read_run(id)?),
        None => store
            .read_latest_run()?
            .unwrap_or_else(|| (String::new(), Vec::new())),
    };
    let current = summarize(&records);

    let cases = match &args.cases_file {
        Some(path) => load_suite(path)?,
        None => Vec::new(),
    };

    let config = load_config(args.config.as_deref())?;
    let mut rules = config.resolve(&args.labels, &args.changed_files);
    if let Some(v) = args.s1_threshold {
        rules.s1_min_pass_rate = validated_rate("--s1-threshold", v)?;
    }
    if let Some(v) = args.overall_threshold {
        rules.overall_min_pass_rate = validated_rate("--overall-threshold", v)?;
    }

    let baseline = if let Some(dir) = &args.baseline_dir {
        baseline::from_directory(dir)?
    } else if let Some(days) = args.baseline_days {
        baseline::trailing_window(&store, days, Utc::now().date_naive(), &run_id)?
    } else {
        None
    };

    let stability = compute_stability(&records);
    let report = gate::evaluate(&current, baseline.as_ref(), &rules, &cases, stability);
    let md = render_gate_report(&report);

    match &args.output_file {
        Some(path) => {
            std::fs::write(path, &md)
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("wrote {}", path.display());
        }
        None => print!("{md}"),
    }

    Ok(report.exit_code())
}

fn validated_rate(flag: &str, v: f64) -> anyhow::Result<f64> {
    if !(0.0..=1.0).contains(&v) {
        anyhow::bail!(ConfigError(format!("{} {} out of range [0, 1]", flag, v)));
    }
    Ok(v)
}
