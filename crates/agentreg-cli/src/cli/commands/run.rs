use super::exit_codes;
use crate::cli::args::RunArgs;
use agentreg_core::cases::load_suite;
use agentreg_core::engine::{AgentInvoker, MockInvoker, RunOptions, Runner};
use agentreg_core::report::console;
use agentreg_core::storage::RecordStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub async fn cmd_run(args: RunArgs) -> anyhow::Result<i32> {
    let cases = load_suite(&args.cases_file)?;
    tracing::debug!(cases = cases.len(), "loaded case suite");

    let store = RecordStore::new(&args.log_dir);
    let run_id = args
        .run_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    // The gateway stack is out of scope here; the deterministic mock is the
    // default capability. Deployments swap in their own AgentInvoker.
    let model = std::env::var("AGENTREG_MODEL").unwrap_or_else(|_| "gpt-4-mock".into());
    let invoker: Arc<dyn AgentInvoker> = Arc::new(MockInvoker::new(model));

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("interrupt received; finishing in-flight items");
                cancel.store(true, Ordering::Relaxed);
            }
        });
    }

    let opts = RunOptions {
        repeat: args.repeat,
        concurrency: args.concurrency,
        timeout: Duration::from_secs(args.timeout),
        cancel,
    };
    let runner = Runner::new(store, invoker);
    let outcome = runner.run(&cases, &run_id, &opts).await?;

    console::print_run_summary(&run_id, &outcome);

    Ok(if outcome.all_passed() {
        exit_codes::OK
    } else {
        exit_codes::GATE_FAILED
    })
}
