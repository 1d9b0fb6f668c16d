pub mod check;
pub mod report;
pub mod run;

use super::args::{Cli, Command};

pub mod exit_codes {
    pub const OK: i32 = 0;
    pub const GATE_FAILED: i32 = 1;
    pub const CONFIG_ERROR: i32 = 2;
    pub const IO_ERROR: i32 = 3;
}

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Run(args) => run::cmd_run(args).await,
        Command::Check(args) => check::cmd_check(args),
        Command::Report(args) => report::cmd_report(args),
    }
}
