use std::process::ExitCode;

use clap::Parser;
use codefix::cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    codefix::init_logging();

    let outcome = cli.execute().await;
    cli.report(&outcome)
}
