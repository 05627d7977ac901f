//! parallel-dl CLI - download a batch of files with live progress bars.

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::env;

use env_logger::Env;
use parallel_dl::cli::{self, Command};

#[tokio::main]
async fn main() -> parallel_dl::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    let args = match cli::parse_args(env::args().skip(1)) {
        Ok(Command::Run(args)) => args,
        Ok(Command::Help) => {
            cli::print_usage();
            return Ok(());
        }
        Err(e) => {
            eprintln!("{e}");
            cli::print_usage();
            std::process::exit(2);
        }
    };

    let stats = cli::run(args).await?;
    if stats.files_failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
