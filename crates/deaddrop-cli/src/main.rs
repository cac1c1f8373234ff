//! `deaddrop`: issue commands to a file-bridge listener and check its health.

use std::io::Write;
use std::process::ExitCode;

use clap::Parser;

use deaddrop_cli::{Cli, run};

fn main() -> ExitCode {
    let cli = Cli::parse();
    let mut stdout = std::io::stdout();
    match run(&cli, &mut stdout) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            let mut stderr = std::io::stderr();
            let _ = writeln!(stderr, "deaddrop: {error}");
            ExitCode::FAILURE
        }
    }
}
