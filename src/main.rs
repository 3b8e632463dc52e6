//! Entry point for the `oncefs` CLI. Parses arguments, installs logging,
//! dispatches to the command handler, and maps errors to exit codes.

use oncefs::cli::Cli;
use oncefs::logging::{Verbosity, init_subscriber};
use oncefs::{commands, exit_codes};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    init_subscriber(Verbosity::from_flags(cli.verbose, cli.quiet));

    match commands::dispatch(cli.command) {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS as u8),
        Err(err) => {
            // Print user-actionable error message to stderr
            eprintln!("Error: {}", err);

            ExitCode::from(err.exit_code() as u8)
        }
    }
}
