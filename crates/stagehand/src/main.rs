//! `stagehand` launcher: stages configured resources, starts the engine, and
//! stops it again on a termination signal.

use std::process::ExitCode;

fn main() -> ExitCode {
    match stagehand::run() {
        Ok(_) => ExitCode::SUCCESS,
        Err(error) => {
            report(&error);
            ExitCode::FAILURE
        }
    }
}

#[expect(
    clippy::print_stderr,
    reason = "telemetry may not be installed when launch fails"
)]
fn report(error: &stagehand::LaunchError) {
    eprintln!("stagehand: {error}");
}
