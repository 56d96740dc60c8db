//! Binary entrypoint of the RecallAI terminal client.

use std::process::ExitCode;

use recallai_client::start_recallai;

/// Sign in, then chat with the backend from the terminal.
fn main() -> ExitCode {
    start_recallai::run()
}
