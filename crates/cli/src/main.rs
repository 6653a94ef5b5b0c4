use std::process::ExitCode;

fn main() -> ExitCode {
    querydesk_cli::run()
}
