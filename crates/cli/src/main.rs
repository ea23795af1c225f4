use std::process::ExitCode;

fn main() -> ExitCode {
    noteit_cli::run()
}
