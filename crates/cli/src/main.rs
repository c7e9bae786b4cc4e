use std::process::ExitCode;

fn main() -> ExitCode {
    purchasing_cli::run()
}
