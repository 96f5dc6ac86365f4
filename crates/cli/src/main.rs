use std::process::ExitCode;

fn main() -> ExitCode {
    saleschat_cli::run()
}
