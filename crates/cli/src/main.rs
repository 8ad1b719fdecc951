use std::process::ExitCode;

fn main() -> ExitCode {
    greenroom_cli::run()
}
