use std::process::ExitCode;

fn main() -> ExitCode {
    paydeck_cli::run()
}
