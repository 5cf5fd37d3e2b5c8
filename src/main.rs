//! twine - Command-line bundler for resolved component trees

use std::process::ExitCode;

use twine::cli;

fn main() -> ExitCode {
    cli::run()
}
