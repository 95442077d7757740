use clap::Parser;
use multisheet::cli::{Args, run};
use multisheet::output::OutputFormatter;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args = Args::parse();

    match run(&args) {
        Ok(_) => {
            OutputFormatter::success("Program completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            OutputFormatter::error(&format!("{}\nExiting", e));
            ExitCode::FAILURE
        }
    }
}
