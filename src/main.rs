use clap::Parser;
use momtrader::cli::{Cli, run};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
