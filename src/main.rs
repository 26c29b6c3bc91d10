use clap::Parser;
use resorter::cli::{Cli, run};
use resorter::output::OutputFormatter;

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        OutputFormatter::error(&e);
        std::process::exit(1);
    }
}
