mod cli;

use std::process;

use clap::Parser;

use sparkle::{config::Config, logging};

use cli::Cli;

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = cli::run(cli, config) {
        eprintln!("{e}");
        process::exit(1);
    }
}
