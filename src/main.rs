#[macro_use]
mod log;

mod cleaner;
mod cli;
mod config;
mod filter_file;
mod filters;
mod format;
mod gmail;
mod mailbox;

use clap::Parser;
use cli::{Cli, CliError};

fn main() {
    let cli = Cli::parse();
    log::init(cli.verbose);

    if let Err(e) = cli::run(cli) {
        eprintln!("Error: {}", e);
        if let CliError::Config(_) = e {
            eprintln!("Create a config file with:");
            eprintln!();
            eprintln!("  [gmail]");
            eprintln!("  token_command = \"gcloud auth print-access-token\"");
            eprintln!();
            eprintln!("Run `mailsweep help-config` for all options.");
        }
        std::process::exit(1);
    }
}
