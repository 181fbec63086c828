//! Markup compiler binary

use fxc::cli::Cli;
use std::process;

fn main() {
    let mut cli = Cli::new();
    if let Err(error) = cli.run() {
        eprintln!("error: {}", error);
        process::exit(1);
    }
}
