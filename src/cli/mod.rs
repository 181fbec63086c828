mod config;
mod handlers;

use crate::error::Result;
use crate::CompilerOptions;
use clap::{Arg, ArgAction, Command};

pub struct Cli {
    config: config::ConfigFile,
}

impl Cli {
    pub fn new() -> Self {
        Self {
            config: config::ConfigFile::default(),
        }
    }

    pub fn run(&mut self) -> Result<()> {
        let matches = self.build_cli().get_matches();

        if let Some(config_path) = matches.get_one::<String>("config") {
            self.config = config::load(config_path)?;
        }

        self.setup_logging(matches.get_count("verbose"));

        match matches.subcommand() {
            Some(("compile", sub_matches)) => handlers::handle_compile_command(self, sub_matches),
            Some(("check", sub_matches)) => handlers::handle_check_command(self, sub_matches),
            _ => {
                println!("No subcommand specified. Use --help for usage information.");
                Ok(())
            }
        }
    }

    fn build_cli(&self) -> Command {
        Command::new(crate::NAME)
            .version(crate::VERSION)
            .about(crate::DESCRIPTION)
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .value_name("FILE")
                    .help("Configuration file path (.json or .toml)")
                    .action(ArgAction::Set),
            )
            .arg(
                Arg::new("verbose")
                    .short('v')
                    .long("verbose")
                    .help("Increase verbosity (can be used multiple times)")
                    .action(ArgAction::Count),
            )
            .subcommand(
                Command::new("compile")
                    .about("Compile markup documents to builder source files")
                    .arg(
                        Arg::new("input")
                            .help("Input markup file(s) or directory")
                            .required(true)
                            .num_args(1..)
                            .index(1),
                    )
                    .arg(
                        Arg::new("types")
                            .short('t')
                            .long("types")
                            .value_name("FILE")
                            .help("Type table produced by the platform's introspection dump"),
                    )
                    .arg(
                        Arg::new("out-dir")
                            .short('o')
                            .long("out-dir")
                            .value_name("DIR")
                            .help("Directory for generated source files (default: alongside inputs)"),
                    )
                    .arg(
                        Arg::new("deny-warnings")
                            .long("deny-warnings")
                            .help("Treat warnings as errors")
                            .action(ArgAction::SetTrue),
                    )
                    .arg(
                        Arg::new("stats")
                            .long("stats")
                            .help("Print compilation statistics as JSON")
                            .action(ArgAction::SetTrue),
                    ),
            )
            .subcommand(
                Command::new("check")
                    .about("Check markup documents without generating code")
                    .arg(
                        Arg::new("input")
                            .help("Input markup file or directory")
                            .required(true)
                            .index(1),
                    )
                    .arg(
                        Arg::new("types")
                            .short('t')
                            .long("types")
                            .value_name("FILE")
                            .help("Type table produced by the platform's introspection dump"),
                    )
                    .arg(
                        Arg::new("recursive")
                            .short('r')
                            .long("recursive")
                            .help("Check all markup files in the directory recursively")
                            .action(ArgAction::SetTrue),
                    ),
            )
    }

    fn setup_logging(&self, verbose_count: u8) {
        let log_level = match verbose_count {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };
        env_logger::Builder::from_default_env()
            .filter_level(log_level)
            .format_timestamp_secs()
            .init();
    }

    pub fn build_compiler_options(&self, matches: &clap::ArgMatches) -> CompilerOptions {
        CompilerOptions {
            deny_warnings: matches.get_flag("deny-warnings")
                || self.config.deny_warnings.unwrap_or(false),
            ..CompilerOptions::default()
        }
    }

    /// Type-table path: the command-line flag wins over the config file.
    pub fn types_path(&self, matches: &clap::ArgMatches) -> Option<String> {
        matches
            .get_one::<String>("types")
            .cloned()
            .or_else(|| self.config.types.clone())
    }

    pub fn output_directory(&self, matches: &clap::ArgMatches) -> Option<String> {
        matches
            .get_one::<String>("out-dir")
            .cloned()
            .or_else(|| self.config.output_directory.clone())
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self::new()
    }
}
