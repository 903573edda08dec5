mod cli;
mod commands;
mod config;
mod configurator;
mod error;
mod paths;
mod platform;
mod state;
mod systems;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command, PlatformCommand};
use config::Settings;
use error::Error;
use std::io;
use std::path::PathBuf;
use systems::{Strictness, SystemTable};

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub strict: bool,
    /// Project directory
    pub root: PathBuf,
    pub settings: Settings,
}

impl Context {
    pub fn state_path(&self) -> PathBuf {
        paths::resolve(&self.root, &self.settings.state_file)
    }

    pub fn vagrantfile_path(&self) -> PathBuf {
        paths::resolve(&self.root, &self.settings.vagrantfile)
    }

    pub fn platforms_dir(&self) -> PathBuf {
        paths::resolve(&self.root, &self.settings.platforms_dir)
    }

    /// `--strict` wins over the settings file
    pub fn strictness(&self) -> Strictness {
        if self.strict {
            Strictness::Error
        } else {
            self.settings.unknown_system
        }
    }

    pub fn systems(&self) -> SystemTable {
        self.settings.systems_table()
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    if let Err(err) = run(cli) {
        let code = match err.downcast_ref::<Error>() {
            Some(missing @ Error::MissingStateFile(_)) => {
                println!("{missing}");
                missing.exit_code()
            }
            Some(typed) => {
                ui::error(&format!("{err:#}"));
                typed.exit_code()
            }
            None => {
                ui::error(&format!("{err:#}"));
                1
            }
        };
        std::process::exit(code);
    }
}

fn run(cli: Cli) -> Result<()> {
    let root = paths::project_root()?;
    let settings = Settings::load(&paths::config_file(&root))?;

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        strict: cli.strict,
        root,
        settings,
    };

    match cli.command {
        Command::Vagrantfile(args) => commands::vagrantfile::run(&ctx, args),
        Command::Show(args) => commands::show::run(&ctx, args),
        Command::Platform(cmd) => match cmd {
            PlatformCommand::Add { names } => commands::platform::add(&ctx, &names),
            PlatformCommand::Remove { name, yes } => commands::platform::remove(&ctx, &name, yes),
            PlatformCommand::List => commands::platform::list(&ctx),
        },
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "rtf", &mut io::stdout());
            Ok(())
        }
    }
}
