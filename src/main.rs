use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use i18n_autokey::commands;
use i18n_autokey::config::Config;
use i18n_autokey::fs::RealFileSystem;
use i18n_autokey::logging::{self, LogLevel};
use i18n_autokey::pipeline::ExecOptions;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "i18n-autokey")]
#[command(author, version, about = "Replace untranslated text with numbered translation keys", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level: error, warn, info or debug (overrides config)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "log_level")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a file or directory and record the new keys
    Exec {
        /// Resource document the keys are written to (absolute path)
        resource: PathBuf,

        /// File or directory to convert (absolute path)
        target: PathBuf,

        /// Restrict a directory run to these file names (repeatable)
        #[arg(long = "only", value_name = "NAME")]
        only: Vec<String>,

        /// Descend into sub-directories
        #[arg(short, long)]
        recursive: bool,

        /// Report what would change without writing anything
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load_or_default(cli.config.as_ref())?;

    let level = if cli.quiet {
        LogLevel::Error
    } else {
        let name = cli.log_level.as_deref().unwrap_or(&config.log_level);
        LogLevel::parse(name).ok_or_else(|| anyhow!("Unknown log level '{}'", name))?
    };
    logging::set_level(level);

    match cli.command {
        Commands::Exec {
            resource,
            target,
            only,
            recursive,
            dry_run,
        } => {
            let options = ExecOptions {
                resource,
                target,
                only,
                recursive,
                dry_run,
            };
            commands::exec::run(&RealFileSystem, &config, &options)?;
        }
    }

    Ok(())
}
