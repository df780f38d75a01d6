pub mod toml_config;

#[cfg(feature = "cli")]
use crate::utils::error::Result;
#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use toml_config::TomlConfig;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "marks-portal")]
#[command(about = "Roster cache and source administration for the student marks portal")]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "portal.toml")]
    pub config: String,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit JSON logs")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Rebuild the roster from every source and print per-source status
    Refresh,
    /// Print a student's marks
    Marks { roll_no: String },
    /// Tell whether a roll number has a registered account
    Check { roll_no: String },
    /// Print cache and source counts
    Health,
    /// Manage marks sources
    Sources {
        #[command(subcommand)]
        action: SourcesCommand,
    },
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum SourcesCommand {
    List {
        #[arg(long)]
        owner: String,
    },
    Add {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        spreadsheet_id: String,
        #[arg(long)]
        tab: String,
        #[arg(long)]
        description: Option<String>,
    },
    Remove {
        #[arg(long)]
        owner: String,
        id: String,
    },
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// Loads the TOML file, falling back to defaults when it does not exist.
    pub fn load_toml(&self) -> Result<TomlConfig> {
        if std::path::Path::new(&self.config).exists() {
            TomlConfig::from_file(&self.config)
        } else {
            Ok(TomlConfig::default())
        }
    }
}
