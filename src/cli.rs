use clap::{Parser, Subcommand};
use clap_complete::Shell;

#[derive(Parser)]
#[command(name = "rtf")]
#[command(version)]
#[command(about = "Declare Rudder test platforms and generate their Vagrant machines", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Fail on hosts whose system has no known box
    #[arg(long, global = true, env = "RTF_STRICT")]
    pub strict: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate the Vagrantfile from the state file
    Vagrantfile(VagrantfileArgs),

    /// Show the machines a platform declares
    Show(ShowArgs),

    /// Manage platforms in the state file
    #[command(subcommand)]
    Platform(PlatformCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Vagrantfile
// ============================================================================

#[derive(Parser)]
pub struct VagrantfileArgs {
    /// Only declare these platforms (default: all)
    #[arg(short, long = "platform", value_name = "NAME")]
    pub platforms: Vec<String>,

    /// Print to stdout instead of writing the file
    #[arg(long, conflicts_with = "check")]
    pub stdout: bool,

    /// Show what would change without writing
    #[arg(long)]
    pub check: bool,
}

// ============================================================================
// Show
// ============================================================================

#[derive(Parser)]
pub struct ShowArgs {
    /// Platform name
    pub platform: String,

    /// Print the configuration graph as JSON
    #[arg(long)]
    pub json: bool,
}

// ============================================================================
// Platform Commands
// ============================================================================

#[derive(Subcommand)]
pub enum PlatformCommand {
    /// Add or refresh platforms from platforms/<name>.json
    Add {
        /// Platform names
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Remove a platform from the state file
    #[command(alias = "rm")]
    Remove {
        /// Platform name
        name: String,

        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// List platforms in the state file
    #[command(alias = "ls")]
    List,
}
