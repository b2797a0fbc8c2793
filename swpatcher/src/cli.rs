//! Root CLI structure for swpatcher

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "swpatcher")]
#[command(about = "Apply translation packages to SoulWorker data files", long_about = None)]
#[command(version)]
#[command(author)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (can be repeated for more detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Patch every unit of a descriptor list for one language
    Patch(crate::commands::patch::PatchArgs),

    /// Resource (.res) operations
    Res {
        #[command(subcommand)]
        command: crate::commands::res::ResCommands,
    },

    /// Archive (.v) operations
    Archive {
        #[command(subcommand)]
        command: crate::commands::archive::ArchiveCommands,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}
