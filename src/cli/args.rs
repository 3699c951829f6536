//! CLI argument definitions, built on `clap`'s derive API.

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "gitclone", version, about = "A simplified multi-tenant repository server, driven locally")]
pub struct Cli {
    /// Path to the repository to operate on.
    #[arg(long, short = 'C', default_value = ".")]
    pub repo: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a new repository.
    Init {
        /// Omit the `.gitclone/` wrapper; place contents at the repo root.
        #[arg(long)]
        bare: bool,
    },
    /// Stage a file, directory, or "." for the next commit.
    Add {
        #[arg(default_value = ".")]
        path: String,
    },
    /// Switch HEAD to another branch, creating it if it does not exist.
    Checkout { branch: String },
    /// Commit every staged entry onto the current branch.
    Commit {
        #[arg(short = 'm', long = "message")]
        message: String,
    },
    /// Merge another branch into the current one.
    Merge { branch: String },
    /// Advance the remote ref for a branch to its local tip.
    Push {
        /// Defaults to the current branch.
        branch: Option<String>,
    },
    /// Walk the pushed history of the current branch.
    Log,
    /// Print one commit record.
    Show { id: u64 },
}
