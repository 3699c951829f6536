//! Local command-line surface: parses arguments with `clap`, dispatches to
//! `vcs::ops`, and maps results onto process exit codes.

mod args;

use std::path::{Path, PathBuf};

use clap::Parser;
use log::error;

pub use args::{Cli, Command};

use crate::vcs::error::VcsError;
use crate::vcs::ops::{self, MergeOutcome, MergeStrategy};

/// Ancestry and log walks are bounded the same way `vcs::ancestry` bounds
/// its own BFS, so a corrupt ref chain can't hang the CLI.
const LOG_LIMIT: usize = 1000;

/// Parse `std::env::args()` and run. Returns the process exit code.
pub fn run() -> i32 {
    let cli = Cli::parse_from(std::env::args_os());
    run_with(cli)
}

fn run_with(cli: Cli) -> i32 {
    let (repo_base, repo_id) = split_repo_path(Path::new(&cli.repo));

    let result = match cli.command {
        Command::Init { bare } => ops::init(&repo_base, &repo_id, bare).map(|_| ()),
        Command::Add { path } => run_add(&repo_base, &repo_id, &path),
        Command::Checkout { branch } => ops::checkout(&repo_base, &repo_id, &branch),
        Command::Commit { message } => ops::commit(&repo_base, &repo_id, &message).map(|commit| {
            println!("[{} {}] {}", commit.branch, commit.id, commit.message);
        }),
        Command::Merge { branch } => run_merge(&repo_base, &repo_id, &branch),
        Command::Push { branch } => ops::push(&repo_base, &repo_id, branch.as_deref()).map(|count| {
            println!("pushed {count} commit(s)");
        }),
        Command::Log => run_log(&repo_base, &repo_id),
        Command::Show { id } => ops::show(&repo_base, &repo_id, id).map(print_commit),
    };

    match result {
        Ok(()) => 0,
        Err(err) => {
            error!("{err}");
            eprintln!("error: {err}");
            exit_code_for(&err)
        }
    }
}

fn run_add(repo_base: &Path, repo_id: &str, path: &str) -> Result<(), VcsError> {
    ops::add(repo_base, repo_id, path)?;
    if !ops::has_staged(repo_base, repo_id)? {
        return Err(VcsError::NothingStaged);
    }
    Ok(())
}

fn run_merge(repo_base: &Path, repo_id: &str, branch: &str) -> Result<(), VcsError> {
    match ops::merge(repo_base, repo_id, branch, MergeStrategy::AlwaysMergeCommit)? {
        MergeOutcome::FastForward { new_tip } => println!("fast-forwarded to commit {new_tip}"),
        MergeOutcome::Merged(commit) => print_commit(commit),
    }
    Ok(())
}

fn run_log(repo_base: &Path, repo_id: &str) -> Result<(), VcsError> {
    let branch = ops::current_branch(repo_base, repo_id)?;
    let history = ops::log(repo_base, repo_id, &branch, LOG_LIMIT)?;
    for commit in history {
        print_commit(commit);
    }
    Ok(())
}

fn print_commit(commit: crate::vcs::Commit) {
    println!("commit {}", commit.id);
    println!("Branch: {}", commit.branch);
    println!("Date:   {}", commit.timestamp);
    println!();
    println!("    {}", commit.message);
    println!();
}

/// Map a path the user passed via `-C`/`--repo` onto a `(repo_base, repo_id)`
/// pair: the parent directory and the final path component, mirroring how
/// `git` treats the working directory as the repository's identity.
fn split_repo_path(path: &Path) -> (PathBuf, String) {
    let absolute = path
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_default().join(path));

    let repo_id = absolute
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| ".".to_string());
    let repo_base = absolute
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("/"));

    (repo_base, repo_id)
}

fn exit_code_for(err: &VcsError) -> i32 {
    match err {
        VcsError::NotFound(_) | VcsError::FileNotFound(_) => 1,
        VcsError::NothingStaged | VcsError::NothingToMerge(_) | VcsError::NothingToPush => 2,
        VcsError::SelfMerge | VcsError::Conflict => 3,
        VcsError::AlreadyInitialised(_) => 4,
        _ => 1,
    }
}
