//! Version-control operations: init, add, commit, checkout, merge, push,
//! log, show, layered over the batch, ref/HEAD, staging and commit-object
//! primitives.
//!
//! Each operation opens a fresh `RepoStore` and closes it before returning,
//! so a caller's own subsequent operation always observes this one's
//! writes.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use log::info;

use crate::store::RepoStore;
use crate::vcs::ancestry::is_ancestor;
use crate::vcs::commit::{read_commit_object, write_commit_object, Commit};
use crate::vcs::error::{Result, VcsError};
use crate::vcs::index::{self, has_staged_entries};
use crate::vcs::refs::{self, validate_branch_name};

const DEFAULT_BRANCH: &str = "master";
const DEFAULT_PUSH_BRANCH: &str = "main";

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Create the `.gitclone` directory tree (or, for `--bare`, the repo root
/// layout directly) and the initial `master` branch.
pub fn init(repo_base: &Path, repo_id: &str, bare: bool) -> Result<()> {
    if RepoStore::is_initialised(repo_base, repo_id) {
        return Err(VcsError::AlreadyInitialised(repo_id.to_string()));
    }

    let mut store = RepoStore::create(repo_base, repo_id, bare)?;
    {
        let mut batch = store.new_write_batch();
        refs::write_head(&mut batch, DEFAULT_BRANCH);
        refs::init_next_commit_id(&mut batch);
        refs::create_empty_head_ref(&mut batch, DEFAULT_BRANCH);
        batch.commit()?;
    }
    info!("initialised repo {repo_id:?} (bare={bare})");
    store.close()?;
    Ok(())
}

/// Stage `path` (`"."`, a file, or a directory) into the index.
pub fn add(repo_base: &Path, repo_id: &str, path: &str) -> Result<()> {
    let mut store = RepoStore::open(repo_base, repo_id)?;
    let repo_root = store.repo_path().to_path_buf();
    {
        let mut batch = store.new_write_batch();
        index::add(&mut batch, &repo_root, path)?;
        batch.commit()?;
    }
    store.close()?;
    Ok(())
}

/// Commit every staged entry onto the current branch.
pub fn commit(repo_base: &Path, repo_id: &str, message: &str) -> Result<Commit> {
    let mut store = RepoStore::open(repo_base, repo_id)?;

    if !has_staged_entries(store.kv())? {
        store.close()?;
        return Err(VcsError::NothingStaged);
    }
    let branch = refs::read_head_branch(store.kv())?;

    let id = refs::next_commit_id(store.kv_mut())?;
    let parent = refs::read_head_ref_maybe(store.kv(), &branch)?;
    let record = Commit {
        id,
        message: message.to_string(),
        branch: branch.clone(),
        timestamp: now(),
        parent,
        parent2: None,
    };

    let result = (|| -> Result<()> {
        let mut batch = store.new_write_batch();
        write_commit_object(&mut batch, &record);
        refs::write_head_ref(&mut batch, &branch, id);
        index::clear_index(&mut batch, store.kv())?;
        batch.commit()?;
        Ok(())
    })();

    match result {
        Ok(()) => {
            info!("commit {id} on branch {branch:?}: {message:?}");
            store.close()?;
            Ok(record)
        }
        // The allocated id may be orphaned here: ids are monotone, not
        // gap-free, so losing one to a failed commit is acceptable.
        Err(e) => Err(VcsError::CommitFailed(e.to_string())),
    }
}

/// Switch HEAD to `target`, creating the branch (pointing at the current
/// tip, or empty if the current branch has no commits yet) if it does not
/// already exist. Pointer-only: no working-tree materialisation.
pub fn checkout(repo_base: &Path, repo_id: &str, target: &str) -> Result<()> {
    validate_branch_name(target)?;
    let mut store = RepoStore::open(repo_base, repo_id)?;

    let current = refs::read_head_branch(store.kv())?;
    if target == current {
        store.close()?;
        return Ok(());
    }

    let current_tip = refs::read_head_ref_maybe(store.kv(), &current)?;
    let target_exists = refs::read_head_ref_maybe(store.kv(), target)?.is_some()
        || store.kv().contains(format!("{}{}", refs::HEADS_PREFIX, target).as_bytes());

    {
        let mut batch = store.new_write_batch();
        if !target_exists {
            match current_tip {
                Some(id) => refs::write_head_ref(&mut batch, target, id),
                None => refs::create_empty_head_ref(&mut batch, target),
            }
        }
        refs::write_head(&mut batch, target);
        batch.commit()?;
    }
    info!("checked out {target:?} (from {current:?})");
    store.close()?;
    Ok(())
}

/// Whether a non-fast-forward merge is allowed to proceed by recording a
/// two-parent merge commit, or must be rejected outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// CLI behaviour: always record a two-parent merge commit, even when a
    /// plain fast-forward would do.
    AlwaysMergeCommit,
    /// HTTP behaviour: advance the ref only when it is a strict
    /// fast-forward; otherwise reject with `Conflict`.
    FastForwardOnly,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    FastForward { new_tip: u64 },
    Merged(Commit),
}

/// Merge `other` into the current branch.
pub fn merge(
    repo_base: &Path,
    repo_id: &str,
    other: &str,
    strategy: MergeStrategy,
) -> Result<MergeOutcome> {
    let mut store = RepoStore::open(repo_base, repo_id)?;
    let current = refs::read_head_branch(store.kv())?;

    if other == current {
        store.close()?;
        return Err(VcsError::SelfMerge);
    }

    let other_tip = refs::read_head_ref_maybe(store.kv(), other)?
        .ok_or_else(|| VcsError::NothingToMerge(other.to_string()))?;
    let current_tip = refs::read_head_ref_maybe(store.kv(), &current)?;

    let Some(current_tip) = current_tip else {
        // current has no commits yet: a pure fast-forward.
        let mut batch = store.new_write_batch();
        refs::write_head_ref(&mut batch, &current, other_tip);
        batch.commit()?;
        store.close()?;
        return Ok(MergeOutcome::FastForward { new_tip: other_tip });
    };

    let fast_forwardable = is_ancestor(store.kv(), current_tip, other_tip)?;

    match strategy {
        MergeStrategy::FastForwardOnly => {
            if !fast_forwardable {
                store.close()?;
                return Err(VcsError::Conflict);
            }
            let mut batch = store.new_write_batch();
            refs::write_head_ref(&mut batch, &current, other_tip);
            batch.commit()?;
            store.close()?;
            Ok(MergeOutcome::FastForward { new_tip: other_tip })
        }
        MergeStrategy::AlwaysMergeCommit => {
            let id = refs::next_commit_id(store.kv_mut())?;
            let record = Commit {
                id,
                message: format!("Merge branch '{other}' into {current}"),
                branch: current.clone(),
                timestamp: now(),
                parent: Some(current_tip),
                parent2: Some(other_tip),
            };
            let mut batch = store.new_write_batch();
            write_commit_object(&mut batch, &record);
            refs::write_head_ref(&mut batch, &current, id);
            batch.commit()?;
            store.close()?;
            Ok(MergeOutcome::Merged(record))
        }
    }
}

/// Advance `refs/remotes/origin/<branch>` to the local tip, metadata-only
/// (no network transport). Returns the number of commits pushed.
pub fn push(repo_base: &Path, repo_id: &str, branch: Option<&str>) -> Result<u64> {
    let mut store = RepoStore::open(repo_base, repo_id)?;

    let branch = match branch {
        Some(b) => b.to_string(),
        None => refs::read_head_branch(store.kv()).unwrap_or_else(|_| DEFAULT_PUSH_BRANCH.to_string()),
    };

    let head_tip = refs::read_head_ref_maybe(store.kv(), &branch)?
        .ok_or(VcsError::NothingToPush)?;
    let remote_tip = refs::read_remote_ref(store.kv(), &branch)?;

    if remote_tip == Some(head_tip) {
        store.close()?;
        return Ok(0);
    }

    let mut count = 0u64;
    let mut cursor = Some(head_tip);
    while let Some(id) = cursor {
        if Some(id) == remote_tip {
            break;
        }
        count += 1;
        let record = read_commit_object(store.kv(), id)?;
        cursor = record.parent;
    }

    {
        let mut batch = store.new_write_batch();
        refs::write_remote_ref(&mut batch, &branch, head_tip);
        batch.commit()?;
    }
    info!("pushed {count} commit(s) to origin/{branch}");
    store.close()?;
    Ok(count)
}

/// Walk `parent` pointers from the remote tip of `branch`, up to `limit`
/// commits. Remote-gated: a branch with no pushed commits yields `[]` even
/// if it has local commits.
pub fn log(repo_base: &Path, repo_id: &str, branch: &str, limit: usize) -> Result<Vec<Commit>> {
    let store = RepoStore::open(repo_base, repo_id)?;

    let Some(mut cursor) = refs::read_remote_ref(store.kv(), branch)? else {
        store.close()?;
        return Ok(Vec::new());
    };

    let mut out = Vec::new();
    while out.len() < limit {
        let record = read_commit_object(store.kv(), cursor)?;
        let parent = record.parent;
        out.push(record);
        match parent {
            Some(p) => cursor = p,
            None => break,
        }
    }
    store.close()?;
    Ok(out)
}

/// Fetch one commit record by id, regardless of push visibility.
pub fn show(repo_base: &Path, repo_id: &str, id: u64) -> Result<Commit> {
    let store = RepoStore::open(repo_base, repo_id)?;
    let record = read_commit_object(store.kv(), id)?;
    store.close()?;
    Ok(record)
}

pub fn list_branches(repo_base: &Path, repo_id: &str) -> Result<Vec<String>> {
    let store = RepoStore::open(repo_base, repo_id)?;
    let branches = refs::list_branches(store.kv())?;
    store.close()?;
    Ok(branches)
}

pub fn current_branch(repo_base: &Path, repo_id: &str) -> Result<String> {
    let store = RepoStore::open(repo_base, repo_id)?;
    let branch = refs::read_head_branch(store.kv())?;
    store.close()?;
    Ok(branch)
}

/// Whether the index currently holds any staged entry, used by the CLI to
/// decide whether `add` actually staged something.
pub fn has_staged(repo_base: &Path, repo_id: &str) -> Result<bool> {
    let store = RepoStore::open(repo_base, repo_id)?;
    let staged = has_staged_entries(store.kv())?;
    store.close()?;
    Ok(staged)
}

/// List every branch with its local tip (`None` for a branch with no
/// commits yet), used by the HTTP `branches` endpoint.
pub fn branches_with_tips(repo_base: &Path, repo_id: &str) -> Result<Vec<(String, Option<u64>)>> {
    let store = RepoStore::open(repo_base, repo_id)?;
    let names = refs::list_branches(store.kv())?;
    let mut out = Vec::with_capacity(names.len());
    for name in names {
        let tip = refs::read_head_ref_maybe(store.kv(), &name)?;
        out.push((name, tip));
    }
    store.close()?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn init_then_empty_log() {
        let base = tempdir().unwrap();
        init(base.path(), "repo", false).unwrap();

        assert_eq!(current_branch(base.path(), "repo").unwrap(), "master");

        let store = RepoStore::open(base.path(), "repo").unwrap();
        assert_eq!(refs::read_head_ref_maybe(store.kv(), "master").unwrap(), None);
        store.close().unwrap();
    }

    #[test]
    fn init_twice_fails() {
        let base = tempdir().unwrap();
        init(base.path(), "repo", false).unwrap();
        assert!(matches!(
            init(base.path(), "repo", false),
            Err(VcsError::AlreadyInitialised(_))
        ));
    }

    #[test]
    fn single_commit_visibility() {
        let base = tempdir().unwrap();
        init(base.path(), "repo", false).unwrap();
        fs::write(base.path().join("repo").join("a.txt"), b"hi").unwrap();
        add(base.path(), "repo", "a.txt").unwrap();
        let record = commit(base.path(), "repo", "first").unwrap();

        assert_eq!(record.id, 0);
        assert_eq!(record.message, "first");

        let store = RepoStore::open(base.path(), "repo").unwrap();
        assert_eq!(refs::read_head_ref_maybe(store.kv(), "master").unwrap(), Some(0));
        assert!(!has_staged_entries(store.kv()).unwrap());
        store.close().unwrap();
    }

    #[test]
    fn remote_gated_log() {
        let base = tempdir().unwrap();
        init(base.path(), "repo", false).unwrap();
        fs::write(base.path().join("repo").join("a.txt"), b"hi").unwrap();
        add(base.path(), "repo", "a.txt").unwrap();
        commit(base.path(), "repo", "first").unwrap();

        assert_eq!(log(base.path(), "repo", "master", 10).unwrap(), Vec::new());

        let pushed = push(base.path(), "repo", Some("master")).unwrap();
        assert_eq!(pushed, 1);

        let history = log(base.path(), "repo", "master", 10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, 0);
        assert_eq!(history[0].message, "first");
    }

    #[test]
    fn branch_from_empty_then_commit() {
        let base = tempdir().unwrap();
        init(base.path(), "repo", false).unwrap();
        checkout(base.path(), "repo", "feature").unwrap();

        let store = RepoStore::open(base.path(), "repo").unwrap();
        assert_eq!(refs::read_head_ref_maybe(store.kv(), "feature").unwrap(), None);
        store.close().unwrap();

        fs::write(base.path().join("repo").join("b.txt"), b"hi").unwrap();
        add(base.path(), "repo", "b.txt").unwrap();
        let record = commit(base.path(), "repo", "on feature").unwrap();
        assert_eq!(record.id, 0);
        assert_eq!(record.branch, "feature");

        let store = RepoStore::open(base.path(), "repo").unwrap();
        assert_eq!(refs::read_head_ref_maybe(store.kv(), "master").unwrap(), None);
        store.close().unwrap();
    }

    #[test]
    fn fast_forward_merge_cli_always_builds_merge_commit() {
        let base = tempdir().unwrap();
        init(base.path(), "repo", false).unwrap();
        fs::write(base.path().join("repo").join("a.txt"), b"a").unwrap();
        add(base.path(), "repo", "a.txt").unwrap();
        commit(base.path(), "repo", "A").unwrap(); // id 0 on master

        checkout(base.path(), "repo", "feature").unwrap();
        fs::write(base.path().join("repo").join("b.txt"), b"b").unwrap();
        add(base.path(), "repo", "b.txt").unwrap();
        commit(base.path(), "repo", "B").unwrap(); // id 1 on feature

        checkout(base.path(), "repo", "master").unwrap();
        let outcome = merge(base.path(), "repo", "feature", MergeStrategy::AlwaysMergeCommit).unwrap();
        match outcome {
            MergeOutcome::Merged(record) => {
                assert_eq!(record.id, 2);
                assert_eq!(record.parent, Some(0));
                assert_eq!(record.parent2, Some(1));
                assert_eq!(record.branch, "master");
            }
            other => panic!("expected a merge commit, got {other:?}"),
        }

        let store = RepoStore::open(base.path(), "repo").unwrap();
        assert_eq!(refs::read_head_ref_maybe(store.kv(), "master").unwrap(), Some(2));
        store.close().unwrap();
    }

    #[test]
    fn fast_forward_merge_http_policy_advances_ref_without_a_commit() {
        let base = tempdir().unwrap();
        init(base.path(), "repo", false).unwrap();
        fs::write(base.path().join("repo").join("a.txt"), b"a").unwrap();
        add(base.path(), "repo", "a.txt").unwrap();
        commit(base.path(), "repo", "A").unwrap(); // id 0

        checkout(base.path(), "repo", "feature").unwrap();
        fs::write(base.path().join("repo").join("b.txt"), b"b").unwrap();
        add(base.path(), "repo", "b.txt").unwrap();
        commit(base.path(), "repo", "B").unwrap(); // id 1

        checkout(base.path(), "repo", "master").unwrap();
        let outcome = merge(base.path(), "repo", "feature", MergeStrategy::FastForwardOnly).unwrap();
        assert_eq!(outcome, MergeOutcome::FastForward { new_tip: 1 });

        let store = RepoStore::open(base.path(), "repo").unwrap();
        assert_eq!(refs::read_head_ref_maybe(store.kv(), "master").unwrap(), Some(1));
        store.close().unwrap();
    }

    #[test]
    fn non_fast_forward_http_merge_is_rejected() {
        let base = tempdir().unwrap();
        init(base.path(), "repo", false).unwrap();
        fs::write(base.path().join("repo").join("a.txt"), b"a").unwrap();
        add(base.path(), "repo", "a.txt").unwrap();
        commit(base.path(), "repo", "A").unwrap(); // id 0, master

        checkout(base.path(), "repo", "feature").unwrap();
        fs::write(base.path().join("repo").join("b.txt"), b"b").unwrap();
        add(base.path(), "repo", "b.txt").unwrap();
        commit(base.path(), "repo", "B").unwrap(); // id 1, feature

        checkout(base.path(), "repo", "master").unwrap();
        fs::write(base.path().join("repo").join("c.txt"), b"c").unwrap();
        add(base.path(), "repo", "c.txt").unwrap();
        commit(base.path(), "repo", "C").unwrap(); // id 2, master, diverges from feature

        let result = merge(base.path(), "repo", "feature", MergeStrategy::FastForwardOnly);
        assert!(matches!(result, Err(VcsError::Conflict)));
    }

    #[test]
    fn self_merge_and_nothing_to_merge_are_rejected() {
        let base = tempdir().unwrap();
        init(base.path(), "repo", false).unwrap();
        assert!(matches!(
            merge(base.path(), "repo", "master", MergeStrategy::AlwaysMergeCommit),
            Err(VcsError::SelfMerge)
        ));

        checkout(base.path(), "repo", "feature").unwrap();
        checkout(base.path(), "repo", "master").unwrap();
        // feature exists but has no commits: nothing to merge.
        assert!(matches!(
            merge(base.path(), "repo", "feature", MergeStrategy::AlwaysMergeCommit),
            Err(VcsError::NothingToMerge(_))
        ));
    }

    #[test]
    fn commit_without_staged_entries_fails() {
        let base = tempdir().unwrap();
        init(base.path(), "repo", false).unwrap();
        assert!(matches!(
            commit(base.path(), "repo", "empty"),
            Err(VcsError::NothingStaged)
        ));
    }

    #[test]
    fn push_is_a_no_op_when_already_up_to_date() {
        let base = tempdir().unwrap();
        init(base.path(), "repo", false).unwrap();
        fs::write(base.path().join("repo").join("a.txt"), b"a").unwrap();
        add(base.path(), "repo", "a.txt").unwrap();
        commit(base.path(), "repo", "A").unwrap();

        assert_eq!(push(base.path(), "repo", Some("master")).unwrap(), 1);
        assert_eq!(push(base.path(), "repo", Some("master")).unwrap(), 0);
    }

    #[test]
    fn push_with_no_commits_fails() {
        let base = tempdir().unwrap();
        init(base.path(), "repo", false).unwrap();
        assert!(matches!(
            push(base.path(), "repo", Some("master")),
            Err(VcsError::NothingToPush)
        ));
    }

    #[test]
    fn close_preserves_records_regression() {
        let base = tempdir().unwrap();
        init(base.path(), "repo", false).unwrap();
        fs::write(base.path().join("repo").join("a.txt"), b"a").unwrap();
        add(base.path(), "repo", "a.txt").unwrap();
        commit(base.path(), "repo", "A").unwrap();

        let mut h1 = RepoStore::open(base.path(), "repo").unwrap();
        let h2 = RepoStore::open(base.path(), "repo").unwrap();
        {
            let mut batch = h1.new_write_batch();
            refs::write_remote_ref(&mut batch, "master", 5);
            batch.commit().unwrap();
        }
        h1.close().unwrap();
        drop(h2);

        let h3 = RepoStore::open(base.path(), "repo").unwrap();
        assert_eq!(refs::read_remote_ref(h3.kv(), "master").unwrap(), Some(5));
        h3.close().unwrap();
    }
}
