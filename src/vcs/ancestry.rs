//! Ancestry test: breadth-first walk from a descendant following only
//! `parent` (linear history), with a hard safety depth.

use std::collections::{HashSet, VecDeque};

use crate::store::Kv;
use crate::vcs::commit::read_commit_object;
use crate::vcs::error::Result;

const MAX_DEPTH: usize = 1000;

/// Returns true iff `candidate_ancestor` is encountered while walking
/// `parent` pointers from `candidate_descendant`, trivially true when they
/// are equal. `parent2` is intentionally excluded: following it would let a
/// prior merge mask a real divergence.
pub fn is_ancestor(kv: &Kv, candidate_ancestor: u64, candidate_descendant: u64) -> Result<bool> {
    if candidate_ancestor == candidate_descendant {
        return Ok(true);
    }

    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();
    queue.push_back(candidate_descendant);
    visited.insert(candidate_descendant);

    let mut depth = 0;
    while let Some(id) = queue.pop_front() {
        if depth > MAX_DEPTH {
            break;
        }
        let commit = read_commit_object(kv, id)?;
        if let Some(parent) = commit.parent {
            if parent == candidate_ancestor {
                return Ok(true);
            }
            if visited.insert(parent) {
                queue.push_back(parent);
            }
        }
        depth += 1;
    }

    Ok(false)
}
