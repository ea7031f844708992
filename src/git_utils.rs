use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use git2::{Commit, Oid, Repository, Sort};

use crate::stats::markdown_candidate;

/// Newest-first commits examined per file before giving up on history.
pub const MAX_HISTORY_DEPTH: usize = 200;

pub struct GitRepository {
    repo: Repository,
    workdir: PathBuf,
}

impl GitRepository {
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }
}

/// Locate the repository enclosing `path`, searching parent directories.
pub fn open_git_repository(path: &Path) -> Option<GitRepository> {
    let repo = Repository::discover(path).ok()?;
    let workdir = repo
        .workdir()
        .or_else(|| repo.path().parent())
        .map(|p| p.to_path_buf())?;
    let workdir = workdir.canonicalize().unwrap_or_else(|_| workdir.clone());

    Some(GitRepository { repo, workdir })
}

/// Memoizes repository discovery per lookup directory. "No repository here"
/// is a cached outcome as well.
#[derive(Default)]
pub struct RepoCache {
    repos: HashMap<PathBuf, Option<GitRepository>>,
}

impl RepoCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn repository_for(&mut self, base_dir: &Path) -> Option<&GitRepository> {
        self.repos
            .entry(base_dir.to_path_buf())
            .or_insert_with(|| open_git_repository(base_dir))
            .as_ref()
    }
}

/// Resolves "last updated" times for documents: newest non-ignored commit
/// touching the file, falling back to filesystem mtime, then 0.
pub struct HistoryResolver {
    cache: RepoCache,
    ignored_commits: HashSet<String>,
}

impl HistoryResolver {
    pub fn new(cache: RepoCache, ignored_commits: HashSet<String>) -> Self {
        Self {
            cache,
            ignored_commits,
        }
    }

    /// Unix timestamp in seconds, or 0 when nothing resolves.
    pub fn resolve_update_time(&mut self, link: &str, base_dir: &Path) -> i64 {
        let file = resolve_doc_path(link, base_dir);
        if let Some(timestamp) = self.commit_time(&file, base_dir) {
            return timestamp;
        }
        mtime_seconds(&file).unwrap_or(0)
    }

    fn commit_time(&mut self, file: &Path, base_dir: &Path) -> Option<i64> {
        let repo = self.cache.repository_for(base_dir)?;
        let relative = relative_to_workdir(repo, file)?;
        newest_eligible_commit_time(repo, &relative, &self.ignored_commits)
    }
}

fn resolve_doc_path(link: &str, base_dir: &Path) -> PathBuf {
    let full = base_dir.join(link);
    if full.exists() {
        return full;
    }
    markdown_candidate(link, base_dir)
}

fn relative_to_workdir(repo: &GitRepository, file: &Path) -> Option<PathBuf> {
    let absolute = file.canonicalize().unwrap_or_else(|_| file.to_path_buf());
    absolute
        .strip_prefix(&repo.workdir)
        .ok()
        .map(|p| p.to_path_buf())
}

fn newest_eligible_commit_time(
    repo: &GitRepository,
    relative: &Path,
    ignored: &HashSet<String>,
) -> Option<i64> {
    let mut revwalk = repo.repo.revwalk().ok()?;
    let _ = revwalk.set_sorting(Sort::TIME);
    revwalk.push_head().ok()?;

    let mut touching = 0usize;
    for oid in revwalk {
        if touching >= MAX_HISTORY_DEPTH {
            break;
        }
        let Ok(oid) = oid else { continue };
        let Ok(commit) = repo.repo.find_commit(oid) else {
            continue;
        };
        if !touches_path(&commit, relative) {
            continue;
        }
        touching += 1;
        if ignored.contains(&oid.to_string()) {
            continue;
        }
        return Some(commit.time().seconds());
    }

    None
}

/// A commit touches the path when the blob there differs from the first
/// parent's (including the path appearing for the first time).
fn touches_path(commit: &Commit<'_>, relative: &Path) -> bool {
    let Some(current) = blob_id_at(commit, relative) else {
        return false;
    };
    let parent = commit.parent(0).ok().and_then(|p| blob_id_at(&p, relative));
    parent != Some(current)
}

fn blob_id_at(commit: &Commit<'_>, relative: &Path) -> Option<Oid> {
    let tree = commit.tree().ok()?;
    let entry = tree.get_path(relative).ok()?;
    Some(entry.id())
}

fn mtime_seconds(path: &Path) -> Option<i64> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    let elapsed = modified.duration_since(UNIX_EPOCH).ok()?;
    Some(elapsed.as_secs() as i64)
}
