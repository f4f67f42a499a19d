//! GitHub repositories as ingestion sources.
//!
//! `codepilot ingest https://github.com/org/repo` (or the same string as
//! `repo_path` in `POST /ingest`) makes a shallow clone into a temporary
//! directory, ingests it like a local path, and removes the clone when the
//! [`Checkout`] is dropped, whether ingestion succeeded or not.
//!
//! Accepted spellings, all normalized to `https://github.com/<owner>/<repo>.git`:
//!
//! ```text
//! https://github.com/org/repo      http://github.com/org/repo/
//! https:/github.com/org/repo       github.com/org/repo
//! git@github.com:org/repo.git      https://github.com/org/repo/tree/main
//! ```

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const GITHUB_HOST: &str = "github.com/";

/// Canonical HTTPS clone URL for `input`, or `None` if it does not name a
/// GitHub repository.
pub fn normalize_github_url(input: &str) -> Option<String> {
    let s = input.trim();
    let rest = match s.strip_prefix("git@github.com:") {
        Some(rest) => rest,
        None => {
            let s = ["https://", "http://", "https:/", "http:/"]
                .iter()
                .find_map(|scheme| s.strip_prefix(scheme))
                .unwrap_or(s);
            let s = s.strip_prefix("www.").unwrap_or(s);
            s.strip_prefix(GITHUB_HOST)?
        }
    };

    let mut parts = rest.trim_end_matches('/').split('/');
    let owner = parts.next().filter(|p| is_name(p))?;
    let repo = parts.next()?;
    let repo = repo.strip_suffix(".git").unwrap_or(repo);
    if !is_name(repo) {
        return None;
    }
    Some(format!("https://github.com/{}/{}.git", owner, repo))
}

pub fn is_github_url(input: &str) -> bool {
    normalize_github_url(input).is_some()
}

fn is_name(part: &str) -> bool {
    !part.is_empty()
        && part != "."
        && part != ".."
        && part
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// A cloned working tree that is deleted on drop.
#[derive(Debug)]
pub struct Checkout {
    path: PathBuf,
    _dir: TempDir,
}

impl Checkout {
    /// Root of the working tree. Its final component is the repository
    /// name, so it doubles as the ingested repo name.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Checkout {
    fn drop(&mut self) {
        tracing::debug!(path = %self.path.display(), "removing temporary clone");
    }
}

/// Shallow-clone the GitHub repository named by `url`.
pub fn clone_github_repo(url: &str) -> Result<Checkout> {
    let remote = normalize_github_url(url)
        .with_context(|| format!("Not a GitHub repository URL: {}", url))?;
    clone_repo(&remote)
}

fn clone_repo(remote: &str) -> Result<Checkout> {
    let dir = tempfile::Builder::new()
        .prefix("codepilot-clone-")
        .tempdir()
        .context("Failed to create temporary clone directory")?;
    let name = remote
        .trim_end_matches(".git")
        .rsplit('/')
        .next()
        .filter(|n| !n.is_empty())
        .unwrap_or("repo");
    let path = dir.path().join(name);

    tracing::info!(%remote, dest = %path.display(), "cloning repository");
    let output = Command::new("git")
        .args(["clone", "--depth", "1", "--single-branch", "--quiet"])
        .arg(remote)
        .arg(&path)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .with_context(|| "Failed to execute 'git clone'. Is git installed?")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git clone of {} failed: {}", remote, stderr.trim());
    }

    Ok(Checkout { path, _dir: dir })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_github_urls() {
        let cases = [
            ("https://github.com/facebook/react", true),
            ("http://github.com/user/repo", true),
            ("https:/github.com/user/repo", true),
            ("git@github.com:user/repo.git", true),
            ("github.com/user/repo", true),
            ("/path/to/local/repo", false),
            ("data/fastapi/fastapi", false),
            ("C:\\Users\\repo", false),
            ("https://gitlab.com/user/repo", false),
            ("https://github.com/user", false),
        ];
        for (input, expected) in cases {
            assert_eq!(is_github_url(input), expected, "{}", input);
        }
    }

    #[test]
    fn test_normalizes_to_https_clone_url() {
        let cases = [
            ("https://github.com/facebook/react", "https://github.com/facebook/react.git"),
            ("http://github.com/user/repo", "https://github.com/user/repo.git"),
            ("https:/github.com/user/repo", "https://github.com/user/repo.git"),
            ("git@github.com:user/repo.git", "https://github.com/user/repo.git"),
            ("github.com/user/repo", "https://github.com/user/repo.git"),
            ("https://github.com/user/repo/", "https://github.com/user/repo.git"),
            ("https://github.com/user/repo.git", "https://github.com/user/repo.git"),
            ("https://www.github.com/user/repo", "https://github.com/user/repo.git"),
            ("https://github.com/user/repo/tree/main", "https://github.com/user/repo.git"),
        ];
        for (input, expected) in cases {
            assert_eq!(normalize_github_url(input).as_deref(), Some(expected), "{}", input);
        }
    }

    #[test]
    fn test_rejects_path_tricks() {
        assert!(normalize_github_url("github.com/../etc").is_none());
        assert!(normalize_github_url("github.com/user/re po").is_none());
        assert!(normalize_github_url("github.com/user/.git").is_none());
    }

    #[test]
    fn test_clone_non_github_url_fails() {
        let err = clone_github_repo("/tmp/not-a-remote").unwrap_err();
        assert!(err.to_string().contains("Not a GitHub repository URL"));
    }

    #[test]
    fn test_failed_clone_is_an_error() {
        let missing = tempfile::tempdir().unwrap();
        let remote = format!("file://{}/missing.git", missing.path().display());
        assert!(clone_repo(&remote).is_err());
    }
}
