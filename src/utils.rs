//! Utility functions for link paths and output-tree cleanup

use crate::config::RetryConfig;
use crate::error::{Error, Result};
use crate::retry::with_retry;
use std::path::{MAIN_SEPARATOR, Path, PathBuf};

/// A path from one exported file to another, ready to put in Markdown
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelativeLink {
    /// Readable form, e.g. `./0 Card - Attachments/a1.png`
    pub path: String,
    /// Link target with spaces encoded as `%20`
    pub encoded: String,
}

/// Encode the spaces in a link target
///
/// Markdown link targets end at the first unescaped space; nothing else needs encoding for
/// the viewers this output is written for.
pub fn encode_spaces(path: &str) -> String {
    path.replace(' ', "%20")
}

/// Build the link from `from_dir` to `target`
///
/// The path starts with `./`. With `forward_slashes`, backslash separators are converted
/// (Obsidian doesn't follow `\`).
///
/// # Examples
///
/// ```
/// use t2md::utils::relative_link;
/// use std::path::Path;
///
/// let link = relative_link(
///     Path::new("/out/t2md/Work/0 Todo"),
///     Path::new("/out/t2md/Work/0 Todo/0 Card - Attachments/a1.png"),
///     true,
/// );
/// assert_eq!(link.path, "./0 Card - Attachments/a1.png");
/// assert_eq!(link.encoded, "./0%20Card%20-%20Attachments/a1.png");
/// ```
pub fn relative_link(from_dir: &Path, target: &Path, forward_slashes: bool) -> RelativeLink {
    let relative: PathBuf =
        pathdiff::diff_paths(target, from_dir).unwrap_or_else(|| target.to_path_buf());

    let mut path = format!(".{MAIN_SEPARATOR}{}", relative.display());
    if forward_slashes {
        path = path.replace('\\', "/");
    }

    RelativeLink {
        encoded: encode_spaces(&path),
        path,
    }
}

/// Delete a directory tree, retrying each directory while something holds it open
///
/// Directories are removed deepest first so a handle held on one folder (a file explorer
/// window, a sync client) only delays that folder. A missing `path` is not an error.
pub async fn remove_dir_all_with_retries(path: &Path, retry: &RetryConfig) -> Result<()> {
    if !tokio::fs::try_exists(path).await? {
        return Ok(());
    }

    // pre-order, so reversing puts every directory after its descendants
    let mut directories = vec![path.to_path_buf()];
    let mut pending = vec![path.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                directories.push(entry.path());
                pending.push(entry.path());
            }
        }
    }

    for dir in directories.iter().rev() {
        with_retry(retry, || async move {
            match tokio::fs::remove_dir_all(dir).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(Error::Io(e)),
            }
        })
        .await?;
    }

    tracing::debug!(path = %path.display(), "removed previous export");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn link_to_sibling_folder_file() {
        let link = relative_link(
            Path::new("/out/t2md/Work/0 Todo"),
            Path::new("/out/t2md/Work/0 Todo/1 Other card.md"),
            false,
        );
        assert_eq!(link.path, format!(".{MAIN_SEPARATOR}1 Other card.md"));
        assert_eq!(link.encoded, format!(".{MAIN_SEPARATOR}1%20Other%20card.md"));
    }

    #[test]
    fn link_across_boards_walks_up() {
        let link = relative_link(
            Path::new("/out/t2md/Work/0 Todo/archived"),
            Path::new("/out/t2md/Home/1 Done/0 Card.md"),
            true,
        );
        assert_eq!(link.path, "./../../../Home/1 Done/0 Card.md");
        assert_eq!(link.encoded, "./../../../Home/1%20Done/0%20Card.md");
    }

    #[test]
    fn forward_slash_option_normalises_backslashes() {
        let link = relative_link(Path::new("/a"), Path::new("/a/b\\c.md"), true);
        assert!(!link.path.contains('\\'), "{}", link.path);
    }

    #[test]
    fn encode_spaces_only_touches_spaces() {
        assert_eq!(encode_spaces("./a b/c%20d.md"), "./a%20b/c%20d.md");
    }

    #[tokio::test]
    async fn removes_nested_tree() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("t2md");
        std::fs::create_dir_all(root.join("Work/0 Todo/archived")).unwrap();
        std::fs::create_dir_all(root.join("Home")).unwrap();
        std::fs::write(root.join("Work.json"), "{}").unwrap();
        std::fs::write(root.join("Work/0 Todo/0 Card.md"), "# Card").unwrap();

        let retry = RetryConfig {
            max_attempts: 2,
            initial_delay: Duration::from_millis(1),
            ..Default::default()
        };
        remove_dir_all_with_retries(&root, &retry).await.unwrap();

        assert!(!root.exists());
        assert!(dir.path().exists(), "parent folder is left alone");
    }

    #[tokio::test]
    async fn missing_tree_is_ok() {
        let dir = tempdir().unwrap();
        remove_dir_all_with_retries(&dir.path().join("nope"), &RetryConfig::default())
            .await
            .unwrap();
    }
}
