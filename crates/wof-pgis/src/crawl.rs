//! File-tree crawler
//!
//! `walkdir` iterates on a blocking thread and hands entries to the async
//! visitor over a bounded channel, one at a time. The visitor drives the
//! pace: the walker stalls while a visit is running and stops as soon as the
//! visitor fails.

use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::warn;
use walkdir::{DirEntry, WalkDir};

use crate::error::{IndexError, IndexResult};

/// Entries buffered between the walker thread and the visitor
const CRAWL_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlOptions {
    /// Log and skip entries below the root that fail to stat or list (stale
    /// NFS handles, files vanishing mid-crawl) instead of aborting the crawl.
    /// Errors on the root itself always abort.
    pub nfs_kludge: bool,

    pub follow_links: bool,
}

/// Visit every entry below `root`, stopping at the first visitor error
pub async fn crawl<F, Fut>(root: &Path, options: CrawlOptions, mut visit: F) -> IndexResult<()>
where
    F: FnMut(DirEntry) -> Fut,
    Fut: Future<Output = IndexResult<()>>,
{
    let (tx, mut rx) = mpsc::channel::<Result<DirEntry, walkdir::Error>>(CRAWL_BUFFER);
    let walk_root: PathBuf = root.to_path_buf();

    let walker = tokio::task::spawn_blocking(move || {
        for entry in WalkDir::new(&walk_root).follow_links(options.follow_links) {
            if tx.blocking_send(entry).is_err() {
                // visitor gave up
                break;
            }
        }
    });

    let result = async {
        while let Some(entry) = rx.recv().await {
            match entry {
                Ok(entry) => visit(entry).await?,
                Err(err) if options.nfs_kludge && err.depth() > 0 => {
                    warn!(error = %err, "Skipping unreadable entry");
                },
                Err(err) => return Err(IndexError::from(err)),
            }
        }
        Ok(())
    }
    .await;

    drop(rx);
    walker.await?;
    result
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("101/736/545");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("101736545.geojson"), "{}").unwrap();
        std::fs::write(dir.path().join("README.md"), "").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_visits_every_file() {
        let dir = tree();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        crawl(dir.path(), CrawlOptions::default(), move |entry| {
            let sink = sink.clone();
            async move {
                if entry.file_type().is_file() {
                    sink.lock().unwrap().push(entry.file_name().to_string_lossy().into_owned());
                }
                Ok(())
            }
        })
        .await
        .unwrap();

        let mut seen = seen.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec!["101736545.geojson", "README.md"]);
    }

    #[tokio::test]
    async fn test_stops_at_first_visitor_error() {
        let dir = tree();
        let mut visits = 0;

        let result = crawl(dir.path(), CrawlOptions::default(), |_entry| {
            visits += 1;
            async { Err(IndexError::Manifest("stop".to_string())) }
        })
        .await;

        assert!(matches!(result, Err(IndexError::Manifest(_))));
        assert_eq!(visits, 1);
    }

    #[tokio::test]
    async fn test_missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");

        let result = crawl(&missing, CrawlOptions::default(), |_entry| async { Ok(()) }).await;
        assert!(matches!(result, Err(IndexError::Walk(_))));
    }

    #[tokio::test]
    async fn test_nfs_kludge_still_rejects_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("typo-no-such-dir");

        let tolerant = CrawlOptions {
            nfs_kludge: true,
            ..CrawlOptions::default()
        };
        let result = crawl(&missing, tolerant, |_entry| async { Ok(()) }).await;
        assert!(matches!(result, Err(IndexError::Walk(_))));
    }
}
