//! Batch drivers
//!
//! Enumerate many source files and index each of them:
//!
//! - [`Indexer::index_directory`] crawls a tree and indexes matching files
//!   one after another, aborting at the first failure
//! - [`Indexer::index_file_list`], [`Indexer::index_meta_file`] and
//!   [`Indexer::index_paths`] fan out over at most `workers` concurrent
//!   tasks and collect per-record outcomes in a [`BatchReport`]
//!
//! Only errors in the manifest itself (unreadable list, missing `path`
//! column) are returned as `Err`. Failed records are reported, not raised.

use futures::StreamExt;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex, PoisonError};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinError, JoinSet};
use tracing::{error, info, warn};

use crate::crawl::{crawl, CrawlOptions};
use crate::engine::{Execution, IndexOutcome, Indexer};
use crate::error::{IndexError, IndexResult};
use crate::store::RecordSink;

/// Record files are named `<id>.geojson`
#[allow(clippy::expect_used)]
static WOF_FILENAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\.geojson$").expect("valid filename pattern"));

/// Whether a file name looks like a Who's On First record
pub fn is_wof_filename(name: &str) -> bool {
    WOF_FILENAME.is_match(name)
}

/// A record that could not be indexed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordFailure {
    /// Source file, when known
    pub path: Option<PathBuf>,
    pub error: String,
}

/// Outcome counts for a batch run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub dispatched: usize,
    pub indexed: usize,
    pub skipped: usize,
    pub dry_run: usize,
    pub failures: Vec<RecordFailure>,
}

impl BatchReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, path: Option<PathBuf>, result: IndexResult<IndexOutcome>) {
        match result {
            Ok(IndexOutcome::Indexed(_)) => self.indexed += 1,
            Ok(IndexOutcome::Skipped(_)) => self.skipped += 1,
            Ok(IndexOutcome::DryRun(_)) => self.dry_run += 1,
            Err(err) => {
                error!(
                    path = %path.as_deref().map(|p| p.display().to_string()).unwrap_or_default(),
                    error = %err,
                    "Failed to index record"
                );
                self.failures.push(RecordFailure {
                    path,
                    error: err.to_string(),
                });
            },
        }
    }

    fn log_summary(&self, source: &Path) {
        info!(
            source = %source.display(),
            dispatched = self.dispatched,
            indexed = self.indexed,
            skipped = self.skipped,
            dry_run = self.dry_run,
            failed = self.failed(),
            "Batch complete"
        );
    }
}

type TaskOutput = (PathBuf, IndexResult<IndexOutcome>);

/// Bounded fan-out: one slot per running task, joined before returning
struct FanOut {
    slots: Arc<Semaphore>,
    tasks: JoinSet<TaskOutput>,
    /// Source file of every running task, so a panicked task is still attributed
    paths: HashMap<Id, PathBuf>,
    report: BatchReport,
}

impl FanOut {
    fn new(workers: usize) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(workers.max(1))),
            tasks: JoinSet::new(),
            paths: HashMap::new(),
            report: BatchReport::default(),
        }
    }

    /// Wait for a free slot, then run `work` on its own task
    async fn dispatch<F>(&mut self, path: PathBuf, work: F) -> IndexResult<()>
    where
        F: Future<Output = IndexResult<IndexOutcome>> + Send + 'static,
    {
        let slot = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| IndexError::Closed("worker pool"))?;

        self.report.dispatched += 1;
        let task_path = path.clone();
        let handle = self.tasks.spawn(async move {
            let result = work.await;
            drop(slot);
            (task_path, result)
        });
        self.paths.insert(handle.id(), path);

        while let Some(done) = self.tasks.try_join_next_with_id() {
            self.collect(done);
        }
        Ok(())
    }

    async fn join(mut self) -> BatchReport {
        while let Some(done) = self.tasks.join_next_with_id().await {
            self.collect(done);
        }
        self.report
    }

    fn collect(&mut self, done: Result<(Id, TaskOutput), JoinError>) {
        match done {
            Ok((id, (path, result))) => {
                self.paths.remove(&id);
                self.report.record(Some(path), result);
            },
            Err(err) => {
                let path = self.paths.remove(&err.id());
                self.report.record(path, Err(IndexError::Task(err)));
            },
        }
    }
}

impl<S: RecordSink + 'static> Indexer<S> {
    /// Crawl `root` and index every `<id>.geojson` file in turn
    ///
    /// The first record that fails aborts the crawl with
    /// [`IndexError::Crawl`] naming the file.
    pub async fn index_directory(
        &self,
        root: &Path,
        collection: &str,
        options: CrawlOptions,
        execution: Execution,
    ) -> IndexResult<BatchReport> {
        info!(root = %root.display(), collection, "Indexing directory");

        let report = Mutex::new(BatchReport::default());
        crawl(root, options, |entry| {
            let is_file = entry.file_type().is_file();
            let path = entry.into_path();
            let matches = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(is_wof_filename);
            let report = &report;

            async move {
                if !matches || !is_file {
                    return Ok(());
                }

                let result = self.index_file(&path, collection, execution).await;
                let mut report = report.lock().unwrap_or_else(PoisonError::into_inner);
                report.dispatched += 1;
                match result {
                    Ok(outcome) => {
                        report.record(Some(path), Ok(outcome));
                        Ok(())
                    },
                    Err(err) => Err(IndexError::Crawl {
                        path,
                        source: Box::new(err),
                    }),
                }
            }
        })
        .await?;

        let report = report.into_inner().unwrap_or_else(PoisonError::into_inner);
        report.log_summary(root);
        Ok(report)
    }

    /// Index every path listed, one per line, in `list`
    pub async fn index_file_list(
        &self,
        list: &Path,
        collection: &str,
        execution: Execution,
    ) -> IndexResult<BatchReport> {
        info!(list = %list.display(), collection, "Indexing file list");

        let file = tokio::fs::File::open(list)
            .await
            .map_err(|e| IndexError::io(list, e))?;
        let mut lines = BufReader::new(file).lines();
        let mut fan_out = FanOut::new(self.options().workers);

        let read = async {
            while let Some(line) = lines.next_line().await.map_err(|e| IndexError::io(list, e))? {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                self.dispatch(&mut fan_out, PathBuf::from(line), collection, execution)
                    .await?;
            }
            Ok::<_, IndexError>(())
        }
        .await;

        self.finish(fan_out, list, read).await
    }

    /// Index every row of a CSV manifest, resolving its `path` column
    /// against `data_root`
    pub async fn index_meta_file(
        &self,
        manifest: &Path,
        collection: &str,
        data_root: &Path,
        execution: Execution,
    ) -> IndexResult<BatchReport> {
        info!(
            manifest = %manifest.display(),
            data_root = %data_root.display(),
            collection,
            "Indexing meta file"
        );

        let file = tokio::fs::File::open(manifest)
            .await
            .map_err(|e| IndexError::io(manifest, e))?;
        let mut reader = csv_async::AsyncReaderBuilder::new().create_reader(file);
        let mut fan_out = FanOut::new(self.options().workers);

        let read = async {
            let column = reader
                .headers()
                .await?
                .iter()
                .position(|header| header == "path")
                .ok_or_else(|| IndexError::Manifest("missing 'path' column in meta file".to_string()))?;

            let mut rows = reader.records();
            while let Some(row) = rows.next().await {
                let row = row?;
                match row.get(column).map(str::trim) {
                    Some(rel_path) if !rel_path.is_empty() => {
                        self.dispatch(&mut fan_out, data_root.join(rel_path), collection, execution)
                            .await?;
                    },
                    _ => warn!(line = row.position().map(|p| p.line()), "Row has an empty path"),
                }
            }
            Ok::<_, IndexError>(())
        }
        .await;

        self.finish(fan_out, manifest, read).await
    }

    /// Index an explicit set of files with the same bounded fan-out
    pub async fn index_paths<I>(
        &self,
        paths: I,
        collection: &str,
        execution: Execution,
    ) -> IndexResult<BatchReport>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut fan_out = FanOut::new(self.options().workers);
        let mut read = Ok(());
        for path in paths {
            if let Err(err) = self.dispatch(&mut fan_out, path, collection, execution).await {
                read = Err(err);
                break;
            }
        }
        self.finish(fan_out, Path::new("<arguments>"), read).await
    }

    async fn dispatch(
        &self,
        fan_out: &mut FanOut,
        path: PathBuf,
        collection: &str,
        execution: Execution,
    ) -> IndexResult<()> {
        let indexer = self.clone();
        let collection = collection.to_string();
        let task_path = path.clone();

        fan_out
            .dispatch(path, async move {
                indexer.index_file(&task_path, &collection, execution).await
            })
            .await
    }

    /// Join every dispatched task, then surface a manifest error if reading stopped early
    async fn finish(
        &self,
        fan_out: FanOut,
        source: &Path,
        read: IndexResult<()>,
    ) -> IndexResult<BatchReport> {
        let report = fan_out.join().await;
        report.log_summary(source);
        read.map(|()| report)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::IndexerOptions;
    use crate::store::{MemorySink, WofRecord};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn write_feature(dir: &Path, rel: &str, id: i64, repo: Option<&str>) -> PathBuf {
        let mut body = json!({
            "type": "Feature",
            "id": id,
            "geometry": {"type": "Point", "coordinates": [1.0, 2.0]},
            "properties": {
                "wof:name": format!("Place {}", id),
                "wof:placetype": "venue",
                "wof:parent_id": 1
            }
        });
        if let Some(repo) = repo {
            body["properties"]["wof:repo"] = json!(repo);
        }
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, body.to_string()).unwrap();
        path
    }

    fn indexer(workers: usize) -> Indexer<MemorySink> {
        Indexer::new(
            MemorySink::new(),
            IndexerOptions {
                workers,
                ..IndexerOptions::default()
            },
        )
    }

    #[test]
    fn test_wof_filename_pattern() {
        assert!(is_wof_filename("101736545.geojson"));
        assert!(is_wof_filename("101736545-alt-quattroshapes-123.geojson"));
        assert!(!is_wof_filename("101736545-alt-quattroshapes.geojson"));
        assert!(!is_wof_filename("101736545.geojson.bak"));
        assert!(!is_wof_filename("README.md"));
    }

    #[tokio::test]
    async fn test_directory_indexes_matching_files() {
        let dir = tempfile::tempdir().unwrap();
        write_feature(dir.path(), "data/101/101.geojson", 101, Some("wof-data"));
        write_feature(dir.path(), "data/102/102.geojson", 102, Some("wof-data"));
        write_feature(dir.path(), "data/0/0.geojson", 0, Some("wof-data"));
        std::fs::write(dir.path().join("data/notes.txt"), "ignored").unwrap();

        let indexer = indexer(2);
        let report = indexer
            .index_directory(dir.path(), "wof", CrawlOptions::default(), Execution::Apply)
            .await
            .unwrap();

        assert_eq!(report.indexed, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(indexer.sink().len(), 2);
    }

    #[tokio::test]
    async fn test_directory_aborts_on_first_failure() {
        let dir = tempfile::tempdir().unwrap();
        let bad = write_feature(dir.path(), "103.geojson", 103, None);

        let err = indexer(2)
            .index_directory(dir.path(), "wof", CrawlOptions::default(), Execution::Apply)
            .await
            .unwrap_err();

        match err {
            IndexError::Crawl { path, source } => {
                assert_eq!(path, bad);
                assert!(matches!(*source, IndexError::MissingRepo { id: 103 }));
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_directory_skips_dirs_named_like_records() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("500.geojson")).unwrap();
        write_feature(dir.path(), "501.geojson", 501, Some("wof-data"));

        let report = indexer(1)
            .index_directory(dir.path(), "wof", CrawlOptions::default(), Execution::Apply)
            .await
            .unwrap();
        assert_eq!(report.dispatched, 1);
        assert_eq!(report.indexed, 1);
    }

    #[tokio::test]
    async fn test_directory_with_nfs_kludge_rejects_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let options = CrawlOptions {
            nfs_kludge: true,
            ..CrawlOptions::default()
        };

        let result = indexer(1)
            .index_directory(&dir.path().join("typo-no-such-dir"), "wof", options, Execution::Apply)
            .await;
        assert!(matches!(result, Err(IndexError::Walk(_))));
    }

    #[tokio::test]
    async fn test_panicked_task_keeps_its_path() {
        let mut fan_out = FanOut::new(2);
        let path = PathBuf::from("/data/85/633/793/85633793.geojson");

        fan_out
            .dispatch(path.clone(), async {
                let fail = true;
                if fail {
                    panic!("worker blew up");
                }
                Ok(IndexOutcome::Indexed(0))
            })
            .await
            .unwrap();
        fan_out
            .dispatch(PathBuf::from("1.geojson"), async { Ok(IndexOutcome::Indexed(1)) })
            .await
            .unwrap();

        let report = fan_out.join().await;
        assert_eq!(report.indexed, 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.failures[0].path.as_deref(), Some(path.as_path()));
        assert!(report.failures[0].error.contains("Worker task failed"));
    }

    #[tokio::test]
    async fn test_file_list_reports_failures() {
        let dir = tempfile::tempdir().unwrap();
        let good = write_feature(dir.path(), "201.geojson", 201, Some("wof-data"));
        let bad = write_feature(dir.path(), "202.geojson", 202, None);
        let missing = dir.path().join("203.geojson");

        let list = dir.path().join("files.txt");
        std::fs::write(
            &list,
            format!("{}\n\n{}\n{}\n", good.display(), bad.display(), missing.display()),
        )
        .unwrap();

        let indexer = indexer(2);
        let report = indexer.index_file_list(&list, "wof", Execution::Apply).await.unwrap();

        assert_eq!(report.dispatched, 3);
        assert_eq!(report.indexed, 1);
        assert_eq!(report.failed(), 2);
        assert!(!report.is_success());
        assert!(report.failures.iter().any(|f| f.path.as_deref() == Some(bad.as_path())));
        assert!(indexer.sink().get(201).is_some());
    }

    #[tokio::test]
    async fn test_missing_file_list_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = indexer(1)
            .index_file_list(&dir.path().join("nope.txt"), "wof", Execution::Apply)
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::Io { .. }));
    }

    #[tokio::test]
    async fn test_meta_file_resolves_against_data_root() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        write_feature(&data, "301/301.geojson", 301, Some("wof-data"));
        write_feature(&data, "302/302.geojson", 302, Some("wof-data"));

        let manifest = dir.path().join("meta.csv");
        std::fs::write(
            &manifest,
            "id,path,name\n301,301/301.geojson,Place 301\n302,302/302.geojson,Place 302\n",
        )
        .unwrap();

        let indexer = indexer(4);
        let report = indexer
            .index_meta_file(&manifest, "wof", &data, Execution::Apply)
            .await
            .unwrap();

        assert_eq!(report.indexed, 2);
        assert!(report.is_success());
        assert_eq!(indexer.sink().len(), 2);
    }

    #[tokio::test]
    async fn test_meta_file_without_path_column() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("meta.csv");
        std::fs::write(&manifest, "id,name\n1,Somewhere\n").unwrap();

        let err = indexer(1)
            .index_meta_file(&manifest, "wof", dir.path(), Execution::Apply)
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::Manifest(_)));
    }

    #[tokio::test]
    async fn test_dry_run_batch() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_feature(dir.path(), "401.geojson", 401, Some("wof-data"));

        let indexer = indexer(1);
        let report = indexer.index_paths(vec![path], "wof", Execution::DryRun).await.unwrap();
        assert_eq!(report.dry_run, 1);
        assert!(indexer.sink().is_empty());
    }

    /// Sink that tracks how many upserts run at the same time
    #[derive(Default)]
    struct ConcurrencyProbe {
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl RecordSink for ConcurrencyProbe {
        async fn upsert(&self, _record: &WofRecord) -> IndexResult<()> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_fan_out_is_bounded_by_workers() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<PathBuf> = (1..=12)
            .map(|id| write_feature(dir.path(), &format!("{id}.geojson"), id, Some("wof-data")))
            .collect();

        let indexer = Indexer::new(
            ConcurrencyProbe::default(),
            IndexerOptions {
                workers: 3,
                ..IndexerOptions::default()
            },
        );
        let report = indexer.index_paths(paths, "wof", Execution::Apply).await.unwrap();

        assert_eq!(report.indexed, 12);
        assert!(indexer.sink().peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(indexer.sink().running.load(Ordering::SeqCst), 0);
    }
}
