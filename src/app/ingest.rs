// LogTally - app/ingest.rs
//
// `process_logs` pipeline: read each input file line by line, parse,
// and store every accepted event.
//
// Error policy:
//   - A line that fails to parse is counted and skipped; the run continues.
//   - A line that is not valid UTF-8 counts as malformed.
//   - Read errors and store errors abort the run.
//
// Several files are ingested on a rayon pool. Each worker lazily opens its
// own Store on the same database file and reuses it across files; the
// UNIQUE user-agent key plus re-read on conflict keeps the dimension table
// free of duplicates.

use crate::core::model::{FileSummary, IngestSummary};
use crate::core::parser;
use crate::store::{Store, StoreConfig};
use crate::util::constants;
use crate::util::error::{IngestError, ParseError, Result};
use crate::util::logging;
use rayon::prelude::*;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Options for a multi-file ingest run.
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Worker threads for multi-file runs. 0 = one per CPU core, 1 = sequential.
    pub worker_threads: usize,

    /// Connection settings for the per-worker stores.
    pub store: StoreConfig,
}

/// Ingest every file in `files` into `store`'s database.
///
/// Files are ingested sequentially on `store` when there is only one file,
/// when `worker_threads` is 1, or when the store is in-memory (a private
/// in-memory database cannot be shared with other connections). Otherwise
/// each file is ingested on a pool worker with its own connection.
///
/// Per-file summaries are returned in the order of `files`.
pub fn ingest_files(
    store: &mut Store,
    files: &[PathBuf],
    options: &IngestOptions,
) -> Result<IngestSummary> {
    let start = Instant::now();

    let parallel_db = match store.path() {
        Some(db) if files.len() > 1 && options.worker_threads != 1 => Some(db.to_path_buf()),
        _ => None,
    };

    let summaries = match parallel_db {
        Some(db) => ingest_parallel(&db, files, options)?,
        None => files
            .iter()
            .map(|path| ingest_file(store, path))
            .collect::<Result<Vec<_>>>()?,
    };

    let summary = IngestSummary {
        files: summaries,
        duration: start.elapsed(),
    };

    tracing::info!(
        files = summary.files.len(),
        lines = summary.lines_read(),
        inserted = summary.events_inserted(),
        malformed = summary.malformed_lines(),
        bad_timestamps = summary.bad_timestamp_lines(),
        elapsed_ms = summary.duration.as_millis() as u64,
        "Ingest complete"
    );

    Ok(summary)
}

fn ingest_parallel(
    db: &Path,
    files: &[PathBuf],
    options: &IngestOptions,
) -> Result<Vec<FileSummary>> {
    let threads = options.worker_threads.min(constants::MAX_WORKER_THREADS);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("ingest-{i}"))
        .build()
        .map_err(|source| IngestError::WorkerPool { source })?;

    tracing::debug!(
        db = %db.display(),
        files = files.len(),
        threads = pool.current_num_threads(),
        "Starting parallel ingest"
    );

    // One connection per rayon work split, opened on its first file and
    // reused for the rest of that split's files.
    pool.install(|| {
        files
            .par_iter()
            .map_init(
                || None::<Store>,
                |worker_store, path| {
                    let mut store = match worker_store.take() {
                        Some(store) => store,
                        None => Store::open(db, &options.store)?,
                    };
                    let summary = ingest_file(&mut store, path);
                    *worker_store = Some(store);
                    summary
                },
            )
            .collect::<Result<Vec<_>>>()
    })
}

/// Ingest one file into `store`.
pub fn ingest_file(store: &mut Store, path: &Path) -> Result<FileSummary> {
    let file = std::fs::File::open(path).map_err(|source| IngestError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let summary = ingest_reader(store, BufReader::new(file), path)?;

    tracing::info!(
        file = %path.display(),
        lines = summary.lines_read,
        inserted = summary.events_inserted,
        skipped = summary.skipped_lines(),
        "File ingested"
    );
    Ok(summary)
}

/// Ingest lines from `reader`. `path` names the source in the summary and
/// in diagnostics.
pub fn ingest_reader<R: BufRead>(
    store: &mut Store,
    mut reader: R,
    path: &Path,
) -> Result<FileSummary> {
    let mut summary = FileSummary::new(path.to_path_buf());
    let mut buf = Vec::new();
    let mut diagnostics_logged = 0usize;

    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .map_err(|source| IngestError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        if read == 0 {
            break;
        }
        summary.lines_read += 1;

        let outcome = match std::str::from_utf8(trim_line_ending(&buf)) {
            Ok(line) => parser::parse_line(line).map_err(|e| (e, logging::preview(line))),
            Err(_) => Err((
                ParseError::Malformed {
                    reason: "line is not valid UTF-8",
                },
                logging::preview(&String::from_utf8_lossy(&buf)),
            )),
        };

        match outcome {
            Ok(event) => {
                store.insert_event(&event)?;
                summary.events_inserted += 1;
            }
            Err((err, preview)) => {
                match err {
                    ParseError::Malformed { .. } => summary.malformed_lines += 1,
                    ParseError::Timestamp { .. } => summary.bad_timestamp_lines += 1,
                }
                if diagnostics_logged < constants::MAX_SKIP_DIAGNOSTICS_PER_FILE {
                    diagnostics_logged += 1;
                    tracing::debug!(
                        file = %path.display(),
                        line = summary.lines_read,
                        error = %err,
                        content = %preview,
                        "Skipping line"
                    );
                } else if diagnostics_logged == constants::MAX_SKIP_DIAGNOSTICS_PER_FILE {
                    diagnostics_logged += 1;
                    tracing::debug!(
                        file = %path.display(),
                        "Skip diagnostic limit reached, further skips are only counted"
                    );
                }
            }
        }
    }

    Ok(summary)
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const GOOD: &str = r#"192.168.1.1 - - [10/Oct/2023:13:55:36 +0000] "GET /index.html HTTP/1.1" 200 1234 "-" "Mozilla/5.0 (Windows NT 10.0; Win64; x64) Chrome/118.0""#;
    const BAD_TIMESTAMP: &str = r#"10.0.0.9 - - [99/Foo/2023:13:55:36 +0000] "GET / HTTP/1.1" 200 1 "-" "curl/8.0""#;

    fn sample_input() -> String {
        format!("{GOOD}\r\nthis is not a log line\n\n{BAD_TIMESTAMP}\n{GOOD}")
    }

    #[test]
    fn test_reader_counts_and_inserts() {
        let mut store = Store::open_in_memory().unwrap();
        let summary = ingest_reader(
            &mut store,
            Cursor::new(sample_input()),
            Path::new("access.log"),
        )
        .unwrap();

        assert_eq!(summary.lines_read, 5);
        assert_eq!(summary.events_inserted, 2);
        assert_eq!(summary.malformed_lines, 2);
        assert_eq!(summary.bad_timestamp_lines, 1);
        assert_eq!(store.entry_count().unwrap(), 2);
        assert_eq!(store.user_agent_count().unwrap(), 1);
    }

    #[test]
    fn test_invalid_utf8_is_malformed() {
        let mut store = Store::open_in_memory().unwrap();
        let mut input = vec![0xff, 0xfe, b'\n'];
        input.extend_from_slice(GOOD.as_bytes());
        let summary =
            ingest_reader(&mut store, Cursor::new(input), Path::new("bin.log")).unwrap();
        assert_eq!(summary.malformed_lines, 1);
        assert_eq!(summary.events_inserted, 1);
    }

    #[test]
    fn test_empty_input() {
        let mut store = Store::open_in_memory().unwrap();
        let summary =
            ingest_reader(&mut store, Cursor::new(Vec::new()), Path::new("empty.log")).unwrap();
        assert_eq!(summary.lines_read, 0);
        assert_eq!(store.entry_count().unwrap(), 0);
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let mut store = Store::open_in_memory().unwrap();
        let err = ingest_file(&mut store, Path::new("/nonexistent/access.log")).unwrap_err();
        assert!(matches!(
            err,
            crate::util::error::LogTallyError::Ingest(IngestError::Read { .. })
        ));
    }

    #[test]
    fn test_parallel_ingest_shares_dimension() {
        let dir = tempfile::tempdir().unwrap();
        let mut files = Vec::new();
        for i in 0..6 {
            let path = dir.path().join(format!("access{i}.log"));
            std::fs::write(&path, format!("{GOOD}\n{GOOD}\nbroken\n")).unwrap();
            files.push(path);
        }

        let db = dir.path().join("tally.db");
        let mut store = Store::open(&db, &StoreConfig::default()).unwrap();
        let options = IngestOptions {
            worker_threads: 3,
            ..IngestOptions::default()
        };
        let summary = ingest_files(&mut store, &files, &options).unwrap();

        assert_eq!(summary.files.len(), 6);
        assert_eq!(summary.files[2].path, files[2]);
        assert_eq!(summary.events_inserted(), 12);
        assert_eq!(summary.malformed_lines(), 6);
        assert_eq!(store.entry_count().unwrap(), 12);
        assert_eq!(store.user_agent_count().unwrap(), 1);
    }

    #[test]
    fn test_parallel_worker_open_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.log");
        let b = dir.path().join("b.log");
        std::fs::write(&a, GOOD).unwrap();
        std::fs::write(&b, GOOD).unwrap();

        // The database would live under a regular file, so no worker can open it.
        let db = a.join("tally.db");
        let options = IngestOptions {
            worker_threads: 2,
            ..IngestOptions::default()
        };
        let err = ingest_parallel(&db, &[a, b], &options).unwrap_err();
        assert!(
            matches!(err, crate::util::error::LogTallyError::Store(_)),
            "{err}"
        );
    }

    #[test]
    fn test_in_memory_store_ingests_sequentially() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.log");
        let b = dir.path().join("b.log");
        std::fs::write(&a, GOOD).unwrap();
        std::fs::write(&b, format!("{GOOD}\n{GOOD}\n")).unwrap();

        let mut store = Store::open_in_memory().unwrap();
        let summary =
            ingest_files(&mut store, &[a, b], &IngestOptions::default()).unwrap();
        assert_eq!(summary.events_inserted(), 3);
        assert_eq!(store.entry_count().unwrap(), 3);
    }
}
