// LogTally - platform/fs.rs
//
// Expansion of command-line input paths into the list of log files to
// ingest. Files named explicitly are always taken; directories are walked
// and filtered by filename glob patterns.
//
// Per-entry traversal errors are non-fatal and returned as warnings; a
// missing top-level path or an empty result is an error.

use crate::util::constants;
use crate::util::error::IngestError;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Settings for directory inputs.
#[derive(Debug, Clone)]
pub struct InputConfig {
    /// Filename globs a file inside an input directory must match.
    /// Empty means every file is taken.
    pub include_patterns: Vec<String>,

    /// Maximum directory recursion depth.
    pub max_depth: usize,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            include_patterns: constants::DEFAULT_INCLUDE_PATTERNS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            max_depth: constants::DEFAULT_MAX_DEPTH,
        }
    }
}

/// Expand `inputs` into a de-duplicated list of files, preserving the
/// order inputs were given in. Files found inside a directory are sorted
/// by path.
///
/// Returns the files plus non-fatal warnings.
pub fn collect_input_files(
    inputs: &[PathBuf],
    config: &InputConfig,
) -> Result<(Vec<PathBuf>, Vec<String>), IngestError> {
    let include_pats = compile_patterns(&config.include_patterns);
    let max_depth = config.max_depth.min(constants::ABSOLUTE_MAX_DEPTH);

    let mut files = Vec::new();
    let mut seen = HashSet::new();
    let mut warnings = Vec::new();

    for input in inputs {
        let metadata = std::fs::metadata(input).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => IngestError::InputNotFound {
                path: input.clone(),
            },
            _ => IngestError::Read {
                path: input.clone(),
                source: e,
            },
        })?;

        if !metadata.is_dir() {
            if seen.insert(input.clone()) {
                files.push(input.clone());
            }
            continue;
        }

        let mut found = walk_directory(input, max_depth, &include_pats, &mut warnings);
        found.sort();
        tracing::debug!(
            dir = %input.display(),
            files = found.len(),
            "Input directory expanded"
        );
        for path in found {
            if seen.insert(path.clone()) {
                files.push(path);
            }
        }
    }

    if files.is_empty() {
        return Err(IngestError::NoInputFiles);
    }
    Ok((files, warnings))
}

fn walk_directory(
    root: &Path,
    max_depth: usize,
    include_pats: &[glob::Pattern],
    warnings: &mut Vec<String>,
) -> Vec<PathBuf> {
    let mut found = Vec::new();
    for entry_result in walkdir::WalkDir::new(root)
        .max_depth(max_depth)
        .follow_links(false)
    {
        let entry = match entry_result {
            Ok(e) => e,
            Err(e) => {
                let err = IngestError::Traversal {
                    path: e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf()),
                    source: e,
                };
                tracing::debug!(warning = %err, "Input traversal warning");
                warnings.push(err.to_string());
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let Some(file_name) = entry.file_name().to_str() else {
            warnings.push(format!(
                "Skipping '{}': non-UTF-8 filename",
                entry.path().display()
            ));
            continue;
        };

        if is_included(file_name, include_pats) {
            found.push(entry.into_path());
        } else {
            tracing::trace!(file = file_name, "Not matched by include patterns");
        }
    }
    found
}

/// Compile glob strings, logging and skipping any that are invalid.
fn compile_patterns(patterns: &[String]) -> Vec<glob::Pattern> {
    patterns
        .iter()
        .filter_map(|p| match glob::Pattern::new(p) {
            Ok(compiled) => Some(compiled),
            Err(e) => {
                tracing::warn!(pattern = p, error = %e, "Invalid include pattern, skipping");
                None
            }
        })
        .collect()
}

/// An empty include list means "include all".
fn is_included(file_name: &str, include_pats: &[glob::Pattern]) -> bool {
    include_pats.is_empty() || include_pats.iter().any(|p| p.matches(file_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn make_tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();
        fs::create_dir_all(root.join("nested")).unwrap();
        fs::write(root.join("b.log"), "x").unwrap();
        fs::write(root.join("a.log"), "x").unwrap();
        fs::write(root.join("access_log"), "x").unwrap();
        fs::write(root.join("notes.md"), "x").unwrap();
        fs::write(root.join("nested").join("c.log.1"), "x").unwrap();
        dir
    }

    fn names(files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_directory_is_filtered_and_sorted() {
        let tree = make_tree();
        let (files, warnings) =
            collect_input_files(&[tree.path().to_path_buf()], &InputConfig::default()).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(names(&files), vec!["a.log", "access_log", "b.log", "c.log.1"]);
    }

    #[test]
    fn test_explicit_file_bypasses_patterns() {
        let tree = make_tree();
        let notes = tree.path().join("notes.md");
        let (files, _) = collect_input_files(&[notes.clone()], &InputConfig::default()).unwrap();
        assert_eq!(files, vec![notes]);
    }

    #[test]
    fn test_duplicates_are_dropped() {
        let tree = make_tree();
        let a = tree.path().join("a.log");
        let (files, _) = collect_input_files(
            &[a.clone(), tree.path().to_path_buf()],
            &InputConfig::default(),
        )
        .unwrap();
        assert_eq!(files[0], a);
        assert_eq!(files.iter().filter(|p| **p == a).count(), 1);
    }

    #[test]
    fn test_max_depth_limits_walk() {
        let tree = make_tree();
        let config = InputConfig {
            max_depth: 1,
            ..InputConfig::default()
        };
        let (files, _) = collect_input_files(&[tree.path().to_path_buf()], &config).unwrap();
        assert!(!names(&files).contains(&"c.log.1".to_string()));
    }

    #[test]
    fn test_missing_input_is_error() {
        let result = collect_input_files(
            &[PathBuf::from("/nonexistent/logtally-input.log")],
            &InputConfig::default(),
        );
        assert!(matches!(result, Err(IngestError::InputNotFound { .. })));
    }

    #[test]
    fn test_empty_directory_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = collect_input_files(&[dir.path().to_path_buf()], &InputConfig::default());
        assert!(matches!(result, Err(IngestError::NoInputFiles)));
    }
}
