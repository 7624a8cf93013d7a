use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::ScoreError;

/// Suffixes the scorer appends to a document stem. Files carrying one are
/// previous outputs, not inputs.
pub const OUTPUT_SUFFIXES: &[&str] = &[
    "_wScoring",
    "_wAggregateScoring",
    "_wText_Extraction",
    "_summary",
];

/// A results document discovered for scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultsDocument {
    /// File stem that output artifacts are named after
    pub stem: String,
    pub path: PathBuf,
    /// Parent directory relative to the scanned root, empty at the top
    pub subdir: PathBuf,
}

impl ResultsDocument {
    fn from_path(path: &Path, root: &Path) -> Option<Self> {
        let stem = path.file_stem()?.to_str()?;
        let subdir = path
            .parent()
            .and_then(|p| p.strip_prefix(root).ok())
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Some(Self {
            stem: stem.to_string(),
            path: path.to_path_buf(),
            subdir,
        })
    }

    /// `<stem><suffix>.<ext>` next to the input, or under `dir` at the
    /// input's position relative to the scanned root.
    pub fn artifact(&self, dir: Option<&Path>, suffix: &str, ext: &str) -> PathBuf {
        let dir = match dir {
            Some(dir) => dir.join(&self.subdir),
            None => self.path.parent().map(Path::to_path_buf).unwrap_or_default(),
        };
        dir.join(format!("{}{suffix}.{ext}", self.stem))
    }
}

// ── Writing ──────────────────────────────────────────────────────────

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ScoreError {
    move |source| ScoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Write a document's artifacts as a set.
///
/// Every file is first written under a `.partial` name; only when all of
/// them are on disk are they renamed into place. A failure removes the
/// staged and already renamed files, so no partial artifact set is left.
pub fn write_artifacts(artifacts: &[(PathBuf, Vec<u8>)]) -> Result<(), ScoreError> {
    let mut staged: Vec<PathBuf> = Vec::new();
    let mut renamed: Vec<&Path> = Vec::new();
    let mut result = stage(artifacts, &mut staged);
    if result.is_ok() {
        for ((path, _), partial) in artifacts.iter().zip(&staged) {
            if let Err(e) = fs::rename(partial, path) {
                result = Err(io_error(path)(e));
                break;
            }
            renamed.push(path);
        }
    }
    if result.is_err() {
        for path in staged.iter().map(PathBuf::as_path).chain(renamed) {
            let _ = fs::remove_file(path);
        }
    }
    result
}

fn stage(artifacts: &[(PathBuf, Vec<u8>)], staged: &mut Vec<PathBuf>) -> Result<(), ScoreError> {
    for (path, bytes) in artifacts {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        let partial = partial_path(path);
        fs::write(&partial, bytes).map_err(io_error(&partial))?;
        staged.push(partial);
    }
    Ok(())
}

/// A single CSV file, or every input CSV below a directory in path order.
///
/// Files whose stem ends in one of `OUTPUT_SUFFIXES` are skipped so that
/// rerunning over a directory does not score its own outputs.
pub fn scan_documents(root: &Path) -> Vec<ResultsDocument> {
    if root.is_file() {
        let parent = root.parent().unwrap_or(Path::new(""));
        return ResultsDocument::from_path(root, parent).into_iter().collect();
    }

    let mut results: Vec<ResultsDocument> = WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|x| x.to_str())
                .is_some_and(|x| x.eq_ignore_ascii_case("csv"))
        })
        .filter_map(|e| ResultsDocument::from_path(e.path(), root))
        .filter(|doc| !is_output_stem(&doc.stem))
        .collect();

    results.sort_by(|a, b| a.path.cmp(&b.path));
    results
}

fn is_output_stem(stem: &str) -> bool {
    OUTPUT_SUFFIXES.iter().any(|s| stem.ends_with(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_skips_outputs_and_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("2019");
        fs::create_dir(&nested).unwrap();
        for name in [
            "funds.csv",
            "funds_wScoring.csv",
            "funds_wAggregateScoring.csv",
            "funds_wText_Extraction.csv",
            "notes.txt",
        ] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        fs::write(nested.join("etfs.CSV"), "").unwrap();

        let docs = scan_documents(dir.path());
        let stems: Vec<&str> = docs.iter().map(|d| d.stem.as_str()).collect();
        assert_eq!(stems, vec!["etfs", "funds"]);
    }

    #[test]
    fn test_scan_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("funds_wScoring.csv");
        fs::write(&path, "").unwrap();
        // an explicit file is taken as given
        let docs = scan_documents(&path);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].stem, "funds_wScoring");
    }

    #[test]
    fn test_artifact_paths() {
        let doc = ResultsDocument {
            stem: "funds".into(),
            path: PathBuf::from("data/funds.csv"),
            subdir: PathBuf::new(),
        };
        assert_eq!(
            doc.artifact(None, "_wScoring", "csv"),
            PathBuf::from("data/funds_wScoring.csv")
        );
        assert_eq!(
            doc.artifact(Some(Path::new("out")), "_summary", "json"),
            PathBuf::from("out/funds_summary.json")
        );
    }

    #[test]
    fn test_same_stem_in_subdirectories_gets_distinct_outputs() {
        let dir = tempfile::tempdir().unwrap();
        for year in ["2019", "2020"] {
            fs::create_dir(dir.path().join(year)).unwrap();
            fs::write(dir.path().join(year).join("funds.csv"), "").unwrap();
        }
        let docs = scan_documents(dir.path());
        assert_eq!(docs.len(), 2);

        let out = Path::new("out");
        let paths: Vec<PathBuf> = docs
            .iter()
            .map(|d| d.artifact(Some(out), "_wScoring", "csv"))
            .collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("out/2019/funds_wScoring.csv"),
                PathBuf::from("out/2020/funds_wScoring.csv"),
            ]
        );
    }

    #[test]
    fn test_write_artifacts_creates_every_file() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.csv");
        let b = dir.path().join("nested").join("b.json");
        write_artifacts(&[(a.clone(), b"x".to_vec()), (b.clone(), b"{}".to_vec())]).unwrap();
        assert_eq!(fs::read(&a).unwrap(), b"x");
        assert_eq!(fs::read(&b).unwrap(), b"{}");
        assert!(!partial_path(&a).exists());
    }

    #[test]
    fn test_failed_write_leaves_no_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.csv");
        // a regular file where a parent directory is needed
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();
        let b = blocker.join("b.csv");

        let err = write_artifacts(&[(a.clone(), b"x".to_vec()), (b, b"y".to_vec())]);
        assert!(err.is_err());
        assert!(!a.exists());
        assert!(!partial_path(&a).exists());
    }
}
