//! Input file globbing for batch conversion.
//!
//! Arguments on the command line are either plain paths or glob patterns
//! such as `data/**/*.csv`. [`expand_inputs`] resolves them into a sorted,
//! de-duplicated list of files.

use crate::error::{Error, Result};
use glob::glob;
use std::collections::BTreeSet;
use std::path::PathBuf;

fn is_pattern(arg: &str) -> bool {
    arg.contains(['*', '?', '['])
}

/// Expand a glob pattern into a sorted vector of matching file paths.
///
/// Directories are skipped. No match is an empty vector.
///
/// # Errors
///
/// Returns [`Error::Config`] for an invalid pattern and [`Error::Io`] when a
/// matched entry cannot be read.
pub fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let paths =
        glob(pattern).map_err(|e| Error::Config(format!("invalid glob pattern {pattern:?}: {e}")))?;

    let mut result = Vec::new();
    for entry in paths {
        let path = entry.map_err(std::io::Error::from)?;
        if path.is_file() {
            result.push(path);
        }
    }
    result.sort();
    Ok(result)
}

/// Resolve every argument to files; plain paths must exist.
///
/// # Errors
///
/// Returns [`Error::NotFound`] for a missing plain path or a pattern that
/// matches nothing.
pub fn expand_inputs<S: AsRef<str>>(args: &[S]) -> Result<Vec<PathBuf>> {
    let mut files = BTreeSet::new();
    for arg in args {
        let arg = arg.as_ref();
        if is_pattern(arg) {
            let matched = expand_glob(arg)?;
            if matched.is_empty() {
                return Err(Error::NotFound(format!("no files match {arg:?}")));
            }
            files.extend(matched);
        } else {
            let path = PathBuf::from(arg);
            if !path.is_file() {
                return Err(Error::NotFound(format!("no such file {arg:?}")));
            }
            files.insert(path);
        }
    }
    Ok(files.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn expands_patterns_and_plain_paths() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.csv", "a.csv", "notes.txt"] {
            fs::write(dir.path().join(name), "x\n1\n").unwrap();
        }
        fs::create_dir(dir.path().join("sub.csv")).unwrap();

        let pattern = format!("{}/*.csv", dir.path().display());
        let plain = dir.path().join("a.csv").display().to_string();
        let files = expand_inputs(&[pattern, plain]).unwrap();

        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.csv", "b.csv"]);
    }

    #[test]
    fn unmatched_pattern_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = format!("{}/*.csv", dir.path().display());
        assert!(expand_inputs(&[pattern]).unwrap_err().is_not_found());
        assert!(expand_inputs(&["/definitely/missing.csv"]).unwrap_err().is_not_found());
    }
}
