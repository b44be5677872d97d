//! Input fingerprinting and freshness checks.
//!
//! Loaders fingerprint the files a cached output was derived from, store the
//! fingerprint next to the output's location, and compare it on the next run.
//! The store never applies this policy itself; these are the building blocks.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use brew_common::Fingerprint;

use crate::error::StateError;

/// Whether a stored fingerprint still matches the current inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// The stored fingerprint equals the current one.
    Fresh,
    /// A fingerprint is stored but the inputs changed since.
    Stale,
    /// Nothing has been stored yet.
    Missing,
}

impl Freshness {
    /// Compares a stored fingerprint against the current one.
    pub fn classify(stored: Option<Fingerprint>, current: Fingerprint) -> Self {
        match stored {
            Some(fp) if fp == current => Freshness::Fresh,
            Some(_) => Freshness::Stale,
            None => Freshness::Missing,
        }
    }

    /// Returns `true` if the cached output can be reused.
    pub fn is_fresh(self) -> bool {
        self == Freshness::Fresh
    }
}

/// Fingerprints for sets of input files.
pub struct InputFingerprint;

impl InputFingerprint {
    /// Returns the modification time of `path` as `"<secs>.<nanos>"`.
    pub fn mtime_string(path: &Path) -> Result<String, StateError> {
        let io_err = |source| StateError::Io {
            path: path.to_path_buf(),
            source,
        };
        let modified = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .map_err(io_err)?;
        let since_epoch = modified
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Ok(format!(
            "{}.{:09}",
            since_epoch.as_secs(),
            since_epoch.subsec_nanos()
        ))
    }

    /// Fingerprints the modification times of `paths`, in the order given.
    ///
    /// Touching any input, or changing the list, changes the result. Every
    /// path must exist.
    pub fn from_mtimes<P: AsRef<Path>>(paths: &[P]) -> Result<Fingerprint, StateError> {
        let stamps = paths
            .iter()
            .map(|p| Self::mtime_string(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Fingerprint::from_parts(stamps.iter().map(String::as_str)))
    }

    /// Fingerprints the contents of `paths`, in the order given.
    ///
    /// Slower than [`from_mtimes`](Self::from_mtimes) but unaffected by
    /// touches that leave content unchanged.
    pub fn from_contents<P: AsRef<Path>>(paths: &[P]) -> Result<Fingerprint, StateError> {
        let mut digests = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            let content = std::fs::read(path).map_err(|source| StateError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            digests.push(Fingerprint::from_bytes(&content).to_string());
        }
        Ok(Fingerprint::from_parts(digests.iter().map(String::as_str)))
    }

    /// Lists the files in `dir` with extension `ext`, sorted by path.
    pub fn collect_with_extension(dir: &Path, ext: &str) -> Result<Vec<PathBuf>, StateError> {
        let io_err = |source| StateError::Io {
            path: dir.to_path_buf(),
            source,
        };
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(ext) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::{Duration, SystemTime};

    fn set_mtime(path: &Path, secs: u64) {
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
            .unwrap();
    }

    #[test]
    fn classify_freshness() {
        let a = Fingerprint::from_raw(1);
        let b = Fingerprint::from_raw(2);
        assert_eq!(Freshness::classify(Some(a), a), Freshness::Fresh);
        assert_eq!(Freshness::classify(Some(a), b), Freshness::Stale);
        assert_eq!(Freshness::classify(None, a), Freshness::Missing);
        assert!(Freshness::Fresh.is_fresh());
        assert!(!Freshness::Missing.is_fresh());
    }

    #[test]
    fn mtime_string_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.csv");
        std::fs::write(&path, "a,b\n1,2\n").unwrap();
        set_mtime(&path, 1_700_000_000);
        assert_eq!(
            InputFingerprint::mtime_string(&path).unwrap(),
            "1700000000.000000000"
        );
    }

    #[test]
    fn mtimes_change_when_touched() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.wav");
        let b = dir.path().join("b.wav");
        std::fs::write(&a, b"RIFF").unwrap();
        std::fs::write(&b, b"RIFF").unwrap();
        set_mtime(&a, 1_000);
        set_mtime(&b, 2_000);

        let before = InputFingerprint::from_mtimes(&[&a, &b]).unwrap();
        assert_eq!(before, InputFingerprint::from_mtimes(&[&a, &b]).unwrap());

        set_mtime(&b, 3_000);
        let after = InputFingerprint::from_mtimes(&[&a, &b]).unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn mtimes_missing_file_errors() {
        let err = InputFingerprint::from_mtimes(&[Path::new("/nonexistent/train.csv")])
            .unwrap_err();
        assert!(matches!(err, StateError::Io { .. }));
    }

    #[test]
    fn contents_ignore_touch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sampleSubmission.csv");
        std::fs::write(&path, "ID,Prediction\n1,E\n").unwrap();
        let before = InputFingerprint::from_contents(&[&path]).unwrap();

        set_mtime(&path, 42);
        assert_eq!(before, InputFingerprint::from_contents(&[&path]).unwrap());

        std::fs::write(&path, "ID,Prediction\n1,T\n").unwrap();
        assert_ne!(before, InputFingerprint::from_contents(&[&path]).unwrap());
    }

    #[test]
    fn collect_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["cw002.wav", "cw001.wav", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.wav")).unwrap();

        let files = InputFingerprint::collect_with_extension(dir.path(), "wav").unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["cw001.wav", "cw002.wav"]);
    }
}
