//! Process-wide table of open stores, keyed by normalized backing path.
//!
//! Two independent instances writing full snapshots to the same file would
//! overwrite each other's entries. Opening a path that is already open hands
//! back the live instance instead.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, Weak};

use crate::error::StateError;
use crate::store::StateStore;

static OPEN_STORES: OnceLock<Mutex<HashMap<PathBuf, Weak<StateStore>>>> = OnceLock::new();

/// Symlink hops followed before a path is taken as is.
const MAX_LINK_DEPTH: usize = 40;

/// Makes `path` absolute and resolves `.`, `..` and symlinks.
///
/// Unlike [`Path::canonicalize`] the path does not need to exist: components
/// past the deepest existing directory are kept as spelled, so a store opened
/// before its directory is created gets the same key as one opened after.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    resolve(&absolute, 0)
}

fn resolve(path: &Path, depth: usize) -> PathBuf {
    let mut resolved = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => resolved.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            Component::Normal(name) => {
                let next = resolved.join(name);
                match std::fs::read_link(&next) {
                    // relative targets resolve against the link's directory
                    Ok(target) if depth < MAX_LINK_DEPTH => {
                        resolved = resolve(&resolved.join(target), depth + 1);
                    }
                    _ => resolved = next,
                }
            }
        }
    }
    resolved
}

/// Returns the live store for `path`, or opens one with `open`.
///
/// The table lock is held while `open` runs so concurrent first opens of the
/// same path load the file once.
pub(crate) fn open_shared<F>(path: &Path, open: F) -> Result<Arc<StateStore>, StateError>
where
    F: FnOnce(PathBuf) -> Result<StateStore, StateError>,
{
    let key = normalize(path);
    let mut stores = OPEN_STORES
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner);

    if let Some(existing) = stores.get(&key).and_then(Weak::upgrade) {
        tracing::debug!(path = %key.display(), "reusing open state store");
        return Ok(existing);
    }
    stores.retain(|_, store| store.strong_count() > 0);

    let store = Arc::new(open(key.clone())?);
    stores.insert(key, Arc::downgrade(&store));
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_is_absolute() {
        let p = normalize(Path::new("some/relative/state.file"));
        assert!(p.is_absolute());
        assert!(p.ends_with("some/relative/state.file"));
    }

    #[test]
    fn normalize_resolves_existing_parent() {
        let dir = tempfile::tempdir().unwrap();
        let via_dot = dir.path().join(".").join("s.state");
        let direct = dir.path().join("s.state");
        assert_eq!(normalize(&via_dot), normalize(&direct));
    }

    #[test]
    fn normalize_missing_dirs_with_parent_segments() {
        let dir = tempfile::tempdir().unwrap();
        let direct = dir.path().join("new").join("s.state");
        let roundabout = dir
            .path()
            .join("new")
            .join("..")
            .join("new")
            .join(".")
            .join("s.state");
        assert!(!dir.path().join("new").exists());
        assert_eq!(normalize(&roundabout), normalize(&direct));
    }

    #[test]
    fn normalize_stable_once_dirs_exist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("s.state");
        let before = normalize(&path);
        std::fs::create_dir_all(dir.path().join("a").join("b")).unwrap();
        assert_eq!(normalize(&path), before);
    }

    #[cfg(unix)]
    #[test]
    fn normalize_follows_dangling_symlink() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real");
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let through_link = normalize(&link.join("s.state"));
        std::fs::create_dir(&real).unwrap();
        assert_eq!(through_link, normalize(&real.join("s.state")));
    }

    #[cfg(unix)]
    #[test]
    fn normalize_relative_symlink_and_parent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("data").join("deep")).unwrap();
        std::os::unix::fs::symlink("data/deep", dir.path().join("short")).unwrap();

        // `..` after a link steps out of the link's target, not the link
        let via_link = normalize(&dir.path().join("short").join("..").join("s.state"));
        assert_eq!(via_link, normalize(&dir.path().join("data").join("s.state")));
    }

    #[cfg(unix)]
    #[test]
    fn normalize_symlink_loop_terminates() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        std::os::unix::fs::symlink(&b, &a).unwrap();
        std::os::unix::fs::symlink(&a, &b).unwrap();
        assert!(normalize(&a.join("s.state")).is_absolute());
    }
}
