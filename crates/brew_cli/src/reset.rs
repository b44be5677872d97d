//! `brew reset`: discard all recorded state.

use brew_common::CorruptStatePolicy;
use brew_state::{LoadStatus, StateStore};

use crate::{GlobalArgs, ResetArgs};

/// Runs `brew reset`.
///
/// Refuses without `--yes`. The store is opened with
/// [`CorruptStatePolicy::Reset`] regardless of configuration, so an
/// unreadable file is replaced by an empty snapshot instead of blocking
/// the reset.
pub fn run(args: &ResetArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    if !args.yes {
        eprintln!(
            "refusing to reset {} without --yes; every stage will recompute",
            global.state_path.display()
        );
        return Ok(1);
    }

    let store = StateStore::open(&global.state_path, CorruptStatePolicy::Reset)?;
    let recovered = matches!(store.load_status(), LoadStatus::Recovered { .. });
    let removed = store.clear()?;

    if !global.quiet {
        if recovered {
            eprintln!(
                "  Replaced unreadable state file {}",
                store.path().display()
            );
        } else {
            eprintln!(
                "  Removed {removed} entries from {}",
                store.path().display()
            );
        }
    }
    Ok(0)
}
