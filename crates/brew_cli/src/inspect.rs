//! `brew list`, `brew get`, `brew delete` and `brew stats`.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use brew_state::snapshot::StateMap;
use brew_state::{split_qualified, LoadStatus, StateStore};

use crate::{GlobalArgs, ListArgs, OutputFormat};

/// Bucket for keys recorded without a stage prefix.
const UNQUALIFIED: &str = "(unqualified)";

fn open(global: &GlobalArgs) -> Result<Arc<StateStore>, Box<dyn std::error::Error>> {
    Ok(StateStore::open(&global.state_path, global.policy)?)
}

/// Keeps the entries recorded by `stage`, or all entries if `None`.
fn filter_stage(entries: StateMap, stage: Option<&str>) -> StateMap {
    match stage {
        None => entries,
        Some(stage) => entries
            .into_iter()
            .filter(|(key, _)| split_qualified(key).is_some_and(|(s, _)| s == stage))
            .collect(),
    }
}

fn render_list(entries: &StateMap, format: OutputFormat) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(entries),
        OutputFormat::Text => Ok(entries
            .iter()
            .map(|(key, value)| format!("{key}  {value}"))
            .collect::<Vec<_>>()
            .join("\n")),
    }
}

/// Counts entries per stage prefix.
fn stage_counts(keys: &[String]) -> BTreeMap<&str, usize> {
    let mut counts = BTreeMap::new();
    for key in keys {
        let stage = split_qualified(key).map_or(UNQUALIFIED, |(stage, _)| stage);
        *counts.entry(stage).or_insert(0) += 1;
    }
    counts
}

fn describe_status(status: &LoadStatus) -> String {
    match status {
        LoadStatus::Fresh => "no file yet".to_string(),
        LoadStatus::Loaded { entries } => format!("loaded {entries} entries"),
        LoadStatus::Recovered { reason } => format!("unreadable, started empty ({reason})"),
    }
}

/// Summarizes the intermediate directory: whether it exists and how many
/// files it holds.
fn describe_intermediates(dir: &Path) -> String {
    match std::fs::read_dir(dir) {
        Ok(entries) => {
            let files = entries
                .filter_map(Result::ok)
                .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
                .count();
            format!("{files} files")
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => "not created yet".to_string(),
        Err(e) => format!("unreadable ({e})"),
    }
}

/// Runs `brew list`.
pub fn list(args: &ListArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let store = open(global)?;
    let entries = filter_stage(store.entries(), args.stage.as_deref());
    let rendered = render_list(&entries, args.format)?;
    if !rendered.is_empty() {
        println!("{rendered}");
    }
    Ok(0)
}

/// Runs `brew get`. Returns exit code 1 if the key is absent.
pub fn get(key: &str, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let store = open(global)?;
    match store.get(key) {
        Some(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(0)
        }
        None => {
            eprintln!("no entry for '{key}'");
            Ok(1)
        }
    }
}

/// Runs `brew delete`. Returns exit code 1 if the key is absent.
pub fn delete(key: &str, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let store = open(global)?;
    if store.delete(key)? {
        if !global.quiet {
            eprintln!("  Deleted `{key}`");
        }
        Ok(0)
    } else {
        eprintln!("no entry for '{key}'");
        Ok(1)
    }
}

/// Runs `brew stats`.
pub fn stats(global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let store = open(global)?;
    let keys = store.keys();

    println!("state file: {}", store.path().display());
    println!("status:     {}", describe_status(store.load_status()));
    println!(
        "outputs:    {} ({})",
        global.intermediate_dir.display(),
        describe_intermediates(&global.intermediate_dir)
    );
    println!("entries:    {}", keys.len());
    let counts = stage_counts(&keys);
    let width = counts.keys().map(|s| s.len()).max().unwrap_or(0);
    for (stage, count) in counts {
        println!("  {stage:<width$}  {count}");
    }
    Ok(0)
}
