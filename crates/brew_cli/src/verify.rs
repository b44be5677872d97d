//! `brew verify`: check a snapshot file without loading it into a store.

use crate::GlobalArgs;

/// Runs `brew verify`.
///
/// Returns exit code 0 if the file is valid or absent and 1 if it is
/// unreadable. Other I/O failures are errors.
pub fn run(global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let path = &global.state_path;
    match brew_state::snapshot::inspect(path) {
        Ok(None) => {
            if !global.quiet {
                println!("no state file at {}", path.display());
            }
            Ok(0)
        }
        Ok(Some(info)) => {
            if !global.quiet {
                println!("{}: ok", path.display());
                println!("  format version  {}", info.header.format_version);
                println!("  entries         {}", info.header.entry_count);
                println!("  checksum        {}", info.header.checksum);
                println!("  size            {} bytes", info.file_len);
            }
            Ok(0)
        }
        Err(e) if e.is_corruption() => {
            eprintln!("{}: {e}", path.display());
            eprintln!("run `brew reset --yes` to discard it");
            Ok(1)
        }
        Err(e) => Err(e.into()),
    }
}
