//! Plain-text output for terminals.

use std::io::{self, Write};
use std::path::PathBuf;

use crate::store::DuplicateGroup;

/// Write duplicate groups, one header line per hash followed by its files.
pub fn write_report<W: Write>(writer: &mut W, groups: &[DuplicateGroup]) -> io::Result<()> {
    if groups.is_empty() {
        return writeln!(writer, "No duplicates found.");
    }

    for (index, group) in groups.iter().enumerate() {
        if index > 0 {
            writeln!(writer)?;
        }
        writeln!(writer, "{} ({} files)", group.hash, group.len())?;
        for path in &group.paths {
            writeln!(writer, "  {}", path.display())?;
        }
    }

    let extra: usize = groups.iter().map(|g| g.len().saturating_sub(1)).sum();
    writeln!(writer)?;
    writeln!(
        writer,
        "{} duplicate group(s), {} redundant file(s)",
        groups.len(),
        extra
    )
}

/// Write a titled list of paths.
pub fn write_paths<W: Write>(writer: &mut W, title: &str, paths: &[PathBuf]) -> io::Result<()> {
    writeln!(writer, "{title} ({}):", paths.len())?;
    for path in paths {
        writeln!(writer, "  {}", path.display())?;
    }
    Ok(())
}
