//! Side-effecting adapters: host backends, operator prompts, files.

pub mod config;
pub mod host;
pub mod operator;
pub mod report;
pub mod schema_file;
pub mod sim;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Replace `path` with `contents` through a sibling temp file and a rename,
/// so readers never see a half-written config or report. `what` names the
/// file in error messages.
pub(crate) fn write_atomic(path: &Path, contents: &str, what: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or(what);
    let tmp_path = path.with_extension(format!("{ext}.tmp"));
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp {what} {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {what} {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_atomic_creates_parents_and_leaves_no_temp_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("runs").join("last.json");
        write_atomic(&path, "{}\n", "report").expect("write");
        write_atomic(&path, "{\"x\":1}\n", "report").expect("overwrite");
        assert_eq!(fs::read_to_string(&path).expect("read"), "{\"x\":1}\n");
        assert!(!path.with_extension("json.tmp").exists());
    }
}
