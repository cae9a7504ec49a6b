//! Pidfile writer.

use std::fs;
use std::path::Path;

use crate::error::AppResult;

/// Truncate (or create) the file at `path` and write the current process's
/// pid as a decimal string.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn write_pidfile(path: &Path) -> AppResult<()> {
    let pid = std::process::id();
    fs::write(path, pid.to_string())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_the_current_pid_as_decimal() {
        let dir = std::env::temp_dir().join(format!("dispatchd-pidfile-test-{}", std::process::id()));
        write_pidfile(&dir).unwrap();
        let contents = fs::read_to_string(&dir).unwrap();
        assert_eq!(contents, std::process::id().to_string());
        let _ = fs::remove_file(&dir);
    }
}
