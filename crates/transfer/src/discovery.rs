//! Auto-discovery of a bundled `ossutil` binary.

use std::path::{Path, PathBuf};

/// Program name used when nothing is bundled; resolved through `PATH`.
pub const DEFAULT_BINARY: &str = "ossutil";

#[cfg(windows)]
const BINARY_FILE: &str = "ossutil.exe";
#[cfg(not(windows))]
const BINARY_FILE: &str = "ossutil";

/// Returns the binary to fall back to when the configured one cannot start.
///
/// Looks next to the running executable, then in its `bin/` directory, then
/// in `bin/` under the working directory (development layout). Falls back to
/// [`DEFAULT_BINARY`].
pub fn discover_default_binary() -> String {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));
    let cwd = std::env::current_dir().ok();

    match discover_in(exe_dir.as_deref(), cwd.as_deref()) {
        Some(path) => {
            tracing::debug!(path = %path.display(), "discovered bundled ossutil");
            path.to_string_lossy().into_owned()
        }
        None => DEFAULT_BINARY.to_string(),
    }
}

/// Candidate search behind [`discover_default_binary`].
pub fn discover_in(exe_dir: Option<&Path>, cwd: Option<&Path>) -> Option<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(dir) = exe_dir {
        candidates.push(dir.join(BINARY_FILE));
        candidates.push(dir.join("bin").join(BINARY_FILE));
    }
    if let Some(dir) = cwd {
        candidates.push(dir.join("bin").join(BINARY_FILE));
    }
    candidates.into_iter().find(|p| p.is_file())
}
