use std::path::PathBuf;

use tempfile::TempDir;

/// A fresh directory that lives for the duration of a test and is removed
/// afterwards. Keep the returned guard alive while the path is in use.
pub fn fresh_temp_root(prefix: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .expect("failed to create temp dir");
    let path = dir.path().to_path_buf();
    (dir, path)
}
