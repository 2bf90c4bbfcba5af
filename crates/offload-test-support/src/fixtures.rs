//! On-disk content fixtures.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use offload_core::Item;

/// Create `root/name/` holding a single payload file and return its path.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be created.
pub fn content_dir(root: &Path, name: &str) -> io::Result<PathBuf> {
    let dir = root.join(name);
    fs::create_dir_all(&dir)?;
    fs::write(dir.join("payload.bin"), name.as_bytes())?;
    Ok(dir)
}

/// Create a single file `root/name` with `bytes` and return its path.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn content_file(root: &Path, name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
    let path = root.join(name);
    fs::write(&path, bytes)?;
    Ok(path)
}

/// Create content for `name` under `root` and describe it as an item.
///
/// # Errors
///
/// Returns an error if the content cannot be created.
pub fn item_with_content(root: &Path, id: &str, name: &str) -> io::Result<Item> {
    Ok(Item::new(id, name, content_dir(root, name)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::TempDir;

    #[test]
    fn fixtures_create_content() -> Result<()> {
        let temp = TempDir::new()?;
        let item = item_with_content(temp.path(), "h1", "A")?;
        assert_eq!(item.local_path, temp.path().join("A"));
        assert!(item.local_path.join("payload.bin").is_file());

        let file = content_file(temp.path(), "single.mkv", b"abc")?;
        assert_eq!(fs::read(file)?, b"abc");
        Ok(())
    }
}
