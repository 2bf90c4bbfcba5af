//! Wire types for the qBittorrent Web API v2.

use std::path::{Path, PathBuf};

use offload_core::Item;
use serde::Deserialize;

/// Subset of `/api/v2/torrents/info` entries used for discovery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TorrentInfo {
    /// Info-hash, used as the item id.
    pub hash: String,
    /// Torrent display name.
    pub name: String,
    /// Category; empty when unset.
    pub category: String,
    /// Absolute path of the torrent content (qBittorrent 4.3.2+).
    pub content_path: String,
    /// Directory the torrent is saved under.
    pub save_path: String,
}

/// Entry of `/api/v2/torrents/files`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TorrentFile {
    /// Path of the file relative to the torrent's save path.
    pub name: String,
}

impl TorrentInfo {
    fn candidates(&self) -> (Option<PathBuf>, Option<PathBuf>) {
        let content = (!self.content_path.is_empty()).then(|| PathBuf::from(&self.content_path));
        let joined = (!self.save_path.is_empty() && !self.name.is_empty())
            .then(|| Path::new(&self.save_path).join(&self.name));
        (content, joined)
    }

    /// `content_path` if it exists on disk, else `save_path/name` if that does.
    #[must_use]
    pub fn existing_content_path(&self) -> Option<PathBuf> {
        let (content, joined) = self.candidates();
        content
            .filter(|path| path.exists())
            .or_else(|| joined.filter(|path| path.exists()))
    }

    /// Path the torrent claims, whether or not it exists yet.
    #[must_use]
    pub fn declared_content_path(&self) -> Option<PathBuf> {
        let (content, joined) = self.candidates();
        content.or(joined)
    }

    /// Local path of the content.
    ///
    /// Prefers an existing path from [`Self::existing_content_path`], then
    /// whichever of the declared paths is populated.
    #[must_use]
    pub fn resolve_content_path(&self) -> Option<PathBuf> {
        self.existing_content_path()
            .or_else(|| self.declared_content_path())
    }

    /// Folder holding a multi-file torrent, derived from its first file.
    ///
    /// Single-file listings yield `None`; their parent is the shared save
    /// folder, not the torrent's own content.
    #[must_use]
    pub fn content_dir_from_files(&self, files: &[TorrentFile]) -> Option<PathBuf> {
        if self.save_path.is_empty() {
            return None;
        }
        let first = Path::new(&files.first()?.name);
        let parent = first.parent().filter(|parent| !parent.as_os_str().is_empty())?;
        Some(Path::new(&self.save_path).join(parent)).filter(|path| path.exists())
    }

    /// Engine item for this torrent with its content at `path`.
    #[must_use]
    pub fn into_item_at(self, path: PathBuf) -> Item {
        let item = Item::new(self.hash, self.name, path);
        if self.category.is_empty() {
            item
        } else {
            item.with_category(self.category)
        }
    }

    /// Convert into an engine item; `None` when no content path can be derived.
    #[must_use]
    pub fn into_item(self) -> Option<Item> {
        let path = self.resolve_content_path()?;
        Some(self.into_item_at(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn decodes_sparse_entries() -> Result<()> {
        let info: TorrentInfo = serde_json::from_value(json!({
            "hash": "abc",
            "name": "Show",
            "progress": 1.0,
        }))?;
        assert_eq!(info.hash, "abc");
        assert!(info.category.is_empty());
        assert!(info.into_item().is_none());
        Ok(())
    }

    #[test]
    fn falls_back_to_save_path_when_content_path_is_missing() -> Result<()> {
        let temp = TempDir::new()?;
        std::fs::create_dir(temp.path().join("Show"))?;
        let info = TorrentInfo {
            hash: "abc".into(),
            name: "Show".into(),
            category: "tv".into(),
            content_path: "/nonexistent/Show".into(),
            save_path: temp.path().to_string_lossy().into_owned(),
        };

        let item = info.into_item().expect("item is derived");
        assert_eq!(item.local_path, temp.path().join("Show"));
        assert_eq!(item.category.as_deref(), Some("tv"));
        Ok(())
    }

    #[test]
    fn first_file_names_the_content_folder() -> Result<()> {
        let temp = TempDir::new()?;
        std::fs::create_dir(temp.path().join("Pack"))?;
        let info = TorrentInfo {
            hash: "abc".into(),
            name: "Renamed Pack".into(),
            save_path: temp.path().to_string_lossy().into_owned(),
            ..TorrentInfo::default()
        };
        let file = |name: &str| TorrentFile { name: name.into() };

        assert!(info.existing_content_path().is_none());
        assert_eq!(
            info.content_dir_from_files(&[file("Pack/e1.mkv"), file("Pack/e2.mkv")]),
            Some(temp.path().join("Pack"))
        );
        assert!(info.content_dir_from_files(&[file("single.mkv")]).is_none());
        assert!(info.content_dir_from_files(&[file("Missing/e1.mkv")]).is_none());
        assert!(info.content_dir_from_files(&[]).is_none());
        Ok(())
    }

    #[test]
    fn keeps_content_path_when_nothing_exists_yet() {
        let info = TorrentInfo {
            hash: "abc".into(),
            name: "Show".into(),
            content_path: "/downloads/Show".into(),
            save_path: "/downloads".into(),
            ..TorrentInfo::default()
        };
        assert_eq!(
            info.resolve_content_path(),
            Some(PathBuf::from("/downloads/Show"))
        );
    }
}
