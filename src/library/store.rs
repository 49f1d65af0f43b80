// src/library/store.rs
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::Library;

const LIBRARY_STORE_VERSION: u32 = 1;

fn default_store_version() -> u32 {
    0
}

#[derive(Serialize, Deserialize)]
struct StoredLibrary {
    #[serde(default = "default_store_version")]
    version: u32,
    #[serde(flatten)]
    library: Library,
}

/// `data_cache.json`: the catalogued library between runs.
#[derive(Clone, Debug)]
pub struct LibraryStore {
    path: PathBuf,
}

impl LibraryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Unreadable or outdated files yield an empty library.
    pub fn load(&self) -> Library {
        let path = &self.path;
        match fs::read(path) {
            Ok(bytes) => match serde_json::from_slice::<StoredLibrary>(&bytes) {
                Ok(stored) if stored.version > LIBRARY_STORE_VERSION => {
                    warn!(
                        "Library cache {} has newer version {}; starting empty.",
                        path.display(),
                        stored.version
                    );
                    Library::default()
                }
                Ok(stored) => stored.library,
                Err(err) => {
                    warn!(
                        "Failed to parse library cache {}: {err}. Starting empty.",
                        path.display()
                    );
                    Library::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => Library::default(),
            Err(err) => {
                warn!("Failed to read library cache {}: {err}", path.display());
                Library::default()
            }
        }
    }

    pub fn save(&self, library: &Library) -> io::Result<()> {
        let stored = StoredLibrary {
            version: LIBRARY_STORE_VERSION,
            library: library.clone(),
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let data = serde_json::to_vec_pretty(&stored).map_err(io::Error::other)?;
        fs::write(&tmp, data)?;
        fs::rename(tmp, &self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::{ItemKey, MediaItem, Metadata, MetadataState, SeriesEntry};

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = LibraryStore::new(dir.path().join("data_cache.json"));

        let mut lib = Library::default();
        lib.movies.push(MediaItem {
            id: 3,
            title: "Heat".into(),
            year: Some(1995),
            path: "/m/Heat.mkv".into(),
            season: None,
            episode: None,
            metadata: Metadata {
                state: MetadataState::Found,
                rating: Some("8.3".into()),
                ..Default::default()
            },
            favorite: false,
        });
        lib.series.insert("Dark".into(), SeriesEntry::new("Dark"));
        lib.toggle_favorite(&ItemKey::Movie(3));

        store.save(&lib).unwrap();
        assert_eq!(store.load(), lib);
    }

    #[test]
    fn garbage_or_missing_file_gives_empty_library() {
        let dir = tempfile::tempdir().unwrap();
        let store = LibraryStore::new(dir.path().join("data_cache.json"));
        assert!(store.load().is_empty());
        fs::write(store.path(), "[1, 2").unwrap();
        assert!(store.load().is_empty());
    }

    #[test]
    fn unversioned_file_still_loads() {
        let dir = tempfile::tempdir().unwrap();
        let store = LibraryStore::new(dir.path().join("data_cache.json"));
        fs::write(
            store.path(),
            r#"{"movies": [{"id": 1, "title": "Alien", "path": "/m/Alien.mkv"}], "series": {}}"#,
        )
        .unwrap();
        let lib = store.load();
        assert_eq!(lib.movies.len(), 1);
        assert!(lib.movies[0].metadata.is_missing());
    }
}
