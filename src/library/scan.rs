// src/library/scan.rs
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::title::{clean_title, is_video_file, parse_file_name, ParsedName};
use super::{Library, LookupTarget, MediaItem, Metadata, SeriesEntry};
use crate::config::AppConfig;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub movies: usize,
    pub series: usize,
    pub episodes: usize,
    /// Files found under the movie root that carry an episode marker.
    pub episodes_in_movie_root: usize,
    pub reused: usize,
    pub missing_roots: Vec<PathBuf>,
}

impl ScanStats {
    pub fn summary(&self) -> String {
        let mut out = format!(
            "{} movies, {} series ({} episodes)",
            self.movies, self.series, self.episodes
        );
        if !self.missing_roots.is_empty() {
            let roots: Vec<String> = self
                .missing_roots
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            out.push_str(&format!("; missing: {}", roots.join(", ")));
        }
        out
    }
}

#[derive(Clone, Debug, Default)]
pub struct ScanOutcome {
    pub library: Library,
    pub pending: Vec<LookupTarget>,
    pub stats: ScanStats,
}

/// Every video file below `root`, sorted by path. Unreadable entries are skipped.
pub fn collect_video_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(err) => {
                warn!("scan: skipping unreadable entry under {}: {err}", root.display());
                None
            }
        })
        .filter(|e| e.file_type().is_file() && is_video_file(e.path()))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

/// Previous records, so a rescan keeps ids, favorites and metadata.
struct Previous<'a> {
    by_path: HashMap<&'a Path, &'a MediaItem>,
    by_name: HashMap<String, &'a MediaItem>,
    series: &'a std::collections::BTreeMap<String, SeriesEntry>,
    used_ids: HashSet<u64>,
    next_id: u64,
    reused: usize,
}

impl<'a> Previous<'a> {
    /// Only records whose file is gone from `on_disk` can be claimed by name.
    fn new(lib: &'a Library, on_disk: &HashSet<PathBuf>) -> Self {
        let mut by_path = HashMap::new();
        let mut by_name = HashMap::new();
        for item in lib.items() {
            by_path.insert(item.path.as_path(), item);
            if !on_disk.contains(&item.path) {
                by_name.entry(item.file_name()).or_insert(item);
            }
        }
        Self {
            by_path,
            by_name,
            series: &lib.series,
            used_ids: HashSet::new(),
            next_id: lib.next_id(),
            reused: 0,
        }
    }

    /// Build the record for `path`, reusing the old one when it matches by
    /// path, or by file name when the file moved.
    fn item_for(&mut self, path: &Path, parsed: &ParsedName) -> MediaItem {
        let old = self
            .by_path
            .get(path)
            .copied()
            .or_else(|| {
                let name = path.file_name()?.to_string_lossy().into_owned();
                self.by_name.get(&name).copied()
            })
            .filter(|old| !self.used_ids.contains(&old.id));

        let (id, metadata, favorite) = match old {
            Some(old) => {
                self.reused += 1;
                (old.id, old.metadata.clone(), old.favorite)
            }
            None => {
                let id = self.next_id;
                self.next_id += 1;
                (id, Metadata::default(), false)
            }
        };
        self.used_ids.insert(id);

        MediaItem {
            id,
            title: parsed.title.clone(),
            year: parsed.year,
            path: path.to_path_buf(),
            season: parsed.season,
            episode: parsed.episode,
            metadata,
            favorite,
        }
    }

    fn series_entry(&self, name: &str) -> SeriesEntry {
        match self.series.get(name) {
            Some(old) => SeriesEntry {
                name: name.to_string(),
                metadata: old.metadata.clone(),
                favorite: old.favorite,
                episodes: Vec::new(),
            },
            None => SeriesEntry::new(name),
        }
    }
}

/// Show name for a file under the series root without an episode marker:
/// its top-level folder below the root, else its own cleaned name.
fn series_name_for_unmarked(root: &Path, path: &Path, parsed: &ParsedName) -> String {
    path.strip_prefix(root)
        .ok()
        .and_then(|rel| {
            let mut comps = rel.components();
            let first = comps.next()?;
            // The file itself sits directly in the root.
            comps.next()?;
            Some(first.as_os_str().to_string_lossy().into_owned())
        })
        .map(|folder| clean_title(&folder).0)
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| parsed.title.clone())
}

/// Walk the movie root then the series root and rebuild the library.
pub fn scan_library(config: &AppConfig, previous: &Library) -> ScanOutcome {
    let mut library = Library::default();
    let mut stats = ScanStats::default();

    let mut walked = Vec::new();
    let roots = [(config.movie_root(), true), (config.series_root(), false)];
    for (root, is_movie_root) in roots {
        let Some(root) = root else {
            continue;
        };
        if !root.is_dir() {
            warn!("scan: root {} is missing; skipped", root.display());
            stats.missing_roots.push(root);
            continue;
        }
        let files = collect_video_files(&root);
        info!("scan: {} video files under {}", files.len(), root.display());
        walked.push((root, is_movie_root, files));
    }

    let on_disk: HashSet<PathBuf> = walked
        .iter()
        .flat_map(|(_, _, files)| files.iter().cloned())
        .collect();
    let mut prev = Previous::new(previous, &on_disk);
    let mut seen: HashSet<PathBuf> = HashSet::new();

    for (root, is_movie_root, files) in walked {
        for path in files {
            if !seen.insert(path.clone()) {
                debug!("scan: {} already catalogued", path.display());
                continue;
            }
            let parsed = parse_file_name(&path);
            let item = prev.item_for(&path, &parsed);

            if is_movie_root && !parsed.is_episode() {
                library.movies.push(item);
                continue;
            }

            if is_movie_root {
                stats.episodes_in_movie_root += 1;
            }
            let name = if parsed.is_episode() {
                parsed.title.clone()
            } else {
                series_name_for_unmarked(&root, &path, &parsed)
            };
            library
                .series
                .entry(name.clone())
                .or_insert_with(|| prev.series_entry(&name))
                .episodes
                .push(item);
        }
    }

    stats.movies = library.movies.len();
    stats.series = library.series.len();
    stats.episodes = library.episode_count();
    stats.reused = prev.reused;

    let pending = library.pending_lookups();
    info!(
        "scan: {} ({} reused, {} need metadata)",
        stats.summary(),
        stats.reused,
        pending.len()
    );

    ScanOutcome {
        library,
        pending,
        stats,
    }
}
