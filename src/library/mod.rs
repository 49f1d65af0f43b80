// src/library/mod.rs
pub mod browse;
pub mod metadata;
pub mod posters;
pub mod scan;
pub mod store;
pub mod subtitles;
pub mod title;
pub mod worker;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub use title::VIDEO_EXTENSIONS;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataState {
    #[default]
    Missing,
    Found,
    NotFound,
}

/// What we know about a title from the metadata service.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub state: MetadataState,
    #[serde(default)]
    pub rating: Option<String>,
    #[serde(default)]
    pub plot: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub imdb_id: Option<String>,
    #[serde(default)]
    pub poster_url: Option<String>,
    /// Local cached poster file.
    #[serde(default)]
    pub poster: Option<PathBuf>,
}

impl Metadata {
    pub fn not_found() -> Self {
        Self {
            state: MetadataState::NotFound,
            ..Default::default()
        }
    }

    pub fn is_missing(&self) -> bool {
        self.state == MetadataState::Missing
    }

    pub fn rating_value(&self) -> Option<f32> {
        self.rating.as_deref().and_then(|r| r.trim().parse().ok())
    }

    pub fn genres(&self) -> impl Iterator<Item = &str> {
        self.genre
            .as_deref()
            .unwrap_or("")
            .split(',')
            .map(str::trim)
            .filter(|g| !g.is_empty() && !g.eq_ignore_ascii_case("N/A"))
    }
}

/// One scanned video file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub year: Option<i32>,
    pub path: PathBuf,
    #[serde(default)]
    pub season: Option<u32>,
    #[serde(default)]
    pub episode: Option<u32>,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub favorite: bool,
}

impl MediaItem {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn episode_label(&self) -> String {
        match (self.season, self.episode) {
            (Some(s), Some(e)) => format!("S{s:02}E{e:02}"),
            _ => self.file_name(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeriesEntry {
    pub name: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub favorite: bool,
    #[serde(default)]
    pub episodes: Vec<MediaItem>,
}

impl SeriesEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            metadata: Metadata::default(),
            favorite: false,
            episodes: Vec::new(),
        }
    }

    /// Episodes grouped by season; season 0 holds files without a marker.
    pub fn seasons(&self) -> BTreeMap<u32, Vec<&MediaItem>> {
        let mut out: BTreeMap<u32, Vec<&MediaItem>> = BTreeMap::new();
        for ep in &self.episodes {
            out.entry(ep.season.unwrap_or(0)).or_default().push(ep);
        }
        for eps in out.values_mut() {
            eps.sort_by(|a, b| {
                a.episode
                    .unwrap_or(u32::MAX)
                    .cmp(&b.episode.unwrap_or(u32::MAX))
                    .then_with(|| a.path.cmp(&b.path))
            });
        }
        out
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Library {
    #[serde(default)]
    pub movies: Vec<MediaItem>,
    #[serde(default)]
    pub series: BTreeMap<String, SeriesEntry>,
}

impl Library {
    pub fn is_empty(&self) -> bool {
        self.movies.is_empty() && self.series.is_empty()
    }

    pub fn episode_count(&self) -> usize {
        self.series.values().map(|s| s.episodes.len()).sum()
    }

    pub fn items(&self) -> impl Iterator<Item = &MediaItem> {
        self.movies
            .iter()
            .chain(self.series.values().flat_map(|s| s.episodes.iter()))
    }

    /// Movies and episodes share one id space.
    pub fn next_id(&self) -> u64 {
        self.items().map(|i| i.id).max().map_or(1, |m| m + 1)
    }

    pub fn find_playable(&self, id: u64) -> Option<&MediaItem> {
        self.items().find(|i| i.id == id)
    }

    pub fn movie(&self, id: u64) -> Option<&MediaItem> {
        self.movies.iter().find(|m| m.id == id)
    }

    pub fn is_favorite(&self, key: &ItemKey) -> bool {
        match key {
            ItemKey::Movie(id) => self.movie(*id).is_some_and(|m| m.favorite),
            ItemKey::Series(name) => self.series.get(name).is_some_and(|s| s.favorite),
        }
    }

    /// Flip the favorite flag. Returns the new state, or `None` for an unknown key.
    pub fn toggle_favorite(&mut self, key: &ItemKey) -> Option<bool> {
        let flag = match key {
            ItemKey::Movie(id) => &mut self.movies.iter_mut().find(|m| m.id == *id)?.favorite,
            ItemKey::Series(name) => &mut self.series.get_mut(name)?.favorite,
        };
        *flag = !*flag;
        Some(*flag)
    }

    /// Take favorite flags from `current` for records it also has: movies and
    /// episodes by path, series by name. Used when a scan built from an older
    /// snapshot replaces the live library.
    pub fn carry_favorites_from(&mut self, current: &Library) {
        let by_path: HashMap<&Path, bool> = current
            .items()
            .map(|i| (i.path.as_path(), i.favorite))
            .collect();
        let items = self
            .movies
            .iter_mut()
            .chain(self.series.values_mut().flat_map(|s| s.episodes.iter_mut()));
        for item in items {
            if let Some(&fav) = by_path.get(item.path.as_path()) {
                item.favorite = fav;
            }
        }
        for (name, entry) in &mut self.series {
            if let Some(live) = current.series.get(name) {
                entry.favorite = live.favorite;
            }
        }
    }

    pub fn metadata(&self, key: &ItemKey) -> Option<&Metadata> {
        match key {
            ItemKey::Movie(id) => self.movie(*id).map(|m| &m.metadata),
            ItemKey::Series(name) => self.series.get(name).map(|s| &s.metadata),
        }
    }

    pub fn apply_metadata(&mut self, key: &ItemKey, metadata: Metadata) -> bool {
        let slot = match key {
            ItemKey::Movie(id) => self
                .movies
                .iter_mut()
                .find(|m| m.id == *id)
                .map(|m| &mut m.metadata),
            ItemKey::Series(name) => self.series.get_mut(name).map(|s| &mut s.metadata),
        };
        match slot {
            Some(slot) => {
                *slot = metadata;
                true
            }
            None => false,
        }
    }

    /// Movies and series still waiting on a metadata lookup.
    pub fn pending_lookups(&self) -> Vec<LookupTarget> {
        let movies = self
            .movies
            .iter()
            .filter(|m| m.metadata.is_missing())
            .map(|m| LookupTarget::new(ItemKey::Movie(m.id), &m.title, m.year, MediaKind::Movie));
        let series = self
            .series
            .values()
            .filter(|s| s.metadata.is_missing())
            .map(|s| LookupTarget::new(ItemKey::Series(s.name.clone()), &s.name, None, MediaKind::Series));
        movies.chain(series).collect()
    }

    pub fn clear_metadata(&mut self) {
        for m in &mut self.movies {
            m.metadata = Metadata::default();
        }
        for s in self.series.values_mut() {
            s.metadata = Metadata::default();
            for ep in &mut s.episodes {
                ep.metadata = Metadata::default();
            }
        }
    }
}

/// A grid card identity: one movie, or one whole series.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ItemKey {
    Movie(u64),
    Series(String),
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Movie(id) => write!(f, "m_{id}"),
            Self::Series(name) => write!(f, "s_{name}"),
        }
    }
}

impl FromStr for ItemKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(id) = s.strip_prefix("m_") {
            return id
                .parse()
                .map(Self::Movie)
                .map_err(|e| format!("bad movie id {id:?}: {e}"));
        }
        match s.strip_prefix("s_") {
            Some(name) if !name.is_empty() => Ok(Self::Series(name.to_string())),
            _ => Err(format!("unknown item key {s:?}")),
        }
    }
}

impl Serialize for ItemKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ItemKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Series,
}

impl MediaKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Series => "series",
        }
    }
}

/// One metadata lookup to perform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LookupTarget {
    pub key: ItemKey,
    pub title: String,
    pub candidates: Vec<String>,
    pub year: Option<i32>,
    pub kind: MediaKind,
}

impl LookupTarget {
    pub fn new(key: ItemKey, title: &str, year: Option<i32>, kind: MediaKind) -> Self {
        Self {
            key,
            title: title.to_string(),
            candidates: title::title_candidates(title),
            year,
            kind,
        }
    }
}
