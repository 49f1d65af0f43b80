// src/library/metadata.rs
use std::collections::HashMap;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::title::normalize_title;
use super::{LookupTarget, MediaKind, Metadata, MetadataState};

pub const OMDB_BASE_URL: &str = "https://www.omdbapi.com/";

const MAX_RETRIES: u32 = 3;
const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(500);
const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// The subset of an OMDb title response we keep.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OmdbResponse {
    #[serde(rename = "Response", default)]
    pub response: String,
    #[serde(rename = "Title", default)]
    pub title: Option<String>,
    #[serde(rename = "Year", default)]
    pub year: Option<String>,
    #[serde(rename = "imdbRating", default)]
    pub imdb_rating: Option<String>,
    #[serde(rename = "Plot", default)]
    pub plot: Option<String>,
    #[serde(rename = "Genre", default)]
    pub genre: Option<String>,
    #[serde(rename = "Poster", default)]
    pub poster: Option<String>,
    #[serde(rename = "imdbID", default)]
    pub imdb_id: Option<String>,
    #[serde(rename = "Error", default)]
    pub error: Option<String>,
}

fn present(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("N/A"))
        .map(str::to_string)
}

impl OmdbResponse {
    pub fn is_found(&self) -> bool {
        self.response.eq_ignore_ascii_case("true")
    }

    /// "N/A" fields become absent.
    pub fn to_metadata(&self) -> Metadata {
        if !self.is_found() {
            return Metadata::not_found();
        }
        Metadata {
            state: MetadataState::Found,
            rating: present(&self.imdb_rating),
            plot: present(&self.plot),
            genre: present(&self.genre),
            year: present(&self.year),
            imdb_id: present(&self.imdb_id),
            poster_url: present(&self.poster),
            poster: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct CachedLookup {
    response: OmdbResponse,
    fetched_at: DateTime<Utc>,
}

pub fn cache_key(kind: MediaKind, title: &str, year: Option<i32>) -> String {
    let year = year.map(|y| y.to_string()).unwrap_or_default();
    format!("{}:{}:{}", kind.as_str(), normalize_title(title), year)
}

/// Title-keyed OMDb responses persisted as `metadata_cache.json`.
#[derive(Debug)]
pub struct MetadataCache {
    path: PathBuf,
    entries: HashMap<String, CachedLookup>,
    dirty: bool,
}

impl MetadataCache {
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(entries) => entries,
                Err(err) => {
                    warn!("Failed to parse metadata cache {}: {err}", path.display());
                    HashMap::new()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => HashMap::new(),
            Err(err) => {
                warn!("Failed to read metadata cache {}: {err}", path.display());
                HashMap::new()
            }
        };
        Self {
            path,
            entries,
            dirty: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn get(&self, key: &str) -> Option<&OmdbResponse> {
        self.entries.get(key).map(|c| &c.response)
    }

    pub fn fetched_at(&self, key: &str) -> Option<DateTime<Utc>> {
        self.entries.get(key).map(|c| c.fetched_at)
    }

    pub fn insert(&mut self, key: String, response: OmdbResponse) {
        self.entries.insert(
            key,
            CachedLookup {
                response,
                fetched_at: Utc::now(),
            },
        );
        self.dirty = true;
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.dirty = true;
    }

    pub fn save(&mut self) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let data = serde_json::to_vec_pretty(&self.entries).map_err(io::Error::other)?;
        fs::write(&tmp, data)?;
        fs::rename(tmp, &self.path)?;
        self.dirty = false;
        Ok(())
    }

    pub fn save_if_dirty(&mut self) -> io::Result<bool> {
        if !self.dirty {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum LookupOutcome {
    Found(Metadata),
    NotFound,
    MissingApiKey,
    Failed(String),
}

pub struct OmdbClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    min_interval: Duration,
    retry_backoff: Duration,
    last_request: Option<Instant>,
}

impl OmdbClient {
    pub fn new(api_key: Option<&str>) -> Result<Self, String> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(concat!("hometheater/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| format!("http client: {e}"))?;
        Ok(Self {
            client,
            api_key: api_key
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string),
            base_url: OMDB_BASE_URL.to_string(),
            min_interval: DEFAULT_MIN_INTERVAL,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            last_request: None,
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_pacing(mut self, min_interval: Duration, retry_backoff: Duration) -> Self {
        self.min_interval = min_interval;
        self.retry_backoff = retry_backoff;
        self
    }

    pub fn has_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Shared HTTP client, reused for poster downloads.
    pub fn http(&self) -> &Client {
        &self.client
    }

    /// Resolve a target through the cache, then the network. A miss with a
    /// year is tried again without it.
    pub fn lookup(&mut self, cache: &mut MetadataCache, target: &LookupTarget) -> LookupOutcome {
        let Some(api_key) = self.api_key.clone() else {
            return LookupOutcome::MissingApiKey;
        };

        let mut years = vec![target.year];
        if target.year.is_some() {
            years.push(None);
        }

        let mut last_err: Option<String> = None;
        for year in years {
            for title in &target.candidates {
                let key = cache_key(target.kind, title, year);
                let response = match cache.get(&key) {
                    Some(hit) => {
                        debug!("omdb cache hit for {key}");
                        hit.clone()
                    }
                    None => match self.fetch(&api_key, title, year, target.kind) {
                        Ok(resp) => {
                            cache.insert(key, resp.clone());
                            resp
                        }
                        Err(err) => {
                            warn!("omdb lookup for {title:?} failed: {err}");
                            last_err = Some(err);
                            continue;
                        }
                    },
                };
                if response.is_found() {
                    return LookupOutcome::Found(response.to_metadata());
                }
            }
        }

        match last_err {
            Some(err) => LookupOutcome::Failed(err),
            None => {
                info!("omdb: no match for {:?}", target.title);
                LookupOutcome::NotFound
            }
        }
    }

    fn pace(&mut self) {
        if let Some(last) = self.last_request {
            let since = last.elapsed();
            if since < self.min_interval {
                thread::sleep(self.min_interval - since);
            }
        }
        self.last_request = Some(Instant::now());
    }

    fn fetch(
        &mut self,
        api_key: &str,
        title: &str,
        year: Option<i32>,
        kind: MediaKind,
    ) -> Result<OmdbResponse, String> {
        let mut query: Vec<(&str, String)> = vec![
            ("apikey", api_key.to_string()),
            ("t", title.to_string()),
            ("type", kind.as_str().to_string()),
        ];
        if let Some(y) = year {
            query.push(("y", y.to_string()));
        }

        let mut attempt = 0u32;
        loop {
            self.pace();
            let resp = self
                .client
                .get(&self.base_url)
                .query(&query)
                .send()
                .map_err(|e| format!("GET {}: {e}", self.base_url))?;

            let status = resp.status();
            let retryable =
                status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
            if retryable && attempt < MAX_RETRIES {
                let wait = self.retry_backoff * 2u32.pow(attempt);
                attempt += 1;
                warn!("omdb returned {status}; retry {attempt}/{MAX_RETRIES} in {wait:?}");
                thread::sleep(wait);
                continue;
            }
            // OMDb reports unknown titles and bad keys as 401 with a JSON body.
            if !status.is_success() && status != StatusCode::UNAUTHORIZED {
                return Err(format!("HTTP {status} from omdb"));
            }
            let parsed: OmdbResponse = resp.json().map_err(|e| format!("omdb json: {e}"))?;
            if status == StatusCode::UNAUTHORIZED {
                return Err(parsed
                    .error
                    .unwrap_or_else(|| "omdb rejected the API key".into()));
            }
            return Ok(parsed);
        }
    }
}
