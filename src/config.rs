use std::path::{Path, PathBuf};
use std::{fs, io};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const CONFIG_FILE: &str = "config.json";
pub const LIBRARY_CACHE_FILE: &str = "data_cache.json";
pub const METADATA_CACHE_FILE: &str = "metadata_cache.json";
pub const POSTERS_DIR: &str = "posters";
pub const UI_PREFS_FILE: &str = "ui_prefs.txt";

pub const DEFAULT_WEB_PORT: u16 = 5000;

fn default_subtitle_languages() -> Vec<String> {
    vec!["en".to_string(), "tr".to_string()]
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AppConfig {
    pub movie_dir: Option<String>,
    pub series_dir: Option<String>,
    pub omdb_api_key: Option<String>,
    pub opensubtitles_api_key: Option<String>,
    pub player_cmd: Option<String>,
    pub player_args: Vec<String>,
    pub ffmpeg_cmd: Option<String>,
    pub web_port: u16,
    pub subtitle_languages: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            movie_dir: None,
            series_dir: None,
            omdb_api_key: None,
            opensubtitles_api_key: None,
            player_cmd: None,
            player_args: Vec::new(),
            ffmpeg_cmd: None,
            web_port: DEFAULT_WEB_PORT,
            subtitle_languages: default_subtitle_languages(),
        }
    }
}

/// Partial settings as found on disk or posted by a settings form.
/// Every field is optional; empty strings clear the value.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ConfigPatch {
    pub movie_dir: Option<String>,
    pub series_dir: Option<String>,
    pub omdb_api_key: Option<String>,
    pub opensubtitles_api_key: Option<String>,
    pub player_cmd: Option<String>,
    pub player_args: Option<Vec<String>>,
    pub ffmpeg_cmd: Option<String>,
    pub web_port: Option<u16>,
    pub subtitle_languages: Option<Vec<String>>,
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl AppConfig {
    pub fn merge(&mut self, patch: ConfigPatch) {
        if let Some(v) = patch.movie_dir {
            self.movie_dir = non_empty(v);
        }
        if let Some(v) = patch.series_dir {
            self.series_dir = non_empty(v);
        }
        if let Some(v) = patch.omdb_api_key {
            self.omdb_api_key = non_empty(v);
        }
        if let Some(v) = patch.opensubtitles_api_key {
            self.opensubtitles_api_key = non_empty(v);
        }
        if let Some(v) = patch.player_cmd {
            self.player_cmd = non_empty(v);
        }
        if let Some(args) = patch.player_args {
            self.player_args = args;
        }
        if let Some(v) = patch.ffmpeg_cmd {
            self.ffmpeg_cmd = non_empty(v);
        }
        if let Some(port) = patch.web_port {
            if port == 0 {
                warn!("Ignoring web_port 0; keeping {}", self.web_port);
            } else {
                self.web_port = port;
            }
        }
        if let Some(langs) = patch.subtitle_languages {
            let langs: Vec<String> = langs
                .into_iter()
                .filter_map(non_empty)
                .map(|l| l.to_ascii_lowercase())
                .collect();
            self.subtitle_languages = if langs.is_empty() {
                default_subtitle_languages()
            } else {
                langs
            };
        }
    }

    pub fn needs_setup(&self) -> bool {
        self.movie_dir.is_none() && self.series_dir.is_none()
    }

    pub fn movie_root(&self) -> Option<PathBuf> {
        self.movie_dir.as_deref().map(PathBuf::from)
    }

    pub fn series_root(&self) -> Option<PathBuf> {
        self.series_dir.as_deref().map(PathBuf::from)
    }

    pub fn omdb_key(&self) -> Option<&str> {
        self.omdb_api_key.as_deref().filter(|k| !k.trim().is_empty())
    }

    pub fn opensubtitles_key(&self) -> Option<&str> {
        self.opensubtitles_api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
    }

    pub fn ffmpeg(&self) -> &str {
        self.ffmpeg_cmd.as_deref().unwrap_or("ffmpeg")
    }

    /// Warnings worth showing in the setup dialog. Empty means good to go.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.needs_setup() {
            warnings.push("Configure a movie or series directory to start scanning.".into());
        }
        for (label, dir) in [("Movie", &self.movie_dir), ("Series", &self.series_dir)] {
            let Some(dir) = dir else {
                continue;
            };
            let path = Path::new(dir);
            if !path.exists() {
                warnings.push(format!("{label} directory does not exist: {dir}"));
            } else if !path.is_dir() {
                warnings.push(format!("{label} directory is not a folder: {dir}"));
            } else if let Err(err) = fs::read_dir(path) {
                warnings.push(format!("{label} directory is not readable ({dir}): {err}"));
            }
        }
        if self.omdb_key().is_none() {
            warnings.push("No OMDb API key: posters and ratings will not be fetched.".into());
        }
        if self.opensubtitles_key().is_none() {
            warnings.push("No OpenSubtitles API key: online subtitle search is disabled.".into());
        }
        warnings
    }

    /// True when `path` resolves inside one of the configured roots.
    pub fn is_within_library(&self, path: &Path) -> bool {
        let Ok(real) = fs::canonicalize(path) else {
            return false;
        };
        [self.movie_root(), self.series_root()]
            .into_iter()
            .flatten()
            .filter_map(|root| fs::canonicalize(root).ok())
            .any(|root| real.starts_with(root))
    }

    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        let data = serde_json::to_vec_pretty(self).map_err(io::Error::other)?;
        fs::write(&tmp, data)?;
        fs::rename(tmp, path)
    }
}

pub fn load_config_from(cfg_path: &Path) -> AppConfig {
    let mut cfg = AppConfig::default();

    match fs::read_to_string(cfg_path) {
        Ok(raw) => match serde_json::from_str::<ConfigPatch>(&raw) {
            Ok(parsed) => {
                cfg.merge(parsed);
                info!("Loaded config from {}", cfg_path.display());
            }
            Err(err) => {
                warn!(
                    "Failed to parse {} ({}). Using defaults.",
                    cfg_path.display(),
                    err
                );
            }
        },
        Err(_) => {
            info!("No {} found; using defaults", cfg_path.display());
        }
    }

    cfg
}

pub fn load_config() -> AppConfig {
    load_config_from(&DataPaths::resolve().config)
}

/// Where everything the app persists lives.
#[derive(Clone, Debug)]
pub struct DataPaths {
    pub root: PathBuf,
    pub config: PathBuf,
    pub library_cache: PathBuf,
    pub metadata_cache: PathBuf,
    pub posters: PathBuf,
    pub ui_prefs: PathBuf,
}

impl DataPaths {
    pub fn at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            config: root.join(CONFIG_FILE),
            library_cache: root.join(LIBRARY_CACHE_FILE),
            metadata_cache: root.join(METADATA_CACHE_FILE),
            posters: root.join(POSTERS_DIR),
            ui_prefs: root.join(UI_PREFS_FILE),
            root,
        }
    }

    /// `$HOMETHEATER_HOME`, else `~/.home-theater`, else `./.home-theater`.
    pub fn resolve() -> Self {
        let root = std::env::var_os("HOMETHEATER_HOME")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|h| h.join(".home-theater")))
            .unwrap_or_else(|| PathBuf::from(".home-theater"));
        Self::at(root)
    }

    pub fn ensure(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root)?;
        fs::create_dir_all(&self.posters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_strings_clear_values_and_defaults_survive() {
        let mut cfg = AppConfig::default();
        cfg.merge(ConfigPatch {
            movie_dir: Some("/media/movies".into()),
            omdb_api_key: Some("  ".into()),
            ..Default::default()
        });
        assert_eq!(cfg.movie_dir.as_deref(), Some("/media/movies"));
        assert_eq!(cfg.omdb_key(), None);
        assert_eq!(cfg.web_port, DEFAULT_WEB_PORT);
        assert!(!cfg.needs_setup());
    }

    #[test]
    fn original_style_config_file_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(
            &path,
            r#"{"movie_dir": "", "series_dir": "/tv", "omdb_api_key": "k", "opensubtitles_api_key": ""}"#,
        )
        .unwrap();
        let cfg = load_config_from(&path);
        assert_eq!(cfg.movie_dir, None);
        assert_eq!(cfg.series_dir.as_deref(), Some("/tv"));
        assert_eq!(cfg.omdb_key(), Some("k"));
        assert_eq!(cfg.opensubtitles_key(), None);
    }

    #[test]
    fn broken_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(load_config_from(&path), AppConfig::default());
    }

    #[test]
    fn save_then_load_keeps_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);
        let mut cfg = AppConfig::default();
        cfg.merge(ConfigPatch {
            movie_dir: Some("/m".into()),
            player_cmd: Some("mpv".into()),
            player_args: Some(vec!["--sub-file={subtitle}".into(), "{file}".into()]),
            subtitle_languages: Some(vec!["DE".into(), "".into()]),
            ..Default::default()
        });
        cfg.save_to(&path).unwrap();
        let loaded = load_config_from(&path);
        assert_eq!(loaded, cfg);
        assert_eq!(loaded.subtitle_languages, vec!["de".to_string()]);
    }

    #[test]
    fn validate_reports_missing_directory() {
        let mut cfg = AppConfig::default();
        cfg.movie_dir = Some("/definitely/not/here".into());
        let warnings = cfg.validate();
        assert!(warnings.iter().any(|w| w.contains("does not exist")));
        assert!(warnings.iter().any(|w| w.contains("OMDb")));
    }

    #[test]
    fn library_guard_accepts_only_files_under_roots() {
        let root = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let inside_file = root.path().join("a.mkv");
        let outside_file = outside.path().join("b.mkv");
        fs::write(&inside_file, b"x").unwrap();
        fs::write(&outside_file, b"x").unwrap();

        let mut cfg = AppConfig::default();
        cfg.movie_dir = Some(root.path().to_string_lossy().into_owned());
        assert!(cfg.is_within_library(&inside_file));
        assert!(!cfg.is_within_library(&outside_file));
    }
}
