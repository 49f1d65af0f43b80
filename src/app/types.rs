// src/app/types.rs
use std::path::PathBuf;

use eframe::egui::TextureHandle;

use crate::config::{AppConfig, ConfigPatch};
use crate::library::subtitles::SubtitleHit;

// ---- cross-thread messages ----
pub enum SubtitleMsg {
    Results {
        item_id: u64,
        result: Result<Vec<SubtitleHit>, String>,
    },
    Saved(Result<PathBuf, String>),
}

// ---- poster textures ----
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PosterState {
    Pending, // no file yet, or not uploaded
    Ready,   // texture uploaded
    Failed,  // decode failed; don't retry this run
}

pub struct PosterSlot {
    pub tex: Option<TextureHandle>, // UI thread only
    pub state: PosterState,
}

impl Default for PosterSlot {
    fn default() -> Self {
        Self {
            tex: None,
            state: PosterState::Pending,
        }
    }
}

// ---- subtitle search window ----
pub struct SubtitleSearch {
    pub item_id: u64,
    pub title: String,
    pub busy: bool,
    pub hits: Vec<SubtitleHit>,
    pub message: Option<String>,
}

// ---- settings dialog (text fields as typed) ----
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SettingsDraft {
    pub movie_dir: String,
    pub series_dir: String,
    pub omdb_api_key: String,
    pub opensubtitles_api_key: String,
    pub player_cmd: String,
    /// One argument per line.
    pub player_args: String,
    pub ffmpeg_cmd: String,
    pub web_port: String,
    /// Comma separated.
    pub subtitle_languages: String,
}

impl SettingsDraft {
    pub fn from_config(cfg: &AppConfig) -> Self {
        let text = |v: &Option<String>| v.clone().unwrap_or_default();
        Self {
            movie_dir: text(&cfg.movie_dir),
            series_dir: text(&cfg.series_dir),
            omdb_api_key: text(&cfg.omdb_api_key),
            opensubtitles_api_key: text(&cfg.opensubtitles_api_key),
            player_cmd: text(&cfg.player_cmd),
            player_args: cfg.player_args.join("\n"),
            ffmpeg_cmd: text(&cfg.ffmpeg_cmd),
            web_port: cfg.web_port.to_string(),
            subtitle_languages: cfg.subtitle_languages.join(", "),
        }
    }

    pub fn to_patch(&self) -> ConfigPatch {
        ConfigPatch {
            movie_dir: Some(self.movie_dir.clone()),
            series_dir: Some(self.series_dir.clone()),
            omdb_api_key: Some(self.omdb_api_key.clone()),
            opensubtitles_api_key: Some(self.opensubtitles_api_key.clone()),
            player_cmd: Some(self.player_cmd.clone()),
            player_args: Some(
                self.player_args
                    .lines()
                    .map(str::trim)
                    .filter(|a| !a.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
            ffmpeg_cmd: Some(self.ffmpeg_cmd.clone()),
            web_port: self.web_port.trim().parse().ok(),
            subtitle_languages: Some(
                self.subtitle_languages
                    .split(',')
                    .map(str::to_string)
                    .collect(),
            ),
        }
    }
}
