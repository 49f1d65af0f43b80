// src/app/prefs.rs
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::library::browse::{Category, SortKey};

/// Grid/browse state kept between runs in `ui_prefs.txt`.
#[derive(Clone, Debug, PartialEq)]
pub struct UiPrefs {
    pub category: Category,
    pub search: String,
    pub genre: Option<String>,
    pub sort_key: SortKey,
    pub poster_w: f32,
    pub detail_w: f32,
}

impl Default for UiPrefs {
    fn default() -> Self {
        Self {
            category: Category::All,
            search: String::new(),
            genre: None,
            sort_key: SortKey::Added,
            poster_w: 150.0,
            detail_w: 340.0,
        }
    }
}

impl UiPrefs {
    pub fn parse(txt: &str) -> Self {
        let mut prefs = Self::default();
        for line in txt.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((k, v)) = line.split_once('=') else {
                continue;
            };
            let v = v.trim();

            match k.trim() {
                "category" => {
                    if let Some(c) = Category::from_str(v) {
                        prefs.category = c;
                    }
                }
                "search" => prefs.search = v.to_string(),
                "genre" => prefs.genre = (!v.is_empty()).then(|| v.to_string()),
                "sort_key" => {
                    if let Some(sk) = SortKey::from_str(v) {
                        prefs.sort_key = sk;
                    }
                }
                "poster_w" => {
                    if let Ok(n) = v.parse::<f32>() {
                        prefs.poster_w = n.clamp(110.0, 260.0);
                    }
                }
                "detail_w" => {
                    if let Ok(n) = v.parse::<f32>() {
                        prefs.detail_w = n.clamp(260.0, 600.0);
                    }
                }
                _ => {}
            }
        }
        prefs
    }

    pub fn render(&self) -> String {
        format!(
            "# home theater ui prefs\n\
             category={}\n\
             search={}\n\
             genre={}\n\
             sort_key={}\n\
             poster_w={:.1}\n\
             detail_w={:.1}\n",
            self.category.as_str(),
            self.search.replace('\n', " "),
            self.genre.as_deref().unwrap_or(""),
            self.sort_key.as_str(),
            self.poster_w,
            self.detail_w,
        )
    }

    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(txt) => Self::parse(&txt),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        if let Err(err) = fs::write(path, self.render()) {
            warn!("failed to save ui prefs {}: {err}", path.display());
        }
    }
}

impl crate::app::HomeTheaterApp {
    // ---- tiny flags ----
    pub(crate) fn mark_dirty(&mut self) {
        self.prefs_dirty = true;
    }

    pub(crate) fn maybe_save_prefs(&mut self) {
        // debounce a bit to avoid writing every frame
        if self.prefs_dirty && self.prefs_last_write.elapsed() >= Duration::from_millis(300) {
            self.prefs.save(&self.paths.ui_prefs);
            self.prefs_dirty = false;
            self.prefs_last_write = Instant::now();
        }
    }
}
