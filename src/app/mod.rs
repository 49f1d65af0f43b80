// src/app/mod.rs: desktop shell. Scan and metadata run on a worker thread;
// the UI polls its channel every frame.
pub mod detail;
pub mod gfx;
pub mod player;
pub mod prefs;
pub mod series;
pub mod settings;
pub mod subtitles;
pub mod types;
pub mod ui;

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use eframe::egui as eg;
use tracing::{debug, info, warn};

use crate::config::{load_config_from, AppConfig, DataPaths};
use crate::library::browse::{
    apply_query, collect_cards, collect_genres, pick_random, random_playable, BrowseQuery, Card,
};
use crate::library::posters::PosterStore;
use crate::library::store::LibraryStore;
use crate::library::subtitles::{save_sidecar, OpenSubtitlesClient, SubtitleHit};
use crate::library::worker::{self, CatalogMsg};
use crate::library::{ItemKey, Library};

use self::prefs::UiPrefs;
use self::types::{PosterSlot, PosterState, SettingsDraft, SubtitleMsg, SubtitleSearch};

// ---- Tunables ----
const MAX_MSGS_PER_FRAME: usize = 64;
pub(crate) const MAX_UPLOADS_PER_FRAME: usize = 4;
const BUSY_REPAINT: Duration = Duration::from_millis(200);

pub struct HomeTheaterApp {
    // persisted
    paths: DataPaths,
    config: AppConfig,
    library: Library,
    store: LibraryStore,

    // derived view, rebuilt when `view_dirty`
    cards: Vec<Card>,
    visible: Vec<usize>,
    genres: Vec<String>,
    view_dirty: bool,
    posters: HashMap<ItemKey, PosterSlot>,

    // ui
    prefs: UiPrefs,
    prefs_dirty: bool,
    prefs_last_write: Instant,
    selected: Option<ItemKey>,
    series_open: Option<String>,
    settings_draft: Option<SettingsDraft>,
    subtitle_search: Option<SubtitleSearch>,
    status: String,

    // background work
    catalog_rx: Option<Receiver<CatalogMsg>>,
    scanning: bool,
    pending_lookups: usize,
    subs_tx: Sender<SubtitleMsg>,
    subs_rx: Receiver<SubtitleMsg>,
}

impl HomeTheaterApp {
    pub fn new(paths: DataPaths) -> Self {
        if let Err(err) = paths.ensure() {
            warn!("failed to create data dir {}: {err}", paths.root.display());
        }
        let config = load_config_from(&paths.config);
        let store = LibraryStore::new(&paths.library_cache);
        let library = store.load();
        let prefs = UiPrefs::load(&paths.ui_prefs);
        match PosterStore::new(&paths.posters).clean_partial_files() {
            Ok(0) => {}
            Ok(n) => debug!("removed {n} partial poster files"),
            Err(err) => warn!("poster cleanup failed: {err}"),
        }
        let (subs_tx, subs_rx) = mpsc::channel();

        let mut app = Self {
            paths,
            config,
            library,
            store,
            cards: Vec::new(),
            visible: Vec::new(),
            genres: Vec::new(),
            view_dirty: true,
            posters: HashMap::new(),
            prefs,
            prefs_dirty: false,
            prefs_last_write: Instant::now(),
            selected: None,
            series_open: None,
            settings_draft: None,
            subtitle_search: None,
            status: String::new(),
            catalog_rx: None,
            scanning: false,
            pending_lookups: 0,
            subs_tx,
            subs_rx,
        };

        if app.config.needs_setup() {
            app.status = "Welcome! Choose your movie and series folders to get started.".into();
            app.open_settings();
        } else if app.library.is_empty() {
            app.start_scan();
        } else {
            app.status = format!(
                "{} movies, {} series",
                app.library.movies.len(),
                app.library.series.len()
            );
            app.start_metadata_refresh();
        }
        app
    }

    fn set_status<S: Into<String>>(&mut self, s: S) {
        self.status = s.into();
    }

    pub(crate) fn is_busy(&self) -> bool {
        self.catalog_rx.is_some()
    }

    // ---- background catalog work ----
    pub(crate) fn start_scan(&mut self) {
        if self.catalog_rx.is_some() {
            self.set_status("A scan is already running.");
            return;
        }
        if self.config.needs_setup() {
            self.set_status("Configure a movie or series directory first.");
            self.open_settings();
            return;
        }
        let (tx, rx) = mpsc::channel();
        self.catalog_rx = Some(rx);
        self.scanning = true;
        self.set_status("Scanning directories…");
        worker::spawn_scan(
            self.config.clone(),
            self.paths.clone(),
            self.library.clone(),
            tx,
        );
    }

    pub(crate) fn start_metadata_refresh(&mut self) {
        if self.catalog_rx.is_some() || self.config.omdb_key().is_none() {
            return;
        }
        let pending = self.library.pending_lookups();
        if pending.is_empty() {
            return;
        }
        info!("refreshing metadata for {} titles", pending.len());
        let (tx, rx) = mpsc::channel();
        self.catalog_rx = Some(rx);
        self.pending_lookups = pending.len();
        worker::spawn_metadata_refresh(self.config.clone(), self.paths.clone(), pending, tx);
    }

    fn poll_catalog(&mut self) {
        let Some(rx) = &self.catalog_rx else {
            return;
        };
        let mut msgs = Vec::new();
        let mut finished = false;
        for _ in 0..MAX_MSGS_PER_FRAME {
            match rx.try_recv() {
                Ok(msg) => msgs.push(msg),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    finished = true;
                    break;
                }
            }
        }
        for msg in msgs {
            self.handle_catalog_msg(msg);
        }
        if finished {
            self.catalog_rx = None;
            self.scanning = false;
            self.pending_lookups = 0;
        }
    }

    fn handle_catalog_msg(&mut self, msg: CatalogMsg) {
        match msg {
            CatalogMsg::Info(s) => self.set_status(s),
            CatalogMsg::Scanned(outcome) => {
                let mut library = outcome.library;
                library.carry_favorites_from(&self.library);
                self.library = library;
                self.save_library();
                self.pending_lookups = outcome.pending.len();
                self.scanning = false;
                self.view_dirty = true;
                self.set_status(format!("Scan complete: {}", outcome.stats.summary()));
            }
            CatalogMsg::Metadata { key, metadata } => {
                if self.library.apply_metadata(&key, metadata) {
                    self.posters.remove(&key);
                    self.view_dirty = true;
                }
                self.pending_lookups = self.pending_lookups.saturating_sub(1);
            }
            CatalogMsg::MetadataDone {
                fetched,
                not_found,
                failed,
                skipped,
            } => {
                self.save_library();
                self.pending_lookups = 0;
                if skipped > 0 {
                    self.set_status("Metadata skipped: no OMDb API key configured.");
                } else if fetched + not_found + failed > 0 {
                    self.set_status(format!(
                        "Metadata: {fetched} found, {not_found} not found, {failed} failed"
                    ));
                }
            }
            CatalogMsg::Error(err) => {
                warn!("catalog: {err}");
                self.scanning = false;
                self.set_status(err);
            }
        }
    }

    fn save_library(&mut self) {
        if let Err(err) = self.store.save(&self.library) {
            warn!("failed to save library: {err}");
            self.set_status(format!("Could not save library: {err}"));
        }
    }

    pub(crate) fn clear_metadata_cache(&mut self) {
        if self.is_busy() {
            self.set_status("Wait for the current scan to finish first.");
            return;
        }
        match worker::clear_metadata_cache(&self.paths, &mut self.library) {
            Ok(n) => {
                self.posters.clear();
                self.view_dirty = true;
                self.set_status(format!("Cleared {n} cached lookups."));
                self.start_metadata_refresh();
            }
            Err(err) => {
                warn!("cache clear failed: {err}");
                self.set_status(format!("Cache clear failed: {err}"));
            }
        }
    }

    // ---- derived view ----
    pub(crate) fn query(&self) -> BrowseQuery {
        BrowseQuery {
            category: self.prefs.category,
            search: self.prefs.search.clone(),
            genre: self.prefs.genre.clone(),
            sort: self.prefs.sort_key,
        }
    }

    pub(crate) fn refilter(&mut self) {
        self.view_dirty = true;
        self.mark_dirty();
    }

    fn rebuild_view_if_dirty(&mut self) {
        if !self.view_dirty {
            return;
        }
        self.cards = collect_cards(&self.library);
        self.genres = collect_genres(&self.library);
        let query = self.query();
        self.visible = apply_query(&self.cards, &query)
            .into_iter()
            .map(|c| c.order)
            .collect();
        if let Some(sel) = &self.selected {
            if !self.cards.iter().any(|c| &c.key == sel) {
                self.selected = None;
            }
        }
        self.view_dirty = false;
    }

    pub(crate) fn card(&self, key: &ItemKey) -> Option<&Card> {
        self.cards.iter().find(|c| &c.key == key)
    }

    // ---- posters ----
    /// Upload the poster for card `idx` if it is on disk. Returns true on upload.
    pub(crate) fn try_lazy_upload(&mut self, ctx: &eg::Context, idx: usize) -> bool {
        let Some(card) = self.cards.get(idx) else {
            return false;
        };
        let Some(path) = card.poster.as_deref() else {
            return false;
        };
        let slot = self.posters.entry(card.key.clone()).or_default();
        if slot.state != PosterState::Pending {
            return false;
        }
        match gfx::load_texture_from_path(ctx, path, &card.key.to_string()) {
            Ok(tex) => {
                slot.tex = Some(tex);
                slot.state = PosterState::Ready;
                true
            }
            Err(err) => {
                debug!("poster {}: {err}", path.display());
                slot.state = PosterState::Failed;
                false
            }
        }
    }

    pub(crate) fn poster_texture(&self, key: &ItemKey) -> Option<&eg::TextureHandle> {
        self.posters.get(key).and_then(|s| s.tex.as_ref())
    }

    // ---- actions ----
    pub(crate) fn toggle_favorite(&mut self, key: &ItemKey) {
        if let Some(now) = self.library.toggle_favorite(key) {
            self.save_library();
            self.view_dirty = true;
            let what = self.card(key).map(|c| c.title.clone()).unwrap_or_default();
            self.set_status(if now {
                format!("Added {what} to favorites")
            } else {
                format!("Removed {what} from favorites")
            });
        }
    }

    pub(crate) fn play_item(&mut self, id: u64) {
        let Some(item) = self.library.find_playable(id) else {
            self.set_status("That file is no longer in the library.");
            return;
        };
        let result = player::resolve_playback(item, &self.config.subtitle_languages)
            .and_then(|req| player::launch(&self.config, &req).map(|_| req));
        match result {
            Ok(req) => {
                let sub = if req.subtitle.is_some() { " (with subtitles)" } else { "" };
                self.set_status(format!("Playing {}{sub}", req.title));
            }
            Err(err) => {
                warn!("playback failed: {err}");
                self.set_status(err);
            }
        }
    }

    pub(crate) fn play_random(&mut self) {
        let mut rng = rand::rng();
        let visible: Vec<&Card> = self.visible.iter().filter_map(|&i| self.cards.get(i)).collect();
        let Some(key) = pick_random(&visible, &mut rng).map(|c| c.key.clone()) else {
            self.set_status("Nothing to shuffle with the current filters.");
            return;
        };
        let Some(id) = random_playable(&self.library, &key, &mut rng).map(|i| i.id) else {
            self.set_status("That series has no playable episodes.");
            return;
        };
        self.selected = Some(key);
        self.play_item(id);
    }

    pub(crate) fn open_settings(&mut self) {
        self.settings_draft = Some(SettingsDraft::from_config(&self.config));
    }

    pub(crate) fn apply_settings(&mut self, draft: &SettingsDraft) {
        let before = self.config.clone();
        self.config.merge(draft.to_patch());
        if let Err(err) = self.config.save_to(&self.paths.config) {
            warn!("failed to save config: {err}");
            self.set_status(format!("Could not save settings: {err}"));
            return;
        }
        self.set_status("Settings saved.");

        let roots_changed =
            before.movie_dir != self.config.movie_dir || before.series_dir != self.config.series_dir;
        if roots_changed && !self.config.needs_setup() {
            self.start_scan();
        } else if before.omdb_key().is_none() && self.config.omdb_key().is_some() {
            self.start_metadata_refresh();
        }
    }

    // ---- subtitles ----
    pub(crate) fn open_subtitle_search(&mut self, item_id: u64) {
        let Some(key) = self.config.opensubtitles_key().map(str::to_string) else {
            self.set_status("Set an OpenSubtitles API key in Settings to search online.");
            return;
        };
        let Some(item) = self.library.find_playable(item_id).cloned() else {
            return;
        };
        self.subtitle_search = Some(SubtitleSearch {
            item_id,
            title: format!("{} {}", item.title, item.episode_label()),
            busy: true,
            hits: Vec::new(),
            message: None,
        });

        let langs = self.config.subtitle_languages.clone();
        let tx = self.subs_tx.clone();
        thread::spawn(move || {
            let result = OpenSubtitlesClient::new(Some(&key), &langs)
                .and_then(|client| client.search(&item.path, &item.title, item.year));
            let _ = tx.send(SubtitleMsg::Results { item_id, result });
        });
    }

    pub(crate) fn download_subtitle(&mut self, item_id: u64, hit: SubtitleHit) {
        let Some(key) = self.config.opensubtitles_key().map(str::to_string) else {
            return;
        };
        let Some(video) = self.library.find_playable(item_id).map(|i| i.path.clone()) else {
            return;
        };
        if let Some(search) = &mut self.subtitle_search {
            search.busy = true;
            search.message = Some(format!("Downloading {}…", hit.release));
        }
        let langs = self.config.subtitle_languages.clone();
        let tx = self.subs_tx.clone();
        thread::spawn(move || {
            let result = OpenSubtitlesClient::new(Some(&key), &langs)
                .and_then(|client| client.download(hit.file_id))
                .and_then(|text| {
                    save_sidecar(&video, &hit.language, &text).map_err(|e| format!("save: {e}"))
                });
            let _ = tx.send(SubtitleMsg::Saved(result));
        });
    }

    fn poll_subtitles(&mut self) {
        while let Ok(msg) = self.subs_rx.try_recv() {
            match msg {
                SubtitleMsg::Results { item_id, result } => {
                    let Some(search) = &mut self.subtitle_search else {
                        continue;
                    };
                    if search.item_id != item_id {
                        continue;
                    }
                    search.busy = false;
                    match result {
                        Ok(hits) => {
                            search.message = hits.is_empty().then(|| "No subtitles found.".into());
                            search.hits = hits;
                        }
                        Err(err) => {
                            warn!("subtitle search: {err}");
                            search.message = Some(err);
                        }
                    }
                }
                SubtitleMsg::Saved(result) => {
                    let text = match result {
                        Ok(path) => format!("Saved {}", path.display()),
                        Err(err) => {
                            warn!("subtitle download: {err}");
                            format!("Download failed: {err}")
                        }
                    };
                    if let Some(search) = &mut self.subtitle_search {
                        search.busy = false;
                        search.message = Some(text.clone());
                    }
                    self.set_status(text);
                }
            }
        }
    }
}

// ========== App impl ==========
impl eframe::App for HomeTheaterApp {
    fn update(&mut self, ctx: &eg::Context, _frame: &mut eframe::Frame) {
        self.poll_catalog();
        self.poll_subtitles();
        self.rebuild_view_if_dirty();

        eg::TopBottomPanel::top("topbar").show(ctx, |ui| {
            ui.add_space(4.0);
            self.ui_render_topbar(ui);
            ui.add_space(4.0);
        });
        eg::TopBottomPanel::bottom("status_bar").show(ctx, |ui| self.ui_render_status(ui));

        if self.selected.is_some() {
            self.ui_render_detail_panel(ctx);
        }

        eg::CentralPanel::default().show(ctx, |ui| {
            if self.cards.is_empty() {
                self.ui_render_empty(ui);
            } else {
                self.ui_render_grid(ui, ctx);
            }
        });

        self.ui_render_series_window(ctx);
        self.ui_render_subtitle_window(ctx);
        self.ui_render_settings_window(ctx);

        self.maybe_save_prefs();

        let subs_busy = self.subtitle_search.as_ref().is_some_and(|s| s.busy);
        if self.is_busy() || subs_busy || self.prefs_dirty {
            ctx.request_repaint_after(BUSY_REPAINT);
        }
    }
}
