// src/web/mod.rs: browser shell. Library state lives behind RwLocks; a pump
// thread applies worker messages so handlers only ever see whole updates.
pub mod handlers;
pub mod stream;

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::config::{load_config_from, AppConfig, DataPaths};
use crate::library::store::LibraryStore;
use crate::library::worker::{self, CatalogMsg};
use crate::library::Library;

pub struct WebState {
    pub paths: DataPaths,
    config: RwLock<AppConfig>,
    library: RwLock<Library>,
    /// A scan or metadata job is running.
    busy: AtomicBool,
    /// The scan phase of the current job has not finished.
    scanning: AtomicBool,
    queue: AtomicUsize,
    save_lock: Mutex<()>,
}

pub type SharedState = Arc<WebState>;

impl WebState {
    pub fn new(paths: DataPaths, config: AppConfig, library: Library) -> Self {
        Self {
            paths,
            config: RwLock::new(config),
            library: RwLock::new(library),
            busy: AtomicBool::new(false),
            scanning: AtomicBool::new(false),
            queue: AtomicUsize::new(0),
            save_lock: Mutex::new(()),
        }
    }

    /// Config and library from the data dir.
    pub fn load(paths: DataPaths) -> Self {
        if let Err(err) = paths.ensure() {
            warn!("failed to create data dir {}: {err}", paths.root.display());
        }
        let config = load_config_from(&paths.config);
        let library = LibraryStore::new(&paths.library_cache).load();
        Self::new(paths, config, library)
    }

    // a panicked writer leaves whole values behind, so poisoning is ignored
    pub fn config(&self) -> RwLockReadGuard<'_, AppConfig> {
        self.config.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config_mut(&self) -> RwLockWriteGuard<'_, AppConfig> {
        self.config.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn library(&self) -> RwLockReadGuard<'_, Library> {
        self.library.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn library_mut(&self) -> RwLockWriteGuard<'_, Library> {
        self.library.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::SeqCst)
    }

    pub fn queue_len(&self) -> usize {
        self.queue.load(Ordering::SeqCst)
    }

    pub fn save_library(&self) {
        let _guard = self.save_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let lib = self.library();
        if let Err(err) = LibraryStore::new(&self.paths.library_cache).save(&lib) {
            warn!("failed to save library: {err}");
        }
    }

    fn apply(&self, msg: CatalogMsg) {
        match msg {
            CatalogMsg::Info(s) => debug!("{s}"),
            CatalogMsg::Scanned(outcome) => {
                info!("scan complete: {}", outcome.stats.summary());
                self.queue.store(outcome.pending.len(), Ordering::SeqCst);
                let mut library = outcome.library;
                library.carry_favorites_from(&self.library());
                *self.library_mut() = library;
                self.save_library();
                self.scanning.store(false, Ordering::SeqCst);
            }
            CatalogMsg::Metadata { key, metadata } => {
                self.library_mut().apply_metadata(&key, metadata);
                let _ = self
                    .queue
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| Some(n.saturating_sub(1)));
            }
            CatalogMsg::MetadataDone {
                fetched,
                not_found,
                failed,
                skipped,
            } => {
                info!("metadata done: {fetched} found, {not_found} not found, {failed} failed, {skipped} skipped");
                self.queue.store(0, Ordering::SeqCst);
                self.save_library();
            }
            CatalogMsg::Error(err) => warn!("catalog: {err}"),
        }
    }
}

fn pump(state: SharedState, rx: Receiver<CatalogMsg>) {
    thread::spawn(move || {
        for msg in rx {
            state.apply(msg);
        }
        state.scanning.store(false, Ordering::SeqCst);
        state.queue.store(0, Ordering::SeqCst);
        state.busy.store(false, Ordering::SeqCst);
    });
}

/// Start a scan unless a job is already running. Returns false when busy.
pub fn start_scan(state: &SharedState) -> bool {
    if state.busy.swap(true, Ordering::SeqCst) {
        return false;
    }
    state.scanning.store(true, Ordering::SeqCst);
    let (tx, rx) = mpsc::channel();
    let config = state.config().clone();
    let previous = state.library().clone();
    worker::spawn_scan(config, state.paths.clone(), previous, tx);
    pump(state.clone(), rx);
    true
}

/// Fetch metadata for items still missing it. Returns false when busy or idle.
pub fn start_metadata_refresh(state: &SharedState) -> bool {
    let config = state.config().clone();
    if config.omdb_key().is_none() {
        return false;
    }
    let pending = state.library().pending_lookups();
    if pending.is_empty() || state.busy.swap(true, Ordering::SeqCst) {
        return false;
    }
    state.queue.store(pending.len(), Ordering::SeqCst);
    let (tx, rx) = mpsc::channel();
    worker::spawn_metadata_refresh(config, state.paths.clone(), pending, tx);
    pump(state.clone(), rx);
    true
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/api/data", get(handlers::data))
        .route("/api/series/{name}", get(handlers::series))
        .route("/api/scan", post(handlers::scan))
        .route("/api/settings", get(handlers::get_settings).post(handlers::post_settings))
        .route("/api/favorite/{key}", post(handlers::favorite))
        .route("/api/random", get(handlers::random))
        .route("/api/cache/clear", post(handlers::clear_cache))
        .route("/get_poster/{key}", get(handlers::poster))
        .route("/play/{id}", get(stream::play))
        .route("/subtitle/{id}", get(handlers::subtitle))
        .route("/api/search_subs_hash/{id}", get(handlers::search_subtitles))
        .route("/api/download_sub_hash", post(handlers::download_subtitle))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: SharedState, addr: SocketAddr) -> io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Home Theater listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state)).await
}
