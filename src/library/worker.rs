// src/library/worker.rs
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};

use tracing::{info, warn};

use super::metadata::{LookupOutcome, MetadataCache, OmdbClient};
use super::posters::{PosterStore, POSTER_JPEG_QUALITY, POSTER_MAX_WIDTH};
use super::scan::{scan_library, ScanOutcome};
use super::store::LibraryStore;
use super::{ItemKey, Library, LookupTarget, Metadata};
use crate::config::{AppConfig, DataPaths};

/// Progress from a background catalog job.
pub enum CatalogMsg {
    Info(String),
    Scanned(ScanOutcome),
    Metadata {
        key: ItemKey,
        metadata: Metadata,
    },
    MetadataDone {
        fetched: usize,
        not_found: usize,
        failed: usize,
        skipped: usize,
    },
    Error(String),
}

/// Scan both roots, persist the result, then fetch metadata for whatever
/// still lacks it.
pub fn spawn_scan(
    config: AppConfig,
    paths: DataPaths,
    previous: Library,
    tx: Sender<CatalogMsg>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        if config.needs_setup() {
            let _ = tx.send(CatalogMsg::Error(
                "No movie or series directory configured.".into(),
            ));
            return;
        }
        let _ = tx.send(CatalogMsg::Info("Scanning directories…".into()));

        let outcome = scan_library(&config, &previous);
        for root in &outcome.stats.missing_roots {
            let _ = tx.send(CatalogMsg::Info(format!(
                "Directory not found, skipped: {}",
                root.display()
            )));
        }
        if let Err(err) = LibraryStore::new(&paths.library_cache).save(&outcome.library) {
            warn!("Failed to persist library cache: {err}");
            let _ = tx.send(CatalogMsg::Info(format!("Could not save library: {err}")));
        }

        let pending = outcome.pending.clone();
        if tx.send(CatalogMsg::Scanned(outcome)).is_err() {
            return;
        }
        fetch_metadata(&config, &paths, &pending, &tx);
    })
}

/// Look up only the given targets (items still in the `missing` state).
pub fn spawn_metadata_refresh(
    config: AppConfig,
    paths: DataPaths,
    pending: Vec<LookupTarget>,
    tx: Sender<CatalogMsg>,
) -> JoinHandle<()> {
    thread::spawn(move || fetch_metadata(&config, &paths, &pending, &tx))
}

/// Forget every cached lookup and poster, reset item metadata and persist.
/// The next refresh fetches everything again.
pub fn clear_metadata_cache(paths: &DataPaths, library: &mut Library) -> std::io::Result<usize> {
    let mut cache = MetadataCache::load(&paths.metadata_cache);
    let dropped = cache.len();
    cache.clear();
    cache.save()?;
    let posters = PosterStore::new(&paths.posters).clear()?;
    library.clear_metadata();
    LibraryStore::new(&paths.library_cache).save(library)?;
    info!("cleared {dropped} cached lookups and {posters} posters");
    Ok(dropped)
}

fn fetch_metadata(
    config: &AppConfig,
    paths: &DataPaths,
    pending: &[LookupTarget],
    tx: &Sender<CatalogMsg>,
) {
    let done = |fetched, not_found, failed, skipped| {
        let _ = tx.send(CatalogMsg::MetadataDone {
            fetched,
            not_found,
            failed,
            skipped,
        });
    };

    if pending.is_empty() {
        done(0, 0, 0, 0);
        return;
    }

    let mut omdb = match OmdbClient::new(config.omdb_key()) {
        Ok(client) => client,
        Err(err) => {
            let _ = tx.send(CatalogMsg::Error(format!("Metadata client: {err}")));
            done(0, 0, 0, pending.len());
            return;
        }
    };
    if !omdb.has_key() {
        info!("No OMDb API key; skipping metadata for {} titles", pending.len());
        let _ = tx.send(CatalogMsg::Info(
            "No OMDb API key configured; metadata skipped.".into(),
        ));
        done(0, 0, 0, pending.len());
        return;
    }

    let mut cache = MetadataCache::load(&paths.metadata_cache);
    let posters = PosterStore::new(&paths.posters);
    let (mut fetched, mut not_found, mut failed) = (0usize, 0usize, 0usize);
    let total = pending.len();

    for (idx, target) in pending.iter().enumerate() {
        let _ = tx.send(CatalogMsg::Info(format!(
            "Fetching metadata ({}/{total}): {}",
            idx + 1,
            target.title
        )));

        let metadata = match omdb.lookup(&mut cache, target) {
            LookupOutcome::Found(mut md) => {
                if let Some(url) = md.poster_url.clone() {
                    match posters.download_resized_with_client(
                        omdb.http(),
                        &url,
                        POSTER_MAX_WIDTH,
                        POSTER_JPEG_QUALITY,
                    ) {
                        Ok(path) => md.poster = Some(path),
                        Err(err) => warn!("poster for {:?}: {err}", target.title),
                    }
                }
                fetched += 1;
                md
            }
            LookupOutcome::NotFound => {
                not_found += 1;
                Metadata::not_found()
            }
            LookupOutcome::Failed(err) => {
                warn!("metadata for {:?} failed: {err}", target.title);
                failed += 1;
                continue;
            }
            LookupOutcome::MissingApiKey => {
                failed += 1;
                continue;
            }
        };

        let msg = CatalogMsg::Metadata {
            key: target.key.clone(),
            metadata,
        };
        if tx.send(msg).is_err() {
            // receiver gone (window closed); keep what we have
            break;
        }
        if idx % 10 == 9 {
            if let Err(err) = cache.save_if_dirty() {
                warn!("Failed to save metadata cache: {err}");
            }
        }
    }

    if let Err(err) = cache.save_if_dirty() {
        warn!("Failed to save metadata cache: {err}");
    }
    info!("metadata: {fetched} found, {not_found} not found, {failed} failed");
    done(fetched, not_found, failed, 0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn scan_without_api_key_persists_and_skips_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let movies = dir.path().join("movies");
        fs::create_dir_all(&movies).unwrap();
        fs::write(movies.join("Heat.1995.mkv"), b"v").unwrap();
        fs::write(movies.join("Alien.1979.mp4"), b"v").unwrap();

        let paths = DataPaths::at(dir.path().join("data"));
        let mut cfg = AppConfig::default();
        cfg.movie_dir = Some(movies.to_string_lossy().into_owned());

        let (tx, rx) = mpsc::channel();
        spawn_scan(cfg, paths.clone(), Library::default(), tx)
            .join()
            .unwrap();

        let msgs: Vec<CatalogMsg> = rx.try_iter().collect();
        let scanned = msgs.iter().find_map(|m| match m {
            CatalogMsg::Scanned(out) => Some(out),
            _ => None,
        });
        assert_eq!(scanned.map(|o| o.library.movies.len()), Some(2));
        assert!(msgs.iter().any(|m| matches!(
            m,
            CatalogMsg::MetadataDone { fetched: 0, skipped: 2, .. }
        )));
        assert_eq!(LibraryStore::new(&paths.library_cache).load().movies.len(), 2);
        assert!(!paths.metadata_cache.exists());
    }

    #[test]
    fn unconfigured_scan_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = mpsc::channel();
        spawn_scan(
            AppConfig::default(),
            DataPaths::at(dir.path()),
            Library::default(),
            tx,
        );
        let msg = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(msg, CatalogMsg::Error(_)));
    }

    #[test]
    fn clearing_cache_resets_metadata_and_posters() {
        use crate::library::metadata::OmdbResponse;
        use crate::library::{ItemKey, MediaItem, MetadataState};

        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::at(dir.path());
        paths.ensure().unwrap();
        let mut cache = MetadataCache::load(&paths.metadata_cache);
        cache.insert("movie:heat:".into(), OmdbResponse::default());
        cache.save().unwrap();
        fs::write(paths.posters.join("abc.jpg"), b"jpeg").unwrap();

        let mut lib = Library::default();
        lib.movies.push(MediaItem {
            id: 1,
            title: "Heat".into(),
            year: None,
            path: "/m/Heat.mkv".into(),
            season: None,
            episode: None,
            metadata: Metadata::not_found(),
            favorite: true,
        });

        assert_eq!(clear_metadata_cache(&paths, &mut lib).unwrap(), 1);
        assert!(MetadataCache::load(&paths.metadata_cache).is_empty());
        assert!(!paths.posters.join("abc.jpg").exists());
        assert_eq!(lib.movies[0].metadata.state, MetadataState::Missing);
        assert!(lib.is_favorite(&ItemKey::Movie(1)));
        let stored = LibraryStore::new(&paths.library_cache).load();
        assert!(stored.movies[0].metadata.is_missing());
    }

    #[test]
    fn refresh_with_nothing_pending_finishes_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = mpsc::channel();
        spawn_metadata_refresh(AppConfig::default(), DataPaths::at(dir.path()), Vec::new(), tx)
            .join()
            .unwrap();
        assert!(matches!(
            rx.try_recv(),
            Ok(CatalogMsg::MetadataDone { fetched: 0, failed: 0, .. })
        ));
    }
}
