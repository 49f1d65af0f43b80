use hometheater::config::{load_config_from, DataPaths};
use hometheater::library::metadata::MetadataCache;
use hometheater::library::store::LibraryStore;
use hometheater::library::worker::{self, CatalogMsg};
use hometheater::library::Library;
use std::env;
use std::fs::File;
use std::io::Write;
use std::sync::mpsc;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), String> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();

    let args: Vec<String> = env::args().collect();
    if args.len() == 1 || args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let paths = DataPaths::resolve();
    let store = LibraryStore::new(&paths.library_cache);
    println!("Data dir: {}", paths.root.display());

    if args.iter().any(|a| a == "--scan") {
        return run_scan(&paths);
    }
    if args.iter().any(|a| a == "--clear-metadata") {
        let mut library = store.load();
        let dropped = worker::clear_metadata_cache(&paths, &mut library)
            .map_err(|e| format!("clear metadata: {e}"))?;
        println!("Cleared {dropped} cached lookups.");
        return Ok(());
    }

    let library = store.load();
    let limit: usize = args
        .iter()
        .skip(1)
        .find(|a| !a.starts_with("--"))
        .and_then(|s| s.parse().ok())
        .unwrap_or(20);
    let out_file = args
        .iter()
        .position(|a| a == "--out")
        .and_then(|i| args.get(i + 1).cloned());

    let output = if args.iter().any(|a| a == "--movies") {
        list_movies(&library, limit)
    } else if args.iter().any(|a| a == "--series") {
        list_series(&library, limit)
    } else if args.iter().any(|a| a == "--cache") {
        list_cache(&MetadataCache::load(&paths.metadata_cache), limit)
    } else {
        summary(&library, &paths)
    };

    match out_file {
        Some(path) => {
            let mut file =
                File::create(&path).map_err(|e| format!("create {path}: {e}"))?;
            file.write_all(output.as_bytes())
                .map_err(|e| format!("write {path}: {e}"))?;
            println!("Exported results to {path}");
        }
        None => print!("{output}"),
    }
    Ok(())
}

fn print_usage() {
    println!(
        r#"Home Theater catalog explorer.

Usage:
  cargo run --bin catalog_explorer -- --summary
      Counts, favorites and metadata coverage of the stored catalog.

  cargo run --bin catalog_explorer -- --movies [limit] [--out file]
  cargo run --bin catalog_explorer -- --series [limit] [--out file]
      List catalog entries (default limit = 20).

  cargo run --bin catalog_explorer -- --cache [limit]
      Show cached OMDb lookups.

  cargo run --bin catalog_explorer -- --scan
      Rescan the configured folders and fetch missing metadata.

  cargo run --bin catalog_explorer -- --clear-metadata
      Drop cached lookups and posters."#
    );
}

fn summary(library: &Library, paths: &DataPaths) -> String {
    let items: Vec<_> = library.items().collect();
    let with_meta = items.iter().filter(|i| !i.metadata.is_missing()).count();
    let favorites = library.movies.iter().filter(|m| m.favorite).count()
        + library.series.values().filter(|s| s.favorite).count();
    let cache = MetadataCache::load(&paths.metadata_cache);

    let mut out = String::new();
    out.push_str(&format!("Movies:    {}\n", library.movies.len()));
    out.push_str(&format!("Series:    {}\n", library.series.len()));
    out.push_str(&format!("Episodes:  {}\n", library.episode_count()));
    out.push_str(&format!("Favorites: {favorites}\n"));
    out.push_str(&format!("Looked up: {with_meta}/{}\n", items.len()));
    out.push_str(&format!("Pending:   {}\n", library.pending_lookups().len()));
    out.push_str(&format!("Cache:     {} entries\n", cache.len()));
    out
}

fn list_movies(library: &Library, limit: usize) -> String {
    let mut out = format!("--- Movies ({}) ---\n", library.movies.len());
    for m in library.movies.iter().take(limit) {
        let year = m.year.map(|y| format!(" ({y})")).unwrap_or_default();
        let rating = m.metadata.rating.as_deref().unwrap_or("-");
        let fav = if m.favorite { "★" } else { " " };
        out.push_str(&format!(
            "{fav} #{:<5} {}{year}  [{rating}]  {}\n",
            m.id,
            m.title,
            m.path.display()
        ));
    }
    out
}

fn list_series(library: &Library, limit: usize) -> String {
    let mut out = format!("--- Series ({}) ---\n", library.series.len());
    for s in library.series.values().take(limit) {
        let seasons = s.seasons();
        let fav = if s.favorite { "★" } else { " " };
        out.push_str(&format!(
            "{fav} {}: {} episodes in {} seasons\n",
            s.name,
            s.episodes.len(),
            seasons.len()
        ));
    }
    out
}

fn list_cache(cache: &MetadataCache, limit: usize) -> String {
    let mut keys: Vec<&String> = cache.keys().collect();
    keys.sort();
    let mut out = format!("--- Metadata cache ({}) ---\n", cache.len());
    for key in keys.into_iter().take(limit) {
        let found = cache.get(key).is_some_and(|r| r.is_found());
        let when = cache
            .fetched_at(key)
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        out.push_str(&format!(
            "{key:<50} {}  {when}\n",
            if found { "found" } else { "not found" }
        ));
    }
    out
}

fn run_scan(paths: &DataPaths) -> Result<(), String> {
    paths
        .ensure()
        .map_err(|e| format!("data dir {}: {e}", paths.root.display()))?;
    let config = load_config_from(&paths.config);
    let previous = LibraryStore::new(&paths.library_cache).load();
    let (tx, rx) = mpsc::channel();
    let handle = worker::spawn_scan(config, paths.clone(), previous, tx);

    let mut library = None;
    for msg in rx {
        match msg {
            CatalogMsg::Info(s) => println!("{s}"),
            CatalogMsg::Scanned(outcome) => {
                println!("Scan complete: {}", outcome.stats.summary());
                library = Some(outcome.library);
            }
            CatalogMsg::Metadata { key, metadata } => {
                if let Some(lib) = library.as_mut() {
                    lib.apply_metadata(&key, metadata);
                }
            }
            CatalogMsg::MetadataDone {
                fetched,
                not_found,
                failed,
                skipped,
            } => println!(
                "Metadata: {fetched} found, {not_found} not found, {failed} failed, {skipped} skipped"
            ),
            CatalogMsg::Error(err) => return Err(err),
        }
    }
    handle.join().map_err(|_| "scan thread panicked".to_string())?;

    if let Some(lib) = library {
        LibraryStore::new(&paths.library_cache)
            .save(&lib)
            .map_err(|e| format!("save library: {e}"))?;
    }
    Ok(())
}
