// src/web/handlers.rs
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use super::{start_metadata_refresh, start_scan, SharedState};
use crate::config::ConfigPatch;
use crate::library::browse::{
    apply_query, collect_cards, collect_genres, pick_random, random_playable, BrowseQuery, Card,
    Category, SortKey,
};
use crate::library::posters::PosterStore;
use crate::library::subtitles::{
    find_local_subtitle, load_as_vtt, save_sidecar, srt_to_vtt, OpenSubtitlesClient,
};
use crate::library::{worker, ItemKey};

const INDEX_HTML: &str = include_str!("index.html");

pub(crate) fn error(status: StatusCode, msg: impl Into<String>) -> Response {
    (status, Json(json!({ "error": msg.into() }))).into_response()
}

pub(crate) fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not Found").into_response()
}

fn poster_href(key: &ItemKey) -> String {
    format!("/get_poster/{}", urlencoding::encode(&key.to_string()))
}

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

// ---------- library ----------

#[derive(Debug, Default, Deserialize)]
pub struct BrowseParams {
    category: Option<String>,
    q: Option<String>,
    genre: Option<String>,
    sort: Option<String>,
}

impl BrowseParams {
    fn to_query(&self) -> BrowseQuery {
        BrowseQuery {
            category: self
                .category
                .as_deref()
                .and_then(Category::from_str)
                .unwrap_or_default(),
            search: self.q.clone().unwrap_or_default(),
            genre: self.genre.clone().filter(|g| !g.is_empty()),
            sort: self.sort.as_deref().and_then(SortKey::from_str).unwrap_or_default(),
        }
    }
}

#[derive(Serialize)]
struct CardView<'a> {
    #[serde(flatten)]
    card: &'a Card,
    poster: Option<String>,
}

impl<'a> From<&'a Card> for CardView<'a> {
    fn from(card: &'a Card) -> Self {
        Self {
            poster: card.has_poster.then(|| poster_href(&card.key)),
            card,
        }
    }
}

pub async fn data(State(state): State<SharedState>, Query(params): Query<BrowseParams>) -> Response {
    let (cards, genres, counts) = {
        let lib = state.library();
        (
            collect_cards(&lib),
            collect_genres(&lib),
            json!({
                "movies": lib.movies.len(),
                "series": lib.series.len(),
                "episodes": lib.episode_count(),
            }),
        )
    };
    let visible: Vec<CardView> = apply_query(&cards, &params.to_query())
        .into_iter()
        .map(CardView::from)
        .collect();

    Json(json!({
        "items": visible,
        "genres": genres,
        "counts": counts,
        "scanning": state.is_scanning(),
        "busy": state.is_busy(),
        "queue": state.queue_len(),
        "needs_setup": state.config().needs_setup(),
    }))
    .into_response()
}

pub async fn series(State(state): State<SharedState>, Path(name): Path<String>) -> Response {
    let languages = state.config().subtitle_languages.clone();
    let lib = state.library();
    let Some(entry) = lib.series.get(&name) else {
        return not_found();
    };
    let seasons: Vec<_> = entry
        .seasons()
        .into_iter()
        .map(|(season, episodes)| {
            let episodes: Vec<_> = episodes
                .into_iter()
                .map(|ep| {
                    json!({
                        "id": ep.id,
                        "label": ep.episode_label(),
                        "file": ep.file_name(),
                        "has_subtitle": find_local_subtitle(&ep.path, &languages).is_some(),
                    })
                })
                .collect();
            json!({ "season": season, "episodes": episodes })
        })
        .collect();

    let md = &entry.metadata;
    let key = ItemKey::Series(name.clone());
    Json(json!({
        "key": key,
        "name": entry.name,
        "favorite": entry.favorite,
        "rating": md.rating,
        "plot": md.plot,
        "genre": md.genre,
        "year": md.year,
        "poster": md.poster.as_ref().map(|_| poster_href(&key)),
        "seasons": seasons,
    }))
    .into_response()
}

pub async fn scan(State(state): State<SharedState>) -> Response {
    if state.config().needs_setup() {
        return error(StatusCode::BAD_REQUEST, "No movie or series directory configured");
    }
    let status = if start_scan(&state) { "started" } else { "busy" };
    Json(json!({ "status": status })).into_response()
}

pub async fn get_settings(State(state): State<SharedState>) -> Response {
    let cfg = state.config().clone();
    Json(json!({ "config": cfg, "warnings": cfg.validate(), "data_dir": state.paths.root }))
        .into_response()
}

pub async fn post_settings(
    State(state): State<SharedState>,
    Json(patch): Json<ConfigPatch>,
) -> Response {
    let (before, after) = {
        let mut cfg = state.config_mut();
        let before = cfg.clone();
        cfg.merge(patch);
        (before, cfg.clone())
    };
    if let Err(err) = after.save_to(&state.paths.config) {
        warn!("failed to save config: {err}");
        return error(StatusCode::INTERNAL_SERVER_ERROR, format!("save failed: {err}"));
    }
    info!("settings saved");

    let roots_changed =
        before.movie_dir != after.movie_dir || before.series_dir != after.series_dir;
    if roots_changed && !after.needs_setup() {
        start_scan(&state);
    } else if before.omdb_key().is_none() && after.omdb_key().is_some() {
        start_metadata_refresh(&state);
    }
    Json(json!({ "status": "ok", "warnings": after.validate() })).into_response()
}

pub async fn favorite(State(state): State<SharedState>, Path(key): Path<String>) -> Response {
    let Ok(key) = key.parse::<ItemKey>() else {
        return error(StatusCode::BAD_REQUEST, "bad item key");
    };
    let toggled = state.library_mut().toggle_favorite(&key);
    match toggled {
        Some(now) => {
            state.save_library();
            Json(json!({ "key": key, "favorite": now })).into_response()
        }
        None => not_found(),
    }
}

pub async fn random(State(state): State<SharedState>, Query(params): Query<BrowseParams>) -> Response {
    let lib = state.library();
    let cards = collect_cards(&lib);
    let visible = apply_query(&cards, &params.to_query());
    let mut rng = rand::rng();
    let Some(card) = pick_random(&visible, &mut rng) else {
        return not_found();
    };
    let Some(item) = random_playable(&lib, &card.key, &mut rng) else {
        return not_found();
    };
    Json(json!({
        "id": item.id,
        "key": card.key,
        "title": card.title,
        "episode": item.season.map(|_| item.episode_label()),
    }))
    .into_response()
}

pub async fn clear_cache(State(state): State<SharedState>) -> Response {
    if state.is_busy() {
        return error(StatusCode::CONFLICT, "a scan is running");
    }
    let result = worker::clear_metadata_cache(&state.paths, &mut state.library_mut());
    match result {
        Ok(cleared) => {
            let refreshing = start_metadata_refresh(&state);
            Json(json!({ "cleared": cleared, "refreshing": refreshing })).into_response()
        }
        Err(err) => {
            warn!("cache clear failed: {err}");
            error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

// ---------- files ----------

pub async fn poster(State(state): State<SharedState>, Path(key): Path<String>) -> Response {
    let Ok(key) = key.parse::<ItemKey>() else {
        return not_found();
    };
    let path = state
        .library()
        .metadata(&key)
        .and_then(|md| md.poster.clone());
    let Some(path) = path else {
        return not_found();
    };
    if !PosterStore::new(&state.paths.posters).contains(&path) {
        warn!("poster outside cache dir refused: {}", path.display());
        return not_found();
    }
    match tokio::fs::read(&path).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, "image/jpeg")], bytes).into_response(),
        Err(_) => not_found(),
    }
}

pub async fn subtitle(State(state): State<SharedState>, Path(id): Path<u64>) -> Response {
    let languages = state.config().subtitle_languages.clone();
    let video = state.library().find_playable(id).map(|i| i.path.clone());
    let Some(sub) = video.and_then(|v| find_local_subtitle(&v, &languages)) else {
        return not_found();
    };
    match load_as_vtt(&sub) {
        Ok(vtt) => ([(header::CONTENT_TYPE, "text/vtt; charset=utf-8")], vtt).into_response(),
        Err(err) => {
            warn!("subtitle {}: {err}", sub.display());
            not_found()
        }
    }
}

// ---------- online subtitles ----------

pub async fn search_subtitles(State(state): State<SharedState>, Path(id): Path<u64>) -> Response {
    let (key, languages) = {
        let cfg = state.config();
        (cfg.opensubtitles_key().map(str::to_string), cfg.subtitle_languages.clone())
    };
    let Some(key) = key else {
        return error(StatusCode::BAD_REQUEST, "OpenSubtitles API key not configured");
    };
    let Some(item) = state.library().find_playable(id).cloned() else {
        return Json(json!([])).into_response();
    };
    if !state.config().is_within_library(&item.path) {
        return Json(json!([])).into_response();
    }

    let result = tokio::task::spawn_blocking(move || {
        OpenSubtitlesClient::new(Some(&key), &languages)?.search(&item.path, &item.title, item.year)
    })
    .await;
    match result {
        Ok(Ok(hits)) => Json(hits).into_response(),
        Ok(Err(err)) => {
            warn!("subtitle search: {err}");
            error(StatusCode::BAD_GATEWAY, err)
        }
        Err(err) => error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    file_id: Option<u64>,
    /// When set, the subtitle is also saved next to this video.
    id: Option<u64>,
    language: Option<String>,
}

pub async fn download_subtitle(
    State(state): State<SharedState>,
    Json(req): Json<DownloadRequest>,
) -> Response {
    let (key, languages) = {
        let cfg = state.config();
        (cfg.opensubtitles_key().map(str::to_string), cfg.subtitle_languages.clone())
    };
    let Some(key) = key else {
        return (StatusCode::BAD_REQUEST, "API key not configured").into_response();
    };
    let Some(file_id) = req.file_id else {
        return (StatusCode::BAD_REQUEST, "No file ID provided").into_response();
    };
    let video = req
        .id
        .and_then(|id| state.library().find_playable(id).map(|i| i.path.clone()));
    let lang = req
        .language
        .or_else(|| languages.first().cloned())
        .unwrap_or_else(|| "en".to_string());

    let result = tokio::task::spawn_blocking(move || {
        let text = OpenSubtitlesClient::new(Some(&key), &languages)?.download(file_id)?;
        if let Some(video) = video {
            match save_sidecar(&video, &lang, &text) {
                Ok(path) => info!("saved subtitle {}", path.display()),
                Err(err) => warn!("could not save subtitle next to {}: {err}", video.display()),
            }
        }
        Ok::<_, String>(srt_to_vtt(&text))
    })
    .await;
    match result {
        Ok(Ok(vtt)) => ([(header::CONTENT_TYPE, "text/vtt; charset=utf-8")], vtt).into_response(),
        Ok(Err(err)) => {
            warn!("subtitle download: {err}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Download failed").into_response()
        }
        Err(err) => error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, DataPaths};
    use crate::library::{Library, MediaItem, Metadata, SeriesEntry};
    use crate::web::{router, WebState};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::fs;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn item(id: u64, title: &str, path: std::path::PathBuf) -> MediaItem {
        MediaItem {
            id,
            title: title.into(),
            year: None,
            path,
            season: None,
            episode: None,
            metadata: Metadata::default(),
            favorite: false,
        }
    }

    fn fixture(dir: &std::path::Path) -> SharedState {
        let movies = dir.join("movies");
        fs::create_dir_all(&movies).unwrap();
        fs::write(movies.join("Heat.mkv"), b"video").unwrap();
        fs::write(movies.join("Heat.en.srt"), "1\n00:00:01,000 --> 00:00:02,500\nHi\n").unwrap();

        let mut lib = Library::default();
        lib.movies.push(item(1, "Heat", movies.join("Heat.mkv")));
        let mut dark = SeriesEntry::new("Dark");
        let mut ep = item(2, "Dark", movies.join("Dark.S01E01.mkv"));
        ep.season = Some(1);
        ep.episode = Some(1);
        dark.episodes.push(ep);
        lib.series.insert("Dark".into(), dark);

        let mut cfg = AppConfig::default();
        cfg.movie_dir = Some(movies.to_string_lossy().into_owned());
        let paths = DataPaths::at(dir.join("data"));
        paths.ensure().unwrap();
        Arc::new(WebState::new(paths, cfg, lib))
    }

    async fn get(state: &SharedState, uri: &str) -> (StatusCode, Vec<u8>) {
        send(state, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
    }

    async fn send(state: &SharedState, req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let resp = router(state.clone()).oneshot(req).await.unwrap();
        let status = resp.status();
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    fn json_body(body: &[u8]) -> serde_json::Value {
        serde_json::from_slice(body).unwrap()
    }

    #[tokio::test]
    async fn data_lists_filtered_cards() {
        let dir = tempfile::tempdir().unwrap();
        let state = fixture(dir.path());

        let (status, body) = get(&state, "/api/data").await;
        assert_eq!(status, StatusCode::OK);
        let v = json_body(&body);
        assert_eq!(v["items"].as_array().unwrap().len(), 2);
        assert_eq!(v["scanning"], false);
        assert_eq!(v["counts"]["episodes"], 1);

        let (_, body) = get(&state, "/api/data?category=series").await;
        let v = json_body(&body);
        assert_eq!(v["items"][0]["key"], "s_Dark");
        assert_eq!(v["items"][0]["poster"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn favorite_toggles_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let state = fixture(dir.path());
        let post = || Request::post("/api/favorite/m_1").body(Body::empty()).unwrap();

        let (status, body) = send(&state, post()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_body(&body)["favorite"], true);
        assert!(crate::library::store::LibraryStore::new(&state.paths.library_cache)
            .load()
            .is_favorite(&ItemKey::Movie(1)));

        let (_, body) = send(&state, post()).await;
        assert_eq!(json_body(&body)["favorite"], false);

        let (status, _) = send(
            &state,
            Request::post("/api/favorite/m_99").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn series_detail_groups_seasons() {
        let dir = tempfile::tempdir().unwrap();
        let state = fixture(dir.path());
        let (status, body) = get(&state, "/api/series/Dark").await;
        assert_eq!(status, StatusCode::OK);
        let v = json_body(&body);
        assert_eq!(v["seasons"][0]["season"], 1);
        assert_eq!(v["seasons"][0]["episodes"][0]["label"], "S01E01");

        let (status, _) = get(&state, "/api/series/Nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn subtitle_is_served_as_vtt() {
        let dir = tempfile::tempdir().unwrap();
        let state = fixture(dir.path());
        let (status, body) = get(&state, "/subtitle/1").await;
        assert_eq!(status, StatusCode::OK);
        let text = String::from_utf8(body).unwrap();
        assert!(text.starts_with("WEBVTT"));
        assert!(text.contains("00:00:01.000 --> 00:00:02.500"));

        let (status, _) = get(&state, "/subtitle/2").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn subtitle_search_needs_a_key() {
        let dir = tempfile::tempdir().unwrap();
        let state = fixture(dir.path());
        let (status, _) = get(&state, "/api/search_subs_hash/1").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let req = Request::post("/api/download_sub_hash")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"file_id": 7}"#))
            .unwrap();
        let (status, _) = send(&state, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn poster_keys_are_checked() {
        let dir = tempfile::tempdir().unwrap();
        let state = fixture(dir.path());
        let (status, _) = get(&state, "/get_poster/..%2F..%2Fetc%2Fpasswd").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let outside = dir.path().join("elsewhere.jpg");
        fs::write(&outside, b"jpeg").unwrap();
        state.library_mut().movies[0].metadata.poster = Some(outside);
        let (status, _) = get(&state, "/get_poster/m_1").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let inside = state.paths.posters.join("abc.jpg");
        fs::write(&inside, b"jpeg").unwrap();
        state.library_mut().movies[0].metadata.poster = Some(inside);
        let (status, body) = get(&state, "/get_poster/m_1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"jpeg");
    }

    #[tokio::test]
    async fn settings_round_trip_without_rescan_when_roots_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let state = fixture(dir.path());
        let req = Request::post("/api/settings")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"player_cmd": "mpv", "web_port": 8080}"#))
            .unwrap();
        let (status, _) = send(&state, req).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!state.is_busy());

        let (_, body) = get(&state, "/api/settings").await;
        let v = json_body(&body);
        assert_eq!(v["config"]["player_cmd"], "mpv");
        assert_eq!(v["config"]["web_port"], 8080);
        assert!(state.paths.config.exists());
    }

    #[tokio::test]
    async fn random_picks_from_filtered_view() {
        let dir = tempfile::tempdir().unwrap();
        let state = fixture(dir.path());
        let (status, body) = get(&state, "/api/random?category=movies").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_body(&body)["id"], 1);

        let (status, _) = get(&state, "/api/random?category=fav").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
