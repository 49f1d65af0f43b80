// src/web/stream.rs: video delivery for the browser player.
use std::path::Path as FsPath;
use std::process::Stdio;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

use super::handlers::not_found;
use super::SharedState;

/// Containers browsers can't play; these go through ffmpeg.
pub const TRANSCODE_EXTENSIONS: &[&str] = &["avi", "wmv", "flv", "divx"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// How a `Range` header applies to a file of a given size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RangeRequest {
    /// Unknown unit or malformed spec: serve the whole file.
    Ignored,
    Satisfiable(ByteRange),
    Unsatisfiable,
}

/// `bytes=start-end`, `bytes=start-` or `bytes=-suffix`, clamped to the file.
pub fn parse_range_header(range_str: &str, file_size: u64) -> RangeRequest {
    let Some(range_part) = range_str.trim().strip_prefix("bytes=") else {
        return RangeRequest::Ignored;
    };
    // multi-range requests get the first range only
    let range_part = range_part.split(',').next().unwrap_or_default().trim();
    let Some((first, last)) = range_part.split_once('-') else {
        return RangeRequest::Ignored;
    };
    let (first, last) = (first.trim(), last.trim());
    let parse = |s: &str| s.parse::<u64>().ok();

    let (start, end) = match (first.is_empty(), last.is_empty()) {
        (true, true) => return RangeRequest::Ignored,
        (true, false) => {
            let Some(suffix_len) = parse(last) else {
                return RangeRequest::Ignored;
            };
            if suffix_len == 0 || file_size == 0 {
                return RangeRequest::Unsatisfiable;
            }
            (file_size.saturating_sub(suffix_len), file_size - 1)
        }
        (false, true) => {
            let Some(start) = parse(first) else {
                return RangeRequest::Ignored;
            };
            (start, file_size.saturating_sub(1))
        }
        (false, false) => {
            let (Some(start), Some(end)) = (parse(first), parse(last)) else {
                return RangeRequest::Ignored;
            };
            if end < start {
                return RangeRequest::Ignored;
            }
            (start, end.min(file_size.saturating_sub(1)))
        }
    };

    if start >= file_size {
        return RangeRequest::Unsatisfiable;
    }
    RangeRequest::Satisfiable(ByteRange { start, end })
}

pub fn content_type_for(path: &FsPath) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("mkv") => "video/x-matroska",
        Some("webm") => "video/webm",
        Some("mov") => "video/quicktime",
        Some("avi") => "video/x-msvideo",
        Some("wmv") => "video/x-ms-wmv",
        Some("flv") => "video/x-flv",
        _ => "application/octet-stream",
    }
}

pub fn needs_transcode(path: &FsPath) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| TRANSCODE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

pub fn ffmpeg_args(input: &FsPath) -> Vec<String> {
    let mut args = vec!["-i".to_string(), input.to_string_lossy().into_owned()];
    args.extend(
        [
            "-c:v", "libx264", "-preset", "ultrafast", "-c:a", "aac", "-b:a", "128k", "-f",
            "mp4", "-movflags", "frag_keyframe+empty_moov", "pipe:1",
        ]
        .map(String::from),
    );
    args
}

pub async fn play(
    State(state): State<SharedState>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Response {
    let path = state.library().find_playable(id).map(|i| i.path.clone());
    let Some(path) = path else {
        return not_found();
    };
    if !path.exists() {
        warn!("media file missing on disk: {}", path.display());
        return (StatusCode::NOT_FOUND, "File Not Found").into_response();
    }
    let (allowed, ffmpeg) = {
        let cfg = state.config();
        (cfg.is_within_library(&path), cfg.ffmpeg().to_string())
    };
    if !allowed {
        warn!("refusing to stream outside library roots: {}", path.display());
        return (StatusCode::FORBIDDEN, "Forbidden").into_response();
    }

    if needs_transcode(&path) {
        match transcode(&ffmpeg, &path) {
            Ok(resp) => return resp,
            // fall through to the raw file
            Err(err) => warn!("ffmpeg unavailable ({err}); streaming {} as-is", path.display()),
        }
    }

    match serve_file(&path, &headers).await {
        Ok(resp) => resp,
        Err(err) => {
            warn!("stream {}: {err}", path.display());
            (StatusCode::INTERNAL_SERVER_ERROR, "Error").into_response()
        }
    }
}

/// Fragmented MP4 on stdout; ffmpeg exits on a broken pipe when the client goes away.
fn transcode(ffmpeg: &str, path: &FsPath) -> std::io::Result<Response> {
    let mut child = tokio::process::Command::new(ffmpeg)
        .args(ffmpeg_args(path))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| std::io::Error::other("ffmpeg stdout not captured"))?;
    info!("transcoding {}", path.display());
    tokio::spawn(async move {
        match child.wait().await {
            Ok(status) => debug!("ffmpeg exited: {status}"),
            Err(err) => warn!("ffmpeg wait: {err}"),
        }
    });

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "video/mp4")
        .body(Body::from_stream(ReaderStream::new(stdout)))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()))
}

async fn serve_file(path: &FsPath, headers: &HeaderMap) -> std::io::Result<Response> {
    let mut file = tokio::fs::File::open(path).await?;
    let file_size = file.metadata().await?.len();
    let content_type = content_type_for(path);

    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .map_or(RangeRequest::Ignored, |r| parse_range_header(r, file_size));

    let range = match range {
        RangeRequest::Satisfiable(range) => range,
        RangeRequest::Ignored => {
            return Ok(Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, content_type)
                .header(header::CONTENT_LENGTH, file_size)
                .header(header::ACCEPT_RANGES, "bytes")
                .body(Body::from_stream(ReaderStream::new(file)))
                .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()));
        }
        RangeRequest::Unsatisfiable => {
            return Ok(Response::builder()
                .status(StatusCode::RANGE_NOT_SATISFIABLE)
                .header(header::CONTENT_RANGE, format!("bytes */{file_size}"))
                .body(Body::empty())
                .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()));
        }
    };

    debug!("range {}-{}/{file_size}", range.start, range.end);
    file.seek(std::io::SeekFrom::Start(range.start)).await?;
    let body = Body::from_stream(ReaderStream::new(file.take(range.len())));
    Ok(Response::builder()
        .status(StatusCode::PARTIAL_CONTENT)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, range.len())
        .header(
            header::CONTENT_RANGE,
            format!("bytes {}-{}/{file_size}", range.start, range.end),
        )
        .header(header::ACCEPT_RANGES, "bytes")
        .body(body)
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, DataPaths};
    use crate::library::{Library, MediaItem, Metadata};
    use crate::web::{router, WebState};
    use axum::body::to_bytes;
    use axum::http::Request;
    use std::fs;
    use std::sync::Arc;
    use tower::ServiceExt;

    #[test]
    fn range_forms() {
        let ok = |start, end| RangeRequest::Satisfiable(ByteRange { start, end });
        assert_eq!(parse_range_header("bytes=0-99", 1000), ok(0, 99));
        assert_eq!(parse_range_header("bytes=900-", 1000), ok(900, 999));
        assert_eq!(parse_range_header("bytes=-100", 1000), ok(900, 999));
        assert_eq!(parse_range_header("bytes=-5000", 1000), ok(0, 999));
        assert_eq!(parse_range_header("bytes=500-5000", 1000), ok(500, 999));
        assert_eq!(parse_range_header("bytes=0-0,5-9", 1000), ok(0, 0));
        assert_eq!(parse_range_header("bytes=1000-", 1000), RangeRequest::Unsatisfiable);
        assert_eq!(parse_range_header("bytes=-0", 1000), RangeRequest::Unsatisfiable);
        assert_eq!(parse_range_header("bytes=0-1", 0), RangeRequest::Unsatisfiable);
    }

    #[test]
    fn unknown_units_and_malformed_ranges_are_ignored() {
        for header in ["items=0-1", "bytes=9-3", "bytes=abc-", "bytes=-", "bytes=5", "0-10"] {
            assert_eq!(parse_range_header(header, 1000), RangeRequest::Ignored, "{header}");
        }
    }

    #[test]
    fn transcode_only_legacy_containers() {
        assert!(needs_transcode(FsPath::new("/m/Old.AVI")));
        assert!(needs_transcode(FsPath::new("/m/clip.divx")));
        assert!(!needs_transcode(FsPath::new("/m/New.mkv")));
        let args = ffmpeg_args(FsPath::new("/m/Old.avi"));
        assert_eq!(&args[..2], ["-i", "/m/Old.avi"]);
        assert_eq!(args.last().map(String::as_str), Some("pipe:1"));
        assert!(args.iter().any(|a| a == "frag_keyframe+empty_moov"));
    }

    fn state_with(dir: &FsPath, video: &FsPath) -> crate::web::SharedState {
        let mut lib = Library::default();
        lib.movies.push(MediaItem {
            id: 1,
            title: "Clip".into(),
            year: None,
            path: video.to_path_buf(),
            season: None,
            episode: None,
            metadata: Metadata::default(),
            favorite: false,
        });
        let mut cfg = AppConfig::default();
        cfg.movie_dir = Some(dir.join("movies").to_string_lossy().into_owned());
        Arc::new(WebState::new(DataPaths::at(dir.join("data")), cfg, lib))
    }

    #[tokio::test]
    async fn range_request_gets_partial_content() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("movies")).unwrap();
        let video = dir.path().join("movies/clip.mp4");
        fs::write(&video, b"0123456789").unwrap();
        let state = state_with(dir.path(), &video);

        let req = Request::builder()
            .uri("/play/1")
            .header(header::RANGE, "bytes=2-5")
            .body(Body::empty())
            .unwrap();
        let resp = router(state.clone()).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(resp.headers()[header::CONTENT_RANGE], "bytes 2-5/10");
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "video/mp4");
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"2345");

        let req = Request::builder().uri("/play/1").body(Body::empty()).unwrap();
        let resp = router(state.clone()).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::ACCEPT_RANGES], "bytes");
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.len(), 10);
    }

    #[tokio::test]
    async fn odd_range_headers_get_full_file_or_416() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("movies")).unwrap();
        let video = dir.path().join("movies/clip.mp4");
        fs::write(&video, b"0123456789").unwrap();
        let state = state_with(dir.path(), &video);

        for range in ["items=0-1", "bytes=oops"] {
            let req = Request::builder()
                .uri("/play/1")
                .header(header::RANGE, range)
                .body(Body::empty())
                .unwrap();
            let resp = router(state.clone()).oneshot(req).await.unwrap();
            assert_eq!(resp.status(), StatusCode::OK, "{range}");
            let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
            assert_eq!(&body[..], b"0123456789");
        }

        let req = Request::builder()
            .uri("/play/1")
            .header(header::RANGE, "bytes=10-")
            .body(Body::empty())
            .unwrap();
        let resp = router(state).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(resp.headers()[header::CONTENT_RANGE], "bytes */10");
    }

    #[tokio::test]
    async fn files_outside_roots_are_forbidden() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("movies")).unwrap();
        let video = dir.path().join("stray.mp4");
        fs::write(&video, b"x").unwrap();
        let state = state_with(dir.path(), &video);

        let req = Request::builder().uri("/play/1").body(Body::empty()).unwrap();
        let resp = router(state.clone()).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        fs::remove_file(&video).unwrap();
        let req = Request::builder().uri("/play/1").body(Body::empty()).unwrap();
        let resp = router(state.clone()).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let req = Request::builder().uri("/play/42").body(Body::empty()).unwrap();
        let resp = router(state).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
