// src/library/subtitles.rs
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const SUBTITLE_EXTS: &[&str] = &["srt", "vtt", "sub"];
pub const OPENSUBTITLES_BASE_URL: &str = "https://api.opensubtitles.com/api/v1";

const HASH_CHUNK: u64 = 64 * 1024;
const MIN_HASH_RESULTS: usize = 5;

static SRT_TIMESTAMP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{2}:\d{2}:\d{2}),(\d{3})").expect("srt timestamp regex"));

/// `<base><suffix>` without touching the extension logic of `Path`.
fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut s: OsString = base.as_os_str().to_owned();
    s.push(suffix);
    PathBuf::from(s)
}

/// Sidecar subtitle next to `video`: plain `<base>.srt` first, then
/// `<base>.<lang>.srt` per preferred language, for each known extension.
pub fn find_local_subtitle(video: &Path, languages: &[String]) -> Option<PathBuf> {
    let base = video.with_extension("");
    for ext in SUBTITLE_EXTS {
        let plain = with_suffix(&base, &format!(".{ext}"));
        if plain.is_file() {
            return Some(plain);
        }
        for lang in languages {
            let tagged = with_suffix(&base, &format!(".{lang}.{ext}"));
            if tagged.is_file() {
                return Some(tagged);
            }
        }
    }
    None
}

/// UTF-8 (BOM stripped), else Windows-1254, else Latin-1.
pub fn decode_subtitle_bytes(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.to_string();
    }
    if let Some(text) =
        encoding_rs::WINDOWS_1254.decode_without_bom_handling_and_without_replacement(bytes)
    {
        return text.into_owned();
    }
    bytes.iter().map(|&b| b as char).collect()
}

pub fn srt_to_vtt(srt: &str) -> String {
    let body = srt.replace("\r\n", "\n");
    let body = body.trim_start_matches('\u{feff}');
    if body.starts_with("WEBVTT") {
        return body.to_string();
    }
    format!("WEBVTT\n\n{}", SRT_TIMESTAMP.replace_all(body, "$1.$2"))
}

/// Read a subtitle file of any supported kind as WebVTT text.
pub fn load_as_vtt(path: &Path) -> io::Result<String> {
    let text = decode_subtitle_bytes(&fs::read(path)?);
    Ok(srt_to_vtt(&text))
}

/// md5 over the first and last 64 KiB of the file.
pub fn movie_hash(path: &Path) -> io::Result<String> {
    let mut f = File::open(path)?;
    let size = f.metadata()?.len();

    let mut data = Vec::with_capacity((HASH_CHUNK * 2) as usize);
    (&mut f).take(HASH_CHUNK).read_to_end(&mut data)?;
    f.seek(SeekFrom::Start(size.saturating_sub(HASH_CHUNK)))?;
    f.take(HASH_CHUNK).read_to_end(&mut data)?;

    Ok(format!("{:x}", md5::compute(&data)))
}

/// Write `<base>.<lang>.srt` next to the video.
pub fn save_sidecar(video: &Path, lang: &str, text: &str) -> io::Result<PathBuf> {
    let lang = if lang.trim().is_empty() { "en" } else { lang.trim() };
    let dest = with_suffix(&video.with_extension(""), &format!(".{lang}.srt"));
    fs::write(&dest, text)?;
    Ok(dest)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HitSource {
    Hash,
    Name,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SubtitleHit {
    pub file_id: u64,
    pub title: String,
    pub language: String,
    pub release: String,
    #[serde(rename = "dl_count")]
    pub download_count: u64,
    pub source: HitSource,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<SearchItem>,
}

#[derive(Deserialize)]
struct SearchItem {
    attributes: SearchAttributes,
}

#[derive(Deserialize)]
struct SearchAttributes {
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    release: Option<String>,
    #[serde(default)]
    download_count: Option<u64>,
    #[serde(default)]
    files: Vec<FileRef>,
}

#[derive(Deserialize)]
struct FileRef {
    file_id: u64,
}

#[derive(Deserialize)]
struct DownloadResponse {
    #[serde(default)]
    link: Option<String>,
}

pub struct OpenSubtitlesClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    languages: Vec<String>,
}

impl OpenSubtitlesClient {
    pub fn new(api_key: Option<&str>, languages: &[String]) -> Result<Self, String> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent(concat!("hometheater/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| format!("http client: {e}"))?;
        Ok(Self {
            client,
            api_key: api_key
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string),
            base_url: OPENSUBTITLES_BASE_URL.to_string(),
            languages: languages.iter().map(|l| l.to_ascii_lowercase()).collect(),
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn key(&self) -> Result<&str, String> {
        self.api_key
            .as_deref()
            .ok_or_else(|| "OpenSubtitles API key not configured".to_string())
    }

    fn query(&self, params: &[(&str, String)]) -> Result<Vec<SearchItem>, String> {
        let url = format!("{}/subtitles", self.base_url);
        let resp = self
            .client
            .get(&url)
            .header("Api-Key", self.key()?)
            .query(params)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| format!("GET {url}: {e}"))?;
        let parsed: SearchResponse = resp.json().map_err(|e| format!("subtitle json: {e}"))?;
        Ok(parsed.data)
    }

    fn collect(&self, items: Vec<SearchItem>, source: HitSource, out: &mut Vec<SubtitleHit>) {
        for item in items {
            let attr = item.attributes;
            let Some(file_id) = attr.files.first().map(|f| f.file_id) else {
                continue;
            };
            let language = attr.language.unwrap_or_default().to_ascii_lowercase();
            if !self.languages.is_empty() && !self.languages.contains(&language) {
                continue;
            }
            if out.iter().any(|h| h.file_id == file_id) {
                continue;
            }
            let release = attr.release.unwrap_or_default();
            let tag = match source {
                HitSource::Hash => "HASH",
                HitSource::Name => "NAME",
            };
            out.push(SubtitleHit {
                file_id,
                title: format!("[{tag}] {language} - {release}"),
                language,
                release,
                download_count: attr.download_count.unwrap_or(0),
                source,
            });
        }
    }

    /// Hash search first; a name search tops up thin results.
    pub fn search(
        &self,
        video: &Path,
        title: &str,
        year: Option<i32>,
    ) -> Result<Vec<SubtitleHit>, String> {
        self.key()?;
        let mut hits = Vec::new();
        let mut last_err = None;

        match movie_hash(video) {
            Ok(hash) => match self.query(&[("moviehash", hash)]) {
                Ok(items) => self.collect(items, HitSource::Hash, &mut hits),
                Err(err) => {
                    warn!("subtitle hash search failed: {err}");
                    last_err = Some(err);
                }
            },
            Err(err) => debug!("no movie hash for {}: {err}", video.display()),
        }

        if hits.len() < MIN_HASH_RESULTS {
            let query = match year {
                Some(y) => format!("{title} {y}"),
                None => title.to_string(),
            };
            match self.query(&[("query", query)]) {
                Ok(items) => self.collect(items, HitSource::Name, &mut hits),
                Err(err) => {
                    warn!("subtitle name search failed: {err}");
                    last_err = Some(err);
                }
            }
        }

        if let (true, Some(err)) = (hits.is_empty(), last_err) {
            return Err(err);
        }
        hits.sort_by(|a, b| b.download_count.cmp(&a.download_count));
        Ok(hits)
    }

    /// Fetch a subtitle file by id and return its decoded text.
    pub fn download(&self, file_id: u64) -> Result<String, String> {
        let key = self.key()?;
        let url = format!("{}/download", self.base_url);
        let resp = self
            .client
            .post(&url)
            .header("Api-Key", key)
            .json(&serde_json::json!({ "file_id": file_id }))
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| format!("POST {url}: {e}"))?;
        let link = resp
            .json::<DownloadResponse>()
            .map_err(|e| format!("download json: {e}"))?
            .link
            .ok_or_else(|| "download response has no link".to_string())?;

        let bytes = self
            .client
            .get(&link)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.bytes())
            .map_err(|e| format!("GET {link}: {e}"))?;
        Ok(decode_subtitle_bytes(&bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeResponse, FakeServer};
    use std::sync::{Arc, Mutex};

    fn langs() -> Vec<String> {
        vec!["en".into(), "tr".into()]
    }

    #[test]
    fn sidecar_lookup_order() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("Heat.1995.mkv");
        fs::write(&video, b"v").unwrap();
        assert_eq!(find_local_subtitle(&video, &langs()), None);

        fs::write(dir.path().join("Heat.1995.tr.srt"), b"x").unwrap();
        assert_eq!(
            find_local_subtitle(&video, &langs()),
            Some(dir.path().join("Heat.1995.tr.srt"))
        );
        fs::write(dir.path().join("Heat.1995.en.srt"), b"x").unwrap();
        assert_eq!(
            find_local_subtitle(&video, &langs()),
            Some(dir.path().join("Heat.1995.en.srt"))
        );
        fs::write(dir.path().join("Heat.1995.srt"), b"x").unwrap();
        assert_eq!(
            find_local_subtitle(&video, &langs()),
            Some(dir.path().join("Heat.1995.srt"))
        );
    }

    #[test]
    fn decodes_utf8_bom_and_turkish_codepage() {
        assert_eq!(decode_subtitle_bytes(b"\xEF\xBB\xBFhello"), "hello");
        assert_eq!(decode_subtitle_bytes("ğüş".as_bytes()), "ğüş");
        // 0xFE is 's with cedilla' in Windows-1254
        assert_eq!(decode_subtitle_bytes(b"\xFEeker"), "\u{15f}eker");
    }

    #[test]
    fn srt_timestamps_become_vtt() {
        let srt = "1\r\n00:00:01,500 --> 00:00:03,250\r\nHi\r\n\r\n2\r\n01:02:03,004 --> 01:02:04,000\r\nBye\r\n";
        let vtt = srt_to_vtt(srt);
        assert!(vtt.starts_with("WEBVTT\n\n1\n"));
        assert!(vtt.contains("00:00:01.500 --> 00:00:03.250"));
        assert!(vtt.contains("01:02:03.004 --> 01:02:04.000"));
        assert!(!vtt.contains(','));
        assert_eq!(srt_to_vtt(&vtt), vtt);
    }

    #[test]
    fn movie_hash_covers_head_and_tail() {
        let dir = tempfile::tempdir().unwrap();
        let small = dir.path().join("small.mkv");
        fs::write(&small, b"abc").unwrap();
        assert_eq!(movie_hash(&small).unwrap(), format!("{:x}", md5::compute(b"abcabc")));

        let big = dir.path().join("big.mkv");
        let mut content = vec![1u8; 200 * 1024];
        content[0] = 9;
        *content.last_mut().unwrap() = 7;
        fs::write(&big, &content).unwrap();
        let chunk = HASH_CHUNK as usize;
        let mut expected = content[..chunk].to_vec();
        expected.extend_from_slice(&content[content.len() - chunk..]);
        assert_eq!(movie_hash(&big).unwrap(), format!("{:x}", md5::compute(&expected)));
    }

    #[test]
    fn sidecar_is_written_with_language_tag() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("Dark.S01E01.mkv");
        let out = save_sidecar(&video, "tr", "1\n").unwrap();
        assert_eq!(out, dir.path().join("Dark.S01E01.tr.srt"));
        assert_eq!(find_local_subtitle(&video, &langs()), Some(out));
    }

    #[test]
    fn missing_key_makes_no_requests() {
        let server = FakeServer::start(|_, _| FakeResponse::json(200, "{}"));
        let client = OpenSubtitlesClient::new(None, &langs())
            .unwrap()
            .with_base_url(&server.base_url);
        assert!(!client.is_configured());
        let err = client.search(Path::new("/nope.mkv"), "Heat", None).unwrap_err();
        assert!(err.contains("not configured"));
        assert!(client.download(1).is_err());
        assert_eq!(server.hits(), 0);
    }

    #[test]
    fn search_merges_hash_and_name_results() {
        let server = FakeServer::start(|req, _| {
            if req.target.contains("moviehash=") {
                FakeResponse::json(
                    200,
                    r#"{"data":[
                        {"attributes":{"language":"en","release":"Heat.BluRay","download_count":10,"files":[{"file_id":1}]}},
                        {"attributes":{"language":"de","release":"Heat.DE","download_count":99,"files":[{"file_id":2}]}}
                    ]}"#,
                )
            } else {
                FakeResponse::json(
                    200,
                    r#"{"data":[
                        {"attributes":{"language":"en","release":"dup","download_count":10,"files":[{"file_id":1}]}},
                        {"attributes":{"language":"tr","release":"Heat.TR","download_count":50,"files":[{"file_id":3}]}},
                        {"attributes":{"language":"tr","release":"nofile","download_count":5,"files":[]}}
                    ]}"#,
                )
            }
        });
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("Heat.mkv");
        fs::write(&video, b"video bytes").unwrap();

        let client = OpenSubtitlesClient::new(Some("k"), &langs())
            .unwrap()
            .with_base_url(&server.base_url);
        let hits = client.search(&video, "Heat", Some(1995)).unwrap();
        let ids: Vec<u64> = hits.iter().map(|h| h.file_id).collect();
        assert_eq!(ids, vec![3, 1]);
        assert_eq!(hits[0].source, HitSource::Name);
        assert_eq!(hits[1].title, "[HASH] en - Heat.BluRay");

        let requests = server.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].target.contains("query=Heat+1995") || requests[1].target.contains("query=Heat%201995"));
    }

    #[test]
    fn download_follows_link_and_decodes() {
        let base: Arc<Mutex<String>> = Arc::default();
        let link_base = Arc::clone(&base);
        let server = FakeServer::start(move |req, _| {
            if req.target.ends_with("/download") {
                assert_eq!(req.method, "POST");
                assert!(req.body.contains("\"file_id\":42"));
                let link = format!("{}/files/42.srt", link_base.lock().unwrap());
                FakeResponse::json(200, &format!(r#"{{"link":"{link}"}}"#))
            } else {
                FakeResponse::bytes(b"1\n00:00:01,000 --> 00:00:02,000\n\xFEeker\n")
            }
        });
        *base.lock().unwrap() = server.base_url.clone();

        let client = OpenSubtitlesClient::new(Some("k"), &langs())
            .unwrap()
            .with_base_url(format!("{}/", server.base_url));
        let text = client.download(42).unwrap();
        assert!(text.contains("\u{15f}eker"));
        assert_eq!(server.hits(), 2);
    }
}
