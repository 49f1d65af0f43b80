// src/library/title.rs
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "m4v"];

/// Release-tag noise dropped from file names (compared lowercase, brackets trimmed).
const JUNK_TOKENS: &[&str] = &[
    "bluray", "blu-ray", "brrip", "bdrip", "web-dl", "webdl", "webrip", "hdrip", "dvdrip",
    "hdtv", "x264", "x265", "h264", "h265", "hevc", "avc", "xvid", "divx", "aac", "ac3",
    "dts", "hdr", "hdr10", "10bit", "remux", "imax", "yify", "rarbg",
];

static RESOLUTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\d{3,4}[pi]$|^4k$|^uhd$").expect("resolution regex"));

static SXXEYY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bs(\d{1,2})[ ._-]?e(\d{1,3})").expect("season/episode regex")
});

static NXNN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d{1,2})x(\d{2,3})\b").expect("NxNN regex"));

static SEASON_EPISODE_WORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bseason\s*(\d{1,2})\D{0,8}?episode\s*(\d{1,3})").expect("words regex")
});

static SEASON_DIR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(season|series|s)[ ._-]*\d{1,2}$|^specials$").expect("season dir regex"));

/// Everything we can read off a video file name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedName {
    pub title: String,
    pub year: Option<i32>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

impl ParsedName {
    pub fn is_episode(&self) -> bool {
        self.season.is_some() && self.episode.is_some()
    }
}

/// A season/episode marker found in a file stem.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EpisodeMarker {
    pub season: u32,
    pub episode: u32,
    /// Byte offset where the marker starts; the show title precedes it.
    pub start: usize,
}

pub fn is_video_file(p: &Path) -> bool {
    let ext = p
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    VIDEO_EXTENSIONS.contains(&ext.as_str())
}

fn year_of(core: &str) -> Option<i32> {
    if core.len() != 4 || !core.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    core.parse::<i32>()
        .ok()
        .filter(|y| (1900..=2099).contains(y))
}

fn bracket_core(token: &str) -> &str {
    token.trim_matches(|c| matches!(c, '(' | ')' | '[' | ']' | '{' | '}'))
}

fn is_junk(token: &str) -> bool {
    if token.chars().all(|c| !c.is_alphanumeric()) {
        return true;
    }
    let core = bracket_core(token);
    if year_of(core).is_some() {
        return false;
    }
    // [Group] style release tags
    if token.len() > 2 && token.starts_with('[') && token.ends_with(']') {
        return true;
    }
    let lower = core.to_ascii_lowercase();
    JUNK_TOKENS.contains(&lower.as_str()) || RESOLUTION.is_match(&lower)
}

fn normalize_separators(s: &str) -> String {
    s.split(|c: char| c.is_whitespace() || c == '.' || c == '_')
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Strip release noise from a file stem and split off the year.
///
/// The first year token after the first word ends the title, so
/// `"The.Matrix.1999.1080p.BluRay"` gives `("The Matrix", Some(1999))` and
/// `"2012 (2009)"` keeps `2012` as the title. Running this again on its own
/// output returns the same title.
pub fn clean_title(stem: &str) -> (String, Option<i32>) {
    let tokens: Vec<&str> = stem
        .split(|c: char| c.is_whitespace() || c == '.' || c == '_')
        .filter(|t| !t.is_empty())
        .filter(|t| !is_junk(t))
        .collect();

    let mut year = None;
    let mut end = tokens.len();
    for (idx, token) in tokens.iter().enumerate().skip(1) {
        if let Some(y) = year_of(bracket_core(token)) {
            year = Some(y);
            end = idx;
            break;
        }
    }

    let title = tokens[..end].join(" ");
    if title.is_empty() {
        (normalize_separators(stem), year)
    } else {
        (title, year)
    }
}

pub fn season_episode(stem: &str) -> Option<EpisodeMarker> {
    for re in [&*SXXEYY, &*NXNN, &*SEASON_EPISODE_WORDS] {
        if let Some(caps) = re.captures(stem) {
            let whole = caps.get(0)?;
            let season = caps.get(1)?.as_str().parse().ok()?;
            let episode = caps.get(2)?.as_str().parse().ok()?;
            return Some(EpisodeMarker {
                season,
                episode,
                start: whole.start(),
            });
        }
    }
    None
}

/// Nearest ancestor folder that names a show (skips "Season 2" style folders).
fn show_folder_name(path: &Path) -> Option<String> {
    path.ancestors()
        .skip(1)
        .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
        .find(|name| !SEASON_DIR.is_match(name.trim()))
        .map(|name| clean_title(name).0)
        .filter(|t| !t.is_empty())
}

pub fn parse_file_name(path: &Path) -> ParsedName {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();

    let Some(marker) = season_episode(stem) else {
        let (title, year) = clean_title(stem);
        return ParsedName {
            title,
            year,
            season: None,
            episode: None,
        };
    };

    let (mut title, year) = clean_title(&stem[..marker.start]);
    if title.is_empty() {
        title = show_folder_name(path).unwrap_or_else(|| normalize_separators(stem));
    }
    ParsedName {
        title,
        year,
        season: Some(marker.season),
        episode: Some(marker.episode),
    }
}

/// Titles to try against the metadata API, most specific first.
pub fn title_candidates(title: &str) -> Vec<String> {
    let trimmed = title.trim();
    let mut out = vec![trimmed.to_string()];
    if trimmed.contains(':') {
        out.push(normalize_separators(&trimmed.replace(':', "")));
        if let Some((head, _)) = trimmed.split_once(':') {
            let head = head.trim();
            if !head.is_empty() {
                out.push(head.to_string());
            }
        }
    }
    out.dedup();
    out
}

pub fn normalize_title(s: &str) -> String {
    let mut normalized = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '\'' | '’' | '‘' | '`' => {
                // Drop apostrophes entirely so “Schindler's” matches “Schindlers”.
            }
            '&' => {
                normalized.push_str(" and ");
            }
            ch if ch.is_alphanumeric() => {
                for lower in ch.to_lowercase() {
                    normalized.push(lower);
                }
            }
            _ => {
                normalized.push(' ');
            }
        }
    }

    normalized.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn find_year_in_str(s: &str) -> Option<i32> {
    let bytes = s.as_bytes();
    for i in 0..bytes.len().saturating_sub(3) {
        if bytes[i..i + 4].iter().all(u8::is_ascii_digit) {
            if let Ok(val) = s[i..i + 4].parse::<i32>() {
                if (1900..=2099).contains(&val) {
                    return Some(val);
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn strips_release_noise_and_year() {
        assert_eq!(
            clean_title("The.Matrix.1999.1080p.BluRay.x264-[YTS]"),
            ("The Matrix".to_string(), Some(1999))
        );
        assert_eq!(
            clean_title("Inception (2010) [1080p] WEB-DL"),
            ("Inception".to_string(), Some(2010))
        );
        assert_eq!(
            clean_title("Mad_Max_Fury_Road_HEVC_AAC"),
            ("Mad Max Fury Road".to_string(), None)
        );
    }

    #[test]
    fn leading_year_stays_in_title() {
        assert_eq!(clean_title("2012 (2009)"), ("2012".to_string(), Some(2009)));
        assert_eq!(clean_title("1917"), ("1917".to_string(), None));
    }

    #[test]
    fn clean_title_is_idempotent() {
        for stem in [
            "The.Matrix.1999.1080p.BluRay.x264",
            "Movie.1999.Part.2005.720p",
            "[RARBG] 2012 (2009)",
            "1080p.x264",
            "x264.2019",
            "Amélie - 2001 - DVDRip",
            "Blade.Runner.2049.2017.2160p.UHD",
            "Some_Film_-_Directors_Cut",
        ] {
            let once = clean_title(stem).0;
            let twice = clean_title(&once).0;
            assert_eq!(once, twice, "not idempotent for {stem:?}");
        }
    }

    #[test]
    fn all_noise_falls_back_to_readable_stem() {
        assert_eq!(clean_title("1080p.x264").0, "1080p x264");
    }

    #[test]
    fn finds_episode_markers() {
        let m = season_episode("Breaking.Bad.S02E05.720p").unwrap();
        assert_eq!((m.season, m.episode), (2, 5));
        assert_eq!(&"Breaking.Bad.S02E05.720p"[..m.start], "Breaking.Bad.");

        let m = season_episode("Friends 3x14").unwrap();
        assert_eq!((m.season, m.episode), (3, 14));

        let m = season_episode("Lost Season 1 Episode 4").unwrap();
        assert_eq!((m.season, m.episode), (1, 4));

        assert!(season_episode("The Matrix 1999").is_none());
        assert!(season_episode("Inception.2010.1080p.x264").is_none());
    }

    #[test]
    fn episode_title_comes_from_prefix_or_folder() {
        let parsed = parse_file_name(Path::new("/tv/The.Office.US.S03E10.HDTV.mkv"));
        assert_eq!(parsed.title, "The Office US");
        assert_eq!((parsed.season, parsed.episode), (Some(3), Some(10)));

        let p: PathBuf = ["/tv", "Dark", "Season 1", "S01E02.mkv"].iter().collect();
        let parsed = parse_file_name(&p);
        assert_eq!(parsed.title, "Dark");
        assert!(parsed.is_episode());
    }

    #[test]
    fn movie_file_parse() {
        let parsed = parse_file_name(Path::new("/m/Heat.1995.REMUX.mkv"));
        assert_eq!(parsed.title, "Heat");
        assert_eq!(parsed.year, Some(1995));
        assert!(!parsed.is_episode());
    }

    #[test]
    fn video_extension_filter_is_case_insensitive() {
        assert!(is_video_file(Path::new("a.MKV")));
        assert!(is_video_file(Path::new("dir/b.m4v")));
        assert!(!is_video_file(Path::new("c.srt")));
        assert!(!is_video_file(Path::new("noext")));
    }

    #[test]
    fn candidates_cover_colon_variants() {
        assert_eq!(
            title_candidates("Star Wars: A New Hope"),
            vec![
                "Star Wars: A New Hope".to_string(),
                "Star Wars A New Hope".to_string(),
                "Star Wars".to_string()
            ]
        );
        assert_eq!(title_candidates("Heat"), vec!["Heat".to_string()]);
    }

    #[test]
    fn normalize_and_year_helpers() {
        assert_eq!(normalize_title("Schindler's List"), "schindlers list");
        assert_eq!(normalize_title("Fast & Furious"), "fast and furious");
        assert_eq!(find_year_in_str("2010–2013"), Some(2010));
        assert_eq!(find_year_in_str("N/A"), None);
    }
}
