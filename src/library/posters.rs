// src/library/posters.rs
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use reqwest::blocking::Client;
use tracing::warn;

pub const POSTER_MAX_WIDTH: u32 = 300;
pub const POSTER_JPEG_QUALITY: u8 = 85;

const IMAGE_EXTS: &[&str] = &["jpg", "jpeg", "png", "webp"];

pub fn url_to_cache_key(url: &str) -> String {
    format!("{:x}", md5::compute(url.as_bytes()))
}

/// Poster files on disk, one per poster URL.
#[derive(Clone, Debug)]
pub struct PosterStore {
    dir: PathBuf,
}

impl PosterStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for_url(&self, url: &str) -> PathBuf {
        self.dir.join(format!("{}.jpg", url_to_cache_key(url)))
    }

    pub fn find_by_key(&self, key: &str) -> Option<PathBuf> {
        IMAGE_EXTS
            .iter()
            .map(|ext| self.dir.join(format!("{key}.{ext}")))
            .find(|p| p.exists())
    }

    /// True when `path` is a file directly inside the poster dir.
    pub fn contains(&self, path: &Path) -> bool {
        let (Ok(dir), Ok(file)) = (fs::canonicalize(&self.dir), fs::canonicalize(path)) else {
            return false;
        };
        file.parent() == Some(dir.as_path()) && file.is_file()
    }

    /// Download once per URL, shrink to `max_width` and store as JPEG.
    pub fn download_resized_with_client(
        &self,
        client: &Client,
        url: &str,
        max_width: u32,
        quality: u8,
    ) -> Result<PathBuf, String> {
        let dest = self.path_for_url(url);
        if dest.exists() {
            return Ok(dest);
        }

        let bytes = client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.bytes())
            .map_err(|e| format!("download poster {url}: {e}"))?;

        let jpeg = encode_resized_jpeg(&bytes, max_width, quality)?;

        fs::create_dir_all(&self.dir).map_err(|e| format!("create {}: {e}", self.dir.display()))?;
        let tmp = dest.with_extension("jpg.part");
        {
            let mut f = fs::File::create(&tmp).map_err(|e| format!("create tmp: {e}"))?;
            f.write_all(&jpeg).map_err(|e| format!("write: {e}"))?;
        }
        fs::rename(&tmp, &dest).map_err(|e| format!("rename: {e}"))?;
        Ok(dest)
    }

    /// Remove interrupted downloads and empty files. Returns how many went.
    pub fn clean_partial_files(&self) -> std::io::Result<usize> {
        if !self.dir.exists() {
            return Ok(0);
        }
        let mut removed = 0usize;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|s| s.to_ascii_lowercase());
            let len = entry.metadata()?.len();
            let remove = match ext.as_deref() {
                Some("part") | Some("tmp") => true,
                Some(e) if IMAGE_EXTS.contains(&e) => len == 0,
                _ => false,
            };
            if remove {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Drop every cached poster.
    pub fn clear(&self) -> std::io::Result<usize> {
        if !self.dir.exists() {
            return Ok(0);
        }
        let mut removed = 0usize;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                if let Err(err) = fs::remove_file(entry.path()) {
                    warn!("failed to remove poster {}: {err}", entry.path().display());
                    continue;
                }
                removed += 1;
            }
        }
        Ok(removed)
    }
}

pub fn encode_resized_jpeg(bytes: &[u8], max_width: u32, quality: u8) -> Result<Vec<u8>, String> {
    let img = image::load_from_memory(bytes).map_err(|e| format!("decode poster: {e}"))?;

    let (w, h) = img.dimensions();
    let out: DynamicImage = if w > max_width {
        let new_h = ((h as f32) * (max_width as f32 / w as f32))
            .round()
            .max(1.0) as u32;
        img.resize_exact(max_width, new_h, FilterType::CatmullRom)
    } else {
        img
    };

    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgb8(out.to_rgb8());
    let mut jpeg_bytes: Vec<u8> = Vec::new();
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg_bytes, quality);
    encoder
        .encode_image(&rgb)
        .map_err(|e| format!("jpeg encode: {e}"))?;
    Ok(jpeg_bytes)
}

/// (width, height, RGBA8 bytes) for texture upload.
pub fn load_rgba(path: &Path) -> Result<(u32, u32, Vec<u8>), String> {
    if !path.exists() {
        return Err("not found".into());
    }
    let img = image::ImageReader::open(path)
        .map_err(|e| format!("open image {}: {e}", path.display()))?
        .with_guessed_format()
        .map_err(|e| format!("guess format {}: {e}", path.display()))?
        .decode()
        .map_err(|e| format!("decode {}: {e}", path.display()))?;
    let (w, h) = img.dimensions();
    Ok((w, h, img.to_rgba8().into_raw()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbaImage};
    use std::io::Cursor;

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, image::Rgba([200, 40, 40, 255])));
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png).unwrap();
        out
    }

    #[test]
    fn cache_key_is_stable_md5() {
        let a = url_to_cache_key("https://example.com/p.jpg");
        assert_eq!(a.len(), 32);
        assert_eq!(a, url_to_cache_key("https://example.com/p.jpg"));
        assert_ne!(a, url_to_cache_key("https://example.com/q.jpg"));
    }

    #[test]
    fn large_posters_are_shrunk_keeping_aspect() {
        let jpeg = encode_resized_jpeg(&png_bytes(600, 900), 300, 80).unwrap();
        let img = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(img.dimensions(), (300, 450));

        let small = encode_resized_jpeg(&png_bytes(100, 150), 300, 80).unwrap();
        assert_eq!(image::load_from_memory(&small).unwrap().dimensions(), (100, 150));

        assert!(encode_resized_jpeg(b"not an image", 300, 80).is_err());
    }

    #[test]
    fn cleanup_removes_partials_and_clear_empties_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = PosterStore::new(dir.path());
        fs::write(dir.path().join("a.jpg.part"), b"x").unwrap();
        fs::write(dir.path().join("b.jpg"), b"").unwrap();
        fs::write(dir.path().join("c.jpg"), b"jpeg").unwrap();

        assert_eq!(store.clean_partial_files().unwrap(), 2);
        assert_eq!(store.find_by_key("c"), Some(dir.path().join("c.jpg")));
        assert!(store.contains(&dir.path().join("c.jpg")));
        assert!(!store.contains(&dir.path().join("missing.jpg")));

        assert_eq!(store.clear().unwrap(), 1);
        assert_eq!(store.find_by_key("c"), None);
    }

    #[test]
    fn load_rgba_decodes_written_poster() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.png");
        fs::write(&path, png_bytes(4, 6)).unwrap();
        let (w, h, rgba) = load_rgba(&path).unwrap();
        assert_eq!((w, h), (4, 6));
        assert_eq!(rgba.len(), 4 * 6 * 4);
        assert!(load_rgba(&dir.path().join("none.png")).is_err());
    }
}
