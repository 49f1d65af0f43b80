// src/app/gfx.rs
use std::path::Path;

use eframe::egui::{self as eg, ColorImage, TextureHandle};

/// Upload an RGBA image to a GPU texture. (UI thread only)
pub fn upload_rgba(
    ctx: &eg::Context,
    w: u32,
    h: u32,
    bytes: &[u8],
    name: &str,
) -> TextureHandle {
    let img = ColorImage::from_rgba_unmultiplied([w as usize, h as usize], bytes);
    ctx.load_texture(name.to_string(), img, eg::TextureOptions::LINEAR)
}

/// Load a texture from a cached poster file. (UI thread only)
pub fn load_texture_from_path(
    ctx: &eg::Context,
    path: &Path,
    cache_name: &str,
) -> Result<TextureHandle, String> {
    let (w, h, bytes) = crate::library::posters::load_rgba(path)?;
    if w == 0 || h == 0 {
        return Err(format!("empty image {}", path.display()));
    }
    Ok(upload_rgba(ctx, w, h, &bytes, cache_name))
}

/// Uniform scale of a `w`x`h` image into `bounds`, centred.
pub fn fit_rect(bounds: eg::Rect, w: f32, h: f32) -> eg::Rect {
    if w <= 0.0 || h <= 0.0 {
        return bounds;
    }
    let scale = (bounds.width() / w).min(bounds.height() / h);
    eg::Rect::from_center_size(bounds.center(), eg::vec2(w * scale, h * scale))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_keeps_aspect_inside_bounds() {
        let bounds = eg::Rect::from_min_size(eg::pos2(0.0, 0.0), eg::vec2(100.0, 150.0));
        let r = fit_rect(bounds, 300.0, 300.0);
        assert_eq!(r.size(), eg::vec2(100.0, 100.0));
        assert_eq!(r.center(), bounds.center());
        assert_eq!(fit_rect(bounds, 0.0, 10.0), bounds);
    }
}
