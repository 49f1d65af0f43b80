// src/app/ui/grid.rs
use eframe::egui as eg;

use crate::library::browse::Card;
use crate::library::{ItemKey, MediaKind};

pub const H_SPACING: f32 = 4.0;
pub const V_SPACING: f32 = 10.0;

enum Badge {
    TopLeft,
    TopRight,
}

fn draw_corner_badge(p: &eg::Painter, rect: eg::Rect, corner: Badge, label: &str) {
    if label.is_empty() {
        return;
    }
    let pad = 6.0;
    let size = eg::vec2(12.0 + 8.0 * label.chars().count() as f32, 20.0);
    let min = match corner {
        Badge::TopLeft => eg::pos2(rect.left() + pad, rect.top() + pad),
        Badge::TopRight => eg::pos2(rect.right() - pad - size.x, rect.top() + pad),
    };
    let r = eg::Rect::from_min_size(min, size);

    let visuals = p.ctx().style().visuals.clone();
    let bg = visuals.extreme_bg_color.gamma_multiply(0.92);
    let fg = visuals.strong_text_color();

    p.rect_filled(r, eg::Rounding::same(6.0), bg);
    p.rect_stroke(r, eg::Rounding::same(6.0), eg::Stroke::new(1.0, fg));
    p.text(
        r.center(),
        eg::Align2::CENTER_CENTER,
        label,
        eg::FontId::monospace(12.0),
        fg,
    );
}

fn card_caption(card: &Card) -> String {
    let title = match &card.year {
        Some(y) => format!("{} ({y})", card.title),
        None => card.title.clone(),
    };
    match card.kind {
        MediaKind::Series => format!("{title}\n{} episodes", card.episode_count),
        MediaKind::Movie => title,
    }
}

impl crate::app::HomeTheaterApp {
    pub(crate) fn ui_render_grid(&mut self, ui: &mut eg::Ui, ctx: &eg::Context) {
        if self.visible.is_empty() {
            ui.vertical_centered(|ui| {
                ui.add_space(40.0);
                ui.label("Nothing matches the current filters.");
            });
            return;
        }

        let card_w: f32 = self.prefs.poster_w;
        let text_h: f32 = 40.0;
        let card_h: f32 = card_w * 1.5 + text_h;
        let idxs = self.visible.clone();

        let mut uploads_left = super::super::MAX_UPLOADS_PER_FRAME;
        let mut clicked: Option<ItemKey> = None;
        let mut activated: Option<ItemKey> = None;

        eg::ScrollArea::vertical()
            .auto_shrink([false; 2])
            .show(ui, |ui| {
                let avail = ui.available_width();
                let cols = ((avail + H_SPACING) / (card_w + H_SPACING))
                    .floor()
                    .max(1.0) as usize;

                ui.horizontal_wrapped(|ui| {
                    ui.spacing_mut().item_spacing = eg::vec2(H_SPACING, V_SPACING);

                    for (col, &idx) in idxs.iter().enumerate() {
                        if col > 0 && col % cols == 0 {
                            ui.end_row();
                        }

                        ui.allocate_ui_with_layout(
                            eg::vec2(card_w, card_h),
                            eg::Layout::top_down(eg::Align::Min),
                            |ui| {
                                ui.set_min_size(eg::vec2(card_w, card_h));
                                let rect = ui.max_rect();

                                // only cards that are actually on screen get textures
                                if uploads_left > 0
                                    && ui.is_rect_visible(rect)
                                    && self.try_lazy_upload(ctx, idx)
                                {
                                    uploads_left -= 1;
                                }

                                let Some(card) = self.cards.get(idx) else {
                                    return;
                                };

                                let id = eg::Id::new(("card", &card.key));
                                let resp = ui.interact(rect, id, eg::Sense::click());
                                if resp.double_clicked() {
                                    activated = Some(card.key.clone());
                                } else if resp.clicked() {
                                    clicked = Some(card.key.clone());
                                }

                                let poster_rect = eg::Rect::from_min_max(
                                    rect.min,
                                    eg::pos2(rect.min.x + card_w, rect.min.y + card_w * 1.5),
                                );
                                let text_rect = eg::Rect::from_min_max(
                                    eg::pos2(rect.min.x, poster_rect.max.y),
                                    rect.max,
                                );

                                if let Some(tex) = self.poster_texture(&card.key) {
                                    ui.painter().image(
                                        tex.id(),
                                        poster_rect,
                                        eg::Rect::from_min_max(
                                            eg::pos2(0.0, 0.0),
                                            eg::pos2(1.0, 1.0),
                                        ),
                                        eg::Color32::WHITE,
                                    );
                                } else {
                                    ui.painter().rect_filled(
                                        poster_rect,
                                        6.0,
                                        eg::Color32::from_gray(40),
                                    );
                                    ui.painter().text(
                                        poster_rect.center(),
                                        eg::Align2::CENTER_CENTER,
                                        if card.kind == MediaKind::Series { "📺" } else { "🎬" },
                                        eg::FontId::proportional(28.0),
                                        eg::Color32::from_gray(120),
                                    );
                                }

                                if card.favorite {
                                    draw_corner_badge(ui.painter(), poster_rect, Badge::TopLeft, "★");
                                }
                                if let Some(r) = card.rating.as_deref() {
                                    draw_corner_badge(ui.painter(), poster_rect, Badge::TopRight, r);
                                }

                                ui.allocate_ui_at_rect(text_rect, |ui| {
                                    ui.add(
                                        eg::Label::new(
                                            eg::RichText::new(card_caption(card)).size(13.0),
                                        )
                                        .truncate(),
                                    );
                                });

                                if self.selected.as_ref() == Some(&card.key) {
                                    ui.painter().rect_stroke(
                                        rect.shrink(1.0),
                                        6.0,
                                        eg::Stroke::new(2.0, eg::Color32::YELLOW),
                                    );
                                }
                            },
                        );
                    }

                    ui.end_row();
                });
            });

        if let Some(key) = clicked {
            self.selected = Some(key);
        }
        if let Some(key) = activated {
            self.selected = Some(key.clone());
            self.activate(&key);
        }
    }

    /// Double-click: movies play, series open their episode list.
    pub(crate) fn activate(&mut self, key: &ItemKey) {
        match key {
            ItemKey::Movie(id) => self.play_item(*id),
            ItemKey::Series(name) => self.series_open = Some(name.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(kind: MediaKind, year: Option<&str>) -> Card {
        Card {
            key: ItemKey::Movie(1),
            kind,
            title: "Dark".into(),
            year: year.map(str::to_string),
            rating: None,
            plot: None,
            genre: None,
            favorite: false,
            has_poster: false,
            episode_count: 26,
            poster: None,
            order: 0,
        }
    }

    #[test]
    fn captions() {
        assert_eq!(card_caption(&card(MediaKind::Movie, Some("2017"))), "Dark (2017)");
        assert_eq!(card_caption(&card(MediaKind::Series, None)), "Dark\n26 episodes");
    }
}
