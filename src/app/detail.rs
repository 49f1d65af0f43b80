// src/app/detail.rs
use eframe::egui as eg;

use crate::library::{ItemKey, MediaKind};

impl crate::app::HomeTheaterApp {
    pub(crate) fn ui_render_detail_panel(&mut self, ctx: &eg::Context) {
        let screen_w: f32 = ctx.input(|i| i.screen_rect().width());
        let max_w: f32 = (screen_w * 0.45).clamp(300.0, 600.0);
        let default_w = self.prefs.detail_w.clamp(260.0, max_w);

        let mut close = false;
        let mut toggle_fav: Option<ItemKey> = None;
        let mut play: Option<u64> = None;
        let mut open_series: Option<String> = None;
        let mut search_subs: Option<u64> = None;

        let panel = eg::SidePanel::right("detail_panel")
            .resizable(true)
            .default_width(default_w)
            .min_width(260.0)
            .max_width(max_w)
            .show(ctx, |ui| {
                ui.add_space(6.0);
                ui.horizontal(|ui| {
                    ui.heading("Details");
                    ui.with_layout(eg::Layout::right_to_left(eg::Align::Center), |ui| {
                        if ui.button("Close").clicked() {
                            close = true;
                        }
                    });
                });
                ui.separator();

                let Some(key) = self.selected.clone() else {
                    return;
                };
                let Some(card) = self.card(&key) else {
                    ui.label("This title is no longer in the library.");
                    return;
                };

                eg::ScrollArea::vertical().auto_shrink([false; 2]).show(ui, |ui| {
                    let avail_w = ui.available_width().clamp(120.0, 600.0);
                    let poster_size = eg::vec2(avail_w, avail_w * 1.5);
                    if let Some(tex) = self.poster_texture(&key) {
                        ui.image((tex.id(), poster_size));
                    } else {
                        let (rect, _resp) = ui.allocate_exact_size(poster_size, eg::Sense::hover());
                        ui.painter().rect_filled(rect, 8.0, eg::Color32::from_gray(40));
                        ui.painter().text(
                            rect.center(),
                            eg::Align2::CENTER_CENTER,
                            if card.has_poster { "Poster loading…" } else { "No poster" },
                            eg::FontId::proportional(14.0),
                            eg::Color32::WHITE,
                        );
                    }

                    ui.add_space(8.0);
                    let title = match &card.year {
                        Some(y) => format!("{} ({y})", card.title),
                        None => card.title.clone(),
                    };
                    ui.heading(title);

                    ui.horizontal_wrapped(|ui| {
                        if let Some(r) = &card.rating {
                            ui.label(
                                eg::RichText::new(format!("★ {r}"))
                                    .color(eg::Color32::from_rgb(240, 200, 80)),
                            );
                        }
                        if card.kind == MediaKind::Series {
                            ui.label(
                                eg::RichText::new(format!("{} episodes", card.episode_count)).weak(),
                            );
                        }
                    });

                    ui.add_space(6.0);
                    ui.horizontal_wrapped(|ui| {
                        let fav_label = if card.favorite { "★ Favorite" } else { "☆ Favorite" };
                        if ui.selectable_label(card.favorite, fav_label).clicked() {
                            toggle_fav = Some(key.clone());
                        }
                        match &key {
                            ItemKey::Movie(id) => {
                                if ui.button("▶ Play").clicked() {
                                    play = Some(*id);
                                }
                                if ui.button("Subtitles…").clicked() {
                                    search_subs = Some(*id);
                                }
                            }
                            ItemKey::Series(name) => {
                                if ui.button("Episodes…").clicked() {
                                    open_series = Some(name.clone());
                                }
                            }
                        }
                    });

                    ui.add_space(8.0);
                    ui.separator();

                    ui.label(eg::RichText::new("Genre").strong());
                    ui.label(card.genre.as_deref().unwrap_or("—"));
                    ui.add_space(6.0);

                    ui.label(eg::RichText::new("Plot").strong());
                    ui.add(eg::Label::new(card.plot.as_deref().unwrap_or("No plot available.")).wrap());

                    if let ItemKey::Movie(id) = &key {
                        if let Some(item) = self.library.movie(*id) {
                            ui.add_space(6.0);
                            ui.label(eg::RichText::new("File").strong());
                            ui.add(
                                eg::Label::new(
                                    eg::RichText::new(item.path.display().to_string())
                                        .monospace()
                                        .weak(),
                                )
                                .wrap(),
                            );
                        }
                    }
                });
            });

        if close {
            self.selected = None;
        }
        if let Some(key) = toggle_fav {
            self.toggle_favorite(&key);
        }
        if let Some(id) = play {
            self.play_item(id);
        }
        if let Some(name) = open_series {
            self.series_open = Some(name);
        }
        if let Some(id) = search_subs {
            self.open_subtitle_search(id);
        }

        let actual_w = panel.response.rect.width().round();
        if (actual_w - self.prefs.detail_w).abs() > 0.5 {
            self.prefs.detail_w = actual_w.clamp(260.0, 600.0);
            self.mark_dirty();
        }
    }
}
