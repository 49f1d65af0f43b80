// src/app/subtitles.rs
use eframe::egui as eg;
use egui_extras::{Column, TableBuilder};

use crate::library::subtitles::{HitSource, SubtitleHit};

impl crate::app::HomeTheaterApp {
    /// Online subtitle results for one video; "Get" saves a sidecar next to it.
    pub(crate) fn ui_render_subtitle_window(&mut self, ctx: &eg::Context) {
        let Some(search) = &self.subtitle_search else {
            return;
        };

        let mut open = true;
        let mut pick: Option<SubtitleHit> = None;
        let item_id = search.item_id;

        eg::Window::new(format!("Subtitles – {}", search.title))
            .id(eg::Id::new("subtitle_window"))
            .collapsible(false)
            .resizable(true)
            .default_width(620.0)
            .default_height(360.0)
            .open(&mut open)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    if search.busy {
                        ui.add(eg::Spinner::new().size(14.0));
                    }
                    if let Some(msg) = &search.message {
                        ui.label(msg);
                    } else if search.busy {
                        ui.label("Searching…");
                    }
                });
                if search.hits.is_empty() {
                    return;
                }
                ui.separator();

                TableBuilder::new(ui)
                    .striped(true)
                    .resizable(true)
                    .vscroll(true)
                    .column(Column::initial(60.0))
                    .column(Column::initial(50.0))
                    .column(Column::remainder().at_least(240.0).clip(true))
                    .column(Column::initial(80.0))
                    .column(Column::initial(60.0))
                    .header(20.0, |mut header| {
                        for h in ["Match", "Lang", "Release", "Downloads", ""] {
                            header.col(|ui| {
                                ui.strong(h);
                            });
                        }
                    })
                    .body(|mut body| {
                        for hit in &search.hits {
                            body.row(22.0, |mut row| {
                                row.col(|ui| {
                                    let (txt, col) = match hit.source {
                                        HitSource::Hash => ("HASH", eg::Color32::from_rgb(130, 200, 130)),
                                        HitSource::Name => ("name", eg::Color32::GRAY),
                                    };
                                    ui.label(eg::RichText::new(txt).color(col));
                                });
                                row.col(|ui| {
                                    ui.label(&hit.language);
                                });
                                row.col(|ui| {
                                    ui.label(&hit.release).on_hover_text(&hit.title);
                                });
                                row.col(|ui| {
                                    ui.label(hit.download_count.to_string());
                                });
                                row.col(|ui| {
                                    let get = ui.add_enabled(!search.busy, eg::Button::new("Get").small());
                                    if get.clicked() {
                                        pick = Some(hit.clone());
                                    }
                                });
                            });
                        }
                    });
            });

        if !open {
            self.subtitle_search = None;
            return;
        }
        if let Some(hit) = pick {
            self.download_subtitle(item_id, hit);
        }
    }
}
