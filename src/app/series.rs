// src/app/series.rs
use eframe::egui as eg;
use egui_extras::{Column, TableBuilder};

use crate::library::ItemKey;

enum EpisodeAction {
    Play(u64),
    Subtitles(u64),
    ToggleFavorite(ItemKey),
}

fn season_heading(season: u32, count: usize) -> String {
    if season == 0 {
        format!("Other episodes ({count})")
    } else {
        format!("Season {season} ({count})")
    }
}

impl crate::app::HomeTheaterApp {
    /// Episode picker for the series in `series_open`.
    pub(crate) fn ui_render_series_window(&mut self, ctx: &eg::Context) {
        let Some(name) = self.series_open.clone() else {
            return;
        };
        let Some(entry) = self.library.series.get(&name) else {
            self.series_open = None;
            return;
        };

        let mut open = true;
        let mut action: Option<EpisodeAction> = None;
        let key = ItemKey::Series(name.clone());

        eg::Window::new(format!("📺 {name}"))
            .id(eg::Id::new("series_window"))
            .collapsible(false)
            .resizable(true)
            .default_width(560.0)
            .default_height(480.0)
            .open(&mut open)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    let fav = if entry.favorite { "★ Favorite" } else { "☆ Favorite" };
                    if ui.selectable_label(entry.favorite, fav).clicked() {
                        action = Some(EpisodeAction::ToggleFavorite(key.clone()));
                    }
                    if let Some(r) = entry.metadata.rating.as_deref() {
                        ui.label(format!("★ {r}"));
                    }
                    ui.label(eg::RichText::new(format!("{} episodes", entry.episodes.len())).weak());
                });
                if let Some(plot) = entry.metadata.plot.as_deref() {
                    ui.add(eg::Label::new(eg::RichText::new(plot).weak()).wrap());
                }
                ui.separator();

                let seasons = entry.seasons();
                let first = seasons.keys().next().copied();
                eg::ScrollArea::vertical().auto_shrink([false; 2]).show(ui, |ui| {
                    for (season, episodes) in &seasons {
                        eg::CollapsingHeader::new(season_heading(*season, episodes.len()))
                            .id_source(("season", *season))
                            .default_open(Some(*season) == first)
                            .show(ui, |ui| {
                                ui.push_id(("season_table", *season), |ui| {
                                    TableBuilder::new(ui)
                                        .striped(true)
                                        .resizable(true)
                                        .vscroll(false)
                                        .column(Column::initial(70.0))
                                        .column(Column::remainder().at_least(200.0).clip(true))
                                        .column(Column::initial(60.0))
                                        .column(Column::initial(90.0))
                                        .header(20.0, |mut header| {
                                            header.col(|ui| {
                                                ui.strong("Episode");
                                            });
                                            header.col(|ui| {
                                                ui.strong("File");
                                            });
                                            header.col(|_ui| {});
                                            header.col(|_ui| {});
                                        })
                                        .body(|mut body| {
                                            for ep in episodes {
                                                body.row(24.0, |mut row| {
                                                    row.col(|ui| {
                                                        ui.label(ep.episode_label());
                                                    });
                                                    row.col(|ui| {
                                                        ui.label(ep.file_name())
                                                            .on_hover_text(ep.path.display().to_string());
                                                    });
                                                    row.col(|ui| {
                                                        if ui.small_button("▶ Play").clicked() {
                                                            action = Some(EpisodeAction::Play(ep.id));
                                                        }
                                                    });
                                                    row.col(|ui| {
                                                        if ui.small_button("Subtitles…").clicked() {
                                                            action =
                                                                Some(EpisodeAction::Subtitles(ep.id));
                                                        }
                                                    });
                                                });
                                            }
                                        });
                                });
                            });
                    }
                });
            });

        if !open {
            self.series_open = None;
        }
        match action {
            Some(EpisodeAction::Play(id)) => self.play_item(id),
            Some(EpisodeAction::Subtitles(id)) => self.open_subtitle_search(id),
            Some(EpisodeAction::ToggleFavorite(key)) => self.toggle_favorite(&key),
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headings_name_the_unmarked_bucket() {
        assert_eq!(season_heading(0, 3), "Other episodes (3)");
        assert_eq!(season_heading(2, 10), "Season 2 (10)");
    }
}
