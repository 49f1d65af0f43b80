// src/app/ui/topbar.rs
use eframe::egui as eg;

use crate::library::browse::{Category, SortKey};

impl crate::app::HomeTheaterApp {
    // ---------- TOP BAR ----------
    pub(crate) fn ui_render_topbar(&mut self, ui: &mut eg::Ui) {
        ui.horizontal_wrapped(|ui| {
            // Category tabs
            for cat in Category::ALL {
                if ui
                    .selectable_label(self.prefs.category == cat, cat.label())
                    .clicked()
                    && self.prefs.category != cat
                {
                    self.prefs.category = cat;
                    self.refilter();
                }
            }

            ui.separator();

            // Search
            let resp = ui.add(
                eg::TextEdit::singleline(&mut self.prefs.search)
                    .hint_text("Search titles and plots…")
                    .desired_width(180.0),
            );
            if resp.changed() {
                self.refilter();
            }

            // Genre
            let mut changed_genre = false;
            eg::ComboBox::from_id_source("genre_combo")
                .selected_text(self.prefs.genre.as_deref().unwrap_or("All genres"))
                .show_ui(ui, |ui| {
                    if ui
                        .selectable_value(&mut self.prefs.genre, None, "All genres")
                        .clicked()
                    {
                        changed_genre = true;
                    }
                    for g in &self.genres {
                        if ui
                            .selectable_value(&mut self.prefs.genre, Some(g.clone()), g)
                            .clicked()
                        {
                            changed_genre = true;
                        }
                    }
                });
            if changed_genre {
                self.refilter();
            }

            // Sort
            let mut changed_sort = false;
            eg::ComboBox::from_id_source("sort_by_combo")
                .selected_text(format!("Sort: {}", self.prefs.sort_key.label()))
                .show_ui(ui, |ui| {
                    for sk in SortKey::ALL {
                        if ui
                            .selectable_value(&mut self.prefs.sort_key, sk, sk.label())
                            .clicked()
                        {
                            changed_sort = true;
                        }
                    }
                });
            if changed_sort {
                self.refilter();
            }

            ui.separator();

            // Poster size
            ui.label("Poster:");
            if ui
                .add(eg::Slider::new(&mut self.prefs.poster_w, 110.0..=260.0).suffix(" px"))
                .changed()
            {
                self.mark_dirty();
            }

            ui.separator();

            if ui
                .button("🔀 Random")
                .on_hover_text("Play something from the current view")
                .clicked()
            {
                self.play_random();
            }
            let rescan = ui.add_enabled(!self.is_busy(), eg::Button::new("⟳ Rescan"));
            if rescan.clicked() {
                self.start_scan();
            }
            if ui.button("⚙ Settings").clicked() {
                self.open_settings();
            }
        });
    }
}
