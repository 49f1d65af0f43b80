// src/app/ui/mod.rs
pub mod grid;
pub mod topbar;

use eframe::egui as eg;

impl crate::app::HomeTheaterApp {
    pub(crate) fn ui_render_status(&mut self, ui: &mut eg::Ui) {
        ui.horizontal(|ui| {
            if self.is_busy() {
                ui.add(eg::Spinner::new().size(14.0));
            }
            ui.label(&self.status);
            ui.with_layout(eg::Layout::right_to_left(eg::Align::Center), |ui| {
                ui.label(
                    eg::RichText::new(format!(
                        "{} shown · {} movies · {} series · {} episodes",
                        self.visible.len(),
                        self.library.movies.len(),
                        self.library.series.len(),
                        self.library.episode_count()
                    ))
                    .weak(),
                );
                if self.pending_lookups > 0 {
                    ui.label(format!("metadata queue: {}", self.pending_lookups));
                }
            });
        });
    }

    // Nothing catalogued yet: welcome on first run, otherwise a hint.
    pub(crate) fn ui_render_empty(&mut self, ui: &mut eg::Ui) {
        ui.vertical_centered(|ui| {
            ui.add_space(40.0);
            if self.config.needs_setup() {
                ui.heading("Welcome to Home Theater");
                ui.label("Point the app at your movie and series folders to build the catalog.");
                ui.add_space(8.0);
                if ui.button("Open settings").clicked() {
                    self.open_settings();
                }
            } else if self.scanning {
                ui.heading("Scanning your library");
                ui.add(eg::Spinner::new().size(18.0));
            } else {
                ui.heading("No videos found");
                ui.label("Check the configured folders, then rescan.");
                ui.add_space(8.0);
                if ui.button("Rescan").clicked() {
                    self.start_scan();
                }
            }
            ui.add_space(12.0);
            ui.monospace(format!("Data: {}", self.paths.root.display()));
        });
    }
}
