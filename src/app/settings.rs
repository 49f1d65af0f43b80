// src/app/settings.rs
use eframe::egui as eg;

use super::types::SettingsDraft;

enum SettingsAction {
    Save,
    Cancel,
    ClearCache,
}

fn field(ui: &mut eg::Ui, label: &str, value: &mut String, hint: &str, secret: bool) {
    ui.label(label);
    ui.add(
        eg::TextEdit::singleline(value)
            .hint_text(hint)
            .password(secret)
            .desired_width(360.0),
    );
    ui.end_row();
}

impl crate::app::HomeTheaterApp {
    /// Settings dialog; also the first-run setup screen.
    pub(crate) fn ui_render_settings_window(&mut self, ctx: &eg::Context) {
        let Some(mut draft) = self.settings_draft.take() else {
            return;
        };
        let first_run = self.config.needs_setup();

        // warnings reflect what the draft would produce if saved
        let mut preview = self.config.clone();
        preview.merge(draft.to_patch());
        let warnings = preview.validate();

        let mut open = true;
        let mut action: Option<SettingsAction> = None;
        let busy = self.is_busy();

        eg::Window::new(if first_run { "Welcome – Setup" } else { "Settings" })
            .id(eg::Id::new("settings_window"))
            .collapsible(false)
            .resizable(true)
            .default_width(520.0)
            .open(&mut open)
            .show(ctx, |ui| {
                if first_run {
                    ui.label("Choose where your movies and series live. Either folder is enough to start.");
                    ui.add_space(6.0);
                }

                eg::Grid::new("settings_grid")
                    .num_columns(2)
                    .spacing([12.0, 6.0])
                    .show(ui, |ui| {
                        field(ui, "Movie folder", &mut draft.movie_dir, "/media/movies", false);
                        field(ui, "Series folder", &mut draft.series_dir, "/media/series", false);
                        field(ui, "OMDb API key", &mut draft.omdb_api_key, "optional", true);
                        field(
                            ui,
                            "OpenSubtitles API key",
                            &mut draft.opensubtitles_api_key,
                            "optional",
                            true,
                        );
                        field(
                            ui,
                            "Subtitle languages",
                            &mut draft.subtitle_languages,
                            "tr, en",
                            false,
                        );
                        field(ui, "Player command", &mut draft.player_cmd, "system default", false);

                        ui.label("Player arguments")
                            .on_hover_text("One per line. {file}, {subtitle} and {title} are filled in.");
                        ui.add(
                            eg::TextEdit::multiline(&mut draft.player_args)
                                .hint_text("--fullscreen\n--sub-file={subtitle}\n{file}")
                                .desired_rows(3)
                                .desired_width(360.0),
                        );
                        ui.end_row();

                        field(ui, "ffmpeg command", &mut draft.ffmpeg_cmd, "ffmpeg", false);
                        field(ui, "Web port", &mut draft.web_port, "5000", false);
                    });

                if !warnings.is_empty() {
                    ui.add_space(6.0);
                    for w in &warnings {
                        ui.label(eg::RichText::new(format!("⚠ {w}")).color(eg::Color32::from_rgb(230, 180, 80)));
                    }
                }

                ui.add_space(8.0);
                ui.separator();
                ui.horizontal(|ui| {
                    let can_save = !(first_run && draft.is_blank());
                    if ui.add_enabled(can_save, eg::Button::new("Save")).clicked() {
                        action = Some(SettingsAction::Save);
                    }
                    if ui.button("Cancel").clicked() {
                        action = Some(SettingsAction::Cancel);
                    }
                    ui.with_layout(eg::Layout::right_to_left(eg::Align::Center), |ui| {
                        let clear = ui
                            .add_enabled(!busy, eg::Button::new("Clear metadata cache"))
                            .on_hover_text("Forget cached lookups and posters, then fetch again");
                        if clear.clicked() {
                            action = Some(SettingsAction::ClearCache);
                        }
                    });
                });
                ui.add_space(4.0);
                ui.monospace(format!("Data: {}", self.paths.root.display()));
            });

        match action {
            Some(SettingsAction::Save) => self.apply_settings(&draft),
            Some(SettingsAction::Cancel) => {}
            Some(SettingsAction::ClearCache) => {
                self.clear_metadata_cache();
                self.settings_draft = Some(draft);
            }
            None if open => self.settings_draft = Some(draft),
            None => {}
        }
    }
}

impl SettingsDraft {
    pub fn is_blank(&self) -> bool {
        self.movie_dir.trim().is_empty() && self.series_dir.trim().is_empty()
    }
}
