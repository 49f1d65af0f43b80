// src/app/player.rs
use std::path::PathBuf;
use std::process::Command;

use tracing::info;

use crate::config::AppConfig;
use crate::library::subtitles::find_local_subtitle;
use crate::library::MediaItem;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaybackRequest {
    pub file: PathBuf,
    pub subtitle: Option<PathBuf>,
    pub title: String,
}

/// The file must still exist; a sidecar subtitle is attached when present.
pub fn resolve_playback(item: &MediaItem, languages: &[String]) -> Result<PlaybackRequest, String> {
    if !item.path.is_file() {
        return Err(format!("File not found: {}", item.path.display()));
    }
    let title = match (item.season, item.episode) {
        (Some(_), Some(_)) => format!("{} {}", item.title, item.episode_label()),
        _ => item.title.clone(),
    };
    Ok(PlaybackRequest {
        subtitle: find_local_subtitle(&item.path, languages),
        file: item.path.clone(),
        title,
    })
}

fn system_opener(target: &str) -> Command {
    #[cfg(target_os = "windows")]
    {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", "start", ""]).arg(target);
        cmd
    }
    #[cfg(target_os = "macos")]
    {
        let mut cmd = Command::new("open");
        cmd.arg(target);
        cmd
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        let mut cmd = Command::new("xdg-open");
        cmd.arg(target);
        cmd
    }
}

/// Hand a file or URL to whatever the desktop associates with it.
pub fn open_with_system(target: &str) -> Result<(), String> {
    system_opener(target)
        .spawn()
        .map(|_child| ())
        .map_err(|e| format!("failed to open {target}: {e}"))
}

/// `player_cmd` with `player_args` templates, else the OS opener.
/// With no args configured the file is passed as the only argument.
pub fn build_player_command(config: &AppConfig, req: &PlaybackRequest) -> Command {
    let file = req.file.to_string_lossy();
    let Some(program) = config.player_cmd.as_deref() else {
        return system_opener(&file);
    };

    let mut cmd = Command::new(program);
    if config.player_args.is_empty() {
        cmd.arg(file.as_ref());
        return cmd;
    }

    let subtitle = req
        .subtitle
        .as_ref()
        .map(|p| p.to_string_lossy().into_owned());
    for template in &config.player_args {
        if template.contains("{subtitle}") && subtitle.is_none() {
            continue;
        }
        let arg = template
            .replace("{file}", &file)
            .replace("{title}", &req.title)
            .replace("{subtitle}", subtitle.as_deref().unwrap_or(""));
        cmd.arg(arg);
    }
    cmd
}

pub fn launch(config: &AppConfig, req: &PlaybackRequest) -> Result<(), String> {
    let mut cmd = build_player_command(config, req);
    info!("play: {:?} {:?}", cmd.get_program(), cmd.get_args().collect::<Vec<_>>());
    cmd.spawn()
        .map(|_child| ())
        .map_err(|e| format!("failed to start player {:?}: {e}", cmd.get_program()))
}
