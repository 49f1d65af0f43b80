// src/main.rs
use std::env;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use hometheater::app::HomeTheaterApp;
use hometheater::config::DataPaths;

fn pick_renderer() -> eframe::Renderer {
    match env::var("HOMETHEATER_RENDERER").as_deref() {
        Ok("glow") => eframe::Renderer::Glow,
        Ok("wgpu") => eframe::Renderer::Wgpu,
        _ => {
            // Default: Windows = WGPU (DX12), Others = Glow (GL)
            #[cfg(target_os = "windows")]
            { eframe::Renderer::Wgpu }
            #[cfg(not(target_os = "windows"))]
            { eframe::Renderer::Glow }
        }
    }
}

fn main() -> eframe::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hometheater=info")),
        )
        .try_init();

    let paths = DataPaths::resolve();
    info!("data dir: {}", paths.root.display());

    #[cfg(target_os = "linux")]
    {
        info!("XDG_SESSION_TYPE={:?}", env::var_os("XDG_SESSION_TYPE"));
        info!("WAYLAND_DISPLAY={:?}", env::var_os("WAYLAND_DISPLAY"));
        info!("DISPLAY={:?}", env::var_os("DISPLAY"));
    }

    let options = eframe::NativeOptions {
        renderer: pick_renderer(),
        multisampling: 0,
        viewport: egui::ViewportBuilder::default()
            .with_title("Home Theater")
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([720.0, 480.0]),
        ..Default::default()
    };

    match eframe::run_native(
        "Home Theater",
        options,
        Box::new(move |_cc| Ok(Box::new(HomeTheaterApp::new(paths)))),
    ) {
        Ok(_) => Ok(()),
        Err(e) => {
            error!("eframe failed to start: {e:?}");
            error!("Hint: try HOMETHEATER_RENDERER=wgpu or glow, or run hometheater-web instead.");
            Err(e)
        }
    }
}
