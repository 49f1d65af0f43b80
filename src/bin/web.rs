// src/bin/web.rs: browser shell. `--open` launches the system browser once listening.
use std::env;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use hometheater::app::player::open_with_system;
use hometheater::config::DataPaths;
use hometheater::web::{self, WebState};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("hometheater=info,tower_http=info")),
        )
        .try_init();

    let open_browser = env::args().skip(1).any(|a| a == "--open");
    let paths = DataPaths::resolve();
    info!("data dir: {}", paths.root.display());
    let state = Arc::new(WebState::load(paths));

    let port = match env::var("HOMETHEATER_PORT").ok().map(|p| p.parse::<u16>()) {
        Some(Ok(p)) if p != 0 => p,
        Some(_) => {
            warn!("ignoring invalid HOMETHEATER_PORT");
            state.config().web_port
        }
        None => state.config().web_port,
    };

    if state.config().needs_setup() {
        info!("no library folders configured yet; open the page to finish setup");
    } else if !web::start_scan(&state) {
        warn!("initial scan not started");
    }

    let url = format!("http://127.0.0.1:{port}");
    if open_browser {
        let url = url.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            if let Err(err) = open_with_system(&url) {
                warn!("{err}; open {url} manually");
            }
        });
    }

    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    web::serve(state, addr).await
}
