// MIT License - Copyright (c) 2026 Peter Wright

//! Silence the siren and clear the fired-partition memory.
//!
//! ```sh
//! HOST=192.168.1.111 PASSWORD=307924 cargo run --example siren_off
//! ```

use std::sync::Arc;

use amt8000::executor::CommandExecutor;
use amt8000::panel::Panel;
use amt8000::session::ConnectOptions;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let options = ConnectOptions {
        host: std::env::var("HOST").unwrap_or_else(|_| "192.168.1.111".into()),
        port: std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(9009),
        password: std::env::var("PASSWORD").unwrap_or_else(|_| "307924".into()),
    };

    let panel = Panel::new(Arc::new(CommandExecutor::new(options)));

    panel.turn_off_siren(0).await?;
    panel.clean_firings().await?;
    println!("siren silenced, firings cleared");

    Ok(())
}
