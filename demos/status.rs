// MIT License - Copyright (c) 2026 Peter Wright

//! Fetch one status snapshot and print it.
//!
//! ```sh
//! HOST=192.168.1.111 PASSWORD=307924 cargo run --example status
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
    let status = panel.status().await?;

    println!(
        "{} firmware {} - state: {}, battery: {}",
        status.model,
        status.version,
        status.state.as_str(),
        status.battery
    );
    println!(
        "siren={} tamper={} zones_firing={} zones_closed={}",
        status.siren, status.tamper, status.zones_firing, status.zones_closed
    );

    println!("\n--- Partitions ---");
    for partition in status.partitions.iter().filter(|p| p.enabled) {
        println!(
            "  partition {:2}: armed={} stay={} firing={} fired={}",
            partition.number, partition.armed, partition.stay, partition.firing, partition.fired
        );
    }

    println!("\n--- Zones ---");
    for zone in status.zones.iter().filter(|z| z.enabled) {
        println!(
            "  zone {:2}: open={} violated={} bypassed={} tamper={} low_battery={}",
            zone.number, zone.open, zone.violated, zone.anulated, zone.tamper, zone.low_battery
        );
    }

    for siren in &status.sirens {
        println!(
            "siren {}: tamper={} low_battery={}",
            siren.number, siren.tamper, siren.low_battery
        );
    }
    for repeater in &status.repeaters {
        println!(
            "repeater {}: tamper={} low_battery={}",
            repeater.number, repeater.tamper, repeater.low_battery
        );
    }

    Ok(())
}
