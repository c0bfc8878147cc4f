// MIT License - Copyright (c) 2026 Peter Wright
// HomeKit bridge for the Intelbras AMT-8000

mod homekit;

use std::sync::Arc;

use anyhow::Context;
use futures::FutureExt;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{error, info, warn};

use amt8000::config::Config;
use amt8000::executor::CommandExecutor;
use amt8000::panel::Panel;
use amt8000::poller::StatusPoller;
use amt8000::status::Status;
use amt8000::{mac, metrics, web};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cfg = Config::from_env().context("could not parse environment")?;
    cfg.validate().context("invalid configuration")?;

    // Counters must exist before the first command hits the panel.
    metrics::init();

    info!(
        "loading accessories: stay={:?} away={:?} night={:?} zones={} sirens={:?} repeaters={:?}",
        cfg.stay,
        cfg.away,
        cfg.night,
        cfg.all_zones().len(),
        cfg.sirens,
        cfg.repeaters,
    );

    let executor = Arc::new(CommandExecutor::new(cfg.connect_options()));
    let panel = Panel::new(executor.clone());

    let status = panel
        .status()
        .await
        .context("could not fetch the initial status")?;

    let serial_number = mac::lookup(&cfg.host, cfg.port).await;
    if serial_number.is_none() {
        warn!("could not determine the panel MAC address");
    }
    info!(
        "got system information: model={} version={} mac={}",
        status.model,
        status.version,
        serial_number.as_deref().unwrap_or("unknown"),
    );

    let (server, accessories) = homekit::build(&cfg, &status, panel.clone(), serial_number).await?;

    let mut poller = StatusPoller::new(executor.clone());
    homekit::register_observers(&mut poller, accessories, Arc::new(cfg.groups()));

    // Latest snapshot for the status page.
    let (status_tx, status_rx) = watch::channel(None::<Arc<Status>>);
    let status_tx = Arc::new(status_tx);
    poller.observe(move |status| {
        let status_tx = status_tx.clone();
        async move {
            let _ = status_tx.send(Some(status));
        }
        .boxed()
    });

    if let Some(after) = cfg.clean_firings_after {
        let panel = panel.clone();
        let firing_since = Arc::new(tokio::sync::Mutex::new(None::<Instant>));
        poller.observe(move |status| {
            let panel = panel.clone();
            let firing_since = firing_since.clone();
            async move {
                let firing = status.zones_firing
                    || status.partitions.iter().any(|p| p.firing || p.fired);
                let mut since = firing_since.lock().await;
                match (*since, firing) {
                    (None, true) => *since = Some(Instant::now()),
                    (Some(started), true) if started.elapsed() >= after => {
                        info!("firing has lasted more than {after:?}, cleaning");
                        if let Err(err) = panel.clean_firings().await {
                            error!("could not clean firings: {err}");
                        }
                        *since = None;
                    }
                    (_, false) => *since = None,
                    _ => {}
                }
            }
            .boxed()
        });
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poller_handle = tokio::spawn(poller.run(shutdown_rx));
    let web_handle = tokio::spawn(web::serve(cfg.listen_addr(), status_rx));

    info!("starting server...");
    tokio::select! {
        result = server.run_handle() => {
            if let Err(err) = result {
                error!("accessory server failed: {err}");
            }
        }
        _ = shutdown_signal() => info!("stopping server..."),
    }

    // Let the poller finish its in-flight command before leaving.
    let _ = shutdown_tx.send(true);
    let _ = poller_handle.await;
    web_handle.abort();

    info!("shutdown complete");
    Ok(())
}

/// Completes on SIGINT or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                warn!("could not install the SIGTERM handler: {err}");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
