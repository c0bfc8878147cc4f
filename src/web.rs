// MIT License - Copyright (c) 2026 Peter Wright

//! HTTP side channel: Prometheus exposition on `/metrics` and a read-only
//! HTML view of the latest snapshot on `/`.
//!
//! Deliberately not a web framework: one listener, one request line, one
//! response. The page is diagnostic, not part of the bridge's correctness.

use std::sync::Arc;

use chrono::Utc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::metrics;
use crate::status::Status;

pub type StatusReceiver = watch::Receiver<Option<Arc<Status>>>;

/// Bind the side channel and serve until the process exits. The page is
/// diagnostic only, so failures are logged rather than propagated.
pub async fn serve(addr: String, status_rx: StatusReceiver) {
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!("could not bind the side channel on {addr}: {err}");
            return;
        }
    };
    info!("side channel listening on {addr}");

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let status_rx = status_rx.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle(stream, status_rx).await {
                        debug!("side channel request from {peer} failed: {err}");
                    }
                });
            }
            Err(err) => error!("side channel accept failed: {err}"),
        }
    }
}

async fn handle(stream: TcpStream, status_rx: StatusReceiver) -> std::io::Result<()> {
    let mut stream = BufReader::new(stream);
    let mut request_line = String::new();
    stream.read_line(&mut request_line).await?;

    let path = request_line.split_whitespace().nth(1).unwrap_or("/");
    let (status_line, content_type, body) = match path {
        "/metrics" => (
            "200 OK",
            "text/plain; version=0.0.4",
            metrics::gather(),
        ),
        "/" => {
            let snapshot = status_rx.borrow().clone();
            ("200 OK", "text/html; charset=utf-8", render_page(snapshot))
        }
        _ => ("404 Not Found", "text/plain", "not found\n".to_string()),
    };

    let response = format!(
        "HTTP/1.1 {status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len(),
    );
    stream.get_mut().write_all(response.as_bytes()).await?;
    stream.get_mut().shutdown().await
}

/// Render the status page from the latest snapshot, if any arrived yet.
pub fn render_page(snapshot: Option<Arc<Status>>) -> String {
    let mut page = String::with_capacity(4096);
    page.push_str("<!doctype html>\n<html><head><title>AMT-8000 bridge</title></head><body>\n");
    page.push_str("<h1>AMT-8000 bridge</h1>\n");

    match snapshot {
        None => page.push_str("<p>No status snapshot received yet.</p>\n"),
        Some(status) => {
            page.push_str(&format!(
                "<p>{} firmware {} - state: <b>{}</b>, battery: {}</p>\n",
                status.model,
                status.version,
                status.state.as_str(),
                status.battery,
            ));
            page.push_str(&format!(
                "<p>siren: {}, tamper: {}, zones firing: {}, zones closed: {}</p>\n",
                status.siren, status.tamper, status.zones_firing, status.zones_closed,
            ));

            page.push_str("<h2>Partitions</h2>\n<table border=\"1\"><tr><th>#</th><th>armed</th><th>stay</th><th>firing</th><th>fired</th></tr>\n");
            for partition in status.partitions.iter().filter(|p| p.enabled) {
                page.push_str(&format!(
                    "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                    partition.number,
                    partition.armed,
                    partition.stay,
                    partition.firing,
                    partition.fired,
                ));
            }
            page.push_str("</table>\n");

            page.push_str("<h2>Zones</h2>\n<table border=\"1\"><tr><th>#</th><th>open</th><th>violated</th><th>bypassed</th><th>tamper</th><th>low battery</th></tr>\n");
            for zone in status.zones.iter().filter(|z| z.enabled) {
                page.push_str(&format!(
                    "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                    zone.number,
                    zone.open,
                    zone.violated,
                    zone.anulated,
                    zone.tamper,
                    zone.low_battery,
                ));
            }
            page.push_str("</table>\n");
        }
    }

    page.push_str(&format!(
        "<p><small>generated {} - <a href=\"/metrics\">metrics</a></small></p>\n",
        Utc::now().to_rfc3339(),
    ));
    page.push_str("</body></html>\n");
    page
}
