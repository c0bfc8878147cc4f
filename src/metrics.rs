// MIT License - Copyright (c) 2026 Peter Wright

//! Process-wide Prometheus metrics.
//!
//! Registered in the default registry at first touch; the binary forces
//! them before issuing the first panel command so scrapes always see the
//! full set.

use once_cell::sync::Lazy;
use prometheus::{
    register_gauge, register_gauge_vec, register_int_counter, Gauge, GaugeVec, IntCounter,
    TextEncoder,
};

/// Commands attempted against the central, including retries.
pub static REQUESTS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "homekit_amt8000_client_requests_total",
        "Commands attempted against the alarm central"
    )
    .expect("register requests counter")
});

/// Attempts that ended in an error, transient or not.
pub static REQUEST_ERRORS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "homekit_amt8000_client_request_errors_total",
        "Failed command attempts against the alarm central"
    )
    .expect("register request errors counter")
});

/// Mapped HomeKit alarm state (0 stay, 1 away, 2 night, 3 off, 4 firing).
pub static ARM_STATE: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "homekit_amt8000_alarm_state",
        "Current alarm state as exposed to HomeKit"
    )
    .expect("register alarm state gauge")
});

/// Battery charge percent reported by the central.
pub static BATTERY_LEVEL: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "homekit_amt8000_alarm_battery_level",
        "Central battery level percent"
    )
    .expect("register battery level gauge")
});

pub static TAMPER: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "homekit_amt8000_alarm_tamper",
        "Tamper state by device",
        &["name"]
    )
    .expect("register tamper gauge")
});

pub static OPEN: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "homekit_amt8000_alarm_open",
        "Open state by zone",
        &["name"]
    )
    .expect("register open gauge")
});

pub static VIOLATED: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "homekit_amt8000_alarm_violated",
        "Violated state by zone",
        &["name"]
    )
    .expect("register violated gauge")
});

pub static BYPASSED: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "homekit_amt8000_alarm_bypassed",
        "Bypass state by zone",
        &["name"]
    )
    .expect("register bypassed gauge")
});

/// Force registration of every metric.
pub fn init() {
    Lazy::force(&REQUESTS);
    Lazy::force(&REQUEST_ERRORS);
    Lazy::force(&ARM_STATE);
    Lazy::force(&BATTERY_LEVEL);
    Lazy::force(&TAMPER);
    Lazy::force(&OPEN);
    Lazy::force(&VIOLATED);
    Lazy::force(&BYPASSED);
}

/// Render the default registry in the Prometheus text format.
pub fn gather() -> String {
    let encoder = TextEncoder::new();
    encoder
        .encode_to_string(&prometheus::gather())
        .unwrap_or_default()
}

pub fn bool_value(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_contains_registered_metrics() {
        init();
        REQUESTS.inc();
        let text = gather();
        assert!(text.contains("homekit_amt8000_client_requests_total"));
        assert!(text.contains("homekit_amt8000_alarm_state"));
    }

    #[test]
    fn test_bool_value() {
        assert_eq!(bool_value(true), 1.0);
        assert_eq!(bool_value(false), 0.0);
    }
}
