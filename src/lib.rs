// MIT License - Copyright (c) 2026 Peter Wright

//! # amt8000
//!
//! Client for the ISECnet v2 protocol spoken by Intelbras AMT-8000 alarm
//! centrals, plus the supporting pieces of a HomeKit bridge: a serialized
//! command executor, a status poller, the HomeKit state mapping, Prometheus
//! metrics, and an embedded status page.
//!
//! The central only tolerates one short-lived TCP dialogue at a time, so
//! every command runs on its own authenticated session behind a
//! process-wide executor.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use amt8000::executor::CommandExecutor;
//! use amt8000::panel::Panel;
//! use amt8000::session::ConnectOptions;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let executor = Arc::new(CommandExecutor::new(ConnectOptions {
//!         host: "192.168.1.111".into(),
//!         port: 9009,
//!         password: "307924".into(),
//!     }));
//!     let panel = Panel::new(executor);
//!
//!     let status = panel.status().await?;
//!     println!("{} {} is {}", status.model, status.version, status.state.as_str());
//!
//!     panel.arm(2).await?;
//!     Ok(())
//! }
//! ```

pub mod battery;
pub mod config;
pub mod devices;
pub mod error;
pub mod executor;
pub mod mac;
pub mod metrics;
pub mod panel;
pub mod poller;
pub mod protocol;
pub mod session;
pub mod state;
pub mod status;
pub mod web;

// Re-exports for convenience
pub use battery::Battery;
pub use config::{Config, ZoneKind, ZoneSpec};
pub use devices::partition::Partition;
pub use devices::peripheral::{Repeater, Siren};
pub use devices::zone::{Zone, ZoneEvent};
pub use error::{Error, Result};
pub use executor::{BackoffPolicy, CommandExecutor};
pub use panel::Panel;
pub use poller::StatusPoller;
pub use session::{Command, ConnectOptions, Session};
pub use state::{alarm_state, AlarmState, PartitionGroups};
pub use status::{State, Status};
