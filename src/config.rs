// MIT License - Copyright (c) 2026 Peter Wright

//! Environment-driven configuration.
//!
//! Everything the bridge needs comes from environment variables. Integer
//! lists are comma-separated 1-based indices; `AWAY`, `STAY`, and `NIGHT`
//! accept `0` meaning "every partition".

use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::error::{Error, Result};
use crate::panel::MAX_PARTITION;
use crate::session::ConnectOptions;
use crate::state::PartitionGroups;
use crate::status::{REPEATER_COUNT, SIREN_COUNT, ZONE_COUNT};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Panel address (`HOST`, required).
    pub host: String,
    /// Panel TCP port (`PORT`).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Panel password, 4 or 6 digits (`PASSWORD`, required).
    pub password: String,
    /// Zones exposed as motion sensors (`MOTION`).
    #[serde(default)]
    pub motion: Vec<u8>,
    /// Zones exposed as contact sensors (`CONTACT`).
    #[serde(default)]
    pub contact: Vec<u8>,
    /// Zones that get a bypass switch (`BYPASS`).
    #[serde(default)]
    pub bypass: Vec<u8>,
    /// Partition group for away mode (`AWAY`, required).
    pub away: Vec<u8>,
    /// Partition group for stay mode (`STAY`, required).
    pub stay: Vec<u8>,
    /// Partition group for night mode (`NIGHT`, required).
    pub night: Vec<u8>,
    /// Positional zone names (`ZONE_NAMES`).
    #[serde(default)]
    pub zone_names: Vec<String>,
    /// Sirens to expose (`SIRENS`).
    #[serde(default)]
    pub sirens: Vec<u8>,
    /// Repeaters to expose (`REPEATERS`).
    #[serde(default)]
    pub repeaters: Vec<u8>,
    /// Clear fired-partition memory this long after a firing started
    /// (`CLEAN_FIRINGS_AFTER`, e.g. `45s` or `2m`).
    #[serde(default, deserialize_with = "parse_duration")]
    pub clean_firings_after: Option<Duration>,
    /// HTTP side channel address (`LISTEN`).
    #[serde(default = "default_listen")]
    pub listen: String,
}

fn default_port() -> u16 {
    9009
}

fn default_listen() -> String {
    ":9009".to_string()
}

fn parse_duration<'de, D>(deserializer: D) -> std::result::Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(s) if s.is_empty() => Ok(None),
        Some(s) => humantime::parse_duration(&s)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// What a configured zone should look like in the accessory tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneKind {
    Motion,
    Contact,
}

impl ZoneKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ZoneKind::Motion => "motion",
            ZoneKind::Contact => "contact",
        }
    }
}

/// A zone the operator asked to expose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneSpec {
    pub number: u8,
    pub name: String,
    pub kind: ZoneKind,
    pub allow_bypass: bool,
}

impl Config {
    /// Read the configuration from the environment.
    pub fn from_env() -> std::result::Result<Self, envy::Error> {
        envy::from_env()
    }

    /// Reject out-of-range zone and partition references up front.
    pub fn validate(&self) -> Result<()> {
        for &zone in self.motion.iter().chain(&self.contact).chain(&self.bypass) {
            if zone == 0 || zone as usize > ZONE_COUNT {
                return Err(Error::InvalidZone(zone));
            }
        }
        for &partition in self.away.iter().chain(&self.stay).chain(&self.night) {
            if partition > MAX_PARTITION {
                return Err(Error::InvalidPartition(partition));
            }
        }
        for &siren in &self.sirens {
            if siren == 0 || siren as usize > SIREN_COUNT {
                return Err(Error::Protocol(format!("no such siren: {siren}")));
            }
        }
        for &repeater in &self.repeaters {
            if repeater == 0 || repeater as usize > REPEATER_COUNT {
                return Err(Error::Protocol(format!("no such repeater: {repeater}")));
            }
        }
        Ok(())
    }

    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            host: self.host.clone(),
            port: self.port,
            password: self.password.clone(),
        }
    }

    pub fn groups(&self) -> PartitionGroups {
        PartitionGroups {
            stay: self.stay.clone(),
            away: self.away.clone(),
            night: self.night.clone(),
        }
    }

    /// Display name of a zone: the positional override when present and
    /// non-empty, otherwise "Zone N".
    pub fn zone_name(&self, number: u8) -> String {
        match self.zone_names.get(number as usize - 1) {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("Zone {number}"),
        }
    }

    /// Every configured zone, motion and contact merged, sorted by number.
    pub fn all_zones(&self) -> Vec<ZoneSpec> {
        let mut zones: Vec<ZoneSpec> = Vec::new();
        for &number in &self.motion {
            zones.push(ZoneSpec {
                number,
                name: self.zone_name(number),
                kind: ZoneKind::Motion,
                allow_bypass: self.bypass.contains(&number),
            });
        }
        for &number in &self.contact {
            zones.push(ZoneSpec {
                number,
                name: self.zone_name(number),
                kind: ZoneKind::Contact,
                allow_bypass: self.bypass.contains(&number),
            });
        }
        zones.sort_by_key(|z| z.number);
        zones
    }

    /// The side-channel address in a bindable form: Go-style `":9009"`
    /// becomes `"0.0.0.0:9009"`.
    pub fn listen_addr(&self) -> String {
        if self.listen.starts_with(':') {
            format!("0.0.0.0{}", self.listen)
        } else {
            self.listen.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_env() -> Vec<(String, String)> {
        vec![
            ("HOST".into(), "192.168.1.111".into()),
            ("PASSWORD".into(), "307924".into()),
            ("AWAY".into(), "0".into()),
            ("STAY".into(), "2".into()),
            ("NIGHT".into(), "2,3".into()),
        ]
    }

    fn config(extra: &[(&str, &str)]) -> Config {
        let mut env = base_env();
        env.extend(
            extra
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        );
        envy::from_iter(env).expect("config should parse")
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[]);
        assert_eq!(cfg.port, 9009);
        assert_eq!(cfg.listen, ":9009");
        assert_eq!(cfg.listen_addr(), "0.0.0.0:9009");
        assert!(cfg.clean_firings_after.is_none());
        assert!(cfg.motion.is_empty());
        assert_eq!(cfg.away, vec![0]);
        assert_eq!(cfg.night, vec![2, 3]);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_missing_required_var_fails() {
        let env = vec![("HOST".to_string(), "1.2.3.4".to_string())];
        assert!(envy::from_iter::<_, Config>(env).is_err());
    }

    #[test]
    fn test_duration_parsing() {
        let cfg = config(&[("CLEAN_FIRINGS_AFTER", "45s")]);
        assert_eq!(cfg.clean_firings_after, Some(Duration::from_secs(45)));

        let cfg = config(&[("CLEAN_FIRINGS_AFTER", "2m")]);
        assert_eq!(cfg.clean_firings_after, Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_zone_names_fall_back_to_number() {
        let cfg = config(&[("ZONE_NAMES", "Front door,,Kitchen")]);
        assert_eq!(cfg.zone_name(1), "Front door");
        assert_eq!(cfg.zone_name(2), "Zone 2");
        assert_eq!(cfg.zone_name(3), "Kitchen");
        assert_eq!(cfg.zone_name(9), "Zone 9");
    }

    #[test]
    fn test_all_zones_merges_and_sorts() {
        let cfg = config(&[
            ("CONTACT", "1,3,5"),
            ("MOTION", "2,4"),
            ("BYPASS", "2,3"),
            ("ZONE_NAMES", "A,B,,C,D"),
        ]);

        let zones = cfg.all_zones();
        let summary: Vec<(u8, &str, ZoneKind, bool)> = zones
            .iter()
            .map(|z| (z.number, z.name.as_str(), z.kind, z.allow_bypass))
            .collect();
        assert_eq!(
            summary,
            vec![
                (1, "A", ZoneKind::Contact, false),
                (2, "B", ZoneKind::Motion, true),
                (3, "Zone 3", ZoneKind::Contact, true),
                (4, "C", ZoneKind::Motion, false),
                (5, "D", ZoneKind::Contact, false),
            ]
        );
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        assert!(config(&[("MOTION", "65")]).validate().is_err());
        assert!(config(&[("CONTACT", "0")]).validate().is_err());
        assert!(config(&[("SIRENS", "3")]).validate().is_err());
        assert!(config(&[("REPEATERS", "3")]).validate().is_err());

        let mut env = base_env();
        env[3] = ("STAY".into(), "17".into());
        let cfg: Config = envy::from_iter(env).unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_listen_passthrough_for_full_addresses() {
        let cfg = config(&[("LISTEN", "127.0.0.1:8080")]);
        assert_eq!(cfg.listen_addr(), "127.0.0.1:8080");
    }
}
