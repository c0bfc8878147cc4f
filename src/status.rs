// MIT License - Copyright (c) 2026 Peter Wright

//! Decoding of the central's 143-byte status reply.

use std::ops::Range;

use bitflags::bitflags;

use crate::battery::Battery;
use crate::devices::partition::Partition;
use crate::devices::peripheral::{Repeater, Siren};
use crate::devices::zone::Zone;
use crate::error::{Error, Result};

/// Expected status reply body length.
pub const STATUS_LEN: usize = 143;

pub const ZONE_COUNT: usize = 64;
pub const PARTITION_COUNT: usize = 16;
pub const SIREN_COUNT: usize = 2;
pub const REPEATER_COUNT: usize = 2;

// Bit-packed zone ranges, one bit per zone, LSB first within each octet.
const ZONES_ENABLED: Range<usize> = 12..19;
const ZONES_OPEN: Range<usize> = 38..45;
const ZONES_VIOLATED: Range<usize> = 46..53;
const ZONES_ANULATED: Range<usize> = 54..61;
const ZONES_TAMPER: Range<usize> = 89..96;
const ZONES_LOW_BATTERY: Range<usize> = 105..112;

const PARTITIONS_START: usize = 21;
const GLOBAL_FLAGS: usize = 20;
const GENERAL_TROUBLES: usize = 71;
const SIRENS_TAMPER: usize = 99;
const REPEATERS_TAMPER: usize = 101;
const SIRENS_LOW_BATTERY: usize = 115;
const REPEATERS_LOW_BATTERY: usize = 117;

bitflags! {
    /// Global state bits of octet 20.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct GlobalFlags: u8 {
        const SIREN        = 0x02;
        const ZONES_CLOSED = 0x04;
        const ZONES_FIRING = 0x08;
    }
}

/// Overall arm state of the central.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Disarmed,
    /// Some but not all partitions armed.
    Partial,
    Armed,
    Unknown,
}

impl State {
    fn from_octet(octet: u8) -> Self {
        match (octet >> 5) & 0x03 {
            0x00 => State::Disarmed,
            0x01 => State::Partial,
            0x03 => State::Armed,
            _ => State::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            State::Disarmed => "disarmed",
            State::Partial => "partial",
            State::Armed => "armed",
            State::Unknown => "unknown",
        }
    }
}

/// Immutable snapshot of everything the central reports.
#[derive(Debug, Clone, PartialEq)]
pub struct Status {
    pub model: String,
    pub version: String,
    pub state: State,
    pub zones_firing: bool,
    pub zones_closed: bool,
    pub siren: bool,
    pub tamper: bool,
    pub battery: Battery,
    pub partitions: Vec<Partition>,
    pub zones: Vec<Zone>,
    pub sirens: Vec<Siren>,
    pub repeaters: Vec<Repeater>,
}

impl Status {
    /// 1-based numbers of the armed partitions, in ascending order.
    pub fn armed_partitions(&self) -> Vec<u8> {
        self.partitions
            .iter()
            .filter(|p| p.armed)
            .map(|p| p.number)
            .collect()
    }
}

/// Decode a status reply body into a snapshot.
pub fn decode(reply: &[u8]) -> Result<Status> {
    if reply.len() != STATUS_LEN {
        return Err(Error::InvalidStatus(reply.len()));
    }

    let flags = GlobalFlags::from_bits_truncate(reply[GLOBAL_FLAGS]);

    let mut zones: Vec<Zone> = (1..=ZONE_COUNT as u8).map(Zone::new).collect();
    unpack_zone_bits(reply, ZONES_ENABLED, &mut zones, |z, set| z.enabled = set);
    unpack_zone_bits(reply, ZONES_OPEN, &mut zones, |z, set| z.open = set);
    unpack_zone_bits(reply, ZONES_VIOLATED, &mut zones, |z, set| z.violated = set);
    unpack_zone_bits(reply, ZONES_ANULATED, &mut zones, |z, set| z.anulated = set);
    unpack_zone_bits(reply, ZONES_TAMPER, &mut zones, |z, set| z.tamper = set);
    unpack_zone_bits(reply, ZONES_LOW_BATTERY, &mut zones, |z, set| {
        z.low_battery = set
    });

    let partitions = (0..PARTITION_COUNT)
        .map(|i| Partition::from_octet(i as u8 + 1, reply[PARTITIONS_START + i]))
        .collect();

    let mut sirens: Vec<Siren> = (1..=SIREN_COUNT as u8).map(Siren::new).collect();
    let mut repeaters: Vec<Repeater> = (1..=REPEATER_COUNT as u8).map(Repeater::new).collect();
    for i in 0..SIREN_COUNT {
        sirens[i].tamper = reply[SIRENS_TAMPER + i] & 0x01 > 0;
        sirens[i].low_battery = reply[SIRENS_LOW_BATTERY + i] & 0x01 > 0;
    }
    for i in 0..REPEATER_COUNT {
        repeaters[i].tamper = reply[REPEATERS_TAMPER + i] & 0x01 > 0;
        repeaters[i].low_battery = reply[REPEATERS_LOW_BATTERY + i] & 0x01 > 0;
    }

    Ok(Status {
        model: model_name(reply[0]).to_string(),
        version: version(&reply[1..4]),
        state: State::from_octet(reply[GLOBAL_FLAGS]),
        zones_firing: flags.contains(GlobalFlags::ZONES_FIRING),
        zones_closed: flags.contains(GlobalFlags::ZONES_CLOSED),
        siren: flags.contains(GlobalFlags::SIREN),
        tamper: reply[GENERAL_TROUBLES] & 0x02 > 0,
        battery: Battery::from_status(reply),
        partitions,
        zones,
        sirens,
        repeaters,
    })
}

fn unpack_zone_bits(
    reply: &[u8],
    range: Range<usize>,
    zones: &mut [Zone],
    mut apply: impl FnMut(&mut Zone, bool),
) {
    for (i, octet) in reply[range].iter().enumerate() {
        for bit in 0..8 {
            apply(&mut zones[i * 8 + bit], octet & (1 << bit) > 0);
        }
    }
}

fn model_name(octet: u8) -> &'static str {
    match octet {
        0x01 => "AMT-8000",
        _ => "Unknown",
    }
}

fn version(octets: &[u8]) -> String {
    format!("{}.{}.{}", octets[0], octets[1], octets[2])
}
