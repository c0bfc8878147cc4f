// MIT License - Copyright (c) 2026 Peter Wright

use bitflags::bitflags;

bitflags! {
    /// Per-partition status bits as packed in the status reply.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PartitionFlags: u8 {
        const ARMED   = 0x01;
        const FIRING  = 0x04;
        const FIRED   = 0x08;
        const STAY    = 0x40;
        const ENABLED = 0x80;
    }
}

/// One of the 16 partitions of the central.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    /// 1-based partition number.
    pub number: u8,
    pub enabled: bool,
    pub armed: bool,
    /// Currently sounding.
    pub firing: bool,
    /// Has sounded since the last clean-firings.
    pub fired: bool,
    pub stay: bool,
}

impl Partition {
    /// Build a partition from its status octet.
    pub fn from_octet(number: u8, octet: u8) -> Self {
        let flags = PartitionFlags::from_bits_truncate(octet);
        Self {
            number,
            enabled: flags.contains(PartitionFlags::ENABLED),
            armed: flags.contains(PartitionFlags::ARMED),
            firing: flags.contains(PartitionFlags::FIRING),
            fired: flags.contains(PartitionFlags::FIRED),
            stay: flags.contains(PartitionFlags::STAY),
        }
    }
}
