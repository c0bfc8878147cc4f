// MIT License - Copyright (c) 2026 Peter Wright

/// A wireless siren paired with the central (1..=2).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Siren {
    /// 1-based siren number.
    pub number: u8,
    pub tamper: bool,
    pub low_battery: bool,
}

impl Siren {
    pub fn new(number: u8) -> Self {
        Self {
            number,
            ..Self::default()
        }
    }
}

/// A wireless signal repeater paired with the central (1..=2).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Repeater {
    /// 1-based repeater number.
    pub number: u8,
    pub tamper: bool,
    pub low_battery: bool,
}

impl Repeater {
    pub fn new(number: u8) -> Self {
        Self {
            number,
            ..Self::default()
        }
    }
}
