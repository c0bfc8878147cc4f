// MIT License - Copyright (c) 2026 Peter Wright

/// A single alarm zone (1..=64).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Zone {
    /// 1-based zone number.
    pub number: u8,
    pub enabled: bool,
    pub open: bool,
    pub violated: bool,
    /// Bypassed while the rest of the system is armed.
    pub anulated: bool,
    pub tamper: bool,
    pub low_battery: bool,
}

impl Zone {
    pub fn new(number: u8) -> Self {
        Self {
            number,
            ..Self::default()
        }
    }

    /// Whether the sensor should read as open: either the contact is open
    /// or the zone has been violated.
    pub fn is_open(&self) -> bool {
        self.open || self.violated
    }

    /// The most significant thing currently happening on this zone.
    pub fn event(&self) -> ZoneEvent {
        if self.open {
            ZoneEvent::Open
        } else if self.violated {
            ZoneEvent::Violated
        } else if self.anulated {
            ZoneEvent::Anulated
        } else {
            ZoneEvent::Clean
        }
    }
}

/// Condensed zone condition, ordered by priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneEvent {
    Clean,
    Open,
    Violated,
    Anulated,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_priority() {
        let mut zone = Zone::new(1);
        zone.open = true;
        zone.violated = true;
        zone.anulated = true;
        assert_eq!(zone.event(), ZoneEvent::Open);

        zone.open = false;
        assert_eq!(zone.event(), ZoneEvent::Violated);

        zone.violated = false;
        assert_eq!(zone.event(), ZoneEvent::Anulated);

        zone.anulated = false;
        assert_eq!(zone.event(), ZoneEvent::Clean);
    }

    #[test]
    fn test_is_open_covers_violation() {
        let mut zone = Zone::new(2);
        assert!(!zone.is_open());
        zone.violated = true;
        assert!(zone.is_open());
        zone.violated = false;
        zone.open = true;
        assert!(zone.is_open());
    }
}
