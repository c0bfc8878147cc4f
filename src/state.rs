// MIT License - Copyright (c) 2026 Peter Wright

//! Mapping a panel snapshot onto HomeKit's five-valued alarm state.

use crate::status::{State, Status};

/// The alarm state HomeKit understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmState {
    StayArm,
    AwayArm,
    NightArm,
    Disarmed,
    AlarmTriggered,
    /// The armed partitions match none of the configured groups.
    Unknown,
}

impl AlarmState {
    /// Numeric value of the HomeKit security-system current-state
    /// characteristic, when one applies.
    pub fn current_state_value(&self) -> Option<u8> {
        match self {
            AlarmState::StayArm => Some(0),
            AlarmState::AwayArm => Some(1),
            AlarmState::NightArm => Some(2),
            AlarmState::Disarmed => Some(3),
            AlarmState::AlarmTriggered => Some(4),
            AlarmState::Unknown => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlarmState::StayArm => "stay",
            AlarmState::AwayArm => "away",
            AlarmState::NightArm => "night",
            AlarmState::Disarmed => "disarmed",
            AlarmState::AlarmTriggered => "triggered",
            AlarmState::Unknown => "unknown",
        }
    }
}

/// Which partitions make up each HomeKit arm mode. `[0]` means "every
/// partition".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionGroups {
    pub stay: Vec<u8>,
    pub away: Vec<u8>,
    pub night: Vec<u8>,
}

fn is_all(group: &[u8]) -> bool {
    group == [0]
}

/// Derive the HomeKit alarm state from a snapshot.
///
/// An active siren always wins. A partially armed central is matched by
/// comparing the sorted armed partition numbers against the night, stay,
/// and away groups in that order. A fully armed central maps to whichever
/// group is configured as "every partition".
pub fn alarm_state(status: &Status, groups: &PartitionGroups) -> AlarmState {
    if status.siren {
        return AlarmState::AlarmTriggered;
    }

    match status.state {
        State::Disarmed => AlarmState::Disarmed,
        State::Partial => {
            let armed = status.armed_partitions();
            if armed == groups.night {
                AlarmState::NightArm
            } else if armed == groups.stay {
                AlarmState::StayArm
            } else if armed == groups.away {
                AlarmState::AwayArm
            } else {
                AlarmState::Unknown
            }
        }
        State::Armed | State::Unknown => {
            if is_all(&groups.night) {
                AlarmState::NightArm
            } else if is_all(&groups.stay) {
                AlarmState::StayArm
            } else if is_all(&groups.away) {
                AlarmState::AwayArm
            } else {
                AlarmState::Unknown
            }
        }
    }
}
