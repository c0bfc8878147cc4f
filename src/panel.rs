// MIT License - Copyright (c) 2026 Peter Wright

//! Typed façade over the command executor.
//!
//! This is the surface the HomeKit write handlers talk to. It validates
//! human-facing arguments (1-based zones, partition 0 meaning "all") and
//! translates them into wire commands; everything else is delegated.

use std::sync::Arc;

use tracing::info;

use crate::error::{Error, Result};
use crate::executor::CommandExecutor;
use crate::protocol::ALL_PARTITIONS;
use crate::session::Command;
use crate::status::{Status, ZONE_COUNT};

/// Highest partition number addressable on this central.
pub const MAX_PARTITION: u8 = 16;

#[derive(Clone)]
pub struct Panel {
    executor: Arc<CommandExecutor>,
}

impl Panel {
    pub fn new(executor: Arc<CommandExecutor>) -> Self {
        Self { executor }
    }

    /// Arm one partition; 0 arms every partition.
    pub async fn arm(&self, partition: u8) -> Result<()> {
        let partition = to_wire_partition(partition)?;
        info!("arm partition {partition:#04x}");
        self.executor.execute(Command::Arm { partition }).await
    }

    /// Arm a whole partition group, one command per partition.
    pub async fn arm_all(&self, partitions: &[u8]) -> Result<()> {
        for &partition in partitions {
            self.arm(partition).await?;
        }
        Ok(())
    }

    /// Disarm one partition; 0 disarms every partition.
    pub async fn disarm(&self, partition: u8) -> Result<()> {
        let partition = to_wire_partition(partition)?;
        info!("disarm partition {partition:#04x}");
        self.executor.execute(Command::Disarm { partition }).await
    }

    /// Trigger the audible panic.
    pub async fn panic(&self) -> Result<()> {
        info!("triggering audible panic");
        self.executor.execute(Command::Panic).await
    }

    /// Set or clear the bypass of a zone (1..=64).
    pub async fn bypass(&self, zone: u8, set: bool) -> Result<()> {
        if zone == 0 || zone as usize > ZONE_COUNT {
            return Err(Error::InvalidZone(zone));
        }
        info!("bypass zone {zone} set={set}");
        self.executor.execute(Command::Bypass { zone, set }).await
    }

    /// Clear the fired-partition memory.
    pub async fn clean_firings(&self) -> Result<()> {
        info!("cleaning firings");
        self.executor.execute(Command::CleanFirings).await
    }

    /// Silence the siren of one partition; 0 silences all.
    pub async fn turn_off_siren(&self, partition: u8) -> Result<()> {
        let partition = to_wire_partition(partition)?;
        info!("turn off siren, partition {partition:#04x}");
        self.executor
            .execute(Command::TurnOffSiren { partition })
            .await
    }

    /// Fetch a fresh snapshot.
    pub async fn status(&self) -> Result<Status> {
        self.executor.status().await
    }
}

fn to_wire_partition(partition: u8) -> Result<u8> {
    match partition {
        0 => Ok(ALL_PARTITIONS),
        1..=MAX_PARTITION => Ok(partition),
        _ => Err(Error::InvalidPartition(partition)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_conversion() {
        assert_eq!(to_wire_partition(0).unwrap(), ALL_PARTITIONS);
        assert_eq!(to_wire_partition(1).unwrap(), 1);
        assert_eq!(to_wire_partition(16).unwrap(), 16);
        assert!(matches!(
            to_wire_partition(17),
            Err(Error::InvalidPartition(17))
        ));
    }
}
