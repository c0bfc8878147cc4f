// MIT License - Copyright (c) 2026 Peter Wright

//! HomeKit accessory tree and its synchronization with the panel.
//!
//! Accessory ids are stable so the controller keeps its room assignments:
//! bridge 1, alarm 2, panic switch 3, zone N at 100+N, bypass switches at
//! 400+N, sirens at 200+i, repeaters at 300+i.
//!
//! Every accessory is seeded from the initial status snapshot before the
//! server starts answering controllers; afterwards the status poller keeps
//! the characteristics fresh. Write handlers that fail report resource-busy
//! to the controller, and they skip writes that merely restate what the
//! panel already reports, so our own mirroring never loops back into panel
//! commands.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use futures::FutureExt;
use hap::accessory::bridge::BridgeAccessory;
use hap::accessory::contact_sensor::ContactSensorAccessory;
use hap::accessory::motion_sensor::MotionSensorAccessory;
use hap::accessory::security_system::SecuritySystemAccessory;
use hap::accessory::switch::SwitchAccessory;
use hap::accessory::{AccessoryCategory, AccessoryInformation};
use hap::characteristic::status_fault::StatusFaultCharacteristic;
use hap::characteristic::status_low_battery::StatusLowBatteryCharacteristic;
use hap::characteristic::status_tampered::StatusTamperedCharacteristic;
use hap::characteristic::{AsyncCharacteristicCallbacks, HapCharacteristic};
use hap::pointer::AccessoryPointer;
use hap::server::{IpServer, Server};
use hap::service::HapService;
use hap::storage::{FileStorage, Storage};
use hap::{accessory::HapAccessory, Config as HapConfig, HapType, MacAddress, Pin};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use amt8000::battery::Battery;
use amt8000::config::{Config, ZoneKind, ZoneSpec};
use amt8000::devices::peripheral::{Repeater, Siren};
use amt8000::devices::zone::Zone;
use amt8000::error::Error as PanelError;
use amt8000::metrics;
use amt8000::panel::Panel;
use amt8000::poller::StatusPoller;
use amt8000::state::{alarm_state, AlarmState, PartitionGroups};
use amt8000::status::Status;

const MANUFACTURER: &str = "Intelbras";

/// Pairing state lives next to the process, like any other bridge daemon.
const STORAGE_DIR: &str = "./db";

/// Last value the panel reported for one characteristic, shared between
/// the poller observers and the write handlers.
type SharedState<T> = Arc<Mutex<Option<T>>>;

/// A bypass switch and the last zone-active state backing it.
struct BypassSwitch {
    zone: u8,
    pointer: AccessoryPointer,
    active: SharedState<bool>,
}

/// Pointers to every accessory the poller has to keep fresh.
pub struct Accessories {
    alarm: AccessoryPointer,
    panic_button: AccessoryPointer,
    zones: Arc<Vec<(ZoneSpec, AccessoryPointer)>>,
    bypass_switches: Arc<Vec<BypassSwitch>>,
    sirens: Arc<Vec<(u8, AccessoryPointer)>>,
    repeaters: Arc<Vec<(u8, AccessoryPointer)>>,
    alarm_state: SharedState<AlarmState>,
    siren_on: SharedState<bool>,
}

fn info_for(name: impl Into<String>) -> AccessoryInformation {
    AccessoryInformation {
        name: name.into(),
        manufacturer: MANUFACTURER.into(),
        ..Default::default()
    }
}

/// The resource-busy reply a failed write hands back to the controller.
fn busy_error(err: &PanelError) -> hap::Error {
    std::io::Error::new(std::io::ErrorKind::WouldBlock, err.to_string()).into()
}

/// Build the HAP server and the whole accessory tree, then seed every
/// characteristic from the initial snapshot.
pub async fn build(
    cfg: &Config,
    status: &Status,
    panel: Panel,
    serial_number: Option<String>,
) -> anyhow::Result<(IpServer, Accessories)> {
    let mut storage = FileStorage::new(STORAGE_DIR)
        .await
        .context("could not open accessory storage")?;

    let hap_config = match storage.load_config().await {
        Ok(mut config) => {
            config.redetermine_ip();
            storage.save_config(&config).await?;
            config
        }
        Err(_) => {
            let config = HapConfig {
                pin: Pin::new([0, 0, 1, 0, 2, 0, 0, 3])?,
                name: "Alarm Bridge".into(),
                device_id: MacAddress::from([0x02, 0x8f, 0xfe, 0x90, 0x00, 0x09]),
                category: AccessoryCategory::Bridge,
                ..Default::default()
            };
            storage.save_config(&config).await?;
            config
        }
    };

    let server = IpServer::new(hap_config, storage)
        .await
        .context("could not create the accessory server")?;

    let bridge = BridgeAccessory::new(1, info_for("Alarm Bridge"))?;
    server.add_accessory(bridge).await?;

    let groups = Arc::new(cfg.groups());
    let alarm_state_cell: SharedState<AlarmState> = Arc::new(Mutex::new(None));
    let siren_on: SharedState<bool> = Arc::new(Mutex::new(None));

    // Security system
    let mut alarm = SecuritySystemAccessory::new(
        2,
        AccessoryInformation {
            name: "Alarm".into(),
            manufacturer: MANUFACTURER.into(),
            model: status.model.clone(),
            firmware_revision: status.version.clone(),
            serial_number: serial_number.unwrap_or_default(),
            ..Default::default()
        },
    )?;
    alarm.security_system.status_tampered = Some(StatusTamperedCharacteristic::new(101, 2));
    alarm.security_system.status_fault = Some(StatusFaultCharacteristic::new(102, 2));
    {
        let panel = panel.clone();
        let groups = groups.clone();
        let state_cell = alarm_state_cell.clone();
        alarm
            .security_system
            .security_system_target_state
            .on_update_async(Some(move |current: u8, new: u8| {
                let panel = panel.clone();
                let groups = groups.clone();
                let state_cell = state_cell.clone();
                async move {
                    if current == new {
                        return Ok(());
                    }
                    // A write that restates the panel's current mode is a
                    // no-op, our own target-state mirroring included.
                    {
                        let state = state_cell.lock().await;
                        if state.and_then(|s| s.current_state_value()) == Some(new) {
                            return Ok(());
                        }
                    }
                    let result = match new {
                        0 => panel.arm_all(&groups.stay).await,
                        1 => panel.arm_all(&groups.away).await,
                        2 => panel.arm_all(&groups.night).await,
                        3 => panel.disarm(0).await,
                        other => {
                            warn!("unsupported target state: {other}");
                            return Ok(());
                        }
                    };
                    match result {
                        Ok(()) => Ok(()),
                        Err(err) => {
                            error!("could not change alarm state: {err}");
                            Err(busy_error(&err))
                        }
                    }
                }
                .boxed()
            }));
    }
    let alarm = server.add_accessory(alarm).await?;

    // Panic switch
    let mut panic_button = SwitchAccessory::new(3, info_for("Trigger panic"))?;
    {
        let panel = panel.clone();
        let siren_cell = siren_on.clone();
        panic_button
            .switch
            .power_state
            .on_update_async(Some(move |current: bool, on: bool| {
                let panel = panel.clone();
                let siren_cell = siren_cell.clone();
                async move {
                    if current == on {
                        return Ok(());
                    }
                    {
                        let siren = siren_cell.lock().await;
                        if *siren == Some(on) {
                            return Ok(());
                        }
                    }
                    let result = if on {
                        warn!("triggering a panic!");
                        panel.panic().await
                    } else {
                        panel.disarm(0).await
                    };
                    match result {
                        Ok(()) => Ok(()),
                        Err(err) => {
                            error!("could not toggle panic: {err}");
                            Err(busy_error(&err))
                        }
                    }
                }
                .boxed()
            }));
    }
    let panic_button = server.add_accessory(panic_button).await?;

    // Zone sensors and their bypass switches
    let mut zones = Vec::new();
    let mut bypass_switches = Vec::new();
    for spec in cfg.all_zones() {
        let id = 100 + spec.number as u64;
        let pointer = match spec.kind {
            ZoneKind::Motion => {
                let mut sensor = MotionSensorAccessory::new(id, info_for(spec.name.clone()))?;
                sensor.motion_sensor.status_tampered =
                    Some(StatusTamperedCharacteristic::new(101, id));
                sensor.motion_sensor.status_low_battery =
                    Some(StatusLowBatteryCharacteristic::new(102, id));
                server.add_accessory(sensor).await?
            }
            ZoneKind::Contact => {
                let mut sensor = ContactSensorAccessory::new(id, info_for(spec.name.clone()))?;
                sensor.contact_sensor.status_tampered =
                    Some(StatusTamperedCharacteristic::new(101, id));
                sensor.contact_sensor.status_low_battery =
                    Some(StatusLowBatteryCharacteristic::new(102, id));
                server.add_accessory(sensor).await?
            }
        };

        if spec.allow_bypass {
            let mut switch = SwitchAccessory::new(
                400 + spec.number as u64,
                info_for(format!("{} bypass", spec.name)),
            )?;
            let panel = panel.clone();
            let number = spec.number;
            let active: SharedState<bool> = Arc::new(Mutex::new(None));
            let active_cell = active.clone();
            switch
                .switch
                .power_state
                .on_update_async(Some(move |current: bool, on: bool| {
                    let panel = panel.clone();
                    let active_cell = active_cell.clone();
                    async move {
                        if current == on {
                            return Ok(());
                        }
                        {
                            let active = active_cell.lock().await;
                            if *active == Some(on) {
                                return Ok(());
                            }
                        }
                        // Switch ON means the zone participates; OFF
                        // bypasses it.
                        match panel.bypass(number, !on).await {
                            Ok(()) => Ok(()),
                            Err(err) => {
                                error!("could not set bypass on zone {number}: {err}");
                                Err(busy_error(&err))
                            }
                        }
                    }
                    .boxed()
                }));
            let pointer = server.add_accessory(switch).await?;
            bypass_switches.push(BypassSwitch {
                zone: number,
                pointer,
                active,
            });
        }

        zones.push((spec, pointer));
    }

    // Sirens and repeaters show up as contact sensors that carry the
    // tamper and battery characteristics.
    let mut sirens = Vec::new();
    for (i, &number) in cfg.sirens.iter().enumerate() {
        let id = 200 + i as u64;
        let mut sensor = ContactSensorAccessory::new(id, info_for(format!("Siren {number}")))?;
        sensor.contact_sensor.status_tampered = Some(StatusTamperedCharacteristic::new(101, id));
        sensor.contact_sensor.status_low_battery =
            Some(StatusLowBatteryCharacteristic::new(102, id));
        sirens.push((number, server.add_accessory(sensor).await?));
    }

    let mut repeaters = Vec::new();
    for (i, &number) in cfg.repeaters.iter().enumerate() {
        let id = 300 + i as u64;
        let mut sensor = ContactSensorAccessory::new(id, info_for(format!("Repeater {number}")))?;
        sensor.contact_sensor.status_tampered = Some(StatusTamperedCharacteristic::new(101, id));
        sensor.contact_sensor.status_low_battery =
            Some(StatusLowBatteryCharacteristic::new(102, id));
        repeaters.push((number, server.add_accessory(sensor).await?));
    }

    info!(
        "accessories ready: {} zones, {} bypass switches, {} sirens, {} repeaters",
        zones.len(),
        bypass_switches.len(),
        sirens.len(),
        repeaters.len(),
    );

    let accessories = Accessories {
        alarm,
        panic_button,
        zones: Arc::new(zones),
        bypass_switches: Arc::new(bypass_switches),
        sirens: Arc::new(sirens),
        repeaters: Arc::new(repeaters),
        alarm_state: alarm_state_cell,
        siren_on,
    };

    sync_initial(&accessories, status, &groups).await;

    Ok((server, accessories))
}

/// Push the first snapshot into every characteristic, target state
/// included, so controllers never see a library default.
async fn sync_initial(accessories: &Accessories, status: &Status, groups: &PartitionGroups) {
    let state = alarm_state(status, groups);
    *accessories.alarm_state.lock().await = Some(state);
    info!("initial alarm state: {}", state.as_str());
    update_alarm_current(&accessories.alarm, state).await;
    if let Some(value) = state.current_state_value() {
        if value <= 3 {
            set_value(
                &accessories.alarm,
                HapType::SecuritySystem,
                HapType::SecuritySystemTargetState,
                json!(value),
            )
            .await;
        }
    }
    update_alarm_tamper(&accessories.alarm, status.tamper).await;
    update_alarm_battery(&accessories.alarm, status.battery).await;

    *accessories.siren_on.lock().await = Some(status.siren);
    set_value(
        &accessories.panic_button,
        HapType::Switch,
        HapType::PowerState,
        json!(status.siren),
    )
    .await;

    for (spec, pointer) in accessories.zones.iter() {
        let zone = &status.zones[spec.number as usize - 1];
        update_zone_sensor(spec, pointer, zone).await;
    }
    for switch in accessories.bypass_switches.iter() {
        let zone = &status.zones[switch.zone as usize - 1];
        let active = !zone.anulated;
        *switch.active.lock().await = Some(active);
        set_value(
            &switch.pointer,
            HapType::Switch,
            HapType::PowerState,
            json!(active),
        )
        .await;
    }
    for (number, pointer) in accessories.sirens.iter() {
        let siren = &status.sirens[*number as usize - 1];
        update_peripheral(&format!("Siren {number}"), pointer, siren.tamper, siren.low_battery)
            .await;
    }
    for (number, pointer) in accessories.repeaters.iter() {
        let repeater = &status.repeaters[*number as usize - 1];
        update_peripheral(
            &format!("Repeater {number}"),
            pointer,
            repeater.tamper,
            repeater.low_battery,
        )
        .await;
    }
}

/// Set one characteristic behind an accessory pointer, logging failures.
async fn set_value(
    accessory: &AccessoryPointer,
    service: HapType,
    characteristic: HapType,
    value: serde_json::Value,
) {
    let mut accessory = accessory.lock().await;
    let Some(service) = accessory.get_mut_service(service) else {
        return;
    };
    let Some(characteristic) = service.get_mut_characteristic(characteristic) else {
        return;
    };
    if let Err(err) = characteristic.set_value(value).await {
        warn!("could not update characteristic: {err}");
    }
}

async fn update_alarm_current(alarm: &AccessoryPointer, state: AlarmState) {
    if let Some(value) = state.current_state_value() {
        metrics::ARM_STATE.set(value as f64);
        set_value(
            alarm,
            HapType::SecuritySystem,
            HapType::SecuritySystemCurrentState,
            json!(value),
        )
        .await;
    }
}

async fn update_alarm_tamper(alarm: &AccessoryPointer, tamper: bool) {
    metrics::TAMPER
        .with_label_values(&["Alarm"])
        .set(metrics::bool_value(tamper));
    set_value(
        alarm,
        HapType::SecuritySystem,
        HapType::StatusTampered,
        json!(tamper as u8),
    )
    .await;
}

async fn update_alarm_battery(alarm: &AccessoryPointer, battery: Battery) {
    metrics::BATTERY_LEVEL.set(battery.level() as f64);
    let fault = matches!(battery, Battery::Missing | Battery::ShortCircuited);
    set_value(
        alarm,
        HapType::SecuritySystem,
        HapType::StatusFault,
        json!(fault as u8),
    )
    .await;
}

async fn update_zone_sensor(spec: &ZoneSpec, pointer: &AccessoryPointer, zone: &Zone) {
    metrics::OPEN
        .with_label_values(&[spec.name.as_str()])
        .set(metrics::bool_value(zone.open));
    metrics::VIOLATED
        .with_label_values(&[spec.name.as_str()])
        .set(metrics::bool_value(zone.violated));
    metrics::BYPASSED
        .with_label_values(&[spec.name.as_str()])
        .set(metrics::bool_value(zone.anulated));

    let (service, state_characteristic, state_value) = match spec.kind {
        ZoneKind::Motion => (
            HapType::MotionSensor,
            HapType::MotionDetected,
            json!(zone.is_open()),
        ),
        ZoneKind::Contact => (
            HapType::ContactSensor,
            HapType::ContactSensorState,
            json!(zone.is_open() as u8),
        ),
    };
    set_value(pointer, service, state_characteristic, state_value).await;
    set_value(pointer, service, HapType::StatusTampered, json!(zone.tamper as u8)).await;
    set_value(
        pointer,
        service,
        HapType::StatusLowBattery,
        json!(zone.low_battery as u8),
    )
    .await;
}

async fn update_peripheral(name: &str, pointer: &AccessoryPointer, tamper: bool, low_battery: bool) {
    metrics::TAMPER
        .with_label_values(&[name])
        .set(metrics::bool_value(tamper));
    set_value(
        pointer,
        HapType::ContactSensor,
        HapType::StatusTampered,
        json!(tamper as u8),
    )
    .await;
    set_value(
        pointer,
        HapType::ContactSensor,
        HapType::StatusLowBattery,
        json!(low_battery as u8),
    )
    .await;
}

#[derive(Default)]
struct LastAlarm {
    tamper: Option<bool>,
    battery: Option<Battery>,
}

/// Wire every accessory to the status poller.
///
/// Each observer remembers what it last published and only touches its
/// characteristics on change, so a failed poll or an unchanged snapshot is
/// a no-op for HomeKit.
pub fn register_observers(
    poller: &mut StatusPoller,
    accessories: Accessories,
    groups: Arc<PartitionGroups>,
) {
    // Alarm state, tamper, battery
    let alarm = accessories.alarm.clone();
    let state_cell = accessories.alarm_state.clone();
    let last = Arc::new(Mutex::new(LastAlarm::default()));
    poller.observe(move |status| {
        let alarm = alarm.clone();
        let groups = groups.clone();
        let state_cell = state_cell.clone();
        let last = last.clone();
        async move {
            let state = alarm_state(&status, &groups);
            let state_changed = {
                let mut cell = state_cell.lock().await;
                if *cell == Some(state) {
                    false
                } else {
                    *cell = Some(state);
                    true
                }
            };
            if state_changed {
                info!("alarm state: {}", state.as_str());
                update_alarm_current(&alarm, state).await;
            }

            let mut last = last.lock().await;
            if last.tamper != Some(status.tamper) {
                last.tamper = Some(status.tamper);
                info!("system tamper: {}", status.tamper);
                update_alarm_tamper(&alarm, status.tamper).await;
            }
            if last.battery != Some(status.battery) {
                last.battery = Some(status.battery);
                info!("battery: {}", status.battery);
                update_alarm_battery(&alarm, status.battery).await;
            }
        }
        .boxed()
    });

    // Panic switch mirrors the siren
    let panic_button = accessories.panic_button.clone();
    let siren_cell = accessories.siren_on.clone();
    poller.observe(move |status| {
        let panic_button = panic_button.clone();
        let siren_cell = siren_cell.clone();
        async move {
            let changed = {
                let mut siren = siren_cell.lock().await;
                if *siren == Some(status.siren) {
                    false
                } else {
                    *siren = Some(status.siren);
                    true
                }
            };
            if changed {
                set_value(
                    &panic_button,
                    HapType::Switch,
                    HapType::PowerState,
                    json!(status.siren),
                )
                .await;
            }
        }
        .boxed()
    });

    // Zone sensors and bypass switches
    let zones = accessories.zones.clone();
    let bypass_switches = accessories.bypass_switches.clone();
    let last_zones = Arc::new(Mutex::new(HashMap::<u8, Zone>::new()));
    poller.observe(move |status| {
        let zones = zones.clone();
        let bypass_switches = bypass_switches.clone();
        let last_zones = last_zones.clone();
        async move {
            {
                let mut last = last_zones.lock().await;
                for (spec, pointer) in zones.iter() {
                    let zone = &status.zones[spec.number as usize - 1];
                    if last.get(&spec.number) == Some(zone) {
                        continue;
                    }
                    last.insert(spec.number, zone.clone());

                    info!(
                        "zone {} ({}): open={} violated={} bypassed={}",
                        zone.number, spec.name, zone.open, zone.violated, zone.anulated,
                    );
                    update_zone_sensor(spec, pointer, zone).await;
                }
            }

            for switch in bypass_switches.iter() {
                let zone = &status.zones[switch.zone as usize - 1];
                let active = !zone.anulated;
                let changed = {
                    let mut cell = switch.active.lock().await;
                    if *cell == Some(active) {
                        false
                    } else {
                        *cell = Some(active);
                        true
                    }
                };
                if changed {
                    set_value(
                        &switch.pointer,
                        HapType::Switch,
                        HapType::PowerState,
                        json!(active),
                    )
                    .await;
                }
            }
        }
        .boxed()
    });

    // Sirens
    let sirens = accessories.sirens.clone();
    let last_sirens = Arc::new(Mutex::new(HashMap::<u8, Siren>::new()));
    poller.observe(move |status| {
        let sirens = sirens.clone();
        let last_sirens = last_sirens.clone();
        async move {
            let mut last = last_sirens.lock().await;
            for (number, pointer) in sirens.iter() {
                let siren = &status.sirens[*number as usize - 1];
                if last.get(number) == Some(siren) {
                    continue;
                }
                last.insert(*number, siren.clone());
                update_peripheral(
                    &format!("Siren {number}"),
                    pointer,
                    siren.tamper,
                    siren.low_battery,
                )
                .await;
            }
        }
        .boxed()
    });

    // Repeaters
    let repeaters = accessories.repeaters.clone();
    let last_repeaters = Arc::new(Mutex::new(HashMap::<u8, Repeater>::new()));
    poller.observe(move |status| {
        let repeaters = repeaters.clone();
        let last_repeaters = last_repeaters.clone();
        async move {
            let mut last = last_repeaters.lock().await;
            for (number, pointer) in repeaters.iter() {
                let repeater = &status.repeaters[*number as usize - 1];
                if last.get(number) == Some(repeater) {
                    continue;
                }
                last.insert(*number, repeater.clone());
                update_peripheral(
                    &format!("Repeater {number}"),
                    pointer,
                    repeater.tamper,
                    repeater.low_battery,
                )
                .await;
            }
        }
        .boxed()
    });
}
