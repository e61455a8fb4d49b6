use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::device_status::{BatteryState, DeviceStatus};

/// One row per host id (C3's durable half): the last reported `DeviceStatus`
/// plus the opaque SEAS state blob. Created lazily on first contact, updated
/// at the end of every request, never deleted by the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct HostStatusRow {
    pub host_id: String,
    pub on_ac_power: bool,
    pub on_usb_power: bool,
    pub battery_charge_pct: f64,
    pub battery_state: i64,
    pub battery_temperature_celsius: f64,
    pub wifi_online: bool,
    pub user_active: bool,
    pub last_update_time: f64,
    pub mge_sched_data: String,
}

impl HostStatusRow {
    pub fn empty(host_id: &str) -> Self {
        Self {
            host_id: host_id.to_string(),
            on_ac_power: false,
            on_usb_power: false,
            battery_charge_pct: 0.0,
            battery_state: 0,
            battery_temperature_celsius: 0.0,
            wifi_online: false,
            user_active: false,
            last_update_time: 0.0,
            mge_sched_data: String::new(),
        }
    }

    /// Build a row from a fresh device status report, carrying over the
    /// caller-supplied blob and report time.
    pub fn from_status(host_id: &str, status: &DeviceStatus, mge_sched_data: String, last_update_time: f64) -> Self {
        Self {
            host_id: host_id.to_string(),
            on_ac_power: status.on_ac_power,
            on_usb_power: status.on_usb_power,
            battery_charge_pct: status.battery_charge_pct,
            battery_state: battery_state_to_i64(status.battery_state),
            battery_temperature_celsius: status.battery_temperature_celsius,
            wifi_online: status.wifi_online,
            user_active: status.user_active,
            last_update_time,
            mge_sched_data,
        }
    }
}

fn battery_state_to_i64(state: BatteryState) -> i64 {
    match state {
        BatteryState::Unknown => 0,
        BatteryState::Discharging => 1,
        BatteryState::Charging => 2,
        BatteryState::Full => 3,
        BatteryState::Overheated => 4,
    }
}

/// A historical work unit (C4, read-only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PastJob {
    pub id: String,
    pub target_nresults: i64,
    pub delay_bound: f64,
    pub mod_time: f64,
}

/// A historical result belonging to some `PastJob` (C4, read-only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PastResult {
    pub id: String,
    pub workunit_id: String,
    pub sent_time: f64,
    pub received_time: Option<f64>,
    pub initial_battery_charge_pct: f64,
    pub final_battery_charge_pct: f64,
    pub outcome: String,
    pub server_state: String,
    pub host_id: String,
}

impl PastResult {
    pub fn is_success(&self) -> bool {
        self.outcome == "success"
    }

    pub fn is_in_progress(&self) -> bool {
        self.server_state == "in_progress"
    }
}
