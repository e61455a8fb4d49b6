//! In-memory and on-wire representation of a device's power/network/user
//! state (C1), plus its permissive XML codec.

use serde::{Deserialize, Serialize};

use crate::error::SchedulerError;

/// Battery charging state, as reported by the client's power management API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatteryState {
    Unknown,
    Discharging,
    Charging,
    Full,
    Overheated,
}

impl Default for BatteryState {
    fn default() -> Self {
        BatteryState::Unknown
    }
}

impl BatteryState {
    fn from_wire_int(n: i32) -> Self {
        match n {
            1 => BatteryState::Discharging,
            2 => BatteryState::Charging,
            3 => BatteryState::Full,
            4 => BatteryState::Overheated,
            _ => BatteryState::Unknown,
        }
    }

    fn to_wire_int(self) -> i32 {
        match self {
            BatteryState::Unknown => 0,
            BatteryState::Discharging => 1,
            BatteryState::Charging => 2,
            BatteryState::Full => 3,
            BatteryState::Overheated => 4,
        }
    }
}

/// A device's power/network/user state at the moment a scheduler request was
/// made. Percentages are clamped to `[0, 100]`; temperature may be zero when
/// unreported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub on_ac_power: bool,
    pub on_usb_power: bool,
    pub battery_charge_pct: f64,
    pub battery_state: BatteryState,
    pub battery_temperature_celsius: f64,
    pub wifi_online: bool,
    pub user_active: bool,
    pub device_name: String,
}

impl Default for DeviceStatus {
    fn default() -> Self {
        Self {
            on_ac_power: false,
            on_usb_power: false,
            battery_charge_pct: 0.0,
            battery_state: BatteryState::Unknown,
            battery_temperature_celsius: 0.0,
            wifi_online: false,
            user_active: false,
            device_name: String::new(),
        }
    }
}

const MAX_DEVICE_NAME_LEN: usize = 255;

impl DeviceStatus {
    /// Clamp `battery_charge_pct` into `[0, 100]` and truncate `device_name`
    /// to the wire limit. Call after constructing from untrusted input.
    pub fn normalize(&mut self) {
        self.battery_charge_pct = self.battery_charge_pct.clamp(0.0, 100.0);
        if self.device_name.len() > MAX_DEVICE_NAME_LEN {
            let boundary = (0..=MAX_DEVICE_NAME_LEN)
                .rev()
                .find(|&i| self.device_name.is_char_boundary(i))
                .unwrap_or(0);
            self.device_name.truncate(boundary);
        }
    }

    /// Parse a `<device_status>...</device_status>` element. Permissive:
    /// unknown child tags are ignored, parsing stops at `</device_status>`.
    /// Returns a parse error if EOF is reached before the closing tag.
    pub fn parse_xml(xml: &str) -> Result<Self, SchedulerError> {
        let start = xml
            .find("<device_status>")
            .ok_or_else(|| SchedulerError::ParseError("missing <device_status> tag".into()))?;
        let body_start = start + "<device_status>".len();

        let close = xml[body_start..].find("</device_status>").ok_or_else(|| {
            SchedulerError::ParseError("EOF before </device_status>".into())
        })?;
        let body = &xml[body_start..body_start + close];

        let mut status = DeviceStatus::default();
        for (tag, value) in iter_tags(body) {
            match tag {
                "on_ac_power" => status.on_ac_power = parse_wire_bool(value),
                "on_usb_power" => status.on_usb_power = parse_wire_bool(value),
                "battery_charge_pct" => {
                    status.battery_charge_pct = value.trim().parse().unwrap_or(0.0)
                }
                "battery_state" => {
                    status.battery_state =
                        BatteryState::from_wire_int(value.trim().parse().unwrap_or(0))
                }
                "battery_temperature_celsius" => {
                    status.battery_temperature_celsius = value.trim().parse().unwrap_or(0.0)
                }
                "wifi_online" => status.wifi_online = parse_wire_bool(value),
                "user_active" => status.user_active = parse_wire_bool(value),
                "device_name" => status.device_name = value.trim().to_string(),
                _ => {} // unknown tags are ignored, per the permissive-parser contract
            }
        }

        status.normalize();
        Ok(status)
    }

    /// Serialize to the `<device_status>` wire element.
    pub fn to_xml(&self) -> String {
        format!(
            "    <device_status>\n\
             \x20       <on_ac_power>{}</on_ac_power>\n\
             \x20       <on_usb_power>{}</on_usb_power>\n\
             \x20       <battery_charge_pct>{}</battery_charge_pct>\n\
             \x20       <battery_state>{}</battery_state>\n\
             \x20       <battery_temperature_celsius>{}</battery_temperature_celsius>\n\
             \x20       <wifi_online>{}</wifi_online>\n\
             \x20       <user_active>{}</user_active>\n\
             \x20       <device_name>{}</device_name>\n\
             \x20   </device_status>\n",
            wire_bool(self.on_ac_power),
            wire_bool(self.on_usb_power),
            self.battery_charge_pct,
            self.battery_state.to_wire_int(),
            self.battery_temperature_celsius,
            wire_bool(self.wifi_online),
            wire_bool(self.user_active),
            self.device_name,
        )
    }
}

fn wire_bool(b: bool) -> u8 {
    if b {
        1
    } else {
        0
    }
}

fn parse_wire_bool(value: &str) -> bool {
    value.trim() != "0"
}

/// Yield `(tag, inner_text)` for each `<tag>...</tag>` element found in
/// `body`, skipping anything that doesn't parse as a well-formed pair.
fn iter_tags(body: &str) -> impl Iterator<Item = (&str, &str)> {
    let mut rest = body;
    std::iter::from_fn(move || loop {
        let open_start = rest.find('<')?;
        let after_lt = &rest[open_start + 1..];
        let open_end = after_lt.find('>')?;
        let tag = &after_lt[..open_end];
        let content_start = open_start + 1 + open_end + 1;
        let close_tag = format!("</{tag}>");
        let content = &rest[content_start..];
        match content.find(&close_tag) {
            Some(close_offset) => {
                let value = &content[..close_offset];
                rest = &content[close_offset + close_tag.len()..];
                return Some((tag, value));
            }
            None => {
                // malformed element, skip past this opening tag and keep scanning
                rest = content;
            }
        }
    })
}
