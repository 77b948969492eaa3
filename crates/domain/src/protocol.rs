//! Line protocol spoken by the gateway.
//!
//! Pure functions operating on single `&str` lines; no socket needed. Every
//! line is `<prefix>:<payload>` and the prefix selects the record grammar:
//!
//! | Prefix | Record | Payload |
//! |--------|--------|---------|
//! | `H` | [`DeviceInfo`] | `serial[;room[;firmware]]` |
//! | `M` | [`Metadata`] | `serial;type[;room[;name]]` |
//! | `C` | [`ConfigurationRecord`] | `serial;type[;room[;k=v,k=v,...]]` |
//! | `L` | [`LiveState`] | `serial,mode,measured,setpoint` entries separated by `;` |
//! | `S` | [`StatusRecord`] | `dc=<0..100>;mem=<slots>[;discarded=<0/1>]` |
//!
//! An `L:` line always closes a poll batch. Empty optional fields decode to
//! `None`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::device::{DeviceType, Mode, Serial};
use crate::error::DecodeError;

/// Request line asking the gateway for a full state batch.
pub const POLL_REQUEST: &str = "l:";

const LIVE_STATE_PREFIX: &str = "L:";

/// Hello line: the gateway's own serial, room and firmware, sent first in
/// every batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub serial: Serial,
    pub room: Option<String>,
    pub firmware: Option<String>,
}

/// Type, room and display name of a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub serial: Serial,
    pub device_type: DeviceType,
    pub room: Option<String>,
    pub name: Option<String>,
}

/// Full static configuration of a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationRecord {
    pub serial: Serial,
    pub device_type: DeviceType,
    pub room: Option<String>,
    pub params: BTreeMap<String, String>,
}

/// One device's entry in a live-state record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveEntry {
    pub serial: Serial,
    pub mode: Option<Mode>,
    pub measured: Option<f64>,
    pub setpoint: Option<f64>,
}

/// Live values of every device the gateway currently reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LiveState {
    pub entries: Vec<LiveEntry>,
}

/// Radio duty cycle, free command slots and the verdict on the last command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub duty_cycle: u8,
    pub free_memory_slots: u32,
    pub discarded: bool,
}

/// A single decoded line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProtocolRecord {
    DeviceInfo(DeviceInfo),
    Metadata(Metadata),
    Configuration(ConfigurationRecord),
    LiveState(LiveState),
    Status(StatusRecord),
}

impl ProtocolRecord {
    /// Short name of the record kind, for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DeviceInfo(_) => DEVICE_INFO,
            Self::Metadata(_) => METADATA,
            Self::Configuration(_) => CONFIGURATION,
            Self::LiveState(_) => LIVE_STATE,
            Self::Status(_) => STATUS,
        }
    }

    /// Whether this record closes a poll batch.
    #[must_use]
    pub fn is_batch_terminal(&self) -> bool {
        matches!(self, Self::LiveState(_))
    }
}

const DEVICE_INFO: &str = "device-info";
const METADATA: &str = "metadata";
const CONFIGURATION: &str = "configuration";
const LIVE_STATE: &str = "live-state";
const STATUS: &str = "status";

/// Decode one line received from the gateway.
///
/// Returns `Ok(None)` for blank lines, lines without a prefix and unknown
/// prefixes; the caller decides whether those are worth logging.
///
/// # Errors
///
/// Returns [`DecodeError`] when the prefix is known but the payload does not
/// follow that record's grammar.
pub fn decode(line: &str) -> Result<Option<ProtocolRecord>, DecodeError> {
    let Some((prefix, payload)) = line.trim().split_once(':') else {
        return Ok(None);
    };

    let record = match prefix {
        "H" => ProtocolRecord::DeviceInfo(decode_device_info(payload)?),
        "M" => ProtocolRecord::Metadata(decode_metadata(payload)?),
        "C" => ProtocolRecord::Configuration(decode_configuration(payload)?),
        "L" => ProtocolRecord::LiveState(decode_live_state(payload)?),
        "S" => ProtocolRecord::Status(decode_status(payload)?),
        _ => return Ok(None),
    };
    Ok(Some(record))
}

/// Cheap check used by the read loop to find the end of a batch without
/// decoding it.
#[must_use]
pub fn is_batch_terminator(line: &str) -> bool {
    line.trim_start().starts_with(LIVE_STATE_PREFIX)
}

fn decode_device_info(payload: &str) -> Result<DeviceInfo, DecodeError> {
    let mut fields = payload.splitn(3, ';');
    let serial = required_serial(fields.next(), DEVICE_INFO)?;
    Ok(DeviceInfo {
        serial,
        room: optional(fields.next()),
        firmware: optional(fields.next()),
    })
}

fn decode_metadata(payload: &str) -> Result<Metadata, DecodeError> {
    let mut fields = payload.splitn(4, ';');
    let serial = required_serial(fields.next(), METADATA)?;
    let device_type = required_type(fields.next(), METADATA)?;
    Ok(Metadata {
        serial,
        device_type,
        room: optional(fields.next()),
        name: optional(fields.next()),
    })
}

fn decode_configuration(payload: &str) -> Result<ConfigurationRecord, DecodeError> {
    let mut fields = payload.splitn(4, ';');
    let serial = required_serial(fields.next(), CONFIGURATION)?;
    let device_type = required_type(fields.next(), CONFIGURATION)?;
    let room = optional(fields.next());

    let mut params = BTreeMap::new();
    for pair in fields.next().unwrap_or_default().split(',') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        match pair.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                params.insert(key.trim().to_string(), value.trim().to_string());
            }
            _ => {
                return Err(DecodeError::MalformedEntry {
                    record: CONFIGURATION,
                    entry: pair.to_string(),
                });
            }
        }
    }

    Ok(ConfigurationRecord {
        serial,
        device_type,
        room,
        params,
    })
}

fn decode_live_state(payload: &str) -> Result<LiveState, DecodeError> {
    let mut entries = Vec::new();
    for entry in payload.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let fields: Vec<&str> = entry.split(',').map(str::trim).collect();
        let [serial, mode, measured, setpoint] = fields.as_slice() else {
            return Err(DecodeError::MalformedEntry {
                record: LIVE_STATE,
                entry: entry.to_string(),
            });
        };
        entries.push(LiveEntry {
            serial: Serial::parse(serial)?,
            mode: if mode.is_empty() {
                None
            } else {
                Some(mode.parse()?)
            },
            measured: optional_float(measured, "measured")?,
            setpoint: optional_float(setpoint, "setpoint")?,
        });
    }
    Ok(LiveState { entries })
}

fn decode_status(payload: &str) -> Result<StatusRecord, DecodeError> {
    let mut duty_cycle = None;
    let mut free_memory_slots = None;
    let mut discarded = false;

    for pair in payload.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(DecodeError::MalformedEntry {
                record: STATUS,
                entry: pair.to_string(),
            });
        };
        let value = value.trim();
        match key.trim() {
            "dc" => {
                let parsed = value
                    .parse::<u8>()
                    .ok()
                    .filter(|dc| *dc <= 100)
                    .ok_or_else(|| invalid_number("dc", value))?;
                duty_cycle = Some(parsed);
            }
            "mem" => {
                let parsed = value
                    .parse::<u32>()
                    .map_err(|_| invalid_number("mem", value))?;
                free_memory_slots = Some(parsed);
            }
            "discarded" => {
                discarded = match value {
                    "0" => false,
                    "1" => true,
                    other => return Err(invalid_number("discarded", other)),
                };
            }
            // Newer firmware appends fields we do not track.
            _ => {}
        }
    }

    Ok(StatusRecord {
        duty_cycle: duty_cycle.ok_or(DecodeError::MissingField {
            record: STATUS,
            field: "dc",
        })?,
        free_memory_slots: free_memory_slots.ok_or(DecodeError::MissingField {
            record: STATUS,
            field: "mem",
        })?,
        discarded,
    })
}

fn optional(field: Option<&str>) -> Option<String> {
    field
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn required_serial(field: Option<&str>, record: &'static str) -> Result<Serial, DecodeError> {
    let raw = field.map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return Err(DecodeError::MissingField {
            record,
            field: "serial",
        });
    }
    Serial::parse(raw)
}

fn required_type(field: Option<&str>, record: &'static str) -> Result<DeviceType, DecodeError> {
    let raw = field.map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return Err(DecodeError::MissingField {
            record,
            field: "type",
        });
    }
    raw.parse::<u8>()
        .map(DeviceType::from_code)
        .map_err(|_| invalid_number("type", raw))
}

fn optional_float(raw: &str, field: &'static str) -> Result<Option<f64>, DecodeError> {
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .map(Some)
        .ok_or_else(|| invalid_number(field, raw))
}

fn invalid_number(field: &'static str, value: &str) -> DecodeError {
    DecodeError::InvalidNumber {
        field,
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_ok(line: &str) -> ProtocolRecord {
        decode(line).unwrap().unwrap()
    }

    // ── Dispatch ────────────────────────────────────────────────────────

    #[test]
    fn should_decode_batch_in_order() {
        let lines = [
            "H:1234;Room1",
            "M:1234;0;;Cube",
            "L:1234,auto,20.5,21.0",
            "S:dc=3;mem=10",
        ];
        let records: Vec<ProtocolRecord> = lines.iter().map(|l| decode_ok(l)).collect();

        assert_eq!(records.len(), 4);
        assert_eq!(records[0].kind(), "device-info");
        assert_eq!(records[1].kind(), "metadata");
        assert_eq!(records[2].kind(), "live-state");
        assert_eq!(records[3].kind(), "status");
        assert!(records[2].is_batch_terminal());
        assert!(!records[0].is_batch_terminal());
    }

    #[test]
    fn should_ignore_unknown_prefix() {
        assert_eq!(decode("X:whatever").unwrap(), None);
        assert_eq!(decode("h:lowercase is a request, not a record").unwrap(), None);
    }

    #[test]
    fn should_ignore_blank_and_prefixless_lines() {
        assert_eq!(decode("").unwrap(), None);
        assert_eq!(decode("   \r").unwrap(), None);
        assert_eq!(decode("no separator here").unwrap(), None);
    }

    #[test]
    fn should_strip_trailing_carriage_return() {
        let record = decode_ok("H:1234;Room1\r");
        let ProtocolRecord::DeviceInfo(info) = record else {
            panic!("expected device info");
        };
        assert_eq!(info.room.as_deref(), Some("Room1"));
    }

    #[test]
    fn should_never_panic_on_arbitrary_input() {
        let fixed = [
            "H:", "M:", "C:", "L:", "S:", ":", "::::", "H;1234", "L:;;;", "L:,,,",
            "L:1234", "S:dc", "S:=", "C:1;x", "M:1;256", "L:1,auto,nan,1", "S:dc=101;mem=1",
            "H:\u{00e9}\u{00e8}", "L:1,auto,1e400,1", "C:1;1;;=",
        ];
        for line in fixed {
            let _ = decode(line);
        }

        // Deterministic pseudo-random lines over the protocol's alphabet.
        let alphabet: Vec<char> = "HMCLS:;,=.-0123456789abcz \r\u{00fc}".chars().collect();
        let mut seed: u64 = 0x2545_F491_4F6C_DD1D;
        for _ in 0..2_000 {
            let mut line = String::new();
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            let len = (seed % 24) as usize;
            for step in 0..len {
                let idx = ((seed >> (step % 48)) as usize + step * 7) % alphabet.len();
                line.push(alphabet[idx]);
            }
            let _ = decode(&line);
        }
    }

    // ── DeviceInfo ──────────────────────────────────────────────────────

    #[test]
    fn should_decode_device_info_with_firmware() {
        let record = decode_ok("H:KEQ0565026;Kitchen;0113");
        assert_eq!(
            record,
            ProtocolRecord::DeviceInfo(DeviceInfo {
                serial: Serial::from("KEQ0565026"),
                room: Some("Kitchen".to_string()),
                firmware: Some("0113".to_string()),
            })
        );
    }

    #[test]
    fn should_decode_device_info_without_room() {
        let ProtocolRecord::DeviceInfo(info) = decode_ok("H:KEQ1") else {
            panic!("expected device info");
        };
        assert_eq!(info.room, None);
        assert_eq!(info.firmware, None);
    }

    #[test]
    fn should_reject_device_info_without_serial() {
        assert_eq!(
            decode("H:;Room1"),
            Err(DecodeError::MissingField {
                record: "device-info",
                field: "serial",
            })
        );
    }

    // ── Metadata ────────────────────────────────────────────────────────

    #[test]
    fn should_decode_metadata_name_with_separators() {
        let ProtocolRecord::Metadata(meta) = decode_ok("M:KEQ1;3;Hall;Hall; north wall") else {
            panic!("expected metadata");
        };
        assert_eq!(meta.device_type, DeviceType::WallMountedThermostat);
        assert_eq!(meta.room.as_deref(), Some("Hall"));
        assert_eq!(meta.name.as_deref(), Some("Hall; north wall"));
    }

    #[test]
    fn should_reject_metadata_with_non_numeric_type() {
        assert!(matches!(
            decode("M:KEQ1;thermostat"),
            Err(DecodeError::InvalidNumber { field: "type", .. })
        ));
    }

    // ── Configuration ───────────────────────────────────────────────────

    #[test]
    fn should_decode_configuration_params() {
        let ProtocolRecord::Configuration(config) =
            decode_ok("C:KEQ1;1;Bath;comfort=21.5, eco=17.0,offset=")
        else {
            panic!("expected configuration");
        };
        assert_eq!(config.device_type, DeviceType::HeatingThermostat);
        assert_eq!(config.room.as_deref(), Some("Bath"));
        assert_eq!(config.params.len(), 3);
        assert_eq!(config.params["comfort"], "21.5");
        assert_eq!(config.params["eco"], "17.0");
        assert_eq!(config.params["offset"], "");
    }

    #[test]
    fn should_decode_configuration_without_params() {
        let ProtocolRecord::Configuration(config) = decode_ok("C:KEQ1;4") else {
            panic!("expected configuration");
        };
        assert_eq!(config.device_type, DeviceType::ShutterContact);
        assert!(config.params.is_empty());
    }

    #[test]
    fn should_reject_configuration_param_without_key() {
        assert!(matches!(
            decode("C:KEQ1;1;;=5"),
            Err(DecodeError::MalformedEntry {
                record: "configuration",
                ..
            })
        ));
    }

    // ── LiveState ───────────────────────────────────────────────────────

    #[test]
    fn should_decode_live_state_entries() {
        let ProtocolRecord::LiveState(live) =
            decode_ok("L:KEQ1,auto,20.5,21.0;KEQ2,manual,,18.0;KEQ3,,,")
        else {
            panic!("expected live state");
        };
        assert_eq!(live.entries.len(), 3);
        assert_eq!(live.entries[0].mode, Some(Mode::Auto));
        assert_eq!(live.entries[0].measured, Some(20.5));
        assert_eq!(live.entries[1].measured, None);
        assert_eq!(live.entries[1].setpoint, Some(18.0));
        assert_eq!(live.entries[2].mode, None);
    }

    #[test]
    fn should_decode_empty_live_state() {
        assert_eq!(
            decode_ok("L:"),
            ProtocolRecord::LiveState(LiveState::default())
        );
    }

    #[test]
    fn should_reject_live_entry_with_wrong_arity() {
        assert!(matches!(
            decode("L:KEQ1,auto,20.5"),
            Err(DecodeError::MalformedEntry {
                record: "live-state",
                ..
            })
        ));
    }

    #[test]
    fn should_reject_non_finite_measurement() {
        assert!(matches!(
            decode("L:KEQ1,auto,NaN,21"),
            Err(DecodeError::InvalidNumber {
                field: "measured",
                ..
            })
        ));
    }

    #[test]
    fn should_reject_unknown_mode() {
        assert_eq!(
            decode("L:KEQ1,eco,1,2"),
            Err(DecodeError::UnknownMode("eco".to_string()))
        );
    }

    #[test]
    fn should_detect_batch_terminator_without_decoding() {
        assert!(is_batch_terminator("L:garbage"));
        assert!(is_batch_terminator("  L:"));
        assert!(!is_batch_terminator("S:dc=3;mem=10"));
    }

    // ── Status ──────────────────────────────────────────────────────────

    #[test]
    fn should_decode_status() {
        assert_eq!(
            decode_ok("S:dc=3;mem=10"),
            ProtocolRecord::Status(StatusRecord {
                duty_cycle: 3,
                free_memory_slots: 10,
                discarded: false,
            })
        );
    }

    #[test]
    fn should_decode_discarded_status_and_ignore_unknown_keys() {
        let ProtocolRecord::Status(status) = decode_ok("S:mem=0;discarded=1;dc=100;rssi=-60")
        else {
            panic!("expected status");
        };
        assert!(status.discarded);
        assert_eq!(status.duty_cycle, 100);
        assert_eq!(status.free_memory_slots, 0);
    }

    #[test]
    fn should_reject_status_without_duty_cycle() {
        assert_eq!(
            decode("S:mem=10"),
            Err(DecodeError::MissingField {
                record: "status",
                field: "dc",
            })
        );
    }

    #[test]
    fn should_reject_duty_cycle_above_hundred() {
        assert!(matches!(
            decode("S:dc=101;mem=10"),
            Err(DecodeError::InvalidNumber { field: "dc", .. })
        ));
    }
}
