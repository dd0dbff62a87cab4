use serde_json::{json, Value};

use crate::types::*;

pub const OVERVIEW_PATH: &str = "/api/v2/overview";
pub const CONTROL_PATH: &str = "/api/v2/machine/control";

pub const ACCEPT_JSON: &str = "application/json";
// The firmware expects this header even though the body is JSON.
pub const CONTROL_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=UTF-8";

const FIELD_STATUS: &str = "MA_STATUS";
const FIELD_GROUP_TEMP: &str = "BG_SENS_TEMP_A";
const FIELD_BOILER_TEMP: &str = "BB_SENS_TEMP_A";

const MALFORMED_STATUS: i64 = -1;

pub fn control_payload(action: Action) -> Value {
    json!({ "action": action.as_wire_str() })
}

/// Exact bytes the firmware accepts: `{"action": "1"}`, space after the colon.
pub fn control_body(action: Action) -> String {
    format!(r#"{{"action": "{}"}}"#, action.as_wire_str())
}

/// Translate an overview response into typed state. Never fails: a missing
/// status reads as code 0, a malformed one as `Unknown`, and missing or
/// non-numeric temperatures are absent.
pub fn map_status(data: &Value) -> ApplianceState {
    let raw_status_code = data.get(FIELD_STATUS).map(as_code).unwrap_or(0);
    ApplianceState {
        raw_status_code,
        is_on: raw_status_code == 1,
        status: StatusLabel::from_code(raw_status_code),
        group_temperature: temperature(data, FIELD_GROUP_TEMP),
        boiler_temperature: temperature(data, FIELD_BOILER_TEMP),
    }
}

fn as_code(v: &Value) -> i64 {
    if v.is_null() {
        return 0;
    }
    if let Some(code) = v.as_i64() {
        return code;
    }
    // Fractional or non-numeric codes must not alias 0/1/2.
    match v.as_f64() {
        Some(f) if f.fract() == 0.0 => f as i64,
        _ => MALFORMED_STATUS,
    }
}

fn temperature(data: &Value, field: &str) -> Option<Temperature> {
    data.get(field)
        .and_then(|v| v.as_f64())
        .map(Temperature::from_celsius)
}
