use serde_json::Value;

use crate::types::*;

/// Collect `(path, old, new)` for every leaf that differs between two JSON bodies.
pub(crate) fn diff_json(
    previous: &Value,
    current: &Value,
    path_prefix: &str,
    changes: &mut Vec<(String, Value, Value)>,
) {
    match (previous, current) {
        (Value::Object(prev_map), Value::Object(curr_map)) => {
            for (key, curr_val) in curr_map {
                let path = if path_prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{path_prefix}.{key}")
                };
                match prev_map.get(key) {
                    Some(prev_val) => diff_json(prev_val, curr_val, &path, changes),
                    None => changes.push((path, Value::Null, curr_val.clone())),
                }
            }
            for (key, prev_val) in prev_map {
                if !curr_map.contains_key(key) {
                    let path = if path_prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{path_prefix}.{key}")
                    };
                    changes.push((path, prev_val.clone(), Value::Null));
                }
            }
        }
        (prev, curr) if prev != curr => {
            changes.push((path_prefix.to_string(), prev.clone(), curr.clone()));
        }
        _ => {}
    }
}

/// Typed change events between two consecutive appliance states.
pub(crate) fn diff_states(previous: &ApplianceState, current: &ApplianceState) -> Vec<Event> {
    let mut events = Vec::new();

    if previous.is_on != current.is_on {
        events.push(Event::PowerChanged { on: current.is_on });
    }
    if previous.status != current.status {
        events.push(Event::StatusChanged {
            status: current.status,
        });
    }
    if previous.group_temperature != current.group_temperature {
        events.push(Event::GroupTemperatureChanged {
            temp: current.group_temperature,
        });
    }
    if previous.boiler_temperature != current.boiler_temperature {
        events.push(Event::BoilerTemperatureChanged {
            temp: current.boiler_temperature,
        });
    }

    events
}
