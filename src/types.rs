use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::{ErrorInfo, ErrorKind};

/// Temperature stored as Celsius, as reported by the machine's sensors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Temperature(f64);

impl Temperature {
    pub fn from_celsius(c: f64) -> Self {
        Self(c)
    }

    pub fn celsius(&self) -> f64 {
        self.0
    }

    pub fn fahrenheit(&self) -> f64 {
        self.0 * (9.0 / 5.0) + 32.0
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}\u{00b0}C", self.0)
    }
}

/// Machine status as reported in `MA_STATUS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusLabel {
    #[default]
    Off,
    On,
    Eco,
    Unknown,
}

impl StatusLabel {
    /// Total over every code; anything outside 0..=2 is `Unknown`.
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => StatusLabel::Off,
            1 => StatusLabel::On,
            2 => StatusLabel::Eco,
            _ => StatusLabel::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusLabel::Off => "off",
            StatusLabel::On => "on",
            StatusLabel::Eco => "eco",
            StatusLabel::Unknown => "unknown",
        }
    }
}

impl fmt::Display for StatusLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Power command accepted by the control endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    On,
    Off,
}

impl Action {
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            Action::On => "1",
            Action::Off => "0",
        }
    }
}

/// Typed view of one successful status poll. Replaced wholesale on every refresh.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ApplianceState {
    pub raw_status_code: i64,
    pub is_on: bool,
    pub status: StatusLabel,
    pub group_temperature: Option<Temperature>,
    pub boiler_temperature: Option<Temperature>,
}

/// The coordinator's cached view: last good state plus the latest failure, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub state: ApplianceState,
    pub last_updated: DateTime<Utc>,
    pub last_error: Option<ErrorInfo>,
}

impl Snapshot {
    pub fn is_stale(&self) -> bool {
        self.last_error.is_some()
    }
}

/// Events emitted by the coordinator after each refresh.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    PowerChanged { on: bool },
    StatusChanged { status: StatusLabel },
    GroupTemperatureChanged { temp: Option<Temperature> },
    BoilerTemperatureChanged { temp: Option<Temperature> },

    RefreshFailed { kind: ErrorKind, message: String },
    ReauthRequired,
}
