//! Host-facing entities: one power switch and two temperature sensors, all
//! projections of the coordinator's snapshot.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::watch;
use tracing::{debug, error};

use crate::coordinator::{Coordinator, RefreshOutcome};
use crate::types::*;

pub const TEMPERATURE_UNIT: &str = "\u{00b0}C";

/// Capabilities the host framework reads from every entity.
pub trait Entity {
    fn coordinator(&self) -> &Coordinator;

    fn unique_id(&self) -> &str;

    fn name(&self) -> &str;

    fn icon(&self) -> Option<&str> {
        None
    }

    /// False while the latest refresh failed; the last good value is still served.
    fn available(&self) -> bool {
        !self.coordinator().snapshot().is_stale()
    }

    fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.coordinator().subscribe()
    }
}

#[derive(Clone)]
pub struct CoffeeSwitch {
    coordinator: Coordinator,
    unique_id: String,
}

impl CoffeeSwitch {
    pub fn new(coordinator: Coordinator) -> Self {
        let unique_id = format!("xenia_coffee_machine_{}", coordinator.client().host());
        Self {
            coordinator,
            unique_id,
        }
    }

    pub fn is_on(&self) -> bool {
        self.coordinator.snapshot().state.is_on
    }

    pub fn status(&self) -> StatusLabel {
        self.coordinator.snapshot().state.status
    }

    pub fn extra_state_attributes(&self) -> Value {
        json!({ "status": self.status().as_str() })
    }

    pub async fn turn_on(&self) {
        self.control(Action::On).await;
    }

    pub async fn turn_off(&self) {
        self.control(Action::Off).await;
    }

    /// Control failures are logged only; the refresh runs either way so the
    /// switch settles on whatever the machine actually reports.
    async fn control(&self, action: Action) {
        if let Err(e) = self.coordinator.client().send_control(action).await {
            error!(action = action.as_wire_str(), error = %e, "error controlling coffee machine");
        }

        match self.coordinator.request_refresh().await {
            Ok(RefreshOutcome::Updated) => {}
            Ok(RefreshOutcome::Coalesced) => debug!("post-command refresh coalesced"),
            Err(e) => debug!(error = %e, "post-command refresh failed"),
        }
    }
}

impl Entity for CoffeeSwitch {
    fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    fn unique_id(&self) -> &str {
        &self.unique_id
    }

    fn name(&self) -> &str {
        "Xenia"
    }

    fn icon(&self) -> Option<&str> {
        Some("mdi:coffee-maker")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    Group,
    Boiler,
}

impl SensorKind {
    pub fn key(&self) -> &'static str {
        match self {
            SensorKind::Group => "group_temperature",
            SensorKind::Boiler => "boiler_temperature",
        }
    }

    fn display_name(&self) -> &'static str {
        match self {
            SensorKind::Group => "Xenia Group Temperature",
            SensorKind::Boiler => "Xenia Boiler Temperature",
        }
    }

    fn read(&self, state: &ApplianceState) -> Option<Temperature> {
        match self {
            SensorKind::Group => state.group_temperature,
            SensorKind::Boiler => state.boiler_temperature,
        }
    }
}

#[derive(Clone)]
pub struct TemperatureSensor {
    coordinator: Coordinator,
    kind: SensorKind,
    unique_id: String,
}

impl TemperatureSensor {
    pub fn new(coordinator: Coordinator, kind: SensorKind) -> Self {
        Self {
            coordinator,
            kind,
            unique_id: format!("xenia_{}", kind.key()),
        }
    }

    pub fn kind(&self) -> SensorKind {
        self.kind
    }

    pub fn value(&self) -> Option<Temperature> {
        self.kind.read(&self.coordinator.snapshot().state)
    }

    pub fn native_value(&self) -> Option<f64> {
        self.value().map(|t| t.celsius())
    }

    pub fn unit_of_measurement(&self) -> &'static str {
        TEMPERATURE_UNIT
    }

    pub fn device_class(&self) -> &'static str {
        "temperature"
    }
}

impl Entity for TemperatureSensor {
    fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    fn unique_id(&self) -> &str {
        &self.unique_id
    }

    fn name(&self) -> &str {
        self.kind.display_name()
    }
}

/// Entity handed to the host's registration callback.
#[derive(Clone)]
pub enum EntityRef {
    Switch(CoffeeSwitch),
    Sensor(TemperatureSensor),
}

impl EntityRef {
    pub fn as_entity(&self) -> &dyn Entity {
        match self {
            EntityRef::Switch(s) => s as &dyn Entity,
            EntityRef::Sensor(s) => s,
        }
    }
}
