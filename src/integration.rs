use std::sync::Arc;

use tracing::{debug, warn};

use crate::client::XeniaClient;
use crate::config::{ConnectionConfig, Settings};
use crate::coordinator::{Coordinator, CoordinatorBuilder};
use crate::entity::{CoffeeSwitch, EntityRef, SensorKind, TemperatureSensor};
use crate::Result;

pub const DOMAIN: &str = "xenia";
pub const ENTRY_TITLE: &str = "Xenia Coffee Machine";

/// One configured machine: its coordinator and the entities built on it.
pub struct Integration {
    config: ConnectionConfig,
    coordinator: Coordinator,
    switch: CoffeeSwitch,
    group_temperature: TemperatureSensor,
    boiler_temperature: TemperatureSensor,
}

impl Integration {
    pub async fn setup(config: &ConnectionConfig, settings: &Settings) -> Result<Self> {
        Self::setup_with(config, settings, |builder| builder).await
    }

    /// Like [`Integration::setup`], letting the caller register coordinator
    /// callbacks before the first refresh runs.
    pub async fn setup_with(
        config: &ConnectionConfig,
        settings: &Settings,
        configure: impl FnOnce(CoordinatorBuilder) -> CoordinatorBuilder,
    ) -> Result<Self> {
        let mut client = XeniaClient::builder(config.host()).timeout(settings.request_timeout);
        if let Some((mode, path)) = &settings.message_log {
            client = client.message_log(*mode, path.clone());
        }
        let client = Arc::new(client.build()?);

        let builder = Coordinator::builder(client)
            .update_interval(settings.update_interval)
            .refresh_delay(settings.refresh_delay);
        let coordinator = configure(builder).start().await.inspect_err(|e| {
            warn!(host = config.host(), error = %e, "setup failed");
        })?;

        debug!(host = config.host(), "integration ready");
        Ok(Self {
            config: config.clone(),
            switch: CoffeeSwitch::new(coordinator.clone()),
            group_temperature: TemperatureSensor::new(coordinator.clone(), SensorKind::Group),
            boiler_temperature: TemperatureSensor::new(coordinator.clone(), SensorKind::Boiler),
            coordinator,
        })
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub fn switch(&self) -> &CoffeeSwitch {
        &self.switch
    }

    pub fn sensor(&self, kind: SensorKind) -> &TemperatureSensor {
        match kind {
            SensorKind::Group => &self.group_temperature,
            SensorKind::Boiler => &self.boiler_temperature,
        }
    }

    pub fn entities(&self) -> Vec<EntityRef> {
        vec![
            EntityRef::Switch(self.switch.clone()),
            EntityRef::Sensor(self.group_temperature.clone()),
            EntityRef::Sensor(self.boiler_temperature.clone()),
        ]
    }

    /// Hand the entities to the host's registration callback.
    pub fn register(&self, add_entities: impl FnOnce(Vec<EntityRef>)) {
        add_entities(self.entities());
    }

    pub async fn teardown(self) -> bool {
        let stopped = self.coordinator.shutdown().await;
        debug!(host = self.config.host(), stopped, "integration unloaded");
        stopped
    }
}
