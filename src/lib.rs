mod client;
mod config;
mod coordinator;
mod diff;
mod entity;
mod error;
mod integration;
mod logger;
mod protocol;
mod types;

pub use client::{XeniaClient, XeniaClientBuilder, DEFAULT_TIMEOUT};
pub use config::{ConnectionConfig, Settings};
pub use coordinator::{
    Coordinator, CoordinatorBuilder, Phase, RefreshOutcome, DEFAULT_REFRESH_DELAY,
    DEFAULT_UPDATE_INTERVAL,
};
pub use entity::{CoffeeSwitch, Entity, EntityRef, SensorKind, TemperatureSensor};
pub use error::{Error, ErrorInfo, ErrorKind, Result};
pub use integration::{Integration, DOMAIN, ENTRY_TITLE};
pub use logger::MessageLogMode;
pub use protocol::map_status;
pub use types::*;
