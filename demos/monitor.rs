use std::env;

use xenia_coffee::{ConnectionConfig, Integration, SensorKind, Settings};

#[tokio::main]
async fn main() -> xenia_coffee::Result<()> {
    tracing_subscriber::fmt::init();

    let config = match env::args().nth(1) {
        Some(host) => ConnectionConfig::new(host)?,
        None => ConnectionConfig::from_env()?,
    };
    let settings = Settings::from_env();

    println!("Connecting to {}...", config.host());
    let integration = Integration::setup_with(&config, &settings, |builder| {
        builder
            .on_event(|event| println!("{event:?}"))
            .on_snapshot(|snapshot| {
                let state = &snapshot.state;
                let fmt_temp = |t: Option<xenia_coffee::Temperature>| {
                    t.map(|t| t.to_string()).unwrap_or_else(|| "-".to_string())
                };
                println!(
                    "[{}] status: {} | group: {} | boiler: {}{}",
                    snapshot.last_updated.format("%H:%M:%S"),
                    state.status,
                    fmt_temp(state.group_temperature),
                    fmt_temp(state.boiler_temperature),
                    match &snapshot.last_error {
                        Some(err) => format!(" | STALE: {}", err.message),
                        None => String::new(),
                    },
                );
            })
    })
    .await?;

    integration.register(|entities| {
        for entity in &entities {
            let entity = entity.as_entity();
            println!("registered {} ({})", entity.name(), entity.unique_id());
        }
    });
    println!(
        "Boiler now {:?}. Polling every {:?}, Ctrl-C to stop.",
        integration.sensor(SensorKind::Boiler).value(),
        settings.update_interval
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        eprintln!("failed to wait for Ctrl-C: {e}");
    }

    let stopped = integration.teardown().await;
    println!("Stopped (clean: {stopped}).");
    Ok(())
}
