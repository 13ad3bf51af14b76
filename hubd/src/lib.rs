pub mod config;
pub mod heartbeat;
pub mod state;
pub mod telemetry;
pub mod wiring;

use crate::{config::Config, telemetry::init_tracing, wiring::build_state};

const SAVE_INTERVAL_TICKS: u32 = 30;

pub async fn run(cfg: Config) -> anyhow::Result<()> {
    init_tracing(&cfg)?;
    let app_state = build_state(&cfg).await?;
    heartbeat::spawn(app_state.manager.bus().clone(), cfg.heartbeat_interval);

    tracing::info!(protocols = ?app_state.manager.handler_names(), "hub started");

    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(1));
    let mut ticks_since_save = 0u32;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = app_state.manager.poll_all().await {
                    tracing::warn!(error = %e, "protocol poll tick failed");
                }
                ticks_since_save += 1;
                if ticks_since_save >= SAVE_INTERVAL_TICKS {
                    ticks_since_save = 0;
                    if let Err(e) = app_state.manager.save_all_devices().await {
                        tracing::warn!(error = %e, "periodic device save failed");
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received, saving devices");
                if let Err(e) = app_state.manager.save_all_devices().await {
                    tracing::warn!(error = %e, "shutdown device save failed");
                }
                return Ok(());
            }
        }
    }
}
