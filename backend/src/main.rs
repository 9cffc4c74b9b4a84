#[macro_use]
extern crate rocket;

mod api;
mod config;
mod error;
mod models;
mod services;
mod utils;

use crate::services::ingestion::Harvester;
use crate::services::transport::HttpTransport;
use anyhow::anyhow;
use log::info;
use rocket::fairing::AdHoc;
use tokio_util::sync::CancellationToken;

pub struct AppState {
    pub harvester: Harvester<HttpTransport>,
    /// Parent of every per-request token; cancelled when the server shuts down.
    pub shutdown: CancellationToken,
}

#[rocket::main]
async fn main() -> anyhow::Result<()> {
    config::load_environment();
    config::init_logger();

    let app_state = config::create_app_state()?;
    let cors = config::create_cors()?;

    let _rocket = rocket::build()
        .manage(app_state)
        .attach(cors)
        .attach(AdHoc::on_shutdown("Cancel running harvests", |rocket| {
            Box::pin(async move {
                if let Some(state) = rocket.state::<AppState>() {
                    info!("Shutting down, cancelling running harvests");
                    state.shutdown.cancel();
                }
            })
        }))
        .mount("/api/channels", routes![api::extract_channels])
        .mount("/api/videos", routes![api::analyze_videos])
        .launch()
        .await
        .map_err(|e| anyhow!("Rocket failed to launch: {e}"))?;

    Ok(())
}
