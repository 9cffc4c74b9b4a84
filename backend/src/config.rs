use crate::services::ingestion::{HarvestSettings, Harvester};
use crate::services::pacing::{FixedPacing, JitterPacing};
use crate::services::transport::{CredentialPool, HttpTransport, RetryPolicy};
use crate::AppState;
use anyhow::{anyhow, Result};
use env_logger::{Builder, Env};
use lazy_static::lazy_static;
use log::{info, warn};
use rocket::http::Method;
use rocket_cors::{AllowedHeaders, AllowedOrigins, CorsOptions};
use std::env;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const DEFAULT_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

lazy_static! {
    pub static ref YOUTUBE_API_KEYS: Vec<String> = {
        let keys = split_list(&env::var("YOUTUBE_API_KEYS").unwrap_or_default());
        if keys.is_empty() {
            split_list(&env::var("YOUTUBE_API_KEY").unwrap_or_default())
        } else {
            keys
        }
    };
    pub static ref YOUTUBE_QUOTA_USERS: Vec<String> =
        split_list(&env::var("YOUTUBE_QUOTA_USERS").unwrap_or_default());
    pub static ref YOUTUBE_API_BASE: String =
        env::var("YOUTUBE_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
    pub static ref PAGE_DELAY_MIN_MS: u64 = env_or("HARVEST_PAGE_DELAY_MIN_MS", 1000);
    pub static ref PAGE_DELAY_MAX_MS: u64 = env_or("HARVEST_PAGE_DELAY_MAX_MS", 3000);
    pub static ref TARGET_DELAY_MS: u64 = env_or("HARVEST_TARGET_DELAY_MS", 2000);
    pub static ref PAGE_CEILING: u32 = env_or("HARVEST_PAGE_CEILING", 100);
    pub static ref REQUEST_TIMEOUT_SECS: u64 = env_or("HARVEST_REQUEST_TIMEOUT_SECS", 30);
    pub static ref CORS_ALLOWED_ORIGIN: String =
        env::var("CORS_ALLOWED_ORIGIN").unwrap_or_else(|_| "http://localhost:8080".to_string());
}

/// Comma separated list, blanks dropped.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_or<T: FromStr>(raw: Option<String>, default: T) -> T {
    raw.and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    parse_or(env::var(name).ok(), default)
}

pub fn init_logger() {
    Builder::from_env(Env::default().default_filter_or("info")).init();
    info!("Starting channel harvester backend...");
}

pub fn load_environment() {
    dotenv::dotenv().ok();
}

pub fn create_transport() -> Result<HttpTransport> {
    let credentials = CredentialPool::new(YOUTUBE_API_KEYS.clone(), YOUTUBE_QUOTA_USERS.clone())
        .ok_or_else(|| anyhow!("YOUTUBE_API_KEYS or YOUTUBE_API_KEY must be set"))?;
    info!(
        "Using {} API key(s) against {}",
        YOUTUBE_API_KEYS.len(),
        *YOUTUBE_API_BASE
    );

    let transport = HttpTransport::new(
        &YOUTUBE_API_BASE,
        credentials,
        Duration::from_secs(*REQUEST_TIMEOUT_SECS),
        RetryPolicy::default(),
    )?;
    Ok(transport)
}

pub fn harvest_settings() -> HarvestSettings {
    let (min, max) = (*PAGE_DELAY_MIN_MS, *PAGE_DELAY_MAX_MS);
    if max < min {
        warn!("HARVEST_PAGE_DELAY_MAX_MS ({max}) is below the minimum ({min}), using {min} ms");
    }

    HarvestSettings {
        page_ceiling: *PAGE_CEILING,
        page_pacing: Arc::new(JitterPacing {
            min: Duration::from_millis(min),
            max: Duration::from_millis(max.max(min)),
        }),
        target_pacing: Arc::new(FixedPacing(Duration::from_millis(*TARGET_DELAY_MS))),
        ..HarvestSettings::default()
    }
}

pub fn create_app_state() -> Result<AppState> {
    let transport = create_transport()?;
    Ok(AppState {
        harvester: Harvester::new(transport, harvest_settings()),
        shutdown: CancellationToken::new(),
    })
}

pub fn create_cors() -> Result<rocket_cors::Cors> {
    let cors = CorsOptions::default()
        .allowed_origins(AllowedOrigins::some_exact(&[CORS_ALLOWED_ORIGIN.as_str()]))
        .allowed_methods(
            vec![Method::Get, Method::Post, Method::Options]
                .into_iter()
                .map(From::from)
                .collect(),
        )
        .allowed_headers(AllowedHeaders::some(&["Accept", "Content-Type"]))
        .to_cors()
        .map_err(|e| anyhow!("Failed to create CORS options: {}", e))?;

    Ok(cors)
}
