use log::*;
use tf_common::Secret;

pub const DEFAULT_MOYASAR_API_URL: &str = "https://api.moyasar.com/v1";

#[derive(Debug, Clone, Default)]
pub struct MoyasarConfig {
    pub api_url: String,
    pub secret_key: Secret<String>,
    /// The shared secret used to sign webhook bodies.
    pub webhook_secret: Secret<String>,
}

impl MoyasarConfig {
    pub fn new_from_env_or_default() -> Self {
        let api_url = std::env::var("TFL_MOYASAR_API_URL").unwrap_or_else(|_| {
            info!("🪛️ TFL_MOYASAR_API_URL not set, using {DEFAULT_MOYASAR_API_URL}");
            DEFAULT_MOYASAR_API_URL.to_string()
        });
        let secret_key = Secret::new(std::env::var("TFL_MOYASAR_SECRET_KEY").unwrap_or_else(|_| {
            warn!("🪛️ TFL_MOYASAR_SECRET_KEY not set. Payment sync requests will be rejected by the gateway.");
            String::default()
        }));
        let webhook_secret = Secret::new(std::env::var("TFL_MOYASAR_WEBHOOK_SECRET").unwrap_or_else(|_| {
            warn!("🪛️ TFL_MOYASAR_WEBHOOK_SECRET not set. Every webhook call will fail signature validation.");
            String::default()
        }));
        Self { api_url: api_url.trim_end_matches('/').to_string(), secret_key, webhook_secret }
    }
}
