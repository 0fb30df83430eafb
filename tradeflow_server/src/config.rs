use std::{env, io::Write, path::PathBuf, time::Duration};

use log::*;
use moyasar_tools::MoyasarConfig;
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use serde_json::json;
use tempfile::NamedTempFile;
use tf_common::{helpers::parse_boolean_flag, Secret};
use tradeflow_engine::{
    auto_quote::{AutoQuoteConfig, DEFAULT_DELAY_MINUTES, DEFAULT_LEAD_TIME_DAYS},
    traits::VerificationMode,
};

use crate::errors::ServerError;

const DEFAULT_TFL_HOST: &str = "127.0.0.1";
const DEFAULT_TFL_PORT: u16 = 8460;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/tradeflow.db";
const DEFAULT_DOCUMENT_ROOT: &str = "data/documents";
const DEFAULT_AUTO_QUOTE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub auth: AuthConfig,
    /// Gateway client settings, including the webhook signing secret.
    pub moyasar: MoyasarConfig,
    pub verification_mode: VerificationMode,
    /// Where uploaded and generated POs are kept.
    pub document_root: PathBuf,
    /// The public base URL that signed document links point at. Defaults to `http://{host}:{port}/files`.
    pub document_url_base: String,
    /// The key used to sign document links.
    pub document_signing_key: Secret<String>,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address.
    pub use_forwarded: bool,
    pub auto_quote: AutoQuoteConfig,
    /// How often the auto-quote worker wakes up.
    pub auto_quote_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let auth = AuthConfig::default();
        Self {
            host: DEFAULT_TFL_HOST.to_string(),
            port: DEFAULT_TFL_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            document_signing_key: auth.jwt_secret.clone(),
            auth,
            moyasar: MoyasarConfig::default(),
            verification_mode: VerificationMode::default(),
            document_root: PathBuf::from(DEFAULT_DOCUMENT_ROOT),
            document_url_base: format!("http://{DEFAULT_TFL_HOST}:{DEFAULT_TFL_PORT}/files"),
            use_x_forwarded_for: false,
            use_forwarded: false,
            auto_quote: AutoQuoteConfig::default(),
            auto_quote_interval: DEFAULT_AUTO_QUOTE_INTERVAL,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("TFL_HOST").ok().unwrap_or_else(|| DEFAULT_TFL_HOST.into());
        let port = env::var("TFL_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for TFL_PORT. {e} Using the default, {DEFAULT_TFL_PORT}, instead."
                    );
                    DEFAULT_TFL_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_TFL_PORT);
        let database_url = env::var("TFL_DATABASE_URL").ok().unwrap_or_else(|| {
            info!("🪛️ TFL_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let auth = AuthConfig::try_from_env().unwrap_or_else(|e| {
            warn!(
                "🪛️ Could not load the authentication configuration from environment variables. {e}. Reverting to the \
                 default configuration."
            );
            AuthConfig::default()
        });
        let moyasar = MoyasarConfig::new_from_env_or_default();
        let verification_mode = env::var("TFL_VERIFICATION_MODE")
            .ok()
            .and_then(|s| {
                s.parse::<VerificationMode>()
                    .map_err(|e| warn!("🪛️ {e} in TFL_VERIFICATION_MODE. Using atomic verification."))
                    .ok()
            })
            .unwrap_or_default();
        info!("🪛️ PO verification mode: {verification_mode:?}");
        let document_root = env::var("TFL_DOCUMENT_ROOT").map(PathBuf::from).unwrap_or_else(|_| {
            info!("🪛️ TFL_DOCUMENT_ROOT is not set. Documents will be stored in {DEFAULT_DOCUMENT_ROOT}.");
            PathBuf::from(DEFAULT_DOCUMENT_ROOT)
        });
        let document_url_base =
            env::var("TFL_DOCUMENT_URL_BASE").unwrap_or_else(|_| format!("http://{host}:{port}/files"));
        let document_signing_key = env::var("TFL_DOCUMENT_SIGNING_KEY").map(Secret::new).unwrap_or_else(|_| {
            debug!("🪛️ TFL_DOCUMENT_SIGNING_KEY is not set. Document links are signed with the JWT secret.");
            auth.jwt_secret.clone()
        });
        let use_x_forwarded_for = parse_boolean_flag(env::var("TFL_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("TFL_USE_FORWARDED").ok(), false);
        let auto_quote = auto_quote_config_from_env();
        let auto_quote_interval = env::var("TFL_AUTO_QUOTE_INTERVAL_SECS")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| warn!("🪛️ Invalid configuration value for TFL_AUTO_QUOTE_INTERVAL_SECS. {e}"))
                    .ok()
            })
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_AUTO_QUOTE_INTERVAL);
        Self {
            host,
            port,
            database_url,
            auth,
            moyasar,
            verification_mode,
            document_root,
            document_url_base,
            document_signing_key,
            use_x_forwarded_for,
            use_forwarded,
            auto_quote,
            auto_quote_interval,
        }
    }
}

fn env_i64(name: &str, default: i64) -> i64 {
    match env::var(name) {
        Ok(s) => s.trim().parse::<i64>().unwrap_or_else(|e| {
            warn!("🪛️ Invalid configuration value for {name}. {e}. Using {default}.");
            default
        }),
        Err(_) => default,
    }
}

pub fn auto_quote_config_from_env() -> AutoQuoteConfig {
    let enabled = parse_boolean_flag(env::var("TFL_AUTO_QUOTE_ENABLED").ok(), false);
    let delay_minutes = env_i64("TFL_AUTO_QUOTE_DELAY_MINUTES", DEFAULT_DELAY_MINUTES);
    let include_limited_stock = parse_boolean_flag(env::var("TFL_AUTO_QUOTE_INCLUDE_LIMITED_STOCK").ok(), false);
    let lead_time_days = Some(env_i64("TFL_AUTO_QUOTE_LEAD_TIME_DAYS", DEFAULT_LEAD_TIME_DAYS));
    if enabled {
        info!("🪛️ Auto-quoting is enabled. RFQs are quoted after {delay_minutes} minutes.");
    } else {
        info!("🪛️ Auto-quoting is disabled. Set TFL_AUTO_QUOTE_ENABLED=true to enable it.");
    }
    AutoQuoteConfig { enabled, delay_minutes, include_limited_stock, lead_time_days }
}

//-------------------------------------------------  AuthConfig  -------------------------------------------------------
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// The HS256 key that bearer tokens are signed with. Tokens are issued elsewhere. This server only verifies them.
    pub jwt_secret: Secret<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        warn!(
            "🚨️🚨️🚨️ The JWT secret has not been set. I'm using a random value for this session. DO NOT operate on \
             production like this since no externally issued token will be accepted. 🚨️🚨️🚨️"
        );
        let secret = thread_rng().sample_iter(&Alphanumeric).take(48).map(char::from).collect::<String>();
        let mut tmpfile = NamedTempFile::new().ok().and_then(|f| f.keep().ok());
        match &mut tmpfile {
            Some((f, p)) => {
                let key_data = json!({ "jwt_secret": secret }).to_string();
                match writeln!(f, "{key_data}") {
                    Ok(()) => warn!(
                        "🚨️🚨️🚨️ The JWT secret for this session was written to {}. If this is a production instance, \
                         you are doing it wrong! Set the TFL_JWT_SECRET environment variable instead. 🚨️🚨️🚨️",
                        p.to_str().unwrap_or("???")
                    ),
                    Err(e) => warn!("🪛️ Could not write the JWT secret to the temporary file. {e}"),
                }
            },
            None => {
                warn!("🪛️ Could not create a temporary file to store the JWT secret.");
            },
        }
        Self { jwt_secret: Secret::new(secret) }
    }
}

impl AuthConfig {
    pub fn new<S: Into<String>>(jwt_secret: S) -> Self {
        Self { jwt_secret: Secret::new(jwt_secret.into()) }
    }

    pub fn try_from_env() -> Result<Self, ServerError> {
        let secret =
            env::var("TFL_JWT_SECRET").map_err(|e| ServerError::ConfigurationError(format!("{e} [TFL_JWT_SECRET]")))?;
        let secret = Secret::new(secret);
        if secret.is_empty() {
            return Err(ServerError::ConfigurationError("TFL_JWT_SECRET is empty".to_string()));
        }
        Ok(Self { jwt_secret: secret })
    }
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// A subset of the server configuration that is used to configure the server's behaviour. Generally we try to keep this
/// as small as possible, and exclude secrets to avoid passing sensitive information around the system.
#[derive(Clone, Copy, Debug, Default)]
pub struct ServerOptions {
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { use_x_forwarded_for: config.use_x_forwarded_for, use_forwarded: config.use_forwarded }
    }
}
