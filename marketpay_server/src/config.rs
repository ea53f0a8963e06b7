use std::{env, time::Duration};

use gateway_clients::{NicePayConfig, StripeConfig, TossConfig};
use log::*;
use marketpay_engine::DEFAULT_PROVIDER_TIMEOUT;
use mpg_common::{
    helpers::{parse_boolean_flag, parse_seconds},
    Secret,
};

const DEFAULT_MPG_HOST: &str = "127.0.0.1";
const DEFAULT_MPG_PORT: u16 = 8380;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/marketpay.db";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// The longest the server will wait for a payment provider to answer a single call.
    pub provider_timeout: Duration,
    /// If true, the embedded database migrations are applied at start-up.
    pub run_migrations: bool,
    pub providers: ProviderConfig,
    pub webhooks: WebhookConfig,
}

/// Credentials for each payment provider. A provider without credentials is not offered.
#[derive(Clone, Debug, Default)]
pub struct ProviderConfig {
    pub nicepay: Option<NicePayConfig>,
    pub toss: Option<TossConfig>,
    pub stripe: Option<StripeConfig>,
}

/// Secrets used to authenticate incoming provider notifications. When a secret is not set, notifications from that
/// provider are accepted without a signature check.
#[derive(Clone, Debug, Default)]
pub struct WebhookConfig {
    pub stripe_secret: Option<Secret<String>>,
    pub toss_secret: Option<Secret<String>>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_MPG_HOST.to_string(),
            port: DEFAULT_MPG_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
            run_migrations: true,
            providers: ProviderConfig::default(),
            webhooks: WebhookConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("MPG_HOST").ok().unwrap_or_else(|| DEFAULT_MPG_HOST.into());
        let port = env::var("MPG_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for MPG_PORT. {e} Using the default, {DEFAULT_MPG_PORT}, instead."
                    );
                    DEFAULT_MPG_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_MPG_PORT);
        let database_url = env::var("MPG_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ MPG_DATABASE_URL is not set. Using the default, {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let provider_timeout = parse_seconds(env::var("MPG_PROVIDER_TIMEOUT").ok(), DEFAULT_PROVIDER_TIMEOUT);
        let run_migrations = parse_boolean_flag(env::var("MPG_RUN_MIGRATIONS").ok(), true);
        let providers = ProviderConfig::from_env();
        let webhooks = WebhookConfig::from_env();
        Self { host, port, database_url, provider_timeout, run_migrations, providers, webhooks }
    }
}

impl ProviderConfig {
    pub fn from_env() -> Self {
        let result = Self {
            nicepay: NicePayConfig::from_env(),
            toss: TossConfig::from_env(),
            stripe: StripeConfig::from_env(),
        };
        if result.is_empty() {
            warn!(
                "🚨️ No payment provider credentials are configured. The server will run, but every payment request \
                 will be refused."
            );
        }
        result
    }

    pub fn is_empty(&self) -> bool {
        self.nicepay.is_none() && self.toss.is_none() && self.stripe.is_none()
    }
}

impl WebhookConfig {
    pub fn from_env() -> Self {
        let stripe_secret = secret_from_env("MPG_STRIPE_WEBHOOK_SECRET");
        if stripe_secret.is_none() {
            warn!("🪛️ MPG_STRIPE_WEBHOOK_SECRET is not set. STRIPE notifications will not be authenticated.");
        }
        let toss_secret = secret_from_env("MPG_TOSS_WEBHOOK_SECRET");
        if toss_secret.is_none() {
            info!("🪛️ MPG_TOSS_WEBHOOK_SECRET is not set. TOSS notifications will not be authenticated.");
        }
        Self { stripe_secret, toss_secret }
    }
}

fn secret_from_env(name: &str) -> Option<Secret<String>> {
    env::var(name).ok().map(Secret::new).filter(Secret::is_set)
}
