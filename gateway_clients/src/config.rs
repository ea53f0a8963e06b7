use log::*;
use mpg_common::Secret;

pub const DEFAULT_NICEPAY_API_URL: &str = "https://api.nicepay.co.kr";
pub const DEFAULT_TOSS_API_URL: &str = "https://api.tosspayments.com";
pub const DEFAULT_STRIPE_API_URL: &str = "https://api.stripe.com";

#[derive(Debug, Clone, Default)]
pub struct NicePayConfig {
    pub merchant_id: String,
    pub merchant_key: Secret<String>,
    pub api_url: String,
}

impl NicePayConfig {
    pub fn new<S: Into<String>>(merchant_id: S, merchant_key: S) -> Self {
        Self {
            merchant_id: merchant_id.into(),
            merchant_key: Secret::new(merchant_key.into()),
            api_url: DEFAULT_NICEPAY_API_URL.to_string(),
        }
    }

    pub fn with_api_url<S: Into<String>>(mut self, api_url: S) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// Reads `MPG_NICEPAY_*` from the environment. Returns `None` if the merchant credentials are not set.
    pub fn from_env() -> Option<Self> {
        let merchant_id = std::env::var("MPG_NICEPAY_MERCHANT_ID").ok().filter(|s| !s.trim().is_empty());
        let merchant_key = std::env::var("MPG_NICEPAY_MERCHANT_KEY").ok().filter(|s| !s.trim().is_empty());
        let (Some(merchant_id), Some(merchant_key)) = (merchant_id, merchant_key) else {
            info!("🪛️ MPG_NICEPAY_MERCHANT_ID or MPG_NICEPAY_MERCHANT_KEY is not set. NICEPAY is disabled.");
            return None;
        };
        let api_url = std::env::var("MPG_NICEPAY_API_URL").unwrap_or_else(|_| DEFAULT_NICEPAY_API_URL.to_string());
        Some(Self::new(merchant_id, merchant_key).with_api_url(api_url))
    }
}

#[derive(Debug, Clone, Default)]
pub struct TossConfig {
    pub secret_key: Secret<String>,
    pub api_url: String,
}

impl TossConfig {
    pub fn new<S: Into<String>>(secret_key: S) -> Self {
        Self { secret_key: Secret::new(secret_key.into()), api_url: DEFAULT_TOSS_API_URL.to_string() }
    }

    pub fn with_api_url<S: Into<String>>(mut self, api_url: S) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// Reads `MPG_TOSS_*` from the environment. Returns `None` if the secret key is not set.
    pub fn from_env() -> Option<Self> {
        let Some(secret_key) = std::env::var("MPG_TOSS_SECRET_KEY").ok().filter(|s| !s.trim().is_empty()) else {
            info!("🪛️ MPG_TOSS_SECRET_KEY is not set. TOSS is disabled.");
            return None;
        };
        let api_url = std::env::var("MPG_TOSS_API_URL").unwrap_or_else(|_| DEFAULT_TOSS_API_URL.to_string());
        Some(Self::new(secret_key).with_api_url(api_url))
    }
}

#[derive(Debug, Clone, Default)]
pub struct StripeConfig {
    pub secret_key: Secret<String>,
    pub api_url: String,
}

impl StripeConfig {
    pub fn new<S: Into<String>>(secret_key: S) -> Self {
        Self { secret_key: Secret::new(secret_key.into()), api_url: DEFAULT_STRIPE_API_URL.to_string() }
    }

    pub fn with_api_url<S: Into<String>>(mut self, api_url: S) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// Reads `MPG_STRIPE_*` from the environment. Returns `None` if the secret key is not set.
    pub fn from_env() -> Option<Self> {
        let Some(secret_key) = std::env::var("MPG_STRIPE_SECRET_KEY").ok().filter(|s| !s.trim().is_empty()) else {
            info!("🪛️ MPG_STRIPE_SECRET_KEY is not set. STRIPE is disabled.");
            return None;
        };
        let api_url = std::env::var("MPG_STRIPE_API_URL").unwrap_or_else(|_| DEFAULT_STRIPE_API_URL.to_string());
        Some(Self::new(secret_key).with_api_url(api_url))
    }
}
