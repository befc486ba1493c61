//! Runtime configuration loaded from environment variables.
//!
//! Call `dotenvy::dotenv()` before [`Config::from_env`] to pick up a local
//! `.env` file.

use crate::domain::availability::BoundaryPolicy;
use crate::domain::payment::Provider;
use crate::error::{BookingError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Provider new payment intents are opened with.
    pub provider: Provider,
    pub flutterwave: FlutterwaveConfig,
    pub paystack: PaystackConfig,
    pub remita: RemitaConfig,
    pub booking: BookingConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlutterwaveConfig {
    pub secret_key: Option<String>,
    /// Webhook signing secret; falls back to the secret key when unset.
    pub secret_hash: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaystackConfig {
    pub secret_key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemitaConfig {
    pub api_key: Option<String>,
    pub merchant_id: Option<String>,
    pub service_type_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingConfig {
    /// Where the provider sends the payer after checkout.
    pub frontend_url: String,
    pub currency: String,
    pub hold_minutes: i64,
    /// How long an unpaid intent is handed out again instead of replaced.
    pub payment_reuse_minutes: i64,
    pub boundary: BoundaryPolicy,
    pub sweep_interval: Duration,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            frontend_url: "http://localhost:3000".to_string(),
            currency: "NGN".to_string(),
            hold_minutes: 15,
            payment_reuse_minutes: 30,
            boundary: BoundaryPolicy::default(),
            sweep_interval: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Shared secret presented by internal callers (admin tools, payout jobs).
    pub internal_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            internal_token: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: Provider::Mock,
            flutterwave: FlutterwaveConfig::default(),
            paystack: PaystackConfig::default(),
            remita: RemitaConfig::default(),
            booking: BookingConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup. Unset or unparsable
    /// numeric values fall back to their defaults; an unknown provider or
    /// boundary policy is an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = BookingConfig::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let provider = match non_empty("PAYMENT_PROVIDER") {
            Some(raw) => raw
                .parse::<Provider>()
                .map_err(|_| BookingError::Config(format!("unknown PAYMENT_PROVIDER '{raw}'")))?,
            None => Provider::Mock,
        };
        let boundary = match non_empty("BOOKING_BOUNDARY") {
            Some(raw) => raw.parse()?,
            None => defaults.boundary,
        };

        Ok(Self {
            provider,
            flutterwave: FlutterwaveConfig {
                secret_key: non_empty("FLW_SECRET_KEY"),
                secret_hash: non_empty("FLW_SECRET_HASH"),
            },
            paystack: PaystackConfig {
                secret_key: non_empty("PAYSTACK_SECRET_KEY"),
            },
            remita: RemitaConfig {
                api_key: non_empty("REMITA_API_KEY"),
                merchant_id: non_empty("REMITA_MERCHANT_ID"),
                service_type_id: non_empty("REMITA_SERVICE_TYPE_ID"),
            },
            booking: BookingConfig {
                frontend_url: non_empty("FRONTEND_URL").unwrap_or(defaults.frontend_url),
                currency: non_empty("CURRENCY").unwrap_or(defaults.currency),
                hold_minutes: non_empty("HOLD_MINUTES")
                    .and_then(|s| s.parse().ok())
                    .filter(|m: &i64| *m > 0)
                    .unwrap_or(defaults.hold_minutes),
                payment_reuse_minutes: non_empty("PAYMENT_REUSE_MINUTES")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.payment_reuse_minutes),
                boundary,
                sweep_interval: non_empty("SWEEP_INTERVAL_SECS")
                    .and_then(|s| s.parse().ok())
                    .filter(|s: &u64| *s > 0)
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.sweep_interval),
            },
            server: ServerConfig {
                bind_addr: non_empty("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
                internal_token: non_empty("INTERNAL_TOKEN"),
            },
        })
    }

    /// Redirect target handed to the provider for a given booking.
    pub fn booking_redirect_url(&self) -> String {
        format!(
            "{}/booking/verify",
            self.booking.frontend_url.trim_end_matches('/')
        )
    }

    pub fn points_redirect_url(&self) -> String {
        format!(
            "{}/points/verify",
            self.booking.frontend_url.trim_end_matches('/')
        )
    }
}
