//! Payment provider adapters.
//!
//! Each adapter implements [`PaymentGateway`] over one provider's REST API.
//! [`build_registry`] wires the configured default plus every other provider
//! that has credentials, so webhooks and verifications for intents opened
//! under a previous configuration still resolve.

pub mod flutterwave;
pub mod mock;
pub mod paystack;
pub mod remita;
pub mod signature;

use crate::config::Config;
use crate::domain::gateway::GatewayRegistry;
use crate::domain::payment::Provider;
use crate::domain::ports::PaymentGateway;
use crate::error::{GatewayError, Result};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::Value;
use std::sync::Arc;

pub use flutterwave::FlutterwaveGateway;
pub use mock::MockGateway;
pub use paystack::PaystackGateway;
pub use remita::RemitaGateway;

pub fn build_registry(config: &Config) -> Result<GatewayRegistry> {
    let client = reqwest::Client::new();
    let default = gateway_for(config.provider, config, &client)?;
    let mut registry = GatewayRegistry::new(default);

    for provider in [Provider::Flutterwave, Provider::Paystack, Provider::Remita] {
        if provider == config.provider {
            continue;
        }
        // Secondary providers are optional.
        if let Ok(gateway) = gateway_for(provider, config, &client) {
            registry = registry.with(gateway);
        }
    }

    tracing::info!(
        default = %registry.default_provider(),
        providers = ?registry.providers().collect::<Vec<_>>(),
        "Payment gateways configured"
    );
    Ok(registry)
}

fn gateway_for(
    provider: Provider,
    config: &Config,
    client: &reqwest::Client,
) -> Result<Arc<dyn PaymentGateway>> {
    let gateway: Arc<dyn PaymentGateway> = match provider {
        Provider::Flutterwave => Arc::new(FlutterwaveGateway::new(
            client.clone(),
            &config.flutterwave,
        )?),
        Provider::Paystack => Arc::new(PaystackGateway::new(client.clone(), &config.paystack)?),
        Provider::Remita => Arc::new(RemitaGateway::new(client.clone(), &config.remita)?),
        Provider::Mock => Arc::new(MockGateway::new()),
    };
    Ok(gateway)
}

/// Decodes a provider response, turning non-2xx statuses into
/// [`GatewayError::Rejected`] with the provider's own message when present.
pub(crate) async fn provider_json(provider: Provider, response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    let body: Value = response.json().await.map_err(GatewayError::from)?;
    if !status.is_success() {
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP {status}"));
        tracing::warn!(%provider, %status, %message, "Provider rejected request");
        return Err(GatewayError::Rejected {
            provider: provider.to_string(),
            message,
        }
        .into());
    }
    Ok(body)
}

pub(crate) fn unexpected(provider: Provider, message: impl Into<String>) -> GatewayError {
    GatewayError::UnexpectedResponse {
        provider: provider.to_string(),
        message: message.into(),
    }
}

/// Amount in the currency's minor unit (kobo for NGN).
pub(crate) fn minor_units(amount: Decimal) -> Option<i64> {
    amount.checked_mul(Decimal::ONE_HUNDRED)?.round().to_i64()
}

/// Amount rounded to whole major units.
pub(crate) fn whole_units(amount: Decimal) -> Option<i64> {
    amount.round().to_i64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PaystackConfig;
    use rust_decimal_macros::dec;

    #[test]
    fn test_minor_units_rounds_to_kobo() {
        assert_eq!(minor_units(dec!(320)), Some(32_000));
        assert_eq!(minor_units(dec!(10.005)), Some(1_000));
        assert_eq!(whole_units(dec!(99.6)), Some(100));
        assert_eq!(minor_units(Decimal::MAX / Decimal::TEN), None);
        assert_eq!(minor_units(Decimal::from(i64::MAX)), None);
    }

    #[test]
    fn test_registry_includes_configured_secondaries() {
        let config = Config {
            paystack: PaystackConfig {
                secret_key: Some("sk_test".to_string()),
            },
            ..Config::default()
        };
        let registry = build_registry(&config).unwrap();
        assert_eq!(registry.default_provider(), Provider::Mock);
        assert!(registry.get(Provider::Paystack).is_ok());
        assert!(registry.get(Provider::Flutterwave).is_err());
    }

    #[test]
    fn test_unconfigured_default_provider_is_an_error() {
        let config = Config {
            provider: Provider::Remita,
            ..Config::default()
        };
        assert!(build_registry(&config).is_err());
    }
}
