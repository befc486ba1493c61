use crate::error::{BookingError, Result};
use serde::Deserialize;
use serde_json::Value;

/// Provider callback body: `{event, data: {reference, status, id, metadata}}`.
///
/// Flutterwave names the reference `tx_ref` and the metadata `meta`; both
/// spellings are accepted.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    pub event: String,
    #[serde(default)]
    pub data: WebhookData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookData {
    #[serde(default, alias = "tx_ref")]
    pub reference: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default, alias = "meta")]
    pub metadata: Option<Value>,
}

/// What a webhook asks the reconciliation handler to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    ChargeSucceeded {
        reference: String,
        provider_tx_id: Option<String>,
    },
    ChargeFailed {
        reference: String,
    },
    TransferSucceeded {
        reference: String,
        transfer_id: Option<String>,
    },
    TransferFailed {
        reference: String,
    },
    Ignored {
        event: String,
    },
}

const SUCCESS_STATUSES: &[&str] = &["successful", "success", "completed", "00"];

impl WebhookPayload {
    pub fn parse(raw_body: &[u8]) -> Result<Self> {
        serde_json::from_slice(raw_body).map_err(|e| BookingError::MalformedPayload(e.to_string()))
    }

    /// Provider-side event identifier used to drop redeliveries.
    pub fn event_id(&self) -> Option<String> {
        match self.data.id.as_ref()? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    fn succeeded(&self) -> bool {
        self.data
            .status
            .as_deref()
            .map(|s| SUCCESS_STATUSES.contains(&s.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
    }

    pub fn classify(&self) -> Result<WebhookEvent> {
        let event = self.event.to_ascii_lowercase();
        let is_charge = event.starts_with("charge.");
        let is_transfer = event.starts_with("transfer.");
        if !is_charge && !is_transfer {
            return Ok(WebhookEvent::Ignored {
                event: self.event.clone(),
            });
        }

        let reference = self
            .data
            .reference
            .clone()
            .filter(|r| !r.is_empty())
            .ok_or_else(|| BookingError::MalformedPayload("missing reference".to_string()))?;
        let explicit_success = event.ends_with(".success");
        let explicit_failure = event.ends_with(".failed") || event.ends_with(".reversed");
        let ok = !explicit_failure && (explicit_success || self.succeeded());

        Ok(match (is_charge, ok) {
            (true, true) => WebhookEvent::ChargeSucceeded {
                reference,
                provider_tx_id: self.event_id(),
            },
            (true, false) => WebhookEvent::ChargeFailed { reference },
            (false, true) => WebhookEvent::TransferSucceeded {
                reference,
                transfer_id: self.event_id(),
            },
            (false, false) => WebhookEvent::TransferFailed { reference },
        })
    }
}
