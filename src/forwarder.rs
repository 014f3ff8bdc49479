use serde_json::Value;

use crate::config::Config;
use crate::crm_client::{self, RdCrmClient};
use crate::crm_payloads::{self, to_json};
use crate::errors::AppError;
use crate::models::{ForwardResponse, Lead};

/// Result of forwarding one lead to the CRM.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardOutcome {
    pub contact_id: Option<String>,
    pub contact: Value,
    /// `None` when deal creation is not configured.
    pub deal: Option<Value>,
}

impl From<ForwardOutcome> for ForwardResponse {
    fn from(outcome: ForwardOutcome) -> Self {
        ForwardResponse {
            ok: true,
            contact_id: outcome.contact_id,
            contact: outcome.contact,
            deal: outcome.deal,
        }
    }
}

/// Sends a validated lead to the CRM: contact first, then the deal.
///
/// The calls are strictly sequential and there is no rollback. When the deal
/// call fails the contact stays in the CRM and the error is returned.
pub struct LeadForwarder<'a> {
    config: &'a Config,
    crm: &'a RdCrmClient,
}

impl<'a> LeadForwarder<'a> {
    pub fn new(config: &'a Config, crm: &'a RdCrmClient) -> Self {
        Self { config, crm }
    }

    pub async fn forward(&self, lead: &Lead) -> Result<ForwardOutcome, AppError> {
        let contact_body = to_json(&crm_payloads::contact_request(lead, self.config));
        let contact = self.crm.create_contact(&contact_body).await?;
        let contact_id = crm_client::contact_id(&contact);

        match &contact_id {
            Some(id) => tracing::info!("✓ Contact upserted in RD CRM: {}", id),
            None => tracing::warn!(
                "RD CRM contact response for email#{} has no id ({})",
                lead.email_fingerprint(),
                response_shape(&contact)
            ),
        }

        let Some(deal_request) = crm_payloads::deal_request(lead, &self.config.deal) else {
            tracing::debug!("No deal stage configured, skipping deal creation");
            return Ok(ForwardOutcome {
                contact_id,
                contact,
                deal: None,
            });
        };

        let deal = match self.crm.create_deal(&to_json(&deal_request)).await {
            Ok(deal) => deal,
            Err(e) => {
                tracing::warn!(
                    "Deal creation failed after contact {} was created; contact is kept",
                    contact_id.as_deref().unwrap_or("<unknown>")
                );
                return Err(e);
            }
        };

        tracing::info!("✓ Deal created in RD CRM");

        Ok(ForwardOutcome {
            contact_id,
            contact,
            deal: Some(deal),
        })
    }
}

/// Describes a CRM response without its values, which may echo personal data.
fn response_shape(response: &Value) -> String {
    match response {
        Value::Object(map) => {
            let mut keys: Vec<&str> = map.keys().map(String::as_str).collect();
            keys.sort_unstable();
            format!("object with keys [{}]", keys.join(", "))
        }
        Value::String(text) => format!("text body of {} bytes", text.len()),
        Value::Array(items) => format!("array of {} items", items.len()),
        Value::Null => "empty body".to_string(),
        other => format!("scalar {}", other),
    }
}
