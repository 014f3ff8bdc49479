use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

/// Fields extracted from an inbound submission, before validation.
///
/// This is also what a rejected submission echoes back to the caller, so the
/// form owner can see which keys actually arrived.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct LeadFields {
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utm_campaign: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utm_source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utm_medium: Option<String>,
}

/// Normalized lead. `name` and `email` are guaranteed non-empty and `email`
/// is lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lead {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub area: Option<String>,
    pub meet: Option<String>,
    pub product: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
}

impl Lead {
    /// Short SHA-256 fingerprint of the email, safe to put in logs.
    pub fn email_fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.email.as_bytes());
        let digest = hex::encode(hasher.finalize());
        digest[..12].to_string()
    }
}

/// Lead attributes that can be mirrored into CRM custom fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadAttribute {
    Area,
    Meet,
    Product,
    UtmSource,
    UtmMedium,
    UtmCampaign,
}

impl LeadAttribute {
    pub const ALL: [LeadAttribute; 6] = [
        LeadAttribute::Area,
        LeadAttribute::Meet,
        LeadAttribute::Product,
        LeadAttribute::UtmSource,
        LeadAttribute::UtmMedium,
        LeadAttribute::UtmCampaign,
    ];

    /// Suffix used in `RD_CRM_CONTACT_CF_*` / `RD_CRM_DEAL_CF_*` variables.
    pub fn env_suffix(self) -> &'static str {
        match self {
            LeadAttribute::Area => "AREA",
            LeadAttribute::Meet => "MEET",
            LeadAttribute::Product => "PRODUCT",
            LeadAttribute::UtmSource => "UTM_SOURCE",
            LeadAttribute::UtmMedium => "UTM_MEDIUM",
            LeadAttribute::UtmCampaign => "UTM_CAMPAIGN",
        }
    }

    pub fn value_of(self, lead: &Lead) -> Option<&str> {
        let value = match self {
            LeadAttribute::Area => &lead.area,
            LeadAttribute::Meet => &lead.meet,
            LeadAttribute::Product => &lead.product,
            LeadAttribute::UtmSource => &lead.utm_source,
            LeadAttribute::UtmMedium => &lead.utm_medium,
            LeadAttribute::UtmCampaign => &lead.utm_campaign,
        };
        value.as_deref()
    }
}

/// Body returned when a lead was forwarded.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ForwardResponse {
    /// Always `true`.
    pub ok: bool,
    /// Identifier of the created or updated CRM contact.
    pub contact_id: Option<String>,
    /// Raw CRM response for the contact call.
    #[schema(value_type = Object)]
    pub contact: Value,
    /// Raw CRM response for the deal call, present only when a deal was created.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub deal: Option<Value>,
}

/// Body returned when `name` or `email` is missing.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ValidationErrorResponse {
    pub error: String,
    pub received: LeadFields,
}

/// Body returned on configuration or upstream failures.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

/// Example submission, documented in the OpenAPI schema only.
///
/// The handler accepts any JSON object or form body; envelopes (`data`,
/// `fields`, `body`, `payload`) are unwrapped before these keys are read.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LeadSubmission {
    #[schema(example = "Ana Silva")]
    pub name: Option<String>,
    pub fullname: Option<String>,
    #[schema(example = "ana@example.com")]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub area: Option<String>,
    pub meet: Option<String>,
    #[schema(example = "Plano A")]
    pub product: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lead() -> Lead {
        Lead {
            name: "Ana Silva".to_string(),
            email: "ana@x.com".to_string(),
            phone: None,
            area: Some("Vendas".to_string()),
            meet: None,
            product: Some("Plano A".to_string()),
            utm_campaign: None,
            utm_source: Some("google".to_string()),
            utm_medium: None,
        }
    }

    #[test]
    fn test_email_fingerprint_is_stable_and_short() {
        let a = lead().email_fingerprint();
        let b = lead().email_fingerprint();
        assert_eq!(a, b);
        assert_eq!(a.len(), 12);
        assert!(!a.contains("ana"));
    }

    #[test]
    fn test_attribute_lookup() {
        let lead = lead();
        assert_eq!(LeadAttribute::Area.value_of(&lead), Some("Vendas"));
        assert_eq!(LeadAttribute::Product.value_of(&lead), Some("Plano A"));
        assert_eq!(LeadAttribute::UtmSource.value_of(&lead), Some("google"));
        assert_eq!(LeadAttribute::Meet.value_of(&lead), None);
    }

    #[test]
    fn test_validation_response_omits_absent_optionals() {
        let body = ValidationErrorResponse {
            error: "missing".to_string(),
            received: LeadFields {
                name: "Ana".to_string(),
                ..Default::default()
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["received"]["name"], "Ana");
        assert_eq!(json["received"]["email"], "");
        assert!(json["received"].get("phone").is_none());
    }
}
