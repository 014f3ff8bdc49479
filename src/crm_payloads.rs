//! Request bodies for the RD Station CRM `/contacts` and `/deals` resources.
//!
//! Optional parts are omitted from the JSON entirely when their identifier is
//! not configured, never sent as `null`.

use serde::Serialize;
use serde_json::Value;

use crate::config::{Config, CustomFieldIds, DealConfig};
use crate::models::{Lead, LeadAttribute};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EmailEntry {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PhoneEntry {
    pub phone: String,
}

/// Consent marker recorded with every contact created from a form.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LegalBasis {
    pub category: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub status: &'static str,
}

impl LegalBasis {
    pub fn consent() -> Self {
        Self {
            category: "data_processing",
            kind: "consent",
            status: "granted",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CustomFieldValue {
    pub custom_field_id: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ContactBody {
    pub name: String,
    pub emails: Vec<EmailEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub phones: Vec<PhoneEntry>,
    pub legal_bases: Vec<LegalBasis>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub contact_custom_fields: Vec<CustomFieldValue>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ContactRequest {
    pub contact: ContactBody,
}

/// Contact reference embedded in a deal.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DealContact {
    pub name: String,
    pub emails: Vec<EmailEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub phones: Vec<PhoneEntry>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DealBody {
    pub name: String,
    pub deal_stage_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub deal_custom_fields: Vec<CustomFieldValue>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ObjectRef {
    #[serde(rename = "_id")]
    pub id: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DealProduct {
    #[serde(rename = "_id")]
    pub id: String,
    pub amount: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DealRequest {
    pub deal: DealBody,
    pub contacts: Vec<DealContact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deal_source: Option<ObjectRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campaign: Option<ObjectRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<ObjectRef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub deal_products: Vec<DealProduct>,
}

pub fn contact_request(lead: &Lead, config: &Config) -> ContactRequest {
    let mut custom_fields = Vec::new();
    if let Some(id) = &config.contact_custom_fields.origin {
        custom_fields.push(CustomFieldValue {
            custom_field_id: id.clone(),
            value: config.lead_origin.clone(),
        });
    }
    custom_fields.extend(attribute_fields(lead, &config.contact_custom_fields));

    ContactRequest {
        contact: ContactBody {
            name: lead.name.clone(),
            emails: emails(lead),
            phones: phones(lead),
            legal_bases: vec![LegalBasis::consent()],
            contact_custom_fields: custom_fields,
        },
    }
}

/// Builds the deal for `lead`. Returns `None` when no deal stage is
/// configured, which disables deal creation altogether.
pub fn deal_request(lead: &Lead, deal: &DealConfig) -> Option<DealRequest> {
    let stage_id = deal.stage_id.clone()?;
    let object_ref = |id: &Option<String>| id.clone().map(|id| ObjectRef { id });

    Some(DealRequest {
        deal: DealBody {
            name: deal_name(lead.product.as_deref()),
            deal_stage_id: stage_id,
            user_id: deal.owner_id.clone(),
            deal_custom_fields: attribute_fields(lead, &deal.custom_fields),
        },
        contacts: vec![DealContact {
            name: lead.name.clone(),
            emails: emails(lead),
            phones: phones(lead),
        }],
        deal_source: object_ref(&deal.source_id),
        campaign: object_ref(&deal.campaign_id),
        organization: object_ref(&deal.organization_id),
        deal_products: deal
            .product_id
            .iter()
            .map(|id| DealProduct {
                id: id.clone(),
                amount: 1,
            })
            .collect(),
    })
}

pub fn deal_name(product: Option<&str>) -> String {
    match product {
        Some(product) => format!("Interesse: {} - Site", product),
        None => "Interesse - Site".to_string(),
    }
}

/// Serializes a request body for the CRM client.
pub fn to_json<T: Serialize>(body: &T) -> Value {
    // Plain structs with string keys cannot fail to serialize
    serde_json::to_value(body).unwrap_or(Value::Null)
}

fn emails(lead: &Lead) -> Vec<EmailEntry> {
    vec![EmailEntry {
        email: lead.email.clone(),
    }]
}

fn phones(lead: &Lead) -> Vec<PhoneEntry> {
    lead.phone
        .iter()
        .map(|phone| PhoneEntry {
            phone: phone.clone(),
        })
        .collect()
}

fn attribute_fields(lead: &Lead, ids: &CustomFieldIds) -> Vec<CustomFieldValue> {
    LeadAttribute::ALL
        .iter()
        .filter_map(|attr| {
            let id = ids.get(*attr)?;
            let value = attr.value_of(lead)?;
            Some(CustomFieldValue {
                custom_field_id: id.to_string(),
                value: value.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn lead() -> Lead {
        Lead {
            name: "Ana Silva".to_string(),
            email: "ana@x.com".to_string(),
            phone: Some("+55 11 99999-0000".to_string()),
            area: None,
            meet: None,
            product: Some("Plano A".to_string()),
            utm_campaign: None,
            utm_source: Some("instagram".to_string()),
            utm_medium: None,
        }
    }

    fn config(pairs: &[(&str, &str)]) -> Config {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned()).unwrap()
    }

    #[test]
    fn test_contact_minimal() {
        let mut lead = lead();
        lead.phone = None;
        let body = to_json(&contact_request(&lead, &config(&[])));
        assert_eq!(
            body,
            json!({
                "contact": {
                    "name": "Ana Silva",
                    "emails": [{"email": "ana@x.com"}],
                    "legal_bases": [{"category": "data_processing", "type": "consent", "status": "granted"}]
                }
            })
        );
    }

    #[test]
    fn test_contact_custom_fields_need_id_and_value() {
        let config = config(&[
            ("LEAD_ORIGIN", "Site Hungara"),
            ("RD_CRM_CONTACT_CF_ORIGIN", "cf-origin"),
            ("RD_CRM_CONTACT_CF_PRODUCT", "cf-product"),
            ("RD_CRM_CONTACT_CF_AREA", "cf-area"),
        ]);
        let body = to_json(&contact_request(&lead(), &config));
        assert_eq!(body["contact"]["phones"], json!([{"phone": "+55 11 99999-0000"}]));
        // area has an id but no value, so it is left out
        assert_eq!(
            body["contact"]["contact_custom_fields"],
            json!([
                {"custom_field_id": "cf-origin", "value": "Site Hungara"},
                {"custom_field_id": "cf-product", "value": "Plano A"}
            ])
        );
    }

    #[test]
    fn test_no_deal_without_stage() {
        let config = config(&[("RD_CRM_OWNER_ID", "owner")]);
        assert!(deal_request(&lead(), &config.deal).is_none());
    }

    #[test]
    fn test_deal_with_stage_only() {
        let config = config(&[("RD_CRM_DEAL_STAGE_ID", "stage-1")]);
        let body = to_json(&deal_request(&lead(), &config.deal).unwrap());
        assert_eq!(
            body,
            json!({
                "deal": {"name": "Interesse: Plano A - Site", "deal_stage_id": "stage-1"},
                "contacts": [{
                    "name": "Ana Silva",
                    "emails": [{"email": "ana@x.com"}],
                    "phones": [{"phone": "+55 11 99999-0000"}]
                }]
            })
        );
    }

    #[test]
    fn test_deal_fully_configured() {
        let config = config(&[
            ("RD_CRM_DEAL_STAGE_ID", "stage-1"),
            ("RD_CRM_OWNER_ID", "owner-1"),
            ("RD_CRM_DEAL_SOURCE_ID", "source-1"),
            ("RD_CRM_CAMPAIGN_ID", "campaign-1"),
            ("RD_CRM_ORGANIZATION_ID", "org-1"),
            ("RD_CRM_PRODUCT_ID", "product-1"),
            ("RD_CRM_DEAL_CF_UTM_SOURCE", "cf-utm-source"),
        ]);
        let body = to_json(&deal_request(&lead(), &config.deal).unwrap());
        assert_eq!(body["deal"]["user_id"], "owner-1");
        assert_eq!(body["deal_source"], json!({"_id": "source-1"}));
        assert_eq!(body["campaign"], json!({"_id": "campaign-1"}));
        assert_eq!(body["organization"], json!({"_id": "org-1"}));
        assert_eq!(body["deal_products"], json!([{"_id": "product-1", "amount": 1}]));
        assert_eq!(
            body["deal"]["deal_custom_fields"],
            json!([{"custom_field_id": "cf-utm-source", "value": "instagram"}])
        );
    }

    #[test]
    fn test_deal_name() {
        assert_eq!(deal_name(Some("Plano A")), "Interesse: Plano A - Site");
        assert_eq!(deal_name(None), "Interesse - Site");
    }
}
