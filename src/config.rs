use std::collections::BTreeMap;
use std::time::Duration;

use crate::models::LeadAttribute;

pub const DEFAULT_CRM_BASE_URL: &str = "https://crm.rdstation.com/api/v1";
pub const DEFAULT_LEAD_ORIGIN: &str = "Site - Framer";

/// How the CRM token is attached to outbound requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// `Authorization: Token token=<token>`
    Header,
    /// `?token=<token>`
    Query,
}

impl std::str::FromStr for AuthMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "header" => Ok(AuthMode::Header),
            "query" => Ok(AuthMode::Query),
            other => anyhow::bail!("RD_CRM_AUTH_MODE must be 'header' or 'query', got '{}'", other),
        }
    }
}

/// CRM custom field identifiers, keyed by the lead attribute they carry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomFieldIds {
    /// Field that receives the configured origin label (contacts only).
    pub origin: Option<String>,
    pub by_attribute: BTreeMap<&'static str, String>,
}

impl CustomFieldIds {
    pub fn get(&self, attribute: LeadAttribute) -> Option<&str> {
        self.by_attribute
            .get(attribute.env_suffix())
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.origin.is_none() && self.by_attribute.is_empty()
    }
}

/// Identifiers used to build the deal. Deal creation is enabled only when
/// `stage_id` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DealConfig {
    pub stage_id: Option<String>,
    pub owner_id: Option<String>,
    pub source_id: Option<String>,
    pub campaign_id: Option<String>,
    pub organization_id: Option<String>,
    pub product_id: Option<String>,
    pub custom_fields: CustomFieldIds,
}

impl DealConfig {
    pub fn enabled(&self) -> bool {
        self.stage_id.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub crm_base_url: String,
    /// Absent token is not fatal at startup; outbound calls fail instead.
    pub crm_token: Option<String>,
    pub auth_mode: AuthMode,
    pub crm_timeout: Duration,
    pub lead_origin: String,
    pub contact_custom_fields: CustomFieldIds,
    pub deal: DealConfig,
    /// Per-IP rate limiting on the lead route. Disable when a proxy in
    /// front of the service already limits, or when no peer address exists.
    pub rate_limit_enabled: bool,
    pub rate_limit_replenish_secs: u64,
    pub rate_limit_burst: u32,
    pub max_body_bytes: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. Blank values
    /// are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| -> Option<String> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let config = Self {
            port: parse_or(var("PORT"), 3000, "PORT must be a valid number between 1-65535")?,
            crm_base_url: var("RD_CRM_BASE_URL")
                .map(|url| {
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        anyhow::bail!("RD_CRM_BASE_URL must start with http:// or https://");
                    }
                    Ok(url.trim_end_matches('/').to_string())
                })
                .transpose()?
                .unwrap_or_else(|| DEFAULT_CRM_BASE_URL.to_string()),
            crm_token: var("RD_CRM_TOKEN"),
            auth_mode: var("RD_CRM_AUTH_MODE")
                .map(|mode| mode.parse::<AuthMode>())
                .transpose()?
                .unwrap_or(AuthMode::Header),
            crm_timeout: Duration::from_secs(parse_or(
                var("RD_CRM_TIMEOUT_SECS"),
                30,
                "RD_CRM_TIMEOUT_SECS must be a positive number of seconds",
            )?),
            lead_origin: var("LEAD_ORIGIN").unwrap_or_else(|| DEFAULT_LEAD_ORIGIN.to_string()),
            contact_custom_fields: custom_fields(&var, "RD_CRM_CONTACT_CF_", true),
            deal: DealConfig {
                stage_id: var("RD_CRM_DEAL_STAGE_ID"),
                owner_id: var("RD_CRM_OWNER_ID"),
                source_id: var("RD_CRM_DEAL_SOURCE_ID"),
                campaign_id: var("RD_CRM_CAMPAIGN_ID"),
                organization_id: var("RD_CRM_ORGANIZATION_ID"),
                product_id: var("RD_CRM_PRODUCT_ID"),
                custom_fields: custom_fields(&var, "RD_CRM_DEAL_CF_", false),
            },
            rate_limit_enabled: parse_or(
                var("RATE_LIMIT_ENABLED"),
                true,
                "RATE_LIMIT_ENABLED must be 'true' or 'false'",
            )?,
            rate_limit_replenish_secs: parse_or(
                var("RATE_LIMIT_REPLENISH_SECS"),
                1,
                "RATE_LIMIT_REPLENISH_SECS must be a positive number",
            )?,
            rate_limit_burst: parse_or(
                var("RATE_LIMIT_BURST"),
                20,
                "RATE_LIMIT_BURST must be a positive number",
            )?,
            max_body_bytes: parse_or(
                var("MAX_BODY_BYTES"),
                1024 * 1024,
                "MAX_BODY_BYTES must be a positive number",
            )?,
        };

        if config.crm_timeout.is_zero()
            || config.rate_limit_replenish_secs == 0
            || config.rate_limit_burst == 0
            || config.max_body_bytes == 0
        {
            anyhow::bail!("Timeouts, rate limits and body limits must be greater than zero");
        }

        // Log the shape of the configuration, never the token itself
        tracing::debug!("RD CRM base URL: {}", config.crm_base_url);
        tracing::debug!("RD CRM auth mode: {:?}", config.auth_mode);
        if config.crm_token.is_none() {
            tracing::warn!("RD_CRM_TOKEN not set: every submission will fail until it is configured");
        }
        if config.deal.enabled() {
            tracing::info!("Deal creation enabled");
        } else {
            tracing::info!("RD_CRM_DEAL_STAGE_ID not set: deals will not be created");
        }
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}

fn parse_or<T: std::str::FromStr>(
    value: Option<String>,
    default: T,
    message: &'static str,
) -> anyhow::Result<T> {
    match value {
        Some(raw) => raw.parse().map_err(|_| anyhow::anyhow!(message)),
        None => Ok(default),
    }
}

fn custom_fields<F>(var: &F, prefix: &str, with_origin: bool) -> CustomFieldIds
where
    F: Fn(&str) -> Option<String>,
{
    let origin = if with_origin {
        var(&format!("{}ORIGIN", prefix))
    } else {
        None
    };

    let by_attribute = LeadAttribute::ALL
        .iter()
        .filter_map(|attr| {
            var(&format!("{}{}", prefix, attr.env_suffix())).map(|id| (attr.env_suffix(), id))
        })
        .collect();

    CustomFieldIds {
        origin,
        by_attribute,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.crm_base_url, DEFAULT_CRM_BASE_URL);
        assert_eq!(config.crm_token, None);
        assert_eq!(config.auth_mode, AuthMode::Header);
        assert_eq!(config.crm_timeout, Duration::from_secs(30));
        assert_eq!(config.lead_origin, DEFAULT_LEAD_ORIGIN);
        assert!(!config.deal.enabled());
        assert!(config.contact_custom_fields.is_empty());
        assert!(config.rate_limit_enabled);
        assert_eq!(config.max_body_bytes, 1024 * 1024);
    }

    #[test]
    fn test_blank_values_are_unset() {
        let config = config_from(&[("RD_CRM_TOKEN", "   "), ("RD_CRM_DEAL_STAGE_ID", "")]).unwrap();
        assert_eq!(config.crm_token, None);
        assert!(!config.deal.enabled());
    }

    #[test]
    fn test_deal_and_custom_fields() {
        let config = config_from(&[
            ("RD_CRM_TOKEN", "tok"),
            ("RD_CRM_AUTH_MODE", "Query"),
            ("RD_CRM_DEAL_STAGE_ID", "stage-1"),
            ("RD_CRM_OWNER_ID", "owner-1"),
            ("RD_CRM_CONTACT_CF_ORIGIN", "cf-origin"),
            ("RD_CRM_CONTACT_CF_PRODUCT", "cf-product"),
            ("RD_CRM_DEAL_CF_UTM_SOURCE", "cf-utm"),
            ("RD_CRM_DEAL_CF_ORIGIN", "ignored"),
        ])
        .unwrap();

        assert_eq!(config.crm_token.as_deref(), Some("tok"));
        assert_eq!(config.auth_mode, AuthMode::Query);
        assert!(config.deal.enabled());
        assert_eq!(config.deal.owner_id.as_deref(), Some("owner-1"));
        assert_eq!(config.contact_custom_fields.origin.as_deref(), Some("cf-origin"));
        assert_eq!(
            config.contact_custom_fields.get(LeadAttribute::Product),
            Some("cf-product")
        );
        assert_eq!(
            config.deal.custom_fields.get(LeadAttribute::UtmSource),
            Some("cf-utm")
        );
        assert_eq!(config.deal.custom_fields.origin, None);
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let config = config_from(&[("RD_CRM_BASE_URL", "http://localhost:9000/api/v1/")]).unwrap();
        assert_eq!(config.crm_base_url, "http://localhost:9000/api/v1");
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(config_from(&[("RD_CRM_BASE_URL", "ftp://crm")]).is_err());
        assert!(config_from(&[("RD_CRM_AUTH_MODE", "cookie")]).is_err());
        assert!(config_from(&[("PORT", "http")]).is_err());
        assert!(config_from(&[("RD_CRM_TIMEOUT_SECS", "0")]).is_err());
        assert!(config_from(&[("RATE_LIMIT_ENABLED", "yes")]).is_err());
    }
}
