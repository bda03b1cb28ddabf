//! Page configuration
//!
//! The host renders a `keksConfig` JSON object into every page. Its
//! localisation layer turns booleans into `"1"` / `""` and numbers into
//! strings, so parsing here is lenient. Everything is validated once, when the
//! [`PageConfig`] is built, and immutable afterwards.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use url::Url;

use keks_consent::{
    CategoryDefinition, CategoryModel, PagePolicy, DEFAULT_CONSENT_DAYS, MAX_CONSENT_DAYS,
};

use crate::error::CoreError;
use crate::strings::Strings;
use crate::Result;

/// Query parameter that turns on preview mode
pub const PREVIEW_PARAM: &str = "keks_preview";

/// Raw configuration as emitted by the host
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostConfig {
    #[serde(default, deserialize_with = "lenient_bool")]
    pub require_consent: Option<bool>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub show_block_overlay: Option<bool>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub should_block_page: Option<bool>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub granular_mode: Option<bool>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub consent_days: Option<u32>,
    #[serde(default)]
    pub categories: Option<Value>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub google_consent_mode: Option<bool>,
    #[serde(default)]
    pub ajax_url: Option<String>,
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default)]
    pub privacy_url: Option<String>,
    #[serde(default)]
    pub require_consent_message: Option<String>,
    #[serde(default)]
    pub strings: Strings,
}

#[derive(Debug, Deserialize)]
struct HostCategory {
    #[serde(default, deserialize_with = "lenient_bool")]
    required: Option<bool>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Clone)]
pub struct PageConfig {
    pub require_consent: bool,
    pub show_block_overlay: bool,
    /// False on exempt pages (privacy policy, imprint)
    pub should_block_page: bool,
    pub granular_mode: bool,
    pub consent_days: u32,
    pub categories: CategoryModel,
    pub google_consent_mode: bool,
    /// Audit endpoint; None disables the audit relay
    pub ajax_url: Option<Url>,
    pub nonce: String,
    pub privacy_url: Option<Url>,
    pub require_consent_message: Option<String>,
    pub strings: Strings,
    pub page_url: Url,
    pub preview_mode: bool,
}

impl PageConfig {
    pub fn from_json(json: &str, page_url: &str) -> Result<Self> {
        let host: HostConfig = serde_json::from_str(json)?;
        Self::from_host(host, page_url)
    }

    pub fn from_host(host: HostConfig, page_url: &str) -> Result<Self> {
        let page_url = Url::parse(page_url)?;
        let preview_mode = page_url
            .query_pairs()
            .any(|(key, value)| key == PREVIEW_PARAM && value == "1");

        let categories = parse_categories(host.categories)?;

        let ajax_url = host
            .ajax_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .and_then(|u| match page_url.join(u) {
                Ok(url) => Some(url),
                Err(e) => {
                    tracing::warn!(ajax_url = %u, error = %e, "Invalid audit endpoint, consent logging disabled");
                    None
                }
            });

        let privacy_url = host
            .privacy_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .and_then(|u| page_url.join(u).ok());

        let consent_days = match host.consent_days {
            Some(days) if days > MAX_CONSENT_DAYS => {
                tracing::warn!(
                    consent_days = days,
                    max = MAX_CONSENT_DAYS,
                    "Consent lifetime too long, capping"
                );
                MAX_CONSENT_DAYS
            }
            Some(days) if days > 0 => days,
            _ => DEFAULT_CONSENT_DAYS,
        };

        Ok(Self {
            require_consent: host.require_consent.unwrap_or(true),
            show_block_overlay: host.show_block_overlay.unwrap_or(false),
            should_block_page: host.should_block_page.unwrap_or(false),
            granular_mode: host.granular_mode.unwrap_or(true),
            consent_days,
            categories,
            google_consent_mode: host.google_consent_mode.unwrap_or(false),
            ajax_url,
            nonce: host.nonce.unwrap_or_default(),
            privacy_url,
            require_consent_message: host
                .require_consent_message
                .filter(|m| !m.trim().is_empty()),
            strings: host.strings,
            page_url,
            preview_mode,
        })
    }

    pub fn policy(&self) -> PagePolicy {
        PagePolicy {
            require_consent: self.require_consent,
            show_block_overlay: self.show_block_overlay,
            should_block_page: self.should_block_page,
            preview_mode: self.preview_mode,
        }
    }

    /// Text shown on the blocking overlay
    pub fn overlay_message(&self) -> &str {
        self.require_consent_message
            .as_deref()
            .unwrap_or(&self.strings.overlay_message)
    }
}

fn parse_categories(raw: Option<Value>) -> Result<CategoryModel> {
    let map = match raw {
        None | Some(Value::Null) => return Ok(CategoryModel::defaults()),
        // PHP encodes an empty associative array as []
        Some(Value::Array(items)) if items.is_empty() => return Ok(CategoryModel::defaults()),
        Some(Value::Object(map)) if map.is_empty() => return Ok(CategoryModel::defaults()),
        Some(Value::Object(map)) => map,
        Some(other) => {
            return Err(CoreError::Config(format!(
                "categories must be an object, got {}",
                other
            )))
        }
    };

    let mut definitions = Vec::with_capacity(map.len());
    for (key, value) in map {
        let category: HostCategory = serde_json::from_value(value)?;
        definitions.push(CategoryDefinition {
            key,
            required: category.required.unwrap_or(false),
            name: category.name,
            description: category.description,
        });
    }

    Ok(CategoryModel::new(definitions)?)
}

fn lenient_bool<'de, D>(deserializer: D) -> std::result::Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::Bool(b)) => Some(b),
        Some(Value::Number(n)) => Some(n.as_f64().map(|f| f != 0.0).unwrap_or(false)),
        Some(Value::String(s)) => {
            let s = s.trim();
            Some(!(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false")))
        }
        Some(other) => {
            return Err(serde::de::Error::custom(format!(
                "expected a boolean, got {}",
                other
            )))
        }
    })
}

fn lenient_u32<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let number = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        Some(_) => None,
    };

    match number {
        // Non-positive values fall back to the default later on
        Some(n) => Ok(Some(u32::try_from(n.max(0)).unwrap_or(u32::MAX))),
        None => Err(serde::de::Error::custom("expected a whole number of days")),
    }
}
