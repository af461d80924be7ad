//! Canonical caller identity and its backend-native projection.

use std::{
    collections::BTreeMap,
    fmt,
    sync::{Arc, OnceLock},
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// User id assigned to identities that carry neither a user id nor custom ids.
pub const ANONYMOUS_USER_ID: &str = "0";

/// A caller-supplied user id. Callers hand us either strings or numeric ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Text(String),
    Number(Number),
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserId::Text(value) => f.write_str(value),
            UserId::Number(value) => match value.as_f64() {
                Some(float) if value.is_f64() && is_safe_integer(float) => {
                    write!(f, "{}", float as i64)
                }
                _ => write!(f, "{value}"),
            },
        }
    }
}

/// Largest magnitude at which every integer is exactly representable as `f64`.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

fn is_safe_integer(value: f64) -> bool {
    value.fract() == 0.0 && value.abs() <= MAX_SAFE_INTEGER
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for UserId {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<u64> for UserId {
    fn from(value: u64) -> Self {
        Self::Number(value.into())
    }
}

impl From<Number> for UserId {
    fn from(value: Number) -> Self {
        Self::Number(value)
    }
}

/// Raw identity attributes as supplied by callers.
///
/// Field names follow the camelCase convention of the evaluation service.
/// Anything that is not a recognized attribute lands in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityAttributes {
    #[serde(
        rename = "userID",
        alias = "userId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub user_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_attributes: Option<Map<String, Value>>,
    #[serde(
        rename = "customIDs",
        alias = "customIds",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub custom_ids: Option<BTreeMap<String, String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl IdentityAttributes {
    pub fn with_user_id(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    /// Merge `partial` into `self` key by key; set keys in `partial` win.
    pub fn merge(&mut self, partial: IdentityAttributes) {
        let IdentityAttributes {
            user_id,
            user_agent,
            os_name,
            os_version,
            browser_name,
            browser_version,
            ip,
            country,
            locale,
            app_version,
            custom,
            private_attributes,
            custom_ids,
            extra,
        } = partial;

        replace_if_set(&mut self.user_id, user_id);
        replace_if_set(&mut self.user_agent, user_agent);
        replace_if_set(&mut self.os_name, os_name);
        replace_if_set(&mut self.os_version, os_version);
        replace_if_set(&mut self.browser_name, browser_name);
        replace_if_set(&mut self.browser_version, browser_version);
        replace_if_set(&mut self.ip, ip);
        replace_if_set(&mut self.country, country);
        replace_if_set(&mut self.locale, locale);
        replace_if_set(&mut self.app_version, app_version);
        replace_if_set(&mut self.custom, custom);
        replace_if_set(&mut self.private_attributes, private_attributes);
        replace_if_set(&mut self.custom_ids, custom_ids);
        self.extra.extend(extra);
    }
}

fn replace_if_set<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

/// Identity in the shape the evaluation backend consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendIdentity {
    #[serde(rename = "userID", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_attributes: Option<Map<String, Value>>,
    #[serde(rename = "customIDs", default)]
    pub custom_ids: BTreeMap<String, String>,
}

impl BackendIdentity {
    fn from_attributes(attributes: &IdentityAttributes) -> Self {
        let user_id = attributes
            .user_id
            .as_ref()
            .map(UserId::to_string)
            .filter(|id| !id.is_empty());

        let mut identity = Self {
            user_id,
            user_agent: attributes.user_agent.clone(),
            os_name: attributes.os_name.clone(),
            os_version: attributes.os_version.clone(),
            browser_name: attributes.browser_name.clone(),
            browser_version: attributes.browser_version.clone(),
            ip: attributes.ip.clone(),
            country: attributes.country.clone(),
            locale: attributes.locale.clone(),
            app_version: attributes.app_version.clone(),
            custom: attributes.custom.clone(),
            private_attributes: attributes.private_attributes.clone(),
            custom_ids: attributes.custom_ids.clone().unwrap_or_default(),
        };

        if identity.user_id.is_none() && identity.custom_ids.is_empty() {
            identity.user_id = Some(ANONYMOUS_USER_ID.to_string());
        }

        identity
    }

    /// The user id, or the first custom id when only custom ids are present.
    pub fn display_id(&self) -> &str {
        self.user_id
            .as_deref()
            .or_else(|| self.custom_ids.values().next().map(String::as_str))
            .unwrap_or(ANONYMOUS_USER_ID)
    }
}

/// Canonical identity record.
///
/// The backend-native form is built on first use and memoized until the next
/// [`Identity::update`].
#[derive(Debug, Clone, Default)]
pub struct Identity {
    attributes: IdentityAttributes,
    backend: OnceLock<Arc<BackendIdentity>>,
}

impl Identity {
    pub fn new(attributes: IdentityAttributes) -> Self {
        Self {
            attributes,
            backend: OnceLock::new(),
        }
    }

    pub fn user_id(&self) -> Option<&UserId> {
        self.attributes.user_id.as_ref()
    }

    pub fn attributes(&self) -> &IdentityAttributes {
        &self.attributes
    }

    pub fn update(&mut self, partial: IdentityAttributes) {
        self.attributes.merge(partial);
        self.backend = OnceLock::new();
    }

    pub fn to_backend_identity(&self) -> Arc<BackendIdentity> {
        self.backend
            .get_or_init(|| Arc::new(BackendIdentity::from_attributes(&self.attributes)))
            .clone()
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.attributes == other.attributes
    }
}

impl From<IdentityAttributes> for Identity {
    fn from(attributes: IdentityAttributes) -> Self {
        Self::new(attributes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_user_id_is_coerced_to_string() {
        let identity = Identity::new(IdentityAttributes::with_user_id(42_i64));
        assert_eq!(identity.to_backend_identity().user_id.as_deref(), Some("42"));
    }

    #[test]
    fn integral_float_user_id_renders_without_fraction() {
        let integral: UserId = serde_json::from_value(json!(1.0)).expect("decode");
        let fractional: UserId = serde_json::from_value(json!(1.5)).expect("decode");
        assert_eq!(integral.to_string(), "1");
        assert_eq!(fractional.to_string(), "1.5");

        let identity = Identity::new(IdentityAttributes {
            user_id: Some(integral),
            ..IdentityAttributes::default()
        });
        assert_eq!(identity.to_backend_identity().user_id.as_deref(), Some("1"));
    }

    #[test]
    fn anonymous_identity_falls_back_to_zero() {
        let identity = Identity::default();
        let backend = identity.to_backend_identity();
        assert_eq!(backend.user_id.as_deref(), Some(ANONYMOUS_USER_ID));
        assert!(backend.custom_ids.is_empty());
    }

    #[test]
    fn empty_string_user_id_counts_as_unset() {
        let identity = Identity::new(IdentityAttributes::with_user_id(""));
        assert_eq!(
            identity.to_backend_identity().user_id.as_deref(),
            Some(ANONYMOUS_USER_ID)
        );
    }

    #[test]
    fn custom_ids_suppress_the_anonymous_fallback() {
        let identity = Identity::new(IdentityAttributes {
            custom_ids: Some(BTreeMap::from([(
                "stableID".to_string(),
                "device-7".to_string(),
            )])),
            ..IdentityAttributes::default()
        });
        let backend = identity.to_backend_identity();
        assert_eq!(backend.user_id, None);
        assert_eq!(backend.display_id(), "device-7");
    }

    #[test]
    fn backend_form_is_memoized() {
        let identity = Identity::new(IdentityAttributes::with_user_id("a"));
        let first = identity.to_backend_identity();
        let second = identity.to_backend_identity();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn update_invalidates_memoized_form() {
        let mut identity = Identity::new(IdentityAttributes::with_user_id("a"));
        let before = identity.to_backend_identity();

        identity.update(IdentityAttributes {
            country: Some("CA".into()),
            ..IdentityAttributes::with_user_id("b")
        });

        let after = identity.to_backend_identity();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(after.user_id.as_deref(), Some("b"));
        assert_eq!(after.country.as_deref(), Some("CA"));
    }

    #[test]
    fn update_retains_unspecified_keys() {
        let mut identity = Identity::new(IdentityAttributes {
            locale: Some("en-US".into()),
            ..IdentityAttributes::with_user_id("a")
        });

        identity.update(IdentityAttributes {
            country: Some("DE".into()),
            ..IdentityAttributes::default()
        });

        let backend = identity.to_backend_identity();
        assert_eq!(backend.user_id.as_deref(), Some("a"));
        assert_eq!(backend.locale.as_deref(), Some("en-US"));
        assert_eq!(backend.country.as_deref(), Some("DE"));
    }

    #[test]
    fn repeated_update_is_idempotent() {
        let partial = IdentityAttributes {
            app_version: Some("2.1.0".into()),
            ..IdentityAttributes::default()
        };

        let mut once = Identity::new(IdentityAttributes::with_user_id("u"));
        once.update(partial.clone());

        let mut twice = Identity::new(IdentityAttributes::with_user_id("u"));
        twice.update(partial.clone());
        twice.update(partial);

        assert_eq!(*once.to_backend_identity(), *twice.to_backend_identity());
        assert_eq!(once, twice);
    }

    #[test]
    fn attributes_accept_both_user_id_spellings() {
        let legacy: IdentityAttributes =
            serde_json::from_value(json!({ "userID": "x" })).expect("decode");
        let camel: IdentityAttributes =
            serde_json::from_value(json!({ "userId": "x" })).expect("decode");
        assert_eq!(legacy.user_id, camel.user_id);
    }

    #[test]
    fn unknown_attributes_land_in_extension_bag() {
        let attributes: IdentityAttributes =
            serde_json::from_value(json!({ "userID": 7, "tenant": "acme" })).expect("decode");
        assert_eq!(attributes.user_id, Some(UserId::from(7_i64)));
        assert_eq!(attributes.extra.get("tenant"), Some(&json!("acme")));
    }

    #[test]
    fn backend_identity_serializes_service_field_names() {
        let identity = Identity::new(IdentityAttributes {
            app_version: Some("1.0".into()),
            ..IdentityAttributes::with_user_id("42")
        });
        let json = serde_json::to_value(&*identity.to_backend_identity()).expect("encode");
        assert_eq!(json["userID"], "42");
        assert_eq!(json["appVersion"], "1.0");
        assert_eq!(json["customIDs"], json!({}));
    }
}
