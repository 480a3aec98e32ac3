//! Records exchanged with the allocation API

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Per-allocation content-access mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentAccess {
    #[default]
    Enabled,
    Disabled,
}

impl ContentAccess {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentAccess::Enabled => "enabled",
            ContentAccess::Disabled => "disabled",
        }
    }
}

impl fmt::Display for ContentAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentAccess {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "enabled" => Ok(ContentAccess::Enabled),
            "disabled" => Ok(ContentAccess::Disabled),
            other => Err(format!(
                "simple_content_access must be \"enabled\" or \"disabled\", got {other:?}"
            )),
        }
    }
}

/// A subscription to attach, keyed by exact subscription name.
///
/// `quantity` is reduced in place while reconciling when the server reports a
/// partial attachment, so after a run it holds the amount requested by the
/// last attach call rather than the configured total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredSubscription {
    pub name: String,
    pub quantity: u32,
}

impl DesiredSubscription {
    pub fn new(name: impl Into<String>, quantity: u32) -> Self {
        Self {
            name: name.into(),
            quantity,
        }
    }
}

/// Parameters for creating an allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationRequest {
    pub name: String,
    pub version: String,
    pub content_access: ContentAccess,
}

/// An allocation created during this session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub uuid: String,
    pub name: String,
    pub version: String,
    pub content_access: ContentAccess,
}

/// One entry of an allocation's pool listing.
///
/// `entitlements_available` is -1 for unlimited pools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pool {
    pub id: String,
    pub subscription_name: String,
    #[serde(default)]
    pub entitlements_available: i64,
}

impl Pool {
    pub fn is_unlimited(&self) -> bool {
        self.entitlements_available == -1
    }

    /// Whether this pool may be drawn from for `quantity` entitlements.
    ///
    /// The comparison is strict: a pool holding exactly `quantity` is skipped.
    pub fn can_supply(&self, quantity: u32) -> bool {
        self.is_unlimited() || self.entitlements_available > i64::from(quantity)
    }
}

/// Entitlement currently attached to an allocation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachedEntitlement {
    pub subscription_name: String,
    #[serde(default)]
    pub entitlement_quantity: u32,
}

/// Allocation as listed by the API and persisted to the local inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationRecord {
    pub uuid: String,
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub allocation_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entitlements_attached_quantity: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simple_content_access: Option<String>,
}

/// A downloaded manifest archive.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub allocation_uuid: String,
    pub allocation_name: String,
    pub path: PathBuf,
    pub status: u16,
    pub content: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(available: i64) -> Pool {
        Pool {
            id: "p1".into(),
            subscription_name: "Red Hat Beta Access".into(),
            entitlements_available: available,
        }
    }

    #[test]
    fn unlimited_pool_supplies_anything() {
        assert!(pool(-1).can_supply(10_000));
    }

    #[test]
    fn supply_check_is_strict() {
        assert!(pool(8).can_supply(1));
        assert!(pool(8).can_supply(7));
        assert!(!pool(8).can_supply(8));
        assert!(!pool(0).can_supply(1));
    }

    #[test]
    fn pool_deserializes_api_shape() {
        let json = r#"{"id":"8a85f99c","subscriptionName":"Red Hat Satellite Infrastructure Subscription","entitlementsAvailable":-1,"sku":"MCT3718"}"#;
        let pool: Pool = serde_json::from_str(json).unwrap();
        assert_eq!(pool.id, "8a85f99c");
        assert!(pool.is_unlimited());
    }

    #[test]
    fn content_access_parses_case_insensitively() {
        assert_eq!("Disabled".parse::<ContentAccess>(), Ok(ContentAccess::Disabled));
        assert_eq!(ContentAccess::default(), ContentAccess::Enabled);
        assert!("sometimes".parse::<ContentAccess>().is_err());
    }

    #[test]
    fn record_keeps_type_field_name() {
        let record = AllocationRecord {
            uuid: "u1".into(),
            name: "qe-AbCdEfGh".into(),
            allocation_type: Some("Satellite".into()),
            version: Some("sat-6.14".into()),
            entitlements_attached_quantity: Some(4),
            simple_content_access: Some("enabled".into()),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "Satellite");
        assert_eq!(json["entitlementsAttachedQuantity"], 4);
        assert_eq!(json["simpleContentAccess"], "enabled");
    }
}
