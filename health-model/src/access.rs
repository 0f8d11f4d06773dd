use serde::{Deserialize, Serialize};

/// Per-county access rule set. At most one per county.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct AccessRule {
    #[serde(rename = "_id")]
    pub id: String,
    pub county_id: String,
    #[serde(default)]
    pub rules: Vec<AccessRuleEntry>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct AccessRuleEntry {
    pub county_status_id: String,
    pub value: String,
}

/// Manual override of the access decision for a single UIN.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct UinOverride {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub uin: String,
    pub interval: i64,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub expiration: Option<chrono::DateTime<chrono::Utc>>,
}
