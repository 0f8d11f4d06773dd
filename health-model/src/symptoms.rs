use serde::{Deserialize, Serialize};

/// Versioned symptom definitions. `items` is the raw JSON asset, stored as text.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Symptoms {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub app_version: String,
    pub items: String,
}

/// County-scoped symptom rules for one app version. `data` is the raw JSON asset.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct CRules {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub app_version: String,
    pub county_id: String,
    pub data: String,
}

/// Legacy symptom grouping, superseded by [`Symptoms`].
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SymptomGroup {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub symptoms: Vec<serde_json::Value>,
}
