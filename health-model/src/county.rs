use serde::{Deserialize, Serialize};

/// County document as stored in the `counties` collection.
///
/// Locations reference their county through `locations.county_id` and are not
/// embedded here.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct County {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub state_province: String,
    #[serde(default)]
    pub country: String,

    #[serde(default)]
    pub guidelines: Vec<Guideline>,
    #[serde(default)]
    pub county_statuses: Vec<CountyStatus>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct Guideline {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub items: Vec<GuidelineItem>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct GuidelineItem {
    pub icon: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct CountyStatus {
    pub id: String,
    /// red, green, yellow...
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl County {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }
}
