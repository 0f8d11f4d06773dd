use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Startup seed content.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SeedsConfig {
    /// Directory holding the seed assets (`symptoms_<version>.json`, `rules_<version>.json`).
    /// TOML: `seeds.dir`. Default: `./seeds`.
    #[serde(default = "default_dir")]
    pub dir: PathBuf,

    /// App versions whose symptom definitions must exist.
    /// TOML: `seeds.symptom_versions`. Default: `["2.6"]`.
    #[serde(default = "default_symptom_versions")]
    pub symptom_versions: Vec<String>,

    /// County-scoped rule sets that must exist.
    /// TOML: `seeds.region_rules`. Default: `[{ app_version = "2.6", county = "Champaign" }]`.
    #[serde(default = "default_region_rules")]
    pub region_rules: Vec<RegionRuleSeed>,

    /// Names of the legacy symptom groups created when that collection is empty.
    /// TOML: `seeds.symptom_groups`. Default: `["gr1", "gr2"]`.
    #[serde(default = "default_symptom_groups")]
    pub symptom_groups: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RegionRuleSeed {
    pub app_version: String,
    /// County name, resolved to its id at seed time.
    pub county: String,
}

impl Default for SeedsConfig {
    fn default() -> Self {
        Self {
            dir: default_dir(),
            symptom_versions: default_symptom_versions(),
            region_rules: default_region_rules(),
            symptom_groups: default_symptom_groups(),
        }
    }
}

impl SeedsConfig {
    /// No seed content at all; only indexes and pruning run.
    pub fn none() -> Self {
        Self {
            dir: default_dir(),
            symptom_versions: Vec::new(),
            region_rules: Vec::new(),
            symptom_groups: Vec::new(),
        }
    }
}

fn default_dir() -> PathBuf {
    PathBuf::from("./seeds")
}

fn default_symptom_versions() -> Vec<String> {
    vec!["2.6".to_string()]
}

fn default_region_rules() -> Vec<RegionRuleSeed> {
    vec![RegionRuleSeed {
        app_version: "2.6".to_string(),
        county: "Champaign".to_string(),
    }]
}

fn default_symptom_groups() -> Vec<String> {
    vec!["gr1".to_string(), "gr2".to_string()]
}
