pub mod access;
pub mod county;
pub mod symptoms;

pub use access::{AccessRule, AccessRuleEntry, UinOverride};
pub use county::{County, CountyStatus, Guideline, GuidelineItem};
pub use manual_test::{EManualTest, ManualTestStatus};
pub use symptoms::{CRules, SymptomGroup, Symptoms};
