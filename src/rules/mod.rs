pub mod extraction_rule;

pub use extraction_rule::{ExtractionRule, RuleSet, UNIVERSAL_RULE};
