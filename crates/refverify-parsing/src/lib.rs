//! Locating the bibliography inside text extracted from a paper.

pub mod section;

pub use section::{
    ReferenceBlock, SectionEnd, SectionLocator, StopReason, StopRule, default_rules, locate,
};
