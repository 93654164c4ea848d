//! Ticket Router Module
//!
//! Decides which downstream agent owns a ticket.
//!
//! ```text
//! Ticket ──► Classifier ──► completion backend ──Ok──► ClassificationResult (primary)
//!                 │                           └─Err──┐
//!                 └──────────► FallbackRuleEngine ◄──┘ ClassificationResult (fallback)
//! ```
//!
//! Routing never fails: an unknown or missing agent resolves to Escalation.

pub mod classifier;
pub mod prompts;

pub use classifier::{extract_json_object, ClassificationResult, Classifier, ClassifierSettings};
pub use prompts::{build_classification_prompt, CLASSIFIER_SYSTEM_INSTRUCTION};
