//! Request decision pipeline.
//!
//! Every inbound request flows through:
//! 1. `ArtifactDetector::detect()`: which documents are being asked for
//! 2. `PolicyEngine::evaluate()`: approve or deny against NDA status
//! 3. `EscalationGate::should_escalate()`: does a human need to look
//! 4. `ResponseComposer::compose()`: the reply text
//!
//! `DecisionPipeline` wires these together; it is pure and keeps no history.

pub mod composer;
pub mod detector;
pub mod escalation;
pub mod policy;
pub mod processor;
pub mod types;

pub use detector::{ArtifactDetector, KeywordDetector};
pub use processor::{DecisionPipeline, PolicyHandle};
pub use types::{DecisionRecord, RoutingReason, ShareMethod};
