//! Policy engine: partitions detected artifacts into approved and denied.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::catalog::{ArtifactCatalog, DeliveryMethod};
use crate::pipeline::types::{Denial, DenialReason, PolicyOutcome, ShareMethod};

/// Default validity of expiring links, in days.
pub const DEFAULT_LINK_EXPIRATION_DAYS: u32 = 7;

/// Applies disclosure policy to a set of detected artifacts.
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    catalog: Arc<ArtifactCatalog>,
    link_expiration_days: u32,
}

impl PolicyEngine {
    pub fn new(catalog: Arc<ArtifactCatalog>, link_expiration_days: u32) -> Self {
        Self {
            catalog,
            link_expiration_days,
        }
    }

    /// Configured link lifetime as an ISO 8601 duration (e.g. `P7D`).
    pub fn link_expiration(&self) -> String {
        format!("P{}D", self.link_expiration_days)
    }

    pub fn link_expiration_days(&self) -> u32 {
        self.link_expiration_days
    }

    /// Evaluate detected ids (expected in catalog order) against trust state.
    pub fn evaluate(&self, detected: &[String], nda_on_file: bool) -> PolicyOutcome {
        let mut approved = Vec::new();
        let mut denials = Vec::new();
        let mut requires_nda = false;
        let mut methods: Vec<DeliveryMethod> = Vec::new();

        for id in detected {
            let Ok(spec) = self.catalog.lookup(id) else {
                warn!(artifact = %id, "Detected artifact missing from catalog, skipping");
                continue;
            };

            requires_nda |= spec.requires_nda;

            let denial = if !spec.requires_nda {
                None
            } else if !nda_on_file {
                Some(DenialReason::NdaRequired)
            } else if spec.hold_for_review {
                Some(DenialReason::ReviewHold)
            } else {
                None
            };

            match denial {
                Some(reason) => {
                    debug!(artifact = %id, ?reason, "Artifact denied");
                    denials.push(Denial {
                        artifact_id: id.clone(),
                        reason,
                    });
                }
                None => {
                    debug!(artifact = %id, method = %spec.delivery_method, "Artifact approved");
                    if !methods.contains(&spec.delivery_method) {
                        methods.push(spec.delivery_method);
                    }
                    approved.push(id.clone());
                }
            }
        }

        let share_method = match methods.len() {
            0 => ShareMethod::None,
            1 => ShareMethod::Single(methods[0]),
            _ => ShareMethod::Mixed(methods),
        };

        let link_expiration = match share_method {
            ShareMethod::Single(method) if method.is_time_boxed() => Some(self.link_expiration()),
            _ => None,
        };

        PolicyOutcome {
            approved,
            denials,
            requires_nda,
            share_method,
            link_expiration,
        }
    }
}
