//! Response composer: renders a draft decision into reply text.
//!
//! Pure and deterministic: the same draft always yields the same text.

use std::sync::Arc;

use crate::catalog::{ArtifactCatalog, DeliveryMethod};
use crate::pipeline::types::{DenialReason, DraftDecision, RoutingReason};

/// Default reply signature.
pub const DEFAULT_SIGNATURE: &str = "Sales Desk Team";

/// Reply template settings.
#[derive(Debug, Clone)]
pub struct ComposerSettings {
    pub signature: String,
    pub company_name: Option<String>,
    pub link_expiration_days: u32,
}

impl Default for ComposerSettings {
    fn default() -> Self {
        Self {
            signature: DEFAULT_SIGNATURE.to_string(),
            company_name: None,
            link_expiration_days: crate::pipeline::policy::DEFAULT_LINK_EXPIRATION_DAYS,
        }
    }
}

/// Renders reply emails.
#[derive(Debug, Clone)]
pub struct ResponseComposer {
    catalog: Arc<ArtifactCatalog>,
    settings: ComposerSettings,
}

impl ResponseComposer {
    pub fn new(catalog: Arc<ArtifactCatalog>, settings: ComposerSettings) -> Self {
        Self { catalog, settings }
    }

    pub fn settings(&self) -> &ComposerSettings {
        &self.settings
    }

    /// Render the reply for a draft decision.
    pub fn compose(&self, draft: &DraftDecision) -> String {
        let name = draft
            .sender_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or("there");

        let mut out = format!("Hi {name},\n\n");

        if draft.detected.is_empty() {
            out.push_str(&self.clarification());
        } else {
            out.push_str("Thank you for your security documentation request.\n\n");
            out.push_str(&self.approved_section(draft));
            out.push_str(&self.denied_section(draft, DenialReason::NdaRequired));
            out.push_str(&self.denied_section(draft, DenialReason::ReviewHold));
        }

        if let Some(note) = draft.escalation.reason.and_then(escalation_note) {
            out.push_str(note);
            out.push_str("\n\n");
        }

        out.push_str("Best regards,\n");
        out.push_str(&self.settings.signature);
        out
    }

    fn clarification(&self) -> String {
        let mut out = String::from(
            "Thank you for reaching out. I couldn't identify specific security documents in your request.\n\n\
             Could you please clarify which of the following you need:\n",
        );
        for spec in self.catalog.all_specs() {
            out.push_str(&format!("- {}\n", spec.display_name));
        }
        out.push('\n');
        out
    }

    fn approved_section(&self, draft: &DraftDecision) -> String {
        if draft.policy.approved.is_empty() {
            return String::new();
        }

        // Validity is only promised when the record carries an expiration.
        let validity = draft.policy.link_expiration.is_some();
        let mut out = String::from("I'm preparing the following documents for you:\n");
        for id in &draft.policy.approved {
            let Ok(spec) = self.catalog.lookup(id) else {
                continue;
            };
            out.push_str(&format!(
                "• {} ({})\n",
                spec.display_name,
                self.delivery_phrase(spec.delivery_method, validity)
            ));
        }
        out.push('\n');
        out
    }

    fn denied_section(&self, draft: &DraftDecision, reason: DenialReason) -> String {
        let names: Vec<&str> = draft
            .policy
            .denials
            .iter()
            .filter(|d| d.reason == reason)
            .filter_map(|d| self.catalog.lookup(&d.artifact_id).ok())
            .map(|spec| spec.display_name.as_str())
            .collect();

        if names.is_empty() {
            return String::new();
        }

        let (heading, footer) = match reason {
            DenialReason::NdaRequired => (
                "The following documents require an executed NDA before sharing:".to_string(),
                self.nda_remediation(),
            ),
            DenialReason::ReviewHold => (
                "The following documents need a review by our security team before they can be shared:"
                    .to_string(),
                "A member of our team will follow up with you directly.".to_string(),
            ),
        };

        let mut out = format!("{heading}\n");
        for name in names {
            out.push_str(&format!("• {name}\n"));
        }
        out.push('\n');
        out.push_str(&footer);
        out.push_str("\n\n");
        out
    }

    fn nda_remediation(&self) -> String {
        let nda = match self.settings.company_name.as_deref() {
            Some(company) if !company.trim().is_empty() => format!("the {} mutual NDA", company.trim()),
            _ => "our mutual NDA".to_string(),
        };
        format!(
            "Please have your legal team complete {nda}, and I'll send these immediately after execution."
        )
    }

    fn delivery_phrase(&self, method: DeliveryMethod, validity: bool) -> String {
        if validity && method.is_time_boxed() {
            format!(
                "{}, valid for {} days",
                method.describe(),
                self.settings.link_expiration_days
            )
        } else {
            method.describe().to_string()
        }
    }
}

fn escalation_note(reason: RoutingReason) -> Option<&'static str> {
    match reason {
        RoutingReason::LegalReview => Some(
            "I've passed the legal and contract questions in your message to our team, who will follow up with you directly.",
        ),
        RoutingReason::UnclearRequest => {
            Some("I've also asked a member of our security team to look at your request.")
        }
        RoutingReason::BulkSensitiveRequest => Some(
            "Given the number of confidential documents requested, a member of our team will reach out to help with next steps.",
        ),
        // The review-hold section already says someone will follow up.
        RoutingReason::PolicyConflict => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::spec;
    use crate::pipeline::types::{Denial, Escalation, PolicyOutcome, ShareMethod};

    fn composer(settings: ComposerSettings) -> ResponseComposer {
        let mut soc2 = spec("soc2", true, DeliveryMethod::ExpiringLink);
        soc2.display_name = "SOC 2 Type II Report".into();
        let mut iso = spec("iso27001", false, DeliveryMethod::SecureLink);
        iso.display_name = "ISO 27001 Certificate".into();
        let mut pentest = spec("pentest", true, DeliveryMethod::ExpiringLink);
        pentest.display_name = "Penetration Test Report".into();
        pentest.hold_for_review = true;
        let catalog = ArtifactCatalog::new(vec![soc2, iso, pentest]).unwrap();
        ResponseComposer::new(Arc::new(catalog), settings)
    }

    fn draft(
        detected: &[&str],
        approved: &[&str],
        denials: &[(&str, DenialReason)],
        escalation: Escalation,
    ) -> DraftDecision {
        DraftDecision {
            sender_name: None,
            detected: detected.iter().map(|s| s.to_string()).collect(),
            nda_on_file: false,
            policy: PolicyOutcome {
                approved: approved.iter().map(|s| s.to_string()).collect(),
                denials: denials
                    .iter()
                    .map(|(id, reason)| Denial {
                        artifact_id: id.to_string(),
                        reason: *reason,
                    })
                    .collect(),
                requires_nda: false,
                share_method: ShareMethod::None,
                link_expiration: None,
            },
            escalation,
        }
    }

    #[test]
    fn clarification_lists_catalog() {
        let text = composer(ComposerSettings::default()).compose(&draft(&[], &[], &[], Escalation::none()));
        assert!(text.starts_with("Hi there,"));
        assert!(text.contains("couldn't identify"));
        assert!(text.contains("- SOC 2 Type II Report\n- ISO 27001 Certificate\n- Penetration Test Report"));
        assert!(text.ends_with("Best regards,\nSales Desk Team"));
    }

    #[test]
    fn approved_lists_delivery_method() {
        let text = composer(ComposerSettings::default()).compose(&draft(
            &["soc2", "iso27001"],
            &["soc2", "iso27001"],
            &[],
            Escalation::none(),
        ));
        assert!(text.contains("• SOC 2 Type II Report (via expiring secure link)\n"));
        assert!(text.contains("• ISO 27001 Certificate (via secure link)"));
        assert!(!text.contains("valid for"));
        assert!(!text.contains("NDA"));
    }

    #[test]
    fn denied_states_reason_and_remediation() {
        let text = composer(ComposerSettings::default()).compose(&draft(
            &["soc2"],
            &[],
            &[("soc2", DenialReason::NdaRequired)],
            Escalation::none(),
        ));
        assert!(text.contains("require an executed NDA before sharing:\n• SOC 2 Type II Report"));
        assert!(text.contains("complete our mutual NDA"));
        assert!(!text.contains("I'm preparing"));
    }

    #[test]
    fn company_name_used_in_remediation() {
        let settings = ComposerSettings {
            company_name: Some("Acme Cloud".into()),
            ..Default::default()
        };
        let text = composer(settings).compose(&draft(
            &["soc2"],
            &[],
            &[("soc2", DenialReason::NdaRequired)],
            Escalation::none(),
        ));
        assert!(text.contains("complete the Acme Cloud mutual NDA"));
    }

    #[test]
    fn review_hold_gets_follow_up_note() {
        let text = composer(ComposerSettings::default()).compose(&draft(
            &["pentest"],
            &[],
            &[("pentest", DenialReason::ReviewHold)],
            Escalation::to_human(RoutingReason::PolicyConflict),
        ));
        assert!(text.contains("need a review by our security team"));
        assert!(text.contains("• Penetration Test Report"));
        assert!(text.contains("follow up with you directly"));
        assert!(!text.contains("executed NDA"));
    }

    #[test]
    fn legal_escalation_adds_note() {
        let text = composer(ComposerSettings::default()).compose(&draft(
            &["iso27001"],
            &["iso27001"],
            &[],
            Escalation::to_human(RoutingReason::LegalReview),
        ));
        assert!(text.contains("legal and contract questions"));
        assert!(text.contains("ISO 27001 Certificate"));
    }

    #[test]
    fn greets_by_name_and_uses_signature() {
        let settings = ComposerSettings {
            signature: "Trust Team".into(),
            link_expiration_days: 14,
            ..Default::default()
        };
        let mut d = draft(&["soc2"], &["soc2"], &[], Escalation::none());
        d.sender_name = Some("John Doe".into());
        d.policy.share_method = ShareMethod::Single(DeliveryMethod::ExpiringLink);
        d.policy.link_expiration = Some("P14D".into());
        let text = composer(settings).compose(&d);
        assert!(text.starts_with("Hi John Doe,"));
        assert!(text.contains("valid for 14 days"));
        assert!(text.trim_end().ends_with("Trust Team"));
    }

    #[test]
    fn compose_is_deterministic() {
        let c = composer(ComposerSettings::default());
        let d = draft(
            &["soc2", "iso27001"],
            &["iso27001"],
            &[("soc2", DenialReason::NdaRequired)],
            Escalation::none(),
        );
        assert_eq!(c.compose(&d), c.compose(&d));
    }
}
