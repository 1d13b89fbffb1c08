use serde::Deserialize;
use serde::Serialize;

use crate::proposal::Proposal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    pub reasons: Vec<String>,
    pub write_operations: bool,
    pub trust_required: bool,
    pub trust_satisfied: bool,
}

/// Trust decision recorded on a run's review, when one exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustState {
    #[serde(default)]
    pub trust_satisfied: bool,
}

/// Classifies a proposal list. Reasons follow proposal order and are not
/// de-duplicated.
///
/// HIGH means trust is required by a write and not yet satisfied; once the
/// review satisfies it the run drops back to MEDIUM.
pub fn assess(proposals: &[Proposal], trust: Option<&TrustState>) -> RiskAssessment {
    let mut reasons = Vec::new();
    let mut write_operations = false;
    let mut trust_required = false;

    for proposal in proposals.iter().filter(|p| p.is_write()) {
        write_operations = true;
        reasons.push(format!("Proposes {} operation", proposal.action_label()));
        if proposal.trust_required {
            trust_required = true;
            reasons.push("Trust required for this operation".to_string());
        }
    }

    let trust_satisfied = trust.is_some_and(|state| state.trust_satisfied);
    if trust_required && trust_satisfied {
        reasons.push("Trust requirement satisfied".to_string());
    }

    let level = if trust_required && !trust_satisfied {
        RiskLevel::High
    } else if write_operations {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    RiskAssessment {
        level,
        reasons,
        write_operations,
        trust_required,
        trust_satisfied,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn no_writes_is_low_risk() {
        let assessment = assess(&[Proposal::new("read", "a.rs")], None);
        assert_eq!(
            assessment,
            RiskAssessment {
                level: RiskLevel::Low,
                reasons: Vec::new(),
                write_operations: false,
                trust_required: false,
                trust_satisfied: false,
            }
        );
    }

    #[test]
    fn empty_list_is_low_risk() {
        assert_eq!(assess(&[], None).level, RiskLevel::Low);
    }

    #[test]
    fn writes_are_medium_with_one_reason_each() {
        let proposals = vec![
            Proposal::new("Write", "a.rs"),
            Proposal::new("delete", "b.rs"),
        ];
        let assessment = assess(&proposals, None);
        assert_eq!(assessment.level, RiskLevel::Medium);
        assert!(assessment.write_operations);
        assert_eq!(
            assessment.reasons,
            vec![
                "Proposes write operation".to_string(),
                "Proposes delete operation".to_string(),
            ]
        );
    }

    #[test]
    fn unsatisfied_trust_is_high_with_a_reason_per_proposal() {
        let proposals = vec![
            Proposal::new("write", "a.rs").with_trust_required(),
            Proposal::new("edit", "b.rs").with_trust_required(),
        ];
        let assessment = assess(&proposals, Some(&TrustState::default()));
        assert_eq!(assessment.level, RiskLevel::High);
        assert!(assessment.trust_required);
        assert!(!assessment.trust_satisfied);
        assert_eq!(
            assessment.reasons,
            vec![
                "Proposes write operation".to_string(),
                "Trust required for this operation".to_string(),
                "Proposes edit operation".to_string(),
                "Trust required for this operation".to_string(),
            ]
        );
    }

    #[test]
    fn satisfied_trust_drops_to_medium_with_confirmation() {
        let proposals = vec![Proposal::new("write", "a.rs").with_trust_required()];
        let assessment = assess(
            &proposals,
            Some(&TrustState {
                trust_satisfied: true,
            }),
        );
        assert_eq!(assessment.level, RiskLevel::Medium);
        assert!(assessment.trust_required);
        assert!(assessment.trust_satisfied);
        assert_eq!(
            assessment.reasons.last().map(String::as_str),
            Some("Trust requirement satisfied")
        );
    }

    #[test]
    fn missing_review_counts_as_unsatisfied() {
        let proposals = vec![Proposal::new("rename", "a.rs").with_trust_required()];
        let assessment = assess(&proposals, None);
        assert_eq!(assessment.level, RiskLevel::High);
        assert!(!assessment.trust_satisfied);
    }

    #[test]
    fn trust_flag_on_non_write_is_ignored() {
        let proposals = vec![Proposal::new("read", "a.rs").with_trust_required()];
        let assessment = assess(&proposals, None);
        assert_eq!(assessment.level, RiskLevel::Low);
        assert!(!assessment.trust_required);
    }

    #[test]
    fn level_labels_are_uppercase() {
        assert_eq!(RiskLevel::Medium.label(), "MEDIUM");
        assert_eq!(
            serde_json::to_value(RiskLevel::High).expect("json"),
            serde_json::json!("HIGH")
        );
    }
}
