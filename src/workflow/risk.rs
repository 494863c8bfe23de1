use crate::models::enums::{Severity, WorkflowIntent};

/// Outcome of the message-level risk check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskAssessment {
    pub level: Severity,
    pub escalation_required: bool,
    pub reason: Option<&'static str>,
}

struct RiskRule {
    condition: RiskCondition,
    level: Severity,
    reason: &'static str,
}

enum RiskCondition {
    AnyIntent { keywords: &'static [&'static str] },
    ForIntent {
        intent: WorkflowIntent,
        keywords: &'static [&'static str],
    },
}

static CRITICAL_KEYWORDS: &[&str] = &[
    "unconscious", "cannot breathe", "severe bleeding", "chest pain",
];

static HIGH_RISK_SYMPTOMS: &[&str] = &[
    "bleeding", "wheezing", "hypo", "very high bp", "breathless",
];

static ADHERENCE_SAFETY_KEYWORDS: &[&str] = &["side effect", "confused"];

fn risk_rules() -> Vec<RiskRule> {
    vec![
        RiskRule {
            condition: RiskCondition::AnyIntent {
                keywords: CRITICAL_KEYWORDS,
            },
            level: Severity::Critical,
            reason: "critical_red_flag",
        },
        RiskRule {
            condition: RiskCondition::ForIntent {
                intent: WorkflowIntent::SymptomReport,
                keywords: HIGH_RISK_SYMPTOMS,
            },
            level: Severity::High,
            reason: "high_risk_symptom_report",
        },
        RiskRule {
            condition: RiskCondition::ForIntent {
                intent: WorkflowIntent::AdherenceUpdate,
                keywords: ADHERENCE_SAFETY_KEYWORDS,
            },
            level: Severity::Medium,
            reason: "adherence_safety_check",
        },
    ]
}

impl RiskCondition {
    fn matches(&self, intent: WorkflowIntent, text: &str) -> bool {
        match self {
            Self::AnyIntent { keywords } => keywords.iter().any(|kw| text.contains(kw)),
            Self::ForIntent {
                intent: wanted,
                keywords,
            } => *wanted == intent && keywords.iter().any(|kw| text.contains(kw)),
        }
    }
}

/// Every matched rule escalates. No match is low risk.
pub fn assess_risk(intent: WorkflowIntent, text: &str) -> RiskAssessment {
    risk_rules()
        .into_iter()
        .find(|rule| rule.condition.matches(intent, text))
        .map(|rule| RiskAssessment {
            level: rule.level,
            escalation_required: true,
            reason: Some(rule.reason),
        })
        .unwrap_or(RiskAssessment {
            level: Severity::Low,
            escalation_required: false,
            reason: None,
        })
}
