use serde::{Deserialize, Serialize};

/// Quality assessment of an incident's title and description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptionAssessment {
    /// High / Medium / Low.
    pub clarity: String,
    /// Identified / Partial / Missing.
    pub root_cause: String,
    pub impact_defined: bool,
    /// 0-100.
    pub score: u8,
    #[serde(default)]
    pub observations: String,
}

/// Quality assessment of an incident's conclusion text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConclusionAssessment {
    pub consistent_with_description: bool,
    pub actions_defined: bool,
    pub owners_assigned: bool,
    /// 0-100.
    pub score: u8,
    #[serde(default)]
    pub observations: String,
}

/// Result of evaluating one incident.
///
/// `conclusion` is absent when the incident has no conclusion text yet or
/// when the second phase could not produce a usable answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub description: DescriptionAssessment,
    pub conclusion: Option<ConclusionAssessment>,
}

impl Evaluation {
    /// Description score, averaged with the conclusion score when present.
    pub fn overall_score(&self) -> u8 {
        match &self.conclusion {
            Some(c) => ((self.description.score as u16 + c.score as u16) / 2) as u8,
            None => self.description.score,
        }
    }

    /// Compact score label for log lines, e.g. `D:72/100 C:80/100`.
    pub fn score_label(&self) -> String {
        let mut label = format!("D:{}/100", self.description.score);
        if let Some(c) = &self.conclusion {
            label.push_str(&format!(" C:{}/100", c.score));
        }
        label
    }
}
