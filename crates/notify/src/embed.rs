//! Discord embed rendering.
//!
//! Evaluated incidents get a score-coloured embed with one field pair per
//! assessment phase. Plain incidents get a neutral summary embed.

use chrono::{DateTime, Utc};
use relay_core::{Evaluation, Incident};
use serde::Serialize;

/// Discord caps embed field values at 1024 characters.
pub const FIELD_LIMIT: usize = 1024;
const TITLE_LIMIT: usize = 256;
const DESCRIPTION_LIMIT: usize = 4096;

const GREEN: u32 = 0x2ECC71;
const AMBER: u32 = 0xF39C12;
const RED: u32 = 0xE74C3C;
const NEUTRAL: u32 = 0x5865F2;

const FOOTER: &str = "incident-relay";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Embed {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub color: u32,
    pub fields: Vec<EmbedField>,
    pub footer: EmbedFooter,
    pub timestamp: String,
}

/// Cut `text` to at most `max` characters, marking the cut with `...`.
/// Empty text renders as an em dash so Discord accepts the field.
pub fn truncate(text: &str, max: usize) -> String {
    let text = text.trim();
    if text.is_empty() {
        return "—".to_string();
    }
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}

/// Embed colour for an overall score.
pub fn score_color(score: u8) -> u32 {
    match score {
        80..=u8::MAX => GREEN,
        60..=79 => AMBER,
        _ => RED,
    }
}

fn check(flag: bool) -> &'static str {
    if flag {
        "✅"
    } else {
        "❌"
    }
}

fn field(name: &str, value: &str, inline: bool) -> EmbedField {
    EmbedField {
        name: name.to_string(),
        value: truncate(value, FIELD_LIMIT),
        inline,
    }
}

/// Render the embed for an incident.
///
/// `browse_base` is the tracker base URL used to link the incident.
pub fn build_embed(
    incident: &Incident,
    evaluation: Option<&Evaluation>,
    browse_base: Option<&str>,
    now: DateTime<Utc>,
) -> Embed {
    let title = truncate(&format!("{} — {}", incident.key, incident.title), TITLE_LIMIT);
    let url = browse_base.map(|base| format!("{}/browse/{}", base.trim_end_matches('/'), incident.key));

    let (color, description, fields) = match evaluation {
        Some(eval) => (score_color(eval.overall_score()), None, evaluation_fields(eval)),
        None => (
            NEUTRAL,
            Some(truncate(&incident.description, DESCRIPTION_LIMIT)),
            summary_fields(incident),
        ),
    };

    Embed {
        title,
        url,
        description,
        color,
        fields,
        footer: EmbedFooter {
            text: FOOTER.to_string(),
        },
        timestamp: now.to_rfc3339(),
    }
}

fn evaluation_fields(eval: &Evaluation) -> Vec<EmbedField> {
    let d = &eval.description;
    let mut fields = vec![
        field(
            "Description",
            &format!(
                "**{}/100** · Clarity: {} · Root cause: {} · Impact: {}",
                d.score,
                d.clarity,
                d.root_cause,
                check(d.impact_defined)
            ),
            false,
        ),
        field("Description notes", &d.observations, false),
    ];

    match &eval.conclusion {
        Some(c) => {
            fields.push(field(
                "Conclusion",
                &format!(
                    "**{}/100** · Consistent: {} · Actions: {} · Owners: {}",
                    c.score,
                    check(c.consistent_with_description),
                    check(c.actions_defined),
                    check(c.owners_assigned)
                ),
                false,
            ));
            fields.push(field("Conclusion notes", &c.observations, false));
        }
        None => fields.push(field(
            "Conclusion",
            "No conclusion yet, evaluation pending",
            false,
        )),
    }
    fields
}

fn summary_fields(incident: &Incident) -> Vec<EmbedField> {
    let date = |ts: DateTime<Utc>| ts.format("%Y-%m-%d %H:%M UTC").to_string();
    vec![
        field("Status", &incident.status, true),
        field("Type", &incident.issue_type, true),
        field("Assignee", &incident.assignee, true),
        field("Created", &date(incident.created_at), true),
        field("Updated", &date(incident.updated_at), true),
    ]
}
