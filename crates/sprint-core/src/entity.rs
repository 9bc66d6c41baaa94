use crate::error::{Result, SprintError};
use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// SprintPlanningEntity
// ---------------------------------------------------------------------------

/// One team member's record within one sprint.
///
/// `id` doubles as the partition key and is always derived from the four
/// scope fields; it is never taken from client input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SprintPlanningEntity {
    pub id: String,
    pub employer: String,
    pub sprint_id: String,
    pub team: String,
    pub team_member: String,
    #[serde(default)]
    pub points: Option<f64>,
}

impl SprintPlanningEntity {
    pub fn in_scope(&self, employer: &str, team: &str, sprint_id: &str) -> bool {
        self.employer == employer && self.team == team && self.sprint_id == sprint_id
    }
}

// ---------------------------------------------------------------------------
// Identifier
// ---------------------------------------------------------------------------

/// Separator-free concatenation of the identity tuple.
///
/// Field boundaries are not encoded, so `("ab", "c", ..)` and `("a", "bc", ..)`
/// produce the same id. Use [`IdScheme::Delimited`] when that matters.
pub fn compute_id(employer: &str, team: &str, sprint_id: &str, team_member: &str) -> String {
    let mut id =
        String::with_capacity(employer.len() + team.len() + sprint_id.len() + team_member.len());
    id.push_str(employer);
    id.push_str(team);
    id.push_str(sprint_id);
    id.push_str(team_member);
    id
}

const DELIMITER: char = '|';
const ESCAPE: char = '\\';

fn push_escaped(out: &mut String, field: &str) {
    for c in field.chars() {
        if c == DELIMITER || c == ESCAPE {
            out.push(ESCAPE);
        }
        out.push(c);
    }
}

/// How document ids are derived from the identity tuple.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdScheme {
    /// Legacy concatenation, see [`compute_id`].
    #[default]
    Concat,
    /// Escaped fields joined with `|`; injective over all tuples.
    Delimited,
}

impl IdScheme {
    pub fn compute(self, employer: &str, team: &str, sprint_id: &str, team_member: &str) -> String {
        match self {
            IdScheme::Concat => compute_id(employer, team, sprint_id, team_member),
            IdScheme::Delimited => {
                let mut id = String::new();
                for (i, field) in [employer, team, sprint_id, team_member].iter().enumerate() {
                    if i > 0 {
                        id.push(DELIMITER);
                    }
                    push_escaped(&mut id, field);
                }
                id
            }
        }
    }
}

impl std::str::FromStr for IdScheme {
    type Err = SprintError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "concat" => Ok(IdScheme::Concat),
            "delimited" => Ok(IdScheme::Delimited),
            other => Err(SprintError::ConfigInvalid(format!(
                "unknown id scheme '{other}' (expected 'concat' or 'delimited')"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Write requests
// ---------------------------------------------------------------------------

/// Which endpoint a write arrived through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePath {
    /// `createSprintPlanTeamMember`: registers the member and clears `points`.
    TeamMember,
    /// `createSprintPlan`: full write including `points`.
    SprintPlan,
}

impl WritePath {
    pub fn keeps_points(self) -> bool {
        matches!(self, WritePath::SprintPlan)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WritePath::TeamMember => "createSprintPlanTeamMember",
            WritePath::SprintPlan => "createSprintPlan",
        }
    }
}

/// Inbound write payload. Every field is optional at the wire level so that
/// a missing field is reported by [`SprintPlanRequest::missing_field`] rather
/// than as a parse failure. Text fields also accept JSON numbers, kept as
/// their JSON text. A client-supplied `id` is ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SprintPlanRequest {
    #[serde(default, deserialize_with = "text_or_number")]
    pub employer: Option<String>,
    #[serde(default, deserialize_with = "text_or_number")]
    pub team: Option<String>,
    #[serde(default, deserialize_with = "text_or_number")]
    pub sprint_id: Option<String>,
    #[serde(default, deserialize_with = "text_or_number")]
    pub team_member: Option<String>,
    #[serde(default)]
    pub points: Option<f64>,
}

fn text_or_number<'de, D>(de: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Text {
        Str(String),
        Num(serde_json::Number),
    }

    Ok(Option::<Text>::deserialize(de)?.map(|t| match t {
        Text::Str(s) => s,
        Text::Num(n) => n.to_string(),
    }))
}

fn is_blank(field: &Option<String>) -> bool {
    field.as_deref().map_or(true, |s| s.trim().is_empty())
}

impl SprintPlanRequest {
    /// First required field that is absent, empty, or whitespace-only.
    pub fn missing_field(&self) -> Option<&'static str> {
        if is_blank(&self.employer) {
            Some("employer")
        } else if is_blank(&self.team) {
            Some("team")
        } else if is_blank(&self.team_member) {
            Some("teamMember")
        } else if is_blank(&self.sprint_id) {
            Some("sprintId")
        } else {
            None
        }
    }

    /// Build the complete entity to persist. Field values are kept verbatim.
    pub fn into_entity(self, path: WritePath, scheme: IdScheme) -> Result<SprintPlanningEntity> {
        if let Some(field) = self.missing_field() {
            return Err(SprintError::MissingField(field));
        }
        let employer = self.employer.unwrap_or_default();
        let team = self.team.unwrap_or_default();
        let sprint_id = self.sprint_id.unwrap_or_default();
        let team_member = self.team_member.unwrap_or_default();
        let id = scheme.compute(&employer, &team, &sprint_id, &team_member);
        Ok(SprintPlanningEntity {
            id,
            employer,
            sprint_id,
            team,
            team_member,
            points: if path.keeps_points() { self.points } else { None },
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
