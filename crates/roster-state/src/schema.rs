//! Wire schema for the academy backend.
//!
//! These types map 1:1 onto the JSON the backend returns and accepts:
//!
//! - `Group` / `Level`: `{ id, groupName, groupCode?, level: { id, levelName } }`
//! - `Student`: `{ id, firstName, lastName, status, promotionStatus }`
//! - `StudentGroupRow`: one `{ group, student }` row of the roster join

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Backend identifier of a student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentId(pub i64);

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Backend identifier of a group (a section of a level, e.g. "Segundo B").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub i64);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Backend identifier of an educational level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LevelId(pub i64);

/// An educational level. Its rank comes from the name, not from the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    pub id: LevelId,
    #[serde(rename = "levelName")]
    pub name: String,
}

/// A group of students within a level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    #[serde(rename = "groupName")]
    pub name: String,
    pub level: Level,
    #[serde(rename = "groupCode", default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// General enrollment status of a student (`"A"` / `"I"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EnrollmentStatus {
    Active,
    Inactive,
    /// Any code the backend sends that this client does not know.
    Unknown(String),
}

impl EnrollmentStatus {
    pub fn code(&self) -> &str {
        match self {
            EnrollmentStatus::Active => "A",
            EnrollmentStatus::Inactive => "I",
            EnrollmentStatus::Unknown(code) => code,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, EnrollmentStatus::Active)
    }
}

impl From<String> for EnrollmentStatus {
    fn from(code: String) -> Self {
        match code.as_str() {
            "A" => EnrollmentStatus::Active,
            "I" => EnrollmentStatus::Inactive,
            _ => EnrollmentStatus::Unknown(code),
        }
    }
}

impl From<EnrollmentStatus> for String {
    fn from(status: EnrollmentStatus) -> Self {
        status.code().to_string()
    }
}

/// Per-period promotion state of a student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PromotionStatus {
    #[serde(rename = "A")]
    Active,
    #[serde(rename = "R")]
    Repeating,
    #[serde(rename = "P")]
    Pending,
}

impl PromotionStatus {
    /// Single-letter wire code.
    pub fn code(self) -> &'static str {
        match self {
            PromotionStatus::Active => "A",
            PromotionStatus::Repeating => "R",
            PromotionStatus::Pending => "P",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "A" => Some(PromotionStatus::Active),
            "R" => Some(PromotionStatus::Repeating),
            "P" => Some(PromotionStatus::Pending),
            _ => None,
        }
    }
}

impl fmt::Display for PromotionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PromotionStatus::Active => "active",
            PromotionStatus::Repeating => "repeating",
            PromotionStatus::Pending => "pending",
        };
        f.write_str(label)
    }
}

impl FromStr for PromotionStatus {
    type Err = String;

    /// Accepts either the wire code (`A`, `R`, `P`) or the lowercase label.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(status) = PromotionStatus::from_code(s) {
            return Ok(status);
        }
        match s.to_ascii_lowercase().as_str() {
            "active" => Ok(PromotionStatus::Active),
            "repeating" => Ok(PromotionStatus::Repeating),
            "pending" => Ok(PromotionStatus::Pending),
            other => Err(format!("unknown promotion status: {other}")),
        }
    }
}

/// Unknown promotion codes are treated as unset rather than failing the
/// whole roster payload.
fn lenient_promotion_status<'de, D>(deserializer: D) -> Result<Option<PromotionStatus>, D::Error>
where
    D: Deserializer<'de>,
{
    let code: Option<String> = Option::deserialize(deserializer)?;
    Ok(code.as_deref().and_then(PromotionStatus::from_code))
}

/// A student as returned inside roster rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: StudentId,
    pub first_name: String,
    pub last_name: String,
    pub status: EnrollmentStatus,
    #[serde(default, deserialize_with = "lenient_promotion_status")]
    pub promotion_status: Option<PromotionStatus>,
}

impl Student {
    /// `"{firstName} {lastName}"`, as shown in the roster.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// One row of the `studentsByGroup` join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentGroupRow {
    pub group: Group,
    pub student: Student,
}

/// One entry of the bulk promotion-status payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionStatusUpdate {
    pub id: StudentId,
    pub promotion_status: PromotionStatus,
}

/// Body of the group-move endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionPayload {
    pub student_ids: Vec<StudentId>,
    pub target_group_id: GroupId,
    pub promotion_status: PromotionStatus,
}
