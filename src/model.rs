use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A persisted student as returned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub roll_number: Option<i64>,
    pub full_name: String,
    pub class_id: String,
    pub age: Option<i64>,
    pub phone: Option<String>,
    pub alt_phone: Option<String>,
    pub created_at: String,
}

/// Student fields the caller controls. Used for manual entry, edits and import commits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStudent {
    #[serde(default)]
    pub roll_number: Option<i64>,
    pub full_name: String,
    pub class_id: String,
    #[serde(default)]
    pub age: Option<i64>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub alt_phone: Option<String>,
}

impl NewStudent {
    /// Trims text fields and turns blank optional text into `None`.
    pub fn normalized(mut self) -> Self {
        self.full_name = self.full_name.trim().to_string();
        self.class_id = self.class_id.trim().to_string();
        self.phone = blank_to_none(self.phone);
        self.alt_phone = blank_to_none(self.alt_phone);
        self
    }
}

fn blank_to_none(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AttendanceStatus {
    #[serde(rename = "P")]
    Present,
    #[serde(rename = "PR")]
    Permission,
    #[serde(rename = "A")]
    Absent,
}

impl AttendanceStatus {
    pub fn code(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "P",
            AttendanceStatus::Permission => "PR",
            AttendanceStatus::Absent => "A",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for AttendanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "P" => Ok(AttendanceStatus::Present),
            "PR" => Ok(AttendanceStatus::Permission),
            "A" => Ok(AttendanceStatus::Absent),
            other => Err(format!("unknown attendance status: {other}")),
        }
    }
}

/// A persisted attendance row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRow {
    pub student_id: String,
    pub class_id: String,
    pub date: String,
    pub status: AttendanceStatus,
}
