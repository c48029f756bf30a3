use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub grade_level: Option<String>,
    #[serde(default)]
    pub birth_date: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl Student {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolYear {
    pub id: String,
    pub name: String,
    pub start_date: String,
    pub end_date: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub student_id: String,
    pub school_year_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub credits: f64,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub ignore_attendance_weight: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeCategory {
    pub id: String,
    pub course_id: String,
    pub name: String,
    /// Fraction of the academic grade. Only the proportions among populated
    /// categories matter when computing.
    pub weight: f64,
    pub sort_order: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeEntry {
    pub id: String,
    pub category_id: String,
    pub date: String,
    pub score: f64,
    pub max_score: f64,
    #[serde(default)]
    pub notes: Option<String>,
}

impl GradeEntry {
    /// `score / max_score * 100`, unclamped. `None` when the entry cannot
    /// produce a finite percentage (`max_score <= 0` or non-finite inputs).
    pub fn percent(&self) -> Option<f64> {
        if !self.score.is_finite() || !self.max_score.is_finite() || self.max_score <= 0.0 {
            return None;
        }
        Some(self.score / self.max_score * 100.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Half,
    Sick,
    Holiday,
}

impl AttendanceStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "present" => Some(Self::Present),
            "absent" => Some(Self::Absent),
            "half" => Some(Self::Half),
            "sick" => Some(Self::Sick),
            "holiday" => Some(Self::Holiday),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
            Self::Half => "half",
            Self::Sick => "sick",
            Self::Holiday => "holiday",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: String,
    pub student_id: String,
    pub school_year_id: String,
    /// ISO day, `YYYY-MM-DD`.
    pub date: String,
    pub status: AttendanceStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingScaleRow {
    #[serde(default)]
    pub id: Option<String>,
    pub letter_grade: String,
    pub min_percentage: f64,
    pub gpa_points: f64,
}

impl GradingScaleRow {
    pub fn new(letter_grade: &str, min_percentage: f64, gpa_points: f64) -> Self {
        Self {
            id: None,
            letter_grade: letter_grade.to_string(),
            min_percentage,
            gpa_points,
        }
    }
}
