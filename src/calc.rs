use crate::model::{AttendanceRecord, AttendanceStatus, Course, GradeEntry};
use crate::scale::GradingScale;
use serde::Serialize;
use std::collections::BTreeMap;

/// Share of the final grade taken from the academic grade when attendance
/// is blended in.
pub const ACADEMIC_SHARE: f64 = 0.67;
/// Share taken from the attendance percentage.
pub const ATTENDANCE_SHARE: f64 = 0.33;

/// Everything the engine needs besides the records themselves. Built by the
/// caller for each computation; the engine keeps no ambient state.
#[derive(Debug, Clone, Default)]
pub struct GradingConfig {
    pub scale: GradingScale,
}

impl GradingConfig {
    pub fn new(scale: GradingScale) -> Self {
        Self { scale }
    }
}

/// Unweighted mean of entry percentages. Entries that cannot produce a
/// percentage (non-positive `max_score`) are skipped; `None` when nothing
/// is left.
pub fn category_average(grades: &[GradeEntry]) -> Option<f64> {
    let mut sum = 0.0_f64;
    let mut count = 0_usize;
    for g in grades {
        let Some(pct) = g.percent() else {
            continue;
        };
        sum += pct;
        count += 1;
    }
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategoryInput {
    pub average: Option<f64>,
    pub weight: f64,
}

/// Weighted mean over categories that have data and a positive weight.
/// Weights are renormalized over that subset.
pub fn academic_grade(categories: &[CategoryInput]) -> Option<f64> {
    let mut weighted_sum = 0.0_f64;
    let mut total_weight = 0.0_f64;
    for c in categories {
        let Some(avg) = c.average else {
            continue;
        };
        if c.weight.is_nan() || c.weight <= 0.0 {
            continue;
        }
        weighted_sum += avg * c.weight;
        total_weight += c.weight;
    }
    if total_weight > 0.0 {
        Some(weighted_sum / total_weight)
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseGrade {
    pub academic_grade: Option<f64>,
    pub attendance_grade: Option<f64>,
    pub final_grade: Option<f64>,
    pub letter_grade: Option<String>,
}

pub fn course_grade(
    course: &Course,
    categories: &[CategoryInput],
    attendance_pct: Option<f64>,
    config: &GradingConfig,
) -> CourseGrade {
    let academic = academic_grade(categories);

    let final_grade = if course.ignore_attendance_weight {
        academic
    } else {
        match (academic, attendance_pct) {
            (Some(a), Some(att)) => Some(a * ACADEMIC_SHARE + att * ATTENDANCE_SHARE),
            (Some(a), None) => Some(a),
            _ => None,
        }
    };

    CourseGrade {
        academic_grade: academic,
        attendance_grade: attendance_pct,
        final_grade,
        letter_grade: config.scale.letter_for(final_grade),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceStats {
    pub total: usize,
    pub present: usize,
    pub absent: usize,
    pub percentage: Option<f64>,
}

/// Counts every record toward `total`, but only `present` toward the
/// percentage. Half, sick and holiday days lower the percentage.
pub fn attendance_stats(records: &[AttendanceRecord]) -> AttendanceStats {
    let total = records.len();
    let present = records
        .iter()
        .filter(|r| r.status == AttendanceStatus::Present)
        .count();
    let absent = records
        .iter()
        .filter(|r| r.status == AttendanceStatus::Absent)
        .count();
    let percentage = if total > 0 {
        Some(present as f64 / total as f64 * 100.0)
    } else {
        None
    };
    AttendanceStats {
        total,
        present,
        absent,
        percentage,
    }
}

/// Prefix match on the record date (`YYYY-MM`).
pub fn filter_month<'a>(records: &'a [AttendanceRecord], month: &str) -> Vec<&'a AttendanceRecord> {
    records.iter().filter(|r| r.date.starts_with(month)).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyAttendance {
    pub month: String,
    #[serde(flatten)]
    pub stats: AttendanceStats,
}

/// Per-month stats, newest month first.
pub fn attendance_by_month(records: &[AttendanceRecord]) -> Vec<MonthlyAttendance> {
    let mut by_month: BTreeMap<String, Vec<AttendanceRecord>> = BTreeMap::new();
    for r in records {
        let month: String = r.date.chars().take(7).collect();
        by_month.entry(month).or_default().push(r.clone());
    }
    by_month
        .into_iter()
        .rev()
        .map(|(month, rs)| MonthlyAttendance {
            month,
            stats: attendance_stats(&rs),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct GpaInput {
    pub letter_grade: Option<String>,
    pub credits: f64,
}

/// Credit-weighted GPA. Courses without a letter or without positive credits
/// are skipped. A letter missing from the scale earns 0 points while its
/// credits still count.
pub fn gpa(courses: &[GpaInput], scale: &GradingScale) -> Option<f64> {
    let mut points = 0.0_f64;
    let mut credits = 0.0_f64;
    for c in courses {
        let Some(letter) = c.letter_grade.as_deref() else {
            continue;
        };
        if c.credits.is_nan() || c.credits <= 0.0 {
            continue;
        }
        points += scale.points_for(letter).unwrap_or(0.0) * c.credits;
        credits += c.credits;
    }
    if credits > 0.0 {
        Some(points / credits)
    } else {
        None
    }
}

/// Fixed-decimal display string, `None` passes through.
pub fn format_fixed(value: Option<f64>, decimals: usize) -> Option<String> {
    value.map(|v| format!("{:.*}", decimals, v))
}
