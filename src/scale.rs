use crate::model::GradingScaleRow;
use serde::Serialize;

/// Tolerance applied below each threshold so values like 89.995 still reach
/// a 90% floor.
pub const BOUNDARY_EPSILON: f64 = 0.01;

/// Letter returned when no row matches.
pub const FALLBACK_LETTER: &str = "F";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleKind {
    Simple,
    Advanced,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingScale {
    rows: Vec<GradingScaleRow>,
}

impl GradingScale {
    pub fn new(rows: Vec<GradingScaleRow>) -> Self {
        Self { rows }
    }

    /// A, B, C, D, F.
    pub fn simple() -> Self {
        Self::new(vec![
            GradingScaleRow::new("A", 90.0, 4.0),
            GradingScaleRow::new("B", 80.0, 3.0),
            GradingScaleRow::new("C", 70.0, 2.0),
            GradingScaleRow::new("D", 60.0, 1.0),
            GradingScaleRow::new("F", 0.0, 0.0),
        ])
    }

    /// Plus/minus scale, 13 tiers.
    pub fn advanced() -> Self {
        Self::new(vec![
            GradingScaleRow::new("A+", 97.0, 4.0),
            GradingScaleRow::new("A", 93.0, 4.0),
            GradingScaleRow::new("A-", 90.0, 3.7),
            GradingScaleRow::new("B+", 87.0, 3.3),
            GradingScaleRow::new("B", 83.0, 3.0),
            GradingScaleRow::new("B-", 80.0, 2.7),
            GradingScaleRow::new("C+", 77.0, 2.3),
            GradingScaleRow::new("C", 73.0, 2.0),
            GradingScaleRow::new("C-", 70.0, 1.7),
            GradingScaleRow::new("D+", 67.0, 1.3),
            GradingScaleRow::new("D", 63.0, 1.0),
            GradingScaleRow::new("D-", 60.0, 0.7),
            GradingScaleRow::new("F", 0.0, 0.0),
        ])
    }

    pub fn rows(&self) -> &[GradingScaleRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<GradingScaleRow> {
        self.rows
    }

    pub fn is_simple(&self) -> bool {
        self.rows.len() == Self::simple().rows.len()
    }

    pub fn kind(&self) -> ScaleKind {
        if same_thresholds(&self.rows, &Self::simple().rows) {
            ScaleKind::Simple
        } else if same_thresholds(&self.rows, &Self::advanced().rows) {
            ScaleKind::Advanced
        } else {
            ScaleKind::Custom
        }
    }

    /// Simple and advanced swap; anything that is not 5 rows long is treated
    /// as "not simple" and becomes simple.
    pub fn toggled(&self) -> Self {
        if self.is_simple() {
            Self::advanced()
        } else {
            Self::simple()
        }
    }

    /// Rows ordered by `min_percentage` descending. Ties keep input order.
    pub fn sorted_desc(&self) -> Vec<&GradingScaleRow> {
        let mut sorted: Vec<&GradingScaleRow> = self.rows.iter().collect();
        sorted.sort_by(|a, b| {
            b.min_percentage
                .partial_cmp(&a.min_percentage)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        sorted
    }

    pub fn letter_for(&self, percentage: Option<f64>) -> Option<String> {
        let pct = percentage?;
        for row in self.sorted_desc() {
            if pct >= row.min_percentage - BOUNDARY_EPSILON {
                return Some(row.letter_grade.clone());
            }
        }
        Some(FALLBACK_LETTER.to_string())
    }

    /// First row with an exactly matching letter.
    pub fn points_for(&self, letter_grade: &str) -> Option<f64> {
        self.rows
            .iter()
            .find(|r| r.letter_grade == letter_grade)
            .map(|r| r.gpa_points)
    }
}

impl Default for GradingScale {
    fn default() -> Self {
        Self::simple()
    }
}

fn same_thresholds(a: &[GradingScaleRow], b: &[GradingScaleRow]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|(x, y)| {
            x.letter_grade == y.letter_grade
                && x.min_percentage == y.min_percentage
                && x.gpa_points == y.gpa_points
        })
}

/// Checks user-supplied rows before they replace the active scale.
pub fn validate_rows(rows: &[GradingScaleRow]) -> Result<(), String> {
    if rows.is_empty() {
        return Err("grading scale must have at least one row".to_string());
    }
    let mut seen: Vec<&str> = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        let letter = row.letter_grade.trim();
        if letter.is_empty() {
            return Err(format!("row {}: letterGrade must not be empty", i));
        }
        if letter.chars().count() > 8 {
            return Err(format!("row {}: letterGrade is too long", i));
        }
        if seen.contains(&letter) {
            return Err(format!("row {}: duplicate letterGrade {}", i, letter));
        }
        seen.push(letter);
        if !row.min_percentage.is_finite() {
            return Err(format!("row {}: minPercentage must be a finite number", i));
        }
        if !row.gpa_points.is_finite() || row.gpa_points < 0.0 {
            return Err(format!("row {}: gpaPoints must be a number >= 0", i));
        }
    }
    Ok(())
}
