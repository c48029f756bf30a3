use crate::db;
use crate::model::{
    AttendanceRecord, Course, GradeCategory, GradeEntry, GradingScaleRow, SchoolYear, Student,
};
use crate::scale::{self, GradingScale};
use crate::store;
use anyhow::{anyhow, Context};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

pub const SNAPSHOT_FORMAT_V1: &str = "gradebook-snapshot-v1";

/// Whole-store JSON document. On import every collection is optional; the
/// ones present replace what is stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub app_version: Option<String>,
    #[serde(default)]
    pub exported_at: Option<String>,
    #[serde(default)]
    pub students: Option<Vec<Student>>,
    #[serde(default)]
    pub school_years: Option<Vec<SchoolYear>>,
    #[serde(default)]
    pub grading_scale: Option<Vec<GradingScaleRow>>,
    #[serde(default)]
    pub courses: Option<Vec<Course>>,
    #[serde(default)]
    pub grade_categories: Option<Vec<GradeCategory>>,
    #[serde(default)]
    pub grades: Option<Vec<GradeEntry>>,
    #[serde(default)]
    pub attendance: Option<Vec<AttendanceRecord>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub students: usize,
    pub school_years: usize,
    pub grading_scale: usize,
    pub courses: usize,
    pub grade_categories: usize,
    pub grades: usize,
    pub attendance: usize,
}

fn collect<T>(
    conn: &Connection,
    sql: &str,
    map: impl FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
) -> anyhow::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], map)?.collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn export_snapshot(conn: &Connection) -> anyhow::Result<Snapshot> {
    let students = store::list_students(conn)?;
    let school_years = store::list_school_years(conn)?;
    let grading_scale = store::load_grading_scale(conn)?.into_rows();

    let course_ids = collect(conn, "SELECT id FROM courses ORDER BY created_at, id", |r| {
        r.get::<_, String>(0)
    })?;
    let mut courses = Vec::with_capacity(course_ids.len());
    let mut grade_categories = Vec::new();
    let mut grades = Vec::new();
    for id in &course_ids {
        if let Some(c) = store::get_course(conn, id)? {
            courses.push(c);
        }
        for cat in store::list_categories(conn, id)? {
            grades.extend(store::list_grades(conn, &cat.id)?);
            grade_categories.push(cat);
        }
    }

    let pairs = collect(
        conn,
        "SELECT DISTINCT student_id, school_year_id FROM attendance ORDER BY student_id, school_year_id",
        |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)),
    )?;
    let mut attendance = Vec::new();
    for (student_id, year_id) in &pairs {
        attendance.extend(store::list_attendance(conn, student_id, year_id, None)?);
    }

    Ok(Snapshot {
        format: Some(SNAPSHOT_FORMAT_V1.to_string()),
        app_version: Some(env!("CARGO_PKG_VERSION").to_string()),
        exported_at: Some(db::now_rfc3339()),
        students: Some(students),
        school_years: Some(school_years),
        grading_scale: Some(grading_scale),
        courses: Some(courses),
        grade_categories: Some(grade_categories),
        grades: Some(grades),
        attendance: Some(attendance),
    })
}

pub fn export_json(conn: &Connection) -> anyhow::Result<String> {
    let snapshot = export_snapshot(conn)?;
    serde_json::to_string_pretty(&snapshot).context("failed to serialize snapshot")
}

pub fn parse_snapshot(text: &str) -> anyhow::Result<Snapshot> {
    let snapshot: Snapshot = serde_json::from_str(text).context("snapshot is invalid JSON")?;
    if let Some(format) = snapshot.format.as_deref() {
        if format != SNAPSHOT_FORMAT_V1 {
            return Err(anyhow!("unsupported snapshot format: {}", format));
        }
    }
    if let Some(rows) = snapshot.grading_scale.as_deref() {
        scale::validate_rows(rows).map_err(|m| anyhow!("gradingScale: {}", m))?;
    }
    if let Some(years) = snapshot.school_years.as_deref() {
        let active = years.iter().filter(|y| y.is_active).count();
        if active != 1 {
            return Err(anyhow!(
                "schoolYears: exactly one active year required, found {}",
                active
            ));
        }
    }
    Ok(snapshot)
}

/// Replaces each collection present in `snapshot` inside one transaction.
/// Foreign keys are checked at commit, so a snapshot that leaves dangling
/// references is rejected without changing anything.
pub fn import_snapshot(conn: &Connection, snapshot: &Snapshot) -> anyhow::Result<ImportSummary> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("PRAGMA defer_foreign_keys = ON", [])?;

    // Children first so parent deletes never trip a deferred check mid-way.
    if snapshot.attendance.is_some() {
        tx.execute("DELETE FROM attendance", [])?;
    }
    if snapshot.grades.is_some() {
        tx.execute("DELETE FROM grades", [])?;
    }
    if snapshot.grade_categories.is_some() {
        tx.execute("DELETE FROM grade_categories", [])?;
    }
    if snapshot.courses.is_some() {
        tx.execute("DELETE FROM courses", [])?;
    }
    if snapshot.school_years.is_some() {
        tx.execute("DELETE FROM school_years", [])?;
    }
    if snapshot.students.is_some() {
        tx.execute("DELETE FROM students", [])?;
    }

    let mut summary = ImportSummary::default();
    if let Some(students) = &snapshot.students {
        for s in students {
            store::insert_student(&tx, s).with_context(|| format!("student {}", s.id))?;
        }
        summary.students = students.len();
    }
    if let Some(years) = &snapshot.school_years {
        for y in years {
            store::insert_school_year(&tx, y).with_context(|| format!("school year {}", y.id))?;
        }
        summary.school_years = years.len();
    }
    if let Some(rows) = &snapshot.grading_scale {
        db::write_grading_scale(&tx, &GradingScale::new(rows.clone()))?;
        summary.grading_scale = rows.len();
    }
    if let Some(courses) = &snapshot.courses {
        for c in courses {
            store::insert_course(&tx, c).with_context(|| format!("course {}", c.id))?;
        }
        summary.courses = courses.len();
    }
    if let Some(cats) = &snapshot.grade_categories {
        for c in cats {
            store::insert_category(&tx, c).with_context(|| format!("category {}", c.id))?;
        }
        summary.grade_categories = cats.len();
    }
    if let Some(grades) = &snapshot.grades {
        for g in grades {
            store::validate_grade_numbers(g.score, g.max_score)
                .map_err(|m| anyhow!("grade {}: {}", g.id, m))?;
            store::insert_grade(&tx, g).with_context(|| format!("grade {}", g.id))?;
        }
        summary.grades = grades.len();
    }
    if let Some(records) = &snapshot.attendance {
        for a in records {
            store::insert_attendance(&tx, a).with_context(|| format!("attendance {}", a.id))?;
        }
        summary.attendance = records.len();
    }

    tx.commit()
        .context("snapshot references missing records")?;
    Ok(summary)
}

/// Empties every collection and restores first-open defaults.
pub fn clear_all(conn: &Connection) -> anyhow::Result<()> {
    let tx = conn.unchecked_transaction()?;
    for table in [
        "attendance",
        "grades",
        "grade_categories",
        "courses",
        "school_years",
        "students",
        "grading_scale",
    ] {
        tx.execute(&format!("DELETE FROM {}", table), [])?;
    }
    tx.commit()?;
    db::seed_defaults(conn)
}
