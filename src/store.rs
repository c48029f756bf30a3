use crate::db::now_rfc3339;
use crate::model::{
    AttendanceRecord, AttendanceStatus, Course, GradeCategory, GradeEntry, GradingScaleRow,
    SchoolYear, Student,
};
use crate::scale::GradingScale;
use crate::summary::GradeSource;
use anyhow::anyhow;
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

/// Category created alongside every new course.
#[derive(Debug, Clone, PartialEq)]
pub struct CategorySeed {
    pub name: String,
    pub weight: f64,
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn student_from_row(r: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: r.get(0)?,
        first_name: r.get(1)?,
        last_name: r.get(2)?,
        grade_level: r.get(3)?,
        birth_date: r.get(4)?,
        created_at: r.get(5)?,
        updated_at: r.get(6)?,
    })
}

fn school_year_from_row(r: &Row<'_>) -> rusqlite::Result<SchoolYear> {
    Ok(SchoolYear {
        id: r.get(0)?,
        name: r.get(1)?,
        start_date: r.get(2)?,
        end_date: r.get(3)?,
        is_active: r.get::<_, i64>(4)? != 0,
    })
}

fn course_from_row(r: &Row<'_>) -> rusqlite::Result<Course> {
    Ok(Course {
        id: r.get(0)?,
        student_id: r.get(1)?,
        school_year_id: r.get(2)?,
        name: r.get(3)?,
        description: r.get(4)?,
        credits: r.get::<_, Option<f64>>(5)?.unwrap_or(0.0),
        color: r.get(6)?,
        ignore_attendance_weight: r.get::<_, i64>(7)? != 0,
    })
}

fn category_from_row(r: &Row<'_>) -> rusqlite::Result<GradeCategory> {
    Ok(GradeCategory {
        id: r.get(0)?,
        course_id: r.get(1)?,
        name: r.get(2)?,
        weight: r.get::<_, Option<f64>>(3)?.unwrap_or(0.0),
        sort_order: r.get(4)?,
    })
}

fn grade_from_row(r: &Row<'_>) -> rusqlite::Result<GradeEntry> {
    Ok(GradeEntry {
        id: r.get(0)?,
        category_id: r.get(1)?,
        date: r.get(2)?,
        score: r.get(3)?,
        max_score: r.get(4)?,
        notes: r.get(5)?,
    })
}

fn attendance_from_row(r: &Row<'_>) -> rusqlite::Result<AttendanceRecord> {
    let status_raw: String = r.get(4)?;
    let status = AttendanceStatus::parse(&status_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("unknown attendance status: {}", status_raw).into(),
        )
    })?;
    Ok(AttendanceRecord {
        id: r.get(0)?,
        student_id: r.get(1)?,
        school_year_id: r.get(2)?,
        date: r.get(3)?,
        status,
        notes: r.get(5)?,
    })
}

const STUDENT_COLS: &str =
    "id, first_name, last_name, grade_level, birth_date, created_at, updated_at";
const SCHOOL_YEAR_COLS: &str = "id, name, start_date, end_date, is_active";
const COURSE_COLS: &str =
    "id, student_id, school_year_id, name, description, credits, color, ignore_attendance_weight";
const CATEGORY_COLS: &str = "id, course_id, name, weight, sort_order";
const GRADE_COLS: &str = "id, category_id, date, score, max_score, notes";
const ATTENDANCE_COLS: &str = "id, student_id, school_year_id, date, status, notes";

// ---------------------------------------------------------------------------
// Students

pub fn list_students(conn: &Connection) -> anyhow::Result<Vec<Student>> {
    let sql = format!(
        "SELECT {} FROM students ORDER BY last_name, first_name",
        STUDENT_COLS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], student_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_student(conn: &Connection, id: &str) -> anyhow::Result<Option<Student>> {
    let sql = format!("SELECT {} FROM students WHERE id = ?", STUDENT_COLS);
    Ok(conn.query_row(&sql, [id], student_from_row).optional()?)
}

pub fn create_student(
    conn: &Connection,
    first_name: &str,
    last_name: &str,
    grade_level: Option<&str>,
    birth_date: Option<&str>,
) -> anyhow::Result<Student> {
    let now = now_rfc3339();
    let student = Student {
        id: new_id(),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        grade_level: grade_level.map(str::to_string),
        birth_date: birth_date.map(str::to_string),
        created_at: Some(now.clone()),
        updated_at: Some(now),
    };
    insert_student(conn, &student)?;
    Ok(student)
}

pub fn insert_student(conn: &Connection, s: &Student) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO students(id, first_name, last_name, grade_level, birth_date, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &s.id,
            &s.first_name,
            &s.last_name,
            &s.grade_level,
            &s.birth_date,
            &s.created_at,
            &s.updated_at,
        ),
    )?;
    Ok(())
}

/// Writes every mutable field and stamps `updated_at`.
pub fn save_student(conn: &Connection, s: &Student) -> anyhow::Result<Student> {
    let mut saved = s.clone();
    saved.updated_at = Some(now_rfc3339());
    let changed = conn.execute(
        "UPDATE students
         SET first_name = ?, last_name = ?, grade_level = ?, birth_date = ?, updated_at = ?
         WHERE id = ?",
        (
            &saved.first_name,
            &saved.last_name,
            &saved.grade_level,
            &saved.birth_date,
            &saved.updated_at,
            &saved.id,
        ),
    )?;
    if changed == 0 {
        return Err(anyhow!("student not found: {}", s.id));
    }
    Ok(saved)
}

/// Removes the student with courses, categories, grades and attendance.
/// Returns false when the student did not exist.
pub fn delete_student(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    if get_student(conn, id)?.is_none() {
        return Ok(false);
    }
    let tx = conn.unchecked_transaction()?;
    // Explicit dependency order; the schema has no ON DELETE CASCADE.
    tx.execute(
        "DELETE FROM grades WHERE category_id IN (
           SELECT gc.id FROM grade_categories gc
           JOIN courses c ON c.id = gc.course_id
           WHERE c.student_id = ?
         )",
        [id],
    )?;
    tx.execute(
        "DELETE FROM grade_categories WHERE course_id IN (
           SELECT id FROM courses WHERE student_id = ?
         )",
        [id],
    )?;
    tx.execute("DELETE FROM courses WHERE student_id = ?", [id])?;
    tx.execute("DELETE FROM attendance WHERE student_id = ?", [id])?;
    tx.execute("DELETE FROM students WHERE id = ?", [id])?;
    tx.commit()?;
    Ok(true)
}

// ---------------------------------------------------------------------------
// School years

pub fn list_school_years(conn: &Connection) -> anyhow::Result<Vec<SchoolYear>> {
    let sql = format!(
        "SELECT {} FROM school_years ORDER BY start_date DESC, name",
        SCHOOL_YEAR_COLS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], school_year_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_school_year(conn: &Connection, id: &str) -> anyhow::Result<Option<SchoolYear>> {
    let sql = format!("SELECT {} FROM school_years WHERE id = ?", SCHOOL_YEAR_COLS);
    Ok(conn.query_row(&sql, [id], school_year_from_row).optional()?)
}

pub fn get_active_school_year(conn: &Connection) -> anyhow::Result<Option<SchoolYear>> {
    let sql = format!(
        "SELECT {} FROM school_years WHERE is_active = 1 ORDER BY start_date DESC LIMIT 1",
        SCHOOL_YEAR_COLS
    );
    Ok(conn.query_row(&sql, [], school_year_from_row).optional()?)
}

pub fn create_school_year(
    conn: &Connection,
    name: &str,
    start_date: &str,
    end_date: &str,
    is_active: bool,
) -> anyhow::Result<SchoolYear> {
    let year = SchoolYear {
        id: new_id(),
        name: name.to_string(),
        start_date: start_date.to_string(),
        end_date: end_date.to_string(),
        is_active: false,
    };
    let tx = conn.unchecked_transaction()?;
    insert_school_year(&tx, &year)?;
    if is_active {
        write_active_school_year(&tx, &year.id)?;
    }
    let stored = get_school_year(&tx, &year.id)?
        .ok_or_else(|| anyhow!("school year vanished after insert"))?;
    tx.commit()?;
    Ok(stored)
}

pub fn insert_school_year(conn: &Connection, y: &SchoolYear) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO school_years(id, name, start_date, end_date, is_active, created_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &y.id,
            &y.name,
            &y.start_date,
            &y.end_date,
            y.is_active as i64,
            now_rfc3339(),
        ),
    )?;
    Ok(())
}

/// Updates name and dates. Activation goes through `set_active_school_year`.
pub fn save_school_year(conn: &Connection, y: &SchoolYear) -> anyhow::Result<()> {
    let changed = conn.execute(
        "UPDATE school_years SET name = ?, start_date = ?, end_date = ? WHERE id = ?",
        (&y.name, &y.start_date, &y.end_date, &y.id),
    )?;
    if changed == 0 {
        return Err(anyhow!("school year not found: {}", y.id));
    }
    Ok(())
}

/// Makes `id` the only active year. Returns false when it does not exist.
pub fn set_active_school_year(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    if get_school_year(conn, id)?.is_none() {
        return Ok(false);
    }
    let tx = conn.unchecked_transaction()?;
    write_active_school_year(&tx, id)?;
    tx.commit()?;
    Ok(true)
}

fn write_active_school_year(conn: &Connection, id: &str) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE school_years SET is_active = CASE WHEN id = ? THEN 1 ELSE 0 END",
        [id],
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Grading scale

pub fn load_grading_scale(conn: &Connection) -> anyhow::Result<GradingScale> {
    let mut stmt = conn.prepare(
        "SELECT id, letter_grade, min_percentage, gpa_points
         FROM grading_scale
         ORDER BY sort_order",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok(GradingScaleRow {
                id: r.get(0)?,
                letter_grade: r.get(1)?,
                min_percentage: r.get(2)?,
                gpa_points: r.get::<_, Option<f64>>(3)?.unwrap_or(0.0),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(GradingScale::new(rows))
}

// ---------------------------------------------------------------------------
// Courses

pub fn list_courses(
    conn: &Connection,
    student_id: &str,
    school_year_id: &str,
) -> anyhow::Result<Vec<Course>> {
    let sql = format!(
        "SELECT {} FROM courses
         WHERE student_id = ? AND school_year_id = ?
         ORDER BY created_at, name",
        COURSE_COLS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map((student_id, school_year_id), course_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_course(conn: &Connection, id: &str) -> anyhow::Result<Option<Course>> {
    let sql = format!("SELECT {} FROM courses WHERE id = ?", COURSE_COLS);
    Ok(conn.query_row(&sql, [id], course_from_row).optional()?)
}

/// Inserts the course and its seed categories in one transaction.
pub fn create_course(
    conn: &Connection,
    course: &Course,
    seeds: &[CategorySeed],
) -> anyhow::Result<Vec<GradeCategory>> {
    let tx = conn.unchecked_transaction()?;
    insert_course(&tx, course)?;
    let mut created = Vec::with_capacity(seeds.len());
    for (i, seed) in seeds.iter().enumerate() {
        let cat = GradeCategory {
            id: new_id(),
            course_id: course.id.clone(),
            name: seed.name.clone(),
            weight: seed.weight,
            sort_order: i as i64,
        };
        insert_category(&tx, &cat)?;
        created.push(cat);
    }
    tx.commit()?;
    Ok(created)
}

pub fn new_course_id() -> String {
    new_id()
}

pub fn insert_course(conn: &Connection, c: &Course) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO courses(id, student_id, school_year_id, name, description, credits, color, ignore_attendance_weight, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &c.id,
            &c.student_id,
            &c.school_year_id,
            &c.name,
            &c.description,
            c.credits,
            &c.color,
            c.ignore_attendance_weight as i64,
            now_rfc3339(),
        ),
    )?;
    Ok(())
}

pub fn save_course(conn: &Connection, c: &Course) -> anyhow::Result<()> {
    let changed = conn.execute(
        "UPDATE courses
         SET name = ?, description = ?, credits = ?, color = ?, ignore_attendance_weight = ?
         WHERE id = ?",
        (
            &c.name,
            &c.description,
            c.credits,
            &c.color,
            c.ignore_attendance_weight as i64,
            &c.id,
        ),
    )?;
    if changed == 0 {
        return Err(anyhow!("course not found: {}", c.id));
    }
    Ok(())
}

/// Removes the course with its categories and grades.
pub fn delete_course(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    if get_course(conn, id)?.is_none() {
        return Ok(false);
    }
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "DELETE FROM grades WHERE category_id IN (
           SELECT id FROM grade_categories WHERE course_id = ?
         )",
        [id],
    )?;
    tx.execute("DELETE FROM grade_categories WHERE course_id = ?", [id])?;
    tx.execute("DELETE FROM courses WHERE id = ?", [id])?;
    tx.commit()?;
    Ok(true)
}

// ---------------------------------------------------------------------------
// Categories

pub fn list_categories(conn: &Connection, course_id: &str) -> anyhow::Result<Vec<GradeCategory>> {
    let sql = format!(
        "SELECT {} FROM grade_categories WHERE course_id = ? ORDER BY sort_order, name",
        CATEGORY_COLS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([course_id], category_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_category(conn: &Connection, id: &str) -> anyhow::Result<Option<GradeCategory>> {
    let sql = format!("SELECT {} FROM grade_categories WHERE id = ?", CATEGORY_COLS);
    Ok(conn.query_row(&sql, [id], category_from_row).optional()?)
}

/// Appends a category after the existing ones.
pub fn create_category(
    conn: &Connection,
    course_id: &str,
    name: &str,
    weight: f64,
) -> anyhow::Result<GradeCategory> {
    let next_sort: i64 = conn.query_row(
        "SELECT COALESCE(MAX(sort_order) + 1, 0) FROM grade_categories WHERE course_id = ?",
        [course_id],
        |r| r.get(0),
    )?;
    let cat = GradeCategory {
        id: new_id(),
        course_id: course_id.to_string(),
        name: name.to_string(),
        weight,
        sort_order: next_sort,
    };
    insert_category(conn, &cat)?;
    Ok(cat)
}

pub fn insert_category(conn: &Connection, c: &GradeCategory) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO grade_categories(id, course_id, name, weight, sort_order)
         VALUES(?, ?, ?, ?, ?)",
        (&c.id, &c.course_id, &c.name, c.weight, c.sort_order),
    )?;
    Ok(())
}

pub fn save_category(conn: &Connection, c: &GradeCategory) -> anyhow::Result<()> {
    let changed = conn.execute(
        "UPDATE grade_categories SET name = ?, weight = ?, sort_order = ? WHERE id = ?",
        (&c.name, c.weight, c.sort_order, &c.id),
    )?;
    if changed == 0 {
        return Err(anyhow!("category not found: {}", c.id));
    }
    Ok(())
}

pub fn delete_category(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    if get_category(conn, id)?.is_none() {
        return Ok(false);
    }
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM grades WHERE category_id = ?", [id])?;
    tx.execute("DELETE FROM grade_categories WHERE id = ?", [id])?;
    tx.commit()?;
    Ok(true)
}

// ---------------------------------------------------------------------------
// Grades

/// Rejects values the engine could not turn into a percentage.
pub fn validate_grade_numbers(score: f64, max_score: f64) -> Result<(), String> {
    if !score.is_finite() {
        return Err("score must be a finite number".to_string());
    }
    if !max_score.is_finite() || max_score <= 0.0 {
        return Err("maxScore must be a number > 0".to_string());
    }
    Ok(())
}

/// Newest first.
pub fn list_grades(conn: &Connection, category_id: &str) -> anyhow::Result<Vec<GradeEntry>> {
    let sql = format!(
        "SELECT {} FROM grades WHERE category_id = ? ORDER BY date DESC, created_at DESC",
        GRADE_COLS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([category_id], grade_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_grade(conn: &Connection, id: &str) -> anyhow::Result<Option<GradeEntry>> {
    let sql = format!("SELECT {} FROM grades WHERE id = ?", GRADE_COLS);
    Ok(conn.query_row(&sql, [id], grade_from_row).optional()?)
}

pub fn create_grade(
    conn: &Connection,
    category_id: &str,
    date: &str,
    score: f64,
    max_score: f64,
    notes: Option<&str>,
) -> anyhow::Result<GradeEntry> {
    validate_grade_numbers(score, max_score).map_err(|m| anyhow!(m))?;
    let entry = GradeEntry {
        id: new_id(),
        category_id: category_id.to_string(),
        date: date.to_string(),
        score,
        max_score,
        notes: notes.map(str::to_string),
    };
    insert_grade(conn, &entry)?;
    Ok(entry)
}

pub fn insert_grade(conn: &Connection, g: &GradeEntry) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO grades(id, category_id, date, score, max_score, notes, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &g.id,
            &g.category_id,
            &g.date,
            g.score,
            g.max_score,
            &g.notes,
            now_rfc3339(),
        ),
    )?;
    Ok(())
}

pub fn save_grade(conn: &Connection, g: &GradeEntry) -> anyhow::Result<()> {
    validate_grade_numbers(g.score, g.max_score).map_err(|m| anyhow!(m))?;
    let changed = conn.execute(
        "UPDATE grades SET date = ?, score = ?, max_score = ?, notes = ? WHERE id = ?",
        (&g.date, g.score, g.max_score, &g.notes, &g.id),
    )?;
    if changed == 0 {
        return Err(anyhow!("grade not found: {}", g.id));
    }
    Ok(())
}

pub fn delete_grade(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let changed = conn.execute("DELETE FROM grades WHERE id = ?", [id])?;
    Ok(changed > 0)
}

// ---------------------------------------------------------------------------
// Attendance

/// Ascending by date. `month` is a `YYYY-MM` prefix.
pub fn list_attendance(
    conn: &Connection,
    student_id: &str,
    school_year_id: &str,
    month: Option<&str>,
) -> anyhow::Result<Vec<AttendanceRecord>> {
    let sql = format!(
        "SELECT {} FROM attendance
         WHERE student_id = ? AND school_year_id = ?
         ORDER BY date",
        ATTENDANCE_COLS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map((student_id, school_year_id), attendance_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(match month {
        Some(m) => rows.into_iter().filter(|r| r.date.starts_with(m)).collect(),
        None => rows,
    })
}

/// Upserts on (student, school year, date). `None` status clears the day.
/// Returns the stored record, or `None` when the day was cleared.
pub fn set_attendance(
    conn: &Connection,
    student_id: &str,
    school_year_id: &str,
    date: &str,
    status: Option<AttendanceStatus>,
    notes: Option<&str>,
) -> anyhow::Result<Option<AttendanceRecord>> {
    let Some(status) = status else {
        conn.execute(
            "DELETE FROM attendance WHERE student_id = ? AND school_year_id = ? AND date = ?",
            (student_id, school_year_id, date),
        )?;
        return Ok(None);
    };
    conn.execute(
        "INSERT INTO attendance(id, student_id, school_year_id, date, status, notes)
         VALUES(?, ?, ?, ?, ?, ?)
         ON CONFLICT(student_id, school_year_id, date)
         DO UPDATE SET status = excluded.status, notes = excluded.notes",
        (
            new_id(),
            student_id,
            school_year_id,
            date,
            status.as_str(),
            notes,
        ),
    )?;
    let sql = format!(
        "SELECT {} FROM attendance WHERE student_id = ? AND school_year_id = ? AND date = ?",
        ATTENDANCE_COLS
    );
    Ok(conn
        .query_row(&sql, (student_id, school_year_id, date), attendance_from_row)
        .optional()?)
}

pub fn insert_attendance(conn: &Connection, a: &AttendanceRecord) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO attendance(id, student_id, school_year_id, date, status, notes)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &a.id,
            &a.student_id,
            &a.school_year_id,
            &a.date,
            a.status.as_str(),
            &a.notes,
        ),
    )?;
    Ok(())
}

impl GradeSource for Connection {
    fn student(&self, student_id: &str) -> anyhow::Result<Option<Student>> {
        get_student(self, student_id)
    }

    fn course(&self, course_id: &str) -> anyhow::Result<Option<Course>> {
        get_course(self, course_id)
    }

    fn courses(&self, student_id: &str, school_year_id: &str) -> anyhow::Result<Vec<Course>> {
        list_courses(self, student_id, school_year_id)
    }

    fn categories(&self, course_id: &str) -> anyhow::Result<Vec<GradeCategory>> {
        list_categories(self, course_id)
    }

    fn grades(&self, category_id: &str) -> anyhow::Result<Vec<GradeEntry>> {
        list_grades(self, category_id)
    }

    fn attendance(
        &self,
        student_id: &str,
        school_year_id: &str,
        month: Option<&str>,
    ) -> anyhow::Result<Vec<AttendanceRecord>> {
        list_attendance(self, student_id, school_year_id, month)
    }
}
