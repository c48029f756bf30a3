use crate::scale::GradingScale;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE_NAME: &str = "gradebook.sqlite3";

pub fn db_path(workspace: &Path) -> std::path::PathBuf {
    workspace.join(DB_FILE_NAME)
}

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let conn = Connection::open(db_path(workspace))?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            grade_level TEXT,
            birth_date TEXT,
            created_at TEXT,
            updated_at TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS school_years(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            start_date TEXT NOT NULL,
            end_date TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 0,
            created_at TEXT
        )",
        [],
    )?;

    // One process-wide scale; rows are kept in the order the user gave them.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS grading_scale(
            id TEXT PRIMARY KEY,
            letter_grade TEXT NOT NULL,
            min_percentage REAL NOT NULL,
            gpa_points REAL NOT NULL DEFAULT 0,
            sort_order INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            school_year_id TEXT NOT NULL,
            name TEXT NOT NULL,
            description TEXT,
            credits REAL NOT NULL DEFAULT 1.0,
            color TEXT,
            created_at TEXT,
            FOREIGN KEY(student_id) REFERENCES students(id),
            FOREIGN KEY(school_year_id) REFERENCES school_years(id)
        )",
        [],
    )?;
    ensure_courses_ignore_attendance_weight(&conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_courses_student_year ON courses(student_id, school_year_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grade_categories(
            id TEXT PRIMARY KEY,
            course_id TEXT NOT NULL,
            name TEXT NOT NULL,
            weight REAL NOT NULL DEFAULT 0,
            sort_order INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY(course_id) REFERENCES courses(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grade_categories_course ON grade_categories(course_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grades(
            id TEXT PRIMARY KEY,
            category_id TEXT NOT NULL,
            date TEXT NOT NULL,
            score REAL NOT NULL,
            max_score REAL NOT NULL DEFAULT 100,
            notes TEXT,
            created_at TEXT,
            FOREIGN KEY(category_id) REFERENCES grade_categories(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grades_category ON grades(category_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            school_year_id TEXT NOT NULL,
            date TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('present', 'half', 'absent', 'sick', 'holiday')),
            notes TEXT,
            UNIQUE(student_id, school_year_id, date),
            FOREIGN KEY(student_id) REFERENCES students(id),
            FOREIGN KEY(school_year_id) REFERENCES school_years(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_student_year ON attendance(student_id, school_year_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    seed_defaults(&conn)?;

    Ok(conn)
}

/// First-open defaults: an active school year and the simple scale.
pub fn seed_defaults(conn: &Connection) -> anyhow::Result<()> {
    let years: i64 = conn.query_row("SELECT COUNT(*) FROM school_years", [], |r| r.get(0))?;
    if years == 0 {
        conn.execute(
            "INSERT INTO school_years(id, name, start_date, end_date, is_active, created_at)
             VALUES(?, '2024-2025', '2024-08-01', '2025-06-01', 1, ?)",
            (uuid::Uuid::new_v4().to_string(), now_rfc3339()),
        )?;
    }

    let scale_rows: i64 = conn.query_row("SELECT COUNT(*) FROM grading_scale", [], |r| r.get(0))?;
    if scale_rows == 0 {
        replace_grading_scale(conn, &GradingScale::simple())?;
    }
    Ok(())
}

pub fn replace_grading_scale(conn: &Connection, scale: &GradingScale) -> anyhow::Result<()> {
    let tx = conn.unchecked_transaction()?;
    write_grading_scale(&tx, scale)?;
    tx.commit()?;
    Ok(())
}

/// Same as `replace_grading_scale` for callers already inside a transaction.
pub fn write_grading_scale(conn: &Connection, scale: &GradingScale) -> anyhow::Result<()> {
    conn.execute("DELETE FROM grading_scale", [])?;
    for (i, row) in scale.rows().iter().enumerate() {
        let id = row
            .id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        conn.execute(
            "INSERT INTO grading_scale(id, letter_grade, min_percentage, gpa_points, sort_order)
             VALUES(?, ?, ?, ?, ?)",
            (
                id,
                row.letter_grade.trim(),
                row.min_percentage,
                row.gpa_points,
                i as i64,
            ),
        )?;
    }
    Ok(())
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row("SELECT value_json FROM settings WHERE key = ?", [key], |r| {
            r.get(0)
        })
        .optional()?;
    match raw {
        Some(text) => Ok(Some(serde_json::from_str(&text)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn ensure_courses_ignore_attendance_weight(conn: &Connection) -> anyhow::Result<()> {
    // Workspaces created before the per-course override lack the column.
    if table_has_column(conn, "courses", "ignore_attendance_weight")? {
        return Ok(());
    }
    conn.execute(
        "ALTER TABLE courses ADD COLUMN ignore_attendance_weight INTEGER NOT NULL DEFAULT 0",
        [],
    )?;
    Ok(())
}

pub fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(prefix: &str) -> PathBuf {
        let p = std::env::temp_dir().join(format!(
            "{}-{}",
            prefix,
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ));
        std::fs::create_dir_all(&p).expect("create temp dir");
        p
    }

    #[test]
    fn open_seeds_defaults_once() {
        let ws = temp_dir("gradebook-db-seed");
        {
            let conn = open_db(&ws).expect("open");
            let years: i64 = conn
                .query_row("SELECT COUNT(*) FROM school_years WHERE is_active = 1", [], |r| r.get(0))
                .unwrap();
            assert_eq!(years, 1);
            let rows: i64 = conn
                .query_row("SELECT COUNT(*) FROM grading_scale", [], |r| r.get(0))
                .unwrap();
            assert_eq!(rows, 5);
        }
        let conn = open_db(&ws).expect("reopen");
        let years: i64 = conn
            .query_row("SELECT COUNT(*) FROM school_years", [], |r| r.get(0))
            .unwrap();
        assert_eq!(years, 1);
    }

    #[test]
    fn old_courses_table_gains_override_column() {
        let ws = temp_dir("gradebook-db-migrate");
        {
            let conn = Connection::open(db_path(&ws)).unwrap();
            conn.execute(
                "CREATE TABLE courses(
                    id TEXT PRIMARY KEY,
                    student_id TEXT NOT NULL,
                    school_year_id TEXT NOT NULL,
                    name TEXT NOT NULL,
                    description TEXT,
                    credits REAL NOT NULL DEFAULT 1.0,
                    color TEXT,
                    created_at TEXT
                )",
                [],
            )
            .unwrap();
        }
        let conn = open_db(&ws).expect("open");
        assert!(table_has_column(&conn, "courses", "ignore_attendance_weight").unwrap());
    }

    #[test]
    fn settings_round_trip() {
        let ws = temp_dir("gradebook-db-settings");
        let conn = open_db(&ws).unwrap();
        assert!(settings_get_json(&conn, "setup.courses").unwrap().is_none());
        settings_set_json(&conn, "setup.courses", &serde_json::json!({ "defaultCredits": 0.5 }))
            .unwrap();
        settings_set_json(&conn, "setup.courses", &serde_json::json!({ "defaultCredits": 2 }))
            .unwrap();
        let v = settings_get_json(&conn, "setup.courses").unwrap().unwrap();
        assert_eq!(v["defaultCredits"], 2);
    }
}
