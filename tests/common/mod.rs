#![allow(dead_code)]

use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

pub fn temp_dir(prefix: &str) -> PathBuf {
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

pub fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

/// One spawned `gradebookd` process driven over stdin/stdout.
pub struct Sidecar {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
}

impl Sidecar {
    pub fn spawn() -> Self {
        let exe = env!("CARGO_BIN_EXE_gradebookd");
        let mut child = Command::new(exe)
            .env_remove("GRADEBOOKD_WORKSPACE")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn gradebookd");
        let stdin = child.stdin.take().expect("child stdin");
        let stdout = child.stdout.take().expect("child stdout");
        Self {
            child,
            stdin,
            reader: BufReader::new(stdout),
        }
    }

    /// Spawns and selects a fresh workspace.
    pub fn with_workspace(prefix: &str) -> (Self, PathBuf) {
        let workspace = temp_dir(prefix);
        let mut sc = Self::spawn();
        sc.ok("workspace.select", json!({ "path": workspace.to_string_lossy() }));
        (sc, workspace)
    }

    pub fn send_line(&mut self, line: &str) -> Value {
        writeln!(self.stdin, "{}", line).expect("write request");
        self.stdin.flush().expect("flush request");
        let mut out = String::new();
        self.reader.read_line(&mut out).expect("read response line");
        assert!(!out.trim().is_empty(), "empty response for {}", line);
        serde_json::from_str(out.trim()).expect("parse response json")
    }

    pub fn request(&mut self, method: &str, params: Value) -> Value {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed).to_string();
        let payload = json!({ "id": id, "method": method, "params": params });
        let value = self.send_line(&payload.to_string());
        assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id.as_str()));
        value
    }

    /// Asserts success and returns `result`.
    pub fn ok(&mut self, method: &str, params: Value) -> Value {
        let value = self.request(method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(true),
            "{} failed: {}",
            method,
            value
        );
        value["result"].clone()
    }

    /// Asserts failure and returns the error code.
    pub fn err_code(&mut self, method: &str, params: Value) -> String {
        let value = self.request(method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(false),
            "{} unexpectedly succeeded: {}",
            method,
            value
        );
        value["error"]["code"]
            .as_str()
            .expect("error code")
            .to_string()
    }

    pub fn create_student(&mut self, first: &str, last: &str) -> String {
        let r = self.ok(
            "students.create",
            json!({ "firstName": first, "lastName": last }),
        );
        r["student"]["id"].as_str().expect("student id").to_string()
    }

    /// Creates a course with explicit categories; returns (course id, category ids).
    pub fn create_course(
        &mut self,
        student_id: &str,
        name: &str,
        credits: f64,
        categories: &[(&str, f64)],
    ) -> (String, Vec<String>) {
        let cats: Vec<Value> = categories
            .iter()
            .map(|(n, w)| json!({ "name": n, "weight": w }))
            .collect();
        let r = self.ok(
            "courses.create",
            json!({
                "studentId": student_id,
                "name": name,
                "credits": credits,
                "categories": cats
            }),
        );
        let course_id = r["course"]["id"].as_str().expect("course id").to_string();
        let cat_ids = r["categories"]
            .as_array()
            .expect("categories")
            .iter()
            .map(|c| c["id"].as_str().expect("category id").to_string())
            .collect();
        (course_id, cat_ids)
    }

    pub fn add_grade(&mut self, category_id: &str, date: &str, score: f64, max_score: f64) -> String {
        let r = self.ok(
            "grades.create",
            json!({
                "categoryId": category_id,
                "date": date,
                "score": score,
                "maxScore": max_score
            }),
        );
        r["grade"]["id"].as_str().expect("grade id").to_string()
    }

    pub fn mark(&mut self, student_id: &str, date: &str, status: &str) {
        self.ok(
            "attendance.set",
            json!({ "studentId": student_id, "date": date, "status": status }),
        );
    }
}

impl Drop for Sidecar {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
