use crate::db;
use crate::store::CategorySeed;
use rusqlite::Connection;
use serde_json::{json, Map, Value};
use std::path::PathBuf;

pub const ENV_WORKSPACE: &str = "GRADEBOOKD_WORKSPACE";
pub const ENV_LOG: &str = "GRADEBOOKD_LOG";
pub const DEFAULT_LOG_FILTER: &str = "gradebookd=info";

/// Process-level settings read once at startup.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub workspace: Option<PathBuf>,
    pub log_filter: String,
}

impl DaemonConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let workspace = lookup(ENV_WORKSPACE)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        let log_filter = lookup(ENV_LOG)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
        Self {
            workspace,
            log_filter,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetupSection {
    Courses,
    Reports,
}

impl SetupSection {
    pub const ALL: [SetupSection; 2] = [SetupSection::Courses, SetupSection::Reports];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "courses" => Some(Self::Courses),
            "reports" => Some(Self::Reports),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Courses => "courses",
            Self::Reports => "reports",
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Courses => "setup.courses",
            Self::Reports => "setup.reports",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Courses => json!({
            "defaultCredits": 1.0,
            "defaultColor": "#6B8A62",
            "defaultCategories": [
                { "name": "Daily", "weight": 0.25 },
                { "name": "Quizzes", "weight": 0.25 },
                { "name": "Tests", "weight": 0.5 }
            ]
        }),
        SetupSection::Reports => json!({
            "gpaDecimals": 2,
            "percentDecimals": 1
        }),
    }
}

fn parse_number_min(v: &Value, key: &str, min: f64) -> Result<f64, String> {
    let Some(n) = v.as_f64() else {
        return Err(format!("{} must be a number", key));
    };
    if !n.is_finite() || n < min {
        return Err(format!("{} must be >= {}", key, min));
    }
    Ok(n)
}

fn parse_int_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let Some(n) = v.as_i64() else {
        return Err(format!("{} must be an integer", key));
    };
    if n < min || n > max {
        return Err(format!("{} must be between {} and {}", key, min, max));
    }
    Ok(n)
}

fn parse_string_max(v: &Value, key: &str, max_len: usize) -> Result<String, String> {
    let Some(s) = v.as_str() else {
        return Err(format!("{} must be a string", key));
    };
    let t = s.trim();
    if t.chars().count() > max_len {
        return Err(format!("{} must be at most {} characters", key, max_len));
    }
    Ok(t.to_string())
}

fn parse_category_seeds(v: &Value) -> Result<Value, String> {
    let Some(items) = v.as_array() else {
        return Err("defaultCategories must be an array".to_string());
    };
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let Some(obj) = item.as_object() else {
            return Err(format!("defaultCategories[{}] must be an object", i));
        };
        let name = obj
            .get("name")
            .and_then(|n| n.as_str())
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| format!("defaultCategories[{}].name must be a non-empty string", i))?;
        let weight = obj
            .get("weight")
            .map(|w| parse_number_min(w, "defaultCategories.weight", 0.0))
            .transpose()?
            .unwrap_or(0.0);
        out.push(json!({ "name": name, "weight": weight }));
    }
    Ok(Value::Array(out))
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = current
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())?;
    for (k, v) in patch {
        match section {
            SetupSection::Courses => match k.as_str() {
                "defaultCredits" => {
                    obj.insert(k.clone(), json!(parse_number_min(v, k, 0.0)?));
                }
                "defaultColor" => {
                    obj.insert(k.clone(), Value::String(parse_string_max(v, k, 32)?));
                }
                "defaultCategories" => {
                    obj.insert(k.clone(), parse_category_seeds(v)?);
                }
                _ => return Err(format!("unknown courses field: {}", k)),
            },
            SetupSection::Reports => match k.as_str() {
                "gpaDecimals" | "percentDecimals" => {
                    obj.insert(k.clone(), json!(parse_int_range(v, k, 0, 4)?));
                }
                _ => return Err(format!("unknown reports field: {}", k)),
            },
        }
    }
    Ok(())
}

pub fn load_section(conn: &Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Stale or hand-edited values fall back to defaults field by field.
            for (k, v) in saved_obj {
                let mut single = Map::new();
                single.insert(k.clone(), v.clone());
                if let Err(msg) = merge_section_patch(section, &mut current, &single) {
                    tracing::warn!(section = section.name(), field = %k, "ignoring saved setting: {}", msg);
                }
            }
        }
    }
    Ok(current)
}

/// Validates `patch` against the section and persists the merged result.
/// `Ok(Err(msg))` is a rejected patch; the outer error is storage failure.
pub fn update_section(
    conn: &Connection,
    section: SetupSection,
    patch: &Map<String, Value>,
) -> anyhow::Result<Result<Value, String>> {
    let mut current = load_section(conn, section)?;
    if let Err(msg) = merge_section_patch(section, &mut current, patch) {
        return Ok(Err(msg));
    }
    db::settings_set_json(conn, section.key(), &current)?;
    Ok(Ok(current))
}

#[derive(Debug, Clone, PartialEq)]
pub struct CourseDefaults {
    pub credits: f64,
    pub color: String,
    pub categories: Vec<CategorySeed>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportFormat {
    pub gpa_decimals: usize,
    pub percent_decimals: usize,
}

pub fn course_defaults(conn: &Connection) -> anyhow::Result<CourseDefaults> {
    let v = load_section(conn, SetupSection::Courses)?;
    let categories = v["defaultCategories"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    Some(CategorySeed {
                        name: item.get("name")?.as_str()?.to_string(),
                        weight: item.get("weight").and_then(|w| w.as_f64()).unwrap_or(0.0),
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    Ok(CourseDefaults {
        credits: v["defaultCredits"].as_f64().unwrap_or(1.0),
        color: v["defaultColor"].as_str().unwrap_or("#6B8A62").to_string(),
        categories,
    })
}

pub fn report_format(conn: &Connection) -> anyhow::Result<ReportFormat> {
    let v = load_section(conn, SetupSection::Reports)?;
    Ok(ReportFormat {
        gpa_decimals: v["gpaDecimals"].as_u64().unwrap_or(2) as usize,
        percent_decimals: v["percentDecimals"].as_u64().unwrap_or(1) as usize,
    })
}
