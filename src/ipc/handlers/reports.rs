use crate::calc::{self, GradingConfig};
use crate::config::{self, ReportFormat};
use crate::ipc::helpers::{
    db_err, required_str, resolve_school_year, to_value, with_conn, HandlerErr, Op,
};
use crate::ipc::types::{AppState, Request};
use crate::store;
use crate::summary::{self, CourseOutcome};
use rusqlite::Connection;
use serde_json::{json, Value};

fn grading_config(conn: &Connection) -> Result<GradingConfig, HandlerErr> {
    let scale = store::load_grading_scale(conn).map_err(db_err("db_query_failed"))?;
    Ok(GradingConfig::new(scale))
}

fn course_view(outcome: &CourseOutcome, format: ReportFormat) -> Result<Value, HandlerErr> {
    let mut v = to_value(outcome)?;
    let pd = format.percent_decimals;
    v["academicDisplay"] = json!(calc::format_fixed(outcome.grade.academic_grade, pd));
    v["attendanceDisplay"] = json!(calc::format_fixed(outcome.grade.attendance_grade, pd));
    v["finalDisplay"] = json!(calc::format_fixed(outcome.grade.final_grade, pd));
    Ok(v)
}

fn reports_course_grade(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let course_id = required_str(params, "courseId")?;
    let cfg = grading_config(conn)?;
    let format = config::report_format(conn).map_err(db_err("db_query_failed"))?;
    let Some(outcome) = summary::build_course_outcome(conn, &course_id, &cfg)
        .map_err(db_err("db_query_failed"))?
    else {
        return Err(HandlerErr::not_found("course", &course_id));
    };
    Ok(json!({ "course": course_view(&outcome, format)? }))
}

fn reports_student_summary(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = required_str(params, "studentId")?;
    let year_id = resolve_school_year(conn, params)?;
    let cfg = grading_config(conn)?;
    let format = config::report_format(conn).map_err(db_err("db_query_failed"))?;

    let Some(report) = summary::build_student_summary(conn, &student_id, &year_id, &cfg)
        .map_err(db_err("db_query_failed"))?
    else {
        return Err(HandlerErr::not_found("student", &student_id));
    };
    let school_year = store::get_school_year(conn, &year_id).map_err(db_err("db_query_failed"))?;

    let mut v = to_value(&report)?;
    v["displayName"] = json!(report.student.display_name());
    v["courses"] = Value::Array(
        report
            .courses
            .iter()
            .map(|c| course_view(c, format))
            .collect::<Result<_, _>>()?,
    );
    v["gpaDisplay"] = json!(calc::format_fixed(report.gpa, format.gpa_decimals));
    v["attendance"]["percentageDisplay"] = json!(calc::format_fixed(
        report.attendance.percentage,
        format.percent_decimals
    ));
    v["schoolYear"] = to_value(&school_year)?;
    v["gradingScale"] = json!({
        "rows": cfg.scale.rows(),
        "kind": cfg.scale.kind()
    });
    Ok(v)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let op: Op = match req.method.as_str() {
        "reports.courseGrade" => reports_course_grade,
        "reports.studentSummary" => reports_student_summary,
        _ => return None,
    };
    Some(with_conn(state, req, op))
}
