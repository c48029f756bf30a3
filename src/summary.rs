use crate::calc::{self, AttendanceStats, CategoryInput, CourseGrade, GpaInput, GradingConfig};
use crate::model::{AttendanceRecord, Course, GradeCategory, GradeEntry, Student};
use serde::Serialize;

/// Read side of the storage collaborator. Missing foreign references read as
/// empty collections, never as errors.
pub trait GradeSource {
    fn student(&self, student_id: &str) -> anyhow::Result<Option<Student>>;
    fn course(&self, course_id: &str) -> anyhow::Result<Option<Course>>;
    fn courses(&self, student_id: &str, school_year_id: &str) -> anyhow::Result<Vec<Course>>;
    fn categories(&self, course_id: &str) -> anyhow::Result<Vec<GradeCategory>>;
    fn grades(&self, category_id: &str) -> anyhow::Result<Vec<GradeEntry>>;
    fn attendance(
        &self,
        student_id: &str,
        school_year_id: &str,
        month: Option<&str>,
    ) -> anyhow::Result<Vec<AttendanceRecord>>;
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryOutcome {
    pub id: String,
    pub name: String,
    pub weight: f64,
    pub sort_order: i64,
    pub grade_count: usize,
    pub average: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseOutcome {
    #[serde(flatten)]
    pub course: Course,
    pub categories: Vec<CategoryOutcome>,
    pub weight_total: f64,
    #[serde(flatten)]
    pub grade: CourseGrade,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummary {
    #[serde(flatten)]
    pub student: Student,
    pub school_year_id: String,
    pub courses: Vec<CourseOutcome>,
    pub gpa: Option<f64>,
    pub attendance: AttendanceStats,
}

fn category_outcomes<S: GradeSource + ?Sized>(
    source: &S,
    course_id: &str,
) -> anyhow::Result<Vec<CategoryOutcome>> {
    let mut out = Vec::new();
    for cat in source.categories(course_id)? {
        let grades = source.grades(&cat.id)?;
        out.push(CategoryOutcome {
            average: calc::category_average(&grades),
            grade_count: grades.iter().filter(|g| g.percent().is_some()).count(),
            id: cat.id,
            name: cat.name,
            weight: cat.weight,
            sort_order: cat.sort_order,
        });
    }
    Ok(out)
}

/// Grades one course given an already-computed attendance percentage.
pub fn course_outcome<S: GradeSource + ?Sized>(
    source: &S,
    course: Course,
    attendance_pct: Option<f64>,
    config: &GradingConfig,
) -> anyhow::Result<CourseOutcome> {
    let categories = category_outcomes(source, &course.id)?;
    let inputs: Vec<CategoryInput> = categories
        .iter()
        .map(|c| CategoryInput {
            average: c.average,
            weight: c.weight,
        })
        .collect();
    let grade = calc::course_grade(&course, &inputs, attendance_pct, config);
    let weight_total = categories.iter().map(|c| c.weight).sum();
    Ok(CourseOutcome {
        course,
        categories,
        weight_total,
        grade,
    })
}

/// Loads a course and grades it against its student's attendance for the
/// course's school year.
pub fn build_course_outcome<S: GradeSource + ?Sized>(
    source: &S,
    course_id: &str,
    config: &GradingConfig,
) -> anyhow::Result<Option<CourseOutcome>> {
    let Some(course) = source.course(course_id)? else {
        return Ok(None);
    };
    let records = source.attendance(&course.student_id, &course.school_year_id, None)?;
    let pct = calc::attendance_stats(&records).percentage;
    course_outcome(source, course, pct, config).map(Some)
}

pub fn build_student_summary<S: GradeSource + ?Sized>(
    source: &S,
    student_id: &str,
    school_year_id: &str,
    config: &GradingConfig,
) -> anyhow::Result<Option<StudentSummary>> {
    let Some(student) = source.student(student_id)? else {
        return Ok(None);
    };

    let records = source.attendance(student_id, school_year_id, None)?;
    let attendance = calc::attendance_stats(&records);

    let mut courses = Vec::new();
    for course in source.courses(student_id, school_year_id)? {
        courses.push(course_outcome(source, course, attendance.percentage, config)?);
    }

    let gpa_inputs: Vec<GpaInput> = courses
        .iter()
        .map(|c| GpaInput {
            letter_grade: c.grade.letter_grade.clone(),
            credits: c.course.credits,
        })
        .collect();
    let gpa = calc::gpa(&gpa_inputs, &config.scale);

    tracing::debug!(
        student_id,
        school_year_id,
        courses = courses.len(),
        gpa = ?gpa,
        "built student summary"
    );

    Ok(Some(StudentSummary {
        student,
        school_year_id: school_year_id.to_string(),
        courses,
        gpa,
        attendance,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AttendanceStatus;
    use crate::scale::GradingScale;

    #[derive(Default)]
    struct MemorySource {
        students: Vec<Student>,
        courses: Vec<Course>,
        categories: Vec<GradeCategory>,
        grades: Vec<GradeEntry>,
        attendance: Vec<AttendanceRecord>,
    }

    impl GradeSource for MemorySource {
        fn student(&self, student_id: &str) -> anyhow::Result<Option<Student>> {
            Ok(self.students.iter().find(|s| s.id == student_id).cloned())
        }
        fn course(&self, course_id: &str) -> anyhow::Result<Option<Course>> {
            Ok(self.courses.iter().find(|c| c.id == course_id).cloned())
        }
        fn courses(&self, student_id: &str, school_year_id: &str) -> anyhow::Result<Vec<Course>> {
            Ok(self
                .courses
                .iter()
                .filter(|c| c.student_id == student_id && c.school_year_id == school_year_id)
                .cloned()
                .collect())
        }
        fn categories(&self, course_id: &str) -> anyhow::Result<Vec<GradeCategory>> {
            let mut cats: Vec<GradeCategory> = self
                .categories
                .iter()
                .filter(|c| c.course_id == course_id)
                .cloned()
                .collect();
            cats.sort_by_key(|c| c.sort_order);
            Ok(cats)
        }
        fn grades(&self, category_id: &str) -> anyhow::Result<Vec<GradeEntry>> {
            Ok(self
                .grades
                .iter()
                .filter(|g| g.category_id == category_id)
                .cloned()
                .collect())
        }
        fn attendance(
            &self,
            student_id: &str,
            school_year_id: &str,
            month: Option<&str>,
        ) -> anyhow::Result<Vec<AttendanceRecord>> {
            Ok(self
                .attendance
                .iter()
                .filter(|a| a.student_id == student_id && a.school_year_id == school_year_id)
                .filter(|a| month.map(|m| a.date.starts_with(m)).unwrap_or(true))
                .cloned()
                .collect())
        }
    }

    fn student(id: &str) -> Student {
        Student {
            id: id.into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            grade_level: Some("7".into()),
            birth_date: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn course(id: &str, credits: f64, ignore: bool) -> Course {
        Course {
            id: id.into(),
            student_id: "s1".into(),
            school_year_id: "y1".into(),
            name: id.to_uppercase(),
            description: None,
            credits,
            color: None,
            ignore_attendance_weight: ignore,
        }
    }

    fn category(id: &str, course_id: &str, weight: f64, sort_order: i64) -> GradeCategory {
        GradeCategory {
            id: id.into(),
            course_id: course_id.into(),
            name: id.into(),
            weight,
            sort_order,
        }
    }

    fn grade(category_id: &str, score: f64, max_score: f64) -> GradeEntry {
        GradeEntry {
            id: format!("{}-{}", category_id, score),
            category_id: category_id.into(),
            date: "2024-09-10".into(),
            score,
            max_score,
            notes: None,
        }
    }

    fn day(date: &str, status: AttendanceStatus) -> AttendanceRecord {
        AttendanceRecord {
            id: date.into(),
            student_id: "s1".into(),
            school_year_id: "y1".into(),
            date: date.into(),
            status,
            notes: None,
        }
    }

    fn fixture() -> MemorySource {
        MemorySource {
            students: vec![student("s1")],
            courses: vec![course("math", 1.0, false), course("art", 0.5, true)],
            categories: vec![
                category("math-daily", "math", 0.25, 0),
                category("math-quiz", "math", 0.25, 1),
                category("math-test", "math", 0.5, 2),
                category("art-work", "art", 1.0, 0),
            ],
            grades: vec![
                grade("math-daily", 9.0, 10.0),
                grade("math-daily", 10.0, 10.0),
                grade("math-test", 80.0, 100.0),
                grade("art-work", 19.0, 20.0),
            ],
            attendance: vec![
                day("2024-09-02", AttendanceStatus::Present),
                day("2024-09-03", AttendanceStatus::Present),
                day("2024-09-04", AttendanceStatus::Present),
                day("2024-09-05", AttendanceStatus::Absent),
            ],
        }
    }

    #[test]
    fn unknown_student_yields_none() {
        let src = fixture();
        let out = build_student_summary(&src, "nope", "y1", &GradingConfig::default()).unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn summary_blends_attendance_per_course() {
        let src = fixture();
        let summary = build_student_summary(&src, "s1", "y1", &GradingConfig::default())
            .unwrap()
            .unwrap();
        assert_eq!(summary.courses.len(), 2);
        assert_eq!(summary.attendance.total, 4);
        assert_eq!(summary.attendance.percentage, Some(75.0));

        let math = &summary.courses[0];
        // daily 95, quizzes empty, tests 80 => (95*.25 + 80*.5) / .75
        let academic = (95.0 * 0.25 + 80.0 * 0.5) / 0.75;
        assert!((math.grade.academic_grade.unwrap() - academic).abs() < 1e-9);
        let blended = academic * 0.67 + 75.0 * 0.33;
        assert!((math.grade.final_grade.unwrap() - blended).abs() < 1e-9);
        assert_eq!(math.grade.letter_grade.as_deref(), Some("B"));
        assert_eq!(math.categories[1].average, None);
        assert!((math.weight_total - 1.0).abs() < 1e-9);

        let art = &summary.courses[1];
        assert_eq!(art.grade.final_grade, Some(95.0));
        assert_eq!(art.grade.letter_grade.as_deref(), Some("A"));

        // B (3.0) * 1.0 + A (4.0) * 0.5 over 1.5 credits
        assert!((summary.gpa.unwrap() - 5.0 / 1.5).abs() < 1e-9);
    }

    #[test]
    fn summary_without_grades_has_no_gpa() {
        let mut src = fixture();
        src.grades.clear();
        let summary = build_student_summary(&src, "s1", "y1", &GradingConfig::default())
            .unwrap()
            .unwrap();
        assert!(summary.courses.iter().all(|c| c.grade.final_grade.is_none()));
        assert_eq!(summary.gpa, None);
    }

    #[test]
    fn other_school_year_is_empty() {
        let src = fixture();
        let summary = build_student_summary(&src, "s1", "y2", &GradingConfig::default())
            .unwrap()
            .unwrap();
        assert!(summary.courses.is_empty());
        assert_eq!(summary.attendance.percentage, None);
        assert_eq!(summary.gpa, None);
    }

    #[test]
    fn course_outcome_respects_active_scale() {
        let src = fixture();
        let simple = build_course_outcome(&src, "art", &GradingConfig::default())
            .unwrap()
            .unwrap();
        let advanced = build_course_outcome(
            &src,
            "art",
            &GradingConfig::new(GradingScale::advanced()),
        )
        .unwrap()
        .unwrap();
        assert_eq!(simple.grade.final_grade, advanced.grade.final_grade);
        assert_eq!(simple.grade.letter_grade.as_deref(), Some("A"));
        assert_eq!(advanced.grade.letter_grade.as_deref(), Some("A"));
        assert!(build_course_outcome(&src, "missing", &GradingConfig::default())
            .unwrap()
            .is_none());
    }

    #[test]
    fn dangling_categories_read_as_no_data() {
        let mut src = fixture();
        src.categories.push(category("orphan", "math", 0.5, 3));
        let out = build_course_outcome(&src, "math", &GradingConfig::default())
            .unwrap()
            .unwrap();
        let orphan = out.categories.iter().find(|c| c.id == "orphan").unwrap();
        assert_eq!(orphan.average, None);
        assert_eq!(orphan.grade_count, 0);
    }

    #[test]
    fn grade_count_skips_unscorable_entries() {
        let mut src = fixture();
        src.grades.push(grade("art-work", 5.0, 0.0));
        let out = build_course_outcome(&src, "art", &GradingConfig::default())
            .unwrap()
            .unwrap();
        assert_eq!(out.categories[0].grade_count, 1);
        assert_eq!(out.categories[0].average, Some(95.0));
    }
}
