mod common;

use common::Sidecar;
use serde_json::json;

#[test]
fn setup_defaults_and_course_creation_seeds() {
    let (mut sc, _ws) = Sidecar::with_workspace("gradebook-setup-defaults");

    let setup = sc.ok("setup.get", json!({}));
    assert_eq!(setup["courses"]["defaultCredits"], json!(1.0));
    assert_eq!(setup["courses"]["defaultColor"], json!("#6B8A62"));
    assert_eq!(setup["reports"]["gpaDecimals"], json!(2));
    assert_eq!(
        setup["courses"]["defaultCategories"]
            .as_array()
            .unwrap()
            .len(),
        3
    );

    let student_id = sc.create_student("Ada", "Lovelace");
    let r = sc.ok(
        "courses.create",
        json!({ "studentId": student_id, "name": "Math" }),
    );
    assert_eq!(r["course"]["credits"], json!(1.0));
    assert_eq!(r["course"]["color"], json!("#6B8A62"));
    let names: Vec<_> = r["categories"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["Daily", "Quizzes", "Tests"]);

    sc.ok(
        "setup.update",
        json!({ "section": "courses", "patch": {
            "defaultCredits": 0.5,
            "defaultCategories": [{ "name": "Labs", "weight": 0.4 }, { "name": "Exams", "weight": 0.6 }]
        }}),
    );
    let r = sc.ok(
        "courses.create",
        json!({ "studentId": student_id, "name": "Science" }),
    );
    assert_eq!(r["course"]["credits"], json!(0.5));
    assert_eq!(r["categories"].as_array().unwrap().len(), 2);
    assert_eq!(r["categories"][1]["sortOrder"], json!(1));

    let cats = sc.ok(
        "categories.list",
        json!({ "courseId": r["course"]["id"] }),
    );
    assert_eq!(cats["weightTotal"], json!(1.0));
}

#[test]
fn setup_patches_are_validated() {
    let (mut sc, _ws) = Sidecar::with_workspace("gradebook-setup-validate");
    for patch in [
        json!({ "section": "reports", "patch": { "gpaDecimals": 7 } }),
        json!({ "section": "reports", "patch": { "unknown": 1 } }),
        json!({ "section": "courses", "patch": { "defaultCredits": -1 } }),
        json!({ "section": "courses", "patch": { "defaultCategories": [{ "weight": 1 }] } }),
        json!({ "section": "nope", "patch": {} }),
        json!({ "section": "reports" }),
    ] {
        assert_eq!(sc.err_code("setup.update", patch), "bad_params");
    }
    let setup = sc.ok("setup.get", json!({}));
    assert_eq!(setup["reports"]["gpaDecimals"], json!(2));
}

#[test]
fn course_and_category_updates_are_partial() {
    let (mut sc, _ws) = Sidecar::with_workspace("gradebook-setup-partial");
    let student_id = sc.create_student("Ada", "Lovelace");
    let (course_id, cats) = sc.create_course(&student_id, "Math", 1.0, &[("Tests", 1.0)]);

    let r = sc.ok(
        "courses.update",
        json!({ "courseId": course_id, "patch": { "credits": 0.5, "description": "Algebra I" } }),
    );
    assert_eq!(r["course"]["name"], json!("Math"));
    assert_eq!(r["course"]["credits"], json!(0.5));
    assert_eq!(r["course"]["description"], json!("Algebra I"));

    let r = sc.ok(
        "courses.update",
        json!({ "courseId": course_id, "patch": { "description": null } }),
    );
    assert!(r["course"]["description"].is_null());
    assert_eq!(r["course"]["credits"], json!(0.5));

    assert_eq!(
        sc.err_code(
            "courses.update",
            json!({ "courseId": course_id, "patch": { "credits": -2 } })
        ),
        "bad_params"
    );
    assert_eq!(
        sc.err_code(
            "courses.update",
            json!({ "courseId": course_id, "patch": { "name": "  " } })
        ),
        "bad_params"
    );

    let r = sc.ok(
        "categories.update",
        json!({ "categoryId": cats[0], "patch": { "weight": 0.8 } }),
    );
    assert_eq!(r["category"]["name"], json!("Tests"));
    assert_eq!(r["category"]["weight"], json!(0.8));

    let r = sc.ok(
        "categories.create",
        json!({ "courseId": course_id, "name": "Homework", "weight": 0.2 }),
    );
    assert_eq!(r["category"]["sortOrder"], json!(1));
}
