mod common;

use common::Sidecar;
use serde_json::json;

#[test]
fn toggle_swaps_presets_and_custom_scales_fall_back_to_simple() {
    let (mut sc, _ws) = Sidecar::with_workspace("gradebook-scale-toggle");

    let s = sc.ok("scale.get", json!({}));
    assert_eq!(s["kind"], json!("simple"));
    assert_eq!(s["isSimple"], json!(true));
    assert_eq!(s["rows"].as_array().unwrap().len(), 5);

    let s = sc.ok("scale.toggle", json!({}));
    assert_eq!(s["kind"], json!("advanced"));
    assert_eq!(s["isSimple"], json!(false));
    let rows = s["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 13);
    assert_eq!(rows[0]["letterGrade"], json!("A+"));
    assert!(rows.iter().all(|r| r["id"].is_string()));

    let s = sc.ok("scale.toggle", json!({}));
    assert_eq!(s["kind"], json!("simple"));

    let s = sc.ok(
        "scale.update",
        json!({ "rows": [
            { "letterGrade": "P", "minPercentage": 60, "gpaPoints": 4 },
            { "letterGrade": "F", "minPercentage": 0, "gpaPoints": 0 },
            { "letterGrade": "H", "minPercentage": 95, "gpaPoints": 4 }
        ]}),
    );
    assert_eq!(s["kind"], json!("custom"));
    assert_eq!(s["rows"].as_array().unwrap().len(), 3);

    // Anything that is not five rows long toggles to simple.
    let s = sc.ok("scale.toggle", json!({}));
    assert_eq!(s["kind"], json!("simple"));

    sc.ok("scale.toggle", json!({}));
    let s = sc.ok("scale.reset", json!({}));
    assert_eq!(s["kind"], json!("simple"));
}

#[test]
fn custom_scale_drives_letters_and_rejects_bad_rows() {
    let (mut sc, _ws) = Sidecar::with_workspace("gradebook-scale-custom");
    let student_id = sc.create_student("Ada", "Lovelace");
    let (course_id, cats) = sc.create_course(&student_id, "Math", 1.0, &[("Tests", 1.0)]);
    sc.add_grade(&cats[0], "2024-09-02", 89.995, 100.0);

    // Boundary tolerance: 89.995 reaches the 90 row.
    let r = sc.ok("reports.courseGrade", json!({ "courseId": course_id }));
    assert_eq!(r["course"]["letterGrade"], json!("A"));

    sc.ok(
        "scale.update",
        json!({ "rows": [
            { "letterGrade": "Pass", "minPercentage": 95, "gpaPoints": 4 }
        ]}),
    );
    // Below every row falls back to F even though the scale has none.
    let r = sc.ok("reports.courseGrade", json!({ "courseId": course_id }));
    assert_eq!(r["course"]["letterGrade"], json!("F"));

    assert_eq!(sc.err_code("scale.update", json!({ "rows": [] })), "bad_params");
    assert_eq!(
        sc.err_code(
            "scale.update",
            json!({ "rows": [
                { "letterGrade": "A", "minPercentage": 90, "gpaPoints": 4 },
                { "letterGrade": "A", "minPercentage": 80, "gpaPoints": 3 }
            ]})
        ),
        "bad_params"
    );
    assert_eq!(
        sc.err_code("scale.update", json!({ "rows": "nope" })),
        "bad_params"
    );

    // Rejected updates leave the stored scale alone.
    let s = sc.ok("scale.get", json!({}));
    assert_eq!(s["rows"][0]["letterGrade"], json!("Pass"));
}
