mod common;

use common::Sidecar;
use serde_json::json;
use std::fs::File;
use std::io::Read;

#[test]
fn bundle_export_then_restore_over_changes() {
    let (mut sc, ws) = Sidecar::with_workspace("gradebook-bundle-restore");
    let student_id = sc.create_student("Ada", "Lovelace");
    let bundle = ws.join("backups").join("ws.zip");

    let r = sc.ok(
        "backup.exportWorkspaceBundle",
        json!({ "outPath": bundle.to_string_lossy() }),
    );
    assert_eq!(r["bundleFormat"], json!("gradebook-workspace-v1"));
    assert_eq!(r["entryCount"], json!(2));
    let sha = r["dbSha256"].as_str().unwrap().to_string();
    assert_eq!(sha.len(), 64);

    let f = File::open(&bundle).expect("open bundle");
    let mut archive = zip::ZipArchive::new(f).expect("open zip archive");
    let mut manifest = String::new();
    archive
        .by_name("manifest.json")
        .expect("manifest entry")
        .read_to_string(&mut manifest)
        .expect("read manifest");
    let manifest: serde_json::Value = serde_json::from_str(&manifest).expect("manifest json");
    assert_eq!(manifest["dbSha256"].as_str(), Some(sha.as_str()));
    archive
        .by_name("db/gradebook.sqlite3")
        .expect("database entry in bundle");

    sc.create_student("Added", "Later");
    sc.ok("students.delete", json!({ "studentId": student_id }));

    let r = sc.ok(
        "backup.importWorkspaceBundle",
        json!({ "inPath": bundle.to_string_lossy() }),
    );
    assert_eq!(r["bundleFormatDetected"], json!("gradebook-workspace-v1"));
    assert_eq!(r["checksumVerified"], json!(true));

    // The daemon reopened the restored database.
    let students = sc.ok("students.list", json!({}));
    let list = students["students"].as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["id"].as_str(), Some(student_id.as_str()));
}

#[test]
fn bundle_restores_into_another_workspace() {
    let (mut sc, ws) = Sidecar::with_workspace("gradebook-bundle-src");
    sc.create_student("Ada", "Lovelace");
    let bundle = ws.join("ws.zip");
    sc.ok(
        "backup.exportWorkspaceBundle",
        json!({ "outPath": bundle.to_string_lossy() }),
    );

    let other = common::temp_dir("gradebook-bundle-dst");
    let mut sc2 = Sidecar::spawn();
    let r = sc2.ok(
        "backup.importWorkspaceBundle",
        json!({ "inPath": bundle.to_string_lossy(), "workspacePath": other.to_string_lossy() }),
    );
    assert_eq!(
        r["workspacePath"].as_str(),
        Some(other.to_string_lossy().as_ref())
    );
    let students = sc2.ok("students.list", json!({}));
    assert_eq!(students["students"].as_array().unwrap().len(), 1);
}

#[test]
fn missing_or_foreign_inputs_are_errors() {
    let (mut sc, ws) = Sidecar::with_workspace("gradebook-bundle-errors");
    let student_id = sc.create_student("Ada", "Lovelace");

    assert_eq!(
        sc.err_code(
            "backup.importWorkspaceBundle",
            json!({ "inPath": ws.join("nope.zip").to_string_lossy() })
        ),
        "not_found"
    );
    let junk = ws.join("junk.txt");
    std::fs::write(&junk, "hello").unwrap();
    assert_eq!(
        sc.err_code(
            "backup.importWorkspaceBundle",
            json!({ "inPath": junk.to_string_lossy() })
        ),
        "io_failed"
    );
    assert_eq!(
        sc.err_code("backup.exportWorkspaceBundle", json!({})),
        "bad_params"
    );

    // The workspace is still usable after the failed import.
    sc.ok("students.get", json!({ "studentId": student_id }));
}
