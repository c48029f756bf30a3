use crate::db::{self, DB_FILE_NAME};
use anyhow::{anyhow, Context};
use serde::Serialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
const DB_ENTRY: &str = "db/gradebook.sqlite3";
pub const BUNDLE_FORMAT_V1: &str = "gradebook-workspace-v1";
pub const BARE_SQLITE_FORMAT: &str = "sqlite3";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    pub bundle_format: String,
    pub entry_count: usize,
    pub db_sha256: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub bundle_format_detected: String,
    pub checksum_verified: bool,
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

pub fn export_workspace_bundle(
    workspace_path: &Path,
    out_path: &Path,
) -> anyhow::Result<ExportSummary> {
    let db_path = db::db_path(workspace_path);
    if !db_path.is_file() {
        return Err(anyhow!(
            "workspace database not found: {}",
            db_path.to_string_lossy()
        ));
    }
    let db_bytes = std::fs::read(&db_path)
        .with_context(|| format!("failed to read database {}", db_path.to_string_lossy()))?;
    let db_sha256 = sha256_hex(&db_bytes);

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }
    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let manifest = json!({
        "format": BUNDLE_FORMAT_V1,
        "version": 1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": db::now_rfc3339(),
        "dbEntry": DB_ENTRY,
        "dbSha256": db_sha256,
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    zip.start_file(DB_ENTRY, opts)
        .context("failed to start database entry")?;
    zip.write_all(&db_bytes)
        .context("failed to write database entry")?;
    zip.finish().context("failed to finalize zip bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        entry_count: 2,
        db_sha256,
    })
}

/// Replaces the workspace database with the one in `in_path`. The caller must
/// not hold an open connection to the workspace while this runs.
pub fn import_workspace_bundle(
    in_path: &Path,
    workspace_path: &Path,
) -> anyhow::Result<ImportSummary> {
    std::fs::create_dir_all(workspace_path).with_context(|| {
        format!(
            "failed to create workspace {}",
            workspace_path.to_string_lossy()
        )
    })?;
    let dst = db::db_path(workspace_path);

    if !is_zip_file(in_path)? {
        if !is_sqlite_file(in_path)? {
            return Err(anyhow!(
                "not a workspace bundle or sqlite database: {}",
                in_path.to_string_lossy()
            ));
        }
        std::fs::copy(in_path, &dst).with_context(|| {
            format!(
                "failed to copy sqlite backup from {} to {}",
                in_path.to_string_lossy(),
                dst.to_string_lossy()
            )
        })?;
        return Ok(ImportSummary {
            bundle_format_detected: BARE_SQLITE_FORMAT.to_string(),
            checksum_verified: false,
        });
    }

    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .context("bundle missing manifest.json")?
        .read_to_string(&mut manifest_text)
        .context("failed to read manifest.json")?;
    let manifest: serde_json::Value =
        serde_json::from_str(&manifest_text).context("manifest.json is invalid JSON")?;
    let format = manifest
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if format != BUNDLE_FORMAT_V1 {
        return Err(anyhow!("unsupported bundle format: {}", format));
    }

    let mut db_bytes = Vec::new();
    archive
        .by_name(DB_ENTRY)
        .with_context(|| format!("bundle missing {}", DB_ENTRY))?
        .read_to_end(&mut db_bytes)
        .context("failed to extract database entry")?;

    let checksum_verified = match manifest.get("dbSha256").and_then(|v| v.as_str()) {
        Some(expected) => {
            let actual = sha256_hex(&db_bytes);
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(anyhow!(
                    "database checksum mismatch: manifest {} but entry hashes to {}",
                    expected,
                    actual
                ));
            }
            true
        }
        None => false,
    };

    // Write beside the live file first so a failed extract leaves it intact.
    let tmp_dst = workspace_path.join(format!("{}.importing", DB_FILE_NAME));
    if tmp_dst.exists() {
        let _ = std::fs::remove_file(&tmp_dst);
    }
    {
        let mut db_out = File::create(&tmp_dst).with_context(|| {
            format!(
                "failed to create temp database {}",
                tmp_dst.to_string_lossy()
            )
        })?;
        db_out
            .write_all(&db_bytes)
            .context("failed to write extracted database")?;
        db_out
            .flush()
            .context("failed to flush extracted database")?;
    }

    if dst.exists() {
        std::fs::remove_file(&dst).with_context(|| {
            format!(
                "failed to remove existing database {}",
                dst.to_string_lossy()
            )
        })?;
    }
    std::fs::rename(&tmp_dst, &dst).with_context(|| {
        format!(
            "failed to move extracted database to {}",
            dst.to_string_lossy()
        )
    })?;

    Ok(ImportSummary {
        bundle_format_detected: BUNDLE_FORMAT_V1.to_string(),
        checksum_verified,
    })
}

fn read_signature<const N: usize>(path: &Path) -> anyhow::Result<Option<[u8; N]>> {
    let mut f = File::open(path)
        .with_context(|| format!("failed to open input file {}", path.to_string_lossy()))?;
    let mut sig = [0u8; N];
    match f.read_exact(&mut sig) {
        Ok(()) => Ok(Some(sig)),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(e).context("failed to read file signature"),
    }
}

fn is_zip_file(path: &Path) -> anyhow::Result<bool> {
    Ok(read_signature::<4>(path)? == Some([0x50, 0x4B, 0x03, 0x04]))
}

fn is_sqlite_file(path: &Path) -> anyhow::Result<bool> {
    Ok(read_signature::<16>(path)?.is_some_and(|sig| &sig == b"SQLite format 3\0"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store;
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

    fn workspace_with_student(prefix: &str, first: &str) -> PathBuf {
        let ws = temp_dir(prefix);
        let conn = db::open_db(&ws).expect("open");
        store::create_student(&conn, first, "Lovelace", None, None).expect("student");
        ws
    }

    #[test]
    fn bundle_restores_into_other_workspace() {
        let src = workspace_with_student("gradebook-backup-src", "Ada");
        let bundle = temp_dir("gradebook-backup-out").join("ws.zip");
        let exported = export_workspace_bundle(&src, &bundle).expect("export");
        assert_eq!(exported.entry_count, 2);
        assert_eq!(exported.db_sha256.len(), 64);

        let dst = workspace_with_student("gradebook-backup-dst", "Other");
        let imported = import_workspace_bundle(&bundle, &dst).expect("import");
        assert_eq!(imported.bundle_format_detected, BUNDLE_FORMAT_V1);
        assert!(imported.checksum_verified);

        let conn = db::open_db(&dst).expect("reopen");
        let students = store::list_students(&conn).unwrap();
        assert_eq!(students.len(), 1);
        assert_eq!(students[0].first_name, "Ada");
    }

    #[test]
    fn tampered_checksum_is_rejected() {
        let src = workspace_with_student("gradebook-backup-tamper", "Ada");
        let bundle = temp_dir("gradebook-backup-tamper-out").join("ws.zip");
        {
            let db_bytes = std::fs::read(db::db_path(&src)).unwrap();
            let mut zip = ZipWriter::new(File::create(&bundle).unwrap());
            let opts = FileOptions::default();
            zip.start_file(MANIFEST_ENTRY, opts).unwrap();
            let manifest = json!({ "format": BUNDLE_FORMAT_V1, "dbSha256": "00".repeat(32) });
            zip.write_all(manifest.to_string().as_bytes()).unwrap();
            zip.start_file(DB_ENTRY, opts).unwrap();
            zip.write_all(&db_bytes).unwrap();
            zip.finish().unwrap();
        }
        let dst = temp_dir("gradebook-backup-tamper-dst");
        let err = import_workspace_bundle(&bundle, &dst).unwrap_err();
        assert!(err.to_string().contains("checksum mismatch"));
        assert!(!db::db_path(&dst).exists());
    }

    #[test]
    fn bare_sqlite_file_is_accepted() {
        let src = workspace_with_student("gradebook-backup-bare", "Ada");
        let dst = temp_dir("gradebook-backup-bare-dst");
        let imported = import_workspace_bundle(&db::db_path(&src), &dst).expect("import");
        assert_eq!(imported.bundle_format_detected, BARE_SQLITE_FORMAT);
        assert!(!imported.checksum_verified);
    }

    #[test]
    fn unrelated_file_is_rejected() {
        let dir = temp_dir("gradebook-backup-junk");
        let junk = dir.join("notes.txt");
        std::fs::write(&junk, "hello").unwrap();
        assert!(import_workspace_bundle(&junk, &dir.join("ws")).is_err());
    }
}
