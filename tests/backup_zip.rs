#[path = "../src/backup.rs"]
mod backup;

use std::fs::File;
use std::io::{Read, Write};
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
fn zip_export_and_import_roundtrip() {
    let workspace = temp_dir("sis-backup-src");
    let workspace2 = temp_dir("sis-backup-dst");
    let out_dir = temp_dir("sis-backup-out");

    let bytes = b"sqlite-test-payload";
    std::fs::write(workspace.join("sis.sqlite3"), bytes).expect("write source db");

    let bundle_path = out_dir.join("workspace.sisbackup.zip");
    let export = backup::export_workspace_bundle(&workspace, &bundle_path).expect("export bundle");
    assert_eq!(export.manifest.format, backup::BUNDLE_FORMAT);
    assert_eq!(export.manifest.db_bytes, bytes.len() as u64);
    assert_eq!(export.entry_count, 2);

    let f = File::open(&bundle_path).expect("open bundle");
    let mut archive = zip::ZipArchive::new(f).expect("open zip archive");
    let mut manifest = String::new();
    archive
        .by_name("manifest.json")
        .expect("manifest entry")
        .read_to_string(&mut manifest)
        .expect("read manifest");
    let manifest: serde_json::Value = serde_json::from_str(&manifest).expect("manifest json");
    assert_eq!(manifest["format"], backup::BUNDLE_FORMAT);
    assert_eq!(manifest["dbSha256"].as_str().map(str::len), Some(64));

    std::fs::write(workspace2.join("sis.sqlite3-wal"), b"stale").expect("write stale wal");
    let imported =
        backup::import_workspace_bundle(&bundle_path, &workspace2).expect("import bundle");
    assert_eq!(imported.db_sha256, export.manifest.db_sha256);
    let restored = std::fs::read(workspace2.join("sis.sqlite3")).expect("read restored db");
    assert_eq!(restored, bytes);
    assert!(!workspace2.join("sis.sqlite3-wal").exists());
    assert!(!workspace2.join("sis.sqlite3.importing").exists());
}

#[test]
fn tampered_database_entry_is_rejected() {
    let workspace = temp_dir("sis-backup-tamper");
    let out_dir = temp_dir("sis-backup-tamper-out");
    std::fs::write(workspace.join("sis.sqlite3"), b"original").expect("write db");

    let manifest = serde_json::json!({
        "format": backup::BUNDLE_FORMAT,
        "appVersion": "0.0.0",
        "exportedAt": "2024-01-01T00:00:00Z",
        "dbSha256": "0".repeat(64),
        "dbBytes": 8
    });
    let bundle_path = out_dir.join("bad.zip");
    let mut zip = zip::ZipWriter::new(File::create(&bundle_path).expect("create bundle"));
    let opts = zip::write::FileOptions::default();
    zip.start_file("manifest.json", opts).expect("manifest entry");
    zip.write_all(manifest.to_string().as_bytes())
        .expect("write manifest");
    zip.start_file("db/sis.sqlite3", opts).expect("db entry");
    zip.write_all(b"replaced").expect("write db entry");
    zip.finish().expect("finish bundle");

    let err = backup::import_workspace_bundle(&bundle_path, &workspace)
        .expect_err("digest mismatch must fail");
    assert!(format!("{err:#}").contains("digest mismatch"));
    let kept = std::fs::read(workspace.join("sis.sqlite3")).expect("read db");
    assert_eq!(kept, b"original");
}

#[test]
fn unknown_bundle_format_is_rejected() {
    let workspace = temp_dir("sis-backup-format");
    let bundle_path = workspace.join("other.zip");
    let mut zip = zip::ZipWriter::new(File::create(&bundle_path).expect("create bundle"));
    zip.start_file("manifest.json", zip::write::FileOptions::default())
        .expect("manifest entry");
    zip.write_all(
        br#"{"format":"other-format-v9","appVersion":"1","exportedAt":"x","dbSha256":"","dbBytes":0}"#,
    )
    .expect("write manifest");
    zip.finish().expect("finish bundle");

    let err = backup::import_workspace_bundle(&bundle_path, &workspace).expect_err("must fail");
    assert!(err.to_string().contains("unsupported bundle format"));
}
