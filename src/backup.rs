use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
const DB_FILE: &str = "sis.sqlite3";
const DB_ENTRY: &str = "db/sis.sqlite3";
pub const BUNDLE_FORMAT: &str = "sis-workspace-v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub format: String,
    pub app_version: String,
    pub exported_at: String,
    pub db_sha256: String,
    pub db_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub manifest: Manifest,
    pub entry_count: usize,
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

pub fn export_workspace_bundle(workspace: &Path, out_path: &Path) -> anyhow::Result<ExportSummary> {
    let db_path = workspace.join(DB_FILE);
    let db_bytes = std::fs::read(&db_path)
        .with_context(|| format!("failed to read workspace database {}", db_path.display()))?;

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    let out_file = File::create(out_path)
        .with_context(|| format!("failed to create bundle {}", out_path.display()))?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let manifest = Manifest {
        format: BUNDLE_FORMAT.to_string(),
        app_version: env!("CARGO_PKG_VERSION").to_string(),
        exported_at: chrono::Utc::now().to_rfc3339(),
        db_sha256: sha256_hex(&db_bytes),
        db_bytes: db_bytes.len() as u64,
    };
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(&serde_json::to_vec_pretty(&manifest)?)
        .context("failed to write manifest entry")?;
    zip.start_file(DB_ENTRY, opts)
        .context("failed to start database entry")?;
    zip.write_all(&db_bytes)
        .context("failed to write database entry")?;
    zip.finish().context("failed to finalize bundle")?;

    tracing::info!(
        path = %out_path.display(),
        bytes = manifest.db_bytes,
        "workspace bundle exported"
    );
    Ok(ExportSummary {
        manifest,
        entry_count: 2,
    })
}

/// Restores the database of a bundle into `workspace`. The current database
/// is only replaced once the extracted copy matches the manifest digest.
pub fn import_workspace_bundle(in_path: &Path, workspace: &Path) -> anyhow::Result<Manifest> {
    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.display()))?;
    let mut archive = ZipArchive::new(in_file).context("bundle is not a zip archive")?;

    let manifest: Manifest = {
        let mut text = String::new();
        archive
            .by_name(MANIFEST_ENTRY)
            .context("bundle missing manifest.json")?
            .read_to_string(&mut text)
            .context("failed to read manifest.json")?;
        serde_json::from_str(&text).context("manifest.json is invalid")?
    };
    if manifest.format != BUNDLE_FORMAT {
        return Err(anyhow!("unsupported bundle format: {}", manifest.format));
    }

    let mut db_bytes = Vec::new();
    archive
        .by_name(DB_ENTRY)
        .with_context(|| format!("bundle missing {}", DB_ENTRY))?
        .read_to_end(&mut db_bytes)
        .context("failed to extract database entry")?;
    let digest = sha256_hex(&db_bytes);
    if digest != manifest.db_sha256 {
        return Err(anyhow!(
            "database digest mismatch: manifest {} but entry {}",
            manifest.db_sha256,
            digest
        ));
    }

    std::fs::create_dir_all(workspace)
        .with_context(|| format!("failed to create workspace {}", workspace.display()))?;
    let dst = workspace.join(DB_FILE);
    let tmp = workspace.join(format!("{}.importing", DB_FILE));
    std::fs::write(&tmp, &db_bytes)
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    // Journal files belong to the database being replaced.
    for suffix in ["-journal", "-wal", "-shm"] {
        let _ = std::fs::remove_file(workspace.join(format!("{}{}", DB_FILE, suffix)));
    }
    std::fs::rename(&tmp, &dst)
        .with_context(|| format!("failed to move restored database to {}", dst.display()))?;

    tracing::info!(
        path = %in_path.display(),
        exported_at = %manifest.exported_at,
        "workspace bundle imported"
    );
    Ok(manifest)
}
