//! Upload Command
//!
//! Runs local files through the upload coordinator. Returns `false` when
//! any record is still failed once the session settles.
//!
//! Usage:
//!   assetflow upload <files>... [--retry-failed]

use std::path::{Path, PathBuf};

use serde_json::json;

use crate::cli::progress::UploadProgress;
use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::storage::mime_for_path;
use crate::types::{FlowError, RawAsset, Result};

pub async fn run(
    ctx: &CommandContext,
    files: &[PathBuf],
    retry_failed: bool,
    output: &Output,
) -> Result<bool> {
    let assets = read_assets(files).await?;
    let coordinator = ctx.upload_coordinator()?;
    let progress = UploadProgress::spawn(coordinator.subscribe());

    output.section(&format!("Uploading {} file(s)", assets.len()));
    coordinator.submit_batch(assets, ctx.credential.as_ref())?;
    let mut snapshot = coordinator.wait_quiescent().await;

    let failed = snapshot.failed().count();
    if retry_failed && failed > 0 {
        output.info(&format!("Retrying {} failed upload(s)", failed));
        coordinator.retry_failed(ctx.credential.as_ref())?;
        snapshot = coordinator.wait_quiescent().await;
    }

    let committed = coordinator.submission_refs()?;
    drop(coordinator);
    if let Err(e) = progress.await {
        tracing::warn!(error = %e, "Progress renderer stopped unexpectedly");
    }

    let failures: Vec<_> = snapshot
        .failed()
        .map(|r| json!({ "source": r.source_handle, "error": r.error }))
        .collect();
    if failures.is_empty() {
        output.success(&format!("{} file(s) committed", committed.len()));
    } else {
        output.warning(&format!(
            "{} committed, {} failed (rerun with --retry-failed)",
            committed.len(),
            failures.len()
        ));
    }

    output.json(&json!({ "committed": committed, "failed": failures }))?;
    Ok(failures.is_empty())
}

async fn read_assets(files: &[PathBuf]) -> Result<Vec<RawAsset>> {
    if files.is_empty() {
        return Err(FlowError::validation("files", "no files given"));
    }

    let mut assets = Vec::with_capacity(files.len());
    for path in files {
        assets.push(read_asset(path).await?);
    }
    Ok(assets)
}

async fn read_asset(path: &Path) -> Result<RawAsset> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        FlowError::validation("files", format!("cannot read {}: {}", path.display(), e))
    })?;
    let content_type = mime_for_path(path).unwrap_or("application/octet-stream");
    Ok(RawAsset::new(path.display().to_string(), bytes, content_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, StorageBackend};

    fn write_file(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"jpeg-bytes").unwrap();
        path
    }

    #[tokio::test]
    async fn test_run_reports_success_when_all_commit() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.auth.token = Some("secret".to_string());
        config.storage.backend = StorageBackend::Local;
        config.storage.local_dir = dir.path().join("objects");
        let ctx = CommandContext::from_config(config);
        let files = vec![write_file(dir.path(), "a.jpg"), write_file(dir.path(), "b.jpg")];

        let ok = run(&ctx, &files, false, &Output::new(true)).await.unwrap();
        assert!(ok);
    }

    #[tokio::test]
    async fn test_run_reports_failure_when_records_stay_failed() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.auth.token = Some("secret".to_string());
        let ctx = CommandContext::from_config(config);
        let files = vec![write_file(dir.path(), "a.jpg")];

        let ok = run(&ctx, &files, true, &Output::new(true)).await.unwrap();
        assert!(!ok);
    }

    #[tokio::test]
    async fn test_read_assets_detects_content_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chair.png");
        std::fs::write(&path, b"png-bytes").unwrap();

        let assets = read_assets(&[path.clone()]).await.unwrap();
        assert_eq!(assets[0].content_type, "image/png");
        assert_eq!(assets[0].bytes, b"png-bytes");
        assert_eq!(assets[0].source_handle, path.display().to_string());
    }

    #[tokio::test]
    async fn test_read_assets_rejects_missing_file() {
        let err = read_assets(&[PathBuf::from("/definitely/missing.jpg")])
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::Validation(_)));
        assert!(matches!(read_assets(&[]).await, Err(FlowError::Validation(_))));
    }
}
