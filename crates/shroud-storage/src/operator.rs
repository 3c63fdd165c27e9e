//! OpenDAL Operator factory for shroud storage backends

use opendal::{Builder, Operator};
use shroud_core::config::{expand_tilde, StorageBackend, StorageConfig};
use shroud_core::{ShroudError, ShroudResult};

/// Build the operator selected by `storage.backend`.
///
/// S3 credentials are not part of the config file: OpenDAL picks up
/// `AWS_ACCESS_KEY_ID`/`AWS_SECRET_ACCESS_KEY` from the environment. Path-style
/// addressing (the opendal 0.55 default) is what SeaweedFS and MinIO need.
///
/// If `enforce_tls` is true and the S3 endpoint uses HTTP, this returns an
/// error. Otherwise, a warning is logged for non-HTTPS endpoints.
pub fn build_operator(storage: &StorageConfig) -> ShroudResult<Operator> {
    match storage.backend {
        StorageBackend::Fs => {
            let root = expand_tilde(&storage.root);
            std::fs::create_dir_all(&root).map_err(|e| {
                ShroudError::Storage(format!("creating blob root {}: {e}", root.display()))
            })?;
            let root = root.to_str().ok_or_else(|| {
                ShroudError::Config(format!("blob root is not UTF-8: {}", root.display()))
            })?;
            finish(opendal::services::Fs::default().root(root), "fs")
        }
        StorageBackend::Memory => finish(opendal::services::Memory::default(), "memory"),
        StorageBackend::S3 => {
            check_endpoint_tls(storage)?;
            // opendal 0.55: S3 builder uses consuming pattern (methods take `self`, return `Self`)
            let builder = opendal::services::S3::default()
                .endpoint(&storage.endpoint)
                .region(&storage.region)
                .bucket(&storage.bucket);
            finish(builder, "s3")
        }
    }
}

fn check_endpoint_tls(storage: &StorageConfig) -> ShroudResult<()> {
    if storage.endpoint.starts_with("http://") {
        if storage.enforce_tls {
            return Err(ShroudError::Config(format!(
                "S3 endpoint uses plaintext HTTP ({}), but enforce_tls is enabled. \
                 Use an HTTPS endpoint or set storage.enforce_tls = false for local development.",
                storage.endpoint
            )));
        }
        tracing::warn!(
            endpoint = %storage.endpoint,
            "S3 endpoint uses plaintext HTTP; credentials are transmitted unencrypted. \
             Set storage.enforce_tls = true and use HTTPS in production."
        );
    }
    Ok(())
}

fn finish<B: Builder>(builder: B, scheme: &str) -> ShroudResult<Operator> {
    let op = Operator::new(builder)
        .map_err(|e| ShroudError::Storage(format!("creating OpenDAL {scheme} operator: {e}")))?
        .layer(opendal::layers::LoggingLayer::default())
        .layer(
            opendal::layers::RetryLayer::new()
                .with_max_times(5)
                .with_jitter(),
        )
        .finish();
    Ok(op)
}
