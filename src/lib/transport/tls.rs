use anyhow::Context;
use axum_server::tls_rustls::RustlsConfig;
use std::path::PathBuf;
use tokio_rustls::rustls::crypto::aws_lc_rs;

/// PEM certificate chain and private key for serving `wss://`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

pub async fn configure_tls(paths: &TlsPaths) -> Result<RustlsConfig, anyhow::Error> {
    install_crypto_provider();
    RustlsConfig::from_pem_file(&paths.cert_path, &paths.key_path)
        .await
        .with_context(|| {
            format!(
                "Failed to load TLS certificate {} / key {}",
                paths.cert_path.display(),
                paths.key_path.display()
            )
        })
}

/// rustls cannot pick a process-wide provider once sqlx brings `ring` in next to `aws-lc-rs`.
fn install_crypto_provider() {
    // Err only means a provider is already installed.
    let _ = aws_lc_rs::default_provider().install_default();
}
