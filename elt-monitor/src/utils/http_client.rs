use std::{sync::OnceLock, time::Duration};

use tracing::{debug, warn};

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Safe to ignore: can happen if another crate installed it first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Build a `reqwest::Client` for webhook delivery with a fixed per-request timeout.
pub fn build_webhook_client(timeout: Duration) -> reqwest::Client {
    install_rustls_provider();

    let mut builder = reqwest::Client::builder();
    if timeout > Duration::ZERO {
        builder = builder.timeout(timeout);
    }

    builder.build().unwrap_or_else(|error| {
        warn!(
            error = %error,
            "Failed to create webhook HTTP client; falling back to reqwest defaults"
        );
        reqwest::Client::new()
    })
}
