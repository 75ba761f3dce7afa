use std::{sync::OnceLock, time::Duration};

use reqwest::{Client, ClientBuilder};
use tracing::debug;

pub const DEFAULT_UA: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Install the process-wide rustls crypto provider.
///
/// reqwest is built without a bundled provider, so this must run before the
/// first client is constructed. Repeated calls are no-ops.
pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Safe to ignore: can happen if another crate installed it first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Client builder with the crate defaults applied.
///
/// A zero `request_timeout` leaves requests without a deadline.
pub fn create_client_builder(request_timeout: Duration) -> ClientBuilder {
    install_rustls_provider();

    let mut builder = Client::builder().user_agent(DEFAULT_UA);
    if request_timeout > Duration::ZERO {
        builder = builder.timeout(request_timeout);
    }
    builder
}

pub fn default_client(request_timeout: Duration) -> Result<Client, reqwest::Error> {
    create_client_builder(request_timeout).build()
}
