//! TLS connector shared by the sync and tokio front ends.

use native_tls::TlsConnector;

use crate::error::Result;
use crate::opts::TlsMode;

/// Build a connector for `mode`.
///
/// `Server` encrypts without checking who is on the other end; `ServerStrict`
/// verifies the certificate chain and that it names the connection host.
pub fn tls_connector(mode: TlsMode) -> Result<TlsConnector> {
    let mut builder = TlsConnector::builder();
    if !mode.verifies_server() {
        builder
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true);
    }
    Ok(builder.build()?)
}
