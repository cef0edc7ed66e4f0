//! Forward-only byte sources.
//!
//! Every source is consumed front to back exactly once, which is all the
//! seek buffer needs: stdin, a local file, or the body of an HTTP GET.

mod http;
mod local;

pub use http::{BodyReader, TransferCounter, open_http};
pub use local::{open_file, open_stdin};

use anyhow::Result;
use tokio::io::AsyncRead;

/// An opened forward-only source.
pub struct Source {
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
    /// Bytes received from the network, for HTTP sources.
    pub transferred: Option<TransferCounter>,
}

/// Opens `location`: `-` for stdin, an `http://` or `https://` URL, or a path.
pub async fn open_source(location: &str) -> Result<Source> {
    if location == "-" {
        Ok(open_stdin())
    } else if is_http_url(location) {
        open_http(location).await
    } else {
        open_file(location).await
    }
}

pub fn is_http_url(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}
