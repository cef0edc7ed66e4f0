use anyhow::{Context, Result};
use tracing::debug;

use super::Source;

/// Opens a local file. It is read sequentially even though it could seek.
pub async fn open_file(path: &str) -> Result<Source> {
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("cannot open {path}"))?;
    debug!(path, "reading local file");

    Ok(Source {
        reader: Box::new(file),
        transferred: None,
    })
}

pub fn open_stdin() -> Source {
    debug!("reading standard input");
    Source {
        reader: Box::new(tokio::io::stdin()),
        transferred: None,
    }
}
