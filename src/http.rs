//! HTTP fetcher (C1): thin wrapper over a shared `ureq::Agent` exposing the
//! two operations spec.md §4.1 requires. Both follow redirects (`ureq`'s
//! default) and map any non-2xx status to [`Error::Download`].

use crate::{Error, Result};

/// Fetch `url` and return the response body as text (used for JSON
/// manifests, which are parsed by the caller).
pub fn fetch_text(agent: &ureq::Agent, url: &str) -> Result<String> {
    request(agent, url)?
        .into_string()
        .map_err(|e| Error::Download {
            url: url.to_string(),
            status: None,
            message: e.to_string(),
        })
}

/// Fetch `url` and return the raw response body bytes (used for payload
/// downloads, which need to be hashed before being written to disk).
pub fn fetch_bytes(agent: &ureq::Agent, url: &str) -> Result<Vec<u8>> {
    fetch_bytes_with_progress(agent, url, &mut |_| {})
}

/// Like [`fetch_bytes`], but streams the body in chunks, invoking `on_chunk`
/// with the number of newly-read bytes after each chunk so a caller can
/// drive a progress bar as the transfer comes in.
pub fn fetch_bytes_with_progress(
    agent: &ureq::Agent,
    url: &str,
    on_chunk: &mut dyn FnMut(u64),
) -> Result<Vec<u8>> {
    use std::io::Read as _;

    let response = request(agent, url)?;
    let mut buf = Vec::with_capacity(
        response
            .header("Content-Length")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0),
    );

    let mut reader = response.into_reader();
    let mut chunk = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut chunk).map_err(|e| Error::Download {
            url: url.to_string(),
            status: None,
            message: e.to_string(),
        })?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        on_chunk(n as u64);
    }

    Ok(buf)
}

fn request(agent: &ureq::Agent, url: &str) -> Result<ureq::Response> {
    agent.get(url).call().map_err(|err| match err {
        ureq::Error::Status(status, response) => Error::Download {
            url: url.to_string(),
            status: Some(status),
            message: response
                .into_string()
                .unwrap_or_else(|_| "<non-utf8 error body>".to_string()),
        },
        ureq::Error::Transport(transport) => Error::Download {
            url: url.to_string(),
            status: None,
            message: transport.to_string(),
        },
    })
}

/// Builds the shared agent used for every request in a run, applying the
/// same defaults `xwin::main` does: a read timeout, and an optional HTTPS
/// proxy from `--https-proxy`/`HTTPS_PROXY`.
pub fn build_agent(timeout: std::time::Duration, https_proxy: Option<&str>) -> Result<ureq::Agent> {
    let mut builder = ureq::AgentBuilder::new().timeout_read(timeout);

    if let Some(proxy) = https_proxy {
        let proxy = ureq::Proxy::new(proxy)
            .map_err(|e| Error::InvalidInputData(format!("invalid https proxy '{proxy}': {e}")))?;
        builder = builder.proxy(proxy);
    }

    Ok(builder.build())
}
