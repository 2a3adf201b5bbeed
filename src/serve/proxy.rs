// src/serve/proxy.rs

use std::collections::HashMap;
use std::net::SocketAddr;

use anyhow::{anyhow, Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, AsyncBufReadExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::reload::ReloadMessage;

/// Route prefix for everything the proxy answers itself.
const SELF_PREFIX: &str = "/__themepipe/";

/// Reload client injected into proxied HTML pages. Stream messages for
/// stylesheets swap the matching `<link>` href in place; everything else
/// falls back to a full reload.
const CLIENT_JS: &str = r#"(function () {
    var source = new EventSource("/__themepipe/events");
    source.onmessage = function (event) {
        var msg = JSON.parse(event.data);
        if (msg.kind === "stream" && msg.path && /\.css$/.test(msg.path)) {
            var links = document.querySelectorAll("link[rel=stylesheet]");
            for (var i = 0; i < links.length; i++) {
                var href = links[i].getAttribute("href");
                if (href && href.split("?")[0].indexOf(msg.path) !== -1) {
                    links[i].setAttribute("href", href.split("?")[0] + "?t=" + Date.now());
                    return;
                }
            }
        }
        location.reload();
    };
})();
"#;

const INJECT_TAG: &str = "<script src=\"/__themepipe/client.js\" async></script>";

/// Upstream target parsed from the configured dev URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream {
    pub host: String,
    pub port: u16,
}

impl Upstream {
    fn host_header(&self) -> String {
        if self.port == 80 {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// Parse `devUrl` into an upstream host/port. Only plain-http upstreams
/// are supported; anything else fails when the proxy starts, not earlier.
pub fn parse_upstream(dev_url: &str) -> Result<Upstream> {
    let url = dev_url.trim();
    if url.starts_with("https://") {
        return Err(anyhow!("devUrl {url:?}: only http upstreams are supported"));
    }
    let rest = url.strip_prefix("http://").unwrap_or(url);
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if authority.is_empty() {
        return Err(anyhow!("devUrl {url:?} has no host"));
    }

    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port)) => (
            host.to_string(),
            port.parse::<u16>()
                .with_context(|| format!("invalid port in devUrl {url:?}"))?,
        ),
        None => (authority.to_string(), 80),
    };
    Ok(Upstream { host, port })
}

/// A bound, not-yet-running proxy.
pub struct Proxy {
    listener: TcpListener,
    upstream: Upstream,
    reload_tx: broadcast::Sender<ReloadMessage>,
}

impl Proxy {
    /// Bind the local listener. Port 0 picks an ephemeral port.
    pub async fn bind(
        port: u16,
        upstream: Upstream,
        reload_tx: broadcast::Sender<ReloadMessage>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .with_context(|| format!("binding dev proxy on port {port}"))?;
        Ok(Self {
            listener,
            upstream,
            reload_tx,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept loop. Runs until the task is dropped.
    pub async fn run(self) -> Result<()> {
        info!(
            addr = %self.local_addr()?,
            upstream = %self.upstream.host_header(),
            "dev proxy started"
        );

        loop {
            let (stream, peer) = self.listener.accept().await?;
            debug!(%peer, "proxy connection accepted");

            let upstream = self.upstream.clone();
            let reload_tx = self.reload_tx.clone();
            tokio::spawn(async move {
                if let Err(err) = handle_connection(stream, upstream, reload_tx).await {
                    debug!(error = %err, "proxy connection ended with error");
                }
            });
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    upstream: Upstream,
    reload_tx: broadcast::Sender<ReloadMessage>,
) -> Result<()> {
    let mut reader = BufReader::new(stream);
    let (request_line, headers) = read_head(&mut reader).await?;

    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let target = parts.next().unwrap_or_default().to_string();

    if target == "/__themepipe/client.js" {
        return respond_client_js(reader.into_inner()).await;
    }
    if target == "/__themepipe/events" {
        return respond_event_stream(reader.into_inner(), reload_tx).await;
    }
    if target.starts_with(SELF_PREFIX) {
        return respond_simple(reader.into_inner(), "404 Not Found", "unknown endpoint").await;
    }

    // Read the request body if one was announced.
    let body_len: usize = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let mut body = vec![0u8; body_len];
    if body_len > 0 {
        reader.read_exact(&mut body).await?;
    }

    let response = match forward_upstream(&upstream, &method, &target, &headers, &body).await {
        Ok(response) => inject_reload_client(response),
        Err(err) => {
            warn!(error = %err, upstream = %upstream.host_header(), "upstream request failed");
            let page = format!("<html><body><h1>502 Bad Gateway</h1><p>{err}</p></body></html>");
            let mut out = format!(
                "HTTP/1.1 502 Bad Gateway\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                page.len()
            )
            .into_bytes();
            out.extend_from_slice(page.as_bytes());
            out
        }
    };

    let mut stream = reader.into_inner();
    stream.write_all(&response).await?;
    stream.shutdown().await?;
    Ok(())
}

/// Read the request line and headers; header names are lowercased.
async fn read_head(
    reader: &mut BufReader<TcpStream>,
) -> Result<(String, HashMap<String, String>)> {
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;
    if request_line.trim().is_empty() {
        return Err(anyhow!("empty request"));
    }

    let mut headers = HashMap::new();
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).await?;
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_lowercase(), value.trim().to_string());
        }
    }
    Ok((request_line.trim_end().to_string(), headers))
}

async fn forward_upstream(
    upstream: &Upstream,
    method: &str,
    target: &str,
    headers: &HashMap<String, String>,
    body: &[u8],
) -> Result<Vec<u8>> {
    let mut conn = TcpStream::connect((upstream.host.as_str(), upstream.port))
        .await
        .with_context(|| format!("connecting to upstream {}", upstream.host_header()))?;

    let mut request = format!("{method} {target} HTTP/1.1\r\n");
    request.push_str(&format!("Host: {}\r\n", upstream.host_header()));
    for (name, value) in headers {
        // Host is rewritten above; identity encoding keeps the body
        // injectable; the upstream leg is not kept alive.
        if matches!(name.as_str(), "host" | "accept-encoding" | "connection") {
            continue;
        }
        request.push_str(&format!("{name}: {value}\r\n"));
    }
    request.push_str("Accept-Encoding: identity\r\nConnection: close\r\n\r\n");

    conn.write_all(request.as_bytes()).await?;
    if !body.is_empty() {
        conn.write_all(body).await?;
    }

    let mut response = Vec::new();
    conn.read_to_end(&mut response).await?;
    Ok(response)
}

/// Inject the reload client script tag into an HTML response, fixing up
/// `Content-Length`. Non-HTML, chunked, or headless responses pass through
/// unchanged.
pub fn inject_reload_client(response: Vec<u8>) -> Vec<u8> {
    let Some(head_end) = find_subsequence(&response, b"\r\n\r\n") else {
        return response;
    };
    let head = String::from_utf8_lossy(&response[..head_end]).to_string();
    let head_lower = head.to_lowercase();

    if !head_lower.contains("content-type: text/html") {
        return response;
    }
    if head_lower.contains("transfer-encoding: chunked") {
        return response;
    }

    let body = &response[head_end + 4..];
    let body_str = String::from_utf8_lossy(body);
    let insert_at = body_str
        .to_lowercase()
        .rfind("</body>")
        .unwrap_or(body_str.len());

    let mut new_body = String::with_capacity(body_str.len() + INJECT_TAG.len());
    new_body.push_str(&body_str[..insert_at]);
    new_body.push_str(INJECT_TAG);
    new_body.push_str(&body_str[insert_at..]);

    let new_head = rewrite_content_length(&head, new_body.len());

    let mut out = new_head.into_bytes();
    out.extend_from_slice(b"\r\n\r\n");
    out.extend_from_slice(new_body.as_bytes());
    out
}

fn rewrite_content_length(head: &str, len: usize) -> String {
    head.lines()
        .map(|line| {
            if line.to_lowercase().starts_with("content-length:") {
                format!("Content-Length: {len}")
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\r\n")
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

async fn respond_client_js(mut stream: TcpStream) -> Result<()> {
    let head = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/javascript\r\nContent-Length: {}\r\nCache-Control: no-store\r\nConnection: close\r\n\r\n",
        CLIENT_JS.len()
    );
    stream.write_all(head.as_bytes()).await?;
    stream.write_all(CLIENT_JS.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}

async fn respond_simple(mut stream: TcpStream, status: &str, body: &str) -> Result<()> {
    let head = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    stream.write_all(head.as_bytes()).await?;
    stream.write_all(body.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}

/// Server-sent event stream of reload notifications. Lives until the
/// browser disconnects.
async fn respond_event_stream(
    mut stream: TcpStream,
    reload_tx: broadcast::Sender<ReloadMessage>,
) -> Result<()> {
    let mut rx = reload_tx.subscribe();

    stream
        .write_all(
            b"HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nCache-Control: no-store\r\nConnection: keep-alive\r\n\r\nretry: 1000\n\n",
        )
        .await?;

    loop {
        match rx.recv().await {
            Ok(msg) => {
                let payload = serde_json::to_string(&msg)?;
                let frame = format!("data: {payload}\n\n");
                if stream.write_all(frame.as_bytes()).await.is_err() {
                    // Browser went away.
                    return Ok(());
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!(skipped, "event stream lagged; continuing");
            }
            Err(broadcast::error::RecvError::Closed) => return Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_parsing_handles_ports_and_paths() {
        assert_eq!(
            parse_upstream("http://localhost:8888").unwrap(),
            Upstream {
                host: "localhost".into(),
                port: 8888
            }
        );
        assert_eq!(
            parse_upstream("http://dev.site.test/subdir/page").unwrap(),
            Upstream {
                host: "dev.site.test".into(),
                port: 80
            }
        );
        assert!(parse_upstream("https://secure.test").is_err());
        assert!(parse_upstream("http://").is_err());
    }

    fn html_response(body: &str) -> Vec<u8> {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        )
        .into_bytes()
    }

    #[test]
    fn html_responses_get_the_client_injected_before_body_close() {
        let out = inject_reload_client(html_response("<html><body>hi</body></html>"));
        let text = String::from_utf8(out).unwrap();

        let tag = text.find(INJECT_TAG).unwrap();
        let close = text.find("</body>").unwrap();
        assert!(tag < close);

        let (head, body) = text.split_once("\r\n\r\n").unwrap();
        let announced: usize = head
            .lines()
            .find_map(|l| l.strip_prefix("Content-Length: "))
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(announced, body.len());
    }

    #[test]
    fn non_html_responses_pass_through_unchanged() {
        let response =
            b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 2\r\n\r\n{}"
                .to_vec();
        assert_eq!(inject_reload_client(response.clone()), response);
    }

    #[test]
    fn chunked_html_passes_through_unchanged() {
        let response = b"HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\n\r\n".to_vec();
        assert_eq!(inject_reload_client(response.clone()), response);
    }
}
