//! One-shot loopback listener for the OAuth redirect.
//!
//! GitHub sends the browser back to the configured redirect URI with
//! `?code=…`. The listener binds that URI's host and port, answers the
//! browser, and hands back the full location it was called with.

use super::AuthError;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use url::Url;

/// How long one connection may take to deliver its request
const READ_TIMEOUT: Duration = Duration::from_secs(5);

const SUCCESS_PAGE: &str = "<!DOCTYPE html><html><head><title>Signed in</title></head>\
<body><h1>Signed in to release-finder</h1><p>You can close this tab and return to the terminal.</p></body></html>";

pub struct CallbackServer {
    listener: TcpListener,
    origin: String,
}

impl CallbackServer {
    /// Bind to the host and port of `redirect_uri`
    pub async fn bind(redirect_uri: &str) -> Result<Self, AuthError> {
        let url = Url::parse(redirect_uri).map_err(|e| AuthError::RedirectUri(e.to_string()))?;
        let host = url
            .host_str()
            .ok_or_else(|| AuthError::RedirectUri(format!("{redirect_uri} has no host")))?
            .to_string();
        let port = url.port_or_known_default().unwrap_or(80);

        let listener = TcpListener::bind((host.as_str(), port)).await?;
        let port = listener.local_addr()?.port();
        tracing::info!(%host, port, "waiting for OAuth redirect");

        Ok(Self {
            listener,
            origin: format!("{}://{}:{}", url.scheme(), host, port),
        })
    }

    pub fn port(&self) -> std::io::Result<u16> {
        Ok(self.listener.local_addr()?.port())
    }

    /// Accept requests until one carries `code` (or `error`) and return the
    /// location the browser was sent to.
    ///
    /// Each connection is served on its own task, so a socket that opens and
    /// never speaks (browser preconnects) cannot hold up the real redirect.
    pub async fn wait_for_location(self) -> Result<String, AuthError> {
        let Self { listener, origin } = self;
        let (tx, mut rx) = mpsc::unbounded_channel();

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = accepted?;
                    tracing::debug!(%peer, "callback connection");
                    let tx = tx.clone();
                    let origin = origin.clone();
                    tokio::spawn(async move {
                        match timeout(READ_TIMEOUT, handle(stream, &origin)).await {
                            Ok(Ok(Some(location))) => {
                                let _ = tx.send(Ok(location));
                            }
                            Ok(Ok(None)) => {}
                            Ok(Err(AuthError::Io(e))) => {
                                tracing::warn!(%peer, error = %e, "callback connection dropped");
                            }
                            Ok(Err(e)) => {
                                let _ = tx.send(Err(e));
                            }
                            Err(_) => tracing::debug!(%peer, "idle callback connection timed out"),
                        }
                    });
                }
                Some(result) = rx.recv() => return result,
            }
        }
    }
}

async fn handle(mut stream: TcpStream, origin: &str) -> Result<Option<String>, AuthError> {
    let mut request_line = String::new();
    {
        let mut reader = BufReader::new(&mut stream);
        reader.read_line(&mut request_line).await?;
        // Drain headers so closing the socket doesn't reset the connection
        let mut header = String::new();
        while reader.read_line(&mut header).await? > 2 {
            header.clear();
        }
    }

    let Some(target) = request_target(&request_line) else {
        respond(&mut stream, "400 Bad Request", "bad request").await?;
        return Ok(None);
    };
    let location = format!("{origin}{target}");
    let Ok(url) = Url::parse(&location) else {
        respond(&mut stream, "400 Bad Request", "bad request").await?;
        return Ok(None);
    };

    if let Some((_, error)) = url.query_pairs().find(|(k, _)| k == "error") {
        let error = error.into_owned();
        respond(&mut stream, "400 Bad Request", &format!("Authorization failed: {error}")).await?;
        return Err(AuthError::Denied(error));
    }

    if super::extract_code(&location).is_some() {
        respond(&mut stream, "200 OK", SUCCESS_PAGE).await?;
        return Ok(Some(location));
    }

    // favicon and friends
    respond(&mut stream, "404 Not Found", "not found").await?;
    Ok(None)
}

/// The path-and-query of a `GET <target> HTTP/1.1` request line
fn request_target(line: &str) -> Option<&str> {
    let mut parts = line.split_whitespace();
    let method = parts.next()?;
    let target = parts.next()?;
    (method == "GET" && target.starts_with('/')).then_some(target)
}

async fn respond(stream: &mut TcpStream, status: &str, body: &str) -> std::io::Result<()> {
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_target() {
        assert_eq!(request_target("GET /?code=abc HTTP/1.1\r\n"), Some("/?code=abc"));
        assert_eq!(request_target("POST /?code=abc HTTP/1.1\r\n"), None);
        assert_eq!(request_target("garbage"), None);
    }

    #[tokio::test]
    async fn test_captures_redirect_location() {
        let server = CallbackServer::bind("http://127.0.0.1:0/").await.unwrap();
        let port = server.port().unwrap();
        let waiter = tokio::spawn(server.wait_for_location());

        let client = reqwest::Client::new();
        let favicon = client.get(format!("http://127.0.0.1:{port}/favicon.ico")).send().await.unwrap();
        assert_eq!(favicon.status(), 404);

        let response = client.get(format!("http://127.0.0.1:{port}/?code=abc123")).send().await.unwrap();
        assert!(response.status().is_success());

        let location = waiter.await.unwrap().unwrap();
        assert_eq!(location, format!("http://127.0.0.1:{port}/?code=abc123"));
        assert_eq!(crate::auth::extract_code(&location).as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn test_idle_connection_does_not_block_redirect() {
        let server = CallbackServer::bind("http://127.0.0.1:0/").await.unwrap();
        let port = server.port().unwrap();
        let waiter = tokio::spawn(server.wait_for_location());

        // Connects and never sends a byte
        let _idle = TcpStream::connect(("127.0.0.1", port)).await.unwrap();

        let response = tokio::time::timeout(
            Duration::from_secs(3),
            reqwest::get(format!("http://127.0.0.1:{port}/?code=abc")),
        )
        .await
        .expect("redirect was not served while an idle socket was open")
        .unwrap();
        assert!(response.status().is_success());

        let location = tokio::time::timeout(Duration::from_secs(3), waiter)
            .await
            .expect("listener did not return")
            .unwrap()
            .unwrap();
        assert_eq!(location, format!("http://127.0.0.1:{port}/?code=abc"));
    }

    #[tokio::test]
    async fn test_error_redirect_is_denied() {
        let server = CallbackServer::bind("http://127.0.0.1:0/").await.unwrap();
        let port = server.port().unwrap();
        let waiter = tokio::spawn(server.wait_for_location());

        let response = reqwest::get(format!("http://127.0.0.1:{port}/?error=access_denied"))
            .await
            .unwrap();
        assert_eq!(response.status(), 400);

        let err = waiter.await.unwrap().unwrap_err();
        assert!(matches!(err, AuthError::Denied(ref e) if e == "access_denied"));
    }
}
