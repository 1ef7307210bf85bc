//! Strategies for collecting the credential after the browser step.
//!
//! Two interchangeable implementations share the [`CredentialAcquirer`]
//! contract:
//! - [`LongPollAcquirer`] - one long-poll request to `/api/gettoken`
//! - [`LocalCallbackAcquirer`] - a short-lived listener receiving the
//!   browser redirect on `127.0.0.1`

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::auth::correlation::CorrelationCode;
use crate::auth::tokens::Credential;
use crate::client::ServiceClient;
use crate::error::{AppError, Result};

/// Obtains the credential bound to a correlation code.
#[async_trait]
pub trait CredentialAcquirer: Send + Sync {
    /// Waits for the credential issued for `code`.
    ///
    /// The returned credential has passed [`Credential::validate`].
    async fn acquire(&self, code: &CorrelationCode) -> Result<Credential>;
}

/// Long-polls `GET /api/gettoken?defcode={code}`.
#[derive(Debug, Clone)]
pub struct LongPollAcquirer {
    client: ServiceClient,
    timeout: Duration,
}

impl LongPollAcquirer {
    #[must_use]
    pub const fn new(client: ServiceClient, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl CredentialAcquirer for LongPollAcquirer {
    async fn acquire(&self, code: &CorrelationCode) -> Result<Credential> {
        let mut url = self.client.endpoint("/api/gettoken")?;
        url.query_pairs_mut().append_pair("defcode", code.as_str());
        tracing::debug!(url = %url, "Waiting for credential");

        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(AppError::TransientService {
                status: response.status().as_u16(),
            });
        }

        let body = response.bytes().await?;
        let credential: Credential = serde_json::from_slice(&body)
            .map_err(|e| AppError::Decode(format!("gettoken response: {e}")))?;
        credential.validate()?;

        Ok(credential)
    }
}

const SUCCESS_PAGE: &str =
    "<html><body><h1>Login complete</h1><p>You can close this window.</p></body></html>";
const FAILURE_PAGE: &str =
    "<html><body><h1>Login failed</h1><p>The callback was not recognised.</p></body></html>";
const MAX_REQUEST_BYTES: usize = 16 * 1024;
const REQUEST_HEAD_DEADLINE: Duration = Duration::from_secs(5);

/// Receives `GET /callback?defcode={code}&token={credential JSON}` on a local port.
///
/// Requests that do not carry the expected code or a usable credential are
/// answered with `400` and the listener keeps waiting. Peers are served
/// concurrently, and one that sends no request head within five seconds is
/// dropped without a reply.
#[derive(Debug, Clone, Copy)]
pub struct LocalCallbackAcquirer {
    port: u16,
}

impl LocalCallbackAcquirer {
    #[must_use]
    pub const fn new(port: u16) -> Self {
        Self { port }
    }

    async fn serve_one(mut stream: TcpStream, code: &CorrelationCode) -> Result<Credential> {
        let head = tokio::time::timeout(REQUEST_HEAD_DEADLINE, read_request_head(&mut stream))
            .await
            .map_err(|_| {
                AppError::AcquisitionTransport("peer sent no request in time".to_string())
            })??;

        let request = String::from_utf8_lossy(&head);
        let outcome = parse_callback_request(&request, code);

        let (status, body) = match &outcome {
            Ok(_) => ("200 OK", SUCCESS_PAGE),
            Err(_) => ("400 Bad Request", FAILURE_PAGE),
        };
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: text/html; charset=utf-8\r\n\
             Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len(),
        );
        stream.write_all(response.as_bytes()).await?;
        stream.shutdown().await.ok();

        outcome
    }
}

/// Reads until the blank line ending the request head, or the size cap.
async fn read_request_head(stream: &mut TcpStream) -> Result<Vec<u8>> {
    let mut buffer = vec![0u8; MAX_REQUEST_BYTES];
    let mut filled = 0;
    loop {
        let n = stream.read(&mut buffer[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
        if buffer[..filled].windows(4).any(|w| w == b"\r\n\r\n") || filled == buffer.len() {
            break;
        }
    }
    buffer.truncate(filled);
    Ok(buffer)
}

#[async_trait]
impl CredentialAcquirer for LocalCallbackAcquirer {
    async fn acquire(&self, code: &CorrelationCode) -> Result<Credential> {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, self.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            AppError::AcquisitionTransport(format!("cannot listen on {addr}: {e}"))
        })?;
        tracing::debug!(%addr, "Waiting for login callback");

        // One task per peer; dropping the set aborts the rest.
        let (found_tx, mut found_rx) = mpsc::channel::<Credential>(1);
        let mut peers = JoinSet::new();

        loop {
            tokio::select! {
                Some(credential) = found_rx.recv() => return Ok(credential),
                Some(_) = peers.join_next(), if !peers.is_empty() => {},
                accepted = listener.accept() => {
                    let (stream, peer) =
                        accepted.map_err(|e| AppError::AcquisitionTransport(e.to_string()))?;
                    let code = code.clone();
                    let found_tx = found_tx.clone();
                    peers.spawn(async move {
                        match Self::serve_one(stream, &code).await {
                            Ok(credential) => {
                                let _ = found_tx.send(credential).await;
                            },
                            Err(e) => tracing::warn!(%peer, error = %e, "Ignoring login callback"),
                        }
                    });
                },
            }
        }
    }
}

/// Extracts the credential from a raw callback request head.
fn parse_callback_request(request: &str, code: &CorrelationCode) -> Result<Credential> {
    let first_line = request
        .lines()
        .next()
        .ok_or_else(|| AppError::Decode("empty callback request".to_string()))?;
    let mut parts = first_line.split_whitespace();
    let method = parts.next().unwrap_or("");
    let target = parts.next().unwrap_or("");
    if method != "GET" {
        return Err(AppError::Decode(format!("unexpected callback method {method}")));
    }

    let (path, query) = target.split_once('?').unwrap_or((target, ""));
    if path != "/callback" {
        return Err(AppError::Decode(format!("unexpected callback path {path}")));
    }

    let mut defcode = None;
    let mut token = None;
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "defcode" => defcode = Some(value.into_owned()),
            "token" => token = Some(value.into_owned()),
            _ => {},
        }
    }

    if defcode.as_deref() != Some(code.as_str()) {
        return Err(AppError::Decode("callback code mismatch".to_string()));
    }
    let token = token.ok_or_else(|| AppError::Decode("callback has no token".to_string()))?;
    let credential: Credential = serde_json::from_str(&token)
        .map_err(|e| AppError::Decode(format!("callback token: {e}")))?;
    credential.validate()?;

    Ok(credential)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;
    use url::Url;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn code() -> CorrelationCode {
        CorrelationCode::parse("ab12cd").unwrap()
    }

    fn poller_for(server: &MockServer, timeout: Duration) -> LongPollAcquirer {
        let client = ServiceClient::new(&ServiceConfig {
            base_url: Url::parse(&server.uri()).unwrap(),
            timeout_secs: 30,
        })
        .unwrap();
        LongPollAcquirer::new(client, timeout)
    }

    fn free_port() -> u16 {
        std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }

    fn callback_query(defcode: &str, token: &str) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .append_pair("defcode", defcode)
            .append_pair("token", token)
            .finish()
    }

    async fn get_with_retry(url: &str) -> reqwest::Response {
        for _ in 0..50 {
            if let Ok(response) = reqwest::get(url).await {
                return response;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("callback listener never came up");
    }

    #[tokio::test]
    async fn long_poll_returns_credential() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/gettoken"))
            .and(query_param("defcode", "ab12cd"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "sessionToken": "tok1",
                "userId": "u1",
                "sessionId": "s1",
                "profile": {"firstName": "Ada"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let credential = poller_for(&server, Duration::from_secs(5))
            .acquire(&code())
            .await
            .unwrap();

        assert_eq!(credential.session_token, "tok1");
        assert_eq!(credential.user_id, "u1");
        assert_eq!(credential.profile.first_name, "Ada");
    }

    #[tokio::test]
    async fn long_poll_non_ok_status_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/gettoken"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result = poller_for(&server, Duration::from_secs(5))
            .acquire(&code())
            .await;
        assert!(matches!(
            result,
            Err(AppError::TransientService { status: 404 })
        ));
    }

    #[tokio::test]
    async fn long_poll_timeout_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/gettoken"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let result = poller_for(&server, Duration::from_millis(200))
            .acquire(&code())
            .await;
        assert!(matches!(result, Err(AppError::AcquisitionTimeout)));
    }

    #[tokio::test]
    async fn long_poll_malformed_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/gettoken"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let result = poller_for(&server, Duration::from_secs(5))
            .acquire(&code())
            .await;
        assert!(matches!(result, Err(AppError::Decode(_))));
    }

    #[tokio::test]
    async fn long_poll_unreachable_service_is_transport_error() {
        let client = ServiceClient::new(&ServiceConfig {
            base_url: Url::parse(&format!("http://127.0.0.1:{}", free_port())).unwrap(),
            timeout_secs: 5,
        })
        .unwrap();

        let result = LongPollAcquirer::new(client, Duration::from_secs(5))
            .acquire(&code())
            .await;
        assert!(matches!(result, Err(AppError::AcquisitionTransport(_))));
    }

    #[tokio::test]
    async fn local_callback_accepts_matching_redirect() {
        let port = free_port();
        let task =
            tokio::spawn(async move { LocalCallbackAcquirer::new(port).acquire(&code()).await });

        let token = r#"{"sessionToken":"tok1","userId":"u1","profile":{"firstName":"Ada"}}"#;
        let url = format!(
            "http://127.0.0.1:{port}/callback?{}",
            callback_query("ab12cd", token)
        );
        let response = get_with_retry(&url).await;
        assert_eq!(response.status().as_u16(), 200);

        let credential = task.await.unwrap().unwrap();
        assert_eq!(credential.user_id, "u1");
        assert_eq!(credential.profile.first_name, "Ada");
    }

    #[tokio::test]
    async fn local_callback_skips_bad_requests() {
        let port = free_port();
        let task =
            tokio::spawn(async move { LocalCallbackAcquirer::new(port).acquire(&code()).await });

        let token = r#"{"sessionToken":"tok1","userId":"u1"}"#;
        let wrong_code = format!(
            "http://127.0.0.1:{port}/callback?{}",
            callback_query("zzzzzz", token)
        );
        let response = get_with_retry(&wrong_code).await;
        assert_eq!(response.status().as_u16(), 400);

        let favicon = format!("http://127.0.0.1:{port}/favicon.ico");
        assert_eq!(reqwest::get(&favicon).await.unwrap().status().as_u16(), 400);
        assert!(!task.is_finished());

        let good = format!(
            "http://127.0.0.1:{port}/callback?{}",
            callback_query("ab12cd", token)
        );
        assert_eq!(reqwest::get(&good).await.unwrap().status().as_u16(), 200);

        let credential = task.await.unwrap().unwrap();
        assert_eq!(credential.session_token, "tok1");
    }

    #[tokio::test]
    async fn local_callback_is_not_blocked_by_idle_connection() {
        let port = free_port();
        let task =
            tokio::spawn(async move { LocalCallbackAcquirer::new(port).acquire(&code()).await });

        let mut idle = None;
        for _ in 0..50 {
            if let Ok(stream) = TcpStream::connect(("127.0.0.1", port)).await {
                idle = Some(stream);
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let _idle = idle.expect("callback listener never came up");

        let token = r#"{"sessionToken":"tok1","userId":"u1"}"#;
        let good = format!(
            "http://127.0.0.1:{port}/callback?{}",
            callback_query("ab12cd", token)
        );
        let response = tokio::time::timeout(Duration::from_secs(3), reqwest::get(&good))
            .await
            .expect("redirect not answered while another peer was idle")
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);

        let credential = tokio::time::timeout(Duration::from_secs(3), task)
            .await
            .expect("acquire did not finish")
            .unwrap()
            .unwrap();
        assert_eq!(credential.user_id, "u1");
    }

    #[test]
    fn parse_rejects_blank_credential() {
        let request = format!(
            "GET /callback?{} HTTP/1.1\r\nHost: localhost\r\n\r\n",
            callback_query("ab12cd", r#"{"sessionToken":"","userId":"u1"}"#)
        );
        assert!(matches!(
            parse_callback_request(&request, &code()),
            Err(AppError::Decode(_))
        ));
    }

    #[test]
    fn parse_rejects_other_methods() {
        let request = "POST /callback?defcode=ab12cd HTTP/1.1\r\n\r\n";
        assert!(parse_callback_request(request, &code()).is_err());
    }
}
