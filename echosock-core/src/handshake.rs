//! WebSocket handshake implementation
//!
//! The HTTP/1.1 upgrade exchange from RFC 6455 section 4, for both ends.
//! Header blocks are parsed with `httparse` and held in an [`http::HeaderMap`].
//! Parsing reports how many bytes the header block used so that any frame
//! bytes the peer pipelined behind it are not lost.

use crate::error::{Error, ProtocolError, Result};
use crate::protocol::constants::{MAX_HEADERS, WEBSOCKET_KEY_LEN, WEBSOCKET_MAGIC, WEBSOCKET_VERSION};
use base64::{engine::general_purpose, Engine as _};
use bytes::{BufMut, Bytes, BytesMut};
use http::header::{
    HeaderName, HeaderValue, CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, HOST, ORIGIN,
    SEC_WEBSOCKET_ACCEPT, SEC_WEBSOCKET_KEY, SEC_WEBSOCKET_VERSION, UPGRADE, USER_AGENT,
};
use http::{HeaderMap, StatusCode};
use sha1::{Digest, Sha1};

/// WebSocket handshake request information
#[derive(Debug, Clone)]
pub struct HandshakeRequest {
    /// HTTP method (should be GET)
    pub method: String,
    /// Request target
    pub path: String,
    /// HTTP headers
    pub headers: HeaderMap,
}

/// WebSocket handshake response information
#[derive(Debug, Clone)]
pub struct HandshakeResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// HTTP headers
    pub headers: HeaderMap,
    /// Response body, only used by rejections
    pub body: Bytes,
}

/// Client-side handshake options
#[derive(Debug, Clone, Default)]
pub struct HandshakeConfig {
    /// Host header value
    pub host: Option<String>,
    /// Origin header value
    pub origin: Option<String>,
    /// User-Agent header value
    pub user_agent: Option<String>,
    /// Additional headers
    pub extra_headers: Vec<(String, String)>,
}

/// Generate a random WebSocket key
pub fn generate_key() -> String {
    let key_bytes = rand::random::<[u8; WEBSOCKET_KEY_LEN]>();
    general_purpose::STANDARD.encode(key_bytes)
}

/// Compute the `Sec-WebSocket-Accept` value for a client key
pub fn compute_accept_key(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.as_bytes());
    hasher.update(WEBSOCKET_MAGIC.as_bytes());
    general_purpose::STANDARD.encode(hasher.finalize())
}

/// Check that a client key is base64 for exactly 16 bytes
pub fn validate_key(key: &str) -> bool {
    general_purpose::STANDARD
        .decode(key)
        .map(|decoded| decoded.len() == WEBSOCKET_KEY_LEN)
        .unwrap_or(false)
}

/// Build the client upgrade request for `path`.
///
/// Returns the request together with the generated key, which is needed to
/// check the server's answer.
pub fn create_client_handshake(
    path: &str,
    config: &HandshakeConfig,
) -> Result<(HandshakeRequest, String)> {
    let host = config
        .host
        .as_deref()
        .ok_or_else(|| ProtocolError::MissingHeader("Host".to_string()))?;
    let key = generate_key();

    let mut headers = HeaderMap::new();
    headers.insert(HOST, header_value("Host", host)?);
    headers.insert(UPGRADE, HeaderValue::from_static("websocket"));
    headers.insert(CONNECTION, HeaderValue::from_static("Upgrade"));
    headers.insert(SEC_WEBSOCKET_KEY, header_value("Sec-WebSocket-Key", &key)?);
    headers.insert(SEC_WEBSOCKET_VERSION, HeaderValue::from_static(WEBSOCKET_VERSION));

    if let Some(origin) = &config.origin {
        headers.insert(ORIGIN, header_value("Origin", origin)?);
    }
    if let Some(user_agent) = &config.user_agent {
        headers.insert(USER_AGENT, header_value("User-Agent", user_agent)?);
    }
    for (name, value) in &config.extra_headers {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
            ProtocolError::InvalidHeaderValue {
                header: name.clone(),
                value: value.clone(),
            }
        })?;
        headers.append(name.clone(), header_value(name.as_str(), value)?);
    }

    let path = if path.is_empty() { "/" } else { path };
    let request = HandshakeRequest {
        method: "GET".to_string(),
        path: path.to_string(),
        headers,
    };
    Ok((request, key))
}

/// Parse a client upgrade request from the front of `buf`.
///
/// Returns `Ok(None)` while the header block is incomplete, otherwise the
/// request and the length of the header block in bytes.
pub fn parse_client_handshake(buf: &[u8]) -> Result<Option<(HandshakeRequest, usize)>> {
    let mut raw_headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut request = httparse::Request::new(&mut raw_headers);

    let header_len = match request.parse(buf) {
        Ok(httparse::Status::Complete(len)) => len,
        Ok(httparse::Status::Partial) => return Ok(None),
        Err(e) => return Err(ProtocolError::InvalidFormat(e.to_string()).into()),
    };

    if request.version != Some(1) {
        return Err(ProtocolError::InvalidFormat("HTTP/1.1 required".to_string()).into());
    }

    let parsed = HandshakeRequest {
        method: request.method.unwrap_or_default().to_string(),
        path: request.path.unwrap_or("/").to_string(),
        headers: collect_headers(request.headers)?,
    };
    Ok(Some((parsed, header_len)))
}

/// Validate a client upgrade request and return its `Sec-WebSocket-Key`
pub fn validate_client_handshake(request: &HandshakeRequest) -> Result<String> {
    if request.method != "GET" {
        return Err(ProtocolError::InvalidMethod(request.method.clone()).into());
    }

    if !request.headers.contains_key(HOST) {
        return Err(ProtocolError::MissingHeader("Host".to_string()).into());
    }

    require_token(&request.headers, UPGRADE, "Upgrade", "websocket")?;
    require_token(&request.headers, CONNECTION, "Connection", "upgrade")?;

    let version = header_str(&request.headers, SEC_WEBSOCKET_VERSION, "Sec-WebSocket-Version")?;
    if version.trim() != WEBSOCKET_VERSION {
        return Err(ProtocolError::UnsupportedVersion(version.to_string()).into());
    }

    let key = header_str(&request.headers, SEC_WEBSOCKET_KEY, "Sec-WebSocket-Key")?.trim();
    if !validate_key(key) {
        return Err(ProtocolError::InvalidHeaderValue {
            header: "Sec-WebSocket-Key".to_string(),
            value: key.to_string(),
        }
        .into());
    }

    Ok(key.to_string())
}

/// Build the `101 Switching Protocols` answer for a validated client key
pub fn create_server_handshake(client_key: &str) -> Result<HandshakeResponse> {
    let mut headers = HeaderMap::new();
    headers.insert(UPGRADE, HeaderValue::from_static("websocket"));
    headers.insert(CONNECTION, HeaderValue::from_static("Upgrade"));
    headers.insert(
        SEC_WEBSOCKET_ACCEPT,
        header_value("Sec-WebSocket-Accept", &compute_accept_key(client_key))?,
    );

    Ok(HandshakeResponse {
        status: StatusCode::SWITCHING_PROTOCOLS,
        headers,
        body: Bytes::new(),
    })
}

/// Build an HTTP error response for a rejected upgrade.
///
/// `426 Upgrade Required` advertises the supported protocol version.
pub fn create_rejection(status: StatusCode, reason: &str) -> HandshakeResponse {
    let body = Bytes::from(format!("{reason}\n"));
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
    headers.insert(CONNECTION, HeaderValue::from_static("close"));
    if status == StatusCode::UPGRADE_REQUIRED {
        headers.insert(SEC_WEBSOCKET_VERSION, HeaderValue::from_static(WEBSOCKET_VERSION));
    }

    HandshakeResponse {
        status,
        headers,
        body,
    }
}

/// HTTP status used to reject a request that failed with `error`
pub fn rejection_status(error: &Error) -> StatusCode {
    match error {
        Error::Protocol(ProtocolError::UnsupportedVersion(_)) => StatusCode::UPGRADE_REQUIRED,
        Error::Protocol(ProtocolError::HeaderTooLarge { .. }) => {
            StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE
        }
        _ => StatusCode::BAD_REQUEST,
    }
}

/// Parse the server's answer from the front of `buf`.
///
/// Same contract as [`parse_client_handshake`].
pub fn parse_server_handshake(buf: &[u8]) -> Result<Option<(HandshakeResponse, usize)>> {
    let mut raw_headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut response = httparse::Response::new(&mut raw_headers);

    let header_len = match response.parse(buf) {
        Ok(httparse::Status::Complete(len)) => len,
        Ok(httparse::Status::Partial) => return Ok(None),
        Err(e) => return Err(ProtocolError::InvalidFormat(e.to_string()).into()),
    };

    let code = response.code.unwrap_or_default();
    let status = StatusCode::from_u16(code)
        .map_err(|_| ProtocolError::InvalidFormat(format!("invalid status code {code}")))?;

    let parsed = HandshakeResponse {
        status,
        headers: collect_headers(response.headers)?,
        body: Bytes::new(),
    };
    Ok(Some((parsed, header_len)))
}

/// Check the server's answer against the key the client sent
pub fn validate_server_handshake(response: &HandshakeResponse, client_key: &str) -> Result<()> {
    if response.status != StatusCode::SWITCHING_PROTOCOLS {
        return Err(ProtocolError::UnexpectedStatus(response.status.as_u16()).into());
    }

    require_token(&response.headers, UPGRADE, "Upgrade", "websocket")?;
    require_token(&response.headers, CONNECTION, "Connection", "upgrade")?;

    let received = header_str(&response.headers, SEC_WEBSOCKET_ACCEPT, "Sec-WebSocket-Accept")?;
    let expected = compute_accept_key(client_key);
    if received.trim() != expected {
        return Err(ProtocolError::InvalidAcceptKey {
            expected,
            received: received.to_string(),
        }
        .into());
    }

    Ok(())
}

impl HandshakeRequest {
    /// Serialize the request head
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(256);
        buf.put_slice(format!("{} {} HTTP/1.1\r\n", self.method, self.path).as_bytes());
        write_headers(&mut buf, &self.headers);
        buf.freeze()
    }
}

impl HandshakeResponse {
    /// Serialize the status line, headers and body
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(256 + self.body.len());
        let reason = self.status.canonical_reason().unwrap_or("");
        buf.put_slice(format!("HTTP/1.1 {} {}\r\n", self.status.as_u16(), reason).as_bytes());
        write_headers(&mut buf, &self.headers);
        buf.put_slice(&self.body);
        buf.freeze()
    }

    /// Whether this response completes the upgrade
    pub fn is_upgrade(&self) -> bool {
        self.status == StatusCode::SWITCHING_PROTOCOLS
    }
}

fn write_headers(buf: &mut BytesMut, headers: &HeaderMap) {
    for (name, value) in headers {
        buf.put_slice(canonical_name(name).as_bytes());
        buf.put_slice(b": ");
        buf.put_slice(value.as_bytes());
        buf.put_slice(b"\r\n");
    }
    buf.put_slice(b"\r\n");
}

/// `HeaderName` is always lowercase; restore the usual spelling on the wire
fn canonical_name(name: &HeaderName) -> String {
    name.as_str()
        .split('-')
        .map(|part| match part {
            "websocket" => "WebSocket".to_string(),
            _ => {
                let mut chars = part.chars();
                match chars.next() {
                    Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                    None => String::new(),
                }
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

fn collect_headers(raw: &[httparse::Header<'_>]) -> Result<HeaderMap> {
    let mut headers = HeaderMap::with_capacity(raw.len());
    for header in raw {
        let name = HeaderName::from_bytes(header.name.as_bytes())
            .map_err(|_| ProtocolError::InvalidFormat(format!("bad header name {}", header.name)))?;
        let value = HeaderValue::from_bytes(header.value)
            .map_err(|_| ProtocolError::InvalidFormat(format!("bad value for {}", header.name)))?;
        headers.append(name, value);
    }
    Ok(headers)
}

fn header_value(header: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|_| {
        ProtocolError::InvalidHeaderValue {
            header: header.to_string(),
            value: value.to_string(),
        }
        .into()
    })
}

fn header_str<'a>(headers: &'a HeaderMap, name: HeaderName, display: &str) -> Result<&'a str> {
    let value = headers
        .get(&name)
        .ok_or_else(|| ProtocolError::MissingHeader(display.to_string()))?;
    value.to_str().map_err(|_| {
        ProtocolError::InvalidHeaderValue {
            header: display.to_string(),
            value: String::from_utf8_lossy(value.as_bytes()).into_owned(),
        }
        .into()
    })
}

/// Require `token` among the comma separated values of every `name` header
fn require_token(headers: &HeaderMap, name: HeaderName, display: &str, token: &str) -> Result<()> {
    if !headers.contains_key(&name) {
        return Err(ProtocolError::MissingHeader(display.to_string()).into());
    }

    let found = headers.get_all(&name).iter().any(|value| {
        value
            .to_str()
            .map(|s| s.split(',').any(|t| t.trim().eq_ignore_ascii_case(token)))
            .unwrap_or(false)
    });

    if found {
        Ok(())
    } else {
        let value = header_str(headers, name, display)?;
        Err(ProtocolError::InvalidHeaderValue {
            header: display.to_string(),
            value: value.to_string(),
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_REQUEST: &str = "GET /chat HTTP/1.1\r\n\
        Host: server.example.com\r\n\
        Upgrade: websocket\r\n\
        Connection: keep-alive, Upgrade\r\n\
        Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
        Sec-WebSocket-Version: 13\r\n\r\n";

    #[test]
    fn test_key_generation() {
        let key = generate_key();
        assert_eq!(key.len(), 24);
        assert!(validate_key(&key));
        assert_ne!(key, generate_key());
    }

    #[test]
    fn test_accept_key_calculation() {
        // RFC 6455 section 1.3
        assert_eq!(
            compute_accept_key("dGhlIHNhbXBsZSBub25jZQ=="),
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
    }

    #[test]
    fn test_client_handshake_parsing() {
        let (request, len) = parse_client_handshake(SAMPLE_REQUEST.as_bytes())
            .unwrap()
            .unwrap();
        assert_eq!(len, SAMPLE_REQUEST.len());
        assert_eq!(request.path, "/chat");
        assert_eq!(
            validate_client_handshake(&request).unwrap(),
            "dGhlIHNhbXBsZSBub25jZQ=="
        );
    }

    #[test]
    fn test_partial_request_and_pipelined_bytes() {
        let bytes = SAMPLE_REQUEST.as_bytes();
        assert!(parse_client_handshake(&bytes[..30]).unwrap().is_none());

        let mut pipelined = bytes.to_vec();
        pipelined.extend_from_slice(b"\x81\x80");
        let (_, len) = parse_client_handshake(&pipelined).unwrap().unwrap();
        assert_eq!(&pipelined[len..], b"\x81\x80");
    }

    #[test]
    fn test_plain_get_is_rejected_with_400() {
        let plain = b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let (request, _) = parse_client_handshake(plain).unwrap().unwrap();
        let err = validate_client_handshake(&request).unwrap_err();
        assert!(matches!(
            err,
            Error::Protocol(ProtocolError::MissingHeader(ref h)) if h == "Upgrade"
        ));
        assert_eq!(rejection_status(&err), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_wrong_version_is_rejected_with_426() {
        let request_text = SAMPLE_REQUEST.replace("Version: 13", "Version: 8");
        let (request, _) = parse_client_handshake(request_text.as_bytes())
            .unwrap()
            .unwrap();
        let err = validate_client_handshake(&request).unwrap_err();
        assert_eq!(rejection_status(&err), StatusCode::UPGRADE_REQUIRED);

        let response = create_rejection(rejection_status(&err), &err.to_string());
        let text = String::from_utf8(response.to_bytes().to_vec()).unwrap();
        assert!(text.starts_with("HTTP/1.1 426 Upgrade Required\r\n"));
        assert!(text.contains("Sec-WebSocket-Version: 13\r\n"));
    }

    #[test]
    fn test_bad_key_rejected() {
        let request_text = SAMPLE_REQUEST.replace("dGhlIHNhbXBsZSBub25jZQ==", "c2hvcnQ=");
        let (request, _) = parse_client_handshake(request_text.as_bytes())
            .unwrap()
            .unwrap();
        assert!(validate_client_handshake(&request).is_err());
    }

    #[test]
    fn test_client_and_server_agree() {
        let config = HandshakeConfig {
            host: Some("127.0.0.1:9000".to_string()),
            user_agent: Some("echosock-test".to_string()),
            extra_headers: vec![("X-Trace".to_string(), "1".to_string())],
            ..Default::default()
        };
        let (request, key) = create_client_handshake("/", &config).unwrap();
        let wire = request.to_bytes();
        let (parsed, _) = parse_client_handshake(&wire).unwrap().unwrap();
        assert_eq!(parsed.headers.get("x-trace").unwrap(), "1");
        let server_key = validate_client_handshake(&parsed).unwrap();
        assert_eq!(server_key, key);

        let response = create_server_handshake(&server_key).unwrap();
        let wire = response.to_bytes();
        assert!(wire.starts_with(b"HTTP/1.1 101 Switching Protocols\r\n"));
        let (parsed, len) = parse_server_handshake(&wire).unwrap().unwrap();
        assert_eq!(len, wire.len());
        validate_server_handshake(&parsed, &key).unwrap();
    }

    #[test]
    fn test_server_handshake_wrong_accept() {
        let response = create_server_handshake("dGhlIHNhbXBsZSBub25jZQ==").unwrap();
        let err = validate_server_handshake(&response, &generate_key()).unwrap_err();
        assert!(matches!(
            err,
            Error::Protocol(ProtocolError::InvalidAcceptKey { .. })
        ));
    }

    #[test]
    fn test_server_handshake_unexpected_status() {
        let rejection = create_rejection(StatusCode::BAD_REQUEST, "nope");
        let (parsed, _) = parse_server_handshake(&rejection.to_bytes())
            .unwrap()
            .unwrap();
        assert!(matches!(
            validate_server_handshake(&parsed, "key"),
            Err(Error::Protocol(ProtocolError::UnexpectedStatus(400)))
        ));
    }

    #[test]
    fn test_canonical_header_names() {
        assert_eq!(canonical_name(&SEC_WEBSOCKET_ACCEPT), "Sec-WebSocket-Accept");
        assert_eq!(canonical_name(&CONTENT_LENGTH), "Content-Length");
    }
}
