use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use super::{SignRequest, Signer, SignerError, StandardAuth};
use crate::config::{ConfigError, RemoteSignerConfig};

const AUTHSIGN_PATH: &str = "api/v1/cfssl/authsign";
const MAX_ERROR_BODY_CHARS: usize = 256;

/// Envelope for an authenticated signing request. Both fields are base64.
#[derive(Debug, Serialize, Deserialize)]
struct AuthenticatedRequest {
    token: String,
    request: String,
}

#[derive(Debug, Deserialize)]
struct SignerResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    result: Option<SignResult>,
    #[serde(default)]
    errors: Vec<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct SignResult {
    #[serde(default)]
    certificate: String,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

impl SignerResponse {
    fn error_message(&self) -> String {
        self.errors
            .first()
            .map(|e| format!("{} (code {})", e.message, e.code))
            .unwrap_or_else(|| "unknown error".into())
    }
}

/// Signs over HTTP against a CFSSL-compatible `authsign` endpoint.
///
/// The client is pooled and safe to share between concurrent issuances.
#[derive(Debug)]
pub struct RemoteSigner {
    endpoint: Url,
    client: Client,
    auth: StandardAuth,
}

impl RemoteSigner {
    pub fn new(address: &str, auth: StandardAuth, timeout: Duration) -> Result<Self, ConfigError> {
        let endpoint = authsign_endpoint(address)?;

        let client = Client::builder()
            .user_agent(format!("lucid-ca/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(ConfigError::Client)?;

        Ok(Self {
            endpoint,
            client,
            auth,
        })
    }

    pub fn from_config(config: &RemoteSignerConfig) -> Result<Self, ConfigError> {
        if config.timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }

        let auth = StandardAuth::new(
            &config.auth_key,
            config.additional_data.as_deref().map(str::as_bytes),
        )?;

        Self::new(
            &config.address,
            auth,
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

/// Turn `host:port` or a base URI into the full `authsign` URL.
fn authsign_endpoint(address: &str) -> Result<Url, ConfigError> {
    let address = address.trim();
    if address.is_empty() {
        return Err(ConfigError::EmptyAddress);
    }

    let invalid = |reason: String| ConfigError::InvalidAddress {
        address: address.to_string(),
        reason,
    };

    let with_scheme = if address.contains("://") {
        address.to_string()
    } else {
        format!("http://{address}")
    };

    let mut base = Url::parse(&with_scheme).map_err(|e| invalid(e.to_string()))?;
    if !matches!(base.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {}", base.scheme())));
    }
    if base.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host".into()));
    }

    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }

    base.join(AUTHSIGN_PATH).map_err(|e| invalid(e.to_string()))
}

fn body_snippet(body: &[u8]) -> String {
    String::from_utf8_lossy(body)
        .chars()
        .take(MAX_ERROR_BODY_CHARS)
        .collect()
}

#[async_trait]
impl Signer for RemoteSigner {
    #[instrument(skip(self, request), fields(profile = %request.profile, endpoint = %self.endpoint))]
    async fn sign(&self, request: &SignRequest) -> Result<Vec<u8>, SignerError> {
        let payload = serde_json::to_vec(request)?;
        let token = self.auth.token(&payload);

        let body = AuthenticatedRequest {
            token: STANDARD.encode(token),
            request: STANDARD.encode(&payload),
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;
        let parsed = serde_json::from_slice::<SignerResponse>(&bytes);

        let message = || match &parsed {
            Ok(envelope) => envelope.error_message(),
            Err(_) => body_snippet(&bytes),
        };

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            warn!(status = status.as_u16(), "Signer rejected request authentication");
            return Err(SignerError::Unauthenticated {
                status: status.as_u16(),
                message: message(),
            });
        }

        if !status.is_success() {
            warn!(status = status.as_u16(), "Signer returned error status");
            return Err(SignerError::Rejected {
                status: status.as_u16(),
                message: message(),
            });
        }

        let envelope = parsed.map_err(|e| SignerError::MalformedResponse(e.to_string()))?;
        if !envelope.success {
            warn!(status = status.as_u16(), "Signer reported failure");
            return Err(SignerError::Rejected {
                status: status.as_u16(),
                message: envelope.error_message(),
            });
        }

        let certificate = envelope
            .result
            .map(|result| result.certificate)
            .unwrap_or_default();

        debug!(len = certificate.len(), "Signer returned certificate");
        Ok(certificate.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{header, method, path},
    };

    use super::*;
    use crate::signer::Subject;

    const KEY_HEX: &str = "00112233445566778899aabbccddeeff";
    const CERT_PEM: &str = "-----BEGIN CERTIFICATE-----\nMAA=\n-----END CERTIFICATE-----\n";

    fn auth() -> StandardAuth {
        StandardAuth::new(KEY_HEX, None).unwrap()
    }

    fn request() -> SignRequest {
        SignRequest {
            hosts: vec!["example.com".into()],
            request: "-----BEGIN CERTIFICATE REQUEST-----\nMAA=\n-----END CERTIFICATE REQUEST-----\n"
                .into(),
            subject: Some(Subject {
                cn: "example.com".into(),
            }),
            profile: "ee".into(),
            label: String::new(),
        }
    }

    fn signer(server: &MockServer) -> RemoteSigner {
        RemoteSigner::new(&server.uri(), auth(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_sign_sends_authenticated_request() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/cfssl/authsign"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "result": { "certificate": CERT_PEM },
                "errors": [],
                "messages": [],
            })))
            .expect(1)
            .mount(&server)
            .await;

        let certificate = signer(&server).sign(&request()).await.unwrap();
        assert_eq!(certificate, CERT_PEM.as_bytes());

        let received = server.received_requests().await.unwrap();
        let envelope: AuthenticatedRequest = serde_json::from_slice(&received[0].body).unwrap();
        let token = STANDARD.decode(envelope.token).unwrap();
        let payload = STANDARD.decode(envelope.request).unwrap();

        assert!(auth().verify(&token, &payload));
        let sent: SignRequest = serde_json::from_slice(&payload).unwrap();
        assert_eq!(sent, request());
    }

    #[tokio::test]
    async fn test_host_port_address_uses_http() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/cfssl/authsign"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "result": { "certificate": CERT_PEM },
            })))
            .expect(1)
            .mount(&server)
            .await;

        let address = server.address().to_string();
        let signer = RemoteSigner::new(&address, auth(), Duration::from_secs(5)).unwrap();

        assert_eq!(signer.endpoint().scheme(), "http");
        assert!(signer.sign(&request()).await.is_ok());
    }

    #[tokio::test]
    async fn test_unauthorized_is_reported_as_authentication_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "success": false,
                "result": null,
                "errors": [{ "code": 401, "message": "invalid token" }],
            })))
            .mount(&server)
            .await;

        let err = signer(&server).sign(&request()).await.unwrap_err();
        assert!(
            matches!(err, SignerError::Unauthenticated { status: 401, ref message } if message.contains("invalid token"))
        );
    }

    #[tokio::test]
    async fn test_error_status_with_html_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
            .mount(&server)
            .await;

        let err = signer(&server).sign(&request()).await.unwrap_err();
        assert!(
            matches!(err, SignerError::Rejected { status: 502, ref message } if message.contains("Bad Gateway"))
        );
    }

    #[tokio::test]
    async fn test_success_false_is_rejected() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "errors": [{ "code": 5300, "message": "unknown profile" }],
            })))
            .mount(&server)
            .await;

        let err = signer(&server).sign(&request()).await.unwrap_err();
        assert!(
            matches!(err, SignerError::Rejected { status: 200, ref message } if message.contains("unknown profile"))
        );
    }

    #[tokio::test]
    async fn test_non_json_success_is_malformed() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(CERT_PEM))
            .mount(&server)
            .await;

        let err = signer(&server).sign(&request()).await.unwrap_err();
        assert!(matches!(err, SignerError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_missing_certificate_returns_empty_bytes() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "result": { "certificate": "" },
            })))
            .mount(&server)
            .await;

        let certificate = signer(&server).sign(&request()).await.unwrap();
        assert!(certificate.is_empty());
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let signer =
            RemoteSigner::new(&format!("127.0.0.1:{port}"), auth(), Duration::from_secs(5))
                .unwrap();

        let err = signer.sign(&request()).await.unwrap_err();
        assert!(matches!(err, SignerError::Transport(_)));
    }

    #[test]
    fn test_endpoint_normalization() {
        assert_eq!(
            authsign_endpoint("ca.internal:8888").unwrap().as_str(),
            "http://ca.internal:8888/api/v1/cfssl/authsign"
        );
        assert_eq!(
            authsign_endpoint(" https://ca.internal/signer ").unwrap().as_str(),
            "https://ca.internal/signer/api/v1/cfssl/authsign"
        );
        assert_eq!(
            authsign_endpoint("http://10.0.0.5:8888/").unwrap().as_str(),
            "http://10.0.0.5:8888/api/v1/cfssl/authsign"
        );
    }

    #[test]
    fn test_endpoint_rejects_bad_addresses() {
        assert!(matches!(
            authsign_endpoint("   ").unwrap_err(),
            ConfigError::EmptyAddress
        ));
        assert!(matches!(
            authsign_endpoint("ftp://ca.internal").unwrap_err(),
            ConfigError::InvalidAddress { .. }
        ));
        assert!(matches!(
            authsign_endpoint("ca.internal:notaport").unwrap_err(),
            ConfigError::InvalidAddress { .. }
        ));
    }

    #[test]
    fn test_from_config_rejects_bad_key() {
        let config = RemoteSignerConfig {
            address: "ca.internal:8888".into(),
            auth_key: "zz".into(),
            additional_data: None,
            timeout_secs: 30,
        };

        assert!(matches!(
            RemoteSigner::from_config(&config).unwrap_err(),
            ConfigError::InvalidAuthKey(_)
        ));
    }

    #[test]
    fn test_from_config_rejects_zero_timeout() {
        let config = RemoteSignerConfig {
            address: "ca.internal:8888".into(),
            auth_key: KEY_HEX.into(),
            additional_data: None,
            timeout_secs: 0,
        };

        assert!(matches!(
            RemoteSigner::from_config(&config).unwrap_err(),
            ConfigError::ZeroTimeout
        ));
    }
}
