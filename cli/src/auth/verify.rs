//! Credential verification against the service.

use reqwest::StatusCode;

use crate::auth::tokens::{Credential, UserData};
use crate::client::ServiceClient;
use crate::error::{AppError, Result};

/// Checks credentials with `GET /api/checktoken`.
///
/// Verification has no side effects and may be repeated freely. It never
/// retries on its own.
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    client: ServiceClient,
}

impl TokenVerifier {
    #[must_use]
    pub const fn new(client: ServiceClient) -> Self {
        Self { client }
    }

    /// Verifies `credential` and returns the service's view of the user.
    ///
    /// # Errors
    ///
    /// - [`AppError::Forbidden`] on 403; the credential must not be reused.
    /// - [`AppError::TransientService`] on any other non-200 status.
    /// - [`AppError::Decode`] if a 200 body is not valid user data.
    /// - Transport errors as converted from [`reqwest_middleware::Error`].
    pub async fn verify(&self, credential: &Credential) -> Result<UserData> {
        let url = self.client.endpoint("/api/checktoken")?;
        tracing::debug!(url = %url, "Verifying credential");

        let response = self
            .client
            .authorized_get(url, &credential.session_token)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {},
            StatusCode::FORBIDDEN => {
                tracing::warn!("Credential rejected by service (403 Forbidden)");
                return Err(AppError::Forbidden);
            },
            status => {
                tracing::warn!(status = status.as_u16(), "Unexpected verification status");
                return Err(AppError::TransientService {
                    status: status.as_u16(),
                });
            },
        }

        let body = response.bytes().await?;
        let user: UserData = serde_json::from_slice(&body)
            .map_err(|e| AppError::Decode(format!("checktoken response: {e}")))?;

        tracing::info!(username = %user.username, "Credential verified");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::tokens::Profile;
    use crate::config::ServiceConfig;
    use url::Url;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn verifier_for(server: &MockServer) -> TokenVerifier {
        let client = ServiceClient::new(&ServiceConfig {
            base_url: Url::parse(&server.uri()).unwrap(),
            timeout_secs: 5,
        })
        .unwrap();
        TokenVerifier::new(client)
    }

    fn credential() -> Credential {
        Credential {
            session_token: "tok1".to_string(),
            user_id: "u1".to_string(),
            session_id: String::new(),
            profile: Profile::default(),
        }
    }

    #[tokio::test]
    async fn ok_response_yields_user_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/checktoken"))
            .and(header("Authorization", "Bearer tok1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "username": "ada",
                "profile": {
                    "firstName": "Ada",
                    "lastName": "Lovelace",
                    "imageUrl": "https://img.example.com/ada.png",
                    "emailAddresses": ["ada@example.com"],
                    "username": "ada"
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let user = verifier_for(&server).verify(&credential()).await.unwrap();

        assert_eq!(user.username, "ada");
        assert_eq!(user.profile.first_name, "Ada");
        assert_eq!(user.profile.last_name, "Lovelace");
        assert_eq!(user.profile.image_url, "https://img.example.com/ada.png");
        assert_eq!(user.profile.email_addresses, vec!["ada@example.com"]);
        assert_eq!(user.profile.username.as_deref(), Some("ada"));
    }

    #[tokio::test]
    async fn forbidden_is_classified_and_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/checktoken"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let result = verifier_for(&server).verify(&credential()).await;
        assert!(matches!(result, Err(AppError::Forbidden)));
    }

    #[tokio::test]
    async fn other_statuses_are_transient() {
        for status in [401_u16, 404, 500, 503] {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/api/checktoken"))
                .respond_with(ResponseTemplate::new(status))
                .expect(1)
                .mount(&server)
                .await;

            let result = verifier_for(&server).verify(&credential()).await;
            match result {
                Err(AppError::TransientService { status: got }) => assert_eq!(got, status),
                other => panic!("expected transient error for {status}, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn malformed_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/checktoken"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let result = verifier_for(&server).verify(&credential()).await;
        assert!(matches!(result, Err(AppError::Decode(_))));
    }

    #[tokio::test]
    async fn verification_is_repeatable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/checktoken"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"username": "ada", "profile": {}})),
            )
            .expect(2)
            .mount(&server)
            .await;

        let verifier = verifier_for(&server);
        let first = verifier.verify(&credential()).await.unwrap();
        let second = verifier.verify(&credential()).await.unwrap();
        assert_eq!(first, second);
    }
}
