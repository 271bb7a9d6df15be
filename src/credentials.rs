//! Short-lived telephony credentials, issued against the application's own
//! auth token.

use crate::http::{HttpClient, HttpRequest};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("not authenticated")]
    NotAuthenticated,

    #[error("credential endpoint returned status {0}")]
    Issuance(u16),

    #[error("credential request failed: {0}")]
    Http(anyhow::Error),

    #[error("malformed credential response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<anyhow::Error> for CredentialError {
    fn from(e: anyhow::Error) -> Self {
        Self::Http(e)
    }
}

/// Supplies the application-level auth token used to obtain telephony
/// credentials. Resolving to `None` (or an empty string) means the user is
/// not signed in.
#[async_trait]
pub trait TokenSupplier: Send + Sync {
    async fn token(&self) -> Option<String>;
}

/// Identity + secret pair authorizing a signaling-channel connection.
///
/// Short-lived and never persisted; a fresh one is fetched on every
/// registration.
#[derive(Clone)]
pub struct Credential {
    pub identity: String,
    pub secret: String,
    pub issued_at: DateTime<Utc>,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("identity", &self.identity)
            .field("secret", &"<redacted>")
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

#[derive(Deserialize)]
struct IssuanceResponse {
    token: String,
    identity: String,
}

/// Exchanges an application auth token for a telephony [`Credential`].
///
/// Stateless: no caching layer, every call re-fetches. Credentials are
/// short-lived and registration is infrequent.
pub struct CredentialProvider {
    endpoint: String,
    http_client: Arc<dyn HttpClient>,
}

impl CredentialProvider {
    pub fn new(endpoint: impl Into<String>, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            endpoint: endpoint.into(),
            http_client,
        }
    }

    pub async fn fetch_credential(
        &self,
        supplier: &dyn TokenSupplier,
    ) -> Result<Credential, CredentialError> {
        let token = match supplier.token().await {
            Some(token) if !token.is_empty() => token,
            _ => return Err(CredentialError::NotAuthenticated),
        };

        let request = HttpRequest::get(&self.endpoint).bearer(&token);
        let response = self.http_client.execute(request).await?;

        if !response.is_success() {
            return Err(CredentialError::Issuance(response.status_code));
        }

        let issued: IssuanceResponse = serde_json::from_slice(&response.body)?;
        debug!("Issued telephony credential for {}", issued.identity);

        Ok(Credential {
            identity: issued.identity,
            secret: issued.token,
            issued_at: Utc::now(),
        })
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;

    /// A token supplier that always resolves to the same value.
    pub struct StaticTokenSupplier(pub Option<String>);

    impl StaticTokenSupplier {
        pub fn some(token: &str) -> Self {
            Self(Some(token.to_string()))
        }

        pub fn none() -> Self {
            Self(None)
        }
    }

    #[async_trait]
    impl TokenSupplier for StaticTokenSupplier {
        async fn token(&self) -> Option<String> {
            self.0.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::StaticTokenSupplier;
    use super::*;
    use crate::http::mock::MockHttpClient;

    const ISSUANCE_BODY: &str = r#"{"token":"s3cret","identity":"agent-17"}"#;

    #[tokio::test]
    async fn missing_token_fails_without_network() {
        let http = Arc::new(MockHttpClient::with_response(200, ISSUANCE_BODY));
        let provider = CredentialProvider::new("https://issuer.test/credential", http.clone());

        let err = provider
            .fetch_credential(&StaticTokenSupplier::none())
            .await
            .unwrap_err();
        assert!(matches!(err, CredentialError::NotAuthenticated));
        assert_eq!(http.calls(), 0);
    }

    #[tokio::test]
    async fn empty_token_is_treated_as_unauthenticated() {
        let http = Arc::new(MockHttpClient::with_response(200, ISSUANCE_BODY));
        let provider = CredentialProvider::new("https://issuer.test/credential", http.clone());

        let err = provider
            .fetch_credential(&StaticTokenSupplier::some(""))
            .await
            .unwrap_err();
        assert!(matches!(err, CredentialError::NotAuthenticated));
        assert_eq!(http.calls(), 0);
    }

    #[tokio::test]
    async fn non_2xx_surfaces_issuance_error_with_status() {
        let http = Arc::new(MockHttpClient::with_response(403, "forbidden"));
        let provider = CredentialProvider::new("https://issuer.test/credential", http);

        let err = provider
            .fetch_credential(&StaticTokenSupplier::some("app-token"))
            .await
            .unwrap_err();
        assert!(matches!(err, CredentialError::Issuance(403)));
    }

    #[tokio::test]
    async fn successful_issuance_yields_credential() {
        let http = Arc::new(MockHttpClient::with_response(200, ISSUANCE_BODY));
        let provider = CredentialProvider::new("https://issuer.test/credential", http.clone());

        let credential = provider
            .fetch_credential(&StaticTokenSupplier::some("app-token"))
            .await
            .unwrap();
        assert_eq!(credential.identity, "agent-17");
        assert_eq!(credential.secret, "s3cret");
        assert_eq!(http.calls(), 1);
    }

    #[test]
    fn debug_redacts_secret() {
        let credential = Credential {
            identity: "agent-17".to_string(),
            secret: "s3cret".to_string(),
            issued_at: Utc::now(),
        };
        let rendered = format!("{credential:?}");
        assert!(!rendered.contains("s3cret"));
    }
}
