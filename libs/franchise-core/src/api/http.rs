//! reqwest-backed implementation of the backend traits

use super::{CaseApi, NotificationApi, RemarkApi, UserApi};
use crate::config::ClientConfig;
use crate::error::{FranchiseError, Result};
use crate::models::{
    Case, Notification, NotificationRequest, NewRemark, Permissions, Remark, ServiceStatus, User,
};
use crate::status::StatusSummary;
use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};
use url::Url;

const USER_AGENT: &str = concat!("franchise-core/", env!("CARGO_PKG_VERSION"));

/// Responses arrive either bare or wrapped in `{ "data": ... }`
#[derive(Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    fn into_inner(self) -> T {
        match self {
            Self::Wrapped { data } | Self::Bare(data) => data,
        }
    }
}

/// HTTP client for the case tracker REST API
#[derive(Debug)]
pub struct HttpApiClient {
    client: Client,
    base_url: Url,
    token: RwLock<Option<String>>,
}

impl HttpApiClient {
    /// Build a client from resolved configuration
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the HTTP client cannot be built
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let base_url = config.api_url()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.api.request_timeout_secs))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            base_url,
            token: RwLock::new(None),
        })
    }

    #[must_use]
    pub fn with_token(self, token: impl Into<String>) -> Self {
        self.set_token(Some(token.into()));
        self
    }

    /// Replace the bearer token sent with every request
    pub fn set_token(&self, token: Option<String>) {
        *self.token.write() = token;
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Check that the API answers, returning the round-trip time
    ///
    /// # Errors
    /// Returns an error if the server cannot be reached or answers non-2xx
    #[instrument(skip(self))]
    pub async fn health(&self) -> Result<Duration> {
        let started = Instant::now();
        let url = self.endpoint(&["health"])?;
        self.send(self.request(Method::GET, url)).await?;
        Ok(started.elapsed())
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| FranchiseError::configuration("API URL cannot be a base"))?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match self.token.read().as_deref() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let response = builder.send().await?;
        let status = response.status();
        debug!(url = %response.url(), status = status.as_u16(), "API response");
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = if body.trim().is_empty() {
            status.canonical_reason().unwrap_or("request failed").to_string()
        } else {
            body
        };
        Err(FranchiseError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn fetch<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = self.send(self.request(Method::GET, url)).await?;
        let bytes = response.bytes().await?;
        let envelope: Envelope<T> = serde_json::from_slice(&bytes)?;
        Ok(envelope.into_inner())
    }
}

/// Turn a 404 into the resource-specific error
fn map_not_found(err: FranchiseError, not_found: impl FnOnce() -> FranchiseError) -> FranchiseError {
    match err {
        FranchiseError::Api { status, .. } if status == StatusCode::NOT_FOUND.as_u16() => {
            not_found()
        }
        other => other,
    }
}

#[async_trait]
impl CaseApi for HttpApiClient {
    #[instrument(skip(self))]
    async fn list_cases(&self) -> Result<Vec<Case>> {
        self.fetch(self.endpoint(&["cases"])?).await
    }

    #[instrument(skip(self))]
    async fn get_case(&self, case_id: &str) -> Result<Case> {
        self.fetch(self.endpoint(&["cases", case_id])?)
            .await
            .map_err(|e| {
                map_not_found(e, || FranchiseError::CaseNotFound {
                    id: case_id.to_string(),
                })
            })
    }

    #[instrument(skip(self))]
    async fn update_case_status(&self, case_id: &str, summary: StatusSummary) -> Result<()> {
        let url = self.endpoint(&["cases", case_id, "status"])?;
        self.send(self.request(Method::PATCH, url).json(&summary))
            .await
            .map_err(|e| {
                map_not_found(e, || FranchiseError::CaseNotFound {
                    id: case_id.to_string(),
                })
            })?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn update_service_status(
        &self,
        case_id: &str,
        service_id: &str,
        status: ServiceStatus,
    ) -> Result<()> {
        let url = self.endpoint(&["cases", case_id, "services", service_id])?;
        self.send(
            self.request(Method::PATCH, url)
                .json(&json!({ "status": status })),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl RemarkApi for HttpApiClient {
    #[instrument(skip(self))]
    async fn list_remarks(&self, case_id: &str, service_id: &str) -> Result<Vec<Remark>> {
        self.fetch(self.endpoint(&["cases", case_id, "services", service_id, "remarks"])?)
            .await
    }

    #[instrument(skip(self, remark), fields(case_id = %remark.case_id))]
    async fn create_remark(&self, remark: &NewRemark) -> Result<Remark> {
        let url = self.endpoint(&["remarks"])?;
        let response = self
            .send(self.request(Method::POST, url).json(remark))
            .await?;
        let bytes = response.bytes().await?;
        let envelope: Envelope<Remark> = serde_json::from_slice(&bytes)?;
        Ok(envelope.into_inner())
    }

    #[instrument(skip(self))]
    async fn mark_remark_read(&self, remark_id: &str, user_id: &str) -> Result<()> {
        let url = self.endpoint(&["remarks", remark_id, "read"])?;
        self.send(
            self.request(Method::PATCH, url)
                .json(&json!({ "userId": user_id })),
        )
        .await
        .map_err(|e| {
            map_not_found(e, || FranchiseError::RemarkNotFound {
                id: remark_id.to_string(),
            })
        })?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_remark(&self, remark_id: &str) -> Result<()> {
        let url = self.endpoint(&["remarks", remark_id])?;
        self.send(self.request(Method::DELETE, url))
            .await
            .map_err(|e| {
                map_not_found(e, || FranchiseError::RemarkNotFound {
                    id: remark_id.to_string(),
                })
            })?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_all_remarks(&self, case_id: &str, service_id: &str) -> Result<()> {
        let url = self.endpoint(&["cases", case_id, "services", service_id, "remarks"])?;
        self.send(self.request(Method::DELETE, url)).await?;
        Ok(())
    }
}

#[async_trait]
impl UserApi for HttpApiClient {
    #[instrument(skip(self))]
    async fn get_user(&self, user_id: &str) -> Result<User> {
        self.fetch(self.endpoint(&["users", user_id])?)
            .await
            .map_err(|e| {
                map_not_found(e, || FranchiseError::UserNotFound {
                    id: user_id.to_string(),
                })
            })
    }

    #[instrument(skip(self))]
    async fn get_permissions(&self, user_id: &str) -> Result<Permissions> {
        self.fetch(self.endpoint(&["users", user_id, "permissions"])?)
            .await
            .map_err(|e| {
                map_not_found(e, || FranchiseError::UserNotFound {
                    id: user_id.to_string(),
                })
            })
    }
}

#[async_trait]
impl NotificationApi for HttpApiClient {
    #[instrument(skip(self, request), fields(recipient = %request.user_id))]
    async fn send_notification(&self, request: &NotificationRequest) -> Result<()> {
        let url = self.endpoint(&["notifications", "send"])?;
        self.send(self.request(Method::POST, url).json(request))
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_notifications(&self, user_id: &str) -> Result<Vec<Notification>> {
        let mut url = self.endpoint(&["notifications"])?;
        url.query_pairs_mut().append_pair("userId", user_id);
        self.fetch(url).await
    }

    #[instrument(skip(self))]
    async fn mark_notification_read(&self, notification_id: &str) -> Result<()> {
        let url = self.endpoint(&["notifications", notification_id, "read"])?;
        self.send(self.request(Method::PATCH, url)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base_url: &str) -> HttpApiClient {
        let mut config = ClientConfig::default();
        config.api.base_url = base_url.to_string();
        HttpApiClient::new(&config).unwrap()
    }

    #[test]
    fn test_endpoint_appends_segments() {
        let api = client("http://localhost:5000/api");
        assert_eq!(
            api.endpoint(&["cases", "c1", "status"]).unwrap().as_str(),
            "http://localhost:5000/api/cases/c1/status"
        );
    }

    #[test]
    fn test_endpoint_with_trailing_slash() {
        let api = client("https://tracker.example.com/api/");
        assert_eq!(
            api.endpoint(&["users", "u1"]).unwrap().as_str(),
            "https://tracker.example.com/api/users/u1"
        );
    }

    #[test]
    fn test_endpoint_escapes_ids() {
        let api = client("http://localhost:5000/api");
        let url = api.endpoint(&["remarks", "a/b c"]).unwrap();
        assert_eq!(url.path(), "/api/remarks/a%2Fb%20c");
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let mut config = ClientConfig::default();
        config.api.base_url = "mailto:ops@example.com".to_string();
        assert!(matches!(
            HttpApiClient::new(&config),
            Err(FranchiseError::Configuration { .. })
        ));
    }

    #[test]
    fn test_envelope_accepts_both_shapes() {
        let wrapped: Envelope<Vec<u32>> = serde_json::from_str(r#"{"data": [1, 2]}"#).unwrap();
        let bare: Envelope<Vec<u32>> = serde_json::from_str("[3]").unwrap();
        assert_eq!(wrapped.into_inner(), vec![1, 2]);
        assert_eq!(bare.into_inner(), vec![3]);
    }

    #[test]
    fn test_map_not_found_only_touches_404() {
        let not_found = FranchiseError::Api {
            status: 404,
            message: "missing".to_string(),
        };
        assert!(matches!(
            map_not_found(not_found, || FranchiseError::CaseNotFound {
                id: "c1".to_string()
            }),
            FranchiseError::CaseNotFound { .. }
        ));

        let server_error = FranchiseError::Api {
            status: 500,
            message: "boom".to_string(),
        };
        assert!(matches!(
            map_not_found(server_error, || FranchiseError::CaseNotFound {
                id: "c1".to_string()
            }),
            FranchiseError::Api { status: 500, .. }
        ));
    }
}
