use crate::api::cookies::REFRESH_COOKIE;
use crate::session::ClientError;
use crate::session::coordinator::{RefreshCoordinator, TokenExchange};
use crate::session::store::SessionStore;
use async_trait::async_trait;
use axum_extra::extract::cookie::Cookie;
use reqwest::{Method, Response, StatusCode, header};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const LOGIN_PATH: &str = "/api/auth/login";
const REFRESH_PATH: &str = "/api/auth/refresh";
const LOGOUT_PATH: &str = "/api/auth/logout";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccessTokenBody {
    access_token: String,
}

fn endpoint(base_url: &Url, path: &str) -> Result<Url, ClientError> {
    base_url.join(path).map_err(|e| ClientError::Network(format!("invalid url {path}: {e}")))
}

async fn status_error(response: Response) -> ClientError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    ClientError::Status { status, body }
}

/// Calls `GET /api/auth/refresh` with the refresh token as a cookie.
#[derive(Debug, Clone)]
pub struct HttpTokenExchange {
    http: reqwest::Client,
    refresh_url: Url,
}

impl HttpTokenExchange {
    /// # Errors
    /// Returns an error if the refresh URL cannot be derived from `base_url`.
    pub fn new(http: reqwest::Client, base_url: &Url) -> Result<Self, ClientError> {
        Ok(Self { http, refresh_url: endpoint(base_url, REFRESH_PATH)? })
    }
}

#[async_trait]
impl TokenExchange for HttpTokenExchange {
    async fn exchange(&self, refresh_token: &str) -> Result<String, ClientError> {
        let response = self
            .http
            .get(self.refresh_url.clone())
            .header(header::COOKIE, format!("{REFRESH_COOKIE}={refresh_token}"))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(ClientError::RefreshFailed(format!("refresh endpoint returned {status}")));
        }

        let body: AccessTokenBody =
            response.json().await.map_err(|e| ClientError::RefreshFailed(format!("unreadable refresh response: {e}")))?;
        Ok(body.access_token)
    }
}

/// Typed client for the API. Each request is retried at most once, after the
/// shared [`RefreshCoordinator`] has produced a new access token.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    store: Arc<SessionStore>,
    coordinator: Arc<RefreshCoordinator>,
}

impl ApiClient {
    #[must_use]
    pub const fn new(
        http: reqwest::Client,
        base_url: Url,
        store: Arc<SessionStore>,
        coordinator: Arc<RefreshCoordinator>,
    ) -> Self {
        Self { http, base_url, store, coordinator }
    }

    /// Builds a client whose refresh exchange goes to the same API.
    ///
    /// # Errors
    /// Returns an error if `base_url` cannot be joined with the API paths.
    pub fn connect(http: reqwest::Client, base_url: Url, refresh_timeout: Duration) -> Result<Self, ClientError> {
        let store = Arc::new(SessionStore::new());
        let exchange = Arc::new(HttpTokenExchange::new(http.clone(), &base_url)?);
        let coordinator = Arc::new(RefreshCoordinator::new(exchange, Arc::clone(&store), refresh_timeout));
        Ok(Self::new(http, base_url, store, coordinator))
    }

    #[must_use]
    pub const fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Logs in with a password and captures both tokens.
    ///
    /// # Errors
    /// Returns `Unauthorized` for rejected credentials and `Status` for any
    /// other non-success response.
    pub async fn login(&self, email: &str, password: &str) -> Result<(), ClientError> {
        let response = self
            .http
            .post(endpoint(&self.base_url, LOGIN_PATH)?)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(ClientError::Unauthorized);
        }
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let refresh_token = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| Cookie::parse(v.to_owned()).ok())
            .find(|c| c.name() == REFRESH_COOKIE)
            .map(|c| c.value().to_owned());

        let body: AccessTokenBody = response.json().await?;
        self.store.set_refresh_token(refresh_token);
        self.store.set_access_token(body.access_token);
        Ok(())
    }

    async fn dispatch(
        &self,
        method: &Method,
        path: &str,
        body: Option<&Value>,
        access_token: Option<&str>,
    ) -> Result<Response, ClientError> {
        let mut request = self.http.request(method.clone(), endpoint(&self.base_url, path)?);
        if let Some(token) = access_token {
            request = request.bearer_auth(token);
        }
        if let Some(cookie) = self.store.cookie_header() {
            request = request.header(header::COOKIE, cookie);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    /// Sends a request, recovering once from an expired access token.
    ///
    /// # Errors
    /// Returns `Unauthorized` when the replayed request is rejected again,
    /// the coordinator's error when the refresh fails, and `Network` for
    /// transport failures (never retried).
    pub async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Response, ClientError> {
        let snapshot = self.store.access();
        let response = self.dispatch(&method, path, body, snapshot.token.as_deref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        tracing::debug!(path = %path, "Access token rejected; refreshing session");
        let token = self.coordinator.refresh(snapshot.generation).await?;

        let retried = self.dispatch(&method, path, body, Some(&token)).await?;
        if retried.status() == StatusCode::UNAUTHORIZED {
            return Err(ClientError::Unauthorized);
        }
        Ok(retried)
    }

    /// # Errors
    /// Same as [`ApiClient::send`], plus `Status` for non-success responses.
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T, ClientError> {
        let response = self.send(method, path, body).await?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        Ok(response.json().await?)
    }

    /// # Errors
    /// See [`ApiClient::request_json`].
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.request_json(Method::GET, path, None).await
    }

    /// Ends the session on the server and forgets local tokens either way.
    ///
    /// # Errors
    /// See [`ApiClient::request_json`].
    pub async fn logout(&self) -> Result<(), ClientError> {
        let result = self.request_json::<Value>(Method::GET, LOGOUT_PATH, None).await;
        self.store.clear();
        result.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header as header_eq, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, access: &str) -> ApiClient {
        let base = Url::parse(&server.uri()).expect("url");
        let client = ApiClient::connect(reqwest::Client::new(), base, Duration::from_secs(2)).expect("client");
        client.store().set_refresh_token(Some("r1".into()));
        client.store().set_access_token(access.into());
        client
    }

    async fn mount_refresh(server: &MockServer, status: u16, delay: Duration, calls: u64) {
        Mock::given(method("GET"))
            .and(path(REFRESH_PATH))
            .and(header_eq("cookie", "refreshToken=r1"))
            .respond_with(
                ResponseTemplate::new(status)
                    .set_body_json(json!({ "accessToken": "fresh", "expiresAt": 0 }))
                    .set_delay(delay),
            )
            .expect(calls)
            .mount(server)
            .await;
    }

    async fn mount_resource(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/api/auth/profile-data"))
            .and(header_eq("authorization", "Bearer fresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "user": { "id": 1 } })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/auth/profile-data"))
            .and(header_eq("authorization", "Bearer stale"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "error": "Expired token." })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed_once_and_replayed() {
        let server = MockServer::start().await;
        mount_refresh(&server, 200, Duration::ZERO, 1).await;
        mount_resource(&server).await;

        let client = client_for(&server, "stale");
        let body: Value = client.get_json("/api/auth/profile-data").await.expect("request");

        assert_eq!(body["user"]["id"], 1);
        assert_eq!(client.store().access().token.as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_refresh() {
        let server = MockServer::start().await;
        mount_refresh(&server, 200, Duration::from_millis(100), 1).await;
        mount_resource(&server).await;

        let client = client_for(&server, "stale");
        let results = futures::future::join_all(
            (0..5).map(|_| client.get_json::<Value>("/api/auth/profile-data")),
        )
        .await;

        assert!(results.iter().all(Result::is_ok));
    }

    #[tokio::test]
    async fn test_second_401_fails_without_another_refresh() {
        let server = MockServer::start().await;
        mount_refresh(&server, 200, Duration::ZERO, 1).await;
        Mock::given(method("GET"))
            .and(path("/api/resume/all"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = client_for(&server, "stale");
        let err = client.get_json::<Value>("/api/resume/all").await.unwrap_err();

        assert_eq!(err, ClientError::Unauthorized);
    }

    #[tokio::test]
    async fn test_rejected_refresh_is_terminal() {
        let server = MockServer::start().await;
        mount_refresh(&server, 401, Duration::ZERO, 1).await;
        mount_resource(&server).await;

        let client = client_for(&server, "stale");
        let err = client.get_json::<Value>("/api/auth/profile-data").await.unwrap_err();

        assert!(matches!(err, ClientError::RefreshFailed(_)));
    }

    #[tokio::test]
    async fn test_login_captures_refresh_cookie() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(LOGIN_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("set-cookie", "refreshToken=r-new; HttpOnly; Path=/; Max-Age=60")
                    .set_body_json(json!({ "accessToken": "a-new", "expiresAt": 0 })),
            )
            .mount(&server)
            .await;

        let client = ApiClient::connect(reqwest::Client::new(), Url::parse(&server.uri()).expect("url"), Duration::from_secs(1))
            .expect("client");
        client.login("ada@example.com", "password123").await.expect("login");

        assert_eq!(client.store().refresh_token().as_deref(), Some("r-new"));
        assert_eq!(client.store().access().token.as_deref(), Some("a-new"));
    }

    #[tokio::test]
    async fn test_logout_clears_store() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(LOGOUT_PATH))
            .and(header_eq("cookie", "refreshToken=r1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "You are logged out." })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, "fresh");
        client.logout().await.expect("logout");

        assert_eq!(client.store().access().token, None);
        assert_eq!(client.store().refresh_token(), None);
    }
}
