use crate::model::Model;
use crate::transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
use crate::{ClientError, Result};
use odoorpc_core::envelope::{AuthenticateParams, CallParams, NoParams};
use odoorpc_core::{
    Config, CookiePolicy, RequestIds, RpcRequest, RpcResponse, Session, ValidationError,
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt::Display;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::sync::OnceCell;

const AUTHENTICATE: &str = "/web/session/authenticate";
const SESSION_INFO: &str = "/web/session/get_session_info";
const DESTROY: &str = "/web/session/destroy";
const REPORT_ACCEPT: &str = "application/pdf";

/// Odoo JSON-RPC client
///
/// Owns one [`Session`] and one lazily built [`Transport`]; neither is shared
/// with other clients.
pub struct Client {
    session: RwLock<Session>,
    transport: OnceCell<Arc<dyn Transport>>,
    cookies: CookiePolicy,
    timeout: Option<Duration>,
    ids: RequestIds,
}

impl Client {
    /// Create a client for `url` and database `dbname`; no I/O happens here
    pub fn new(url: &str, dbname: impl Into<String>) -> Self {
        Self {
            session: RwLock::new(Session::new(url, dbname, false)),
            transport: OnceCell::new(),
            cookies: CookiePolicy::Auto,
            timeout: None,
            ids: RequestIds::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let mut client = Self::new(&config.url, config.dbname.clone());
        client.cookies = config.cookies;
        client.timeout = config.timeout_secs.map(Duration::from_secs);
        client.set_verbose(config.verbose);
        client
    }

    /// Build from `config` and log in when both credentials are present
    pub async fn connect(config: &Config) -> Result<Self> {
        let client = Self::from_config(config);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            client.login(username, password).await?;
        }
        Ok(client)
    }

    /// Use `transport` instead of the default reqwest binding
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = OnceCell::new_with(Some(transport));
        self
    }

    pub fn set_verbose(&self, verbose: bool) {
        self.write_session().verbose = verbose;
    }

    pub fn is_verbose(&self) -> bool {
        self.read_session().verbose
    }

    /// Snapshot of the current session record
    pub fn session(&self) -> Session {
        self.read_session().clone()
    }

    pub fn url_for(&self, endpoint: &str) -> String {
        self.read_session().url_for(endpoint)
    }

    /// True iff a non-zero user id is cached. Never performs I/O.
    pub fn is_logged_in(&self) -> bool {
        self.read_session().is_logged_in()
    }

    /// Query builder scoped to `model`, e.g. `"res.partner"`
    pub fn model(&self, model: impl Into<String>) -> Model<'_> {
        Model::new(self, model.into())
    }

    /// Authenticate against the configured database.
    ///
    /// A no-op while session info is cached.
    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        if username.is_empty() || password.is_empty() {
            self.diagnose("Login rejected", ValidationError::MissingCredentials);
            return Err(ValidationError::MissingCredentials.into());
        }

        let dbname = {
            let session = self.read_session();
            if session.info.is_some() {
                tracing::debug!(uid = session.uid, "Session cached, skipping authenticate");
                return Ok(());
            }
            session.dbname.clone()
        };

        let request = RpcRequest::session(
            self.ids.next(),
            AuthenticateParams {
                db: &dbname,
                login: username,
                password,
            },
        );
        let response = self.post_json(AUTHENTICATE, &request).await?;

        if response.status != 200 {
            self.diagnose("Authentication error", response.status);
            return Err(ClientError::Auth {
                status: response.status,
            });
        }

        let info = match self.decode_rpc(&response)? {
            Value::Object(info) => info,
            other => {
                return Err(ClientError::InvalidResponse(format!(
                    "authenticate returned {other}"
                )))
            }
        };

        let uid = {
            let mut session = self.write_session();
            session.apply_info(info);
            if session.is_logged_in() {
                session.username = Some(username.to_string());
            } else {
                // Nothing stays cached, so the next login authenticates again
                session.reset();
            }
            session.uid
        };

        if uid == 0 {
            self.diagnose("Authentication error", "no user id in session info");
            return Err(ClientError::InvalidResponse(
                "authenticate returned no user id".to_string(),
            ));
        }

        self.announce(&format!("Logged in as uid {uid}"));
        Ok(())
    }

    /// Ask the server for a live session.
    ///
    /// Network failures and non-OK answers yield `false`, never an error.
    pub async fn has_session(&self) -> bool {
        match self.check_session().await {
            Ok(active) => active,
            Err(e) => {
                self.diagnose("Session check failed", e);
                false
            }
        }
    }

    async fn check_session(&self) -> Result<bool> {
        let request = RpcRequest::session(self.ids.next(), NoParams::default());
        let response = self.post_json(SESSION_INFO, &request).await?;

        if !response.is_success() {
            self.diagnose("Session check rejected", response.status);
            return Ok(false);
        }

        let decoded: RpcResponse = response.json()?;
        let mut session = self.write_session();
        match decoded.into_result() {
            Ok(Value::Object(info)) => {
                session.apply_info(info);
                if !session.is_logged_in() {
                    session.reset();
                }
            }
            Ok(_) => session.reset(),
            // Expired or invalid session; the server has no user for us
            Err(error) => {
                tracing::debug!(message = %error.message, "Session check returned an error");
                session.reset();
            }
        }
        Ok(session.is_logged_in())
    }

    /// Destroy the server-side session.
    ///
    /// Returns whether the destroy request got HTTP 200; local state is reset
    /// only in that case.
    pub async fn logout(&self) -> Result<bool> {
        let request = RpcRequest::session(self.ids.next(), NoParams::default());
        let response = self.post_json(DESTROY, &request).await?;

        if response.status != 200 {
            self.diagnose("Logout failed", response.status);
            return Ok(false);
        }

        self.write_session().reset();
        self.announce("Logged out");
        Ok(true)
    }

    /// Call `method` on `model` with the session's user context
    pub async fn call_kw(
        &self,
        model: &str,
        method: &str,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    ) -> Result<Value> {
        let context = self.read_session().context.clone();
        self.call_kw_with_context(model, method, args, kwargs, context)
            .await
    }

    /// Call `method` on `model` with an explicit context.
    ///
    /// `context` replaces any `context` entry in `kwargs`. Returns the
    /// `result` field verbatim.
    pub async fn call_kw_with_context(
        &self,
        model: &str,
        method: &str,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
        context: Map<String, Value>,
    ) -> Result<Value> {
        let endpoint = format!("/web/dataset/call_kw/{model}/{method}");
        let request = RpcRequest::call(
            self.ids.next(),
            CallParams::new(model, method, args, kwargs, context),
        );
        let response = self.post_json(&endpoint, &request).await?;

        if response.status != 200 {
            self.diagnose("Error in Odoo RPC call", &response.status_text);
            return Err(ClientError::Transport {
                status: response.status,
                status_text: response.status_text,
            });
        }

        self.decode_rpc(&response)
    }

    /// GET a binary payload (e.g. a PDF report) at `path`
    pub async fn fetch_binary(&self, path: &str) -> Result<Vec<u8>> {
        let request = HttpRequest::get(self.url_for(path), REPORT_ACCEPT);
        if self.is_verbose() {
            tracing::info!(url = %request.url, headers = ?request.headers, "Odoo GET request");
        } else {
            tracing::debug!(url = %request.url, "Odoo GET request");
        }

        let response = self.transport().await?.send(request).await?;

        if !response.is_success() {
            self.diagnose("GET failed", &response.status_text);
            return Err(ClientError::Transport {
                status: response.status,
                status_text: response.status_text,
            });
        }

        Ok(response.body)
    }

    async fn transport(&self) -> Result<&Arc<dyn Transport>> {
        self.transport
            .get_or_try_init(|| async {
                let transport = ReqwestTransport::new(self.cookies, self.timeout)?;
                tracing::debug!(cookies = ?transport.cookie_policy(), "HTTP transport initialized");
                Ok::<Arc<dyn Transport>, ClientError>(Arc::new(transport))
            })
            .await
    }

    async fn post_json<P: Serialize>(
        &self,
        endpoint: &str,
        envelope: &RpcRequest<P>,
    ) -> Result<HttpResponse> {
        let body = serde_json::to_vec(envelope)?;
        let request = HttpRequest::post_json(self.url_for(endpoint), body);

        if self.is_verbose() {
            let logged = redact(serde_json::to_value(envelope)?);
            tracing::info!(
                url = %request.url,
                headers = ?request.headers,
                body = %serde_json::to_string_pretty(&logged)?,
                "Odoo RPC request"
            );
        } else {
            tracing::debug!(url = %request.url, id = envelope.id, "Odoo RPC request");
        }

        self.transport().await?.send(request).await
    }

    fn decode_rpc(&self, response: &HttpResponse) -> Result<Value> {
        let decoded: RpcResponse = response.json()?;
        decoded.into_result().map_err(|error| {
            self.diagnose(
                "Error in Odoo RPC call",
                error.detail().unwrap_or(&error.message),
            );
            ClientError::from(error)
        })
    }

    /// Lifecycle events go to `info` when verbose, `debug` otherwise
    fn announce(&self, what: &str) {
        if self.is_verbose() {
            tracing::info!("{}", what);
        } else {
            tracing::debug!("{}", what);
        }
    }

    /// Error detail goes to `error` when verbose, `debug` otherwise
    fn diagnose(&self, what: &str, detail: impl Display) {
        if self.is_verbose() {
            tracing::error!(detail = %detail, "{}", what);
        } else {
            tracing::debug!(detail = %detail, "{}", what);
        }
    }

    fn read_session(&self) -> RwLockReadGuard<'_, Session> {
        self.session.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_session(&self) -> RwLockWriteGuard<'_, Session> {
        self.session.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Mask the password of an authenticate envelope before logging it
fn redact(mut body: Value) -> Value {
    if let Some(password) = body.pointer_mut("/params/password") {
        *password = Value::String("********".to_string());
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::MockTransport;
    use serde_json::json;

    fn client_with(mock: &Arc<MockTransport>) -> Client {
        Client::new("http://localhost:8069/", "odoo").with_transport(mock.clone())
    }

    fn session_info(uid: i64) -> Value {
        json!({"result": {"uid": uid, "user_context": {"lang": "en_US", "tz": "UTC"}}})
    }

    #[tokio::test]
    async fn test_login_stores_uid_and_context() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(200, session_info(2));
        let client = client_with(&mock);

        client.login("admin", "admin").await.unwrap();

        assert!(client.is_logged_in());
        let session = client.session();
        assert_eq!(session.uid, 2);
        assert_eq!(session.username.as_deref(), Some("admin"));
        assert_eq!(session.context["lang"], json!("en_US"));

        let requests = mock.requests();
        assert_eq!(requests[0].url, "http://localhost:8069/web/session/authenticate");
        let body = mock.body(0);
        assert_eq!(body["jsonrpc"], json!("2.0"));
        assert!(body.get("method").is_none());
        assert!(body["id"].is_u64());
        assert_eq!(
            body["params"],
            json!({"db": "odoo", "login": "admin", "password": "admin"})
        );
    }

    #[tokio::test]
    async fn test_login_is_idempotent() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(200, session_info(2));
        let client = client_with(&mock);

        client.login("admin", "admin").await.unwrap();
        client.login("admin", "admin").await.unwrap();

        assert_eq!(mock.calls(), 1);
        assert!(client.is_logged_in());
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_login_without_uid_is_not_cached() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(200, json!({"result": {"uid": false}}))
            .push_json(200, session_info(2));
        let client = client_with(&mock);

        let err = client.login("admin", "admin").await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidResponse(_)));
        assert!(!client.is_logged_in());
        assert!(client.session().info.is_none());
        assert!(client.session().username.is_none());

        client.login("admin", "admin").await.unwrap();
        assert!(client.is_logged_in());
        assert_eq!(client.session().uid, 2);
        assert_eq!(mock.calls(), 2);
    }

    #[tokio::test]
    async fn test_login_requires_credentials() {
        let mock = Arc::new(MockTransport::new());
        let client = client_with(&mock);

        for (user, pass) in [("", "admin"), ("admin", ""), ("", "")] {
            let err = client.login(user, pass).await.unwrap_err();
            assert!(matches!(
                err,
                ClientError::Validation(ValidationError::MissingCredentials)
            ));
        }
        assert_eq!(mock.calls(), 0);
        assert!(!client.is_logged_in());
    }

    #[tokio::test]
    async fn test_login_http_failure_is_auth_error() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(500, json!({}));
        let client = client_with(&mock);

        let err = client.login("admin", "admin").await.unwrap_err();
        assert!(matches!(err, ClientError::Auth { status: 500 }));
        assert!(!client.is_logged_in());
    }

    #[tokio::test]
    async fn test_login_error_body_is_protocol_error() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(
            200,
            json!({"error": {"code": 200, "message": "Access Denied", "data": {}}}),
        );
        let client = client_with(&mock);

        let err = client.login("admin", "wrongpassword").await.unwrap_err();
        match err {
            ClientError::Protocol { message, .. } => assert_eq!(message, "Access Denied"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!client.is_logged_in());
        assert!(client.session().info.is_none());
    }

    #[tokio::test]
    async fn test_has_session_refreshes_state() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(200, session_info(7));
        let client = client_with(&mock);

        assert!(client.has_session().await);
        assert_eq!(client.session().uid, 7);
        assert_eq!(
            mock.requests()[0].url,
            "http://localhost:8069/web/session/get_session_info"
        );
        assert_eq!(mock.body(0)["params"], json!({}));
    }

    #[tokio::test]
    async fn test_has_session_false_without_user() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(200, json!({"result": {"uid": null}}));
        let client = client_with(&mock);

        assert!(!client.has_session().await);
        assert!(client.session().info.is_none());
    }

    #[tokio::test]
    async fn test_has_session_never_fails() {
        let mock = Arc::new(MockTransport::new());
        mock.push_unreachable()
            .push_json(404, json!({}))
            .push_bytes(200, b"<html>not json</html>")
            .push_json(200, json!({"error": {"message": "Session expired"}}));
        let client = client_with(&mock);

        for _ in 0..4 {
            assert!(!client.has_session().await);
        }
        assert_eq!(mock.calls(), 4);
    }

    #[tokio::test]
    async fn test_expired_check_clears_cache() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(200, session_info(2))
            .push_json(200, json!({"error": {"message": "Session expired"}}));
        let client = client_with(&mock);

        client.login("admin", "admin").await.unwrap();
        assert!(!client.has_session().await);
        assert!(!client.is_logged_in());
        assert!(client.session().info.is_none());
    }

    #[tokio::test]
    async fn test_logout_resets_state() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(200, session_info(2))
            .push_json(200, json!({"result": null}));
        let client = client_with(&mock);

        client.login("admin", "admin").await.unwrap();
        assert!(client.logout().await.unwrap());

        assert!(!client.is_logged_in());
        let session = client.session();
        assert_eq!(session.uid, 0);
        assert!(session.context.is_empty());
        assert_eq!(session.url, "http://localhost:8069");
        assert_eq!(mock.requests()[1].url, "http://localhost:8069/web/session/destroy");
    }

    #[tokio::test]
    async fn test_logout_http_failure_keeps_state() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(200, session_info(2)).push_json(502, json!({}));
        let client = client_with(&mock);

        client.login("admin", "admin").await.unwrap();
        assert!(!client.logout().await.unwrap());
        assert!(client.is_logged_in());
    }

    #[tokio::test]
    async fn test_call_kw_envelope() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(200, session_info(2))
            .push_json(200, json!({"result": {"type": "contact"}}));
        let client = client_with(&mock);
        client.login("admin", "admin").await.unwrap();

        let kwargs = json!({"context": {"lang": "fr_FR"}}).as_object().cloned().unwrap();
        let result = client
            .call_kw("res.partner", "default_get", vec![json!(["type"])], kwargs)
            .await
            .unwrap();

        assert_eq!(result, json!({"type": "contact"}));
        assert_eq!(
            mock.requests()[1].url,
            "http://localhost:8069/web/dataset/call_kw/res.partner/default_get"
        );
        let body = mock.body(1);
        assert_eq!(body["method"], json!("call"));
        assert_eq!(body["params"]["model"], json!("res.partner"));
        assert_eq!(body["params"]["method"], json!("default_get"));
        assert_eq!(body["params"]["args"], json!([["type"]]));
        // session context wins over caller kwargs.context
        assert_eq!(
            body["params"]["kwargs"]["context"],
            json!({"lang": "en_US", "tz": "UTC"})
        );
    }

    #[tokio::test]
    async fn test_call_kw_explicit_context() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(200, json!({"result": true}));
        let client = client_with(&mock);

        let context = json!({"active_test": false}).as_object().cloned().unwrap();
        client
            .call_kw_with_context("res.partner", "search", vec![json!([])], Map::new(), context)
            .await
            .unwrap();

        assert_eq!(
            mock.body(0)["params"]["kwargs"],
            json!({"context": {"active_test": false}})
        );
    }

    #[tokio::test]
    async fn test_call_kw_http_500() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(500, json!({}));
        let client = client_with(&mock);

        let err = client
            .call_kw("res.partner", "search", vec![], Map::new())
            .await
            .unwrap_err();
        match err {
            ClientError::Transport {
                status,
                status_text,
            } => {
                assert_eq!(status, 500);
                assert_eq!(status_text, "Internal Server Error");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_call_kw_error_body() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(
            200,
            json!({"error": {
                "code": 200,
                "message": "Invalid field 'nope' on model 'res.partner'"
            }}),
        );
        let client = client_with(&mock);
        client.set_verbose(true);

        let err = client
            .call_kw("res.partner", "read", vec![], Map::new())
            .await
            .unwrap_err();
        match err {
            ClientError::Protocol { message, code, .. } => {
                assert_eq!(message, "Invalid field 'nope' on model 'res.partner'");
                assert_eq!(code, Some(200));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_binary() {
        let mock = Arc::new(MockTransport::new());
        mock.push_bytes(200, b"%PDF-1.7 ...").push_bytes(404, b"");
        let client = client_with(&mock);

        let bytes = client.fetch_binary("/report/pdf/r/1").await.unwrap();
        assert_eq!(&bytes[..5], b"%PDF-");
        let request = &mock.requests()[0];
        assert_eq!(request.method, reqwest::Method::GET);
        assert_eq!(request.headers[reqwest::header::ACCEPT], "application/pdf");

        let err = client.fetch_binary("/report/pdf/r/2").await.unwrap_err();
        assert!(matches!(err, ClientError::Transport { status: 404, .. }));
        assert_eq!(err.to_string(), "HTTP error! status: 404 Not Found");
    }

    #[tokio::test]
    async fn test_connect_logs_in_with_credentials() {
        let config = Config::new("http://127.0.0.1:9", "odoo");
        let client = Client::connect(&config).await.unwrap();
        assert!(!client.is_logged_in());

        let config = config.with_credentials("admin", "");
        assert!(matches!(
            Client::connect(&config).await,
            Err(ClientError::Validation(ValidationError::MissingCredentials))
        ));
    }

    #[test]
    fn test_from_config() {
        let config = Config::new("http://localhost:8069///", "prod").with_verbose(true);
        let client = Client::from_config(&config);
        assert!(client.is_verbose());
        assert_eq!(client.url_for("/web"), "http://localhost:8069/web");
        assert_eq!(client.session().dbname, "prod");

        client.set_verbose(false);
        assert!(!client.is_verbose());
    }

    /// Collects formatted log lines written by a scoped subscriber
    #[derive(Clone, Default)]
    struct Capture(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Capture {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    /// Route `info` and above to a buffer for the rest of the test
    fn capture_logs() -> (Capture, tracing::subscriber::DefaultGuard) {
        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        (capture, guard)
    }

    #[tokio::test]
    async fn test_verbose_logs_request_and_masks_password() {
        let (capture, _guard) = capture_logs();

        let mock = Arc::new(MockTransport::new());
        mock.push_json(200, session_info(2));
        let client = client_with(&mock);
        client.set_verbose(true);

        client.login("admin", "s3cret").await.unwrap();

        let logged = capture.text();
        assert!(logged.contains("http://localhost:8069/web/session/authenticate"));
        assert!(logged.contains("content-type"));
        assert!(logged.contains("application/json"));
        assert!(logged.contains("\"login\": \"admin\""));
        assert!(logged.contains("********"));
        assert!(!logged.contains("s3cret"));
        assert!(logged.contains("Logged in as uid 2"));
    }

    #[tokio::test]
    async fn test_verbose_logs_error_detail() {
        let (capture, _guard) = capture_logs();

        let mock = Arc::new(MockTransport::new());
        mock.push_json(
            200,
            json!({"error": {"code": 200, "message": "Odoo Server Error",
                "data": {"message": "Invalid field 'nope'"}}}),
        );
        let client = client_with(&mock);
        client.set_verbose(true);

        let result = client
            .call_kw("res.partner", "read", vec![json!([7])], Map::new())
            .await;
        assert!(matches!(result, Err(ClientError::Protocol { .. })));
        assert!(capture.text().contains("Invalid field 'nope'"));
    }

    #[tokio::test]
    async fn test_quiet_client_logs_nothing_at_info() {
        let (capture, _guard) = capture_logs();

        let mock = Arc::new(MockTransport::new());
        mock.push_json(200, session_info(2))
            .push_json(200, json!({"result": null}));
        let client = client_with(&mock);

        client.login("admin", "s3cret").await.unwrap();
        assert!(client.logout().await.unwrap());

        assert_eq!(capture.text(), "");
    }

    #[test]
    fn test_redact_password() {
        let body = json!({"params": {"db": "odoo", "login": "admin", "password": "secret"}});
        let logged = redact(body);
        assert_eq!(logged["params"]["password"], json!("********"));
        assert_eq!(logged["params"]["login"], json!("admin"));
    }
}
