use serde::Serialize;
use serde_json::{Map, Value};

/// Connection and authentication state of one client
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Session {
    /// Server base URL, without trailing slashes
    pub url: String,
    pub dbname: String,
    /// Authenticated user id; 0 when nobody is logged in
    pub uid: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Raw session info returned by the server
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<Map<String, Value>>,
    /// User context merged into every call's kwargs
    pub context: Map<String, Value>,
    pub verbose: bool,
}

impl Session {
    pub fn new(url: &str, dbname: impl Into<String>, verbose: bool) -> Self {
        Self {
            url: normalize_base_url(url),
            dbname: dbname.into(),
            verbose,
            ..Self::default()
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.uid != 0
    }

    /// Store session info as returned by authenticate or the session check.
    ///
    /// `uid` may be `false` or missing for an anonymous session; both map to 0.
    pub fn apply_info(&mut self, info: Map<String, Value>) {
        self.uid = info.get("uid").and_then(Value::as_i64).unwrap_or(0);
        self.context = match info.get("user_context") {
            Some(Value::Object(context)) => context.clone(),
            _ => Map::new(),
        };
        self.info = Some(info);
    }

    /// Back to the unauthenticated baseline; connection settings are kept.
    pub fn reset(&mut self) {
        self.uid = 0;
        self.username = None;
        self.info = None;
        self.context = Map::new();
    }

    /// Absolute URL of `endpoint`, appended as-is
    pub fn url_for(&self, endpoint: &str) -> String {
        format!("{}{}", self.url, endpoint)
    }
}

/// Strip trailing slashes once, at configuration time
pub fn normalize_base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
