use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub url: String,
    pub dbname: String,

    // Credentials are optional; `Client::connect` logs in only when both are set
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,

    #[serde(default)]
    pub verbose: bool,

    #[serde(default)]
    pub cookies: CookiePolicy,

    /// Per-request deadline applied by the HTTP binding
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// How session cookies are carried between requests
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CookiePolicy {
    /// Resolved once, when the transport is built
    #[default]
    Auto,
    /// Keep cookies in a client-owned jar
    Jar,
    /// The client keeps no cookies; the host supplies them, e.g. through a
    /// custom `Transport` or a proxy in front of the server
    Ambient,
}

impl CookiePolicy {
    /// Resolve `Auto`. The client runs as a long-lived process, so it keeps a jar.
    pub fn resolve(self) -> Self {
        match self {
            CookiePolicy::Auto => CookiePolicy::Jar,
            other => other,
        }
    }
}

impl Config {
    pub fn new(url: impl Into<String>, dbname: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            dbname: dbname.into(),
            ..Self::default()
        }
    }

    pub fn load(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        Ok(config)
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: "http://localhost:8069".to_string(),
            dbname: "odoo".to_string(),
            username: None,
            password: None,
            verbose: false,
            cookies: CookiePolicy::default(),
            timeout_secs: None,
        }
    }
}
