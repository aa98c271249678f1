//! Bridge configuration
//!
//! Every timing knob of the adapter lives here. `Default` carries the
//! documented defaults; `from_env` overlays `MCPBRIDGE_*` variables.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Prefix of every configuration variable
pub const ENV_PREFIX: &str = "MCPBRIDGE_";

/// Main HTTP listener
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Externally visible base URL (issuer). Derived from host/port if unset.
    pub public_base_url: Option<String>,
    /// Upper bound on handling a single request
    pub request_timeout: Duration,
    /// Time allowed for in-flight requests after shutdown starts
    pub shutdown_grace: Duration,
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8787,
            public_base_url: None,
            request_timeout: Duration::from_secs(30),
            shutdown_grace: Duration::from_secs(10),
            enable_cors: true,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Base URL without trailing slash
    pub fn base_url(&self) -> String {
        match self.public_base_url {
            Some(ref url) => url.trim_end_matches('/').to_string(),
            None => format!("http://localhost:{}", self.port),
        }
    }
}

/// Background polling of the backend
#[derive(Debug, Clone)]
pub struct PollingConfig {
    /// Delay between two `check_completion` calls
    pub interval: Duration,
    /// Wall-clock deadline of one worker
    pub timeout: Duration,
    /// Upper bound on a single `check_completion` call
    pub request_timeout: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            timeout: Duration::from_secs(300),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Auxiliary landing-page listener
#[derive(Debug, Clone)]
pub struct CallbackConfig {
    pub enabled: bool,
    pub host: String,
    /// 0 picks an ephemeral port
    pub port: u16,
    /// Time allowed to receive request headers
    pub read_timeout: Duration,
    /// Time allowed to produce the response
    pub write_timeout: Duration,
    /// Maximum lifetime of one connection
    pub idle_timeout: Duration,
    pub shutdown_grace: Duration,
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8788,
            read_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(30),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

/// Issued bearer tokens
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// None means tokens live until revoked or the backend credential expires
    pub ttl: Option<Duration>,
    /// Scope reported in token responses when the client asked for none
    pub default_scope: String,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            ttl: Some(Duration::from_secs(3600)),
            default_scope: "mcp".to_string(),
        }
    }
}

/// Legacy backend HTTP endpoints
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    pub start_path: String,
    pub status_path: String,
    pub timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:9000".to_string(),
            start_path: "/auth/start".to_string(),
            status_path: "/auth/status".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Fixed-window request budgets of the OAuth endpoints
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub authorize: u32,
    /// Counted per authorization code, so one client's polling never
    /// spends another client's budget
    pub token_per_code: u32,
    pub register: u32,
    pub revoke: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            authorize: 30,
            token_per_code: 120,
            register: 20,
            revoke: 30,
        }
    }
}

/// How GET /authorize behaves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizeMode {
    /// Render a CSRF-protected form asking for the backend account
    Form,
    /// Start the backend attempt immediately and redirect
    Direct,
}

impl std::str::FromStr for AuthorizeMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "form" => Ok(Self::Form),
            "direct" => Ok(Self::Direct),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub server: ServerConfig,
    pub polling: PollingConfig,
    pub callback: CallbackConfig,
    pub token: TokenConfig,
    pub backend: BackendConfig,
    pub rate_limit: RateLimitConfig,
    /// Lifetime of a CSRF token
    pub csrf_ttl: Duration,
    /// Absolute lifetime of a Pending session
    pub session_ttl: Duration,
    /// How long terminal sessions are kept before sweeping
    pub session_retention: Duration,
    pub sweep_interval: Duration,
    pub authorize_mode: AuthorizeMode,
    /// Reject /authorize for client_ids that never went through /register
    pub require_registered_clients: bool,
    /// Open the backend page in the local browser
    pub launch_browser: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            polling: PollingConfig::default(),
            callback: CallbackConfig::default(),
            token: TokenConfig::default(),
            backend: BackendConfig::default(),
            rate_limit: RateLimitConfig::default(),
            csrf_ttl: Duration::from_secs(600),
            session_ttl: Duration::from_secs(300),
            session_retention: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(60),
            authorize_mode: AuthorizeMode::Form,
            require_registered_clients: false,
            launch_browser: true,
        }
    }
}

impl BridgeConfig {
    /// Load from process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (keys include the prefix)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };
        let mut config = Self::default();

        let s = &mut config.server;
        env.string("HOST", &mut s.host);
        env.parse("PORT", &mut s.port)?;
        if let Some(url) = env.get("PUBLIC_URL") {
            s.public_base_url = Some(url);
        }
        env.secs("REQUEST_TIMEOUT_SECS", &mut s.request_timeout)?;
        env.secs("SHUTDOWN_GRACE_SECS", &mut s.shutdown_grace)?;
        env.flag("ENABLE_CORS", &mut s.enable_cors)?;

        let p = &mut config.polling;
        env.millis("POLL_INTERVAL_MS", &mut p.interval)?;
        env.secs("POLL_TIMEOUT_SECS", &mut p.timeout)?;
        env.secs("POLL_REQUEST_TIMEOUT_SECS", &mut p.request_timeout)?;

        let c = &mut config.callback;
        env.flag("CALLBACK_ENABLED", &mut c.enabled)?;
        env.string("CALLBACK_HOST", &mut c.host);
        env.parse("CALLBACK_PORT", &mut c.port)?;
        env.secs("CALLBACK_READ_TIMEOUT_SECS", &mut c.read_timeout)?;
        env.secs("CALLBACK_WRITE_TIMEOUT_SECS", &mut c.write_timeout)?;
        env.secs("CALLBACK_IDLE_TIMEOUT_SECS", &mut c.idle_timeout)?;
        env.secs("CALLBACK_SHUTDOWN_GRACE_SECS", &mut c.shutdown_grace)?;

        // 0 disables token expiry
        let mut token_ttl = config.token.ttl.unwrap_or(Duration::ZERO);
        env.secs("TOKEN_TTL_SECS", &mut token_ttl)?;
        config.token.ttl = (!token_ttl.is_zero()).then_some(token_ttl);
        env.string("TOKEN_SCOPE", &mut config.token.default_scope);

        let b = &mut config.backend;
        env.string("BACKEND_URL", &mut b.base_url);
        env.string("BACKEND_START_PATH", &mut b.start_path);
        env.string("BACKEND_STATUS_PATH", &mut b.status_path);
        env.secs("BACKEND_TIMEOUT_SECS", &mut b.timeout)?;

        let r = &mut config.rate_limit;
        env.secs("RATE_WINDOW_SECS", &mut r.window)?;
        env.parse("RATE_AUTHORIZE", &mut r.authorize)?;
        env.parse("RATE_TOKEN_PER_CODE", &mut r.token_per_code)?;
        env.parse("RATE_REGISTER", &mut r.register)?;
        env.parse("RATE_REVOKE", &mut r.revoke)?;

        env.secs("CSRF_TTL_SECS", &mut config.csrf_ttl)?;
        env.secs("SESSION_TTL_SECS", &mut config.session_ttl)?;
        env.secs("SESSION_RETENTION_SECS", &mut config.session_retention)?;
        env.secs("SWEEP_INTERVAL_SECS", &mut config.sweep_interval)?;
        if let Some(mode) = env.get("AUTHORIZE_MODE") {
            config.authorize_mode = mode.parse().map_err(|_| ConfigError::Invalid {
                key: format!("{ENV_PREFIX}AUTHORIZE_MODE"),
                value: mode,
            })?;
        }
        env.flag(
            "REQUIRE_REGISTERED_CLIENTS",
            &mut config.require_registered_clients,
        )?;
        env.flag("LAUNCH_BROWSER", &mut config.launch_browser)?;

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the adapter cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let nonzero = [
            ("poll interval", self.polling.interval),
            ("poll timeout", self.polling.timeout),
            ("poll request timeout", self.polling.request_timeout),
            ("CSRF TTL", self.csrf_ttl),
            ("session TTL", self.session_ttl),
            ("sweep interval", self.sweep_interval),
            ("rate limit window", self.rate_limit.window),
            ("callback read timeout", self.callback.read_timeout),
            ("callback write timeout", self.callback.write_timeout),
            ("callback idle timeout", self.callback.idle_timeout),
        ];
        if let Some((name, _)) = nonzero.iter().find(|(_, d)| d.is_zero()) {
            return Err(ConfigError::Inconsistent(format!("{name} must be non-zero")));
        }
        if self.polling.interval >= self.polling.timeout {
            return Err(ConfigError::Inconsistent(
                "poll interval must be shorter than poll timeout".to_string(),
            ));
        }
        for (name, raw) in [
            ("public base URL", self.server.base_url()),
            ("backend URL", self.backend.base_url.clone()),
        ] {
            let parsed = url::Url::parse(&raw)
                .map_err(|e| ConfigError::Inconsistent(format!("{name} {raw:?}: {e}")))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ConfigError::Inconsistent(format!(
                    "{name} must be http(s): {raw}"
                )));
            }
        }
        Ok(())
    }
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn key(name: &str) -> String {
        format!("{ENV_PREFIX}{name}")
    }

    fn get(&self, name: &str) -> Option<String> {
        (self.lookup)(&Self::key(name))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn string(&self, name: &str, target: &mut String) {
        if let Some(value) = self.get(name) {
            *target = value;
        }
    }

    fn parse<T: std::str::FromStr>(&self, name: &str, target: &mut T) -> Result<(), ConfigError> {
        if let Some(value) = self.get(name) {
            *target = value.parse().map_err(|_| ConfigError::Invalid {
                key: Self::key(name),
                value,
            })?;
        }
        Ok(())
    }

    fn secs(&self, name: &str, target: &mut Duration) -> Result<(), ConfigError> {
        if self.get(name).is_some() {
            let mut secs: u64 = 0;
            self.parse(name, &mut secs)?;
            *target = Duration::from_secs(secs);
        }
        Ok(())
    }

    fn millis(&self, name: &str, target: &mut Duration) -> Result<(), ConfigError> {
        if self.get(name).is_some() {
            let mut ms: u64 = 0;
            self.parse(name, &mut ms)?;
            *target = Duration::from_millis(ms);
        }
        Ok(())
    }

    fn flag(&self, name: &str, target: &mut bool) -> Result<(), ConfigError> {
        if let Some(value) = self.get(name) {
            *target = match value.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: Self::key(name),
                        value,
                    })
                }
            };
        }
        Ok(())
    }
}
