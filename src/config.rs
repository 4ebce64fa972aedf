//! Connection settings for a Horizon server, with builder pattern

use std::fmt;
use std::time::Duration;

/// Environment variables the CLI falls back to for each setting
pub const ENV_HOST: &str = "HORIZON_HOST";
pub const ENV_USERNAME: &str = "HORIZON_USERNAME";
pub const ENV_PASSWORD: &str = "HORIZON_PASSWORD";
pub const ENV_DOMAIN: &str = "HORIZON_DOMAIN";

#[derive(Clone)]
pub struct ProviderConfig {
    /// Hostname of the connection server, or a full `http(s)://` base URL
    pub host: String,
    pub username: String,
    pub password: String,
    /// AD domain the user logs in to
    pub domain: String,
    /// Verify the server's TLS certificate
    pub ssl_verify: bool,
    /// Upper bound for each remote call
    pub call_timeout: Option<Duration>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            username: String::new(),
            password: String::new(),
            domain: String::new(),
            ssl_verify: true,
            call_timeout: Some(Duration::from_secs(60)),
        }
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("domain", &self.domain)
            .field("ssl_verify", &self.ssl_verify)
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}

impl ProviderConfig {
    pub fn builder() -> ProviderConfigBuilder {
        ProviderConfigBuilder::default()
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.host.is_empty() {
            return Err(crate::Error::Config("host cannot be empty".into()));
        }
        if self.username.is_empty() {
            return Err(crate::Error::Config("username cannot be empty".into()));
        }
        if self.password.is_empty() {
            return Err(crate::Error::Config("password cannot be empty".into()));
        }
        if self.domain.is_empty() {
            return Err(crate::Error::Config("domain cannot be empty".into()));
        }
        if self.call_timeout.is_some_and(|t| t.is_zero()) {
            return Err(crate::Error::Config("call timeout must be positive".into()));
        }
        Ok(())
    }

    /// `https://{host}` unless the host already names a scheme
    pub fn base_url(&self) -> String {
        let host = self.host.trim_end_matches('/');
        if host.starts_with("https://") || host.starts_with("http://") {
            host.to_string()
        } else {
            format!("https://{host}")
        }
    }
}

#[derive(Default)]
pub struct ProviderConfigBuilder {
    config: ProviderConfig,
}

impl ProviderConfigBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.config.username = username.into();
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = password.into();
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.config.domain = domain.into();
        self
    }

    pub fn ssl_verify(mut self, verify: bool) -> Self {
        self.config.ssl_verify = verify;
        self
    }

    pub fn call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.call_timeout = timeout;
        self
    }

    pub fn build(self) -> ProviderConfig {
        self.config
    }

    pub fn build_validated(self) -> crate::Result<ProviderConfig> {
        let config = self.build();
        config.validate()?;
        Ok(config)
    }
}
