//! Processor configuration.
//!
//! [`Settings`] is fixed once a [`Processor`](crate::Processor) is built. It can
//! be assembled with [`SettingsBuilder`] or loaded from JSON with
//! [`Settings::from_json`].

use crate::{retry::RetryPolicy, Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Configuration for one processor instance.
///
/// # Examples
///
/// ```
/// use http_processor::Settings;
///
/// let settings = Settings::from_json(
///     r#"{ "baseUrl": "https://api.example.com", "retryCount": 5, "retryDelaySeconds": 2 }"#,
/// )
/// .unwrap();
///
/// assert_eq!(settings.retry_count, 5);
/// assert_eq!(settings.timeout_seconds, 30);
/// assert_eq!(settings.absolute_url("/users"), "https://api.example.com/users");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// The base URL every endpoint is resolved against.
    pub base_url: String,

    /// Deadline for a single attempt, in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Outer attempt budget. Also bounds re-authentication after a 401.
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Pause between attempts, in seconds.
    #[serde(default = "default_retry_delay_seconds")]
    pub retry_delay_seconds: u64,

    /// Accepted and exposed, but does not change how non-2xx responses are handled.
    #[serde(default)]
    pub retry_on_non_success: bool,
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_delay_seconds() -> u64 {
    1
}

impl Settings {
    /// Creates a new builder for the given base URL.
    pub fn builder(base_url: impl Into<String>) -> SettingsBuilder {
        SettingsBuilder::new(base_url)
    }

    /// Parses settings from a JSON document and validates them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the document is malformed or the
    /// settings are invalid.
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(json)
            .map_err(|e| Error::Configuration(format!("Invalid settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Checks the invariants a processor relies on.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the base URL is empty or not an
    /// absolute `http`/`https` URL, or if the timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(Error::Configuration("Base URL is required".to_string()));
        }
        let url = Url::parse(&self.base_url).map_err(|e| {
            Error::Configuration(format!("Invalid base URL {:?}: {}", self.base_url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
            return Err(Error::Configuration(format!(
                "Base URL {:?} must be an http or https URL",
                self.base_url
            )));
        }
        if self.timeout_seconds == 0 {
            return Err(Error::Configuration(
                "Timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// The per-attempt deadline.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// The pause between attempts.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_seconds)
    }

    /// The outer retry policy derived from these settings.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_count, self.retry_delay())
    }

    /// Joins the base URL and `endpoint` with exactly one slash between them.
    ///
    /// Nothing else is normalized: query strings, `..` segments and encoding
    /// are passed through as given.
    pub fn absolute_url(&self, endpoint: &str) -> String {
        let endpoint = endpoint.strip_prefix('/').unwrap_or(endpoint);
        let mut url = String::with_capacity(self.base_url.len() + endpoint.len() + 1);
        url.push_str(&self.base_url);
        if !url.ends_with('/') {
            url.push('/');
        }
        url.push_str(endpoint);
        url
    }
}

/// Builder for [`Settings`].
///
/// # Examples
///
/// ```
/// use http_processor::Settings;
///
/// let settings = Settings::builder("https://api.example.com")
///     .timeout_seconds(10)
///     .retry_count(5)
///     .retry_delay_seconds(0)
///     .build()
///     .unwrap();
///
/// assert_eq!(settings.retry_count, 5);
/// ```
#[derive(Debug, Clone)]
pub struct SettingsBuilder {
    base_url: String,
    timeout_seconds: Option<u64>,
    retry_count: Option<u32>,
    retry_delay_seconds: Option<u64>,
    retry_on_non_success: Option<bool>,
}

impl SettingsBuilder {
    /// Creates a builder with default timeout, retry count and delay.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_seconds: None,
            retry_count: None,
            retry_delay_seconds: None,
            retry_on_non_success: None,
        }
    }

    /// Sets the per-attempt timeout in seconds.
    pub fn timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    /// Sets the retry count.
    pub fn retry_count(mut self, count: u32) -> Self {
        self.retry_count = Some(count);
        self
    }

    /// Sets the delay between attempts in seconds.
    pub fn retry_delay_seconds(mut self, seconds: u64) -> Self {
        self.retry_delay_seconds = Some(seconds);
        self
    }

    /// Sets the `retry_on_non_success` flag.
    pub fn retry_on_non_success(mut self, retry: bool) -> Self {
        self.retry_on_non_success = Some(retry);
        self
    }

    /// Builds and validates the settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the settings are invalid.
    pub fn build(self) -> Result<Settings> {
        let settings = Settings {
            base_url: self.base_url,
            timeout_seconds: self.timeout_seconds.unwrap_or_else(default_timeout_seconds),
            retry_count: self.retry_count.unwrap_or_else(default_retry_count),
            retry_delay_seconds: self
                .retry_delay_seconds
                .unwrap_or_else(default_retry_delay_seconds),
            retry_on_non_success: self.retry_on_non_success.unwrap_or_default(),
        };
        settings.validate()?;
        Ok(settings)
    }
}
