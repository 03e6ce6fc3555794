//! Runtime configuration and the non-local-benchmark safety gate (spec 4.8).

use std::collections::HashSet;
use std::env;

use url::Url;

use crate::errors::{HalliganError, Result};

/// Hosts considered local for the purposes of the benchmark-URL safety gate.
fn default_allowed_benchmark_hosts() -> HashSet<&'static str> {
    ["localhost", "127.0.0.1", "0.0.0.0", "host.docker.internal"]
        .into_iter()
        .collect()
}

const TRUTHY: &[&str] = &["1", "true", "True", "yes", "YES"];

/// Environment-sourced configuration for the browser/benchmark/model
/// endpoints the executor dials out to (spec 4.8).
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Base URL of the browser automation endpoint.
    pub browser_url: Option<String>,
    /// Base URL of the benchmark HTTP harness.
    pub benchmark_http_url: Option<String>,
    /// API key/token for the model provider.
    pub openai_api_key: Option<String>,
    /// Whether a non-local `benchmark_http_url` has been explicitly
    /// permitted via an override environment variable.
    pub allow_nonlocal_benchmark: bool,
}

impl RuntimeConfig {
    /// Build a [`RuntimeConfig`] from the process environment (spec 4.8).
    ///
    /// `HALLIGAN_ALLOW_NONLOCAL_BENCHMARK` is consulted before the legacy
    /// `ALLOW_NONLOCAL_BENCHMARK` name; `BENCHMARK_HTTP_URL` falls back to
    /// `BENCHMARK_URL` when unset.
    pub fn from_env() -> Self {
        let allow_nonlocal_benchmark = env::var("HALLIGAN_ALLOW_NONLOCAL_BENCHMARK")
            .ok()
            .or_else(|| env::var("ALLOW_NONLOCAL_BENCHMARK").ok())
            .is_some_and(|v| TRUTHY.contains(&v.as_str()));

        let benchmark_http_url = env::var("BENCHMARK_HTTP_URL")
            .ok()
            .or_else(|| env::var("BENCHMARK_URL").ok());

        Self {
            browser_url: env::var("BROWSER_URL").ok(),
            benchmark_http_url,
            openai_api_key: env::var("OPENAI_API_KEY").ok(),
            allow_nonlocal_benchmark,
        }
    }

    /// Enforce the non-local-benchmark safety gate (spec 4.8): a
    /// `benchmark_http_url` must be `http`/`https` and resolve to a
    /// recognized local host unless `allow_nonlocal_benchmark` is set.
    ///
    /// # Errors
    /// Returns [`HalliganError::UnsafeTarget`] if a configured benchmark URL
    /// is non-local and the override is not set.
    pub fn validate(&self) -> Result<()> {
        let Some(raw) = &self.benchmark_http_url else {
            return Ok(());
        };
        if self.allow_nonlocal_benchmark {
            return Ok(());
        }
        if !is_local_http_url(raw) {
            return Err(HalliganError::UnsafeTarget(format!(
                "benchmark_http_url '{raw}' does not resolve to a recognized local host; \
                 set HALLIGAN_ALLOW_NONLOCAL_BENCHMARK=1 to override"
            )));
        }
        Ok(())
    }

    /// Require `browser_url`, `benchmark_http_url`, and `openai_api_key` to
    /// all be present, in that error-message order (spec 4.8).
    ///
    /// # Errors
    /// Returns [`HalliganError::Config`] naming every missing variable.
    pub fn require(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.browser_url.is_none() {
            missing.push("BROWSER_URL");
        }
        if self.benchmark_http_url.is_none() {
            missing.push("BENCHMARK_HTTP_URL");
        }
        if self.openai_api_key.is_none() {
            missing.push("OPENAI_API_KEY");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(HalliganError::Config(missing.join(", ")))
        }
    }
}

/// Whether `raw` parses as an `http(s)` URL whose host is in the local
/// allowlist (spec 4.8).
fn is_local_http_url(raw: &str) -> bool {
    let Ok(url) = Url::parse(raw) else {
        return false;
    };
    if url.scheme() != "http" && url.scheme() != "https" {
        return false;
    }
    let allowed = default_allowed_benchmark_hosts();
    matches!(url.host_str(), Some(host) if allowed.contains(host))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(benchmark: Option<&str>, allow_override: bool) -> RuntimeConfig {
        RuntimeConfig {
            browser_url: Some("http://localhost:9000".to_owned()),
            benchmark_http_url: benchmark.map(str::to_owned),
            openai_api_key: Some("sk-test".to_owned()),
            allow_nonlocal_benchmark: allow_override,
        }
    }

    #[test]
    fn validate_accepts_no_benchmark_url() {
        let config = RuntimeConfig {
            browser_url: None,
            benchmark_http_url: None,
            openai_api_key: None,
            allow_nonlocal_benchmark: false,
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_accepts_local_hosts() {
        for host in ["localhost", "127.0.0.1", "0.0.0.0", "host.docker.internal"] {
            let config = config_with(Some(&format!("http://{host}:8080/run")), false);
            assert!(config.validate().is_ok(), "{host} should be accepted");
        }
    }

    #[test]
    fn validate_rejects_nonlocal_host_without_override() {
        let config = config_with(Some("http://evil.example.com/run"), false);
        let err = config.validate().expect_err("should reject");
        assert!(matches!(err, HalliganError::UnsafeTarget(_)));
    }

    #[test]
    fn validate_accepts_nonlocal_host_with_override() {
        let config = config_with(Some("http://evil.example.com/run"), true);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_non_http_scheme() {
        let config = config_with(Some("ftp://localhost/run"), false);
        assert!(config.validate().is_err());
    }

    #[test]
    fn require_lists_all_missing_variables() {
        let config = RuntimeConfig {
            browser_url: None,
            benchmark_http_url: None,
            openai_api_key: Some("sk-test".to_owned()),
            allow_nonlocal_benchmark: false,
        };
        let err = config.require().expect_err("should be missing two vars");
        match err {
            HalliganError::Config(missing) => {
                assert_eq!(missing, "BROWSER_URL, BENCHMARK_HTTP_URL");
            }
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn require_passes_when_all_present() {
        let config = config_with(Some("http://localhost/run"), false);
        assert!(config.require().is_ok());
    }
}
