//! HTTP client for the vulnerable-symbol resolution API.
//!
//! One POST per scan: the direct-package PURLs go up, the per-purl
//! vulnerable symbols come back. Authentication comes from the environment
//! (JWT preferred, API/application key pair otherwise), with `DD_`-prefixed
//! variables taking precedence over `DATADOG_`-prefixed ones.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::models::reachability::Symbol;

const RESOLVE_SYMBOLS_PATH: &str = "api/v2/static-analysis-sca/vulnerabilities/resolve-vulnerable-symbols";

const HEADER_JWT_TOKEN: &str = "dd-auth-jwt";
const HEADER_API_KEY: &str = "dd-api-key";
const HEADER_APP_KEY: &str = "dd-application-key";

const DEFAULT_HOSTNAME: &str = "api.datadoghq.com";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const TIMEOUT_ENV_VAR: &str = "SBOM_CHECKR_HTTP_TIMEOUT_SECS";

#[derive(Debug, Serialize)]
struct ResolveVulnerableSymbolsRequest {
    id: String,
    purls: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResolveVulnerableSymbolsResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub results: Vec<SymbolsForPurl>,
}

#[derive(Debug, Deserialize)]
pub struct SymbolsForPurl {
    pub purl: String,
    #[serde(default)]
    pub vulnerable_symbols: Vec<SymbolDetails>,
}

#[derive(Debug, Deserialize)]
pub struct SymbolDetails {
    pub advisory_id: String,
    #[serde(default)]
    pub symbols: Vec<Symbol>,
}

/// Resolve the vulnerable symbols for a set of PURLs. A non-200 response or
/// an undecodable body is a hard error for this call; the caller decides how
/// to degrade.
pub async fn post_resolve_vulnerable_symbols(
    purls: &[String],
    base_url_override: Option<&str>,
    jwt_override: Option<&str>,
) -> Result<ResolveVulnerableSymbolsResponse> {
    let env = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
    let base_url = resolve_base_url(&env, base_url_override);
    let auth_headers = resolve_auth_headers(&env, jwt_override)?;

    let timeout = env(TIMEOUT_ENV_VAR)
        .and_then(|value| value.parse().ok())
        .unwrap_or(DEFAULT_TIMEOUT_SECS);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout))
        .build()?;

    let mut request = client
        .post(format!("{base_url}/{RESOLVE_SYMBOLS_PATH}"))
        .header("Content-Type", "application/json")
        .json(&ResolveVulnerableSymbolsRequest {
            id: "resolve-vulnerable-symbols-request".to_string(),
            purls: purls.to_vec(),
        });
    for (key, value) in auth_headers {
        request = request.header(key, value);
    }

    let response = request
        .send()
        .await
        .context("resolve-vulnerable-symbols request failed")?;

    if !response.status().is_success() {
        bail!(
            "failed to retrieve vulnerable symbols: {}",
            response.status()
        );
    }

    response
        .json()
        .await
        .context("failed to decode resolve-vulnerable-symbols response")
}

/// Look a Datadog environment variable up under its `DD_` then `DATADOG_`
/// prefix, in that order.
fn scoped_env_value(env: &dyn Fn(&str) -> Option<String>, variable: &str) -> Option<String> {
    ["DD", "DATADOG"]
        .iter()
        .find_map(|prefix| env(&format!("{prefix}_{variable}")))
}

/// Base URL precedence: explicit override, `HOSTNAME` variable, `SITE`
/// variable, built-in default.
fn resolve_base_url(env: &dyn Fn(&str) -> Option<String>, base_url_override: Option<&str>) -> String {
    if let Some(base_url) = base_url_override {
        return base_url.trim_end_matches('/').to_string();
    }

    if let Some(hostname) = scoped_env_value(env, "HOSTNAME") {
        return format!("https://{hostname}");
    }

    if let Some(site) = scoped_env_value(env, "SITE") {
        return format!("https://api.{site}");
    }

    format!("https://{DEFAULT_HOSTNAME}")
}

/// A JWT wins outright; otherwise both the API key and the application key
/// must be present.
fn resolve_auth_headers(
    env: &dyn Fn(&str) -> Option<String>,
    jwt_override: Option<&str>,
) -> Result<Vec<(String, String)>> {
    let jwt = jwt_override
        .map(str::to_string)
        .or_else(|| scoped_env_value(env, "JWT_TOKEN"));
    if let Some(jwt) = jwt {
        return Ok(vec![(HEADER_JWT_TOKEN.to_string(), jwt)]);
    }

    let api_key = scoped_env_value(env, "API_KEY");
    let app_key = scoped_env_value(env, "APP_KEY");

    match (api_key, app_key) {
        (Some(api_key), Some(app_key)) => Ok(vec![
            (HEADER_API_KEY.to_string(), api_key),
            (HEADER_APP_KEY.to_string(), app_key),
        ]),
        (api_key, app_key) => {
            let mut missing = Vec::new();
            if api_key.is_none() {
                missing.push("API_KEY");
            }
            if app_key.is_none() {
                missing.push("APP_KEY");
            }
            bail!("missing required authentication environment variables: {missing:?}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_dd_prefix_wins_over_datadog_prefix() {
        let env = env_from(&[("DD_API_KEY", "from-dd"), ("DATADOG_API_KEY", "from-datadog")]);
        assert_eq!(scoped_env_value(&env, "API_KEY"), Some("from-dd".to_string()));

        let env = env_from(&[("DATADOG_API_KEY", "from-datadog")]);
        assert_eq!(scoped_env_value(&env, "API_KEY"), Some("from-datadog".to_string()));
    }

    #[test]
    fn test_jwt_suppresses_key_pair() {
        let env = env_from(&[
            ("DD_JWT_TOKEN", "jwt-value"),
            ("DD_API_KEY", "api"),
            ("DD_APP_KEY", "app"),
        ]);

        let headers = resolve_auth_headers(&env, None).unwrap();
        assert_eq!(headers, vec![(HEADER_JWT_TOKEN.to_string(), "jwt-value".to_string())]);
    }

    #[test]
    fn test_key_pair_headers() {
        let env = env_from(&[("DD_API_KEY", "api"), ("DATADOG_APP_KEY", "app")]);

        let headers = resolve_auth_headers(&env, None).unwrap();
        assert_eq!(
            headers,
            vec![
                (HEADER_API_KEY.to_string(), "api".to_string()),
                (HEADER_APP_KEY.to_string(), "app".to_string()),
            ]
        );
    }

    #[test]
    fn test_missing_keys_error_names_them() {
        let env = env_from(&[("DD_API_KEY", "api")]);
        let err = resolve_auth_headers(&env, None).unwrap_err();
        assert!(err.to_string().contains("APP_KEY"));
        assert!(!err.to_string().contains("API_KEY\", \""));
    }

    #[test]
    fn test_explicit_jwt_override_wins() {
        let env = env_from(&[("DD_JWT_TOKEN", "from-env")]);
        let headers = resolve_auth_headers(&env, Some("from-flag")).unwrap();
        assert_eq!(headers[0].1, "from-flag");
    }

    #[test]
    fn test_base_url_precedence() {
        let empty = env_from(&[]);
        assert_eq!(resolve_base_url(&empty, None), "https://api.datadoghq.com");

        let site = env_from(&[("DD_SITE", "datadoghq.eu")]);
        assert_eq!(resolve_base_url(&site, None), "https://api.datadoghq.eu");

        let hostname = env_from(&[("DD_HOSTNAME", "custom.example.com"), ("DD_SITE", "ignored")]);
        assert_eq!(resolve_base_url(&hostname, None), "https://custom.example.com");

        assert_eq!(
            resolve_base_url(&hostname, Some("https://override.example.com/")),
            "https://override.example.com"
        );
    }
}
