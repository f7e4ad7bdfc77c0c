use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::Url;

use crate::error::{Context, Result};
use crate::query::ChartOptions;

pub fn default_headers(user_agent: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(user_agent).context("Invalid user agent header value")?,
    );
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,image/png,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    Ok(headers)
}

/// Append `params` to `endpoint`, keeping any query the endpoint already carries.
pub fn build_url(endpoint: &str, params: &[(String, String)]) -> Result<Url> {
    let mut url =
        Url::parse(endpoint).with_context(|| format!("Invalid endpoint URL: {}", endpoint))?;
    if !params.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in params {
            pairs.append_pair(key, value);
        }
    }
    Ok(url)
}

pub fn chart_url(endpoint: &str, options: &ChartOptions, ticker: &str) -> Result<String> {
    let mut params: Vec<(String, String)> = options
        .query_pairs()
        .iter()
        .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
        .collect();
    params.push(("t".to_string(), ticker.to_string()));
    Ok(build_url(endpoint, &params)?.to_string())
}

pub fn quote_url(endpoint: &str, ticker: &str) -> Result<String> {
    Ok(build_url(endpoint, &[("t".to_string(), ticker.to_string())])?.to_string())
}
