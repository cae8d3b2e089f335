//! The Splunk-compatible HTTP transport (spec §4.2, §6).
//!
//! One `reqwest::Client` per configured instance, built once and reused for
//! every dispatch, poll, and inventory call — the way `omgpointless-aspy`'s
//! proxy server builds its outbound client once in `start_proxy` rather than
//! per request.

use crate::config::InstanceConfig;
use crate::error::{DispatchError, PollError, RegistryError};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Build the shared client for one instance: explicit per-request timeout,
/// TLS verification mirrored from `verify_ssl_certificate`.
pub fn build_client(
    request_timeout_seconds: u64,
    verify_ssl_certificate: bool,
) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(request_timeout_seconds))
        .danger_accept_invalid_certs(!verify_ssl_certificate)
        .build()
        .map_err(Into::into)
}

/// POST form-urlencoded `payload` to `url` with HTTP basic auth. Any
/// non-2xx response is a transport-level failure.
pub async fn do_post(
    client: &reqwest::Client,
    url: &str,
    username: &str,
    password: &str,
    payload: &HashMap<String, String>,
) -> anyhow::Result<Value> {
    let response = client
        .post(url)
        .basic_auth(username, Some(password))
        .form(payload)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("POST {url} returned {status}: {body}");
    }
    response.json::<Value>().await.map_err(Into::into)
}

/// GET one page of results for a dispatched search, retrying while the
/// server answers HTTP 204 (not yet materialized) up to
/// `search_max_retry_count` times, sleeping `search_seconds_between_retries`
/// between attempts.
pub async fn search_chunk(
    client: &reqwest::Client,
    instance: &InstanceConfig,
    search: &str,
    sid: &str,
    offset: u64,
    count: u64,
    search_max_retry_count: u32,
    search_seconds_between_retries: u64,
) -> Result<Value, PollError> {
    let url = format!(
        "{}/services/search/jobs/{}/results?output_mode=json&offset={}&count={}",
        instance.url.trim_end_matches('/'),
        sid,
        offset,
        count
    );

    for attempt in 0..=search_max_retry_count {
        let response = client
            .get(&url)
            .basic_auth(&instance.username, Some(&instance.password))
            .send()
            .await
            .map_err(|e| PollError::Transport {
                search: search.to_string(),
                sid: sid.to_string(),
                source: e.into(),
            })?;

        if response.status() == reqwest::StatusCode::NO_CONTENT {
            if attempt < search_max_retry_count {
                tracing::debug!(search, sid, attempt, "results not ready, retrying");
                tokio::time::sleep(Duration::from_secs(search_seconds_between_retries)).await;
                continue;
            }
            return Err(PollError::ResultsNotReady {
                search: search.to_string(),
                sid: sid.to_string(),
                retries: search_max_retry_count,
            });
        }

        if !response.status().is_success() {
            let status = response.status();
            return Err(PollError::Transport {
                search: search.to_string(),
                sid: sid.to_string(),
                source: anyhow::anyhow!("unexpected status {status} polling results"),
            });
        }

        return response.json::<Value>().await.map_err(|e| PollError::Transport {
            search: search.to_string(),
            sid: sid.to_string(),
            source: e.into(),
        });
    }

    unreachable!("loop always returns before exhausting its range")
}

/// Paginate a dispatched search's full result set, one `batch_size`-sized
/// page at a time, stopping on a short page or a FATAL message.
pub async fn saved_search_results(
    client: &reqwest::Client,
    instance: &InstanceConfig,
    search: &str,
    sid: &str,
    batch_size: u64,
    search_max_retry_count: u32,
    search_seconds_between_retries: u64,
) -> Result<Vec<serde_json::Map<String, Value>>, PollError> {
    let mut offset = 0u64;
    let mut pages = Vec::new();

    loop {
        let body = search_chunk(
            client,
            instance,
            search,
            sid,
            offset,
            batch_size,
            search_max_retry_count,
            search_seconds_between_retries,
        )
        .await?;

        if let Some(messages) = body.get("messages").and_then(Value::as_array) {
            for message in messages {
                if message.get("type").and_then(Value::as_str) == Some("FATAL") {
                    let text = message
                        .get("text")
                        .and_then(Value::as_str)
                        .unwrap_or("")
                        .to_string();
                    return Err(PollError::FatalSearch {
                        search: search.to_string(),
                        sid: sid.to_string(),
                        text,
                    });
                }
            }
        }

        let results = body
            .get("results")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let page_len = results.len() as u64;

        for result in results {
            if let Value::Object(map) = result {
                pages.push(map);
            }
        }

        if page_len < batch_size {
            break;
        }
        offset += batch_size;
    }

    Ok(pages)
}

/// Dispatch one saved search, returning its search id (`sid`).
pub async fn dispatch_saved_search(
    client: &reqwest::Client,
    instance: &InstanceConfig,
    search: &str,
    mut parameters: HashMap<String, String>,
    earliest_time: &str,
    latest_time: Option<&str>,
) -> Result<String, DispatchError> {
    let url = format!(
        "{}/services/search/jobs/{}",
        instance.url.trim_end_matches('/'),
        search
    );
    parameters.insert("dispatch.earliest_time".to_string(), earliest_time.to_string());
    if let Some(latest) = latest_time {
        parameters.insert("dispatch.latest_time".to_string(), latest.to_string());
    }

    let body = do_post(client, &url, &instance.username, &instance.password, &parameters)
        .await
        .map_err(|e| DispatchError::Request {
            search: search.to_string(),
            source: e,
        })?;

    body.get("sid")
        .and_then(Value::as_str)
        .map(|s| s.to_string())
        .ok_or_else(|| DispatchError::MissingSid {
            search: search.to_string(),
        })
}

/// Fetch the server's saved-search inventory (names only).
pub async fn fetch_saved_search_inventory(
    client: &reqwest::Client,
    instance: &InstanceConfig,
) -> Result<Vec<String>, RegistryError> {
    let url = format!(
        "{}/services/saved/searches?output_mode=json",
        instance.url.trim_end_matches('/')
    );
    let response = client
        .get(&url)
        .basic_auth(&instance.username, Some(&instance.password))
        .send()
        .await
        .map_err(|e| RegistryError::Inventory {
            url: url.clone(),
            source: e.into(),
        })?;

    let body = response
        .json::<Value>()
        .await
        .map_err(|e| RegistryError::Inventory {
            url: url.clone(),
            source: e.into(),
        })?;

    let names = body
        .get("entry")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| entry.get("name").and_then(Value::as_str))
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default();

    Ok(names)
}
