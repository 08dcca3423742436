//! Orchestration/fleet API client.
//!
//! # Wire Format
//! ```text
//! GET {endpoint}/v1/instances?stack=<stack>&tag=<key>:<value>
//!
//! { "instances": [ { "id": "i-0abc", "private_ip": "10.0.1.10", "state": "running" } ] }
//! ```

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::config::BootstrapConfig;

/// Selects the instance(s) tagged as primary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagFilter {
    pub stack: String,
    pub key: String,
    pub value: String,
}

impl TagFilter {
    pub fn from_config(config: &BootstrapConfig) -> Self {
        Self {
            stack: config.stack.clone(),
            key: config.tag_key.clone(),
            value: config.tag_value.clone(),
        }
    }
}

/// Errors talking to the fleet API.
#[derive(Debug, Error)]
pub enum FleetError {
    #[error("Invalid fleet endpoint: {0}")]
    Endpoint(#[from] url::ParseError),

    #[error("Fleet API request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Fleet API returned status {0}")]
    Status(u16),
}

/// Query surface of the orchestration layer.
#[async_trait]
pub trait FleetApi: Send + Sync {
    /// Private addresses of running instances matching `filter`.
    async fn primary_hosts(&self, filter: &TagFilter) -> Result<Vec<String>, FleetError>;
}

#[derive(Debug, Deserialize)]
struct InstanceList {
    #[serde(default)]
    instances: Vec<Instance>,
}

#[derive(Debug, Deserialize)]
struct Instance {
    id: String,
    #[serde(default)]
    private_ip: Option<String>,
    #[serde(default)]
    state: String,
}

/// HTTP/JSON fleet API client.
#[derive(Debug, Clone)]
pub struct HttpFleetApi {
    client: reqwest::Client,
    instances_url: Url,
}

impl HttpFleetApi {
    pub fn new(config: &BootstrapConfig) -> Result<Self, FleetError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        let instances_url = Url::parse(&config.fleet_endpoint)?.join("v1/instances")?;
        Ok(Self { client, instances_url })
    }
}

#[async_trait]
impl FleetApi for HttpFleetApi {
    async fn primary_hosts(&self, filter: &TagFilter) -> Result<Vec<String>, FleetError> {
        let tag = format!("{}:{}", filter.key, filter.value);
        let response = self
            .client
            .get(self.instances_url.clone())
            .query(&[("stack", filter.stack.as_str()), ("tag", tag.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FleetError::Status(status.as_u16()));
        }

        let list: InstanceList = response.json().await?;
        Ok(running_hosts(list))
    }
}

fn running_hosts(list: InstanceList) -> Vec<String> {
    list.instances
        .into_iter()
        .filter(|i| i.state.eq_ignore_ascii_case("running"))
        .filter_map(|i| match i.private_ip {
            Some(ip) if !ip.is_empty() => Some(ip),
            _ => {
                tracing::debug!(instance = %i.id, "Primary instance has no private address yet");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_running_instances_with_addresses() {
        let list: InstanceList = serde_json::from_str(
            r#"{"instances":[
                {"id":"i-1","private_ip":"10.0.1.10","state":"running"},
                {"id":"i-2","private_ip":"10.0.1.12","state":"stopped"},
                {"id":"i-3","state":"running"},
                {"id":"i-4","private_ip":"","state":"Running"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(running_hosts(list), vec!["10.0.1.10".to_string()]);
    }

    #[test]
    fn endpoint_path_is_joined() {
        let mut config = BootstrapConfig::default();
        config.fleet_endpoint = "http://fleet.internal:8700/".into();
        let api = HttpFleetApi::new(&config).unwrap();
        assert_eq!(api.instances_url.as_str(), "http://fleet.internal:8700/v1/instances");
    }
}
