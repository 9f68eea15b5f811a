//! etcd preset.
//!
//! Talks to etcd through its v3 JSON gateway, so no gRPC stack is needed:
//! keys and values travel base64-encoded in `POST /v3/kv/put` and
//! `POST /v3/kv/range` bodies.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::debug;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::container_management::types::ContainerHandle;
use crate::error_handling::types::{InitError, ProbeError};
use crate::preset_management::context::Context;
use crate::preset_management::options::{health_check, init, PresetOption, StartOption};
use crate::preset_management::preset::Preset;
use crate::preset_management::seeding::{bounded_attempt, seed_values};
use crate::preset_management::settings::{PresetSettings, DEFAULT_VERSION};
use crate::preset_management::types::{NamedPorts, SeedValues};

pub const NAME: &str = "etcd";
const REPOSITORY: &str = "bitnami/etcd";
const CLIENT_PORT: u16 = 2379;
/// Budget of one health-check attempt or one seed write.
const OPERATION_TIMEOUT: Duration = Duration::from_secs(2);
const HEALTH_KEY: &str = "test_key";
const HEALTH_VALUE: &str = "test_value";

/// Builds an etcd preset with `options` applied in order.
pub fn preset(options: Vec<PresetOption>) -> EtcdPreset {
    let mut preset = EtcdPreset::default();
    preset.apply(options);
    preset
}

#[derive(Debug, Clone, Default)]
pub struct EtcdPreset {
    settings: PresetSettings,
}

impl EtcdPreset {
    /// Reads `key` back from the etcd listening on `addr`.
    pub async fn get(addr: &str, key: &str) -> Result<Option<String>, ProbeError> {
        let client = reqwest::Client::new();
        let response = client
            .post(format!("http://{}/v3/kv/range", addr))
            .json(&json!({ "key": STANDARD.encode(key) }))
            .send()
            .await
            .map_err(|e| classify("range", e))?;
        if !response.status().is_success() {
            return Err(ProbeError::Operation {
                op: "range".to_string(),
                detail: format!("status {}", response.status()),
            });
        }

        let body: RangeResponse = response.json().await.map_err(|e| classify("range", e))?;
        let Some(kv) = body.kvs.into_iter().next() else {
            return Ok(None);
        };
        let raw = STANDARD.decode(kv.value).map_err(|e| ProbeError::Operation {
            op: "range".to_string(),
            detail: format!("invalid base64 value: {}", e),
        })?;
        Ok(Some(String::from_utf8_lossy(&raw).into_owned()))
    }
}

impl Preset for EtcdPreset {
    fn name(&self) -> &str {
        NAME
    }

    fn image(&self) -> String {
        self.settings.image(REPOSITORY)
    }

    fn ports(&self) -> NamedPorts {
        NamedPorts::default_tcp(CLIENT_PORT)
    }

    fn options(&mut self) -> Vec<StartOption> {
        self.apply_defaults();

        let mut options = vec![
            StartOption::Env("ALLOW_NONE_AUTHENTICATION".to_string(), "yes".to_string()),
            health_check(healthcheck),
        ];

        if let Some(values) = self.settings.seeds() {
            let values = values.clone();
            options.push(init(move |ctx, container| {
                let values = values.clone();
                async move { load_values(ctx, container, values).await }
            }));
        }

        options
    }

    fn configure(&mut self, option: PresetOption) {
        self.settings.apply(option)
    }

    fn apply_defaults(&mut self) {
        self.settings.apply_defaults(DEFAULT_VERSION)
    }
}

#[derive(Deserialize)]
struct RangeResponse {
    #[serde(default)]
    kvs: Vec<KeyValue>,
}

#[derive(Deserialize)]
struct KeyValue {
    #[serde(default)]
    value: String,
}

fn classify(op: &str, err: reqwest::Error) -> ProbeError {
    if err.is_connect() {
        ProbeError::Connection(err.to_string())
    } else {
        ProbeError::Operation {
            op: op.to_string(),
            detail: err.to_string(),
        }
    }
}

async fn put(
    client: &reqwest::Client,
    addr: &str,
    key: &str,
    value: &str,
) -> Result<(), ProbeError> {
    let response = client
        .post(format!("http://{}/v3/kv/put", addr))
        .json(&json!({
            "key": STANDARD.encode(key),
            "value": STANDARD.encode(value),
        }))
        .send()
        .await
        .map_err(|e| classify("put", e))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(ProbeError::Operation {
            op: "put".to_string(),
            detail: format!("status {}: {}", status, body.trim()),
        });
    }
    Ok(())
}

/// Writes a probe key: etcd accepts connections well before it serves writes.
async fn healthcheck(ctx: Context, container: ContainerHandle) -> Result<(), ProbeError> {
    let addr = container.default_address()?;
    debug!("Probing etcd at {}", addr);
    let client = reqwest::Client::new();
    bounded_attempt(
        &ctx,
        OPERATION_TIMEOUT,
        put(&client, &addr, HEALTH_KEY, HEALTH_VALUE),
    )
    .await
}

async fn load_values(
    ctx: Context,
    container: ContainerHandle,
    values: SeedValues,
) -> Result<(), InitError> {
    let client = reqwest::Client::new();
    seed_values(&ctx, &values, OPERATION_TIMEOUT, |key, value| {
        let client = client.clone();
        let container = container.clone();
        async move {
            let addr = container.default_address()?;
            put(&client, &addr, &key, &value).await
        }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preset_management::options::{with_values, with_version, HealthCheckFn, InitFn};
    use crate::preset_management::types::DEFAULT_PORT;
    use chrono::Utc;
    use httpmock::prelude::*;
    use std::collections::BTreeMap;

    fn handle(host: &str, port: u16) -> ContainerHandle {
        ContainerHandle {
            id: "dockside-etcd-test".to_string(),
            image: "bitnami/etcd:latest".to_string(),
            host: host.to_string(),
            ports: BTreeMap::from([(DEFAULT_PORT.to_string(), port)]),
            created_at: Utc::now(),
        }
    }

    fn put_body(key: &str, value: &str) -> serde_json::Value {
        json!({ "key": STANDARD.encode(key), "value": STANDARD.encode(value) })
    }

    fn seeds(pairs: &[(&str, &str)]) -> SeedValues {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), json!(v)))
            .collect()
    }

    fn health_fn(options: &[StartOption]) -> HealthCheckFn {
        options
            .iter()
            .find_map(|o| match o {
                StartOption::HealthCheck(f) => Some(f.clone()),
                _ => None,
            })
            .expect("health check option")
    }

    fn init_fn(options: &[StartOption]) -> Option<InitFn> {
        options.iter().find_map(|o| match o {
            StartOption::Init(f) => Some(f.clone()),
            _ => None,
        })
    }

    #[test]
    fn image_defaults_to_latest() {
        let mut p = preset(vec![]);
        let options = p.options();
        assert_eq!(p.image(), "bitnami/etcd:latest");
        assert_eq!(p.ports(), NamedPorts::default_tcp(2379));
        assert!(init_fn(&options).is_none());
        assert!(options.iter().any(|o| matches!(
            o,
            StartOption::Env(k, v) if k == "ALLOW_NONE_AUTHENTICATION" && v == "yes"
        )));
    }

    #[test]
    fn pinned_version_and_values_add_init() {
        let mut p = preset(vec![
            with_version("3.4"),
            with_values(seeds(&[("a", "1")])),
            with_version("3.5"),
        ]);
        let options = p.options();
        assert_eq!(p.image(), "bitnami/etcd:3.5");
        assert!(init_fn(&options).is_some());
    }

    #[tokio::test]
    async fn healthcheck_performs_a_real_put() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v3/kv/put")
                    .json_body(put_body(HEALTH_KEY, HEALTH_VALUE));
                then.status(200).json_body(json!({ "header": {} }));
            })
            .await;

        let options = preset(vec![]).options();
        let container = handle(&server.host(), server.port());
        let result = health_fn(&options)(Context::background(), container).await;

        assert!(result.is_ok(), "{:?}", result);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn healthcheck_fails_on_server_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v3/kv/put");
                then.status(503).body("not ready");
            })
            .await;

        let options = preset(vec![]).options();
        let container = handle(&server.host(), server.port());
        let err = health_fn(&options)(Context::background(), container)
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::Operation { ref op, .. } if op == "put"));
    }

    #[tokio::test]
    async fn healthcheck_fails_when_nothing_listens() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let options = preset(vec![]).options();
        let err = health_fn(&options)(Context::background(), handle("127.0.0.1", port))
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::Connection(_)));
    }

    #[tokio::test]
    async fn init_writes_every_seed() {
        let server = MockServer::start_async().await;
        let a = server
            .mock_async(|when, then| {
                when.method(POST).path("/v3/kv/put").json_body(put_body("a", "1"));
                then.status(200).json_body(json!({}));
            })
            .await;
        let b = server
            .mock_async(|when, then| {
                when.method(POST).path("/v3/kv/put").json_body(put_body("b", "2"));
                then.status(200).json_body(json!({}));
            })
            .await;

        let options = preset(vec![with_values(seeds(&[("a", "1"), ("b", "2")]))]).options();
        let container = handle(&server.host(), server.port());
        init_fn(&options).unwrap()(Context::background(), container)
            .await
            .unwrap();

        a.assert_hits_async(1).await;
        b.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn init_stops_at_first_rejected_write() {
        let server = MockServer::start_async().await;
        let a = server
            .mock_async(|when, then| {
                when.method(POST).path("/v3/kv/put").json_body(put_body("a", "1"));
                then.status(200).json_body(json!({}));
            })
            .await;
        let b = server
            .mock_async(|when, then| {
                when.method(POST).path("/v3/kv/put").json_body(put_body("b", "2"));
                then.status(400).body("bad request");
            })
            .await;
        let c = server
            .mock_async(|when, then| {
                when.method(POST).path("/v3/kv/put").json_body(put_body("c", "3"));
                then.status(200).json_body(json!({}));
            })
            .await;

        let options =
            preset(vec![with_values(seeds(&[("a", "1"), ("b", "2"), ("c", "3")]))]).options();
        let container = handle(&server.host(), server.port());
        let err = init_fn(&options).unwrap()(Context::background(), container)
            .await
            .unwrap_err();

        assert_eq!(err.key, "b");
        assert_eq!(err.value, "2");
        a.assert_hits_async(1).await;
        b.assert_hits_async(1).await;
        c.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn get_decodes_range_response() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v3/kv/range")
                    .json_body(json!({ "key": STANDARD.encode("a") }));
                then.status(200).json_body(json!({
                    "kvs": [{ "key": STANDARD.encode("a"), "value": STANDARD.encode("1") }],
                    "count": "1"
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v3/kv/range")
                    .json_body(json!({ "key": STANDARD.encode("missing") }));
                then.status(200).json_body(json!({ "header": {} }));
            })
            .await;

        let addr = server.address().to_string();
        assert_eq!(EtcdPreset::get(&addr, "a").await.unwrap(), Some("1".to_string()));
        assert_eq!(EtcdPreset::get(&addr, "missing").await.unwrap(), None);
    }
}
