//! Thin client for a remote evaluation service.

use std::{sync::RwLock, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use tracing::debug;

use crate::application::backend::{
    BackendError, BackendOptions, DynamicConfig, EnvironmentTier, EvaluationBackend,
    ParameterStore, ResourceKind,
};
use crate::domain::BackendIdentity;
use crate::util::lock::{rw_read, rw_write};

pub const API_KEY_HEADER: &str = "gatehouse-api-key";

const CHECK_GATE_PATH: &str = "v1/check_gate";
const GET_CONFIG_PATH: &str = "v1/get_config";
const GET_PARAMETER_STORE_PATH: &str = "v1/get_parameter_store";
const LOCK_TARGET: &str = "gatehouse::infra::backends::http";

#[derive(Clone)]
struct Session {
    client: Client,
    token: String,
    environment: Option<EnvironmentTier>,
}

pub struct HttpBackend {
    base: Url,
    timeout: Duration,
    session: RwLock<Option<Session>>,
}

/// The named resource a request evaluates, serialized as its request field.
#[derive(Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
enum Target<'a> {
    GateName(&'a str),
    ConfigName(&'a str),
    StoreName(&'a str),
}

#[derive(Serialize)]
struct EvaluationRequest<'a> {
    user: &'a BackendIdentity,
    #[serde(flatten)]
    target: Target<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    environment: Option<&'a EnvironmentTier>,
}

#[derive(Debug, Deserialize)]
struct GateResult {
    value: bool,
}

#[derive(Debug, Deserialize)]
struct ConfigResult {
    name: String,
    #[serde(default)]
    value: Map<String, Value>,
    #[serde(default)]
    rule_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StoreResult {
    name: String,
    #[serde(default)]
    value: Map<String, Value>,
}

impl HttpBackend {
    /// `base` is the service root; endpoint paths are resolved beneath it.
    pub fn new(base: Url, timeout: Duration) -> Self {
        Self {
            base: with_trailing_slash(base),
            timeout,
            session: RwLock::new(None),
        }
    }

    pub fn user_agent() -> &'static str {
        concat!("gatehouse/", env!("CARGO_PKG_VERSION"))
    }

    fn session(&self) -> Result<Session, BackendError> {
        rw_read(&self.session, LOCK_TARGET, "session")
            .clone()
            .ok_or_else(|| BackendError::unavailable("http backend is not initialized"))
    }

    fn url(&self, path: &str) -> Result<Url, BackendError> {
        self.base
            .join(path)
            .map_err(|err| BackendError::unavailable(format!("invalid endpoint `{path}`: {err}")))
    }

    async fn post<T: DeserializeOwned>(
        &self,
        kind: ResourceKind,
        name: &str,
        path: &str,
        target: Target<'_>,
        user: &BackendIdentity,
    ) -> Result<T, BackendError> {
        let session = self.session()?;
        let url = self.url(path)?;
        let body = EvaluationRequest {
            user,
            target,
            environment: session.environment.as_ref(),
        };

        let response = session
            .client
            .post(url)
            .header(API_KEY_HEADER, &session.token)
            .json(&body)
            .send()
            .await
            .map_err(|err| BackendError::unavailable(format!("request to {path} failed: {err}")))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| BackendError::unavailable(format!("reading {path} failed: {err}")))?;
        if !status.is_success() {
            let text = String::from_utf8_lossy(&bytes);
            return Err(BackendError::unavailable(format!(
                "{path} returned status {status} body {text}"
            )));
        }

        debug!(
            kind = kind.as_str(),
            resource = name,
            status = status.as_u16(),
            bytes = bytes.len(),
            "remote evaluation completed"
        );

        serde_json::from_slice(&bytes).map_err(|err| {
            BackendError::evaluation_failed(kind, name, format!("failed to parse body: {err}"))
        })
    }
}

fn with_trailing_slash(mut base: Url) -> Url {
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base
}

#[async_trait]
impl EvaluationBackend for HttpBackend {
    async fn initialize(&self, options: BackendOptions) -> Result<(), BackendError> {
        if options.token.trim().is_empty() {
            return Err(BackendError::unavailable("a non-empty server secret is required"));
        }

        let client = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(self.timeout)
            .build()
            .map_err(|err| BackendError::unavailable(format!("failed to build client: {err}")))?;

        *rw_write(&self.session, LOCK_TARGET, "initialize") = Some(Session {
            client,
            token: options.token,
            environment: options.environment,
        });
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), BackendError> {
        rw_write(&self.session, LOCK_TARGET, "shutdown").take();
        Ok(())
    }

    async fn check_gate(
        &self,
        identity: &BackendIdentity,
        gate_name: &str,
    ) -> Result<bool, BackendError> {
        let result: GateResult = self
            .post(
                ResourceKind::Gate,
                gate_name,
                CHECK_GATE_PATH,
                Target::GateName(gate_name),
                identity,
            )
            .await?;
        Ok(result.value)
    }

    async fn get_dynamic_config(
        &self,
        identity: &BackendIdentity,
        config_name: &str,
    ) -> Result<DynamicConfig, BackendError> {
        let result: ConfigResult = self
            .post(
                ResourceKind::DynamicConfig,
                config_name,
                GET_CONFIG_PATH,
                Target::ConfigName(config_name),
                identity,
            )
            .await?;
        Ok(DynamicConfig {
            name: result.name,
            value: result.value,
            rule_id: result.rule_id,
        })
    }

    async fn get_parameter_store(
        &self,
        identity: &BackendIdentity,
        store_name: &str,
    ) -> Result<ParameterStore, BackendError> {
        let result: StoreResult = self
            .post(
                ResourceKind::ParameterStore,
                store_name,
                GET_PARAMETER_STORE_PATH,
                Target::StoreName(store_name),
                identity,
            )
            .await?;
        Ok(ParameterStore::new(result.name, result.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Identity;

    #[test]
    fn base_path_keeps_its_prefix() {
        let backend = HttpBackend::new(
            Url::parse("https://rollout.example.com/api").expect("url"),
            Duration::from_secs(1),
        );
        assert_eq!(
            backend.url(CHECK_GATE_PATH).expect("url").as_str(),
            "https://rollout.example.com/api/v1/check_gate"
        );
    }

    #[tokio::test]
    async fn evaluation_before_initialize_is_unavailable() {
        let backend = HttpBackend::new(
            Url::parse("http://127.0.0.1:9").expect("url"),
            Duration::from_secs(1),
        );
        let err = backend
            .check_gate(&Identity::default().to_backend_identity(), "gate")
            .await
            .expect_err("not initialized");
        assert!(matches!(err, BackendError::Unavailable { .. }));
    }
}
