//! Evaluation backend implementations.

mod http;
mod local;

use std::sync::Arc;

use tracing::info;

pub use http::{API_KEY_HEADER, HttpBackend};
pub use local::{LocalBackend, LocalDocument, SNAPSHOT_KEY};

use crate::application::backend::EvaluationBackend;
use crate::config::{BackendSettings, RolloutSettings};

use super::error::InfraError;

/// Construct the backend selected by the rollout settings.
pub async fn build_backend(
    settings: &RolloutSettings,
) -> Result<Arc<dyn EvaluationBackend>, InfraError> {
    match &settings.backend {
        BackendSettings::Local { overrides_file } => {
            let backend = match overrides_file {
                Some(path) => {
                    info!(path = %path.display(), "loading local overrides");
                    LocalBackend::from_path(path).await?
                }
                None => LocalBackend::new(LocalDocument::default()),
            };
            Ok(Arc::new(backend))
        }
        BackendSettings::Http {
            api_base_url,
            request_timeout,
        } => {
            info!(base_url = %api_base_url, "using remote evaluation service");
            Ok(Arc::new(HttpBackend::new(
                api_base_url.clone(),
                *request_timeout,
            )))
        }
    }
}
