use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use gatehouse_api_types::{EvaluationQuery, GateResponse, HealthResponse, HealthStatus};
use serde_json::{Map, Value};

use crate::domain::{IdentityAttributes, IdentityInput, UserId};

use super::{error::ApiError, state::HttpState};

const GUEST_USER_ID: &str = "guest";
const DEFAULT_COUNTRY: &str = "US";
const DEFAULT_PLAN: &str = "free";

/// Derive the caller identity from query parameters, filling route defaults.
pub fn identity_from_query(query: &EvaluationQuery) -> IdentityInput {
    let user_id = non_empty(query.user_id.as_deref()).unwrap_or(GUEST_USER_ID);
    let country = non_empty(query.country.as_deref()).unwrap_or(DEFAULT_COUNTRY);
    let plan = non_empty(query.plan.as_deref()).unwrap_or(DEFAULT_PLAN);

    let mut custom = Map::new();
    custom.insert("plan".to_string(), Value::String(plan.to_string()));

    IdentityInput::from(IdentityAttributes {
        user_id: Some(UserId::from(user_id)),
        country: Some(country.to_string()),
        custom: Some(custom),
        ..IdentityAttributes::default()
    })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.is_empty())
}

pub async fn check_gate(
    State(state): State<HttpState>,
    Path(name): Path<String>,
    Query(query): Query<EvaluationQuery>,
) -> Result<Json<GateResponse>, ApiError> {
    let enabled = state
        .rollout
        .check_gate(&name, Some(identity_from_query(&query)))
        .await?;
    Ok(Json(GateResponse { enabled }))
}

pub async fn get_config(
    State(state): State<HttpState>,
    Path(name): Path<String>,
    Query(query): Query<EvaluationQuery>,
) -> Result<Json<Value>, ApiError> {
    let value = state
        .rollout
        .get_config(
            &name,
            Some(identity_from_query(&query)),
            non_empty(query.key.as_deref()),
        )
        .await?;
    Ok(Json(value.unwrap_or(Value::Null)))
}

pub async fn get_params(
    State(state): State<HttpState>,
    Path(name): Path<String>,
    Query(query): Query<EvaluationQuery>,
) -> Result<Json<Value>, ApiError> {
    let value = state
        .rollout
        .get_parameter_store(
            &name,
            Some(identity_from_query(&query)),
            non_empty(query.key.as_deref()),
        )
        .await?;
    Ok(Json(value.unwrap_or(Value::Null)))
}

pub async fn health(State(state): State<HttpState>) -> impl IntoResponse {
    if state.rollout.is_ready() {
        (
            StatusCode::OK,
            Json(HealthResponse {
                status: HealthStatus::Ok,
            }),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: HealthStatus::Starting,
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::build;
    use serde_json::json;

    #[test]
    fn missing_query_fields_use_route_defaults() {
        let identity = build(identity_from_query(&EvaluationQuery::default())).expect("identity");
        let backend = identity.to_backend_identity();

        assert_eq!(backend.user_id.as_deref(), Some("guest"));
        assert_eq!(backend.country.as_deref(), Some("US"));
        assert_eq!(
            backend.custom.as_ref().and_then(|custom| custom.get("plan")),
            Some(&json!("free"))
        );
    }

    #[test]
    fn empty_user_id_falls_back_to_guest() {
        let query = EvaluationQuery {
            user_id: Some(String::new()),
            plan: Some("pro".into()),
            ..EvaluationQuery::default()
        };
        let identity = build(identity_from_query(&query)).expect("identity");
        let backend = identity.to_backend_identity();

        assert_eq!(backend.user_id.as_deref(), Some("guest"));
        assert_eq!(
            backend.custom.as_ref().and_then(|custom| custom.get("plan")),
            Some(&json!("pro"))
        );
    }
}
