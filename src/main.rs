use std::{process, sync::Arc, time::Duration};

use gatehouse::{
    application::{
        error::AppError,
        evaluation::{RolloutOptions, RolloutService},
    },
    cache::MemoryStore,
    config::{self, IdentityArgs, Settings},
    domain::{IdentityAttributes, IdentityInput, UserId},
    infra::{
        backends,
        error::InfraError,
        http::{self, HttpState},
        telemetry,
    },
};
use serde_json::{Map, Value};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Gate(args) => {
            let rollout = start_rollout(&settings).await?;
            let result = rollout
                .check_gate(&args.name, identity_from_args(&args.identity))
                .await
                .map(Value::Bool);
            finish_one_shot(&rollout, result).await
        }
        config::Command::Config(args) => {
            let rollout = start_rollout(&settings).await?;
            let result = rollout
                .get_config(
                    &args.name,
                    identity_from_args(&args.identity),
                    args.key.as_deref(),
                )
                .await
                .map(|value| value.unwrap_or(Value::Null));
            finish_one_shot(&rollout, result).await
        }
        config::Command::Params(args) => {
            let rollout = start_rollout(&settings).await?;
            let result = rollout
                .get_parameter_store(
                    &args.name,
                    identity_from_args(&args.identity),
                    args.key.as_deref(),
                )
                .await
                .map(|value| value.unwrap_or(Value::Null));
            finish_one_shot(&rollout, result).await
        }
    }
}

async fn start_rollout(settings: &Settings) -> Result<Arc<RolloutService>, AppError> {
    let backend = backends::build_backend(&settings.rollout).await?;
    let options = RolloutOptions::new(settings.rollout.server_secret.clone())
        .with_environment(settings.rollout.environment.clone());

    let mut rollout = RolloutService::new(options, backend);
    if settings.cache.enabled {
        rollout = rollout.with_cache(Arc::new(MemoryStore::new()));
    }

    let rollout = Arc::new(rollout);
    rollout.initialize().await?;
    Ok(rollout)
}

async fn finish_one_shot(
    rollout: &RolloutService,
    result: Result<Value, gatehouse::application::EvaluationError>,
) -> Result<(), AppError> {
    let outcome = result.map_err(AppError::from).and_then(|value| {
        serde_json::to_string_pretty(&value)
            .map_err(|err| AppError::unexpected(format!("failed to encode result: {err}")))
    });
    rollout.shutdown().await?;

    println!("{}", outcome?);
    Ok(())
}

fn identity_from_args(args: &IdentityArgs) -> Option<IdentityInput> {
    if args.user_id.is_none() && args.country.is_none() && args.plan.is_none() {
        return None;
    }

    let custom = args.plan.as_ref().map(|plan| {
        let mut custom = Map::new();
        custom.insert("plan".to_string(), Value::String(plan.clone()));
        custom
    });

    Some(IdentityInput::from(IdentityAttributes {
        user_id: args.user_id.clone().map(UserId::from),
        country: args.country.clone(),
        custom,
        ..IdentityAttributes::default()
    }))
}

async fn run_serve(settings: Settings) -> Result<(), AppError> {
    let rollout = start_rollout(&settings).await?;
    let router = http::build_router(HttpState::new(rollout.clone()));

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(addr = %settings.server.addr, "gatehouse listening");

    let served = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal(settings.server.graceful_shutdown))
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")));

    rollout.shutdown().await?;
    served
}

async fn shutdown_signal(grace: Duration) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!(
        grace_seconds = grace.as_secs(),
        "shutdown requested; draining connections"
    );

    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        warn!("graceful shutdown timed out; exiting");
        process::exit(1);
    });
}
