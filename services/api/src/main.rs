use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use audio_timeline::Waveform;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{routing::{get, post}, Json, Router};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use music_mapping::{map_features, MusicParams};
use poem_features::FeatureRecord;
use poem_pipeline::{Pipeline, PipelineConfig, PipelineError, PlanOutput};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Clone)]
struct AppState {
    config: Arc<PipelineConfig>,
}

#[derive(Debug, Deserialize)]
struct ComposeRequest {
    features: FeatureRecord,
    /// Recitation audio, base64. WAV or anything the decoder can probe.
    recitation_b64: String,
    #[serde(default)]
    seed: Option<u64>,
}

#[derive(Debug, Serialize)]
struct PlanResponse {
    plan: &'static str,
    wav_b64: String,
    midi_b64: String,
    render_degraded: bool,
    mix_degraded: bool,
}

#[derive(Debug, Serialize)]
struct ComposeResponse {
    params: MusicParams,
    plans: Vec<PlanResponse>,
}

#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    Pipeline(PipelineError),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::Pipeline(e @ PipelineError::Config(_)) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            ApiError::Pipeline(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        warn!(status = %status, error = %message, "request failed");
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

fn app(config: PipelineConfig) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/map", post(map))
        .route("/compose", post(compose))
        .with_state(AppState { config: Arc::new(config) })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match std::env::var_os("VERSIFY_CONFIG") {
        Some(path) => PipelineConfig::load(Path::new(&path))?,
        None => PipelineConfig::default(),
    };
    let addr: SocketAddr = std::env::var("VERSIFY_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:8080".into())
        .parse()
        .context("VERSIFY_ADDR is not a socket address")?;

    let listener = tokio::net::TcpListener::bind(addr).await.with_context(|| format!("failed binding {addr}"))?;
    info!("listening on http://{addr}");
    axum::serve(listener, app(config)).await?;
    Ok(())
}

async fn map(Json(features): Json<FeatureRecord>) -> Result<Json<MusicParams>, ApiError> {
    let params = map_features(&features);
    params.validate().map_err(|e| ApiError::Pipeline(e.into()))?;
    Ok(Json(params))
}

async fn compose(State(state): State<AppState>, Json(req): Json<ComposeRequest>) -> Result<Json<ComposeResponse>, ApiError> {
    tokio::task::spawn_blocking(move || compose_blocking(&state.config, req))
        .await
        .map_err(|e| ApiError::Internal(format!("compose task failed: {e}")))?
        .map(Json)
}

fn compose_blocking(config: &PipelineConfig, req: ComposeRequest) -> Result<ComposeResponse, ApiError> {
    let bytes = B64
        .decode(req.recitation_b64.as_bytes())
        .map_err(|e| ApiError::BadRequest(format!("recitation_b64: {e}")))?;
    let voice = Waveform::decode(&bytes).map_err(|e| ApiError::BadRequest(format!("recitation: {e}")))?;

    let mut config = config.clone();
    if req.seed.is_some() {
        config.melody_generation.seed = req.seed;
    }
    let song = Pipeline::from_config(&config)
        .and_then(|mut p| p.run(&req.features, &voice))
        .map_err(ApiError::Pipeline)?;

    let plans = song.plans().into_iter().map(plan_response).collect::<Result<Vec<_>, _>>()?;
    Ok(ComposeResponse { params: song.params, plans })
}

fn plan_response(plan: &PlanOutput) -> Result<PlanResponse, ApiError> {
    let wav = plan
        .final_waveform()
        .to_wav_bytes()
        .map_err(|e| ApiError::Internal(format!("encoding {}: {e}", plan.plan)))?;
    Ok(PlanResponse {
        plan: plan.plan.slug(),
        wav_b64: B64.encode(wav),
        midi_b64: B64.encode(&plan.midi),
        render_degraded: plan.render.is_degraded(),
        mix_degraded: plan.mix.is_degraded(),
    })
}
