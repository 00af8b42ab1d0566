use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json,
};
use chrono::Local;
use serde_json::json;
use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use resale_predictor::features::{
    self, FLAT_MODELS, FLAT_TYPE_RANKS, REGIONS, STOREY_BUCKETS,
};
use resale_predictor::model::{flatten_record, order_features, Model};
use resale_predictor::types::{FeatureRecord, RawInput};

// ---------- Response types ----------

#[derive(serde::Serialize)]
struct Out {
    t: i64,
    // the record the model actually saw, for user confirmation
    features: FeatureRecord,
    predicted_price: f64,
}

// ---------- Server state ----------

#[derive(Clone)]
struct AppState {
    mdl: Arc<Model>,
    feat_list: Arc<Vec<String>>, // authoritative input order
}

// ---------- Handlers ----------

// The fixed enumerations, so a form client can populate its widgets.
async fn schema() -> Json<serde_json::Value> {
    Json(json!({
        "flat_types": FLAT_TYPE_RANKS.iter().map(|(label, _)| *label).collect::<Vec<_>>(),
        "regions": REGIONS,
        "flat_models": FLAT_MODELS,
        "storey_categories": STOREY_BUCKETS.iter().map(|(label, _)| *label).collect::<Vec<_>>(),
    }))
}

async fn predict(
    State(state): State<AppState>,
    Json(raw): Json<RawInput>,
) -> Result<Json<Out>, (StatusCode, Json<serde_json::Value>)> {
    // Raw input -> canonical feature row. Category/range defects are
    // the user's to fix, so they come back as 422 rather than 500.
    let record = features::build_feature_record(&raw, Local::now().date_naive())
        .map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({ "error": e.to_string() }))))?;

    let flat = flatten_record(&record);
    let vec = order_features(&flat, &state.feat_list);

    // Debug signal so we can confirm we're not sending all-zeros
    if std::env::var("LOG_PRED").ok().as_deref() == Some("1") {
        let nz = vec.iter().filter(|x| **x != 0.0).count();
        tracing::info!(
            "recv flat_type={} yearmonth={} in_dim={} nonzero={}",
            record.flat_type,
            record.transaction_year_month,
            vec.len(),
            nz
        );
    }

    let price = state
        .mdl
        .predict_price(&vec, state.feat_list.len())
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))?;

    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0);
    Ok(Json(Out {
        t: now_ms,
        features: record,
        predicted_price: price,
    }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let model_path = std::env::var("MODEL_PATH").context("MODEL_PATH not set")?;
    let meta_path = std::env::var("META_PATH").context("META_PATH not set")?;
    let port: u16 = std::env::var("PORT").ok().and_then(|s| s.parse().ok()).unwrap_or(8080);

    features::validate_tables()?;
    tracing::info!("category tables validated");

    let (mdl, in_dim, feat_list) = Model::load(&model_path, &meta_path)?;
    if in_dim != feat_list.len() {
        tracing::warn!(
            "meta.in_dim ({}) != feat_list.len() ({}); using feat_list.len()",
            in_dim,
            feat_list.len()
        );
    }
    // Warmup to ensure JIT is happy
    let _ = mdl.predict_price(&vec![0.0; feat_list.len()], feat_list.len())?;
    tracing::info!("warmup forward ok");

    tracing::info!("loaded model; feat_list[{}]: {:?}", feat_list.len(), &feat_list);

    let state = AppState {
        mdl: Arc::new(mdl),
        feat_list: Arc::new(feat_list),
    };

    let app = axum::Router::new()
        .route("/schema", get(schema))
        .route("/predict", post(predict))
        .with_state(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
