//! JSON HTTP API over the inventory table.

use std::fmt::Display;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sigpat_core::{Asset, AssetFilters, ConditionBadge, ConditionRules, PageRequest, Pagination};
use sigpat_storage::PgInventoryStore;
use sigpat_sync::{build_service, maybe_build_scheduler, SyncConfig, SyncService};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

pub const CRATE_NAME: &str = "sigpat-web";

#[derive(Debug, Clone)]
pub struct WebConfig {
    pub port: u16,
    pub default_page_limit: u32,
    pub condition_rules_path: Option<PathBuf>,
}

impl WebConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            port: non_empty("SIGPAT_WEB_PORT")
                .and_then(|v| v.trim().parse::<u16>().ok())
                .unwrap_or(3002),
            default_page_limit: non_empty("SIGPAT_DEFAULT_PAGE_LIMIT")
                .and_then(|v| v.trim().parse::<u32>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(PageRequest::DEFAULT_LIMIT),
            condition_rules_path: non_empty("SIGPAT_CONDITION_RULES").map(PathBuf::from),
        }
    }

    pub fn load_condition_rules(&self) -> anyhow::Result<ConditionRules> {
        match &self.condition_rules_path {
            Some(path) => ConditionRules::from_path(path)
                .with_context(|| format!("loading condition rules from {}", path.display())),
            None => Ok(ConditionRules::default()),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub sync: Arc<SyncService>,
    pub rules: ConditionRules,
    pub default_page_limit: u32,
}

impl AppState {
    pub fn new(sync: Arc<SyncService>, rules: ConditionRules, default_page_limit: u32) -> Self {
        Self {
            sync,
            rules,
            default_page_limit,
        }
    }

    fn store(&self) -> &PgInventoryStore {
        self.sync.store()
    }
}

#[derive(Debug, Deserialize, Default)]
struct InventoryQuery {
    page: Option<String>,
    limit: Option<String>,
    #[serde(flatten)]
    filters: AssetFilters,
}

/// An asset as returned by the API, with its condition badge.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AssetView<'a> {
    #[serde(flatten)]
    asset: &'a Asset,
    classe_situacao: ConditionBadge,
}

impl<'a> AssetView<'a> {
    fn new(asset: &'a Asset, rules: &ConditionRules) -> Self {
        Self {
            asset,
            classe_situacao: rules.classify(asset.situacao_fisica.as_deref()),
        }
    }
}

#[derive(Debug, Serialize)]
struct InventoryResponse<'a> {
    data: Vec<AssetView<'a>>,
    pagination: Pagination,
}

#[derive(Debug, Serialize)]
struct SyncResponse {
    message: &'static str,
    total: u64,
    skipped: usize,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/inventario", get(inventory_handler))
        .route("/api/inventario/{numero}", get(asset_detail_handler))
        .route("/api/filter-options", get(filter_options_handler))
        .route("/api/sync", post(sync_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

pub async fn serve_from_env() -> anyhow::Result<()> {
    let sync_config = SyncConfig::from_env();
    let web_config = WebConfig::from_env();

    let service = Arc::new(build_service(&sync_config).await?);
    service
        .store()
        .ensure_schema()
        .await
        .context("ensuring inventory schema")?;

    let scheduler = maybe_build_scheduler(&sync_config, service.clone()).await?;
    if let Some(sched) = &scheduler {
        sched.start().await.context("starting sync scheduler")?;
    }

    let rules = web_config.load_condition_rules()?;
    let state = AppState::new(service, rules, web_config.default_page_limit);
    let listener = TcpListener::bind(("0.0.0.0", web_config.port))
        .await
        .with_context(|| format!("binding port {}", web_config.port))?;
    info!(port = web_config.port, "server listening");
    axum::serve(listener, app(state)).await?;
    Ok(())
}

async fn index_handler() -> &'static str {
    "Hello from Server!"
}

async fn inventory_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<InventoryQuery>,
) -> Response {
    let page = PageRequest::from_raw(
        query.page.as_deref(),
        query.limit.as_deref(),
        state.default_page_limit,
    );
    match state.store().list(page, &query.filters).await {
        Ok(result) => Json(InventoryResponse {
            data: result
                .data
                .iter()
                .map(|asset| AssetView::new(asset, &state.rules))
                .collect(),
            pagination: result.pagination,
        })
        .into_response(),
        Err(err) => server_error("Erro ao buscar dados do banco de dados", err),
    }
}

async fn asset_detail_handler(
    State(state): State<Arc<AppState>>,
    AxumPath(numero): AxumPath<String>,
) -> Response {
    match state.store().get(&numero).await {
        Ok(Some(asset)) => Json(AssetView::new(&asset, &state.rules)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorBody {
                error: "Bem não encontrado",
                details: None,
            }),
        )
            .into_response(),
        Err(err) => server_error("Erro ao buscar dados do banco de dados", err),
    }
}

async fn filter_options_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.store().filter_options().await {
        Ok(options) => Json(options).into_response(),
        Err(err) => server_error("Erro ao buscar opções de filtro", err),
    }
}

async fn sync_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.sync.run_once().await {
        Ok(summary) => Json(SyncResponse {
            message: "Sincronização concluída com sucesso",
            total: summary.imported,
            skipped: summary.skipped,
        })
        .into_response(),
        Err(err) => server_error("Erro ao sincronizar dados", err),
    }
}

fn server_error(message: &'static str, err: impl Display) -> Response {
    error!(error = %err, "{message}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            error: message,
            details: Some(err.to_string()),
        }),
    )
        .into_response()
}
