//! Small JSON endpoints.

use axum::{extract::State, Json};
use serde::Serialize;

use super::super::AppState;

/// One recognized category.
#[derive(Debug, Serialize)]
pub struct CategoryInfo {
    pub name: &'static str,
    pub statistic: bool,
}

/// Liveness probe.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Categories this server asks the analyzer for, in output order.
pub async fn list_categories(State(state): State<AppState>) -> Json<Vec<CategoryInfo>> {
    let categories = state
        .processor
        .invoker()
        .categories()
        .iter()
        .map(|c| CategoryInfo {
            name: c.as_str(),
            statistic: c.is_statistic(),
        })
        .collect();
    Json(categories)
}
