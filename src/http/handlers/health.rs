use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthStatus {
    pub ok: bool,
    pub version: &'static str,
}

pub async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        ok: true,
        version: env!("CARGO_PKG_VERSION"),
    })
}
