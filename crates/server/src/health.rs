use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use karmabot_db::StoreConnector;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    connector: Arc<StoreConnector>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub database: HealthCheck,
    pub checked_at: String,
}

pub fn router(connector: Arc<StoreConnector>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { connector })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.connector).await;
    let ready = database.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "karmabot-server runtime initialized".to_string(),
        },
        database,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(connector: &StoreConnector) -> HealthCheck {
    let pool = match connector.pool().await {
        Ok(pool) => pool,
        Err(error) => {
            return HealthCheck { status: "degraded", detail: error.to_string() };
        }
    };
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(&pool).await {
        Ok(_) => HealthCheck { status: "ready", detail: "database query succeeded".to_string() },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("database query failed: {error}") }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{extract::State, http::StatusCode, Json};
    use karmabot_db::{ConnectionSettings, StoreConnector};

    use crate::health::{health, HealthState};

    fn connector(url: &str) -> Arc<StoreConnector> {
        Arc::new(StoreConnector::new(ConnectionSettings {
            url: url.to_string(),
            max_connections: 1,
            timeout_secs: 1,
        }))
    }

    #[tokio::test]
    async fn health_returns_ready_when_database_is_reachable() {
        let connector = connector("sqlite::memory:");

        let (status, Json(payload)) =
            health(State(HealthState { connector: connector.clone() })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.database.status, "ready");
        assert_eq!(payload.service.status, "ready");

        connector.close().await;
    }

    #[tokio::test]
    async fn health_returns_service_unavailable_when_database_is_unavailable() {
        let connector = connector("sqlite:///nonexistent-dir/karmabot.db");

        let (status, Json(payload)) = health(State(HealthState { connector })).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.database.status, "degraded");
        assert_eq!(payload.service.status, "ready");
    }
}
