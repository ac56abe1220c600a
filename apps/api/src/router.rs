use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::router::appointment_routes;
use appointment_cell::SchedulingEngine;
use monitoring_cell::monitoring_routes;
use shared_config::AppConfig;

pub fn create_router(config: Arc<AppConfig>, engine: Arc<SchedulingEngine>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic scheduler is running!" }))
        .merge(appointment_routes(engine))
        .merge(monitoring_routes(config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use notification_cell::RecordingNotifier;
    use shared_utils::test_utils::{MockClock, TestConfig};
    use tower::ServiceExt;

    fn app() -> Router {
        let config = TestConfig::default().to_arc();
        let engine = SchedulingEngine::with_collaborators(
            &config,
            Arc::new(RecordingNotifier::new()),
            Arc::new(MockClock::at_date(2024, 2, 28)),
        )
        .unwrap();
        create_router(config, Arc::new(engine))
    }

    #[tokio::test]
    async fn test_cells_are_mounted() {
        for uri in ["/", "/admin/ping", "/admin/health", "/slots?from=2024-03-01"] {
            let response = app()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let response = app()
            .oneshot(Request::builder().uri("/doctors").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
