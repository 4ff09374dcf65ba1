use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use lor_review::review::{
    review_router, ApplicantRepository, ArtifactStore, NotificationDispatcher, ReviewController,
};
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_review_routes<R, D, S>(
    controller: Arc<ReviewController<R, D, S>>,
) -> axum::Router
where
    R: ApplicantRepository + 'static,
    D: NotificationDispatcher + 'static,
    S: ArtifactStore + 'static,
{
    review_router(controller)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{build_controller, Mailer};
    use axum::body::Body;
    use axum::http::Request;
    use lor_review::config::{
        AppConfig, AppEnvironment, MailConfig, MatcherConfig, ServerConfig, SmtpSecurity,
        StorageConfig, TelemetryConfig,
    };
    use lor_review::review::SqliteApplicantRepository;
    use tower::ServiceExt;

    fn config_in(dir: &std::path::Path) -> AppConfig {
        let templates = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../templates");
        AppConfig {
            environment: AppEnvironment::Test,
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            telemetry: TelemetryConfig {
                log_level: "info".to_string(),
            },
            storage: StorageConfig {
                database_path: dir.join("signup.db"),
                output_root: dir.join("All_LORs"),
                higher_studies_template: templates.join("LOR.txt"),
                professional_template: templates.join("LOR1.txt"),
            },
            matcher: MatcherConfig::default(),
            mail: MailConfig {
                host: "smtp.example.edu".to_string(),
                port: 587,
                security: SmtpSecurity::StartTls,
                credentials: None,
            },
        }
    }

    #[tokio::test]
    async fn review_routes_are_mounted_next_to_health() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = config_in(dir.path());
        let repository = Arc::new(
            SqliteApplicantRepository::open(&config.storage.database_path).expect("open"),
        );
        let controller = Arc::new(build_controller(&config, repository, Mailer::DryRun));
        let router = with_review_routes(controller);

        let health = router
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).expect("request"))
            .await
            .expect("route executes");
        assert_eq!(health.status(), StatusCode::OK);

        let listing = router
            .oneshot(
                Request::get("/api/v1/applicants")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("route executes");
        assert_eq!(listing.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(listing.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        assert_eq!(&bytes[..], b"[]");
    }

    #[tokio::test]
    async fn readiness_reflects_the_flag() {
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        let state = AppState {
            readiness: Arc::new(std::sync::atomic::AtomicBool::new(false)),
            metrics: Arc::new(recorder.handle()),
        };

        let response = readiness_endpoint(Extension(state.clone()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        state
            .readiness
            .store(true, std::sync::atomic::Ordering::Release);
        let response = readiness_endpoint(Extension(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
