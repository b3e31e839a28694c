use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;
use vitae_server::api::{MgmtState, mgmt_router};
use vitae_server::services::health_service::{HealthError, HealthService, Integrations};

mod common;

async fn readyz(app: axum::Router) -> (StatusCode, Value) {
    let resp = app.oneshot(Request::builder().uri("/readyz").body(Body::empty()).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_probes() {
    let config = common::get_test_config(&[]);
    let pool = common::get_test_pool(&config).await;
    let integrations = Integrations { mail_delivery: true, llm: false, google_oauth: false };
    let app = mgmt_router(MgmtState { health_service: HealthService::new(pool, config.health.clone(), integrations) });

    let resp = app.clone().oneshot(Request::builder().uri("/livez").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let (status, body) = readyz(app).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "ok");
    assert_eq!(body["integrations"], json!({ "mailDelivery": true, "llm": false, "googleOauth": false }));
}

#[tokio::test]
async fn test_readyz_reports_closed_pool() {
    let config = common::get_test_config(&[]);
    let pool = common::get_test_pool(&config).await;
    pool.close().await;
    let app = mgmt_router(MgmtState {
        health_service: HealthService::new(pool, config.health.clone(), Integrations::default()),
    });

    let (status, body) = readyz(app).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["database"], "error");
}

#[tokio::test]
async fn test_unmigrated_schema_is_not_ready() {
    let config = common::get_test_config(&[]);
    let pool = common::get_test_pool(&config).await;

    // An empty schema on the same database, searched first
    let schema = format!("empty_{}", uuid::Uuid::new_v4().simple());
    sqlx::query(&format!("CREATE SCHEMA {schema}")).execute(&pool).await.unwrap();
    let empty_pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(1)
        .after_connect({
            let schema = schema.clone();
            move |conn, _| {
                let schema = schema.clone();
                Box::pin(async move {
                    sqlx::query(&format!("SET search_path TO {schema}")).execute(conn).await?;
                    Ok(())
                })
            }
        })
        .connect(&common::database_url())
        .await
        .unwrap();

    let health = HealthService::new(empty_pool.clone(), config.health.clone(), Integrations::default());
    let result = health.check_db().await;

    empty_pool.close().await;
    sqlx::query(&format!("DROP SCHEMA {schema}")).execute(&pool).await.unwrap();

    assert!(matches!(result, Err(HealthError::SchemaMissing("users"))), "unexpected {result:?}");
}
