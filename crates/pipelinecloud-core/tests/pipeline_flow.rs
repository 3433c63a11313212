mod common;

use common::*;
use pipelinecloud_core::{
    AttributeStrategy, DatabaseConnection, EmbeddedStrategy, Pipeline, PipelineError,
    LIST_TABLES_SQL, SQL_COPT_SS_ACCESS_TOKEN,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn identity_provider(body: serde_json::Value) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(token_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_failed_token_never_reaches_driver() {
    let server = identity_provider(serde_json::json!({
        "error": "unauthorized_client",
        "error_description": "Application not found in directory",
    }))
    .await;
    let bundle = write_bundle(test_key());
    let pipeline = Pipeline::new(settings(&server.uri(), bundle.path())).unwrap();
    let driver = RecordingDriver::default();

    let err = pipeline.connect(&AttributeStrategy, &driver).await.err().unwrap();
    assert!(matches!(err, PipelineError::Auth(_)), "{err:?}");
    assert_eq!(err.exit_code(), 2);
    assert!(driver.calls.borrow().is_empty());
}

#[tokio::test]
async fn test_attribute_flow_packs_token() {
    let server = identity_provider(serde_json::json!({
        "token_type": "Bearer",
        "expires_in": 3599,
        "access_token": "ab",
    }))
    .await;
    let bundle = write_bundle(test_key());
    let pipeline = Pipeline::new(settings(&server.uri(), bundle.path())).unwrap();
    let driver = RecordingDriver {
        rows: vec!["Orders".into(), "Customers".into()],
        ..Default::default()
    };

    let mut conn = pipeline.connect(&AttributeStrategy, &driver).await.unwrap();
    assert_eq!(
        conn.query_column(LIST_TABLES_SQL).unwrap(),
        vec!["Orders".to_string(), "Customers".to_string()]
    );
    conn.close().unwrap();

    let calls = driver.calls.borrow();
    assert_eq!(calls.len(), 1);
    let (conn_str, attrs) = &calls[0];
    assert_eq!(
        conn_str.as_str(),
        "Driver={ODBC Driver 18 for SQL Server};Server=srv.database.windows.net;Database=analytics;"
    );
    assert_eq!(
        attrs[&SQL_COPT_SS_ACCESS_TOKEN],
        vec![0x04, 0x00, 0x00, 0x00, 0x61, 0x00, 0x62, 0x00]
    );
}

#[tokio::test]
async fn test_embedded_flow_carries_token_in_string() {
    let server = identity_provider(serde_json::json!({
        "token_type": "Bearer",
        "expires_in": 3599,
        "access_token": "tok.en",
    }))
    .await;
    let bundle = write_bundle(test_key());
    let pipeline = Pipeline::new(settings(&server.uri(), bundle.path())).unwrap();
    let driver = RecordingDriver::default();

    pipeline.connect(&EmbeddedStrategy, &driver).await.unwrap();

    let calls = driver.calls.borrow();
    let (conn_str, attrs) = &calls[0];
    assert!(attrs.is_empty());
    assert!(conn_str.is_url_encoded());
    let plain = conn_str.decoded().unwrap();
    assert!(plain.ends_with("Authentication=ActiveDirectoryAccessToken;AccessToken=tok.en;"));
}

#[test]
fn test_pipeline_requires_readable_bundle() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.pem");
    let err = Pipeline::new(settings("http://127.0.0.1:9", &missing)).unwrap_err();
    assert_eq!(err.exit_code(), 1);
}
