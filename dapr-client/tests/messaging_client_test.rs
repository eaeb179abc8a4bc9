use dapr_client::DaprError;
use dapr_client::client::DaprClient;
use dapr_client::grpc::auth::StaticApiToken;
use serde_json::json;
use sidecar_service::InMemorySidecar;
use std::collections::HashMap;
use tonic::Code;

fn client(sidecar: &InMemorySidecar) -> DaprClient<InMemorySidecar> {
    DaprClient::from_service_with_api_token(sidecar.clone(), StaticApiToken::none())
}

#[tokio::test]
async fn test_publish_event() {
    let sidecar = InMemorySidecar::new();
    let client = client(&sidecar);
    let metadata = HashMap::from([("rawPayload".to_string(), "true".to_string())]);

    client
        .publish_event("pubsub", "orders", &json!({ "id": 1 }), Some(metadata.clone()))
        .await
        .unwrap();

    let published = sidecar.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].pubsub_name, "pubsub");
    assert_eq!(published[0].topic, "orders");
    assert_eq!(published[0].data, br#"{"id":1}"#);
    assert_eq!(published[0].data_content_type, "application/json");
    assert_eq!(published[0].metadata, metadata);
}

#[tokio::test]
async fn test_publish_requires_a_topic() {
    let sidecar = InMemorySidecar::new();
    let client = client(&sidecar);

    let err = client
        .publish_event("pubsub", "", &1, None)
        .await
        .unwrap_err();

    assert!(matches!(err, DaprError::InvalidArgument("topic")));
    assert!(sidecar.published().is_empty());
}

#[tokio::test]
async fn test_invoke_binding() {
    let client = client(&InMemorySidecar::new());

    let response = client
        .invoke_binding("queue", "create", "payload", None)
        .await
        .unwrap();

    assert_eq!(response.data.as_ref(), b"payload");
    assert_eq!(
        response.metadata.get("operation").map(String::as_str),
        Some("create")
    );
}

#[tokio::test]
async fn test_get_secret() {
    let sidecar = InMemorySidecar::new().with_secret(
        "vault",
        "db",
        [("user", "admin"), ("password", "s3cr3t")],
    );
    let client = client(&sidecar);

    let secret = client.get_secret("vault", "db", None).await.unwrap();

    assert_eq!(secret.len(), 2);
    assert_eq!(secret.get("user").map(String::as_str), Some("admin"));
    assert_eq!(secret.get("password").map(String::as_str), Some("s3cr3t"));
}

#[tokio::test]
async fn test_missing_secret() {
    let client = client(&InMemorySidecar::new());

    let err = client.get_secret("vault", "nope", None).await.unwrap_err();

    assert_eq!(err.rpc_error().unwrap().code(), Code::NotFound);
}
