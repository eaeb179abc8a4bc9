use dapr_client::DaprError;
use dapr_client::client::{
    ConcurrencyMode, ConsistencyMode, DaprClient, StateOptions, StateTransactionRequest,
};
use dapr_client::grpc::auth::StaticApiToken;
use dapr_client::grpc::client::GrpcRequestError;
use serde::{Deserialize, Serialize};
use sidecar_service::InMemorySidecar;
use std::collections::HashMap;
use tonic::Code;

const STORE: &str = "statestore";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Order {
    id: u32,
    status: String,
}

fn order(id: u32, status: &str) -> Order {
    Order {
        id,
        status: status.to_string(),
    }
}

fn client(sidecar: &InMemorySidecar) -> DaprClient<InMemorySidecar> {
    DaprClient::from_service_with_api_token(sidecar.clone(), StaticApiToken::none())
}

#[tokio::test]
async fn test_save_then_get() {
    let sidecar = InMemorySidecar::new();
    let client = client(&sidecar);

    client
        .save_state(STORE, "order-1", &order(1, "pending"), None, None)
        .await
        .unwrap();

    let value: Option<Order> = client
        .get_state(STORE, "order-1", Some(ConsistencyMode::Strong), None)
        .await
        .unwrap();

    assert_eq!(value, Some(order(1, "pending")));
    assert_eq!(
        sidecar.stored(STORE, "order-1").unwrap().value,
        br#"{"id":1,"status":"pending"}"#
    );
}

#[tokio::test]
async fn test_missing_key_reads_as_none() {
    let client = client(&InMemorySidecar::new());

    let (value, etag) = client
        .get_state_and_etag::<Order>(STORE, "missing", None, None)
        .await
        .unwrap();

    assert_eq!(value, None);
    assert_eq!(etag, None);
}

#[tokio::test]
async fn test_try_save_with_current_etag() {
    let sidecar = InMemorySidecar::new();
    let client = client(&sidecar);
    client
        .save_state(STORE, "order-1", &order(1, "pending"), None, None)
        .await
        .unwrap();

    let (_, etag) = client
        .get_state_and_etag::<Order>(STORE, "order-1", None, None)
        .await
        .unwrap();
    let etag = etag.unwrap();

    let saved = client
        .try_save_state(STORE, "order-1", &order(1, "paid"), &etag, None, None)
        .await
        .unwrap();

    assert!(saved);
    let value: Option<Order> = client.get_state(STORE, "order-1", None, None).await.unwrap();
    assert_eq!(value, Some(order(1, "paid")));
    assert_ne!(sidecar.stored(STORE, "order-1").unwrap().etag, etag);
}

#[tokio::test]
async fn test_try_save_with_stale_etag() {
    let sidecar = InMemorySidecar::new();
    let client = client(&sidecar);
    let stale = sidecar.put_state(STORE, "order-1", br#"{"id":1,"status":"pending"}"#.to_vec());
    sidecar.put_state(STORE, "order-1", br#"{"id":1,"status":"shipped"}"#.to_vec());

    let saved = client
        .try_save_state(STORE, "order-1", &order(1, "paid"), &stale, None, None)
        .await
        .unwrap();

    assert!(!saved);
    let value: Option<Order> = client.get_state(STORE, "order-1", None, None).await.unwrap();
    assert_eq!(value, Some(order(1, "shipped")));
}

#[tokio::test]
async fn test_first_write_without_etag_is_rejected() {
    let sidecar = InMemorySidecar::new();
    let client = client(&sidecar);
    sidecar.put_state(STORE, "order-1", b"1".to_vec());

    let options = StateOptions::default().with_concurrency(ConcurrencyMode::FirstWrite);
    let err = client
        .save_state(STORE, "order-1", &2, Some(options), None)
        .await
        .unwrap_err();

    assert_eq!(err.rpc_error().unwrap().code(), Code::Aborted);
}

#[tokio::test]
async fn test_delete_and_try_delete() {
    let sidecar = InMemorySidecar::new();
    let client = client(&sidecar);
    let etag = sidecar.put_state(STORE, "a", b"1".to_vec());
    sidecar.put_state(STORE, "b", b"2".to_vec());

    assert!(!client.try_delete_state(STORE, "a", "0", None, None).await.unwrap());
    assert!(sidecar.stored(STORE, "a").is_some());

    assert!(client.try_delete_state(STORE, "a", &etag, None, None).await.unwrap());
    assert!(sidecar.stored(STORE, "a").is_none());

    client.delete_state(STORE, "b", None, None).await.unwrap();
    assert!(sidecar.stored(STORE, "b").is_none());
}

#[tokio::test]
async fn test_empty_arguments_are_rejected_before_any_call() {
    let sidecar = InMemorySidecar::new();
    let client = client(&sidecar);

    let err = client
        .get_state::<Order>("", "k", None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, DaprError::InvalidArgument("store_name")));

    let err = client.save_state(STORE, "", &1, None, None).await.unwrap_err();
    assert!(matches!(err, DaprError::InvalidArgument("key")));

    let err = client
        .try_delete_state(STORE, "", "1", None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, DaprError::InvalidArgument("key")));

    let keys: [&str; 0] = [];
    let err = client
        .get_bulk_state(STORE, &keys, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, DaprError::InvalidArgument("keys")));

    let err = client
        .execute_state_transaction(STORE, vec![], None)
        .await
        .unwrap_err();
    assert!(matches!(err, DaprError::InvalidArgument("operations")));

    assert!(sidecar.calls().is_empty());
}

#[tokio::test]
async fn test_failing_sidecar() {
    let sidecar = InMemorySidecar::new();
    let client = client(&sidecar);
    sidecar.fail_all(Code::Unavailable);

    assert!(!client.try_save_state(STORE, "k", &1, "1", None, None).await.unwrap());
    assert!(!client.try_delete_state(STORE, "k", "1", None, None).await.unwrap());

    let err = client.save_state(STORE, "k", &1, None, None).await.unwrap_err();
    assert!(err.is_transport());
    assert_eq!(err.rpc_error().unwrap().code(), Code::Unavailable);

    let err = client.delete_state(STORE, "k", None, None).await.unwrap_err();
    assert_eq!(err.rpc_error().unwrap().code(), Code::Unavailable);

    sidecar.recover();
    client.save_state(STORE, "k", &1, None, None).await.unwrap();
}

#[tokio::test]
async fn test_try_operations_differ_on_request_build_failures() {
    let sidecar = InMemorySidecar::new();
    let client =
        DaprClient::from_service_with_api_token(sidecar.clone(), StaticApiToken::new("bad\ntoken"));

    let err = client
        .try_save_state(STORE, "k", &1, "1", None, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DaprError::Grpc(GrpcRequestError::InvalidMetadataValue { .. })
    ));

    let deleted = client
        .try_delete_state(STORE, "k", "1", None, None)
        .await
        .unwrap();
    assert!(!deleted);

    assert!(sidecar.calls().is_empty());
}

#[tokio::test]
async fn test_bulk_get() {
    let sidecar = InMemorySidecar::new().with_bulk_error("broken", "store unavailable");
    let client = client(&sidecar);
    sidecar.put_state(STORE, "a", br#""one""#.to_vec());

    let items = client
        .get_bulk_state(STORE, &["a", "missing", "broken"], Some(4), None)
        .await
        .unwrap();

    assert_eq!(items.len(), 3);
    assert_eq!(items[0].key, "a");
    assert_eq!(items[0].json::<String>().unwrap().as_deref(), Some("one"));
    assert!(items[0].etag.is_some());
    assert_eq!(items[1].json::<String>().unwrap(), None);
    assert_eq!(items[1].etag, None);
    assert_eq!(items[2].error.as_deref(), Some("store unavailable"));
    assert_eq!(sidecar.bulk_requests()[0].parallelism, 4);
}

#[tokio::test]
async fn test_bulk_get_parallelism_defaults_to_zero() {
    let sidecar = InMemorySidecar::new();
    let client = client(&sidecar);

    client
        .get_bulk_state(STORE, &["a".to_string()], None, None)
        .await
        .unwrap();

    assert_eq!(sidecar.bulk_requests()[0].parallelism, 0);
}

#[tokio::test]
async fn test_transaction_applies_every_operation() {
    let sidecar = InMemorySidecar::new();
    let client = client(&sidecar);
    sidecar.put_state(STORE, "old", b"1".to_vec());

    let metadata = HashMap::from([("ttlInSeconds".to_string(), "60".to_string())]);
    let operations = vec![
        StateTransactionRequest::upsert_json("new", &order(2, "pending")).unwrap(),
        StateTransactionRequest::delete("old"),
    ];

    client
        .execute_state_transaction(STORE, operations, Some(metadata.clone()))
        .await
        .unwrap();

    assert!(sidecar.stored(STORE, "old").is_none());
    let stored = sidecar.stored(STORE, "new").unwrap();
    assert_eq!(stored.metadata, metadata);

    let request = &sidecar.transactions()[0];
    assert_eq!(request.metadata, metadata);
    assert_eq!(request.operations[0].operation_type, "upsert");
    assert_eq!(request.operations[1].operation_type, "delete");
}

#[tokio::test]
async fn test_operation_metadata_takes_priority_over_transaction_metadata() {
    let sidecar = InMemorySidecar::new();
    let client = client(&sidecar);

    let shared = HashMap::from([("ttlInSeconds".to_string(), "60".to_string())]);
    let own = HashMap::from([("ttlInSeconds".to_string(), "5".to_string())]);
    let operations = vec![
        StateTransactionRequest::upsert("short-lived", b"1".to_vec()).with_metadata(own.clone()),
        StateTransactionRequest::upsert("inherits", b"2".to_vec()),
    ];

    client
        .execute_state_transaction(STORE, operations, Some(shared.clone()))
        .await
        .unwrap();

    assert_eq!(sidecar.stored(STORE, "short-lived").unwrap().metadata, own);
    assert_eq!(sidecar.stored(STORE, "inherits").unwrap().metadata, shared);

    let request = &sidecar.transactions()[0];
    assert_eq!(request.operations[0].request.as_ref().unwrap().metadata, own);
    assert!(request.operations[1].request.as_ref().unwrap().metadata.is_empty());
}

#[tokio::test]
async fn test_transaction_with_stale_etag_applies_nothing() {
    let sidecar = InMemorySidecar::new();
    let client = client(&sidecar);
    sidecar.put_state(STORE, "a", b"1".to_vec());

    let operations = vec![
        StateTransactionRequest::upsert("b", b"2".to_vec()),
        StateTransactionRequest::delete("a").with_etag("stale"),
    ];

    let err = client
        .execute_state_transaction(STORE, operations, None)
        .await
        .unwrap_err();

    assert_eq!(err.rpc_error().unwrap().code(), Code::Aborted);
    assert!(sidecar.stored(STORE, "a").is_some());
    assert!(sidecar.stored(STORE, "b").is_none());
}

#[tokio::test]
async fn test_transaction_rejects_empty_keys() {
    let client = client(&InMemorySidecar::new());

    let err = client
        .execute_state_transaction(STORE, vec![StateTransactionRequest::delete("")], None)
        .await
        .unwrap_err();

    assert!(matches!(err, DaprError::InvalidArgument("key")));
}

#[tokio::test]
async fn test_state_entry_round_trip() {
    let sidecar = InMemorySidecar::new();
    let client = client(&sidecar);
    client
        .save_state(STORE, "order-1", &order(1, "pending"), None, None)
        .await
        .unwrap();

    let mut entry = client
        .get_state_entry::<Order>(STORE, "order-1", None)
        .await
        .unwrap();
    assert_eq!(entry.value, Some(order(1, "pending")));

    entry.value = Some(order(1, "paid"));
    assert!(entry.try_save(&client, None).await.unwrap());

    // The entry still holds the etag it was read at.
    assert!(!entry.try_save(&client, None).await.unwrap());
    assert!(!entry.try_delete(&client, None).await.unwrap());

    entry.delete(&client, None).await.unwrap();
    assert!(sidecar.stored(STORE, "order-1").is_none());

    entry.value = None;
    assert!(matches!(
        entry.save(&client, None).await,
        Err(DaprError::InvalidArgument("value"))
    ));
}

#[tokio::test]
async fn test_api_token_is_sent_with_every_call() {
    let sidecar = InMemorySidecar::new().with_required_api_token("secret");
    let client =
        DaprClient::from_service_with_api_token(sidecar.clone(), StaticApiToken::new("secret"));

    client.save_state(STORE, "k", &1, None, None).await.unwrap();
    let _: Option<i32> = client.get_state(STORE, "k", None, None).await.unwrap();

    let calls = sidecar.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|c| c.api_token.as_deref() == Some("secret")));
}

#[tokio::test]
async fn test_missing_api_token_is_rejected_by_the_sidecar() {
    let sidecar = InMemorySidecar::new().with_required_api_token("secret");
    let client = client(&sidecar);

    let err = client.save_state(STORE, "k", &1, None, None).await.unwrap_err();

    assert_eq!(err.rpc_error().unwrap().code(), Code::Unauthenticated);
    assert_eq!(sidecar.calls()[0].api_token, None);
}
