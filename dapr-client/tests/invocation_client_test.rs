use dapr_client::DaprError;
use dapr_client::client::{DaprClient, HttpVerb, InvocationDescriptor};
use dapr_client::grpc::auth::{EnvApiToken, StaticApiToken};
use dapr_client::grpc::cancellation::CancellationToken;
use dapr_client::grpc::client::CallOptions;
use dapr_client::grpc::status::{ResponseOrigin, http_status_for};
use dapr_client::proto::dapr::proto::common::v1::http_extension::Verb;
use serde_json::json;
use sidecar_service::{APP_ID_HEADER, AppBehavior, InMemorySidecar};
use std::time::Duration;
use tonic::Code;

fn client(sidecar: &InMemorySidecar) -> DaprClient<InMemorySidecar> {
    DaprClient::from_service_with_api_token(sidecar.clone(), StaticApiToken::none())
}

#[tokio::test]
async fn test_http_application_reports_its_status() {
    let sidecar =
        InMemorySidecar::new().with_app("orders", AppBehavior::EchoHttp { status_code: 201 });
    let client = client(&sidecar);

    let descriptor = InvocationDescriptor::new("orders", "create")
        .with_json_body(&json!({ "id": 7 }))
        .unwrap();
    let result = client.invoke_method(descriptor).await.unwrap();

    assert_eq!(result.origin, ResponseOrigin::Http { status_code: 201 });
    assert_eq!(result.http_status_code(), Some(201));
    assert_eq!(result.grpc_status(), None);
    assert_eq!(result.content_type, "application/json");
    assert_eq!(result.json::<serde_json::Value>().unwrap(), json!({ "id": 7 }));
    assert_eq!(result.headers.get("dapr-http-status").unwrap().as_ref(), b"201");
}

#[tokio::test]
async fn test_grpc_application_reports_ok() {
    let sidecar = InMemorySidecar::new().with_app("ledger", AppBehavior::EchoGrpc);
    let client = client(&sidecar);

    let descriptor = InvocationDescriptor::new("ledger", "Append").with_body("raw");
    let result = client.invoke_method(descriptor).await.unwrap();

    let status = result.grpc_status().unwrap();
    assert_eq!(status.code, Code::Ok);
    assert_eq!(status.inner_http_status_code, None);
    assert_eq!(result.http_status_code(), None);
    assert_eq!(result.content_type, "application/grpc");
    assert_eq!(result.body.as_ref(), b"raw");
}

#[tokio::test]
async fn test_http_semantics_reach_the_sidecar() {
    let sidecar =
        InMemorySidecar::new().with_app("orders", AppBehavior::EchoHttp { status_code: 200 });
    let client = client(&sidecar);

    let descriptor = InvocationDescriptor::new("orders", "items")
        .with_verb(HttpVerb::Get)
        .with_query_param("page", "2")
        .with_header("x-tenant", "acme")
        .with_content_type("text/plain");
    client.invoke_method(descriptor).await.unwrap();

    let request = &sidecar.invocations()[0];
    let message = request.message.as_ref().unwrap();
    let extension = message.http_extension.as_ref().unwrap();
    assert_eq!(request.id, "orders");
    assert_eq!(message.method, "items");
    assert_eq!(message.content_type, "text/plain");
    assert_eq!(extension.verb(), Verb::Get);
    assert_eq!(extension.querystring.get("page").map(String::as_str), Some("2"));
    assert_eq!(message.data, None);

    let call = &sidecar.calls()[0];
    assert_eq!(call.headers.get("x-tenant").map(String::as_str), Some("acme"));
}

#[tokio::test]
async fn test_failed_http_application_exposes_its_error() {
    let sidecar = InMemorySidecar::new().with_app(
        "orders",
        AppBehavior::FailHttp {
            http_code: 404,
            message: "not found".to_string(),
        },
    );
    let client = client(&sidecar);

    let err = client
        .invoke_method(InvocationDescriptor::new("orders", "missing"))
        .await
        .unwrap_err();

    let err = match err {
        DaprError::Invocation(err) => err,
        other => panic!("Expected an invocation error, got {other:?}"),
    };
    let status = err.partial.grpc_status().unwrap();
    assert_eq!(err.app_id, "orders");
    assert_eq!(err.method, "missing");
    assert_eq!(status.code, Code::Unknown);
    assert_eq!(status.inner_http_status_code, Some(404));
    assert_eq!(status.inner_http_error_message.as_deref(), Some("not found"));
    assert!(err.partial.trailers.contains_key("grpc-status-details-bin"));
    assert_eq!(http_status_for(err.source.code()), 500);
}

#[tokio::test]
async fn test_failed_grpc_application_has_no_inner_http_error() {
    let sidecar =
        InMemorySidecar::new().with_app("ledger", AppBehavior::Fail(Code::PermissionDenied));
    let client = client(&sidecar);

    let err = client
        .invoke_method(InvocationDescriptor::new("ledger", "Append"))
        .await
        .unwrap_err();

    assert!(err.is_transport());
    let err = match err {
        DaprError::Invocation(err) => err,
        other => panic!("Expected an invocation error, got {other:?}"),
    };
    let status = err.partial.grpc_status().unwrap();
    assert_eq!(status.code, Code::PermissionDenied);
    assert_eq!(status.inner_http_status_code, None);
    assert_eq!(status.inner_http_error_message, None);
    assert_eq!(http_status_for(status.code), 403);
    assert_eq!(err.partial.headers.get(APP_ID_HEADER).unwrap().as_ref(), b"ledger");
}

#[tokio::test]
async fn test_failure_after_headers_keeps_them_in_the_partial_result() {
    let sidecar = InMemorySidecar::new()
        .with_app("orders", AppBehavior::FailAfterHeaders(Code::NotFound));
    let client = client(&sidecar);

    let err = client
        .invoke_method(InvocationDescriptor::new("orders", "lookup"))
        .await
        .unwrap_err();

    let err = match err {
        DaprError::Invocation(err) => err,
        other => panic!("Expected an invocation error, got {other:?}"),
    };
    assert_eq!(err.source.code(), Code::NotFound);
    let app_id = err.source.headers().get(APP_ID_HEADER).unwrap();
    assert_eq!(app_id.to_str().unwrap(), "orders");
    assert_eq!(err.partial.headers.get(APP_ID_HEADER).unwrap().as_ref(), b"orders");
    assert_eq!(err.partial.grpc_status().unwrap().code, Code::NotFound);
    assert_eq!(http_status_for(err.source.code()), 404);
}

#[tokio::test]
async fn test_unknown_app_fails_with_partial_result() {
    let client = client(&InMemorySidecar::new());

    let err = client
        .invoke_method(InvocationDescriptor::new("nobody", "ping"))
        .await
        .unwrap_err();

    assert_eq!(err.rpc_error().unwrap().code(), Code::Unavailable);
    assert!(matches!(err, DaprError::Invocation(_)));
}

#[tokio::test]
async fn test_malformed_http_status_header() {
    let sidecar = InMemorySidecar::new()
        .with_app("orders", AppBehavior::RawHttpStatus("two hundred".to_string()));
    let client = client(&sidecar);

    let err = client
        .invoke_method(InvocationDescriptor::new("orders", "create"))
        .await
        .unwrap_err();

    assert!(matches!(err, DaprError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_empty_identifiers_are_rejected() {
    let sidecar = InMemorySidecar::new();
    let client = client(&sidecar);

    let err = client
        .invoke_method(InvocationDescriptor::new("", "m"))
        .await
        .unwrap_err();
    assert!(matches!(err, DaprError::InvalidArgument("app_id")));

    let err = client
        .invoke_method(InvocationDescriptor::new("a", ""))
        .await
        .unwrap_err();
    assert!(matches!(err, DaprError::InvalidArgument("method")));

    assert!(sidecar.calls().is_empty());
}

#[tokio::test]
async fn test_deadline_expires() {
    let sidecar = InMemorySidecar::new().with_app("slow", AppBehavior::Hang);
    let client = client(&sidecar)
        .with_call_options(CallOptions::default().with_timeout(Duration::from_millis(50)));

    let err = client
        .invoke_method(InvocationDescriptor::new("slow", "wait"))
        .await
        .unwrap_err();

    assert_eq!(err.rpc_error().unwrap().code(), Code::DeadlineExceeded);
}

#[tokio::test]
async fn test_cancellation_interrupts_the_call() {
    let sidecar = InMemorySidecar::new().with_app("slow", AppBehavior::Hang);
    let token = CancellationToken::new();
    let client = client(&sidecar)
        .with_call_options(CallOptions::default().with_cancellation(token.clone()));

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
    });

    let err = client
        .invoke_method(InvocationDescriptor::new("slow", "wait"))
        .await
        .unwrap_err();

    canceller.await.unwrap();
    assert_eq!(err.rpc_error().unwrap().code(), Code::Cancelled);
}

#[tokio::test]
async fn test_cancelling_a_parent_token_interrupts_calls_holding_a_child() {
    let sidecar = InMemorySidecar::new().with_app("slow", AppBehavior::Hang);
    let parent = CancellationToken::new();
    let client = client(&sidecar)
        .with_call_options(CallOptions::default().with_cancellation(parent.child_token()));

    let call = tokio::spawn(async move {
        client
            .invoke_method(InvocationDescriptor::new("slow", "wait"))
            .await
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    parent.cancel();

    let err = call.await.unwrap().unwrap_err();
    assert_eq!(err.rpc_error().unwrap().code(), Code::Cancelled);
}

#[tokio::test]
async fn test_cancelled_token_skips_the_call() {
    let sidecar = InMemorySidecar::new().with_app("orders", AppBehavior::EchoGrpc);
    let token = CancellationToken::new();
    token.cancel();
    let client =
        client(&sidecar).with_call_options(CallOptions::default().with_cancellation(token));

    let err = client
        .invoke_method(InvocationDescriptor::new("orders", "create"))
        .await
        .unwrap_err();

    assert_eq!(err.rpc_error().unwrap().code(), Code::Cancelled);
    assert!(sidecar.calls().is_empty());
}

#[tokio::test]
async fn test_call_option_headers_are_forwarded() {
    let sidecar = InMemorySidecar::new().with_app("orders", AppBehavior::EchoGrpc);
    let options = CallOptions::default().with_header("traceparent", "00-abc");
    let client = client(&sidecar).with_call_options(options);

    let descriptor = InvocationDescriptor::new("orders", "create").with_header("x-tenant", "acme");
    client.invoke_method(descriptor).await.unwrap();

    let headers = &sidecar.calls()[0].headers;
    assert_eq!(headers.get("traceparent").map(String::as_str), Some("00-abc"));
    assert_eq!(headers.get("x-tenant").map(String::as_str), Some("acme"));
}

#[tokio::test]
async fn test_env_token_is_read_on_every_call() {
    const VARIABLE: &str = "DAPR_CLIENT_INVOCATION_TEST_TOKEN";
    let sidecar = InMemorySidecar::new().with_app("orders", AppBehavior::EchoGrpc);
    let client =
        DaprClient::from_service_with_api_token(sidecar.clone(), EnvApiToken::from_var(VARIABLE));

    // SAFETY: no other test reads or writes this variable.
    unsafe { std::env::set_var(VARIABLE, "first") };
    client
        .invoke_method(InvocationDescriptor::new("orders", "a"))
        .await
        .unwrap();

    unsafe { std::env::set_var(VARIABLE, "second") };
    client
        .invoke_method(InvocationDescriptor::new("orders", "b"))
        .await
        .unwrap();

    unsafe { std::env::remove_var(VARIABLE) };
    client
        .invoke_method(InvocationDescriptor::new("orders", "c"))
        .await
        .unwrap();

    let tokens: Vec<_> = sidecar.calls().into_iter().map(|c| c.api_token).collect();
    assert_eq!(
        tokens,
        vec![Some("first".to_string()), Some("second".to_string()), None]
    );
}
