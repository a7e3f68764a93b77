//! Integration tests using wiremock to simulate HTTP servers.

use http::Method;
use http_processor::{Error, Processor, RequestMetadata, Settings, TransportError};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct TestData {
    id: u32,
    name: String,
}

fn test_data() -> TestData {
    TestData {
        id: 1,
        name: "Test".to_string(),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("http_processor=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

fn processor(base_url: impl Into<String>, retry_count: u32) -> Processor {
    init_tracing();
    let settings = Settings::builder(base_url)
        .timeout_seconds(5)
        .retry_count(retry_count)
        .retry_delay_seconds(0)
        .build()
        .unwrap();
    Processor::new(settings).unwrap()
}

#[tokio::test]
async fn test_successful_get_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(test_data()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let processor = processor(mock_server.uri(), 3);

    let data: TestData = processor.get("/test").await.unwrap();
    assert_eq!(data, test_data());
}

#[tokio::test]
async fn test_base_url_path_is_preserved() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(test_data()))
        .expect(2)
        .mount(&mock_server)
        .await;

    let with_slash = processor(format!("{}/api/v1/", mock_server.uri()), 1);
    let without_slash = processor(format!("{}/api/v1", mock_server.uri()), 1);

    let _: TestData = with_slash.get("/test").await.unwrap();
    let _: TestData = without_slash.get("test").await.unwrap();
}

#[tokio::test]
async fn test_post_sends_json_body() {
    let mock_server = MockServer::start().await;

    let request_data = TestData {
        id: 0,
        name: "New".to_string(),
    };

    Mock::given(method("POST"))
        .and(path("/test"))
        .and(header("content-type", "application/json; charset=utf-8"))
        .and(body_json(&request_data))
        .respond_with(ResponseTemplate::new(201).set_body_json(test_data()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let processor = processor(mock_server.uri(), 3);

    let response = processor
        .call::<_, TestData>(RequestMetadata::new(Method::POST, "/test"), Some(&request_data))
        .await
        .unwrap();

    assert_eq!(response.data, test_data());
    assert_eq!(response.status.as_u16(), 201);
    assert_eq!(response.attempts, 1);
    assert!(!response.was_retried());
    assert!(response.raw_body.contains("Test"));
}

#[tokio::test]
async fn test_server_error_reaches_default_handler_once() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Server error"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let processor = processor(mock_server.uri(), 3);

    let result = processor.get::<TestData>("/test").await;

    match result {
        Err(Error::NonSuccessStatus {
            status,
            body,
            endpoint,
            ..
        }) => {
            assert_eq!(status.as_u16(), 500);
            assert_eq!(body, "Server error");
            assert_eq!(endpoint, "/test");
        }
        _ => panic!("Expected NonSuccessStatus, got {:?}", result),
    }
}

#[tokio::test]
async fn test_unauthorized_triggers_reauthentication() {
    init_tracing();
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/secure"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&mock_server)
        .await;

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let processor = Processor::builder(
        Settings::builder(mock_server.uri())
            .retry_count(2)
            .retry_delay_seconds(0)
            .build()
            .unwrap(),
    )
    .authenticator(move |_: Processor| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        }
    })
    .build()
    .unwrap();

    let result = processor.get::<TestData>("/secure").await;

    assert!(matches!(result, Err(Error::Unauthorized { retry_count: 2, .. })));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_authenticator_fetches_token_through_processor() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "token": "abc123" })),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/secure"))
        .and(header("authorization", "Bearer abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(test_data()))
        .expect(1)
        .mount(&mock_server)
        .await;

    #[derive(Serialize)]
    struct Login<'a> {
        user: &'a str,
    }

    #[derive(Deserialize)]
    struct Token {
        token: String,
    }

    let processor = processor(mock_server.uri(), 1);
    processor.set_authenticator(|processor: Processor| async move {
        match processor
            .post::<_, Token>("/auth/token", &Login { user: "demo" })
            .await
        {
            Ok(token) => processor
                .set_default_header("authorization", format!("Bearer {}", token.token))
                .is_ok(),
            Err(_) => false,
        }
    });

    assert!(processor.authenticate().await);
    let data: TestData = processor.get("/secure").await.unwrap();
    assert_eq!(data, test_data());
}

#[tokio::test]
async fn test_connection_refused_exhausts_retries() {
    let processor = processor("http://127.0.0.1:1", 2);

    let result = processor.get::<TestData>("/test").await;

    match result {
        Err(Error::RetriesExhausted {
            retry_count,
            last_error,
            ..
        }) => {
            assert_eq!(retry_count, 2);
            assert!(last_error.is_retryable());
        }
        _ => panic!("Expected RetriesExhausted, got {:?}", result),
    }
}

#[tokio::test]
async fn test_slow_server_times_out_each_attempt() {
    init_tracing();
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(test_data())
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let processor = Processor::new(
        Settings::builder(mock_server.uri())
            .timeout_seconds(1)
            .retry_count(2)
            .retry_delay_seconds(0)
            .build()
            .unwrap(),
    )
    .unwrap();

    let start = std::time::Instant::now();
    let result = processor.get::<TestData>("/slow").await;

    match result {
        Err(Error::RetriesExhausted { last_error, .. }) => {
            assert!(matches!(
                *last_error,
                Error::Transport(TransportError::Timeout(_))
            ));
        }
        _ => panic!("Expected RetriesExhausted, got {:?}", result),
    }
    assert!(start.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn test_all_http_methods() {
    let mock_server = MockServer::start().await;

    for verb in ["GET", "POST", "PUT", "PATCH"] {
        Mock::given(method(verb))
            .and(path("/test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(test_data()))
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    Mock::given(method("DELETE"))
        .and(path("/test"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let processor = processor(mock_server.uri(), 1);

    let _: TestData = processor.get("/test").await.unwrap();
    let _: TestData = processor.post("/test", &test_data()).await.unwrap();
    let _: TestData = processor.put("/test", &test_data()).await.unwrap();
    let _: TestData = processor.patch("/test", &test_data()).await.unwrap();
    processor.delete_discard("/test").await.unwrap();
}

#[tokio::test]
async fn test_default_and_request_headers() {
    init_tracing();
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .and(header("user-agent", "test-agent"))
        .and(header("x-request-id", "42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(test_data()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let processor = Processor::builder(Settings::builder(mock_server.uri()).build().unwrap())
        .default_header("User-Agent", "test-agent")
        .unwrap()
        .build()
        .unwrap();

    let metadata = RequestMetadata::new(Method::GET, "/test")
        .with_header("x-request-id", "42")
        .unwrap();
    let response = processor.call::<(), TestData>(metadata, None).await.unwrap();
    assert_eq!(response.data, test_data());
}

#[tokio::test]
async fn test_delete_with_body_and_request_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/test/1"))
        .and(header("x-reason", "duplicate"))
        .and(body_json(test_data()))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let processor = processor(mock_server.uri(), 1);

    processor
        .request(Method::DELETE, "/test/1")
        .header("x-reason", "duplicate")
        .json(&test_data())
        .send_discard()
        .await
        .unwrap();
}
