//! PrometheusClient against a one-shot HTTP server on localhost.

use std::time::Duration;

use chrono::{TimeZone, Utc};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use kubernetes_prometheus_publisher::catalog::MetricDescriptor;
use kubernetes_prometheus_publisher::prometheus::{
    MetricsBackend, PrometheusClient, PrometheusClientConfig, QueryBuilder, RangeQuery, TimeWindow,
};
use kubernetes_prometheus_publisher::QueryError;

/// What the fake server saw.
#[derive(Debug)]
struct Seen {
    path: String,
    headers: Vec<(String, String)>,
}

impl Seen {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Serve exactly one request with `status` and `body`.
async fn serve_once(status: u16, body: &'static str) -> (String, JoinHandle<Seen>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        let seen = loop {
            let n = sock.read(&mut chunk).await.unwrap();
            assert!(n > 0, "client closed before sending headers");
            buf.extend_from_slice(&chunk[..n]);

            let mut headers = [httparse::EMPTY_HEADER; 32];
            let mut req = httparse::Request::new(&mut headers);
            if let httparse::Status::Complete(_) = req.parse(&buf).unwrap() {
                break Seen {
                    path: req.path.unwrap_or_default().to_string(),
                    headers: req
                        .headers
                        .iter()
                        .map(|h| (h.name.to_string(), String::from_utf8_lossy(h.value).into_owned()))
                        .collect(),
                };
            }
        };

        let reason = if status == 200 { "OK" } else { "Error" };
        let resp = format!(
            "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        sock.write_all(resp.as_bytes()).await.unwrap();
        sock.shutdown().await.ok();
        seen
    });

    (base, handle)
}

fn query() -> RangeQuery {
    let end = Utc.with_ymd_and_hms(2020, 9, 13, 12, 26, 40).unwrap();
    let window = TimeWindow::ending_at(end, Duration::from_secs(20), "20s");
    QueryBuilder::default().build(&MetricDescriptor::gauge("container_memory_usage_bytes", "bytes"), &window)
}

fn client(base: &str) -> PrometheusClient {
    PrometheusClient::new(PrometheusClientConfig::new(base)).unwrap()
}

const MATRIX: &str = r#"{"status":"success","data":{"resultType":"matrix","result":[
    {"metric":{"label_vim_id":"abc123","pod":"web-0","label_ow_action":"web"},
     "values":[[1599999980,"10"],[1600000000,"12"]]}]}}"#;

// -- Success -------------------------------------------------------------------

#[tokio::test]
async fn test_query_range_parses_matrix() {
    let (base, server) = serve_once(200, MATRIX).await;
    let data = client(&base).query_range(&query()).await.unwrap();

    assert!(data.is_matrix());
    assert_eq!(data.result.len(), 1);
    assert_eq!(data.result[0].label("label_vim_id"), Some("abc123"));
    assert_eq!(data.result[0].latest(), Some(&(1600000000.0, "12".to_string())));

    let seen = server.await.unwrap();
    assert!(seen.path.starts_with("/api/v1/query_range?"), "path {}", seen.path);
    assert!(seen.path.contains("step=20s"), "path {}", seen.path);
    assert!(seen.path.contains("start=2020-09-13T12%3A26%3A20.000000Z"), "path {}", seen.path);
    assert!(seen.path.contains("end=2020-09-13T12%3A26%3A40.000000Z"), "path {}", seen.path);
    assert!(seen.path.contains("avg_over_time"), "path {}", seen.path);
    assert_eq!(seen.header("accept"), Some("application/json"));
    assert_eq!(seen.header("authorization"), None);
}

#[tokio::test]
async fn test_bearer_token_is_sent() {
    let (base, server) = serve_once(200, MATRIX).await;
    let mut cfg = PrometheusClientConfig::new(&base);
    cfg.bearer_token = Some("t0ken".into());
    PrometheusClient::new(cfg).unwrap().query_range(&query()).await.unwrap();

    let seen = server.await.unwrap();
    assert_eq!(seen.header("authorization"), Some("Bearer t0ken"));
}

#[tokio::test]
async fn test_non_success_status_still_returns_data() {
    let body = r#"{"status":"error","data":{"resultType":"matrix","result":[
        {"metric":{"label_vim_id":"abc123"},"values":[[1600000000,"3"]]}]}}"#;
    let (base, server) = serve_once(200, body).await;
    let data = client(&base).query_range(&query()).await.unwrap();
    server.await.unwrap();
    assert_eq!(data.result.len(), 1);
}

// -- Failures ------------------------------------------------------------------

#[tokio::test]
async fn test_http_500_is_http_error() {
    let (base, server) = serve_once(500, r#"{"status":"error","error":"query timed out"}"#).await;
    let err = client(&base).query_range(&query()).await.unwrap_err();
    server.await.unwrap();

    match err {
        QueryError::Http { status, body, .. } => {
            assert_eq!(status, 500);
            assert!(body.contains("query timed out"), "body {body}");
        }
        other => panic!("expected Http, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_body_is_decode_error() {
    let (base, server) = serve_once(200, "<html>not json</html>").await;
    let err = client(&base).query_range(&query()).await.unwrap_err();
    server.await.unwrap();

    assert!(matches!(err, QueryError::Decode { .. }), "got {err:?}");
    assert!(!err.is_transport());
}

#[tokio::test]
async fn test_missing_data_is_decode_error() {
    let (base, server) = serve_once(200, r#"{"status":"success"}"#).await;
    let err = client(&base).query_range(&query()).await.unwrap_err();
    server.await.unwrap();
    assert!(matches!(err, QueryError::Decode { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_refused_connection_is_connect_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let err = client(&base).query_range(&query()).await.unwrap_err();
    assert!(matches!(err, QueryError::Connect { .. }), "got {err:?}");
    assert!(err.is_transport());
}
