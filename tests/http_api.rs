//! HTTP 接口集成测试

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use graphrest::config::ServerConfig;
use graphrest::registry::QueryRegistry;
use graphrest::server::build_router;
use graphrest::{MemoryGraph, QueryService};
use std::sync::Arc;
use tower::ServiceExt;

const WRITE_QUERY: &str = "create (n:Node {name:{name}}) return n";
const CSV_QUERY: &str = "create (n {name:{name}}) return n";
const CSV_QUERY_COLS: &str = "create (n {name:{name},age:{age},male:{male}}) return n";
const UPDATE_QUERY: &str = "match (n) where id(n) = {id} SET n.name={name} return n";

fn app() -> (Arc<MemoryGraph>, Router) {
    let graph = MemoryGraph::shared();
    let service = Arc::new(QueryService::new(graph.clone(), QueryRegistry::new()));
    (graph, build_router(service, &ServerConfig::default()))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

async fn put(app: &Router, key: &str, query: &str) -> StatusCode {
    let request = Request::builder()
        .method("PUT")
        .uri(format!("/{}", key))
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from(query.to_string()))
        .unwrap();
    send(app, request).await.0
}

async fn get(app: &Router, uri: &str) -> (StatusCode, String) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

async fn post_json(app: &Router, uri: &str, body: &str) -> (StatusCode, String) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

async fn post_csv(app: &Router, uri: &str, body: &str) -> (StatusCode, String) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

async fn seed_people(app: &Router) {
    assert_eq!(
        put(
            app,
            "seed",
            "CREATE (:Person {name: 'Andres'}), (:Person {name: 'Peter'})"
        )
        .await,
        StatusCode::CREATED
    );
    assert_eq!(post_json(app, "/seed", "{}").await.0, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_unknown_key_is_not_found() {
    let (_, app) = app();
    assert_eq!(get(&app, "/foo?id=123").await.0, StatusCode::NOT_FOUND);
    assert_eq!(
        post_json(&app, "/foo", r#"{"id": 123}"#).await.0,
        StatusCode::NOT_FOUND
    );
    assert_eq!(post_csv(&app, "/foo", "id\n123\n").await.0, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_single_node() {
    let (_, app) = app();
    put(&app, "seed", "CREATE (n {foo: 'bar'})").await;
    post_json(&app, "/seed", "{}").await;

    put(&app, "foo", "MATCH (n) WHERE id(n) = $id RETURN n").await;
    let (status, body) = get(&app, "/foo?id=0").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"foo":"bar"}"#);
}

#[tokio::test]
async fn test_get_no_results() {
    let (_, app) = app();
    put(&app, "foo", "MATCH (n) WHERE id(n) IN $ids RETURN n").await;
    let (status, body) = get(&app, "/foo?ids=-234&ids=-567").await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_get_repeated_params_become_list() {
    let (_, app) = app();
    seed_people(&app).await;

    put(&app, "foo", "MATCH (n) WHERE id(n) IN $ids RETURN n").await;
    let (status, body) = get(&app, "/foo?ids=0&ids=1").await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body, r#"[{"name":"Andres"},{"name":"Peter"}]"#);

    put(
        &app,
        "cols",
        "MATCH (n) WHERE id(n) IN $ids RETURN length(n.name) AS l, n.name AS name",
    )
    .await;
    let (_, body) = get(&app, "/cols?ids=0&ids=1").await;
    assert_eq!(body, r#"[{"l":6,"name":"Andres"},{"l":5,"name":"Peter"}]"#);

    // 只出现一次的 ids 是标量，按单元素列表匹配
    let (status, body) = get(&app, "/cols?ids=0").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"l":6,"name":"Andres"}"#);
}

#[tokio::test]
async fn test_get_write_query_is_not_acceptable() {
    let (graph, app) = app();
    put(&app, "foo", WRITE_QUERY).await;
    let (status, _) = get(&app, "/foo?name=foobar").await;
    assert_eq!(status, StatusCode::NOT_ACCEPTABLE);
    assert_eq!(graph.node_count(), 0);
}

#[tokio::test]
async fn test_post_single_object() {
    let (graph, app) = app();
    put(&app, "foo", WRITE_QUERY).await;
    let (status, body) = post_json(&app, "/foo", r#"{"name": "foobar"}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"name":"foobar"}"#);
    assert_eq!(graph.node_count(), 1);
}

#[tokio::test]
async fn test_post_multi_objects() {
    let (_, app) = app();
    put(&app, "seed", "CREATE (n {name: 'bar'})").await;
    post_json(&app, "/seed", "{}").await;
    put(&app, "foo", UPDATE_QUERY).await;

    let (status, body) = post_json(
        &app,
        "/foo",
        r#"[{"id": 0, "name": "Neo"}, {"id": -234, "name": "Neo2"}]"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"[{"name":"Neo"},null]"#);

    let (status, body) = post_json(
        &app,
        "/foo",
        r#"[{"id": -234, "name": "Neo"}, {"id": -234, "name": "Neo"}]"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "[null,null]");

    let (status, _) = post_json(&app, "/foo", r#"{"id": -234, "name": "Neo"}"#).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_post_bad_input() {
    let (_, app) = app();
    put(&app, "foo", WRITE_QUERY).await;
    assert_eq!(
        post_json(&app, "/foo", "not json").await.0,
        StatusCode::BAD_REQUEST
    );
    assert_eq!(post_json(&app, "/foo", "[1, 2]").await.0, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_post_engine_error_keeps_message() {
    let (_, app) = app();
    put(&app, "foo", WRITE_QUERY).await;
    let (status, body) = post_json(&app, "/foo", r#"{"other": 1}"#).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "Expected a parameter named name");
}

#[tokio::test]
async fn test_post_csv_multi_line() {
    let (graph, app) = app();
    put(&app, "foo", CSV_QUERY).await;
    let (status, body) = post_csv(&app, "/foo?batch=2", "name\nfoo\nbar\nfoobar\n").await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(
        body,
        r#"{"nodes_created":3,"nodes_deleted":0,"relationships_created":0,"relationships_deleted":0,"labels_added":0,"labels_removed":0,"properties_set":3,"rows":3}"#
    );
    assert_eq!(graph.node_count(), 3);
}

#[tokio::test]
async fn test_post_csv_columns_with_tabs() {
    let (_, app) = app();
    put(&app, "foo", CSV_QUERY_COLS).await;
    let (status, body) = post_csv(&app, "/foo?delim=%09", "name\tage\tmale\nAndres\t21\ttrue\n").await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let stats: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(stats["nodes_created"], 1);
    assert_eq!(stats["properties_set"], 3);
    assert_eq!(stats["rows"], 1);
    assert_eq!(stats["relationships_created"], 0);
}

#[tokio::test]
async fn test_post_csv_field_mismatch_keeps_committed_chunks() {
    let (graph, app) = app();
    put(&app, "foo", CSV_QUERY).await;
    let (status, _) = post_csv(&app, "/foo?batch=1", "name\nfirst\nsecond,extra\n").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(graph.node_count(), 1);

    let (status, _) = post_csv(&app, "/foo?delim=ab", "name\nx\n").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    put(&app, "pair", "create (n {a:{a}, b:{b}}) return n").await;
    let (status, _) = post_csv(&app, "/pair", "a,b\nx,y\n\nz,w\n").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(graph.node_count(), 1);
}

#[tokio::test]
async fn test_delete_endpoint() {
    let (_, app) = app();
    put(&app, "foo", WRITE_QUERY).await;
    let request = Request::builder()
        .method("DELETE")
        .uri("/foo")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app, request).await.0, StatusCode::OK);

    let request = Request::builder()
        .method("DELETE")
        .uri("/foo")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app, request).await.0, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_and_metrics() {
    let (_, app) = app();
    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""status":"ok""#));

    put(&app, "foo", "MATCH (n) RETURN n").await;
    get(&app, "/foo").await;
    let (status, body) = get(&app, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("graphrest_queries_total 1\n"));
}
