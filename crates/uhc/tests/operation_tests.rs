//! Tests for building operation descriptors.

use futures_util::stream;
use uhc::{DEFAULT_CONTENT_TYPE, Error, KeyKind, Method, Operation, RequestBody};

#[test]
fn test_builder_chain() {
    let op = Operation::builder()
        .post()
        .path("/api/users")
        .query("page", "1")
        .unwrap()
        .query_values("fields", ["id", "name"])
        .unwrap()
        .header("Authorization", "Bearer token123")
        .unwrap()
        .body(r#"{"name":"John"}"#)
        .on_200_buffered(|_, _| {})
        .unwrap()
        .on_finally(|| {})
        .build()
        .expect("Failed to build operation");

    assert_eq!(op.method(), Method::Post);
    assert_eq!(op.path(), "/api/users");
    assert_eq!(op.query().len(), 2);
    assert_eq!(op.query_values("page"), Some(&["1".to_string()][..]));
    assert_eq!(op.headers()["authorization"], "Bearer token123");
    assert_eq!(op.body().content_type(), Some(DEFAULT_CONTENT_TYPE));
    assert!(op.has_finally());
    assert!(!op.is_streaming());
}

#[test]
fn test_all_methods() {
    let build = |b: uhc::OperationBuilder| b.on_200_buffered(|_, _| {}).unwrap().build().unwrap();

    assert_eq!(build(Operation::builder().get()).method(), Method::Get);
    assert_eq!(build(Operation::builder().post()).method(), Method::Post);
    assert_eq!(build(Operation::builder().put()).method(), Method::Put);
    assert_eq!(build(Operation::builder().delete()).method(), Method::Delete);
    assert_eq!(Method::Delete.to_string(), "DELETE");
}

#[test]
fn test_duplicate_query_key() {
    let err = Operation::builder()
        .query("q", "a")
        .unwrap()
        .query("q", "b")
        .unwrap_err();

    match err {
        Error::DuplicateKey { kind, key } => {
            assert_eq!(kind, KeyKind::Query);
            assert_eq!(key, "q");
        }
        other => panic!("Expected duplicate key, got {other:?}"),
    }
}

#[test]
fn test_duplicate_header_key() {
    let err = Operation::builder()
        .header("X-Id", "1")
        .unwrap()
        .header("X-Id", "2")
        .unwrap_err();

    assert!(matches!(
        err,
        Error::DuplicateKey {
            kind: KeyKind::Header,
            ..
        }
    ));
    assert!(err.is_construction());
}

#[test]
fn test_conflicting_success_handlers() {
    let buffered_first = Operation::builder()
        .on_200_buffered(|_, _| {})
        .unwrap()
        .on_200_streaming(|_| |_: &[u8]| {});
    assert!(matches!(buffered_first, Err(Error::ConflictingHandler)));

    let streaming_first = Operation::builder()
        .on_200_streaming(|_| |_: &[u8]| {})
        .unwrap()
        .on_200_buffered(|_, _| {});
    assert!(matches!(streaming_first, Err(Error::ConflictingHandler)));
}

#[test]
fn test_missing_success_handler() {
    let result = Operation::builder().get().path("/x").build();
    assert!(matches!(result, Err(Error::MissingSuccessHandler)));
}

#[test]
fn test_stream_body() {
    let chunks = vec![
        Ok(bytes::Bytes::from_static(b"a")),
        Ok(bytes::Bytes::from_static(b"b")),
    ];
    let op = Operation::builder()
        .put()
        .body_stream_with_type(stream::iter(chunks), "application/octet-stream")
        .on_200_buffered(|_, _| {})
        .unwrap()
        .build()
        .unwrap();

    match op.body() {
        RequestBody::Stream { content_type, .. } => {
            assert_eq!(content_type, "application/octet-stream");
        }
        other => panic!("Expected stream body, got {other:?}"),
    }
}

#[test]
fn test_into_parts() {
    let op = Operation::builder()
        .delete()
        .path("/items/3")
        .on_200_streaming(|_| |_: &[u8]| {})
        .unwrap()
        .build()
        .unwrap();

    let (request, handlers) = op.into_parts();
    assert_eq!(request.method, Method::Delete);
    assert_eq!(request.path, "/items/3");
    assert!(handlers.is_streaming());
}
