use nightjar::gemini::parser::{DecodeError, read_request};
use nightjar::gemini::request::Scheme;
use nightjar::gemini::status::Status;
use tokio::io::AsyncWriteExt;

async fn decode(raw: &[u8]) -> Result<nightjar::gemini::request::Request, DecodeError> {
    read_request(raw).await
}

#[tokio::test]
async fn test_parse_simple_gemini_request() {
    let request = decode(b"gemini://example.org/docs/index.gmi\r\n").await.unwrap();

    assert_eq!(request.scheme, Scheme::Gemini);
    assert_eq!(request.url.as_str(), "gemini://example.org/docs/index.gmi");
    assert_eq!(request.host(), Some("example.org"));
    assert_eq!(request.path(), "/docs/index.gmi");
    assert!(request.payload.is_empty());
}

#[tokio::test]
async fn test_parse_port_and_query() {
    let request = decode(b"gemini://example.org:1966/search?rust%20lang\r\n")
        .await
        .unwrap();

    assert_eq!(request.port(), Some(1966));
    assert_eq!(request.query(), Some("rust%20lang"));
}

#[tokio::test]
async fn test_bare_lf_terminator_is_accepted() {
    let request = decode(b"gemini://example.org/\n").await.unwrap();
    assert_eq!(request.url.as_str(), "gemini://example.org/");
}

#[tokio::test]
async fn test_gemini_line_keeps_spaces_in_url_untouched() {
    // No payload splitting for the base scheme; the url parser encodes the space.
    let request = decode(b"gemini://example.org/a b\r\n").await.unwrap();
    assert_eq!(request.path(), "/a%20b");
    assert!(request.payload.is_empty());
}

#[tokio::test]
async fn test_nimigem_payload_is_percent_decoded() {
    let request = decode(b"nimigem://example.org/post hello%20world%0A\r\n")
        .await
        .unwrap();

    assert_eq!(request.scheme, Scheme::Nimigem);
    assert_eq!(request.url.as_str(), "nimigem://example.org/post");
    assert_eq!(&request.payload[..], b"hello world\n");
}

#[tokio::test]
async fn test_nimigem_without_payload() {
    let request = decode(b"nimigem://example.org/post\r\n").await.unwrap();

    assert_eq!(request.url.as_str(), "nimigem://example.org/post");
    assert!(!request.has_payload());
}

#[tokio::test]
async fn test_bad_payload_encoding_is_permanent_failure() {
    let err = decode(b"nimigem://example.org/post 100%zz\r\n").await.unwrap_err();

    assert!(matches!(err, DecodeError::Payload(_)));
    assert_eq!(err.status(), Status::PermanentFailure);
}

#[tokio::test]
async fn test_unsupported_scheme_is_rejected_from_snippet() {
    // Only the snippet is available; a line read would fail with an I/O error.
    let err = decode(b"https://ex").await.unwrap_err();

    assert!(matches!(err, DecodeError::UnsupportedScheme(ref s) if s == "https"));
    assert_eq!(err.status(), Status::PermanentFailure);
    assert!(err.meta().contains("Only gemini and nimigem"));
}

#[tokio::test]
async fn test_unsupported_scheme_does_not_wait_for_more_input() {
    let (mut client, server) = tokio::io::duplex(64);
    client.write_all(b"gopher://h").await.unwrap();

    // The client keeps the stream open; decoding must not block on it.
    let err = read_request(server).await.unwrap_err();
    assert!(matches!(err, DecodeError::UnsupportedScheme(_)));
}

#[tokio::test]
async fn test_short_request_is_transport_error() {
    let err = decode(b"gemini:").await.unwrap_err();

    assert!(matches!(err, DecodeError::Io(_)));
    assert_eq!(err.status(), Status::TemporaryFailure);
}

#[tokio::test]
async fn test_invalid_url_is_permanent_failure() {
    let err = decode(b"gemini://exa mple.org/\r\n").await.unwrap_err();

    assert!(matches!(err, DecodeError::Url(_)));
    assert_eq!(err.status(), Status::PermanentFailure);
}

#[tokio::test]
async fn test_invalid_utf8_is_permanent_failure() {
    let err = decode(b"gemini://example.org/\xff\xfe\r\n").await.unwrap_err();
    assert!(matches!(err, DecodeError::InvalidUtf8));
}

#[tokio::test]
async fn test_gemini_request_at_size_limit() {
    let prefix = "gemini://example.org/";
    let line = format!("{prefix}{}", "a".repeat(1024 - prefix.len()));
    assert_eq!(line.len(), 1024);

    let request = decode(format!("{line}\r\n").as_bytes()).await.unwrap();
    assert_eq!(request.url.as_str(), line);
}

#[tokio::test]
async fn test_gemini_request_over_size_limit_overflows() {
    let prefix = "gemini://example.org/";
    for len in [1025, 1026, 1100, 5000] {
        let line = format!("{prefix}{}", "a".repeat(len - prefix.len()));
        let err = decode(format!("{line}\r\n").as_bytes()).await.unwrap_err();
        assert!(err.is_overflow(), "len {len} gave {err:?}");
        assert_eq!(err.meta(), "Request too long!");
    }
}

#[tokio::test]
async fn test_overflow_without_terminator_is_still_overflow() {
    let raw = format!("gemini://example.org/{}", "a".repeat(4000));
    let err = decode(raw.as_bytes()).await.unwrap_err();
    assert!(err.is_overflow());
}

#[tokio::test]
async fn test_nimigem_allows_larger_requests() {
    let payload = "x".repeat(10_000);
    let raw = format!("nimigem://example.org/post {payload}\r\n");
    assert!(raw.len() > 1024);

    let request = decode(raw.as_bytes()).await.unwrap();
    assert_eq!(request.payload.len(), 10_000);
}

#[tokio::test]
async fn test_nimigem_over_size_limit_overflows() {
    let raw = format!("nimigem://example.org/post {}\r\n", "x".repeat(15_360));
    let err = decode(raw.as_bytes()).await.unwrap_err();
    assert!(matches!(err, DecodeError::TooLong { limit: 15360 }));
}
