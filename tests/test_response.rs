use nightjar::gemini::connection::ConnectionInfo;
use nightjar::gemini::response::Response;
use nightjar::gemini::status::{Status, StatusFamily};

fn info() -> ConnectionInfo {
    ConnectionInfo::new(
        "127.0.0.1:50000".parse().unwrap(),
        "127.0.0.1:1965".parse().unwrap(),
        None,
    )
}

#[test]
fn test_status_code_as_u16() {
    assert_eq!(Status::Input.as_u16(), 10);
    assert_eq!(Status::Success.as_u16(), 20);
    assert_eq!(Status::RedirectTemporary.as_u16(), 30);
    assert_eq!(Status::TemporaryFailure.as_u16(), 40);
    assert_eq!(Status::CgiError.as_u16(), 42);
    assert_eq!(Status::PermanentFailure.as_u16(), 50);
    assert_eq!(Status::NotFound.as_u16(), 51);
    assert_eq!(Status::ClientCertificateRequired.as_u16(), 60);
}

#[test]
fn test_status_code_from_u16() {
    for code in [10, 11, 20, 30, 31, 40, 41, 42, 43, 44, 50, 51, 52, 53, 59, 60, 61, 62] {
        let status = Status::from_u16(code);
        assert!(!matches!(status, Status::Other(_)), "code {code}");
        assert_eq!(status.as_u16(), code);
    }
    assert_eq!(Status::from_u16(29), Status::Other(29));
}

#[test]
fn test_status_family() {
    assert_eq!(Status::SensitiveInput.family(), Some(StatusFamily::Input));
    assert_eq!(Status::Other(25).family(), Some(StatusFamily::Success));
    assert_eq!(Status::CgiError.family(), Some(StatusFamily::TemporaryFailure));
    assert_eq!(Status::Other(99).family(), None);

    assert!(Status::Success.is_success());
    assert!(Status::NotFound.is_failure());
    assert!(!Status::Input.is_failure());
}

#[test]
fn test_status_display() {
    assert_eq!(Status::NotFound.to_string(), "51");
    assert_eq!(Status::Other(27).to_string(), "27");
}

#[tokio::test]
async fn test_response_status_line_format() {
    let info = info();
    let mut out: Vec<u8> = Vec::new();
    let mut response = Response::new(&mut out, &info);

    response.set_status(Status::Input, "Enter a search term").await.unwrap();
    assert!(response.is_committed());
    drop(response);

    assert_eq!(out, b"10 Enter a search term\r\n");
}

#[tokio::test]
async fn test_response_header_then_body() {
    let info = info();
    let mut out: Vec<u8> = Vec::new();
    let mut response = Response::new(&mut out, &info);

    response.set_status(Status::Success, "text/plain; charset=utf-8").await.unwrap();
    assert_eq!(response.write(b"line one\n").await.unwrap(), 9);
    response.write(b"line two\n").await.unwrap();
    drop(response);

    assert_eq!(out, b"20 text/plain; charset=utf-8\r\nline one\nline two\n");
}

#[tokio::test]
async fn test_response_status_is_written_once() {
    let info = info();
    let mut out: Vec<u8> = Vec::new();
    let mut response = Response::new(&mut out, &info);

    response.set_status(Status::Success, "text/gemini").await.unwrap();
    response.set_status(Status::PermanentFailure, "oops").await.unwrap();

    // The log sees the last status, the wire only the first.
    assert_eq!(response.status(), Some(Status::PermanentFailure));
    assert_eq!(response.meta(), "oops");
    drop(response);

    assert_eq!(out, b"20 text/gemini\r\n");
}

#[tokio::test]
async fn test_response_empty_meta() {
    let info = info();
    let mut out: Vec<u8> = Vec::new();
    let mut response = Response::new(&mut out, &info);

    response.set_status(Status::NotFound, "").await.unwrap();
    drop(response);

    assert_eq!(out, b"51 \r\n");
}
