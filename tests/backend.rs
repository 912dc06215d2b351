//! Backend Client Integration Tests
//!
//! Talks to a one-shot HTTP server on localhost that returns a canned reply.

use parley::adapters::{HttpResponseSource, ResponseSource};
use parley::core::VoiceError;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Serve one request with `status` and `body`; resolves to the raw request
async fn canned_server(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();

        request
    });

    (base_url, server)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut raw = Vec::new();
    let mut chunk = [0u8; 1024];

    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        raw.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&raw);
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if raw.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }

    String::from_utf8(raw).unwrap()
}

#[tokio::test]
async fn test_reply_text_is_returned() {
    let (base_url, server) = canned_server("200 OK", r#"{"response": "It is sunny."}"#).await;
    let source = HttpResponseSource::new(&base_url, "/process-voice");

    let reply = source.send("what's the weather").await.unwrap();
    assert_eq!(reply.as_str(), "It is sunny.");

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /process-voice HTTP/1.1"));
    assert!(request.to_ascii_lowercase().contains("content-type: application/json"));
    assert!(request.ends_with(r#"{"text":"what's the weather"}"#));
}

#[tokio::test]
async fn test_error_field_is_surfaced_verbatim() {
    let (base_url, server) = canned_server("200 OK", r#"{"error": "Model overloaded"}"#).await;
    let source = HttpResponseSource::new(&base_url, "/process-voice");

    let error = source.send("hello").await.unwrap_err();
    assert_eq!(error, VoiceError::application("Model overloaded"));
    assert_eq!(error.to_string(), "Model overloaded");

    server.await.unwrap();
}

#[tokio::test]
async fn test_non_success_status_is_a_server_error() {
    let (base_url, server) =
        canned_server("500 Internal Server Error", r#"{"error": "boom"}"#).await;
    let source = HttpResponseSource::new(&base_url, "/process-voice");

    let error = source.send("hello").await.unwrap_err();
    assert_eq!(error, VoiceError::Server { status: 500 });
    assert_eq!(
        error.to_string(),
        "Failed to get response from server (status 500)"
    );

    server.await.unwrap();
}

#[tokio::test]
async fn test_unparseable_body_is_an_application_error() {
    let (base_url, server) = canned_server("200 OK", "<html>oops</html>").await;
    let source = HttpResponseSource::new(&base_url, "/process-voice");

    let error = source.send("hello").await.unwrap_err();
    assert_eq!(error, VoiceError::application("Malformed response from server"));

    server.await.unwrap();
}

#[tokio::test]
async fn test_unreachable_backend_is_a_network_error() {
    // Bind then drop to get a port nobody listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let source = HttpResponseSource::new(&format!("http://{}", addr), "/process-voice");
    let error = source.send("hello").await.unwrap_err();

    assert!(matches!(error, VoiceError::Network(_)));
}

#[tokio::test]
async fn test_blank_input_never_reaches_the_network() {
    // Port 9 (discard) would fail with a network error if contacted
    let source = HttpResponseSource::new("http://127.0.0.1:9", "/process-voice");

    let error = source.send("   ").await.unwrap_err();
    assert_eq!(error, VoiceError::application("No input provided"));
}
