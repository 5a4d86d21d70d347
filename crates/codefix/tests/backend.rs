#[cfg(unix)]
mod unix {
    use std::time::Duration;

    use codefix::{
        diagnose, CommandSpec, DiagnoseClient, DiagnoseError, Diagnosis, DiagnosisOutcome,
        ErrorKind, StdoutMode,
    };
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::{TcpListener, TcpStream},
    };
    use wiremock::{
        matchers::{body_json, header, method, path},
        Mock, MockServer, Request, Respond, ResponseTemplate,
    };

    const DIAGNOSE_PATH: &str = "/api/diagnose";

    /// Answers with whatever stderr the request carried.
    struct EchoStderr;

    impl Respond for EchoStderr {
        fn respond(&self, request: &Request) -> ResponseTemplate {
            let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
            ResponseTemplate::new(200).set_body_json(json!({ "diagnosis": body["stderr"] }))
        }
    }

    fn client_for(server: &MockServer) -> DiagnoseClient {
        DiagnoseClient::builder()
            .backend_url(format!("{}{DIAGNOSE_PATH}", server.uri()))
            .http_timeout(Duration::from_secs(5))
            .stdout(StdoutMode::Discard)
            .build()
            .expect("client")
    }

    fn failing_command() -> CommandSpec {
        CommandSpec::shell("echo boom >&2; exit 1")
    }

    #[tokio::test]
    async fn posts_exact_payload_and_prints_text_diagnosis() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(DIAGNOSE_PATH))
            .and(header("content-type", "application/json"))
            .and(body_json(json!({
                "filename": "last-run.out",
                "language": "bash",
                "code": "",
                "stderr": "boom\n",
                "mode": "quick",
                "persona": "expert",
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"diagnosis": "Fix your syntax"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let outcome = client_for(&server).run(&failing_command()).await;

        assert!(outcome.is_success(), "{}", outcome.render());
        assert_eq!(
            outcome.diagnosis(),
            Some(&Diagnosis::Text("Fix your syntax".to_string()))
        );
        assert_eq!(outcome.render(), "Diagnosis:\nFix your syntax");
        let DiagnosisOutcome::Diagnosed(report) = outcome else {
            unreachable!("checked above");
        };
        assert_eq!(report.run.exit_code(), Some(1));
    }

    #[tokio::test]
    async fn payload_has_six_string_keys_with_custom_labels() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(DIAGNOSE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"diagnosis": "ok"})))
            .mount(&server)
            .await;

        let client = DiagnoseClient::builder()
            .backend_url(format!("{}{DIAGNOSE_PATH}", server.uri()))
            .filename("main.py")
            .language("python")
            .stdout(StdoutMode::Discard)
            .build()
            .expect("client");
        client
            .diagnose(&CommandSpec::shell("echo 'not captured'"))
            .await
            .expect("diagnosis");

        let requests = server.received_requests().await.expect("recording enabled");
        assert_eq!(requests.len(), 1);
        let body: Value = serde_json::from_slice(&requests[0].body).expect("json body");
        let object = body.as_object().expect("object body");
        assert_eq!(object.len(), 6);
        assert!(object.values().all(Value::is_string), "{body}");
        assert_eq!(body["filename"], "main.py");
        assert_eq!(body["language"], "python");
        assert_eq!(body["stderr"], "");
        assert_eq!(body["code"], "");
        assert_eq!(body["mode"], "quick");
        assert_eq!(body["persona"], "expert");
    }

    #[tokio::test]
    async fn round_trip_through_echoing_backend() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(DIAGNOSE_PATH))
            .respond_with(EchoStderr)
            .mount(&server)
            .await;

        let report = diagnose(
            &failing_command(),
            &format!("{}{DIAGNOSE_PATH}", server.uri()),
            "last-run.out",
            "bash",
        )
        .await
        .expect("diagnosis");

        assert!(report.diagnosis.to_string().contains("boom"));
        assert!(!report.run.success());
    }

    #[tokio::test]
    async fn structured_diagnosis_is_rendered_in_sections() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(DIAGNOSE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "diagnosis": {
                    "summary": "`boom` is not a command",
                    "root_cause": "The script calls an undefined function.",
                    "fix": "Define boom() before calling it.",
                    "patch": ""
                }
            })))
            .mount(&server)
            .await;

        let outcome = client_for(&server).run(&failing_command()).await;
        assert_eq!(
            outcome.render(),
            "Diagnosis:\nSummary:\n`boom` is not a command\n\n\
             Root cause:\nThe script calls an undefined function.\n\n\
             Fix:\nDefine boom() before calling it."
        );
    }

    #[tokio::test]
    async fn server_error_is_reported_as_backend_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(DIAGNOSE_PATH))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(json!({"detail": "Groq API error: quota exceeded"})),
            )
            .mount(&server)
            .await;

        let outcome = client_for(&server).run(&failing_command()).await;

        assert!(!outcome.is_success());
        assert!(outcome.diagnosis().is_none());
        let err = outcome.error().expect("error");
        assert_eq!(err.kind(), ErrorKind::Backend);
        match err {
            DiagnoseError::BackendStatus { status, detail } => {
                assert_eq!(status.as_u16(), 500);
                assert_eq!(detail, "Groq API error: quota exceeded");
            }
            other => panic!("expected BackendStatus, got {other:?}"),
        }
        assert!(outcome.render().starts_with("Error (backend):"));
    }

    #[tokio::test]
    async fn malformed_success_body_is_a_backend_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(DIAGNOSE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("all good"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .diagnose(&failing_command())
            .await
            .expect_err("malformed");
        assert!(matches!(err, DiagnoseError::MalformedResponse { .. }), "{err:?}");
        assert_eq!(err.kind(), ErrorKind::Backend);
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_network_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);

        let client = DiagnoseClient::builder()
            .backend_url(format!("http://127.0.0.1:{port}{DIAGNOSE_PATH}"))
            .stdout(StdoutMode::Discard)
            .build()
            .expect("client");
        let outcome = client.run(&failing_command()).await;

        assert!(outcome.diagnosis().is_none());
        assert_eq!(outcome.error().map(DiagnoseError::kind), Some(ErrorKind::Network));
        let text = outcome.render();
        assert!(text.starts_with("Error (network):"), "{text}");
        assert!(!text.contains("Diagnosis:"), "{text}");
    }

    /// Reads one full HTTP request (headers plus `Content-Length` body) off `stream`.
    async fn read_request(stream: &mut TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = stream.read(&mut chunk).await.expect("read request");
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let body_len = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + body_len {
                return;
            }
        }
    }

    #[tokio::test]
    async fn truncated_error_body_is_still_a_backend_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.expect("accept");
            read_request(&mut stream).await;
            stream
                .write_all(b"HTTP/1.1 502 Bad Gateway\r\nContent-Length: 100\r\n\r\npartial")
                .await
                .expect("write response");
            let _ = stream.shutdown().await;
        });

        let client = DiagnoseClient::builder()
            .backend_url(format!("http://127.0.0.1:{port}{DIAGNOSE_PATH}"))
            .http_timeout(Duration::from_secs(5))
            .stdout(StdoutMode::Discard)
            .build()
            .expect("client");
        let err = client
            .diagnose(&failing_command())
            .await
            .expect_err("502");
        server.await.expect("server task");

        assert_eq!(err.kind(), ErrorKind::Backend);
        match err {
            DiagnoseError::BackendStatus { status, detail } => {
                assert_eq!(status.as_u16(), 502);
                assert!(detail.starts_with("<unreadable body"), "{detail}");
            }
            other => panic!("expected backend status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_backend_hits_http_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(DIAGNOSE_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"diagnosis": "too late"}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let client = DiagnoseClient::builder()
            .backend_url(format!("{}{DIAGNOSE_PATH}", server.uri()))
            .http_timeout(Duration::from_millis(200))
            .stdout(StdoutMode::Discard)
            .build()
            .expect("client");
        let err = client
            .diagnose(&failing_command())
            .await
            .expect_err("timeout");
        assert_eq!(err.kind(), ErrorKind::Network);
    }

    #[tokio::test]
    async fn execution_failure_skips_the_backend() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"diagnosis": "x"})))
            .expect(0)
            .mount(&server)
            .await;

        let outcome = client_for(&server)
            .run(&CommandSpec::argv(
                "/nonexistent/codefix-missing-binary",
                Vec::<String>::new(),
            ))
            .await;
        assert_eq!(outcome.error().map(DiagnoseError::kind), Some(ErrorKind::Execution));
    }
}
