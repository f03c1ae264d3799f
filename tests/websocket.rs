//! End to end over a real listener: websocket terminal plus the REST surface.

mod common;

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use reqwest::Method;
use rs_webshell::AppState;
use rs_webshell::config::TerminalConfig;
use rs_webshell::server::run_server_with_graceful_shutdown;
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use common::{PROMPT, PROMPT_SHELL, config_for, write_script};

struct TestServer {
    addr: SocketAddr,
    state: AppState,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<std::io::Result<()>>,
}

impl TestServer {
    async fn start(config: TerminalConfig) -> Self {
        let state = AppState::new(config);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(run_server_with_graceful_shutdown(
            listener,
            state.clone(),
            async move {
                let _ = rx.await;
            },
        ));
        Self {
            addr,
            state,
            shutdown: Some(tx),
            handle,
        }
    }

    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        tokio::time::timeout(Duration::from_secs(10), self.handle)
            .await
            .expect("server did not shut down")
            .unwrap()
            .unwrap();
    }
}

async fn http(addr: SocketAddr, method: Method, path: &str, body: Option<Value>) -> (u16, Value) {
    let mut request = reqwest::Client::new().request(method, format!("http://{addr}{path}"));
    if let Some(body) = body {
        request = request.json(&body);
    }
    let response = request.send().await.unwrap();
    let status = response.status().as_u16();
    let body = response.json().await.unwrap_or(Value::Null);
    (status, body)
}

type Ws = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<TcpStream>>;

async fn ws_read_until(ws: &mut Ws, collected: &mut String, needle: &str) {
    let start = collected.len();
    tokio::time::timeout(Duration::from_secs(10), async {
        while !collected[start..].contains(needle) {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => collected.push_str(&text),
                Some(Ok(_)) => {}
                Some(Err(_)) | None => break,
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {needle:?}, got {collected:?}"));
}

/// True once the server closed the websocket.
async fn ws_closed(ws: &mut Ws) -> bool {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return true,
                Some(Ok(_)) => {}
            }
        }
    })
    .await
    .unwrap_or(false)
}

#[tokio::test]
async fn test_terminal_round_trip_and_session_api() {
    let dir = tempfile::tempdir().unwrap();
    let shell = write_script(dir.path(), "prompt.sh", PROMPT_SHELL);
    let server = TestServer::start(config_for(&shell)).await;

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/terminal", server.addr))
        .await
        .unwrap();
    let mut output = String::new();
    ws_read_until(&mut ws, &mut output, PROMPT).await;

    ws.send(Message::Text("echo over-the-wire\r".to_string())).await.unwrap();
    ws_read_until(&mut ws, &mut output, "over-the-wire").await;

    // binary frames are keystrokes too
    ws.send(Message::Binary(b"echo binary-ok\r".to_vec())).await.unwrap();
    ws_read_until(&mut ws, &mut output, "binary-ok").await;

    let (status, sessions) = http(server.addr, Method::GET, "/api/sessions", None).await;
    assert_eq!(status, 200);
    let sessions = sessions.as_array().unwrap().clone();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["state"], "running");
    assert_eq!(sessions[0]["connectionType"], "WebSocket");
    let id = sessions[0]["id"].as_str().unwrap().to_string();

    let (status, one) = http(server.addr, Method::GET, &format!("/api/sessions/{id}"), None).await;
    assert_eq!(status, 200);
    assert_eq!(one["id"], id.as_str());

    let (status, closed) = http(server.addr, Method::DELETE, &format!("/api/sessions/{id}"), None).await;
    assert_eq!(status, 200);
    assert_eq!(closed["success"], true);
    assert!(ws_closed(&mut ws).await);

    assert!(server.state.sessions.registry().wait_until_empty(Duration::from_secs(5)).await);
    let (status, _) = http(server.addr, Method::DELETE, &format!("/api/sessions/{id}"), None).await;
    assert_eq!(status, 404);
    let (status, _) = http(server.addr, Method::GET, "/api/sessions/not-a-uuid", None).await;
    assert_eq!(status, 404);

    server.stop().await;
}

#[tokio::test]
async fn test_client_close_tears_down_session() {
    let dir = tempfile::tempdir().unwrap();
    let shell = write_script(dir.path(), "prompt.sh", PROMPT_SHELL);
    let server = TestServer::start(config_for(&shell)).await;

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", server.addr))
        .await
        .unwrap();
    let mut output = String::new();
    ws_read_until(&mut ws, &mut output, PROMPT).await;

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    let pid = loop {
        if let Some(snapshot) = server.state.sessions.list().await.first() {
            break snapshot.pid;
        }
        assert!(tokio::time::Instant::now() < deadline, "session never registered");
        tokio::time::sleep(Duration::from_millis(10)).await;
    };
    ws.close(None).await.unwrap();

    assert!(server.state.sessions.registry().wait_until_empty(Duration::from_secs(5)).await);
    common::wait_pid_gone(pid).await;
    server.stop().await;
}

#[tokio::test]
async fn test_spawn_failure_is_http_500() {
    let config = config_for(std::path::Path::new("/no/such/shell"));
    let server = TestServer::start(config).await;

    let result = tokio_tungstenite::connect_async(format!("ws://{}/terminal", server.addr)).await;
    match result {
        Err(WsError::Http(response)) => assert_eq!(response.status().as_u16(), 500),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("upgrade should have been refused"),
    }
    assert!(server.state.sessions.registry().is_empty().await);
    server.stop().await;
}

#[tokio::test]
async fn test_shutdown_closes_live_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let shell = write_script(dir.path(), "prompt.sh", PROMPT_SHELL);
    let server = TestServer::start(config_for(&shell)).await;

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/terminal", server.addr))
        .await
        .unwrap();
    let mut output = String::new();
    ws_read_until(&mut ws, &mut output, PROMPT).await;

    let state = server.state.clone();
    server.stop().await;
    assert!(ws_closed(&mut ws).await);
    assert!(state.sessions.registry().is_empty().await);
}

#[tokio::test]
async fn test_file_store_endpoints() {
    let server = TestServer::start(TerminalConfig::default()).await;
    let addr = server.addr;

    let (status, body) = http(addr, Method::GET, "/ping", None).await;
    assert_eq!((status, body["message"].as_str()), (200, Some("pong")));

    let (status, body) = http(addr, Method::GET, "/files", None).await;
    assert_eq!(status, 200);
    assert_eq!(body["files"], json!(["main.py", "test.py"]));

    let (status, body) = http(addr, Method::GET, "/files/main.py", None).await;
    assert_eq!(status, 200);
    assert_eq!(body["content"], "print('Hello, world!')");

    let (status, _) = http(addr, Method::POST, "/files", Some(json!({"filename":"new.py"}))).await;
    assert_eq!(status, 200);
    let (status, body) = http(addr, Method::POST, "/files", Some(json!({"filename":"new.py"}))).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], true);

    let (status, _) = http(addr, Method::PUT, "/files/new.py", Some(json!({"content":"x = 1"}))).await;
    assert_eq!(status, 200);
    let (status, _) = http(addr, Method::PUT, "/files/ghost.py", Some(json!({"content":""}))).await;
    assert_eq!(status, 404);

    let (status, _) = http(addr, Method::PATCH, "/files/new.py/rename", Some(json!({"new_filename":"test.py"}))).await;
    assert_eq!(status, 400);
    let (status, body) = http(addr, Method::PATCH, "/files/new.py/rename", Some(json!({"new_filename":"renamed.py"}))).await;
    assert_eq!(status, 200);
    assert_eq!((body["old"].as_str(), body["new"].as_str()), (Some("new.py"), Some("renamed.py")));

    let (status, body) = http(addr, Method::GET, "/files/renamed.py", None).await;
    assert_eq!((status, body["content"].as_str()), (200, Some("x = 1")));
    let (status, _) = http(addr, Method::DELETE, "/files/renamed.py", None).await;
    assert_eq!(status, 200);
    let (status, _) = http(addr, Method::DELETE, "/files/renamed.py", None).await;
    assert_eq!(status, 404);

    server.stop().await;
}
