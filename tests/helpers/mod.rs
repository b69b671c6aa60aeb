#![allow(dead_code)] // Test helpers appear unused when compiled independently

use std::time::Duration;

use geoshare::access::{Credential, PermittedGroups, TokenAuthenticator};
use geoshare::{GeoshareServer, ServerConfig};
use reqwest::{Client, Response};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Tick used by the e2e servers
pub const TEST_TICK: Duration = Duration::from_millis(50);

pub struct RunningServer {
    pub base_url: String,
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl RunningServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.handle.await;
    }

    /// Fire the shutdown signal, returning the serve task
    pub fn begin_shutdown(self) -> JoinHandle<()> {
        let _ = self.shutdown_tx.send(());
        self.handle
    }
}

/// Best-effort check for whether binding to loopback is permitted in the current sandbox.
pub async fn can_bind_loopback() -> bool {
    match TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => {
            drop(listener);
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => false,
        Err(_) => true,
    }
}

/// Observer tokens known to every test server
///
/// | token         | subject | groups  |
/// |---------------|---------|---------|
/// | `fam-token`   | alice   | fam     |
/// | `work-token`  | bob     | work    |
/// | `admin-token` | admin   | all     |
pub fn authenticator() -> TokenAuthenticator {
    TokenAuthenticator::new()
        .with_token(
            "fam-token",
            Credential::new("alice", PermittedGroups::only(["fam"])),
        )
        .with_token(
            "work-token",
            Credential::new("bob", PermittedGroups::only(["work"])),
        )
        .with_token(
            "admin-token",
            Credential::new("admin", PermittedGroups::Unrestricted),
        )
}

pub fn test_config() -> ServerConfig {
    ServerConfig::default().tick_interval(TEST_TICK)
}

/// Start a server on an ephemeral loopback port
pub async fn spawn_server(config: ServerConfig) -> RunningServer {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind test listener");
    let addr = listener.local_addr().unwrap();
    let server = GeoshareServer::new(config, authenticator());

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let handle = tokio::spawn(async move {
        let shutdown = async {
            let _ = shutdown_rx.await;
        };
        if let Err(err) = server.serve(listener, shutdown).await {
            eprintln!("test server error: {}", err);
        }
    });

    RunningServer {
        base_url: format!("http://{}", addr),
        shutdown_tx,
        handle,
    }
}

/// POST a JSON body, returning the status and the decoded reply
pub async fn post_json(client: &Client, url: &str, body: Value) -> (u16, Value) {
    let resp = client
        .post(url)
        .json(&body)
        .send()
        .await
        .expect("failed to send request");
    let status = resp.status().as_u16();
    let reply = resp.json::<Value>().await.expect("reply was not JSON");
    (status, reply)
}

pub async fn report(client: &Client, server: &RunningServer, body: Value) {
    let (status, reply) = post_json(client, &server.url("/location"), body).await;
    assert_eq!(status, 200, "report rejected: {}", reply);
    assert_eq!(reply["status"], "OK");
}

pub async fn stop_sharing(client: &Client, server: &RunningServer, identity: &str) {
    let (status, reply) = post_json(
        client,
        &server.url("/location/stop"),
        serde_json::json!({ "identity": identity }),
    )
    .await;
    assert_eq!(status, 200, "stop rejected: {}", reply);
    assert_eq!(reply["status"], "OK");
}

/// Reads `data:` payloads off an SSE response
pub struct EventReader {
    resp: Response,
    buf: String,
}

impl EventReader {
    pub fn new(resp: Response) -> Self {
        Self {
            resp,
            buf: String::new(),
        }
    }

    /// Next event payload, or `None` once the server ends the stream
    pub async fn next(&mut self) -> Option<String> {
        loop {
            if let Some(end) = self.buf.find("\n\n") {
                let frame: String = self.buf.drain(..end + 2).collect();
                let data: Vec<&str> = frame
                    .lines()
                    .filter_map(|line| line.strip_prefix("data:"))
                    .map(|d| d.strip_prefix(' ').unwrap_or(d))
                    .collect();
                if data.is_empty() {
                    // keep-alive comment
                    continue;
                }
                return Some(data.join("\n"));
            }

            let chunk = tokio::time::timeout(EVENT_TIMEOUT, self.resp.chunk())
                .await
                .expect("timed out waiting for event")
                .ok()??;
            self.buf.push_str(&String::from_utf8_lossy(&chunk));
        }
    }

    pub async fn next_json(&mut self) -> Option<Value> {
        let payload = self.next().await?;
        Some(serde_json::from_str(&payload).expect("event was not JSON"))
    }

    /// Skip events until one satisfies `pred`
    pub async fn wait_for(&mut self, pred: impl Fn(&Value) -> bool) -> Value {
        loop {
            let value = self.next_json().await.expect("stream ended early");
            if pred(&value) {
                return value;
            }
        }
    }
}

/// Open `GET /stream` with a query string, returning the raw response
pub async fn open_stream(client: &Client, server: &RunningServer, query: &str) -> Response {
    client
        .get(server.url(&format!("/stream{}", query)))
        .send()
        .await
        .expect("failed to open stream")
}
