#![allow(dead_code)]

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use mfgdesk_client::{
    ClientConfig, Credential, NotificationApi, ReconnectConfig, SessionPhase, Toast, ToastSink,
    WsHandle,
};
use mfgdesk_shared::{ApiError, NotificationId, NotificationPage, NotificationQuery};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};

/// Upper bound for anything a test waits on.
pub const WAIT: Duration = Duration::from_secs(5);

pub fn test_config(ws_url: &str) -> ClientConfig {
    ClientConfig::default()
        .with_ws_url(ws_url)
        .with_keepalive_interval(Duration::from_secs(60))
        .with_connect_timeout(Duration::from_secs(2))
        .with_reconnect(ReconnectConfig {
            max_attempts: 10,
            delay: Duration::from_millis(50),
        })
}

pub struct MockServer {
    listener: TcpListener,
    pub url: String,
}

impl MockServer {
    pub async fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        Self {
            listener,
            url: format!("ws://{addr}/ws/notifications"),
        }
    }

    async fn accept_tcp(&self) -> TcpStream {
        let (stream, _) = timeout(WAIT, self.listener.accept())
            .await
            .expect("client never connected")
            .unwrap();
        stream
    }

    /// Accept the next client and complete the WebSocket handshake.
    pub async fn accept(&self) -> MockConn {
        let stream = self.accept_tcp().await;
        let mut path = String::new();
        let capture = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            path = req.uri().to_string();
            Ok(resp)
        };
        let ws = accept_hdr_async(stream, capture).await.unwrap();
        MockConn { ws, path }
    }

    /// Accept the next client's TCP connection and hang up before the
    /// handshake, so the client sees a failed open.
    pub async fn refuse(&self) {
        drop(self.accept_tcp().await);
    }

    /// `true` if no client connects within `window`.
    pub async fn stays_quiet(&self, window: Duration) -> bool {
        timeout(window, self.listener.accept()).await.is_err()
    }
}

pub struct MockConn {
    ws: WebSocketStream<TcpStream>,
    pub path: String,
}

impl MockConn {
    /// Next text frame from the client, parsed as JSON.
    pub async fn recv_json(&mut self) -> Value {
        loop {
            let msg = timeout(WAIT, self.ws.next())
                .await
                .expect("no frame from client")
                .expect("client closed the socket")
                .unwrap();
            match msg {
                Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
                Message::Close(frame) => panic!("client closed the socket: {frame:?}"),
                _ => continue,
            }
        }
    }

    pub async fn send_json(&mut self, value: Value) {
        self.send_text(&value.to_string()).await;
    }

    pub async fn send_text(&mut self, text: &str) {
        self.ws.send(Message::text(text)).await.unwrap();
    }

    /// Expect the auth frame, acknowledge it and return the token it carried.
    pub async fn authenticate(&mut self) -> String {
        let frame = self.recv_json().await;
        assert_eq!(frame["type"], "auth", "first frame must be auth: {frame}");
        let token = frame["token"].as_str().unwrap().to_string();
        self.send_json(json!({"type": "auth_ok"})).await;
        token
    }

    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}

pub fn notification(id: &str, title: &str) -> Value {
    json!({
        "id": id,
        "type": "status_changed",
        "title": title,
        "message": "Order moved to production",
        "link": format!("/orders/{id}"),
        "read": false,
        "created_at": "2024-05-01T10:00:00Z",
    })
}

pub async fn wait_for_phase(handle: &WsHandle, want: SessionPhase) {
    let mut rx = handle.watch_phase();
    timeout(WAIT, rx.wait_for(|phase| *phase == want))
        .await
        .unwrap_or_else(|_| panic!("phase never became {want:?}, still {:?}", handle.phase()))
        .unwrap();
}

/// REST collaborator that returns an empty page and accepts every mutation.
#[derive(Default)]
pub struct EmptyApi {
    pub fetches: Mutex<Vec<String>>,
}

#[async_trait]
impl NotificationApi for EmptyApi {
    async fn fetch_notifications(
        &self,
        credential: &Credential,
        _query: NotificationQuery,
    ) -> Result<NotificationPage, ApiError> {
        self.fetches.lock().unwrap().push(credential.token().to_string());
        Ok(NotificationPage::default())
    }

    async fn mark_read(&self, _credential: &Credential, _id: &NotificationId) -> Result<(), ApiError> {
        Ok(())
    }

    async fn mark_all_read(&self, _credential: &Credential) -> Result<(), ApiError> {
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingToasts(pub Mutex<Vec<Toast>>);

impl ToastSink for RecordingToasts {
    fn show(&self, toast: Toast) {
        self.0.lock().unwrap().push(toast);
    }
}

impl RecordingToasts {
    pub fn titles(&self) -> Vec<String> {
        self.0.lock().unwrap().iter().map(|t| t.title.clone()).collect()
    }
}
