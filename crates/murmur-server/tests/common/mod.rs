//! Shared harness for the end-to-end suites: a real server on an ephemeral
//! port backed by an in-memory store.
#![allow(dead_code)]

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use murmur_db::Database;
use murmur_relay::RelayTiming;
use murmur_server::{Services, app};

pub type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const TEST_SECRET: &str = "e2e-test-secret-not-for-production";

pub struct TestServer {
    pub base: String,
    pub ws_base: String,
    pub client: reqwest::Client,
    pub services: Services,
}

/// A signed-up user.
pub struct TestUser {
    pub id: String,
    pub username: String,
    pub token: String,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with_timing(RelayTiming::default()).await
    }

    /// Same server, with relay clocks short enough to watch them fire.
    pub async fn start_with_timing(timing: RelayTiming) -> Self {
        let db = Database::open_in_memory().unwrap();
        let mut services = Services::new(db, TEST_SECRET.into(), chrono::Duration::days(30));
        services.relay.timing = timing;
        let router = app(&services, &[]).unwrap();

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });

        Self {
            base: format!("http://{}", addr),
            ws_base: format!("ws://{}", addr),
            client: reqwest::Client::new(),
            services,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub async fn signup(&self, username: &str) -> TestUser {
        let resp = self
            .client
            .post(self.url("/auth/signup"))
            .json(&json!({ "username": username, "password": "correct horse battery" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201, "signup {}", username);
        let body: Value = resp.json().await.unwrap();
        TestUser {
            id: body["id"].as_str().unwrap().to_string(),
            username: username.to_string(),
            token: body["token"].as_str().unwrap().to_string(),
        }
    }

    pub async fn get(&self, user: &TestUser, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(&user.token)
            .send()
            .await
            .unwrap()
    }

    pub async fn post(&self, user: &TestUser, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(&user.token)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    pub async fn put(&self, user: &TestUser, path: &str, body: Value) -> reqwest::Response {
        self.client
            .put(self.url(path))
            .bearer_auth(&user.token)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    pub async fn delete(&self, user: &TestUser, path: &str) -> reqwest::Response {
        self.client
            .delete(self.url(path))
            .bearer_auth(&user.token)
            .send()
            .await
            .unwrap()
    }

    /// Private conversation between two users; returns its id.
    pub async fn conversation(&self, a: &TestUser, b: &TestUser) -> String {
        let resp = self
            .post(a, "/conversations", json!({ "participantId": b.id }))
            .await;
        assert!(resp.status().is_success());
        let body: Value = resp.json().await.unwrap();
        body["id"].as_str().unwrap().to_string()
    }

    pub async fn send_text(&self, user: &TestUser, conversation_id: &str, text: &str) -> Value {
        let resp = self
            .post(user, "/messages", json!({ "conversationId": conversation_id, "text": text }))
            .await;
        assert_eq!(resp.status(), 201);
        resp.json().await.unwrap()
    }

    /// Open a relay socket and complete the identify handshake.
    pub async fn relay(&self, user: &TestUser) -> Socket {
        let mut ws = self.relay_raw().await;
        send(&mut ws, json!({ "type": "identify", "data": { "token": user.token } })).await;
        let ready = next_event(&mut ws, "ready").await;
        assert_eq!(ready["data"]["username"], user.username.as_str());
        ws
    }

    pub async fn relay_raw(&self) -> Socket {
        let (ws, _) = connect_async(format!("{}/relay", self.ws_base)).await.unwrap();
        ws
    }
}

pub async fn send(ws: &mut Socket, frame: Value) {
    ws.send(Message::text(frame.to_string())).await.unwrap();
}

pub async fn join(ws: &mut Socket, chat_id: &str) -> Value {
    send(ws, json!({ "type": "join_chat", "data": { "chatId": chat_id } })).await;
    loop {
        let event = next_frame(ws, Duration::from_secs(5)).await.expect("no join reply");
        if matches!(event["type"].as_str(), Some("joined" | "join_rejected")) {
            return event;
        }
    }
}

/// Next JSON event, or `None` when nothing arrives in `wait` or the socket closes.
pub async fn next_frame(ws: &mut Socket, wait: Duration) -> Option<Value> {
    loop {
        let msg = tokio::time::timeout(wait, ws.next()).await.ok()??.ok()?;
        match msg {
            Message::Text(text) => return Some(serde_json::from_str(text.as_str()).unwrap()),
            Message::Close(_) => return None,
            _ => continue,
        }
    }
}

/// True when the server closes the socket within `wait`, skipping any
/// frames queued before the close.
pub async fn closed_within(ws: &mut Socket, wait: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + wait;
    loop {
        let left = deadline.saturating_duration_since(tokio::time::Instant::now());
        match tokio::time::timeout(left, ws.next()).await {
            Err(_) => return false,
            Ok(None) | Ok(Some(Err(_))) | Ok(Some(Ok(Message::Close(_)))) => return true,
            Ok(Some(Ok(_))) => continue,
        }
    }
}

/// Skip events until one of `kind` arrives. Panics after five seconds.
pub async fn next_event(ws: &mut Socket, kind: &str) -> Value {
    loop {
        let event = next_frame(ws, Duration::from_secs(5))
            .await
            .unwrap_or_else(|| panic!("no {} event", kind));
        if event["type"] == kind {
            return event;
        }
    }
}

/// Assert no event of `kind` arrives within `wait`.
pub async fn assert_no_event(ws: &mut Socket, kind: &str, wait: Duration) {
    let deadline = tokio::time::Instant::now() + wait;
    loop {
        let left = deadline.saturating_duration_since(tokio::time::Instant::now());
        if left.is_zero() {
            return;
        }
        match next_frame(ws, left).await {
            Some(event) => assert_ne!(event["type"], kind, "unexpected {}", event),
            None => return,
        }
    }
}
