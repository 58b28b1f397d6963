//! End-to-end relay test: a fake cloud WebSocket endpoint on one side, a fake
//! OpenClaw HTTP server on the other, with the real client stack in between.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use openclaw_bridge::config::BridgeConfig;
use openclaw_bridge::relay::RelayClient;

/// Fake OpenClaw: HTTP 200 on the models endpoint, a canned chat completion on
/// the chat endpoint.
fn fake_openclaw() -> u16 {
    let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
    let port = server.server_addr().to_ip().unwrap().port();
    std::thread::spawn(move || {
        for request in server.incoming_requests() {
            let response = if request.url().starts_with("/v1/chat/completions") {
                tiny_http::Response::from_string(
                    json!({
                        "choices": [
                            {"index": 0, "message": {"role": "assistant", "content": "hello"}}
                        ]
                    })
                    .to_string(),
                )
            } else {
                tiny_http::Response::from_string("{}")
            };
            let _ = request.respond(response);
        }
    });
    port
}

async fn recv_json(ws: &mut WebSocketStream<TcpStream>) -> Value {
    loop {
        match ws.next().await.expect("connection closed early").unwrap() {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            _ => continue,
        }
    }
}

async fn send_text(ws: &mut WebSocketStream<TcpStream>, text: String) {
    ws.send(Message::Text(text.into())).await.unwrap();
}

#[tokio::test]
async fn full_session_round_trip() {
    let openclaw_port = fake_openclaw();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let ws_port = listener.local_addr().unwrap().port();

    let cloud = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        // Status arrives first, derived from a live health check
        let status = recv_json(&mut ws).await;
        assert_eq!(status["type"], "status");
        assert_eq!(status["openclaw_status"], "healthy");
        assert!(status["client_version"].as_str().is_some_and(|v| !v.is_empty()));

        // A supported tool request round-trips through the fake agent
        send_text(
            &mut ws,
            json!({
                "type": "tool_request",
                "request_id": "abc123",
                "tool_name": "local_openclaw",
                "arguments": {"query": "hi"}
            })
            .to_string(),
        )
        .await;
        let reply = recv_json(&mut ws).await;
        assert_eq!(
            reply,
            json!({
                "type": "tool_response",
                "request_id": "abc123",
                "success": true,
                "result": "hello",
                "error": null
            })
        );

        // Malformed payloads are skipped; the next well-formed frame still works
        send_text(&mut ws, "{definitely not json".to_string()).await;
        send_text(&mut ws, json!({"type": "ping"}).to_string()).await;
        let pong = recv_json(&mut ws).await;
        assert_eq!(pong, json!({"type": "pong"}));

        // Unsupported tools fail without breaking the connection
        send_text(
            &mut ws,
            json!({
                "type": "tool_request",
                "request_id": "r2",
                "tool_name": "shell",
                "arguments": {}
            })
            .to_string(),
        )
        .await;
        let failure = recv_json(&mut ws).await;
        assert_eq!(failure["success"], false);
        assert_eq!(failure["error"], "Unsupported tool: shell");
        assert_eq!(failure["result"], Value::Null);

        // Connection is still alive after all of the above
        send_text(&mut ws, json!({"type": "ping"}).to_string()).await;
        let pong = recv_json(&mut ws).await;
        assert_eq!(pong, json!({"type": "pong"}));

        ws.close(None).await.unwrap();
    });

    let config = BridgeConfig {
        cloud_url: format!("ws://127.0.0.1:{}", ws_port),
        api_key: "evo_test".to_string(),
        openclaw_url: format!("http://127.0.0.1:{}", openclaw_port),
        ..BridgeConfig::default()
    };

    let mut client = RelayClient::from_config(&config);
    let relay = tokio::spawn(async move { client.run().await });

    tokio::time::timeout(Duration::from_secs(10), cloud)
        .await
        .expect("session did not complete in time")
        .unwrap();

    relay.abort();
}
