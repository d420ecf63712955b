// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! WebSocket transport tests against a local tokio-tungstenite server.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use url::Url;
use verdict_protocol::{
    ChannelEvent, Endpoint, EventHandler, ExecClientMessage, ExecInit, ExecServerMessage,
    Language, ProblemId, StaticToken, Transport, TransportConfig, WsTransport,
};

async fn spawn_server<F, Fut>(script: F) -> Url
where
    F: FnOnce(WebSocketStream<TcpStream>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        script(ws).await;
    });
    Url::parse(&format!("ws://{}/ws", addr)).unwrap()
}

fn collecting() -> (EventHandler, mpsc::UnboundedReceiver<ChannelEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handler: EventHandler = Arc::new(move |event: ChannelEvent| {
        let _ = tx.send(event);
    });
    (handler, rx)
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<ChannelEvent>) -> ChannelEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for channel event")
        .expect("channel handler dropped")
}

fn text(s: &str) -> Message {
    Message::Text(s.to_string().into())
}

fn transport(url: Url) -> WsTransport {
    WsTransport::new(TransportConfig::new(url), Arc::new(StaticToken::anonymous()))
}

#[tokio::test]
async fn test_exchange_preserves_order_and_drops_malformed() {
    let url = spawn_server(|mut ws| async move {
        // Echo the kind of the first client frame back as stdout
        let first = ws.next().await.unwrap().unwrap();
        let kind = verdict_protocol::Envelope::try_parse(first.to_text().unwrap())
            .map(|env| env.kind)
            .unwrap_or_default();
        let echo = format!(r#"{{"type":"STDOUT","data":"{}"}}"#, kind);
        ws.send(text(&echo)).await.unwrap();
        ws.send(text("this is not json")).await.unwrap();
        ws.send(text(r#"{"type":"STDERR","data":"warn\n"}"#))
            .await
            .unwrap();
        ws.send(text(
            r#"{"type":"COMPLETE","data":{"exitCode":0,"time":12,"memory":4}}"#,
        ))
        .await
        .unwrap();
        let _ = ws.close(None).await;
    })
    .await;

    let transport = transport(url);
    let (handler, mut rx) = collecting();
    let channel = transport.open(Endpoint::Execution, handler);

    assert_eq!(next_event(&mut rx).await, ChannelEvent::Ready);
    channel
        .send_message(&ExecClientMessage::Init(ExecInit {
            problem_id: ProblemId(1),
            language: Language::Python,
            code: "print('hi')".to_string(),
        }))
        .unwrap();

    let mut decoded = Vec::new();
    loop {
        match next_event(&mut rx).await {
            ChannelEvent::Message(env) => {
                decoded.push(env.decode::<ExecServerMessage>().unwrap());
            }
            ChannelEvent::Closed(_) => break,
            other => panic!("unexpected event: {:?}", other),
        }
    }

    assert_eq!(decoded.len(), 3);
    assert_eq!(decoded[0], ExecServerMessage::Stdout("INIT".to_string()));
    assert_eq!(decoded[1], ExecServerMessage::Stderr("warn\n".to_string()));
    assert!(decoded[2].is_terminal());
}

#[tokio::test]
async fn test_client_close_reaches_server() {
    let (closed_tx, closed_rx) = oneshot::channel();
    let url = spawn_server(|mut ws| async move {
        let mut saw_close = false;
        while let Some(Ok(msg)) = ws.next().await {
            if msg.is_close() {
                saw_close = true;
                break;
            }
        }
        let _ = closed_tx.send(saw_close);
    })
    .await;

    let transport = transport(url);
    let (handler, mut rx) = collecting();
    let channel = transport.open(Endpoint::Execution, handler);
    assert_eq!(next_event(&mut rx).await, ChannelEvent::Ready);

    channel.close();
    assert!(channel.is_closed());
    assert!(channel.send_message(&ExecClientMessage::kill()).is_err());

    let saw_close = tokio::time::timeout(Duration::from_secs(5), closed_rx)
        .await
        .unwrap()
        .unwrap();
    assert!(saw_close);
    assert!(matches!(next_event(&mut rx).await, ChannelEvent::Closed(_)));
}

#[tokio::test]
async fn test_connect_failure_reports_error_then_close() {
    // Reserve a port and release it so nothing is listening there
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let transport = transport(Url::parse(&format!("ws://{}/ws", addr)).unwrap());
    let (handler, mut rx) = collecting();
    let _channel = transport.open(Endpoint::Submissions, handler);

    assert!(matches!(next_event(&mut rx).await, ChannelEvent::Error(_)));
    assert_eq!(next_event(&mut rx).await, ChannelEvent::Closed(None));
}
