//! Progress WebSocket transport.
//!
//! GET /ws/progress?app={app}&id={id}&code={code}
//!
//! The code comes from GET /v1/handshake. The handshake is checked after the
//! upgrade so a rejected client still receives the error frame.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::progress::{
    self, ConnectionState, HandshakeParams, Subscriber, SubscriberClosed,
};

use super::AppState;

/// Frame queued for a socket.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Outbound {
    Text(String),
    Close,
}

/// Bus subscriber backed by the socket's outbound queue.
struct ChannelSubscriber {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl Subscriber for ChannelSubscriber {
    fn send_text(&self, text: &str) -> Result<(), SubscriberClosed> {
        self.tx
            .send(Outbound::Text(text.to_string()))
            .map_err(|_| SubscriberClosed)
    }

    fn close(&self) {
        let _ = self.tx.send(Outbound::Close);
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Progress WebSocket handler.
pub async fn progress_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<HandshakeParams>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, params))
}

async fn handle_socket(socket: WebSocket, state: AppState, params: HandshakeParams) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let connection = progress::connect(
        &state.bus,
        &state.broker,
        &params,
        Box::new(ChannelSubscriber { tx }),
    )
    .unwrap_or(ConnectionState::Closed);

    loop {
        tokio::select! {
            outbound = rx.recv() => {
                match outbound {
                    Some(Outbound::Text(text)) => {
                        if ws_sender.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    Some(Outbound::Close) | None => {
                        let _ = ws_sender.send(Message::Close(None)).await;
                        break;
                    }
                }
            }

            incoming = ws_receiver.next() => {
                match incoming {
                    Some(Ok(Message::Ping(data))) => {
                        let _ = ws_sender.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::debug!(app = %params.app, "Progress socket closed by client");
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::debug!("Progress socket error: {}", e);
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    progress::disconnect(&state.bus, connection);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_subscriber() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let subscriber = ChannelSubscriber { tx };

        subscriber.send_text("hello").unwrap();
        subscriber.close();
        assert_eq!(rx.try_recv().unwrap(), Outbound::Text("hello".to_string()));
        assert_eq!(rx.try_recv().unwrap(), Outbound::Close);

        assert!(!subscriber.is_closed());
        drop(rx);
        assert!(subscriber.is_closed());
        assert_eq!(subscriber.send_text("late"), Err(SubscriberClosed));
    }
}
