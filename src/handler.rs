//! WebSocket connection handler
//!
//! Handles individual client connections: WebSocket handshake, request
//! decoding, and the write loop for encoded frames. Requests from one
//! connection are dispatched serially, in arrival order.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};

use crate::config::ConnectionConfig;
use crate::dispatcher::Dispatcher;
use crate::error::ChatError;
use crate::protocol::{Request, Response};
use crate::user::User;

/// Handle a new TCP connection
///
/// Performs the WebSocket handshake, registers a `User`, and runs until
/// either side of the connection closes. The user is then removed from the
/// registry and from every room it subscribed to.
pub async fn handle_connection(
    stream: TcpStream,
    dispatcher: Dispatcher,
    config: ConnectionConfig,
) -> Result<(), ChatError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    debug!("New TCP connection from {}", peer_addr);

    // WebSocket handshake
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // Channel for server -> client frames
    let (frame_tx, mut frame_rx) = mpsc::channel::<String>(config.outbound_buffer);
    let user = Arc::new(User::new(frame_tx, config.send_timeout));
    let user_id = user.id();
    info!("User {} connected from {}", user_id, peer_addr);

    dispatcher.chat().register_user(Arc::clone(&user)).await;

    // Spawn write task (encoded frames -> WebSocket)
    let mut write_task = tokio::spawn(async move {
        while let Some(frame) = frame_rx.recv().await {
            if ws_sender.send(WsMessage::Text(frame.into())).await.is_err() {
                debug!("WebSocket send failed, ending write task");
                break;
            }
        }
        debug!("Write task ended for user {}", user_id);

        let _ = ws_sender.close().await;
    });

    if let Err(e) = user
        .send_response(&Response::success(format!("Connected as {}", user_id)))
        .await
    {
        warn!("Failed to greet user {}: {}", user_id, e);
    }

    // Spawn read task (WebSocket -> Dispatcher)
    let read_dispatcher = dispatcher.clone();
    let read_user = Arc::clone(&user);
    let mut read_task = tokio::spawn(async move {
        while let Some(msg_result) = ws_receiver.next().await {
            match msg_result {
                Ok(WsMessage::Text(text)) => {
                    read_user.touch().await;
                    let request = match serde_json::from_str::<Request>(&text) {
                        Ok(request) => Some(request),
                        Err(e) => {
                            warn!("Invalid request from {}: {}", user_id, e);
                            None
                        }
                    };
                    if let Err(e) = read_dispatcher.dispatch(request, Some(&read_user)).await {
                        debug!("Request from {} failed: {}", user_id, e);
                    }
                }
                Ok(WsMessage::Close(_)) => {
                    debug!("User {} sent close frame", user_id);
                    break;
                }
                Ok(WsMessage::Ping(_)) | Ok(WsMessage::Pong(_)) => {
                    // Pong replies are handled by tungstenite
                    read_user.touch().await;
                }
                Ok(_) => {
                    // Binary and raw frames are not part of the protocol
                }
                Err(e) => {
                    error!("WebSocket error for {}: {}", user_id, e);
                    break;
                }
            }
        }
        debug!("Read task ended for user {}", user_id);
    });

    // Wait for either task to complete
    tokio::select! {
        _ = &mut read_task => {
            debug!("Read task completed for {}", user_id);
        }
        _ = &mut write_task => {
            debug!("Write task completed for {}", user_id);
        }
    }
    // No dispatch may still be running once cleanup starts
    read_task.abort();
    let _ = read_task.await;

    debug!(
        "User {} last seen {}, leaving rooms {:?}",
        user_id,
        user.last_alive().await,
        user.subscribed_rooms().await
    );
    dispatcher.chat().on_disconnect(user_id).await;
    drop(user);
    // Remaining frames are flushed once the last sender handle is gone
    if !write_task.is_finished() {
        let _ = write_task.await;
    }

    info!("User {} disconnected", user_id);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio::net::TcpListener;
    use tokio_tungstenite::connect_async;

    use crate::chat::Chat;
    use crate::protocol::ResponseType;

    async fn start_server() -> (String, Dispatcher) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let dispatcher = Dispatcher::new(Arc::new(Chat::default()));

        let accept_dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let dispatcher = accept_dispatcher.clone();
                tokio::spawn(handle_connection(stream, dispatcher, ConnectionConfig::default()));
            }
        });

        (format!("ws://{}", addr), dispatcher)
    }

    async fn next_text<S>(ws: &mut S) -> serde_json::Value
    where
        S: futures_util::Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>> + Unpin,
    {
        loop {
            let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
                .await
                .expect("timed out waiting for frame")
                .expect("stream ended")
                .unwrap();
            if let WsMessage::Text(text) = msg {
                return serde_json::from_str(&text).unwrap();
            }
        }
    }

    #[tokio::test]
    async fn test_websocket_round_trip() {
        let (url, dispatcher) = start_server().await;
        let (mut ws, _) = connect_async(url.as_str()).await.unwrap();

        let greeting = next_text(&mut ws).await;
        assert_eq!(greeting["type"], "SUCCESS");
        assert!(greeting["message"].as_str().unwrap().starts_with("Connected as "));

        ws.send(WsMessage::Text(
            r#"{"action": 3, "data": {"room": "general"}}"#.into(),
        ))
        .await
        .unwrap();
        let created: Response = serde_json::from_value(next_text(&mut ws).await).unwrap();
        assert_eq!(created, Response::success("Room created"));

        // Malformed JSON is answered without closing the connection
        ws.send(WsMessage::Text("not json".into())).await.unwrap();
        let invalid: Response = serde_json::from_value(next_text(&mut ws).await).unwrap();
        assert_eq!(invalid.kind, ResponseType::Error);
        assert_eq!(invalid.message, "Invalid request");

        ws.send(WsMessage::Text(
            r#"{"action": "SEND", "data": {"room": "general", "message": "hi"}}"#.into(),
        ))
        .await
        .unwrap();
        let delivered = next_text(&mut ws).await;
        assert_eq!(delivered["message"], "hi");
        let sent: Response = serde_json::from_value(next_text(&mut ws).await).unwrap();
        assert_eq!(sent, Response::success("Message sent"));

        let room = dispatcher.chat().get_room("general").await.unwrap();
        assert_eq!(room.history_len().await, 1);
        assert_eq!(dispatcher.chat().user_count().await, 1);

        ws.close(None).await.unwrap();

        // Disconnect cleanup removes the user from registry and room
        for _ in 0..100 {
            if dispatcher.chat().user_count().await == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(dispatcher.chat().user_count().await, 0);
        assert_eq!(room.subscriber_count().await, 0);
    }
}
