//! Websocket transport
//!
//! Viewers connect to `/ws`. Outbound envelopes go out as JSON text frames
//! from the session queue; inbound frames are applied one at a time on the
//! blocking pool so host observers never stall the runtime.

use crate::error::TransportError;
use crate::server::Server;
use crate::session::InboundPort;
use futures::stream::SplitStream;
use futures::{SinkExt, StreamExt};
use scenecast_protocol::SessionId;
use std::future::Future;
use std::net::SocketAddr;
use warp::ws::{Message, WebSocket, Ws};
use warp::Filter;

/// Websocket route segment
pub const WS_PATH: &str = "ws";

/// All transport routes: `/ws` for viewers and `/healthz`
pub fn routes(server: Server) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let viewer = warp::path(WS_PATH)
        .and(warp::path::end())
        .and(warp::ws())
        .and(with_server(server))
        .map(|ws: Ws, server: Server| ws.on_upgrade(move |socket| run_session(server, socket)));
    let health = warp::path("healthz").and(warp::path::end()).map(|| "ok");
    viewer.or(health)
}

fn with_server(server: Server) -> impl Filter<Extract = (Server,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || server.clone())
}

/// Bind the transport; the returned future serves until `shutdown` resolves
///
/// # Errors
/// Returns [`TransportError::Bind`] if the address cannot be bound.
pub fn bind(
    server: Server,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(SocketAddr, impl Future<Output = ()> + 'static), TransportError> {
    warp::serve(routes(server))
        .try_bind_with_graceful_shutdown(addr, shutdown)
        .map_err(|err| TransportError::Bind {
            addr: addr.to_string(),
            reason: err.to_string(),
        })
}

/// Bind and serve until `shutdown` resolves
///
/// # Errors
/// Returns [`TransportError::Bind`] if the address cannot be bound.
pub async fn serve(
    server: Server,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), TransportError> {
    let (bound, running) = bind(server, addr, shutdown)?;
    tracing::info!(addr = %bound, "serving viewers on ws://{bound}/{WS_PATH}");
    running.await;
    tracing::info!("transport shut down");
    Ok(())
}

async fn run_session(server: Server, socket: WebSocket) {
    let mut session = match server.connect() {
        Ok(session) => session,
        Err(err) => {
            tracing::warn!(error = %err, "rejecting viewer");
            return;
        }
    };
    let id = session.id();
    let (mut sink, stream) = socket.split();
    let mut reader = tokio::spawn(read_frames(id, stream, session.inbound()));

    loop {
        tokio::select! {
            envelope = session.recv() => {
                let Some(envelope) = envelope else { break };
                let text = match envelope.to_json().map_err(TransportError::Encode) {
                    Ok(text) => text,
                    Err(err) => {
                        tracing::error!(session = %id, seq = envelope.seq, error = %err, "skipping outbound frame");
                        continue;
                    }
                };
                if let Err(err) = sink.send(Message::text(text)).await {
                    tracing::debug!(session = %id, error = %err, "socket write failed");
                    break;
                }
            }
            _ = &mut reader => break,
        }
    }

    reader.abort();
    if let Err(err) = sink.close().await {
        tracing::debug!(session = %id, error = %err, "socket close failed");
    }
    session.disconnect();
}

async fn read_frames(id: SessionId, mut stream: SplitStream<WebSocket>, inbound: InboundPort) {
    while let Some(frame) = stream.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(err) => {
                tracing::debug!(session = %id, error = %err, "socket read failed");
                break;
            }
        };
        if frame.is_close() {
            break;
        }
        let Ok(text) = frame.to_str() else {
            continue;
        };

        let text = text.to_owned();
        let port = inbound.clone();
        match tokio::task::spawn_blocking(move || port.handle_text(&text)).await {
            Ok(Ok(report)) if !report.is_clean() => {
                tracing::warn!(session = %id, failures = report.failures.len(), "observers failed");
            }
            Ok(Ok(_)) => {}
            Ok(Err(err)) if err.is_server_gone() => break,
            Ok(Err(err)) => tracing::warn!(session = %id, error = %err, "skipping inbound frame"),
            Err(err) => {
                tracing::error!(session = %id, error = %err, "inbound worker failed");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenecast_protocol::{ClientMessage, Envelope, ServerMessage, WidgetInput};
    use serde_json::json;
    use std::time::Duration;

    async fn next_envelope(client: &mut warp::test::WsClient) -> Envelope {
        let frame = client.recv().await.expect("frame");
        serde_json::from_str(frame.to_str().expect("text frame")).expect("envelope")
    }

    #[tokio::test]
    async fn health_endpoint() {
        let reply = warp::test::request()
            .path("/healthz")
            .reply(&routes(Server::default()))
            .await;
        assert_eq!(reply.status(), 200);
        assert_eq!(reply.body(), "ok");
    }

    #[tokio::test]
    async fn websocket_round_trip() {
        let server = Server::default();
        let count = server.gui().add_number("Count", 42.0).unwrap();
        let mut client = warp::test::ws()
            .path("/ws")
            .handshake(routes(server.clone()))
            .await
            .expect("handshake");

        let snapshot = next_envelope(&mut client).await;
        let ServerMessage::Snapshot(snapshot) = snapshot.message else {
            panic!("first frame must be the snapshot");
        };
        assert_eq!(snapshot.widgets[0].value, json!(42.0));

        count.set_value(7.0).unwrap();
        let update = next_envelope(&mut client).await;
        assert_eq!(
            update.message,
            ServerMessage::UpdateWidgetValue {
                id: count.id(),
                value: json!(7.0)
            }
        );

        let event = ClientMessage::WidgetEvent {
            id: count.id(),
            input: WidgetInput::Value { value: json!(99) },
        };
        client.send_text(serde_json::to_string(&event).unwrap()).await;
        client.send_text("not json").await;

        tokio::time::timeout(Duration::from_secs(5), async {
            while count.value().unwrap() != json!(99) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("viewer value applied");
        assert_eq!(server.session_count(), 1);
    }
}
