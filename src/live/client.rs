// WebSocket connection to the broadcast relay.
//
// The connection is an explicitly owned object with a clear lifetime:
// constructed once at startup, subscribed to the channels it needs, passed
// into the app loop for publishing, and closed on shutdown. No ambient
// singleton.

use anyhow::Context;
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream, Stream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{info, warn};

use crate::protocol::{BroadcastMessage, ClientFrame, Envelope};

/// Events emitted by the broadcast listener to the application layer.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    /// The relay connection is up.
    Connected,
    /// The relay connection dropped.
    Disconnected,
    /// A parsed broadcast frame arrived.
    Message(Envelope),
}

/// Publishing seam between the app loop and the transport, so the loop can
/// be tested with a recording mock.
#[async_trait]
pub trait BroadcastPublisher: Send {
    async fn publish(&mut self, channel: &str, message: BroadcastMessage) -> anyhow::Result<()>;
}

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// The write half of the relay connection.
pub struct LiveConnection {
    sink: WsSink,
}

impl LiveConnection {
    /// Connect to the relay. Returns the connection (write half) and the
    /// inbound stream to hand to [`pump_frames`].
    pub async fn connect(url: &str) -> anyhow::Result<(Self, WsSource)> {
        let (stream, _response) = connect_async(url)
            .await
            .with_context(|| format!("failed to connect to broadcast relay at {url}"))?;
        info!("Connected to broadcast relay at {url}");
        let (sink, source) = stream.split();
        Ok((LiveConnection { sink }, source))
    }

    /// Ask the relay to deliver a channel's messages on this connection.
    pub async fn subscribe(&mut self, channel: &str) -> anyhow::Result<()> {
        self.send_frame(&ClientFrame::Subscribe {
            channel: channel.to_string(),
        })
        .await
    }

    async fn send_frame(&mut self, frame: &ClientFrame) -> anyhow::Result<()> {
        let text = serde_json::to_string(frame).context("failed to serialize client frame")?;
        self.sink
            .send(Message::Text(text.into()))
            .await
            .context("failed to send frame to broadcast relay")?;
        Ok(())
    }

    /// Close the connection cleanly.
    pub async fn close(mut self) -> anyhow::Result<()> {
        self.sink
            .close()
            .await
            .context("failed to close relay connection")?;
        Ok(())
    }
}

#[async_trait]
impl BroadcastPublisher for LiveConnection {
    async fn publish(&mut self, channel: &str, message: BroadcastMessage) -> anyhow::Result<()> {
        self.send_frame(&ClientFrame::Publish {
            channel: channel.to_string(),
            message,
        })
        .await
    }
}

/// `None` stands in when the relay is unreachable: writes still succeed,
/// publishes fail (and are logged and swallowed by the caller).
#[async_trait]
impl BroadcastPublisher for Option<LiveConnection> {
    async fn publish(&mut self, channel: &str, message: BroadcastMessage) -> anyhow::Result<()> {
        match self {
            Some(connection) => connection.publish(channel, message).await,
            None => anyhow::bail!("broadcast relay not connected"),
        }
    }
}

/// Forward inbound websocket messages through `tx` as parsed [`LiveEvent`]s.
/// Returns `Err(())` when the receiver is gone, signalling the caller to
/// stop. Generic over the stream type so it can be tested with in-memory
/// streams, no sockets.
///
/// Frames that fail to parse are logged and skipped: an unknown message
/// type from a newer peer must not kill the listener.
pub async fn pump_frames<St>(mut stream: St, tx: &mpsc::Sender<LiveEvent>) -> Result<(), ()>
where
    St: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    while let Some(msg_result) = stream.next().await {
        match msg_result {
            Ok(Message::Text(text)) => match serde_json::from_str::<Envelope>(&text) {
                Ok(envelope) => {
                    if tx.send(LiveEvent::Message(envelope)).await.is_err() {
                        return Err(());
                    }
                }
                Err(e) => {
                    warn!("Ignoring unparseable broadcast frame: {e}");
                }
            },
            Ok(Message::Close(_)) => {
                info!("Relay sent close frame");
                break;
            }
            Err(e) => {
                warn!("Broadcast connection error: {e}");
                break;
            }
            _ => {
                // Ignore Binary, Ping, Pong, Frame variants.
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ScoreUpdatedPayload;
    use chrono::Utc;
    use futures_util::stream;
    use tokio_tungstenite::tungstenite::Error as WsError;

    fn mock_stream(
        messages: Vec<Result<Message, WsError>>,
    ) -> impl Stream<Item = Result<Message, WsError>> + Unpin {
        stream::iter(messages)
    }

    fn score_updated_frame() -> String {
        let envelope = Envelope {
            channel: "event:ev-1".into(),
            message: BroadcastMessage::ScoreUpdated(ScoreUpdatedPayload {
                team_id: "t1".into(),
                team_name: "Alpha".into(),
                round_number: 1,
                points: 10.0,
                old_points: None,
                changed_by: "op-b".into(),
                changed_by_name: "Blair".into(),
                timestamp: Utc::now(),
            }),
        };
        serde_json::to_string(&envelope).unwrap()
    }

    #[tokio::test]
    async fn parsed_frame_forwarded_to_channel() {
        let (tx, mut rx) = mpsc::channel(16);
        let frames = vec![Ok(Message::Text(score_updated_frame().into()))];

        pump_frames(mock_stream(frames), &tx).await.unwrap();

        match rx.recv().await.unwrap() {
            LiveEvent::Message(envelope) => {
                assert_eq!(envelope.channel, "event:ev-1");
                assert!(matches!(
                    envelope.message,
                    BroadcastMessage::ScoreUpdated(_)
                ));
            }
            other => panic!("expected Message, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unparseable_frame_skipped() {
        let (tx, mut rx) = mpsc::channel(16);
        let frames = vec![
            Ok(Message::Text("{not json".into())),
            Ok(Message::Text(score_updated_frame().into())),
        ];

        pump_frames(mock_stream(frames), &tx).await.unwrap();

        // Only the valid frame comes through.
        assert!(matches!(
            rx.recv().await.unwrap(),
            LiveEvent::Message(_)
        ));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn close_frame_stops_pumping() {
        let (tx, mut rx) = mpsc::channel(16);
        let frames = vec![
            Ok(Message::Close(None)),
            Ok(Message::Text(score_updated_frame().into())),
        ];

        pump_frames(mock_stream(frames), &tx).await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn connection_error_stops_pumping() {
        let (tx, mut rx) = mpsc::channel(16);
        let frames = vec![
            Err(WsError::ConnectionClosed),
            Ok(Message::Text(score_updated_frame().into())),
        ];

        pump_frames(mock_stream(frames), &tx).await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn non_text_frames_ignored() {
        let (tx, mut rx) = mpsc::channel(16);
        let frames = vec![
            Ok(Message::Binary(vec![1, 2, 3].into())),
            Ok(Message::Ping(vec![].into())),
            Ok(Message::Text(score_updated_frame().into())),
        ];

        pump_frames(mock_stream(frames), &tx).await.unwrap();

        assert!(matches!(
            rx.recv().await.unwrap(),
            LiveEvent::Message(_)
        ));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn returns_err_when_receiver_dropped() {
        let (tx, rx) = mpsc::channel(16);
        drop(rx);

        let frames = vec![Ok(Message::Text(score_updated_frame().into()))];
        let result = pump_frames(mock_stream(frames), &tx).await;
        assert!(result.is_err());
    }
}
