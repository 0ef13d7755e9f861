//! Session connector that talks to a protocol bridge over a WebSocket.
//!
//! One socket per [`SessionConnector::connect`] call. A background task owns
//! the socket: it writes outgoing request frames, routes responses back to
//! their waiting callers by id, and forwards events to the bot. When the
//! socket ends the event channel closes, which the bot treats as a retryable
//! disconnect.

use std::{collections::HashMap, sync::Arc, time::Duration};

use {
    async_trait::async_trait,
    base64::{Engine as _, engine::general_purpose::STANDARD as BASE64},
    bytes::Bytes,
    futures::{SinkExt, StreamExt},
    serde_json::{Value, json},
    stickerbot_channels::{
        ConnectOptions, Connection, Error, MediaStream, Result, Session, SessionConnector,
    },
    stickerbot_protocol::{Credentials, InboundEvent, MediaDescriptor, SessionEvent},
    tokio::{
        net::TcpStream,
        sync::{Mutex, mpsc, oneshot},
    },
    tokio_tungstenite::{
        MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message as WsMessage,
    },
    tracing::{debug, info, warn},
};

use crate::frames::{BridgeFrame, RequestFrame, ResponseFrame, methods};

/// Events the socket task may queue before the bot drains them.
const EVENT_BUFFER: usize = 256;

type PendingRequests = Arc<Mutex<HashMap<String, oneshot::Sender<ResponseFrame>>>>;

type BridgeSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone)]
pub struct BridgeConnector {
    url: String,
    request_timeout: Duration,
}

impl BridgeConnector {
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            request_timeout,
        }
    }
}

#[async_trait]
impl SessionConnector for BridgeConnector {
    async fn connect(
        &self,
        credentials: Option<Credentials>,
        options: &ConnectOptions,
    ) -> Result<Connection> {
        info!(url = %self.url, "connecting to bridge");
        let (socket, _response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| Error::external(format!("connect to bridge at {}", self.url), e))?;

        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let pending = PendingRequests::default();
        tokio::spawn(run_socket(
            socket,
            write_rx,
            events_tx,
            Arc::clone(&pending),
        ));

        let session = Arc::new(BridgeSession {
            write_tx,
            pending,
            request_timeout: self.request_timeout,
        });
        session
            .request(
                methods::CONNECT,
                json!({
                    "credentials": credentials,
                    "browser": options.browser,
                }),
            )
            .await?;
        debug!(url = %self.url, "bridge accepted session");

        Ok(Connection {
            session,
            events: events_rx,
        })
    }
}

/// Request side of one bridge socket.
pub struct BridgeSession {
    write_tx: mpsc::UnboundedSender<String>,
    pending: PendingRequests,
    request_timeout: Duration,
}

impl BridgeSession {
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let id = uuid::Uuid::new_v4().to_string();
        let frame = BridgeFrame::Request(RequestFrame {
            id: id.clone(),
            method: method.into(),
            params: Some(params),
        });
        let text = serde_json::to_string(&frame)?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), tx);
        if self.write_tx.send(text).is_err() {
            self.pending.lock().await.remove(&id);
            return Err(Error::unavailable("bridge socket closed"));
        }

        let response = match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => return Err(Error::unavailable("bridge socket closed")),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                return Err(Error::unavailable(format!(
                    "{method} timed out after {}s",
                    self.request_timeout.as_secs_f32()
                )));
            },
        };

        if response.ok {
            Ok(response.payload.unwrap_or(Value::Null))
        } else {
            Err(Error::external(
                method,
                std::io::Error::other(response.error_message()),
            ))
        }
    }
}

#[async_trait]
impl Session for BridgeSession {
    async fn send_text(&self, jid: &str, text: &str, quoted: &InboundEvent) -> Result<()> {
        self.request(
            methods::SEND_TEXT,
            json!({ "jid": jid, "text": text, "quoted": quoted }),
        )
        .await?;
        Ok(())
    }

    async fn send_sticker(
        &self,
        jid: &str,
        sticker: Vec<u8>,
        quoted: &InboundEvent,
    ) -> Result<()> {
        self.request(
            methods::SEND_STICKER,
            json!({ "jid": jid, "sticker": BASE64.encode(&sticker), "quoted": quoted }),
        )
        .await?;
        Ok(())
    }

    async fn fetch_media(&self, descriptor: &MediaDescriptor) -> Result<MediaStream> {
        let payload = self
            .request(
                methods::DOWNLOAD_MEDIA,
                json!({
                    "kind": descriptor.kind,
                    "mimetype": descriptor.mimetype,
                    "gifPlayback": descriptor.gif_playback,
                    "media": descriptor.reference,
                }),
            )
            .await?;
        let encoded = payload
            .get("data")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::invalid_input("downloadMedia response has no data"))?;
        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| Error::external("decode downloaded media", e))?;
        Ok(futures::stream::once(async move { Ok(Bytes::from(bytes)) }).boxed())
    }
}

/// Owns the socket until either side goes away.
async fn run_socket(
    socket: BridgeSocket,
    mut write_rx: mpsc::UnboundedReceiver<String>,
    events_tx: mpsc::Sender<SessionEvent>,
    pending: PendingRequests,
) {
    let (mut sink, mut reader) = socket.split();

    loop {
        tokio::select! {
            msg = reader.next() => {
                match msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        if !route_frame(text.as_str(), &events_tx, &pending).await {
                            break;
                        }
                    },
                    Some(Ok(WsMessage::Ping(data))) => {
                        if let Err(e) = sink.send(WsMessage::Pong(data)).await {
                            warn!(error = %e, "bridge pong failed");
                            break;
                        }
                    },
                    Some(Ok(WsMessage::Close(_))) | None => {
                        info!("bridge closed the socket");
                        break;
                    },
                    Some(Ok(_)) => {},
                    Some(Err(e)) => {
                        warn!(error = %e, "bridge socket error");
                        break;
                    },
                }
            },
            text = write_rx.recv() => {
                match text {
                    Some(text) => {
                        if let Err(e) = sink.send(WsMessage::Text(text.into())).await {
                            warn!(error = %e, "bridge write failed");
                            break;
                        }
                    },
                    None => {
                        let _ = sink.send(WsMessage::Close(None)).await;
                        break;
                    },
                }
            },
            () = events_tx.closed() => {
                debug!("bot detached from bridge session");
                let _ = sink.send(WsMessage::Close(None)).await;
                break;
            },
        }
    }

    // Fail callers first, then end the event stream.
    drop(write_rx);
    pending.lock().await.clear();
    drop(events_tx);
}

/// Dispatch one text frame. Returns `false` once the bot stopped listening.
async fn route_frame(
    text: &str,
    events_tx: &mpsc::Sender<SessionEvent>,
    pending: &PendingRequests,
) -> bool {
    match serde_json::from_str::<BridgeFrame>(text) {
        Ok(BridgeFrame::Response(response)) => {
            match pending.lock().await.remove(&response.id) {
                Some(waiter) => {
                    let _ = waiter.send(response);
                },
                None => debug!(id = %response.id, "response for an unknown request"),
            }
        },
        Ok(BridgeFrame::Event(frame)) => {
            let name = frame.event.clone();
            match frame.into_session_event() {
                Ok(Some(event)) => return events_tx.send(event).await.is_ok(),
                Ok(None) => debug!(event = %name, "ignoring bridge event"),
                Err(e) => warn!(event = %name, error = %e, "malformed bridge event"),
            }
        },
        Ok(BridgeFrame::Request(request)) => {
            debug!(method = %request.method, "ignoring request from bridge");
        },
        Err(e) => warn!(error = %e, "unparseable bridge frame"),
    }
    true
}
