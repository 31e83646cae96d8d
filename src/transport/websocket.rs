//! WebSocket transport over tokio-tungstenite

use super::{CloseFrame, Connector, Frame, Transport};
use crate::error::BoxError;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::borrow::Cow;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame as WsCloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

/// Connects to the gateway over TLS WebSocket
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>, BoxError> {
        let (stream, response) = connect_async(url).await?;
        debug!(url, status = %response.status(), "WebSocket handshake complete");
        Ok(Box::new(WebSocketTransport { stream }))
    }
}

/// A live gateway WebSocket
pub struct WebSocketTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, text: String) -> Result<(), BoxError> {
        self.stream.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<Frame, BoxError>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(e) => return Some(Err(e.into())),
            };

            match message {
                Message::Text(text) => return Some(Ok(Frame::Text(text))),
                Message::Binary(bytes) => match String::from_utf8(bytes) {
                    Ok(text) => return Some(Ok(Frame::Text(text))),
                    Err(e) => return Some(Err(e.into())),
                },
                Message::Close(frame) => {
                    return Some(Ok(Frame::Close(frame.map(|f| CloseFrame {
                        code: u16::from(f.code),
                        reason: f.reason.into_owned(),
                    }))))
                }
                // tungstenite answers pings itself
                other => trace!(kind = ?other, "Ignoring control frame"),
            }
        }
    }

    async fn close(&mut self, code: u16, reason: &str) -> Result<(), BoxError> {
        let frame = WsCloseFrame {
            code: CloseCode::from(code),
            reason: Cow::Owned(reason.to_string()),
        };
        self.stream.send(Message::Close(Some(frame))).await?;
        Ok(())
    }
}
