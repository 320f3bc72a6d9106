use std::time::Duration;

use futures_util::SinkExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

use crate::error::{SessionError, SessionStage};

/// Sends and flushes one message, failing when it does not complete within
/// `deadline`.
pub(super) async fn send_within<S>(
    websocket: &mut WebSocketStream<S>,
    message: Message,
    deadline: Duration,
    stage: SessionStage,
) -> Result<(), SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match timeout(deadline, websocket.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(SessionError::Transport {
            stage,
            source: Box::new(err),
        }),
        Err(_) => Err(SessionError::WriteTimeout {
            stage,
            timeout: deadline,
        }),
    }
}
