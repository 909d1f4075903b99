//! Console transport for development/testing

use std::sync::{Mutex, PoisonError};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use crate::application::errors::TransportError;
use crate::domain::entities::Message;
use crate::domain::traits::Transport;
use crate::infrastructure::transport::frames::render_text;

/// Room and user id given to everything typed on the console.
pub const CONSOLE_ID: &str = "CLI";

/// Reads messages from one stream and prints replies to another.
pub struct ConsoleTransport {
    inbound: Mutex<Option<mpsc::Receiver<Message>>>,
    outbound: mpsc::Sender<Message>,
}

impl ConsoleTransport {
    /// Wire the transport to the process's stdin and stdout.
    pub fn stdio() -> Self {
        Self::with_io(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }

    pub fn with_io<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncBufRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (inbound_tx, inbound_rx) = mpsc::channel(1);
        let (outbound_tx, outbound_rx) = mpsc::channel(1);

        tokio::spawn(read_loop(reader, inbound_tx));
        tokio::spawn(write_loop(writer, outbound_rx));

        Self {
            inbound: Mutex::new(Some(inbound_rx)),
            outbound: outbound_tx,
        }
    }
}

async fn read_loop<R: AsyncBufRead + Unpin>(reader: R, inbound: mpsc::Sender<Message>) {
    tracing::info!("console: started message intake loop");
    let mut lines = reader.lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let msg = Message::new(CONSOLE_ID, line)
                    .from_user(CONSOLE_ID, CONSOLE_ID)
                    .with_direct(true);
                if inbound.send(msg).await.is_err() {
                    return;
                }
            }
            Ok(None) => {
                tracing::info!("console: input closed");
                return;
            }
            Err(e) => {
                tracing::warn!("console: failed reading input: {}", e);
                return;
            }
        }
    }
}

async fn write_loop<W: AsyncWrite + Unpin>(mut writer: W, mut outbound: mpsc::Receiver<Message>) {
    while let Some(msg) = outbound.recv().await {
        let mention = format!("@{}", msg.to_user_name);
        let Some(text) = render_text(&msg.text, &mention) else {
            continue;
        };
        let line = format!("[BOT] {}\n", text);
        if let Err(e) = writer.write_all(line.as_bytes()).await {
            tracing::warn!("console: failed writing output: {}", e);
            continue;
        }
        if let Err(e) = writer.flush().await {
            tracing::warn!("console: failed flushing output: {}", e);
        }
    }
}

impl Transport for ConsoleTransport {
    fn inbound_channel(&self) -> Option<mpsc::Receiver<Message>> {
        self.inbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn outbound_channel(&self) -> mpsc::Sender<Message> {
        self.outbound.clone()
    }

    fn last_error(&self) -> Option<TransportError> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::task::{Context, Poll};
    use tokio::io::AsyncReadExt;

    /// Accepts every write, refuses every flush.
    struct NoFlush(Arc<Mutex<Vec<u8>>>);

    impl AsyncWrite for NoFlush {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Err(std::io::ErrorKind::BrokenPipe.into()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn lines_become_direct_messages() {
        let (_out, sink) = tokio::io::duplex(256);
        let transport = ConsoleTransport::with_io(&b"bender help\n"[..], sink);
        let mut inbound = transport.inbound_channel().unwrap();

        let msg = inbound.recv().await.unwrap();
        assert_eq!(msg.text, "bender help");
        assert_eq!(msg.room, CONSOLE_ID);
        assert_eq!(msg.from_user_id, CONSOLE_ID);
        assert!(msg.direct);
        assert!(transport.inbound_channel().is_none());
    }

    #[tokio::test]
    async fn replies_render_mentions_and_skip_blanks() {
        let (mut out, sink) = tokio::io::duplex(256);
        let transport = ConsoleTransport::with_io(&b""[..], sink);
        let outbound = transport.outbound_channel();

        outbound.send(Message::new(CONSOLE_ID, "  ")).await.unwrap();
        outbound
            .send(
                Message::new(CONSOLE_ID, "hi {{.User}} &amp; bye").to_user(CONSOLE_ID, "alice"),
            )
            .await
            .unwrap();

        let expected = "[BOT] hi @alice & bye\n";
        let mut buf = vec![0u8; expected.len()];
        out.read_exact(&mut buf).await.unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), expected);
    }

    #[tokio::test]
    async fn flush_failures_do_not_stop_output() {
        let written = Arc::new(Mutex::new(Vec::new()));
        let transport = ConsoleTransport::with_io(&b""[..], NoFlush(written.clone()));
        let outbound = transport.outbound_channel();

        outbound.send(Message::new(CONSOLE_ID, "one")).await.unwrap();
        outbound.send(Message::new(CONSOLE_ID, "two")).await.unwrap();

        let expected = b"[BOT] one\n[BOT] two\n".to_vec();
        let waited = tokio::time::timeout(std::time::Duration::from_secs(2), async {
            while *written.lock().unwrap() != expected {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(waited.is_ok(), "got {:?}", String::from_utf8_lossy(&written.lock().unwrap()));
    }
}
