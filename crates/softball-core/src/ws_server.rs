// WebSocket server: one JSON request per text frame, one reply per request.

use std::sync::Arc;

use futures_util::stream::Stream;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

/// Turns one request payload into one reply payload. Implementations must not
/// fail: errors are encoded in the reply.
pub trait RequestHandler: Send + Sync + 'static {
    fn handle(&self, request: &str) -> String;
}

/// Run the WebSocket server on `bind:port`, serving each connection on its
/// own task. Runs until the task is cancelled or accepting fails.
pub async fn run<H: RequestHandler>(bind: &str, port: u16, handler: Arc<H>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(format!("{bind}:{port}")).await?;
    serve(listener, handler).await
}

/// Accept loop over an already-bound listener.
pub async fn serve<H: RequestHandler>(listener: TcpListener, handler: Arc<H>) -> anyhow::Result<()> {
    let local_addr = listener.local_addr()?;
    info!("WebSocket server listening on {local_addr}");

    loop {
        let (stream, addr) = listener.accept().await?;
        let addr_str = addr.to_string();
        info!("Accepted TCP connection from {addr_str}");

        let handler = Arc::clone(&handler);
        tokio::spawn(async move {
            serve_connection(stream, addr_str, handler).await;
        });
    }
}

/// Handshake, then pump requests through `handler` until the client goes
/// away. Replies are written by a separate task fed through a channel so the
/// read loop never waits on a slow socket write.
async fn serve_connection<H: RequestHandler>(stream: TcpStream, addr: String, handler: Arc<H>) {
    let ws_stream = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake failed for {addr}: {e}");
            return;
        }
    };

    let (mut write, read) = ws_stream.split();
    let (reply_tx, mut reply_rx) = mpsc::channel::<Message>(64);

    let writer_addr = addr.clone();
    let writer = tokio::spawn(async move {
        while let Some(reply) = reply_rx.recv().await {
            if let Err(e) = write.send(reply).await {
                warn!("Failed to send reply to {writer_addr}: {e}");
                break;
            }
        }
    });

    let _ = process_message_stream(read, &handler, &reply_tx, &addr).await;
    drop(reply_tx);
    let _ = writer.await;

    info!("Client {addr} disconnected");
}

/// Answer each text message from `stream` with `handler`'s reply, sent
/// through `reply_tx` in request order. The handler does blocking store work,
/// so each call runs on the blocking pool, one at a time per connection.
/// Non-text frames are ignored; a close frame or read error ends processing.
/// A request whose handler panics gets no reply. Returns `Err(())` if the
/// reply channel is closed.
///
/// Generic over the stream so it can be tested with in-memory streams
/// without opening TCP ports.
pub async fn process_message_stream<St, H>(
    mut stream: St,
    handler: &Arc<H>,
    reply_tx: &mpsc::Sender<Message>,
    addr: &str,
) -> Result<(), ()>
where
    St: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
    H: RequestHandler,
{
    while let Some(msg_result) = stream.next().await {
        match msg_result {
            Ok(Message::Text(text)) => {
                debug!("Request from {addr}: {} bytes", text.len());
                let handler = Arc::clone(handler);
                let result =
                    tokio::task::spawn_blocking(move || handler.handle(text.as_str())).await;
                let reply = match result {
                    Ok(reply) => reply,
                    Err(e) => {
                        error!("Request handler for {addr} failed: {e}");
                        continue;
                    }
                };
                if reply_tx.send(Message::Text(reply.into())).await.is_err() {
                    return Err(());
                }
            }
            Ok(Message::Close(_)) => {
                info!("Client {addr} sent close frame");
                break;
            }
            Err(e) => {
                warn!("WebSocket error from {addr}: {e}");
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
    use futures_util::stream;
    use tokio_tungstenite::tungstenite::Error as WsError;

    /// Replies with the request upper-cased.
    struct Shout;

    impl RequestHandler for Shout {
        fn handle(&self, request: &str) -> String {
            request.to_uppercase()
        }
    }

    fn shout() -> Arc<Shout> {
        Arc::new(Shout)
    }

    /// Records the thread each request ran on; panics on "boom".
    struct ThreadRecorder(std::sync::Mutex<Vec<std::thread::ThreadId>>);

    impl RequestHandler for ThreadRecorder {
        fn handle(&self, request: &str) -> String {
            if request == "boom" {
                panic!("handler failure");
            }
            self.0.lock().unwrap().push(std::thread::current().id());
            request.to_string()
        }
    }

    fn mock_stream(
        messages: Vec<Result<Message, WsError>>,
    ) -> impl Stream<Item = Result<Message, WsError>> + Unpin {
        stream::iter(messages)
    }

    fn text(reply: Message) -> String {
        match reply {
            Message::Text(t) => t.to_string(),
            other => panic!("expected text reply, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn each_request_gets_one_reply_in_order() {
        let (tx, mut rx) = mpsc::channel(64);
        let messages = vec![
            Ok(Message::Text("first".into())),
            Ok(Message::Text("second".into())),
        ];

        process_message_stream(mock_stream(messages), &shout(), &tx, "test")
            .await
            .unwrap();

        assert_eq!(text(rx.recv().await.unwrap()), "FIRST");
        assert_eq!(text(rx.recv().await.unwrap()), "SECOND");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn close_frame_stops_processing() {
        let (tx, mut rx) = mpsc::channel(64);
        let messages = vec![
            Ok(Message::Text("before_close".into())),
            Ok(Message::Close(None)),
            Ok(Message::Text("after_close".into())),
        ];

        process_message_stream(mock_stream(messages), &shout(), &tx, "test")
            .await
            .unwrap();

        assert_eq!(text(rx.recv().await.unwrap()), "BEFORE_CLOSE");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn error_stops_processing() {
        let (tx, mut rx) = mpsc::channel(64);
        let messages = vec![
            Ok(Message::Text("before_error".into())),
            Err(WsError::ConnectionClosed),
            Ok(Message::Text("after_error".into())),
        ];

        process_message_stream(mock_stream(messages), &shout(), &tx, "test")
            .await
            .unwrap();

        assert_eq!(text(rx.recv().await.unwrap()), "BEFORE_ERROR");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn binary_and_ping_messages_are_ignored() {
        let (tx, mut rx) = mpsc::channel(64);
        let messages = vec![
            Ok(Message::Binary(vec![1, 2, 3].into())),
            Ok(Message::Ping(vec![].into())),
            Ok(Message::Pong(vec![].into())),
            Ok(Message::Text("after_ignored".into())),
        ];

        process_message_stream(mock_stream(messages), &shout(), &tx, "test")
            .await
            .unwrap();

        assert_eq!(text(rx.recv().await.unwrap()), "AFTER_IGNORED");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn returns_err_when_reply_channel_closed() {
        let (tx, rx) = mpsc::channel(64);
        drop(rx);

        let messages = vec![Ok(Message::Text("orphan".into()))];
        let result = process_message_stream(mock_stream(messages), &shout(), &tx, "test").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn empty_stream_completes_normally() {
        let (tx, mut rx) = mpsc::channel(64);
        let messages: Vec<Result<Message, WsError>> = vec![];

        process_message_stream(mock_stream(messages), &shout(), &tx, "test")
            .await
            .unwrap();

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn handler_runs_off_the_async_thread() {
        let (tx, mut rx) = mpsc::channel(64);
        let handler = Arc::new(ThreadRecorder(std::sync::Mutex::new(Vec::new())));
        let messages = vec![Ok(Message::Text("one".into()))];

        process_message_stream(mock_stream(messages), &handler, &tx, "test")
            .await
            .unwrap();

        assert_eq!(text(rx.recv().await.unwrap()), "one");
        let seen = handler.0.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_ne!(seen[0], std::thread::current().id());
    }

    #[tokio::test]
    async fn panicking_handler_skips_only_that_request() {
        let (tx, mut rx) = mpsc::channel(64);
        let handler = Arc::new(ThreadRecorder(std::sync::Mutex::new(Vec::new())));
        let messages = vec![
            Ok(Message::Text("boom".into())),
            Ok(Message::Text("still_here".into())),
        ];

        process_message_stream(mock_stream(messages), &handler, &tx, "test")
            .await
            .unwrap();

        assert_eq!(text(rx.recv().await.unwrap()), "still_here");
        assert!(rx.try_recv().is_err());
    }
}
