//! Shared test fixtures: an in-process duplex transport pair wiring a
//! client peer and an agent peer together without a real process boundary.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use airs_acp::protocol::JsonRpcMessage;
use airs_acp::transport::{MessageHandler, Transport, TransportError};

/// Install the test log subscriber once; `RUST_LOG` controls verbosity.
#[allow(dead_code)]
pub fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// One end of an in-process transport pair
///
/// Messages sent on one end arrive at the other end's handler in order.
/// Closing either end delivers EOF (and thus `handle_close`) to the peer.
pub struct DuplexTransport {
    tx: Option<mpsc::UnboundedSender<JsonRpcMessage>>,
    rx: Arc<Mutex<Option<mpsc::UnboundedReceiver<JsonRpcMessage>>>>,
    handler: Arc<dyn MessageHandler>,
    connected: Arc<AtomicBool>,
    close_fired: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl DuplexTransport {
    /// Build a connected pair; the first end talks to `first_handler`'s
    /// peer and vice versa.
    pub fn pair(
        first_handler: Arc<dyn MessageHandler>,
        second_handler: Arc<dyn MessageHandler>,
    ) -> (Self, Self) {
        let (tx_first, rx_second) = mpsc::unbounded_channel();
        let (tx_second, rx_first) = mpsc::unbounded_channel();

        let first = Self {
            tx: Some(tx_first),
            rx: Arc::new(Mutex::new(Some(rx_first))),
            handler: first_handler,
            connected: Arc::new(AtomicBool::new(true)),
            close_fired: Arc::new(AtomicBool::new(false)),
            reader: None,
        };
        let second = Self {
            tx: Some(tx_second),
            rx: Arc::new(Mutex::new(Some(rx_second))),
            handler: second_handler,
            connected: Arc::new(AtomicBool::new(true)),
            close_fired: Arc::new(AtomicBool::new(false)),
            reader: None,
        };
        (first, second)
    }

    async fn fire_close(
        handler: &Arc<dyn MessageHandler>,
        connected: &Arc<AtomicBool>,
        close_fired: &Arc<AtomicBool>,
    ) {
        connected.store(false, Ordering::SeqCst);
        if !close_fired.swap(true, Ordering::SeqCst) {
            handler.handle_close().await;
        }
    }
}

#[async_trait]
impl Transport for DuplexTransport {
    async fn start(&mut self) -> Result<(), TransportError> {
        let rx = self.rx.lock().await.take();
        let Some(mut rx) = rx else {
            return Ok(());
        };

        let handler = Arc::clone(&self.handler);
        let connected = Arc::clone(&self.connected);
        let close_fired = Arc::clone(&self.close_fired);

        self.reader = Some(tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                handler.handle_message(message).await;
            }
            Self::fire_close(&handler, &connected, &close_fired).await;
        }));
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        // Dropping the sender delivers EOF to the peer
        self.tx = None;
        Self::fire_close(&self.handler, &self.connected, &self.close_fired).await;
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        Ok(())
    }

    async fn send(&self, message: &JsonRpcMessage) -> Result<(), TransportError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::closed());
        }
        match &self.tx {
            Some(tx) => tx
                .send(message.clone())
                .map_err(|_| TransportError::closed()),
            None => Err(TransportError::closed()),
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn transport_type(&self) -> &'static str {
        "duplex"
    }
}
