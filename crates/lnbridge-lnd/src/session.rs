use bytes::Bytes;
use chrono::Utc;
use lnbridge_core::lightning::backend::InvoiceListener;
use lnbridge_core::lightning::error::LightningError;
use lnbridge_core::lightning::types::LightningInvoice;
use lnbridge_core::metrics::{ACTIVE_INVOICE_STREAMS, INVOICE_EVENTS_TOTAL};
use prometheus::Gauge;
use reqwest::Client;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncBufReadExt, Lines};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::mapper::map_invoice;
use crate::rest::ByteStream;
use crate::wire::{decode_stream_line, StreamItem};

// Queue bound; the reader suspends when it is full.
pub const QUEUE_CAPACITY: usize = 50;

type LineReader = Lines<StreamReader<ByteStream, Bytes>>;

// Item flowing through the queue. Cancellation and clean close are
// signalled by closing the queue.
#[derive(Debug)]
enum InvoiceEvent {
    Invoice(LightningInvoice),
    Failed(LightningError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ExitReason {
    Cancelled,
    RemoteClosed,
    RemoteError,
    ProtocolViolation,
    ReadFailed,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Cancelled => write!(f, "cancelled"),
            ExitReason::RemoteClosed => write!(f, "remote_closed"),
            ExitReason::RemoteError => write!(f, "remote_error"),
            ExitReason::ProtocolViolation => write!(f, "protocol_violation"),
            ExitReason::ReadFailed => write!(f, "read_failed"),
        }
    }
}

struct Consumer {
    events: mpsc::Receiver<InvoiceEvent>,
    terminal: Option<LightningError>,
}

pub struct InvoiceSession {
    consumer: Mutex<Consumer>,
    shutdown: CancellationToken,
    reader: std::sync::Mutex<Option<JoinHandle<()>>>,
    released: AtomicBool,
}

impl InvoiceSession {
    // Starts reading `body` immediately. `transport` is the client that
    // produced the body; it is dropped after the reader.
    pub fn start(body: ByteStream, transport: Option<Client>) -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let shutdown = CancellationToken::new();
        let lines = StreamReader::new(body).lines();
        let handle = tokio::spawn(read_loop(lines, transport, tx, shutdown.clone()));

        InvoiceSession {
            consumer: Mutex::new(Consumer {
                events: rx,
                terminal: None,
            }),
            shutdown,
            reader: std::sync::Mutex::new(Some(handle)),
            released: AtomicBool::new(false),
        }
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// Next invoice in wire order. Firing `cancel` aborts only this wait.
    pub async fn wait_invoice(
        &self,
        cancel: &CancellationToken,
    ) -> Result<LightningInvoice, LightningError> {
        if self.is_released() {
            return Err(LightningError::Cancelled);
        }
        let mut consumer = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LightningError::Cancelled),
            guard = self.consumer.lock() => guard,
        };
        if let Some(err) = &consumer.terminal {
            return Err(err.clone());
        }

        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LightningError::Cancelled),
            event = consumer.events.recv() => event,
        };
        if self.is_released() {
            return Err(LightningError::Cancelled);
        }

        match event {
            Some(InvoiceEvent::Invoice(invoice)) => Ok(invoice),
            Some(InvoiceEvent::Failed(err)) => {
                consumer.terminal = Some(err.clone());
                Err(err)
            }
            None => Err(LightningError::Cancelled),
        }
    }

    /// Stops the reader and waits until it has exited. Calls after the
    /// first return immediately.
    pub async fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shutdown.cancel();
        let handle = match self.reader.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("invoice stream reader did not exit cleanly: {e}");
            }
        }
    }
}

impl Drop for InvoiceSession {
    fn drop(&mut self) {
        // Non-blocking: the reader observes the token and exits on its own.
        self.released.store(true, Ordering::SeqCst);
        self.shutdown.cancel();
    }
}

#[async_trait::async_trait]
impl InvoiceListener for InvoiceSession {
    async fn wait_invoice(
        &self,
        cancel: &CancellationToken,
    ) -> Result<LightningInvoice, LightningError> {
        InvoiceSession::wait_invoice(self, cancel).await
    }

    async fn release(&self) {
        InvoiceSession::release(self).await
    }
}

async fn publish(
    tx: &mpsc::Sender<InvoiceEvent>,
    shutdown: &CancellationToken,
    event: InvoiceEvent,
) -> bool {
    tokio::select! {
        biased;
        _ = shutdown.cancelled() => false,
        sent = tx.send(event) => sent.is_ok(),
    }
}

async fn read_lines(
    lines: &mut LineReader,
    tx: &mpsc::Sender<InvoiceEvent>,
    shutdown: &CancellationToken,
) -> ExitReason {
    loop {
        let line = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return ExitReason::Cancelled,
            line = lines.next_line() => line,
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => return ExitReason::RemoteClosed,
            Err(_) if shutdown.is_cancelled() => return ExitReason::Cancelled,
            Err(e) => {
                publish(
                    tx,
                    shutdown,
                    InvoiceEvent::Failed(LightningError::StreamError(e.to_string())),
                )
                .await;
                return ExitReason::ReadFailed;
            }
        };

        let (event, exit) = match decode_stream_line(&line) {
            Ok(StreamItem::Invoice(wire)) => match map_invoice(&wire, Utc::now()) {
                Ok(invoice) => (InvoiceEvent::Invoice(invoice), None),
                Err(e) => (
                    InvoiceEvent::Failed(LightningError::ProtocolViolation(e.to_string())),
                    Some(ExitReason::ProtocolViolation),
                ),
            },
            Ok(StreamItem::Error(remote)) => (
                InvoiceEvent::Failed(LightningError::Remote(remote)),
                Some(ExitReason::RemoteError),
            ),
            Err(e) => (InvoiceEvent::Failed(e), Some(ExitReason::ProtocolViolation)),
        };

        let kind = match &event {
            InvoiceEvent::Invoice(_) => "invoice",
            InvoiceEvent::Failed(_) => "failure",
        };
        INVOICE_EVENTS_TOTAL.with_label_values(&[kind]).inc();

        if !publish(tx, shutdown, event).await {
            return ExitReason::Cancelled;
        }
        if let Some(exit) = exit {
            return exit;
        }
    }
}

// Keeps the active-stream gauge balanced even if the reader task is
// aborted or panics.
struct ActiveStream(Gauge);

impl ActiveStream {
    fn enter(gauge: &Gauge) -> Self {
        gauge.inc();
        ActiveStream(gauge.clone())
    }
}

impl Drop for ActiveStream {
    fn drop(&mut self) {
        self.0.dec();
    }
}

async fn read_loop(
    mut lines: LineReader,
    transport: Option<Client>,
    tx: mpsc::Sender<InvoiceEvent>,
    shutdown: CancellationToken,
) {
    let _active = ActiveStream::enter(&ACTIVE_INVOICE_STREAMS);
    debug!("invoice stream started");

    let reason = read_lines(&mut lines, &tx, &shutdown).await;

    // Reader wraps the byte stream which wraps the response; all of them
    // go before the client that owns the connection.
    drop(lines);
    drop(transport);
    drop(tx);
    shutdown.cancel();

    info!("invoice stream closed: {reason}");
}
