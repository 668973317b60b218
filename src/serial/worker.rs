//! # Port Worker
//!
//! Owns an open serial stream. A background task reads chunks and forwards
//! them, in order, over an unbounded channel so that slow rendering never
//! stalls the device. Writes go through an async mutex, one at a time.
//!
//! The reader finishes with exactly one of:
//! - [`PortEvent::Closed`] after [`PortWorker::close`] (normal termination),
//! - [`PortEvent::Disconnected`] when the device goes away.
//!
//! Open and write faults are returned as errors from the calls themselves.

use std::io::ErrorKind;
use std::sync::Mutex;

use log::{debug, error, info, warn};
use tokio::io::{self, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex as AsyncMutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration};

use super::port::{PortSettings, open_port};
use crate::error::{Result, SerialAssistantError};

/// Bytes requested from the device per read.
pub const READ_BUFFER_SIZE: usize = 1024;

/// How long [`PortWorker::close`] waits for the reader before aborting it.
pub const STOP_TIMEOUT: Duration = Duration::from_millis(50);

/// Messages from the reader task to the consumer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PortEvent {
    /// A raw chunk, exactly as read from the device.
    Data(Vec<u8>),
    /// The session was closed on request.
    Closed,
    /// The device stopped responding or vanished.
    Disconnected(String),
}

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Handle to a running serial session.
pub struct PortWorker {
    port_name: String,
    writer: AsyncMutex<Option<BoxedWriter>>,
    stop_tx: watch::Sender<bool>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl PortWorker {
    /// Opens the device described by `settings` and starts reading from it.
    pub fn open(settings: &PortSettings) -> Result<(Self, mpsc::UnboundedReceiver<PortEvent>)> {
        let stream = open_port(settings)?;
        Ok(Self::spawn(settings.port_name.as_str(), stream))
    }

    /// Starts a worker over any byte stream. Must be called inside a Tokio runtime.
    pub fn spawn<T>(
        port_name: impl Into<String>,
        stream: T,
    ) -> (Self, mpsc::UnboundedReceiver<PortEvent>)
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let port_name = port_name.into();
        let (read_half, write_half) = io::split(stream);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = watch::channel(false);

        let reader = tokio::spawn(read_loop(
            port_name.clone(),
            read_half,
            event_tx,
            stop_rx,
        ));
        info!("Port worker started for {port_name}");

        let worker = Self {
            port_name,
            writer: AsyncMutex::new(Some(Box::new(write_half))),
            stop_tx,
            reader: Mutex::new(Some(reader)),
        };
        (worker, event_rx)
    }

    /// Name of the underlying device.
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Whether [`close`](Self::close) has been requested.
    pub fn is_closed(&self) -> bool {
        *self.stop_tx.borrow()
    }

    /// Writes all of `data`. Concurrent callers are serialized.
    pub async fn write(&self, data: &[u8]) -> Result<()> {
        let mut guard = self.writer.lock().await;
        let Some(writer) = guard.as_mut() else {
            return Err(SerialAssistantError::port_closed(self.port_name.as_str()));
        };

        if let Err(e) = writer.write_all(data).await {
            error!("Write to {} failed: {e}", self.port_name);
            return Err(SerialAssistantError::port_write(e.to_string()));
        }
        if let Err(e) = writer.flush().await {
            error!("Flush of {} failed: {e}", self.port_name);
            return Err(SerialAssistantError::port_write(e.to_string()));
        }
        debug!("Wrote {} byte(s) to {}", data.len(), self.port_name);
        Ok(())
    }

    /// Stops the reader and releases the write half.
    ///
    /// Waits for an in-flight write to finish. The reader observes the stop
    /// signal immediately and is aborted if it has not exited after
    /// [`STOP_TIMEOUT`].
    pub async fn close(&self) {
        self.stop_tx.send_replace(true);
        self.writer.lock().await.take();

        let handle = match self.reader.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(mut handle) = handle
            && time::timeout(STOP_TIMEOUT, &mut handle).await.is_err()
        {
            warn!(
                "Reader for {} did not stop within {STOP_TIMEOUT:?}, aborting",
                self.port_name
            );
            handle.abort();
        }
        info!("Closed serial port {}", self.port_name);
    }
}

async fn read_loop<R>(
    port_name: String,
    mut reader: R,
    events: mpsc::UnboundedSender<PortEvent>,
    mut stop: watch::Receiver<bool>,
) where
    R: AsyncRead + Unpin,
{
    let mut buffer = [0u8; READ_BUFFER_SIZE];
    loop {
        tokio::select! {
            biased;
            _ = stop.changed() => {
                debug!("Reader for {port_name} stopping");
                let _ = events.send(PortEvent::Closed);
                break;
            }
            result = reader.read(&mut buffer) => match result {
                Ok(0) => {
                    warn!("Serial port {port_name} reached end of stream");
                    let _ = events.send(PortEvent::Disconnected("end of stream".to_string()));
                    break;
                }
                Ok(len) => {
                    if events.send(PortEvent::Data(buffer[..len].to_vec())).is_err() {
                        debug!("Event receiver for {port_name} dropped");
                        break;
                    }
                }
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::Interrupted | ErrorKind::WouldBlock) => {}
                Err(e) => {
                    error!("Read from {port_name} failed: {e}");
                    let _ = events.send(PortEvent::Disconnected(e.to_string()));
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::time::Instant;

    async fn next_event(events: &mut mpsc::UnboundedReceiver<PortEvent>) -> PortEvent {
        time::timeout(Duration::from_secs(1), events.recv())
            .await
            .expect("event within a second")
            .expect("event channel open")
    }

    #[tokio::test]
    async fn test_chunks_arrive_in_order() {
        let (mut device, host) = io::duplex(64);
        let (worker, mut events) = PortWorker::spawn("loopback", host);

        device.write_all(b"hello ").await.unwrap();
        device.write_all(b"world").await.unwrap();

        let mut received = Vec::new();
        while received.len() < 11 {
            match next_event(&mut events).await {
                PortEvent::Data(chunk) => received.extend(chunk),
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert_eq!(received, b"hello world");
        worker.close().await;
    }

    #[tokio::test]
    async fn test_write_reaches_device() {
        let (mut device, host) = io::duplex(64);
        let (worker, _events) = PortWorker::spawn("loopback", host);

        worker.write(b"AT\r\n").await.unwrap();
        let mut buf = [0u8; 4];
        device.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"AT\r\n");
    }

    #[tokio::test]
    async fn test_concurrent_writes_do_not_interleave() {
        let (mut device, host) = io::duplex(16);
        let (worker, _events) = PortWorker::spawn("loopback", host);
        let worker = Arc::new(worker);

        let first = {
            let worker = Arc::clone(&worker);
            tokio::spawn(async move { worker.write(&[b'A'; 512]).await })
        };
        let second = {
            let worker = Arc::clone(&worker);
            tokio::spawn(async move { worker.write(&[b'B'; 512]).await })
        };

        let mut out = vec![0u8; 1024];
        device.read_exact(&mut out).await.unwrap();
        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        let lead = out[0];
        assert!(out[..512].iter().all(|&b| b == lead));
        assert!(out[512..].iter().all(|&b| b != lead));
    }

    #[tokio::test]
    async fn test_close_is_reported_as_closed_not_error() {
        let (_device, host) = io::duplex(64);
        let (worker, mut events) = PortWorker::spawn("loopback", host);

        let started = Instant::now();
        worker.close().await;
        assert_eq!(next_event(&mut events).await, PortEvent::Closed);
        assert!(started.elapsed() < Duration::from_millis(250));
        assert!(worker.is_closed());
        assert!(events.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_write_after_close_is_rejected() {
        let (_device, host) = io::duplex(64);
        let (worker, _events) = PortWorker::spawn("loopback", host);

        worker.close().await;
        let error = worker.write(b"late").await.unwrap_err();
        assert!(matches!(error, SerialAssistantError::PortClosed(_)));
        assert!(!error.is_device_fault());
    }

    #[tokio::test]
    async fn test_vanished_device_is_reported_as_disconnect() {
        let (device, host) = io::duplex(64);
        let (_worker, mut events) = PortWorker::spawn("loopback", host);

        drop(device);
        assert!(matches!(
            next_event(&mut events).await,
            PortEvent::Disconnected(_)
        ));
    }

    #[tokio::test]
    async fn test_write_to_vanished_device_is_a_device_fault() {
        let (device, host) = io::duplex(64);
        let (worker, _events) = PortWorker::spawn("loopback", host);

        drop(device);
        let error = worker.write(b"ping").await.unwrap_err();
        assert!(matches!(error, SerialAssistantError::PortWrite(_)));
        assert!(error.is_device_fault());
    }

    #[tokio::test]
    async fn test_data_before_close_is_delivered_first() {
        let (mut device, host) = io::duplex(64);
        let (worker, mut events) = PortWorker::spawn("loopback", host);

        device.write_all(b"x").await.unwrap();
        assert_eq!(next_event(&mut events).await, PortEvent::Data(b"x".to_vec()));
        worker.close().await;
        assert_eq!(next_event(&mut events).await, PortEvent::Closed);
    }
}
