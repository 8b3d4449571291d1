//! Host-side driver: owns one [`crate::correlation::CorrelationBuffer`]
//! and a background reader task that feeds it, so `send`/`get_response` can be
//! called concurrently from as many callers as like.
//!
//! `connect` spawns a background reader and hands the caller a thin,
//! cloneable handle that talks to it through shared state, over a generic
//! `tokio::io::{AsyncRead, AsyncWrite}` stream split with `tokio::io::split`
//! so reads and writes can run concurrently.

use crate::commands::NODE_INFO_CMD;
use crate::config::GsbpConfig;
use crate::correlation::{CorrelationBuffer, UnsolicitedResponse};
use crate::error::Error;
use crate::messages::{MessageAck, NodeInfo};
use crate::statistics::Statistics;
use bytes::Bytes;
use gsbp_core::{Handle, Package, ProtocolDescriptor, ReassemblerOutcome, TransportKind, build_package};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// A connected GSBP host. Cloning is cheap — every clone shares the same
/// correlation buffer, writer and background reader.
#[derive(Clone)]
pub struct GsbpHost {
    inner: Arc<HostInner>,
}

struct HostInner {
    writer: Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
    correlation: Mutex<CorrelationBuffer>,
    stats: Mutex<Statistics>,
    descriptor: ProtocolDescriptor,
    response_timeout: Duration,
    shutdown: Arc<AtomicBool>,
    reader_task: Mutex<Option<JoinHandle<()>>>,
}

impl GsbpHost {
    /// Splits `stream` into independent read/write halves and spawns the
    /// background reassembly-and-correlate loop. `stream` is typically a
    /// [`crate::transport::SerialTransport`]'s inner stream or an in-memory
    /// duplex half — any `AsyncRead + AsyncWrite` works.
    pub fn connect<S>(stream: S, config: &GsbpConfig) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let correlation = Mutex::new(CorrelationBuffer::new(config.correlation_capacity));
        let stats = Mutex::new(Statistics::new());
        let shutdown = Arc::new(AtomicBool::new(false));
        let descriptor = config.descriptor;
        let scratch_capacity = config.scratch_capacity;

        let inner = Arc::new(HostInner {
            writer: Mutex::new(Box::new(write_half)),
            correlation,
            stats,
            descriptor,
            response_timeout: config.response_timeout,
            shutdown: shutdown.clone(),
            reader_task: Mutex::new(None),
        });

        let host = GsbpHost { inner };
        let reader_inner = host.inner.clone();
        let task = tokio::spawn(Self::reader_loop(
            read_half,
            descriptor,
            scratch_capacity,
            reader_inner,
            shutdown,
        ));
        // `reader_task` is only written here, before the handle escapes
        // this function, so `try_lock` can't contend.
        *host.inner.reader_task.try_lock().expect("uncontended at connect time") = Some(task);
        host
    }

    async fn reader_loop<R>(
        mut reader: R,
        descriptor: ProtocolDescriptor,
        scratch_capacity: usize,
        inner: Arc<HostInner>,
        shutdown: Arc<AtomicBool>,
    ) where
        R: AsyncRead + Unpin,
    {
        use tokio::io::AsyncReadExt;

        let mut handle = Handle::new(descriptor, scratch_capacity);
        handle.activate(0, TransportKind::Serial);
        let mut buf = vec![0u8; 1024];

        loop {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            let n = match reader.read(&mut buf).await {
                Ok(0) => {
                    tracing::info!("host transport closed");
                    break;
                }
                Ok(n) => n,
                Err(e) => {
                    tracing::warn!(error = %e, "host transport read error");
                    break;
                }
            };
            tracing::debug!(bytes = %hex::encode(&buf[..n]), "host read");

            if handle.append_scratch(&buf[..n]).is_err() {
                tracing::warn!("reassembly scratch overflowed, oldest bytes dropped");
            }

            loop {
                match build_package(&mut handle) {
                    ReassemblerOutcome::Framed(package) => {
                        Self::route_incoming(&inner, package).await;
                    }
                    ReassemblerOutcome::AwaitingMoreData | ReassemblerOutcome::NoNewData => break,
                    ReassemblerOutcome::ChecksumMismatch { discarded } => {
                        let mut stats = inner.stats.lock().await;
                        stats.record_broken_checksum(discarded as u64);
                        if discarded == 0 {
                            break;
                        }
                    }
                    ReassemblerOutcome::NoStartSentinel { discarded } | ReassemblerOutcome::EndByteMismatch { discarded } => {
                        let mut stats = inner.stats.lock().await;
                        stats.record_broken_structure(discarded as u64);
                        if discarded == 0 {
                            break;
                        }
                    }
                }
            }
        }
    }

    async fn route_incoming(inner: &Arc<HostInner>, package: Package) {
        let outcome = {
            let mut correlation = inner.correlation.lock().await;
            correlation.add_response(package)
        };
        // Lock dropped above, before touching anything the caller might
        // also be waiting on — reentrancy note.
        {
            let mut stats = inner.stats.lock().await;
            stats.packages_received_good += 1;
        }
        if let UnsolicitedResponse::Message { message, owning_global_id } = outcome {
            if owning_global_id == 0 {
                Self::log_unsolicited_message(&message);
            }
        }
    }

    fn log_unsolicited_message(message: &MessageAck) {
        use crate::messages::Severity;
        match message.severity {
            Severity::CriticalError | Severity::Error => {
                tracing::error!(severity = %message.severity, text = %message.text, code = ?message.error_code, "unsolicited device message")
            }
            Severity::Warning => {
                tracing::warn!(severity = %message.severity, text = %message.text, "unsolicited device message")
            }
            Severity::Info | Severity::Invalid => {
                tracing::info!(severity = %message.severity, text = %message.text, "unsolicited device message")
            }
            Severity::Debug => {
                tracing::debug!(severity = %message.severity, text = %message.text, "unsolicited device message")
            }
        }
    }

    /// Frames and writes `payload` under `cmd_id`, assigning a fresh local
    /// and global request id. Returns the global id to pass to
    /// [`Self::get_response`].
    pub async fn send(&self, cmd_id: u16, payload: Bytes) -> Result<u64, Error> {
        let (package, global_id) = {
            let mut correlation = self.inner.correlation.lock().await;
            correlation.send(Package::new(cmd_id, 0, payload))
        };
        let framed = gsbp_core::codec::encode(&self.inner.descriptor, &package)?;
        tracing::debug!(bytes = %hex::encode(&framed), "host write");
        let mut writer = self.inner.writer.lock().await;
        writer.write_all(&framed).await?;
        Ok(global_id)
    }

    /// Waits for the response to `global_id`, using this host's configured
    /// response timeout.
    pub async fn get_response(&self, global_id: u64) -> Result<Package, Error> {
        self.get_response_filtered(global_id, None).await
    }

    /// Like [`Self::get_response`], but only matches a response whose
    /// command id is `expected_ack_cmd` — useful when a command may answer
    /// with either its normal ACK or a `MESSAGE_ACK` error and the caller
    /// wants to keep waiting for the former.
    ///
    /// Re-locks the correlation buffer between polling attempts rather than
    /// holding it for the whole wait, so the background reader task can
    /// still deliver the response that would satisfy this call.
    pub async fn get_response_filtered(
        &self,
        global_id: u64,
        expected_ack_cmd: Option<u16>,
    ) -> Result<Package, Error> {
        let deadline = tokio::time::Instant::now() + self.inner.response_timeout;
        loop {
            let timed_out = {
                let mut correlation = self.inner.correlation.lock().await;
                if let Some(result) = correlation.try_claim_response(global_id, expected_ack_cmd) {
                    return result.map(|(response, open_requests)| {
                        tracing::debug!(global_id, open_requests, "claimed response");
                        response
                    });
                }
                if tokio::time::Instant::now() >= deadline {
                    correlation.mark_timed_out(global_id);
                    true
                } else {
                    false
                }
            };
            if timed_out {
                self.inner.stats.lock().await.record_timeout();
                return Err(Error::GetResponseTimeout);
            }
            tokio::time::sleep(crate::correlation::POLL_INTERVAL).await;
        }
    }

    /// Sends `cmd_id`/`payload` and waits for its response in one call.
    pub async fn request(&self, cmd_id: u16, payload: Bytes) -> Result<Package, Error> {
        let global_id = self.send(cmd_id, payload).await?;
        self.get_response(global_id).await
    }

    /// Performs the connect-time handshake: sends `NODE_INFO_CMD` and
    /// decodes the device's [`NodeInfo`] reply.
    pub async fn identify(&self) -> Result<NodeInfo, Error> {
        let response = self.request(NODE_INFO_CMD, Bytes::new()).await?;
        NodeInfo::decode(response.payload).map_err(|_| Error::NodeInfoNotReceived)
    }

    pub async fn statistics(&self) -> Statistics {
        self.inner.stats.lock().await.clone()
    }

    /// Stops the background reader task. Already-buffered responses remain
    /// retrievable via [`Self::get_response`] until the host is dropped.
    pub async fn shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::Relaxed);
        if let Some(task) = self.inner.reader_task.lock().await.take() {
            let _ = task.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{NODE_INFO_ACK, UNIVERSAL_ACK};
    use crate::transport::in_memory_pair;
    use gsbp_core::ProtocolDescriptor;
    use tokio::io::AsyncReadExt;
    use tokio::io::AsyncWriteExt as _;

    fn reference_config() -> GsbpConfig {
        GsbpConfig::new().descriptor(ProtocolDescriptor::reference())
    }

    #[tokio::test]
    async fn send_then_respond_round_trips_through_get_response() {
        let (host_side, mut device_side) = in_memory_pair(256);
        let host = GsbpHost::connect(host_side, &reference_config());

        let device_task = tokio::spawn(async move {
            let mut buf = [0u8; 64];
            let n = device_side.read(&mut buf).await.unwrap();
            assert_eq!(&buf[..n], &[0x7E, 0x01, 0x00, 0x00, 0x00, 0x81]);
            let response = NodeInfo {
                board_id: 1,
                device_class: 1,
                serial_number: 1_904_010_001,
                protocol_version: [0, 1],
                firmware_version: [0, 1],
                description: String::new(),
            };
            let framed = gsbp_core::codec::encode(
                &ProtocolDescriptor::reference(),
                &Package::new(NODE_INFO_ACK, buf[3], response.encode()),
            )
            .unwrap();
            device_side.write_all(&framed).await.unwrap();
        });

        let info = host.identify().await.unwrap();
        assert_eq!(info.serial_number, 1_904_010_001);
        device_task.await.unwrap();
        host.shutdown().await;
    }

    #[tokio::test]
    async fn get_response_times_out_with_no_connected_device() {
        let (host_side, _device_side) = in_memory_pair(256);
        let host = GsbpHost::connect(
            host_side,
            &GsbpConfig::new()
                .descriptor(ProtocolDescriptor::reference())
                .response_timeout(Duration::from_millis(20)),
        );

        let global_id = host.send(UNIVERSAL_ACK, Bytes::new()).await.unwrap();
        let err = host.get_response(global_id).await.unwrap_err();
        assert!(matches!(err, Error::GetResponseTimeout));
        host.shutdown().await;
    }
}
