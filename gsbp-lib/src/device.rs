//! Device-side driver: one [`GsbpDevice`] can serve several
//! links concurrently, each running its own reassembly loop against a
//! shared, mutex-guarded [`DeviceCommands`] implementation.
//!
//! Structured the same way as [`crate::host`]: a background task per
//! link, reading from any `AsyncRead + AsyncWrite` stream rather than a
//! single fixed interface. Where the host correlates responses against
//! outstanding requests, the device side runs the base command table
//! (`gsbp-lib`'s [`crate::dispatcher::dispatch_device_command`]) and
//! writes the result straight back out.

use crate::config::GsbpConfig;
use crate::dispatcher::{DeviceCommands, dispatch_device_command};
use crate::messages::NodeInfo;
use crate::statistics::Statistics;
use gsbp_core::{Handle, ProtocolDescriptor, ReassemblerOutcome, TransportKind, build_package};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// A GSBP device endpoint: identity, an application command handler, and
/// zero or more active links. Each [`Self::attach`] call spawns a task that
/// owns that link's [`Handle`] and runs until the stream closes or the
/// application's [`DeviceCommands::handle`] triggers `RESET_CMD`.
pub struct GsbpDevice<C: DeviceCommands + 'static> {
    app: Arc<Mutex<C>>,
    node_info: NodeInfo,
    device_class: u8,
    descriptor: ProtocolDescriptor,
    scratch_capacity: usize,
    stats: Arc<Mutex<Statistics>>,
    shutdown: Arc<AtomicBool>,
    tasks: Vec<JoinHandle<()>>,
}

impl<C: DeviceCommands + 'static> GsbpDevice<C> {
    pub fn new(node_info: NodeInfo, device_class: u8, app: C, config: &GsbpConfig) -> Self {
        GsbpDevice {
            app: Arc::new(Mutex::new(app)),
            node_info,
            device_class,
            descriptor: config.descriptor,
            scratch_capacity: config.scratch_capacity,
            stats: Arc::new(Mutex::new(Statistics::new())),
            shutdown: Arc::new(AtomicBool::new(false)),
            tasks: Vec::new(),
        }
    }

    /// Spawns a reassembly-and-dispatch loop over `stream`. The handle it
    /// uses exists only for the lifetime of that loop; this type does not
    /// expose a [`gsbp_core::HandleRegistry`] directly, since ownership of
    /// each link's bytes has to live on the task driving it.
    pub fn attach<S>(&mut self, stream: S)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let app = self.app.clone();
        let node_info = self.node_info.clone();
        let device_class = self.device_class;
        let descriptor = self.descriptor;
        let scratch_capacity = self.scratch_capacity;
        let stats = self.stats.clone();
        let shutdown = self.shutdown.clone();

        let task = tokio::spawn(Self::link_loop(
            stream,
            descriptor,
            scratch_capacity,
            app,
            node_info,
            device_class,
            stats,
            shutdown,
        ));
        self.tasks.push(task);
    }

    async fn link_loop<S>(
        mut stream: S,
        descriptor: ProtocolDescriptor,
        scratch_capacity: usize,
        app: Arc<Mutex<C>>,
        node_info: NodeInfo,
        device_class: u8,
        stats: Arc<Mutex<Statistics>>,
        shutdown: Arc<AtomicBool>,
    ) where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let mut handle = Handle::new(descriptor, scratch_capacity);
        handle.activate(0, TransportKind::Serial);
        let mut buf = vec![0u8; 1024];

        loop {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            let n = match stream.read(&mut buf).await {
                Ok(0) => {
                    tracing::info!("device link closed by peer");
                    break;
                }
                Ok(n) => n,
                Err(e) => {
                    tracing::warn!(error = %e, "device link read error");
                    break;
                }
            };
            tracing::debug!(bytes = %hex::encode(&buf[..n]), "device link read");

            if handle.append_scratch(&buf[..n]).is_err() {
                tracing::warn!("device reassembly scratch overflowed, oldest bytes dropped");
            }

            let mut reset_requested = false;
            loop {
                match build_package(&mut handle) {
                    ReassemblerOutcome::Framed(package) => {
                        let outcome = {
                            let mut app = app.lock().await;
                            dispatch_device_command(&package, device_class, &node_info, &mut *app)
                        };
                        for response in outcome.responses {
                            match gsbp_core::codec::encode(&descriptor, &response) {
                                Ok(framed) => {
                                    tracing::debug!(bytes = %hex::encode(&framed), "device link write");
                                    if let Err(e) = stream.write_all(&framed).await {
                                        tracing::warn!(error = %e, "device link write error");
                                        reset_requested = true;
                                        break;
                                    }
                                }
                                Err(e) => tracing::warn!(error = %e, "failed to encode device response"),
                            }
                        }
                        if outcome.reset_requested {
                            reset_requested = true;
                        }
                        let mut s = stats.lock().await;
                        s.packages_received_good += 1;
                    }
                    ReassemblerOutcome::AwaitingMoreData | ReassemblerOutcome::NoNewData => break,
                    ReassemblerOutcome::ChecksumMismatch { discarded } => {
                        let mut s = stats.lock().await;
                        s.record_broken_checksum(discarded as u64);
                        if discarded == 0 {
                            break;
                        }
                    }
                    ReassemblerOutcome::NoStartSentinel { discarded } | ReassemblerOutcome::EndByteMismatch { discarded } => {
                        let mut s = stats.lock().await;
                        s.record_broken_structure(discarded as u64);
                        if discarded == 0 {
                            break;
                        }
                    }
                }
                if reset_requested {
                    break;
                }
            }
            if reset_requested {
                tracing::info!("reset requested, ending device link loop");
                break;
            }
        }
    }

    pub async fn statistics(&self) -> Statistics {
        self.stats.lock().await.clone()
    }

    /// Signals every link's loop to stop after its current read, then waits
    /// for them to finish.
    pub async fn shutdown(mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
    }
}
