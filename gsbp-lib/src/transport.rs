//! Opens the duplex byte streams [`crate::host::GsbpHost`] and
//! [`crate::device::GsbpDevice`] drive.
//!
//! Works over any `tokio::io::{AsyncRead, AsyncWrite}` stream: real
//! UART/USB-CDC links via `tokio_serial`, or an in-memory pair for tests
//! and the bundled device simulator. Both [`GsbpHost`](crate::host::GsbpHost)
//! and [`GsbpDevice`](crate::device::GsbpDevice) split whatever stream
//! they're given with `tokio::io::split` rather than going through a
//! boxed trait object, since the host side needs to read and write
//! concurrently.

use crate::config::{FlowControl, GsbpConfig, StopBits};
use crate::error::Error;

/// Opens a UART or USB-CDC virtual-COM device at `path` in raw mode
/// (8-N-1 default, optional 2 stop bits, optional hardware flow control,
/// configurable baud rate; USB-CDC devices ignore the speed setting but
/// are opened through the same path).
pub fn open_serial(path: &str, config: &GsbpConfig) -> Result<tokio_serial::SerialStream, Error> {
    use tokio_serial::SerialPortBuilderExt;

    let stop_bits = match config.stop_bits {
        StopBits::One => tokio_serial::StopBits::One,
        StopBits::Two => tokio_serial::StopBits::Two,
    };
    let flow_control = match config.flow_control {
        FlowControl::None => tokio_serial::FlowControl::None,
        FlowControl::Hardware => tokio_serial::FlowControl::Hardware,
    };

    let stream = tokio_serial::new(path, config.baud_rate)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(stop_bits)
        .flow_control(flow_control)
        .open_native_async()
        .map_err(|e| Error::OpeningDeviceFailed(format!("{path}: {e}")))?;

    tracing::info!(path, baud = config.baud_rate, "opened serial transport");
    Ok(stream)
}

/// Creates an in-memory duplex pair, used by tests and the bundled device
/// simulator in place of a physical link.
pub fn in_memory_pair(buffer_size: usize) -> (tokio::io::DuplexStream, tokio::io::DuplexStream) {
    tokio::io::duplex(buffer_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn in_memory_pair_carries_bytes_both_ways() {
        let (mut a, mut b) = in_memory_pair(64);
        a.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        let n = b.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"ping");

        b.write_all(b"pong").await.unwrap();
        let n = a.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"pong");
    }
}
