mod dummy_app;

use clap::Parser;
use gsbp_lib::{GsbpConfig, GsbpHost};
use std::error::Error;
use tracing::info;

/// Reference GSBP host example: walks a device through
/// init/start/data×n/stop/deinit and writes the samples to a CSV file.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Serial or USB-CDC device path, e.g. /dev/ttyACM0.
    device_path: String,
    /// Number of dummy ADC samples to request.
    n_values: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let config = GsbpConfig::new();
    let transport = gsbp_lib::open_serial(&args.device_path, &config)?;
    let host = GsbpHost::connect(transport, &config);

    let info = host.identify().await?;
    info!(serial = info.serial_number, "connected to device");

    host.request(dummy_app::INIT_CMD, bytes::Bytes::new()).await?;
    host.request(dummy_app::START_CMD, bytes::Bytes::new()).await?;

    let mut samples = Vec::with_capacity(args.n_values);
    for index in 0..args.n_values {
        let response = host.request(dummy_app::DATA_CMD, bytes::Bytes::new()).await?;
        let value = dummy_app::decode_sample(response.payload)
            .ok_or_else(|| format!("malformed sample at index {index}"))?;
        samples.push((index, value));
    }

    host.request(dummy_app::STOP_CMD, bytes::Bytes::new()).await?;
    host.request(dummy_app::DEINIT_CMD, bytes::Bytes::new()).await?;
    host.shutdown().await;

    let mut writer = csv::Writer::from_path("Dummy_Data.csv")?;
    writer.write_record(["index", "sample"])?;
    for (index, value) in samples {
        writer.write_record([index.to_string(), value.to_string()])?;
    }
    writer.flush()?;

    info!(n = args.n_values, "wrote Dummy_Data.csv");
    Ok(())
}
