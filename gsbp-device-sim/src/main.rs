mod dummy_app;

use clap::Parser;
use gsbp_lib::dispatcher::DeviceCommands;
use gsbp_lib::{GsbpConfig, GsbpDevice, NodeInfo, Package, Status};
use tracing::info;

/// Serves the reference example's dummy-ADC application protocol over a
/// real serial/USB-CDC link, or in-memory for local smoke testing when
/// `--device-path` is omitted.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Serial or USB-CDC device path to listen on. When omitted, spins up
    /// an in-memory loopback pair purely to confirm the dispatch loop runs
    /// cleanly; nothing external can dial into it.
    #[arg(long)]
    device_path: Option<String>,
}

/// A small deterministic waveform standing in for a real ADC channel.
struct DummyAdcApp {
    device_class: u8,
    sample_index: u32,
    running: bool,
}

impl DummyAdcApp {
    fn new(device_class: u8) -> Self {
        DummyAdcApp {
            device_class,
            sample_index: 0,
            running: false,
        }
    }

    fn next_sample(&mut self) -> i32 {
        let phase = (self.sample_index % 100) as i32;
        self.sample_index += 1;
        // A triangle wave in [-500, 500], enough to look like real ADC noise
        // without pulling in a `rand` dependency the rest of the stack
        // doesn't otherwise need.
        if phase < 50 { phase * 20 - 500 } else { (100 - phase) * 20 - 500 }
    }
}

impl DeviceCommands for DummyAdcApp {
    fn handle(&mut self, package: &Package) -> Option<Vec<Package>> {
        match package.cmd_id {
            dummy_app::INIT_CMD => {
                self.sample_index = 0;
                self.running = false;
                Some(vec![gsbp_lib::universal_ack(package.request_id, dummy_app::INIT_CMD, self.device_class)])
            }
            dummy_app::START_CMD => {
                self.running = true;
                Some(vec![gsbp_lib::universal_ack(package.request_id, dummy_app::START_CMD, self.device_class)])
            }
            dummy_app::DATA_CMD => {
                let sample = self.next_sample();
                Some(vec![Package::new(
                    dummy_app::DATA_ACK,
                    package.request_id,
                    dummy_app::encode_sample(sample),
                )])
            }
            dummy_app::STOP_CMD => {
                self.running = false;
                Some(vec![gsbp_lib::universal_ack(package.request_id, dummy_app::STOP_CMD, self.device_class)])
            }
            dummy_app::DEINIT_CMD => {
                Some(vec![gsbp_lib::universal_ack(package.request_id, dummy_app::DEINIT_CMD, self.device_class)])
            }
            _ => None,
        }
    }

    fn status(&self) -> Status {
        Status {
            error_code: gsbp_lib::ErrorCode::NoError,
            state: self.running as u8,
            message: format!("{} samples served", self.sample_index),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let config = GsbpConfig::new();
    let node_info = NodeInfo {
        board_id: 0,
        device_class: 1,
        serial_number: 1_904_010_001,
        protocol_version: [0, 1],
        firmware_version: [0, 1],
        description: "gsbp-device-sim".to_string(),
    };

    let mut device = GsbpDevice::new(node_info, 1, DummyAdcApp::new(1), &config);

    match args.device_path {
        Some(path) => {
            let transport = gsbp_lib::open_serial(&path, &config)?;
            info!(path, "serving GSBP on serial link");
            device.attach(transport);
        }
        None => {
            let (_loopback, far_end) = gsbp_lib::in_memory_pair(4096);
            info!("no --device-path given, running an in-memory smoke test loop");
            device.attach(far_end);
        }
    }

    tokio::signal::ctrl_c().await?;
    device.shutdown().await;
    Ok(())
}
