//! Integration tests driving a [`GsbpHost`] against a [`GsbpDevice`] over an
//! in-memory duplex pair, exercising the full send → dispatch → respond →
//! correlate path rather than any single module in isolation.

use bytes::Bytes;
use gsbp_core::ProtocolDescriptor;
use gsbp_lib::{GsbpConfig, GsbpDevice, GsbpHost, NoApplicationCommands, NodeInfo};
use std::time::Duration;

fn node_info() -> NodeInfo {
    NodeInfo {
        board_id: 42,
        device_class: 1,
        serial_number: 1_904_010_001,
        protocol_version: [0, 1],
        firmware_version: [0, 1],
        description: "gsbp-device-sim".to_string(),
    }
}

fn config() -> GsbpConfig {
    GsbpConfig::new()
        .descriptor(ProtocolDescriptor::reference())
        .response_timeout(Duration::from_millis(200))
}

#[tokio::test]
async fn identify_round_trips_against_a_live_device() {
    let (host_side, device_side) = gsbp_lib::in_memory_pair(512);
    let mut device = GsbpDevice::new(node_info(), 1, NoApplicationCommands, &config());
    device.attach(device_side);

    let host = GsbpHost::connect(host_side, &config());
    let info = host.identify().await.unwrap();
    assert_eq!(info.serial_number, 1_904_010_001);
    assert_eq!(info.description, "gsbp-device-sim");

    host.shutdown().await;
    device.shutdown().await;
}

#[tokio::test]
async fn status_request_reports_no_error() {
    let (host_side, device_side) = gsbp_lib::in_memory_pair(512);
    let mut device = GsbpDevice::new(node_info(), 1, NoApplicationCommands, &config());
    device.attach(device_side);
    let host = GsbpHost::connect(host_side, &config());

    let response = host.request(gsbp_lib::commands::STATUS_CMD, Bytes::new()).await.unwrap();
    let status = gsbp_lib::messages::Status::decode(response.payload).unwrap();
    assert_eq!(status.error_code, gsbp_lib::ErrorCode::NoError);

    host.shutdown().await;
    device.shutdown().await;
}

#[tokio::test]
async fn unknown_command_comes_back_as_a_critical_message() {
    let (host_side, device_side) = gsbp_lib::in_memory_pair(512);
    let mut device = GsbpDevice::new(node_info(), 1, NoApplicationCommands, &config());
    device.attach(device_side);
    let host = GsbpHost::connect(host_side, &config());

    let response = host.request(254, Bytes::new()).await.unwrap();
    assert_eq!(response.cmd_id, gsbp_lib::commands::MESSAGE_ACK);
    let message = gsbp_lib::MessageAck::decode(response.payload).unwrap();
    assert_eq!(message.severity, gsbp_lib::Severity::CriticalError);
    assert!(message.text.contains("254"));

    host.shutdown().await;
    device.shutdown().await;
}

#[tokio::test]
async fn get_response_times_out_once_the_device_is_gone() {
    let (host_side, device_side) = gsbp_lib::in_memory_pair(512);
    drop(device_side); // no device ever attaches or answers

    let host = GsbpHost::connect(host_side, &config());
    let global_id = host.send(gsbp_lib::commands::STATUS_CMD, Bytes::new()).await.unwrap();
    let err = host.get_response(global_id).await.unwrap_err();
    assert!(matches!(err, gsbp_lib::Error::GetResponseTimeout));

    host.shutdown().await;
}

#[tokio::test]
async fn concurrent_requests_correlate_independently() {
    let (host_side, device_side) = gsbp_lib::in_memory_pair(1024);
    let mut device = GsbpDevice::new(node_info(), 1, NoApplicationCommands, &config());
    device.attach(device_side);
    let host = GsbpHost::connect(host_side, &config());

    let (status, identity) = tokio::join!(
        host.request(gsbp_lib::commands::STATUS_CMD, Bytes::new()),
        host.identify(),
    );
    assert_eq!(status.unwrap().cmd_id, gsbp_lib::commands::STATUS_ACK);
    assert_eq!(identity.unwrap().serial_number, 1_904_010_001);

    host.shutdown().await;
    device.shutdown().await;
}
