//! Command dispatch.
//!
//! On the device, incoming commands are matched against a table; the base
//! table handles `NODE_INFO_CMD`, `STATUS_CMD` and `RESET_CMD` and falls
//! through to an application-supplied [`DeviceCommands`] implementation for
//! everything else, finally emitting an `UnknownCmd` message if even that
//! declines the command. On the host, [`route_response`] classifies an
//! incoming package so the caller can forward `MessageAck`s to a
//! message-severity callback while everything else goes through the normal
//! correlation path.

use crate::commands::{MESSAGE_ACK, NODE_INFO_ACK, NODE_INFO_CMD, RESET_CMD, STATUS_ACK, STATUS_CMD, UNIVERSAL_ACK};
use crate::messages::{MessageAck, NodeInfo, Status, UniversalAck};
use gsbp_core::Package;

/// Application hook for command ids the base protocol doesn't reserve
/// (ids `>= APPLICATION_CMD_BASE` by convention).
pub trait DeviceCommands: Send {
    /// Handle one application command. Returning `None` falls through to
    /// the base dispatcher's `UnknownCmd` response.
    fn handle(&mut self, package: &Package) -> Option<Vec<Package>>;

    /// Current device status, reported in reply to `STATUS_CMD`. The
    /// default reports a healthy, idle device.
    fn status(&self) -> Status {
        Status {
            error_code: crate::error_code::ErrorCode::NoError,
            state: 0,
            message: String::new(),
        }
    }
}

/// A [`DeviceCommands`] that declines every application command, useful
/// for devices that only implement the universal sub-protocol.
pub struct NoApplicationCommands;

impl DeviceCommands for NoApplicationCommands {
    fn handle(&mut self, _package: &Package) -> Option<Vec<Package>> {
        None
    }
}

/// The result of dispatching one incoming package on the device.
#[derive(Debug, Clone, Default)]
pub struct DispatchOutcome {
    /// Packages to send back to the peer, in order.
    pub responses: Vec<Package>,
    /// Set by `RESET_CMD`: the surrounding application loop should stop
    /// processing further packages this tick and begin its reset sequence.
    pub reset_requested: bool,
}

/// Builds a `UNIVERSAL_ACK` package, OR-ing `device_class` into the echoed
/// command id the way the original firmware's `GSBP_SendUniversalACKext`
/// does (`ACK->cmd |= GSBP_SETUP__DEVICE_CLASS_ID`). Shared by the base
/// command table and by application [`DeviceCommands`] implementations that
/// answer their own commands with a universal ack.
pub fn universal_ack(request_id: u8, echoed_cmd: u16, device_class: u8) -> Package {
    Package::new(
        UNIVERSAL_ACK,
        request_id,
        UniversalAck {
            echoed_cmd: echoed_cmd | device_class as u16,
            success: true,
        }
        .encode(),
    )
}

/// Dispatches one incoming command to the base protocol's command table,
/// falling through to `app` for anything not reserved.
pub fn dispatch_device_command(
    package: &Package,
    device_class: u8,
    node_info: &NodeInfo,
    app: &mut dyn DeviceCommands,
) -> DispatchOutcome {
    let request_id = package.request_id;

    match package.cmd_id {
        NODE_INFO_CMD => DispatchOutcome {
            responses: vec![Package::new(NODE_INFO_ACK, request_id, node_info.encode())],
            reset_requested: false,
        },
        STATUS_CMD => DispatchOutcome {
            responses: vec![Package::new(STATUS_ACK, request_id, app.status().encode())],
            reset_requested: false,
        },
        RESET_CMD => DispatchOutcome {
            responses: vec![universal_ack(request_id, RESET_CMD, device_class)],
            reset_requested: true,
        },
        other => {
            if let Some(responses) = app.handle(package) {
                DispatchOutcome {
                    responses,
                    reset_requested: false,
                }
            } else {
                DispatchOutcome {
                    responses: vec![Package::new(
                        MESSAGE_ACK,
                        request_id,
                        MessageAck::unknown_cmd(other as u32).encode(),
                    )],
                    reset_requested: false,
                }
            }
        }
    }
}

/// How the host should treat an incoming response package, independent of
/// correlation-buffer bookkeeping (which the caller does separately via
/// [`crate::correlation::CorrelationBuffer::add_response`]).
#[derive(Debug, Clone)]
pub enum HostResponseKind {
    Message(MessageAck),
    NodeInfo(NodeInfo),
    UniversalAck(UniversalAck),
    Status(Status),
    Other,
}

/// Classifies a response package by its command id, decoding the known
/// universal payloads. Unrecognized commands (including application ones)
/// come back as `Other` — the caller already has the raw [`Package`].
pub fn route_response(package: &Package) -> HostResponseKind {
    match package.cmd_id {
        MESSAGE_ACK => MessageAck::decode(package.payload.clone())
            .map(HostResponseKind::Message)
            .unwrap_or(HostResponseKind::Other),
        NODE_INFO_ACK => NodeInfo::decode(package.payload.clone())
            .map(HostResponseKind::NodeInfo)
            .unwrap_or(HostResponseKind::Other),
        UNIVERSAL_ACK => UniversalAck::decode(package.payload.clone())
            .map(HostResponseKind::UniversalAck)
            .unwrap_or(HostResponseKind::Other),
        STATUS_ACK => Status::decode(package.payload.clone())
            .map(HostResponseKind::Status)
            .unwrap_or(HostResponseKind::Other),
        _ => HostResponseKind::Other,
    }
}
