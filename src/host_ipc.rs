//! Newline-delimited JSON link to the host process.
//!
//! Every line is one `{"channel": ..., "payload": ...}` object. Inbound lines
//! are decoded into [`HostCommand`]s and emitted into a [`LocalHostBridge`];
//! outbound requests are written the same way.

use std::{
    io::{BufRead, ErrorKind, Write},
    sync::{Arc, Mutex},
};

use log::{debug, info, warn};
use serde_json::Value;

use crate::{
    host_bridge::{HostCall, HostRequest, HostRequestSink, LocalHostBridge},
    protocol::{HostCommand, TransportOp, UpdateInfo},
};

const CHANNEL_NAVIGATE: &str = "navigate";
const CHANNEL_PLAYER_COMMAND: &str = "player-command";
const CHANNEL_SWITCH_ACCOUNT: &str = "switch-account";
const CHANNEL_UPDATE_AVAILABLE: &str = "update-available";
const CHANNEL_SWITCH_TO_MAIN_WINDOW: &str = "switch-to-main-window";

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct WireEnvelope {
    pub channel: String,
    #[serde(default)]
    pub payload: Value,
}

/// Decodes one inbound line. Blank lines yield `Ok(None)`.
pub fn decode_host_line(line: &str) -> Result<Option<HostCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let envelope: WireEnvelope =
        serde_json::from_str(line).map_err(|err| format!("malformed host line: {err}"))?;

    let command = match envelope.channel.as_str() {
        CHANNEL_NAVIGATE => match envelope.payload {
            Value::String(path) => HostCommand::Navigate(path),
            other => return Err(format!("navigate payload must be a string, got {other}")),
        },
        CHANNEL_PLAYER_COMMAND => {
            let op = envelope
                .payload
                .as_str()
                .ok_or_else(|| "player-command payload must be a string".to_string())?
                .parse::<TransportOp>()?;
            HostCommand::Transport(op)
        }
        CHANNEL_SWITCH_ACCOUNT => HostCommand::AccountSwitchRequested,
        CHANNEL_UPDATE_AVAILABLE => {
            let info: UpdateInfo = serde_json::from_value(envelope.payload)
                .map_err(|err| format!("invalid update-available payload: {err}"))?;
            HostCommand::UpdateAvailable(info)
        }
        other => return Err(format!("unknown host channel '{other}'")),
    };
    Ok(Some(command))
}

pub fn encode_host_request(request: HostRequest) -> Result<String, String> {
    let channel = match request {
        HostRequest::SwitchToMainWindow => CHANNEL_SWITCH_TO_MAIN_WINDOW,
    };
    serde_json::to_string(&WireEnvelope {
        channel: channel.to_string(),
        payload: Value::Null,
    })
    .map_err(|err| format!("failed to encode host request: {err}"))
}

/// Feeds every line from `reader` into `bridge` until end of input or a read
/// failure. Undecodable lines, including ones that are not UTF-8, are skipped.
/// Returns how many commands were decoded.
pub fn pump_host_lines<R: BufRead>(mut reader: R, bridge: &LocalHostBridge) -> usize {
    let mut delivered = 0;
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {}
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => {
                warn!("HostIpc: failed to read host line: {}", err);
                break;
            }
        }
        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line,
            Err(err) => {
                warn!("HostIpc: skipping line that is not UTF-8: {}", err);
                continue;
            }
        };
        match decode_host_line(line) {
            Ok(Some(command)) => {
                debug!("HostIpc: received {}", command.tag());
                bridge.emit(command);
                delivered += 1;
            }
            Ok(None) => {}
            Err(err) => warn!("HostIpc: skipping line: {}", err),
        }
    }
    delivered
}

/// Writes outbound requests as single lines to any byte sink.
pub struct LineRequestSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> LineRequestSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    fn write_request(&self, request: HostRequest) -> Result<(), String> {
        let line = encode_host_request(request)?;
        let mut writer = match self.writer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        writeln!(writer, "{line}")
            .and_then(|_| writer.flush())
            .map_err(|err| format!("failed to write host request: {err}"))
    }
}

impl<W: Write + Send> HostRequestSink for LineRequestSink<W> {
    fn send_request(&self, request: HostRequest) -> HostCall {
        let result = self.write_request(request);
        Box::pin(async move { result })
    }
}

/// Host link over this process's stdin and stdout.
pub struct StdioHostLink;

impl StdioHostLink {
    pub fn request_sink() -> Arc<dyn HostRequestSink> {
        Arc::new(LineRequestSink::new(std::io::stdout()))
    }

    /// Pumps stdin into `bridge` until the host closes it. Blocks the caller.
    pub fn read_stdin(bridge: &LocalHostBridge) {
        let stdin = std::io::stdin();
        let delivered = pump_host_lines(stdin.lock(), bridge);
        info!("HostIpc: host closed stdin after {} commands", delivered);
    }
}
