//! OSC message types and inbox.
//!
//! Every parameter has a canonical address under `/lumen`: named children
//! contribute their path segment, array members contribute the array name
//! followed by a 1-based index, and the parameter path is the final segment
//! (color parameters take one extra `hue` / `saturation` / `brightness`
//! part). The engine resolves inbound paths against the live tree and
//! dispatches to the type-appropriate setter; see
//! [`Engine::dispatch_osc_message`](crate::engine::Engine).

use crossbeam_channel::{Receiver, Sender, unbounded};

/// Root of every engine address.
pub const OSC_ROOT: &str = "/lumen";

/// A typed OSC argument.
#[derive(Clone, Debug, PartialEq)]
pub enum OscValue {
    /// Float argument; written via the plain setter.
    Float(f64),
    /// Integer argument; written via the plain setter.
    Int(i64),
    /// Boolean argument.
    Bool(bool),
    /// String argument; written to text parameters.
    Text(String),
}

impl OscValue {
    /// Numeric view of the argument.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            OscValue::Float(v) => Some(*v),
            OscValue::Int(v) => Some(*v as f64),
            OscValue::Bool(b) => Some(f64::from(u8::from(*b))),
            OscValue::Text(_) => None,
        }
    }
}

/// One inbound OSC message.
#[derive(Clone, Debug, PartialEq)]
pub struct OscMessage {
    /// Slash-separated address, e.g. `/lumen/channel/1/fader`.
    pub path: String,
    /// The message argument.
    pub value: OscValue,
}

impl OscMessage {
    /// Constructs a message.
    pub fn new(path: impl Into<String>, value: OscValue) -> OscMessage {
        OscMessage {
            path: path.into(),
            value,
        }
    }
}

/// The engine's OSC inbox.
#[derive(Debug)]
pub struct OscEngine {
    inbox_tx: Sender<OscMessage>,
    inbox_rx: Receiver<OscMessage>,
}

impl Default for OscEngine {
    fn default() -> Self {
        OscEngine::new()
    }
}

impl OscEngine {
    /// A fresh inbox.
    pub fn new() -> OscEngine {
        let (inbox_tx, inbox_rx) = unbounded();
        OscEngine {
            inbox_tx,
            inbox_rx,
        }
    }

    /// A sender the host's OSC transport can feed from any thread.
    pub fn input(&self) -> Sender<OscMessage> {
        self.inbox_tx.clone()
    }

    /// Drains pending messages for the engine to resolve.
    pub fn drain(&mut self) -> Vec<OscMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = self.inbox_rx.try_recv() {
            messages.push(message);
        }
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbox_drains_in_order() {
        let mut osc = OscEngine::new();
        let input = osc.input();
        input
            .send(OscMessage::new("/lumen/speed", OscValue::Float(1.5)))
            .unwrap();
        input
            .send(OscMessage::new("/lumen/paused", OscValue::Bool(true)))
            .unwrap();

        let drained = osc.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].path, "/lumen/speed");
        assert_eq!(drained[1].value, OscValue::Bool(true));
    }

    #[test]
    fn numeric_views() {
        assert_eq!(OscValue::Int(3).as_f64(), Some(3.0));
        assert_eq!(OscValue::Bool(true).as_f64(), Some(1.0));
        assert_eq!(OscValue::Text("x".into()).as_f64(), None);
    }
}
