//! The virtual-joystick side of the bridge.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Continuous axes a control can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AxisId {
    #[serde(rename = "x")]
    X,
    #[serde(rename = "y")]
    Y,
    #[serde(rename = "rx")]
    RX,
    #[serde(rename = "ry")]
    RY,
}

impl fmt::Display for AxisId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AxisId::X => "X",
            AxisId::Y => "Y",
            AxisId::RX => "RX",
            AxisId::RY => "RY",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum ActuatorError {
    #[error("failed to create virtual device: {0}")]
    CreateDevice(#[source] std::io::Error),

    #[error("button index {0} is not exposed by the device")]
    UnknownButton(u8),

    #[error("axis {0} is not exposed by the device")]
    UnknownAxis(AxisId),

    #[error("failed to emit input events: {0}")]
    Emit(#[from] std::io::Error),
}

/// Sink for button and axis updates.
///
/// Calls are not checked against prior state; setting a button that is
/// already pressed emits again.
pub trait Actuator: Send {
    fn set_button(&mut self, index: u8, pressed: bool) -> Result<(), ActuatorError>;

    fn set_axis(&mut self, axis: AxisId, value: u16) -> Result<(), ActuatorError>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::{Actuator, ActuatorError, AxisId};
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Call {
        Button(u8, bool),
        Axis(AxisId, u16),
    }

    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    enum Failure {
        #[default]
        Never,
        Always,
        OnRelease,
    }

    /// Actuator that records every call; clones share the log.
    #[derive(Clone, Default)]
    pub struct RecordingActuator {
        calls: Arc<Mutex<Vec<Call>>>,
        fail: Failure,
    }

    impl RecordingActuator {
        pub fn new() -> Self {
            Self::default()
        }

        /// Every call fails after being recorded.
        pub fn failing() -> Self {
            Self {
                fail: Failure::Always,
                ..Self::default()
            }
        }

        /// Only `set_button(_, false)` fails.
        pub fn failing_release() -> Self {
            Self {
                fail: Failure::OnRelease,
                ..Self::default()
            }
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        pub fn clear(&self) {
            self.calls.lock().unwrap().clear();
        }

        fn record(&self, call: Call) -> Result<(), ActuatorError> {
            self.calls.lock().unwrap().push(call);
            let fails = match self.fail {
                Failure::Never => false,
                Failure::Always => true,
                Failure::OnRelease => matches!(call, Call::Button(_, false)),
            };
            if fails {
                return Err(std::io::Error::other("device gone").into());
            }
            Ok(())
        }
    }

    impl Actuator for RecordingActuator {
        fn set_button(&mut self, index: u8, pressed: bool) -> Result<(), ActuatorError> {
            self.record(Call::Button(index, pressed))
        }

        fn set_axis(&mut self, axis: AxisId, value: u16) -> Result<(), ActuatorError> {
            self.record(Call::Axis(axis, value))
        }
    }
}
