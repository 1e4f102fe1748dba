use super::layout::GamepadLayout;
use crate::actuator::{Actuator, ActuatorError, AxisId};
use crate::mapping::ControlMapping;
use crate::scaling::AxisScaling;
use evdev::{
    AbsInfo, AttributeSet, EventType, InputEvent, Key, UinputAbsSetup,
    uinput::{VirtualDevice, VirtualDeviceBuilder},
};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// uinput gamepad exposing exactly the buttons and axes of a mapping.
pub struct VirtualGamepad {
    device: VirtualDevice,
    buttons: BTreeMap<u8, Key>,
    axes: BTreeMap<AxisId, u16>,
}

impl VirtualGamepad {
    /// Axes advertise `0..=scaling.output_max()` and start at `neutral`.
    pub fn new(
        name: &str,
        mapping: &ControlMapping,
        scaling: AxisScaling,
        neutral: u16,
    ) -> Result<Self, ActuatorError> {
        let mut buttons = BTreeMap::new();
        let mut keys = AttributeSet::<Key>::new();
        for (index, _) in mapping.buttons() {
            let key = GamepadLayout::button_key(index).ok_or(ActuatorError::UnknownButton(index))?;
            keys.insert(key);
            buttons.insert(index, key);
        }

        let mut builder = VirtualDeviceBuilder::new()
            .map_err(ActuatorError::CreateDevice)?
            .name(name)
            .with_keys(&keys)
            .map_err(ActuatorError::CreateDevice)?;

        let max = i32::from(scaling.output_max());
        let mut axes = BTreeMap::new();
        for axis in mapping.axes() {
            let info = AbsInfo::new(i32::from(neutral), 0, max, 0, 0, 0);
            let setup = UinputAbsSetup::new(GamepadLayout::axis_code(axis), info);
            builder = builder
                .with_absolute_axis(&setup)
                .map_err(ActuatorError::CreateDevice)?;
            axes.insert(axis, neutral);
        }

        let device = builder.build().map_err(ActuatorError::CreateDevice)?;
        Ok(Self {
            device,
            buttons,
            axes,
        })
    }

    /// Device node (e.g. `/dev/input/event7`), if udev has created it.
    pub fn device_path(&mut self) -> Option<PathBuf> {
        self.device
            .enumerate_dev_nodes_blocking()
            .ok()?
            .next()?
            .ok()
    }

    /// Last value written to `axis`.
    pub fn axis_value(&self, axis: AxisId) -> Option<u16> {
        self.axes.get(&axis).copied()
    }
}

impl Actuator for VirtualGamepad {
    fn set_button(&mut self, index: u8, pressed: bool) -> Result<(), ActuatorError> {
        let key = *self
            .buttons
            .get(&index)
            .ok_or(ActuatorError::UnknownButton(index))?;
        let event = InputEvent::new(EventType::KEY, key.code(), i32::from(pressed));
        self.device.emit(&[event])?;
        Ok(())
    }

    fn set_axis(&mut self, axis: AxisId, value: u16) -> Result<(), ActuatorError> {
        let slot = self
            .axes
            .get_mut(&axis)
            .ok_or(ActuatorError::UnknownAxis(axis))?;
        let code = GamepadLayout::axis_code(axis);
        let event = InputEvent::new(EventType::ABSOLUTE, code.0, i32::from(value));
        self.device.emit(&[event])?;
        *slot = value;
        Ok(())
    }
}
