//! Control events to actuator effects.
//!
//! The router owns every piece of mutable state of the bridge: the actuator
//! and one [`ButtonState`] per mapped button. Both sit behind a single lock
//! shared with the release timers, so arming, cancelling and firing a
//! release are serialized with packet handling.

use crate::actuator::{Actuator, ActuatorError, AxisId};
use crate::mapping::{ControlKind, ControlMapping};
use crate::protocol::control_name;
use crate::release::{ReleaseScheduler, ReleaseTimer};
use crate::scaling::AxisScaling;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Handle;
use tracing::{debug, error, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonPolicy {
    /// Set the button and auto-release it after the configured delay.
    #[default]
    Debounce,
    /// Clear the other buttons of the group, then set the button.
    ExclusiveGroup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterSettings {
    pub policy: ButtonPolicy,
    pub release_after: Duration,
    pub scaling: AxisScaling,
    pub recenter_before_set: bool,
    pub neutral: u16,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            policy: ButtonPolicy::Debounce,
            release_after: Duration::from_millis(100),
            scaling: AxisScaling::Range255,
            recenter_before_set: false,
            neutral: 16384,
        }
    }
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("invalid control id {0}")]
    InvalidControl(u8),

    #[error("invalid value {value} for button {label}, expected 0 or 1")]
    InvalidValue { label: String, value: i16 },

    #[error(transparent)]
    Actuator(#[from] ActuatorError),
}

impl RouteError {
    /// Bad packets are dropped; a failing device ends the bridge.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, RouteError::Actuator(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonPhase {
    Released,
    Pressed,
    PressedPendingRelease,
}

#[derive(Debug, Default)]
struct ButtonState {
    pressed: bool,
    pending_release: Option<ReleaseTimer>,
}

impl ButtonState {
    fn phase(&self) -> ButtonPhase {
        match (self.pressed, self.pending_release.is_some()) {
            (false, _) => ButtonPhase::Released,
            (true, false) => ButtonPhase::Pressed,
            (true, true) => ButtonPhase::PressedPendingRelease,
        }
    }

    fn cancel_release(&mut self) {
        if let Some(timer) = self.pending_release.take() {
            trace!(timer = timer.id(), "Release cancelled");
            timer.cancel();
        }
    }
}

struct RouterState {
    actuator: Box<dyn Actuator>,
    /// Keyed by actuator button index.
    buttons: BTreeMap<u8, ButtonState>,
    /// Actuator failure raised by a release timer, reported by the next `apply`.
    fault: Option<ActuatorError>,
}

impl RouterState {
    fn cancel_all(&mut self) -> usize {
        let mut cancelled = 0;
        for button in self.buttons.values_mut() {
            if button.pending_release.is_some() {
                button.cancel_release();
                cancelled += 1;
            }
        }
        cancelled
    }
}

fn lock(state: &Mutex<RouterState>) -> MutexGuard<'_, RouterState> {
    // Every update leaves the table consistent, so a poisoned lock is still usable
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Timer callback. Acts only if `timer_id` is still the armed release.
fn fire_release(state: &Mutex<RouterState>, index: u8, timer_id: u64) {
    let mut guard = lock(state);
    let state = &mut *guard;

    let Some(button) = state.buttons.get_mut(&index) else {
        return;
    };
    if button.pending_release.as_ref().map(ReleaseTimer::id) != Some(timer_id) {
        trace!(button = index, timer = timer_id, "Stale release ignored");
        return;
    }
    button.pending_release = None;
    button.pressed = false;

    debug!(button = index, "Auto-release");
    if let Err(e) = state.actuator.set_button(index, false) {
        error!(button = index, "Auto-release failed: {}", e);
        if state.fault.is_none() {
            state.fault = Some(e);
        }
    }
}

pub struct InputRouter {
    mapping: ControlMapping,
    settings: RouterSettings,
    scheduler: ReleaseScheduler,
    state: Arc<Mutex<RouterState>>,
}

impl InputRouter {
    /// `handle` is the runtime the release timers are spawned on.
    pub fn new(
        mapping: ControlMapping,
        actuator: Box<dyn Actuator>,
        settings: RouterSettings,
        handle: Handle,
    ) -> Self {
        let buttons = mapping
            .buttons()
            .map(|(index, _)| (index, ButtonState::default()))
            .collect();
        let state = RouterState {
            actuator,
            buttons,
            fault: None,
        };

        Self {
            scheduler: ReleaseScheduler::new(handle, settings.release_after),
            mapping,
            settings,
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn mapping(&self) -> &ControlMapping {
        &self.mapping
    }

    /// Route one decoded `(control id, value)` pair.
    ///
    /// A failed auto-release since the previous call is returned here as
    /// [`RouteError::Actuator`] before the pair is looked at.
    pub fn apply(&self, control_id: u8, value: i16) -> Result<(), RouteError> {
        let fault = lock(&self.state).fault.take();
        if let Some(e) = fault {
            return Err(e.into());
        }

        let control = self
            .mapping
            .get(control_id)
            .ok_or(RouteError::InvalidControl(control_id))?;

        match control.kind {
            ControlKind::Button { index, group } => {
                let pressed = match value {
                    0 => false,
                    1 => true,
                    _ => {
                        return Err(RouteError::InvalidValue {
                            label: control.label.clone(),
                            value,
                        });
                    }
                };
                debug!(control = %control.label, button = index, pressed, "Button");
                match self.settings.policy {
                    ButtonPolicy::Debounce => self.set_debounced(index, pressed),
                    ButtonPolicy::ExclusiveGroup => self.set_exclusive(index, group, pressed),
                }
            }
            ControlKind::Axis(axis) => {
                let scaled = self.settings.scaling.scale(value);
                debug!(control = %control.label, %axis, raw = value, scaled, "Axis");
                self.set_axis(axis, scaled)
            }
        }
    }

    fn set_debounced(&self, index: u8, pressed: bool) -> Result<(), RouteError> {
        let mut guard = lock(&self.state);
        self.set_debounced_locked(&mut guard, index, pressed)
    }

    fn set_debounced_locked(
        &self,
        state: &mut RouterState,
        index: u8,
        pressed: bool,
    ) -> Result<(), RouteError> {
        let button = state.buttons.entry(index).or_default();
        button.cancel_release();

        state.actuator.set_button(index, pressed)?;
        let button = state.buttons.entry(index).or_default();
        button.pressed = pressed;

        if pressed {
            let shared = Arc::clone(&self.state);
            let timer = self
                .scheduler
                .schedule(move |id| fire_release(&shared, index, id));
            trace!(
                button = index,
                timer = timer.id(),
                delay_ms = self.scheduler.delay().as_millis() as u64,
                "Release armed"
            );
            button.pending_release = Some(timer);
        }
        Ok(())
    }

    fn set_exclusive(&self, index: u8, group: u8, pressed: bool) -> Result<(), RouteError> {
        let mut guard = lock(&self.state);
        let state = &mut *guard;

        for other in self.mapping.group_members(group) {
            if other == index {
                continue;
            }
            let button = state.buttons.entry(other).or_default();
            button.cancel_release();
            button.pressed = false;
            state.actuator.set_button(other, false)?;
        }

        state.actuator.set_button(index, pressed)?;
        let button = state.buttons.entry(index).or_default();
        button.cancel_release();
        button.pressed = pressed;
        Ok(())
    }

    fn set_axis(&self, axis: AxisId, value: u16) -> Result<(), RouteError> {
        let mut state = lock(&self.state);
        if self.settings.recenter_before_set {
            for other in self.mapping.axes() {
                state.actuator.set_axis(other, self.settings.neutral)?;
            }
        }
        state.actuator.set_axis(axis, value)?;
        Ok(())
    }

    /// Phase of the button driven by `control_id`, `None` for axes and
    /// unmapped ids.
    pub fn button_phase(&self, control_id: u8) -> Option<ButtonPhase> {
        let ControlKind::Button { index, .. } = self.mapping.get(control_id)?.kind else {
            return None;
        };
        let state = lock(&self.state);
        Some(
            state
                .buttons
                .get(&index)
                .map_or(ButtonPhase::Released, ButtonState::phase),
        )
    }

    /// Cancel every pending release without touching the actuator.
    pub fn shutdown(&self) {
        let cancelled = lock(&self.state).cancel_all();
        if cancelled > 0 {
            warn!(cancelled, "Pending button releases dropped on shutdown");
        } else {
            debug!("Router shut down");
        }
    }

    /// Log-friendly name of a control id.
    pub fn control_label(&self, control_id: u8) -> &str {
        self.mapping
            .get(control_id)
            .map_or(control_name(control_id), |c| c.label.as_str())
    }
}

impl Drop for InputRouter {
    fn drop(&mut self) {
        lock(&self.state).cancel_all();
    }
}
