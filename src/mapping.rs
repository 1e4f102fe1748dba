//! Control id to actuator target table.

use crate::actuator::AxisId;
use crate::protocol::{self, control_name};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    /// Momentary button. `group` is only used by the exclusive-group policy.
    Button { index: u8, group: u8 },
    Axis(AxisId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Control {
    pub label: String,
    pub kind: ControlKind,
}

/// One `[[controls]]` entry of the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ControlEntry {
    Button {
        id: u8,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
        index: u8,
        #[serde(default)]
        group: u8,
    },
    Axis {
        id: u8,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
        axis: AxisId,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MappingError {
    #[error("control mapping is empty")]
    Empty,

    #[error("control id {0} is mapped more than once")]
    DuplicateControl(u8),

    #[error("button index {0} is driven by more than one control")]
    DuplicateButton(u8),

    #[error("axis {0} is driven by more than one control")]
    DuplicateAxis(AxisId),
}

/// Immutable table that defines the valid control ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlMapping {
    controls: BTreeMap<u8, Control>,
}

impl ControlMapping {
    /// Twelve controls: face buttons, shoulder triggers, two sticks and
    /// their clicks.
    pub fn default_table() -> Self {
        let button = |id, index, group| (id, ControlKind::Button { index, group });
        let axis = |id, axis| (id, ControlKind::Axis(axis));
        let table = [
            button(protocol::CONTROL_BUTTON_B, 0, 0),
            button(protocol::CONTROL_BUTTON_Y, 1, 0),
            button(protocol::CONTROL_BUTTON_X, 2, 0),
            button(protocol::CONTROL_BUTTON_A, 3, 0),
            button(protocol::CONTROL_TRIGGER_R, 4, 1),
            button(protocol::CONTROL_TRIGGER_L, 5, 1),
            axis(protocol::CONTROL_STICK_RIGHT_X, AxisId::RX),
            axis(protocol::CONTROL_STICK_RIGHT_Y, AxisId::RY),
            axis(protocol::CONTROL_STICK_LEFT_X, AxisId::X),
            axis(protocol::CONTROL_STICK_LEFT_Y, AxisId::Y),
            button(protocol::CONTROL_THUMB_R, 6, 2),
            button(protocol::CONTROL_THUMB_L, 7, 2),
        ];

        let controls = table
            .into_iter()
            .map(|(id, kind)| {
                let label = control_name(id).to_string();
                (id, Control { label, kind })
            })
            .collect();
        Self { controls }
    }

    pub fn from_entries(entries: &[ControlEntry]) -> Result<Self, MappingError> {
        if entries.is_empty() {
            return Err(MappingError::Empty);
        }

        let mut controls = BTreeMap::new();
        let mut buttons = BTreeSet::new();
        let mut axes = BTreeSet::new();

        for entry in entries {
            let (id, label, kind) = match entry {
                ControlEntry::Button {
                    id,
                    label,
                    index,
                    group,
                } => {
                    if !buttons.insert(*index) {
                        return Err(MappingError::DuplicateButton(*index));
                    }
                    let kind = ControlKind::Button {
                        index: *index,
                        group: *group,
                    };
                    (*id, label, kind)
                }
                ControlEntry::Axis { id, label, axis } => {
                    if !axes.insert(*axis) {
                        return Err(MappingError::DuplicateAxis(*axis));
                    }
                    (*id, label, ControlKind::Axis(*axis))
                }
            };

            let label = label
                .clone()
                .unwrap_or_else(|| control_name(id).to_string());
            if controls.insert(id, Control { label, kind }).is_some() {
                return Err(MappingError::DuplicateControl(id));
            }
        }

        Ok(Self { controls })
    }

    pub fn to_entries(&self) -> Vec<ControlEntry> {
        self.controls
            .iter()
            .map(|(&id, control)| {
                let label = Some(control.label.clone());
                match control.kind {
                    ControlKind::Button { index, group } => ControlEntry::Button {
                        id,
                        label,
                        index,
                        group,
                    },
                    ControlKind::Axis(axis) => ControlEntry::Axis { id, label, axis },
                }
            })
            .collect()
    }

    pub fn get(&self, id: u8) -> Option<&Control> {
        self.controls.get(&id)
    }

    pub fn len(&self) -> usize {
        self.controls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }

    /// `(index, group)` of every mapped button, ordered by control id.
    pub fn buttons(&self) -> impl Iterator<Item = (u8, u8)> + '_ {
        self.controls.values().filter_map(|c| match c.kind {
            ControlKind::Button { index, group } => Some((index, group)),
            ControlKind::Axis(_) => None,
        })
    }

    pub fn axes(&self) -> impl Iterator<Item = AxisId> + '_ {
        self.controls.values().filter_map(|c| match c.kind {
            ControlKind::Axis(axis) => Some(axis),
            ControlKind::Button { .. } => None,
        })
    }

    /// Button indices sharing `group`, in control id order.
    pub fn group_members(&self, group: u8) -> Vec<u8> {
        self.buttons()
            .filter(|&(_, g)| g == group)
            .map(|(index, _)| index)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_shape() {
        let mapping = ControlMapping::default_table();
        assert_eq!(mapping.len(), 12);
        assert_eq!(mapping.buttons().count(), 8);
        assert_eq!(mapping.axes().count(), 4);

        let a = mapping.get(3).unwrap();
        assert_eq!(a.label, "A");
        assert_eq!(a.kind, ControlKind::Button { index: 3, group: 0 });
        assert_eq!(mapping.get(8).unwrap().kind, ControlKind::Axis(AxisId::X));
        assert_eq!(mapping.get(11).unwrap().kind, ControlKind::Button { index: 7, group: 2 });
        assert!(mapping.get(12).is_none());
    }

    #[test]
    fn test_group_members() {
        let mapping = ControlMapping::default_table();
        assert_eq!(mapping.group_members(0), vec![0, 1, 2, 3]);
        assert_eq!(mapping.group_members(1), vec![4, 5]);
        assert_eq!(mapping.group_members(2), vec![6, 7]);
        assert!(mapping.group_members(9).is_empty());
    }

    #[test]
    fn test_entries_round_trip() {
        let mapping = ControlMapping::default_table();
        let rebuilt = ControlMapping::from_entries(&mapping.to_entries()).unwrap();
        assert_eq!(rebuilt, mapping);
    }

    #[test]
    fn test_missing_label_falls_back_to_control_name() {
        let entries = [ControlEntry::Axis {
            id: 6,
            label: None,
            axis: AxisId::RX,
        }];
        let mapping = ControlMapping::from_entries(&entries).unwrap();
        assert_eq!(mapping.get(6).unwrap().label, "CJX");
    }

    #[test]
    fn test_rejects_invalid_tables() {
        assert_eq!(ControlMapping::from_entries(&[]), Err(MappingError::Empty));

        let duplicate_id = [
            ControlEntry::Button {
                id: 1,
                label: None,
                index: 0,
                group: 0,
            },
            ControlEntry::Axis {
                id: 1,
                label: None,
                axis: AxisId::X,
            },
        ];
        assert_eq!(
            ControlMapping::from_entries(&duplicate_id),
            Err(MappingError::DuplicateControl(1))
        );

        let shared_axis = [
            ControlEntry::Axis {
                id: 6,
                label: None,
                axis: AxisId::Y,
            },
            ControlEntry::Axis {
                id: 7,
                label: None,
                axis: AxisId::Y,
            },
        ];
        assert_eq!(
            ControlMapping::from_entries(&shared_axis),
            Err(MappingError::DuplicateAxis(AxisId::Y))
        );

        let shared_button = [
            ControlEntry::Button {
                id: 0,
                label: None,
                index: 2,
                group: 0,
            },
            ControlEntry::Button {
                id: 1,
                label: None,
                index: 2,
                group: 1,
            },
        ];
        assert_eq!(
            ControlMapping::from_entries(&shared_button),
            Err(MappingError::DuplicateButton(2))
        );
    }
}
