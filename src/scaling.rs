use serde::{Deserialize, Serialize};

/// Transform from a raw stick reading to an unsigned axis position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AxisScaling {
    /// Input in `[-1000, 1000]`, output centred at 32768 over the full u16 range.
    #[serde(rename = "range_1000")]
    Range1000,
    /// Input in `[-255, 255]`, output in `[0, 32767]`.
    #[default]
    #[serde(rename = "range_255")]
    Range255,
}

impl AxisScaling {
    /// Accepted input range; readings outside it are clamped.
    pub fn input_range(self) -> (i16, i16) {
        match self {
            AxisScaling::Range1000 => (-1000, 1000),
            AxisScaling::Range255 => (-255, 255),
        }
    }

    /// Largest value `scale` can produce.
    pub fn output_max(self) -> u16 {
        match self {
            AxisScaling::Range1000 => u16::MAX,
            AxisScaling::Range255 => i16::MAX as u16,
        }
    }

    pub fn scale(self, value: i16) -> u16 {
        let (min, max) = self.input_range();
        let v = f64::from(value.clamp(min, max));
        let scaled = match self {
            AxisScaling::Range1000 => v * 32767.0 / 1000.0 + 32768.0,
            AxisScaling::Range255 => (32767.0 / 510.0) * (v + 255.0),
        };
        scaled.round().clamp(0.0, f64::from(self.output_max())) as u16
    }
}
