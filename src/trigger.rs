//! Trigger strategy selection.
//!
//! The four triggering mechanisms the device supports are modeled as one
//! sum type with uniform `activate`/`describe` operations, so the
//! acquisition loop stays agnostic to which physical mechanism is in
//! effect. Numeric parameters are clamped to device-reported bounds before
//! being pushed, never rejected.

use log::debug;

use crate::driver::TriggerSource;
use crate::encoder::{EncoderConfig, TravelDirection};
use crate::error::AppResult;
use crate::session::Session;

/// Which mechanism fires a measurement cycle, with its parameters.
#[derive(Clone, Debug, PartialEq)]
pub enum Trigger {
    /// Fixed-rate internal timer.
    Time { frame_rate_hz: f64 },
    /// Host-issued trigger commands.
    Software,
    /// External digital input line.
    DigitalInput,
    /// Encoder travel past a threshold.
    Encoder {
        travel_threshold_mm: f64,
        direction: TravelDirection,
    },
}

/// A trigger choice plus the shared hardware gate flag.
#[derive(Clone, Debug, PartialEq)]
pub struct TriggerConfig {
    pub trigger: Trigger,
    /// Whether the hardware enable condition gates the trigger source.
    pub enable_gate: bool,
}

/// Effective encoder trigger threshold: a configured value that is
/// non-positive or below the encoder's physical resolution is substituted
/// with the resolution itself.
pub(crate) fn effective_threshold(configured_mm: f64, resolution_mm: f64) -> f64 {
    if configured_mm <= 0.0 || configured_mm < resolution_mm {
        resolution_mm
    } else {
        configured_mm
    }
}

impl TriggerConfig {
    /// Pushes this trigger strategy to the device. Parameter order matches
    /// the device's expectations: variant parameters first, then the gate,
    /// then the source selection.
    pub fn activate(&self, session: &mut Session, encoder: &EncoderConfig) -> AppResult<()> {
        let source = match &self.trigger {
            Trigger::Time { frame_rate_hz } => {
                let (min, max) = session.call("FrameRateLimits", |s| s.frame_rate_limits())?;
                let rate = frame_rate_hz.clamp(min, max);
                if rate != *frame_rate_hz {
                    debug!(
                        "Frame rate {} Hz out of device range [{}, {}], clamped to {}",
                        frame_rate_hz, min, max, rate
                    );
                }
                session.call("SetFrameRate", |s| s.set_frame_rate(rate))?;
                TriggerSource::Time
            }
            Trigger::Software => TriggerSource::Software,
            Trigger::DigitalInput => TriggerSource::DigitalInput,
            Trigger::Encoder {
                travel_threshold_mm,
                direction,
            } => {
                let threshold = effective_threshold(*travel_threshold_mm, encoder.resolution_mm);
                if threshold != *travel_threshold_mm {
                    debug!(
                        "Travel threshold {} mm below encoder resolution, using {} mm",
                        travel_threshold_mm, threshold
                    );
                }
                session.call("SetEncoderPeriod", |s| s.set_encoder_period(threshold))?;
                session.call("SetEncoderTriggerMode", |s| {
                    s.set_encoder_trigger_mode(direction.trigger_mode())
                })?;
                TriggerSource::Encoder
            }
        };
        session.call("EnableTriggerGate", |s| s.enable_trigger_gate(self.enable_gate))?;
        session.call("SetTriggerSource", |s| s.set_trigger_source(source))?;
        Ok(())
    }

    /// Operator-facing summary of the active configuration.
    pub fn describe(&self) -> String {
        match &self.trigger {
            Trigger::Time { frame_rate_hz } => format!("Timer ({} cycles/s)", frame_rate_hz),
            Trigger::Software => "Software".to_string(),
            Trigger::DigitalInput => "Digital Input".to_string(),
            Trigger::Encoder {
                travel_threshold_mm,
                direction,
            } => {
                let motion = match direction {
                    TravelDirection::Forward => "forward motion only",
                    TravelDirection::Backward => "backward motion only",
                    TravelDirection::Bidirectional => "forward/backward motion",
                };
                format!("Encoder ({} mm, {})", travel_threshold_mm, motion)
            }
        }
    }
}
