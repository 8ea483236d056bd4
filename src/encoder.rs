//! Linear-motion encoder description.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::driver::EncoderTriggerMode;
use crate::error::{AppResult, DaqError};

/// Travel direction(s) allowed to fire an encoder trigger.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TravelDirection {
    Forward,
    Backward,
    #[default]
    Bidirectional,
}

impl TravelDirection {
    /// Case-insensitive parse; anything unrecognized falls back to
    /// bidirectional, matching the configuration file's permissive
    /// historical behavior.
    pub fn parse(text: &str) -> Self {
        if text.eq_ignore_ascii_case("forward") {
            TravelDirection::Forward
        } else if text.eq_ignore_ascii_case("backward") {
            TravelDirection::Backward
        } else {
            TravelDirection::Bidirectional
        }
    }

    pub(crate) fn trigger_mode(self) -> EncoderTriggerMode {
        match self {
            TravelDirection::Forward => EncoderTriggerMode::IgnoreReverse,
            TravelDirection::Backward => EncoderTriggerMode::TrackReverse,
            TravelDirection::Bidirectional => EncoderTriggerMode::Bidirectional,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TravelDirection::Forward => "forward",
            TravelDirection::Backward => "backward",
            TravelDirection::Bidirectional => "bidirectional",
        }
    }
}

/// Validated description of the attached encoder.
#[derive(Clone, Debug, PartialEq)]
pub struct EncoderConfig {
    /// Make/model, display only.
    pub model: String,
    /// Physical distance per encoder tick, millimeters. Always positive.
    pub resolution_mm: f64,
    /// Travel distance before a trigger fires, millimeters.
    pub travel_threshold_mm: f64,
    /// Allowed travel direction(s).
    pub direction: TravelDirection,
}

impl EncoderConfig {
    /// Validates the raw configuration values. A non-positive resolution
    /// is a fatal configuration error; a travel threshold below the
    /// resolution is silently raised to twice the resolution (the encoder
    /// cannot resolve a shorter distance).
    pub fn new(
        model: impl Into<String>,
        resolution_mm: f64,
        travel_threshold_mm: f64,
        direction: TravelDirection,
    ) -> AppResult<Self> {
        if resolution_mm <= 0.0 {
            return Err(DaqError::Configuration(format!(
                "Encoder resolution must be positive, got {}",
                resolution_mm
            )));
        }
        let travel_threshold_mm = if travel_threshold_mm < resolution_mm {
            let raised = 2.0 * resolution_mm;
            warn!(
                "Invalid travel_threshold, setting to {} mm",
                raised
            );
            raised
        } else {
            travel_threshold_mm
        };
        Ok(Self {
            model: model.into(),
            resolution_mm,
            travel_threshold_mm,
            direction,
        })
    }

    /// Operator-facing summary.
    pub fn describe(&self) -> String {
        format!(
            "{} encoder: resolution {} mm/tick, trigger on {} movement of more than {} mm",
            self.model,
            self.resolution_mm,
            self.direction.as_str(),
            self.travel_threshold_mm
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_positive_resolution_is_fatal() {
        assert!(EncoderConfig::new("lme", 0.0, 1.0, TravelDirection::Forward).is_err());
        assert!(EncoderConfig::new("lme", -0.5, 1.0, TravelDirection::Forward).is_err());
    }

    #[test]
    fn test_low_threshold_raised_to_twice_resolution() {
        let enc = EncoderConfig::new("lme", 0.05, 0.02, TravelDirection::Bidirectional).unwrap();
        assert_eq!(enc.travel_threshold_mm, 0.1);
    }

    #[test]
    fn test_valid_threshold_kept() {
        let enc = EncoderConfig::new("lme", 0.05, 0.25, TravelDirection::Bidirectional).unwrap();
        assert_eq!(enc.travel_threshold_mm, 0.25);
    }

    #[test]
    fn test_direction_parse() {
        assert_eq!(TravelDirection::parse("FORWARD"), TravelDirection::Forward);
        assert_eq!(TravelDirection::parse("Backward"), TravelDirection::Backward);
        assert_eq!(
            TravelDirection::parse("sideways"),
            TravelDirection::Bidirectional
        );
    }
}
