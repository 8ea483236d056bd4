//! Signal-conditioning filter setup.
//!
//! Per-axis gap-filling and smoothing windows: a non-positive window
//! disables the feature, a positive one enables it with the value clamped
//! into the device-reported bounds. The resampling tier is pushed
//! unconditionally.

use log::debug;

use crate::driver::{Axis, ResamplingMode};
use crate::error::AppResult;
use crate::session::Session;

/// Filter windows in millimeters plus the global resampling tier.
#[derive(Clone, Debug, PartialEq)]
pub struct FilterConfig {
    pub resampling: ResamplingMode,
    pub x_gap_mm: f64,
    pub y_gap_mm: f64,
    pub x_smooth_mm: f64,
    pub y_smooth_mm: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            resampling: ResamplingMode::Balanced,
            x_gap_mm: 0.0,
            y_gap_mm: 0.0,
            x_smooth_mm: 0.0,
            y_smooth_mm: 0.0,
        }
    }
}

fn clamped(feature: &str, axis: Axis, window: f64, min: f64, max: f64) -> f64 {
    let value = window.clamp(min, max);
    if value != window {
        debug!(
            "{} {} window {} mm out of device range [{}, {}], clamped to {}",
            axis, feature, window, min, max, value
        );
    }
    value
}

impl FilterConfig {
    /// Pushes the filter configuration to the device.
    pub fn apply(&self, session: &mut Session) -> AppResult<()> {
        session.call("SetResampling", |s| s.set_resampling(self.resampling))?;
        self.apply_gap(session, Axis::X, self.x_gap_mm)?;
        self.apply_gap(session, Axis::Y, self.y_gap_mm)?;
        self.apply_smoothing(session, Axis::X, self.x_smooth_mm)?;
        self.apply_smoothing(session, Axis::Y, self.y_smooth_mm)?;
        Ok(())
    }

    fn apply_gap(&self, session: &mut Session, axis: Axis, window: f64) -> AppResult<()> {
        if window > 0.0 {
            let (min, max) = session.call("GapWindowLimits", |s| s.gap_window_limits(axis))?;
            let value = clamped("gap-fill", axis, window, min, max);
            session.call("EnableGapFilling", |s| s.enable_gap_filling(axis, true))?;
            session.call("SetGapWindow", |s| s.set_gap_window(axis, value))?;
        } else {
            session.call("EnableGapFilling", |s| s.enable_gap_filling(axis, false))?;
        }
        Ok(())
    }

    fn apply_smoothing(&self, session: &mut Session, axis: Axis, window: f64) -> AppResult<()> {
        if window > 0.0 {
            let (min, max) =
                session.call("SmoothingWindowLimits", |s| s.smoothing_window_limits(axis))?;
            let value = clamped("smoothing", axis, window, min, max);
            session.call("EnableSmoothing", |s| s.enable_smoothing(axis, true))?;
            session.call("SetSmoothingWindow", |s| s.set_smoothing_window(axis, value))?;
        } else {
            session.call("EnableSmoothing", |s| s.enable_smoothing(axis, false))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::mock::MockSensor;
    use crate::driver::UserRole;
    use crate::session::Session;

    fn session(sensor: MockSensor) -> Session {
        Session::initialize(Box::new(sensor), "", UserRole::Admin).unwrap()
    }

    #[test]
    fn test_positive_windows_enabled_and_clamped() {
        let sensor = MockSensor::new()
            .with_gap_limits(Axis::X, 0.1, 2.0)
            .with_smoothing_limits(Axis::Y, 0.1, 5.0);
        let probe = sensor.probe();
        let mut session = session(sensor);
        let filter = FilterConfig {
            resampling: ResamplingMode::MaxResolution,
            x_gap_mm: 10.0, // above device max
            y_gap_mm: 0.0,
            x_smooth_mm: 0.0,
            y_smooth_mm: 0.01, // below device min
        };
        filter.apply(&mut session).unwrap();
        let applied = probe.applied();
        assert_eq!(applied.resampling, Some(ResamplingMode::MaxResolution));
        assert_eq!(applied.gap_enabled[Axis::X.index()], Some(true));
        assert_eq!(applied.gap_window[Axis::X.index()], Some(2.0));
        assert_eq!(applied.smooth_enabled[Axis::Y.index()], Some(true));
        assert_eq!(applied.smooth_window[Axis::Y.index()], Some(0.1));
    }

    #[test]
    fn test_non_positive_windows_disable_without_push() {
        let sensor = MockSensor::new();
        let probe = sensor.probe();
        let mut session = session(sensor);
        FilterConfig::default().apply(&mut session).unwrap();
        let applied = probe.applied();
        for axis in [Axis::X, Axis::Y] {
            assert_eq!(applied.gap_enabled[axis.index()], Some(false));
            assert_eq!(applied.gap_window[axis.index()], None);
            assert_eq!(applied.smooth_enabled[axis.index()], Some(false));
            assert_eq!(applied.smooth_window[axis.index()], None);
        }
        // Resampling tier goes out even when every window is disabled.
        assert_eq!(applied.resampling, Some(ResamplingMode::Balanced));
    }

    #[test]
    fn test_in_range_window_pushed_unchanged() {
        let sensor = MockSensor::new().with_gap_limits(Axis::Y, 0.1, 2.0);
        let probe = sensor.probe();
        let mut session = session(sensor);
        let filter = FilterConfig {
            y_gap_mm: 0.5,
            ..FilterConfig::default()
        };
        filter.apply(&mut session).unwrap();
        assert_eq!(probe.applied().gap_window[Axis::Y.index()], Some(0.5));
    }
}
