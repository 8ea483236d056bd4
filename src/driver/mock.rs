//! A mock sensor that generates synthetic data.
//!
//! Stands in for the vendor SDK in tests and simulated runs. Batches,
//! encoder tick readings, and failure statuses are scriptable, and every
//! driver call is journaled so tests can assert on what the control layer
//! actually pushed to the device.

use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rand::Rng;

use super::{
    AddressInfo, Axis, DiscoveredDevice, DriverResult, EncoderTriggerMode, ProfileRecord,
    ProfileSensor, ResamplingMode, Status, TriggerSource, UserRole,
};

/// Values the control layer pushed to the device, indexed by
/// [`Axis::index`] where per-axis.
#[derive(Clone, Debug, Default)]
pub struct AppliedConfig {
    pub frame_rate: Option<f64>,
    pub trigger_source: Option<TriggerSource>,
    pub trigger_gate: Option<bool>,
    pub encoder_period: Option<f64>,
    pub encoder_mode: Option<EncoderTriggerMode>,
    pub resampling: Option<ResamplingMode>,
    pub gap_enabled: [Option<bool>; 2],
    pub gap_window: [Option<f64>; 2],
    pub smooth_enabled: [Option<bool>; 2],
    pub smooth_window: [Option<f64>; 2],
}

#[derive(Default)]
struct MockState {
    devices: Vec<DiscoveredDevice>,
    batches: VecDeque<Vec<ProfileRecord>>,
    tick_readings: VecDeque<i64>,
    last_ticks: i64,
    calls: Vec<&'static str>,
    applied: AppliedConfig,
    fail_start: Option<Status>,
    fail_connect_data: Option<Status>,
    fail_stop: Option<Status>,
    frame_rate_limits: (f64, f64),
    gap_limits: [(f64, f64); 2],
    smooth_limits: [(f64, f64); 2],
}

/// Shared view into a [`MockSensor`]'s state, usable after the sensor has
/// been boxed and moved into a session.
#[derive(Clone)]
pub struct SensorProbe {
    state: Arc<Mutex<MockState>>,
}

impl SensorProbe {
    /// Names of the driver calls made so far, in order.
    pub fn calls(&self) -> Vec<&'static str> {
        lock(&self.state).calls.clone()
    }

    /// Configuration values pushed so far.
    pub fn applied(&self) -> AppliedConfig {
        lock(&self.state).applied.clone()
    }
}

pub struct MockSensor {
    state: Arc<Mutex<MockState>>,
    receive_hook: Option<Box<dyn FnMut() + Send>>,
}

fn lock(state: &Arc<Mutex<MockState>>) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Default for MockSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSensor {
    pub fn new() -> Self {
        let state = MockState {
            frame_rate_limits: (0.1, 5000.0),
            gap_limits: [(0.05, 10.0); 2],
            smooth_limits: [(0.05, 50.0); 2],
            ..MockState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            receive_hook: None,
        }
    }

    /// Builds a sensor that discovers as `device_id` at `address` and
    /// produces `batches` batches of one synthetic profile each, with the
    /// encoder advancing `ticks_per_record` between records.
    pub fn synthetic(
        device_id: u32,
        address: AddressInfo,
        batches: usize,
        samples_per_record: usize,
        ticks_per_record: i64,
    ) -> Self {
        let mut rng = rand::thread_rng();
        let mut scripted = Vec::with_capacity(batches);
        for _ in 0..batches {
            let ranges = (0..samples_per_record)
                .map(|i| {
                    let surface = (i as f64 * 0.1).sin() * 400.0;
                    let noise: f64 = rng.gen_range(-5.0..5.0);
                    // Sprinkle in occasional dropouts like a real scan.
                    if rng.gen_ratio(1, 50) {
                        super::INVALID_RANGE
                    } else {
                        (surface + noise) as i16
                    }
                })
                .collect();
            scripted.push(vec![ProfileRecord {
                ranges,
                x_offset: -20.0,
                x_resolution: 0.04,
                z_offset: 50.0,
                z_resolution: 0.01,
            }]);
        }
        let ticks = (0..=batches as i64).map(|i| i * ticks_per_record).collect();
        Self::new()
            .with_device(DiscoveredDevice {
                id: device_id,
                address,
            })
            .with_batches(scripted)
            .with_tick_readings(ticks)
    }

    pub fn with_device(self, device: DiscoveredDevice) -> Self {
        lock(&self.state).devices.push(device);
        self
    }

    pub fn with_batches(self, batches: Vec<Vec<ProfileRecord>>) -> Self {
        lock(&self.state).batches = batches.into();
        self
    }

    /// Scripts the values successive `GetEncoder` calls return. Once the
    /// script runs out, the last value repeats.
    pub fn with_tick_readings(self, readings: Vec<i64>) -> Self {
        lock(&self.state).tick_readings = readings.into();
        self
    }

    pub fn with_frame_rate_limits(self, min: f64, max: f64) -> Self {
        lock(&self.state).frame_rate_limits = (min, max);
        self
    }

    pub fn with_gap_limits(self, axis: Axis, min: f64, max: f64) -> Self {
        lock(&self.state).gap_limits[axis.index()] = (min, max);
        self
    }

    pub fn with_smoothing_limits(self, axis: Axis, min: f64, max: f64) -> Self {
        lock(&self.state).smooth_limits[axis.index()] = (min, max);
        self
    }

    pub fn failing_start(self, status: Status) -> Self {
        lock(&self.state).fail_start = Some(status);
        self
    }

    pub fn failing_connect_data(self, status: Status) -> Self {
        lock(&self.state).fail_connect_data = Some(status);
        self
    }

    pub fn failing_stop(self, status: Status) -> Self {
        lock(&self.state).fail_stop = Some(status);
        self
    }

    /// Installs a hook that runs each time a batch is handed out. Used by
    /// tests to request cancellation while a batch is in flight.
    pub fn on_receive(mut self, hook: impl FnMut() + Send + 'static) -> Self {
        self.receive_hook = Some(Box::new(hook));
        self
    }

    /// Shared handle for inspecting calls and applied values later.
    pub fn probe(&self) -> SensorProbe {
        SensorProbe {
            state: Arc::clone(&self.state),
        }
    }

    fn journal(&self, call: &'static str) -> MutexGuard<'_, MockState> {
        let mut state = lock(&self.state);
        state.calls.push(call);
        state
    }
}

impl ProfileSensor for MockSensor {
    fn discover(&mut self) -> DriverResult<Vec<DiscoveredDevice>> {
        let state = self.journal("Discover");
        Ok(state.devices.clone())
    }

    fn set_address(&mut self, _device_id: u32, _address: &AddressInfo) -> DriverResult<()> {
        self.journal("SetAddress");
        Ok(())
    }

    fn reset(&mut self) -> DriverResult<()> {
        self.journal("Reset");
        Ok(())
    }

    fn connect(&mut self, _address: Ipv4Addr) -> DriverResult<()> {
        self.journal("Connect");
        Ok(())
    }

    fn reconnect(&mut self, _address: Ipv4Addr) -> DriverResult<()> {
        self.journal("Reconnect");
        Ok(())
    }

    fn login(&mut self, _role: UserRole, _credential: &str) -> DriverResult<()> {
        self.journal("Login");
        Ok(())
    }

    fn logout(&mut self) -> DriverResult<()> {
        self.journal("Logout");
        Ok(())
    }

    fn stop(&mut self) -> DriverResult<()> {
        let state = self.journal("Stop");
        match state.fail_stop {
            Some(status) => Err(status),
            None => Ok(()),
        }
    }

    fn destroy(&mut self) -> DriverResult<()> {
        self.journal("Destroy");
        Ok(())
    }

    fn frame_rate_limits(&mut self) -> DriverResult<(f64, f64)> {
        let state = self.journal("FrameRateLimits");
        Ok(state.frame_rate_limits)
    }

    fn set_frame_rate(&mut self, hz: f64) -> DriverResult<()> {
        let mut state = self.journal("SetFrameRate");
        state.applied.frame_rate = Some(hz);
        Ok(())
    }

    fn set_trigger_source(&mut self, source: TriggerSource) -> DriverResult<()> {
        let mut state = self.journal("SetTriggerSource");
        state.applied.trigger_source = Some(source);
        Ok(())
    }

    fn enable_trigger_gate(&mut self, enabled: bool) -> DriverResult<()> {
        let mut state = self.journal("EnableTriggerGate");
        state.applied.trigger_gate = Some(enabled);
        Ok(())
    }

    fn set_encoder_period(&mut self, mm: f64) -> DriverResult<()> {
        let mut state = self.journal("SetEncoderPeriod");
        state.applied.encoder_period = Some(mm);
        Ok(())
    }

    fn set_encoder_trigger_mode(&mut self, mode: EncoderTriggerMode) -> DriverResult<()> {
        let mut state = self.journal("SetEncoderTriggerMode");
        state.applied.encoder_mode = Some(mode);
        Ok(())
    }

    fn encoder_ticks(&mut self) -> DriverResult<i64> {
        let mut state = self.journal("GetEncoder");
        if let Some(ticks) = state.tick_readings.pop_front() {
            state.last_ticks = ticks;
        }
        Ok(state.last_ticks)
    }

    fn set_resampling(&mut self, mode: ResamplingMode) -> DriverResult<()> {
        let mut state = self.journal("SetResampling");
        state.applied.resampling = Some(mode);
        Ok(())
    }

    fn gap_window_limits(&mut self, axis: Axis) -> DriverResult<(f64, f64)> {
        let state = self.journal("GapWindowLimits");
        Ok(state.gap_limits[axis.index()])
    }

    fn enable_gap_filling(&mut self, axis: Axis, enabled: bool) -> DriverResult<()> {
        let mut state = self.journal("EnableGapFilling");
        state.applied.gap_enabled[axis.index()] = Some(enabled);
        Ok(())
    }

    fn set_gap_window(&mut self, axis: Axis, mm: f64) -> DriverResult<()> {
        let mut state = self.journal("SetGapWindow");
        state.applied.gap_window[axis.index()] = Some(mm);
        Ok(())
    }

    fn smoothing_window_limits(&mut self, axis: Axis) -> DriverResult<(f64, f64)> {
        let state = self.journal("SmoothingWindowLimits");
        Ok(state.smooth_limits[axis.index()])
    }

    fn enable_smoothing(&mut self, axis: Axis, enabled: bool) -> DriverResult<()> {
        let mut state = self.journal("EnableSmoothing");
        state.applied.smooth_enabled[axis.index()] = Some(enabled);
        Ok(())
    }

    fn set_smoothing_window(&mut self, axis: Axis, mm: f64) -> DriverResult<()> {
        let mut state = self.journal("SetSmoothingWindow");
        state.applied.smooth_window[axis.index()] = Some(mm);
        Ok(())
    }

    fn start(&mut self) -> DriverResult<()> {
        let state = self.journal("Start");
        match state.fail_start {
            Some(status) => Err(status),
            None => Ok(()),
        }
    }

    fn connect_data(&mut self) -> DriverResult<()> {
        let state = self.journal("ConnectData");
        match state.fail_connect_data {
            Some(status) => Err(status),
            None => Ok(()),
        }
    }

    fn receive_data(&mut self, _timeout: Duration) -> DriverResult<Vec<ProfileRecord>> {
        let batch = {
            let mut state = self.journal("ReceiveData");
            state.batches.pop_front()
        };
        match batch {
            Some(batch) => {
                if let Some(hook) = self.receive_hook.as_mut() {
                    hook();
                }
                Ok(batch)
            }
            None => Err(Status::TimedOut),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batches_drain_then_time_out() {
        let record = ProfileRecord {
            ranges: vec![1, 2, 3],
            x_offset: 0.0,
            x_resolution: 1.0,
            z_offset: 0.0,
            z_resolution: 1.0,
        };
        let mut sensor = MockSensor::new().with_batches(vec![vec![record.clone()]]);
        assert_eq!(
            sensor.receive_data(Duration::from_millis(1)),
            Ok(vec![record])
        );
        assert_eq!(
            sensor.receive_data(Duration::from_millis(1)),
            Err(Status::TimedOut)
        );
    }

    #[test]
    fn test_tick_script_repeats_last_value() {
        let mut sensor = MockSensor::new().with_tick_readings(vec![5, 9]);
        assert_eq!(sensor.encoder_ticks(), Ok(5));
        assert_eq!(sensor.encoder_ticks(), Ok(9));
        assert_eq!(sensor.encoder_ticks(), Ok(9));
    }

    #[test]
    fn test_synthetic_sensor_discovers_itself() {
        let mut sensor = MockSensor::synthetic(7, AddressInfo::default(), 2, 16, 40);
        let devices = sensor.discover().unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].id, 7);
    }
}
