//! Device driver capability seam.
//!
//! The vendor SDK for the profiler is a stateful C-style API; everything
//! the rest of the crate needs from it is captured by the [`ProfileSensor`]
//! trait. Driver calls report a [`Status`] code; getters return
//! `Result<T, Status>` so callers branch on ok/err only and feed the code
//! itself to [`crate::response::describe`] for diagnostics.

pub mod mock;

use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Bounded wait used by each poll of the data channel. Doubles as the
/// cancellation-check granularity of the acquisition loop.
pub const RECEIVE_TIMEOUT: Duration = Duration::from_millis(100);

/// Reserved raw range value meaning "no valid measurement at this
/// position" (the sensor's 16-bit 0x8000 sentinel).
pub const INVALID_RANGE: i16 = i16::MIN;

/// Factory-default sensor address.
pub const DEFAULT_ADDRESS: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 10);

/// Result type for raw device calls.
pub type DriverResult<T> = std::result::Result<T, Status>;

/// Closed set of status codes the device driver can report.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Ok,
    Error,
    Aborted,
    AlreadyExists,
    Closed,
    BadCommand,
    BadHandle,
    BufferTooSmall,
    OutOfMemory,
    NotFound,
    BadParameter,
    BadState,
    StreamError,
    TimedOut,
    Unimplemented,
    BadVersion,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phrase = match self {
            Status::Ok => "ok",
            Status::Error => "general error",
            Status::Aborted => "operation aborted",
            Status::AlreadyExists => "conflicts with existing item",
            Status::Closed => "resource no longer available",
            Status::BadCommand => "command not recognized",
            Status::BadHandle => "handle is invalid",
            Status::BufferTooSmall => "buffer not large enough for data",
            Status::OutOfMemory => "out of memory",
            Status::NotFound => "item not found",
            Status::BadParameter => "parameter is invalid",
            Status::BadState => "invalid state",
            Status::StreamError => "error in stream",
            Status::TimedOut => "action timed out",
            Status::Unimplemented => "feature not implemented",
            Status::BadVersion => "invalid version number",
        };
        f.write_str(phrase)
    }
}

/// Authenticated role used for the device login.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserRole {
    /// Full configuration rights.
    Admin,
    /// Read-mostly operator role.
    Technician,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Admin => f.write_str("admin"),
            UserRole::Technician => f.write_str("technician"),
        }
    }
}

/// Source selecting when a measurement cycle fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerSource {
    Time,
    Software,
    DigitalInput,
    Encoder,
}

/// Encoder trigger direction mode as understood by the device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncoderTriggerMode {
    /// Trigger on travel in either direction.
    Bidirectional,
    /// Trigger on forward travel only.
    IgnoreReverse,
    /// Trigger on backward travel only.
    TrackReverse,
}

/// Device-side speed/resolution tradeoff for resampling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResamplingMode {
    MaxSpeed,
    Balanced,
    MaxResolution,
}

/// Measurement axis for per-axis filter features. X is along-scan,
/// Y is the encoder axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    pub(crate) fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::X => f.write_str("X"),
            Axis::Y => f.write_str("Y"),
        }
    }
}

/// Network configuration of a sensor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddressInfo {
    pub use_dhcp: bool,
    pub address: Ipv4Addr,
    pub mask: Ipv4Addr,
    pub gateway: Ipv4Addr,
}

impl Default for AddressInfo {
    fn default() -> Self {
        Self {
            use_dhcp: false,
            address: DEFAULT_ADDRESS,
            mask: Ipv4Addr::new(255, 255, 255, 0),
            gateway: Ipv4Addr::new(0, 0, 0, 0),
        }
    }
}

/// One entry from device enumeration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiscoveredDevice {
    /// Device serial number.
    pub id: u32,
    /// Live network configuration the device reported.
    pub address: AddressInfo,
}

/// One batch entry: an irregular-length sequence of raw range samples
/// captured at a single trigger event, with the scale factors needed to
/// convert sample index and raw range to millimeters.
#[derive(Clone, Debug, PartialEq)]
pub struct ProfileRecord {
    /// Raw 16-bit range samples. [`INVALID_RANGE`] marks gaps.
    pub ranges: Vec<i16>,
    pub x_offset: f64,
    pub x_resolution: f64,
    pub z_offset: f64,
    pub z_resolution: f64,
}

/// Capability set consumed from the vendor device driver.
///
/// Implementations wrap the real SDK or, for tests and simulated runs,
/// [`mock::MockSensor`]. All calls are blocking; the only call expected
/// to block for a meaningful time is [`ProfileSensor::receive_data`].
pub trait ProfileSensor: Send {
    // Discovery and connection lifecycle.
    fn discover(&mut self) -> DriverResult<Vec<DiscoveredDevice>>;
    fn set_address(&mut self, device_id: u32, address: &AddressInfo) -> DriverResult<()>;
    /// Reboots the device so a pushed address takes effect.
    fn reset(&mut self) -> DriverResult<()>;
    fn connect(&mut self, address: Ipv4Addr) -> DriverResult<()>;
    /// Connect variant that tolerates the reboot delay after a reset.
    fn reconnect(&mut self, address: Ipv4Addr) -> DriverResult<()>;
    fn login(&mut self, role: UserRole, credential: &str) -> DriverResult<()>;
    fn logout(&mut self) -> DriverResult<()>;
    fn stop(&mut self) -> DriverResult<()>;
    fn destroy(&mut self) -> DriverResult<()>;

    // Trigger and encoder configuration.
    fn frame_rate_limits(&mut self) -> DriverResult<(f64, f64)>;
    fn set_frame_rate(&mut self, hz: f64) -> DriverResult<()>;
    fn set_trigger_source(&mut self, source: TriggerSource) -> DriverResult<()>;
    fn enable_trigger_gate(&mut self, enabled: bool) -> DriverResult<()>;
    fn set_encoder_period(&mut self, mm: f64) -> DriverResult<()>;
    fn set_encoder_trigger_mode(&mut self, mode: EncoderTriggerMode) -> DriverResult<()>;
    /// Current encoder tick count.
    fn encoder_ticks(&mut self) -> DriverResult<i64>;

    // Signal conditioning.
    fn set_resampling(&mut self, mode: ResamplingMode) -> DriverResult<()>;
    fn gap_window_limits(&mut self, axis: Axis) -> DriverResult<(f64, f64)>;
    fn enable_gap_filling(&mut self, axis: Axis, enabled: bool) -> DriverResult<()>;
    fn set_gap_window(&mut self, axis: Axis, mm: f64) -> DriverResult<()>;
    fn smoothing_window_limits(&mut self, axis: Axis) -> DriverResult<(f64, f64)>;
    fn enable_smoothing(&mut self, axis: Axis, enabled: bool) -> DriverResult<()>;
    fn set_smoothing_window(&mut self, axis: Axis, mm: f64) -> DriverResult<()>;

    // Streaming.
    fn start(&mut self) -> DriverResult<()>;
    fn connect_data(&mut self) -> DriverResult<()>;
    /// Blocks up to `timeout` for the next batch of profile records.
    /// `Err(Status::TimedOut)` means no new record arrived; it is not an
    /// error condition for callers.
    fn receive_data(&mut self, timeout: Duration) -> DriverResult<Vec<ProfileRecord>>;
}
