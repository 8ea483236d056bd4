//! Authenticated device session with lifecycle-bound teardown.
//!
//! A [`Session`] is either fully connected and logged in, or it does not
//! exist: the constructors tear the half-open handle down on any failure,
//! so no partial state escapes. Destruction attempts stop → logout →
//! destroy in order regardless of the session's current activity, logging
//! but never propagating individual step failures.

use std::net::Ipv4Addr;

use log::{debug, info, warn};

use crate::driver::{DriverResult, ProfileSensor, Status, UserRole, DEFAULT_ADDRESS};
use crate::error::{AppResult, DaqError};
use crate::response::describe;

/// Network bring-up parameters for [`Session::initialize_at_address`].
#[derive(Clone, Debug)]
pub struct NetworkConfig {
    /// Push the desired address to the device when its live configuration
    /// differs. When false, a mismatch is left alone and the connection is
    /// attempted at the desired address anyway.
    pub reconfigure: bool,
    /// Desired network configuration.
    pub address: crate::driver::AddressInfo,
}

/// Owns the connected, logged-in sensor handle.
pub struct Session {
    sensor: Box<dyn ProfileSensor>,
    role: UserRole,
    torn_down: bool,
}

impl Session {
    /// Connects to the factory-default address and logs in.
    pub fn initialize(
        sensor: Box<dyn ProfileSensor>,
        credential: &str,
        role: UserRole,
    ) -> AppResult<Self> {
        Self::bring_up(sensor, DEFAULT_ADDRESS, false, credential, role)
    }

    /// Locates `device_id` via discovery and connects to it, pushing the
    /// desired network configuration first when it differs and
    /// `network.reconfigure` allows it.
    ///
    /// Fails with [`DaqError::DeviceNotFound`] when no enumerated device
    /// matches the serial; no connection is attempted in that case.
    pub fn initialize_at_address(
        mut sensor: Box<dyn ProfileSensor>,
        device_id: u32,
        network: &NetworkConfig,
        credential: &str,
        role: UserRole,
    ) -> AppResult<Self> {
        let devices = checked("Discover", sensor.discover())?;
        let matched = devices.iter().find(|device| device.id == device_id);

        let Some(device) = matched else {
            // `devices` is dropped here, releasing the enumeration results
            // on the failure path as well.
            warn!("Unable to detect device #{}, aborting", device_id);
            return Err(DaqError::DeviceNotFound(device_id));
        };

        let mut readdressed = false;
        if device.address != network.address && network.reconfigure {
            info!(
                "Device #{} is at {}, reconfiguring to {}",
                device_id, device.address.address, network.address.address
            );
            checked("SetAddress", sensor.set_address(device_id, &network.address))?;
            checked("Reset", sensor.reset())?;
            readdressed = true;
        }
        let target = network.address.address;
        drop(devices);

        Self::bring_up(sensor, target, readdressed, credential, role)
    }

    fn bring_up(
        mut sensor: Box<dyn ProfileSensor>,
        address: Ipv4Addr,
        after_reset: bool,
        credential: &str,
        role: UserRole,
    ) -> AppResult<Self> {
        // The reconnect path waits out the reboot a reset causes.
        let connect_result = if after_reset {
            checked("Reconnect", sensor.reconnect(address))
        } else {
            checked("Connect", sensor.connect(address))
        };
        let login_result = connect_result.and_then(|()| checked("Login", sensor.login(role, credential)));

        let mut session = Session {
            sensor,
            role,
            torn_down: false,
        };
        if let Err(err) = login_result {
            session.teardown();
            return Err(err);
        }
        debug!("Session established as {}", session.role);
        Ok(session)
    }

    /// Role the session authenticated with.
    pub fn role(&self) -> UserRole {
        self.role
    }

    /// Runs one device call, logging its response line and converting a
    /// failure status into [`DaqError::Driver`].
    pub(crate) fn call<T>(
        &mut self,
        operation: &'static str,
        f: impl FnOnce(&mut dyn ProfileSensor) -> DriverResult<T>,
    ) -> AppResult<T> {
        checked(operation, f(self.sensor.as_mut()))
    }

    /// Direct access for the acquisition loop's polling path, which treats
    /// timeouts specially and must not pay the error-mapping cost per poll.
    pub(crate) fn sensor_mut(&mut self) -> &mut dyn ProfileSensor {
        self.sensor.as_mut()
    }

    /// Best-effort teardown: stop, logout, destroy, in that order. Safe to
    /// call on an already-torn-down session; step failures are logged and
    /// swallowed.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        for (operation, result) in [
            ("Stop", self.sensor.stop()),
            ("Logout", self.sensor.logout()),
            ("Destroy", self.sensor.destroy()),
        ] {
            match result {
                Ok(()) => debug!("{}", describe(operation, Status::Ok)),
                Err(status) => warn!("Teardown step {}", describe(operation, status)),
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Logs the response line for a raw device call and maps a failure status
/// into the application error type.
fn checked<T>(operation: &'static str, result: DriverResult<T>) -> AppResult<T> {
    match result {
        Ok(value) => {
            debug!("{}", describe(operation, Status::Ok));
            Ok(value)
        }
        Err(status) => {
            debug!("{}", describe(operation, status));
            Err(DaqError::Driver { operation, status })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::mock::MockSensor;
    use crate::driver::{AddressInfo, DiscoveredDevice};

    fn network(reconfigure: bool, address: AddressInfo) -> NetworkConfig {
        NetworkConfig {
            reconfigure,
            address,
        }
    }

    #[test]
    fn test_initialize_logs_in_at_default_address() {
        let sensor = MockSensor::new();
        let probe = sensor.probe();
        let session = Session::initialize(Box::new(sensor), "hunter2", UserRole::Admin);
        assert!(session.is_ok());
        let calls = probe.calls();
        assert!(calls.contains(&"Connect"));
        assert!(calls.contains(&"Login"));
    }

    #[test]
    fn test_unknown_device_fails_without_connecting() {
        let sensor = MockSensor::new().with_device(DiscoveredDevice {
            id: 1111,
            address: AddressInfo::default(),
        });
        let probe = sensor.probe();
        let result = Session::initialize_at_address(
            Box::new(sensor),
            2222,
            &network(false, AddressInfo::default()),
            "",
            UserRole::Admin,
        );
        assert!(matches!(result, Err(DaqError::DeviceNotFound(2222))));
        let calls = probe.calls();
        assert!(!calls.contains(&"Connect"));
        assert!(!calls.contains(&"Reconnect"));
    }

    #[test]
    fn test_matching_address_uses_plain_connect() {
        let address = AddressInfo::default();
        let sensor = MockSensor::new().with_device(DiscoveredDevice {
            id: 42,
            address: address.clone(),
        });
        let probe = sensor.probe();
        let session = Session::initialize_at_address(
            Box::new(sensor),
            42,
            &network(true, address),
            "",
            UserRole::Admin,
        );
        assert!(session.is_ok());
        let calls = probe.calls();
        assert!(calls.contains(&"Connect"));
        assert!(!calls.contains(&"SetAddress"));
        assert!(!calls.contains(&"Reset"));
    }

    #[test]
    fn test_address_mismatch_reconfigures_and_reconnects() {
        let live = AddressInfo::default();
        let desired = AddressInfo {
            address: std::net::Ipv4Addr::new(192, 168, 1, 20),
            ..AddressInfo::default()
        };
        let sensor = MockSensor::new().with_device(DiscoveredDevice {
            id: 42,
            address: live,
        });
        let probe = sensor.probe();
        let session = Session::initialize_at_address(
            Box::new(sensor),
            42,
            &network(true, desired),
            "",
            UserRole::Admin,
        );
        assert!(session.is_ok());
        let calls = probe.calls();
        assert!(calls.contains(&"SetAddress"));
        assert!(calls.contains(&"Reset"));
        assert!(calls.contains(&"Reconnect"));
        assert!(!calls.contains(&"Connect"));
    }

    #[test]
    fn test_mismatch_without_reconfigure_connects_as_is() {
        let live = AddressInfo::default();
        let desired = AddressInfo {
            address: std::net::Ipv4Addr::new(192, 168, 1, 20),
            ..AddressInfo::default()
        };
        let sensor = MockSensor::new().with_device(DiscoveredDevice {
            id: 42,
            address: live,
        });
        let probe = sensor.probe();
        let session = Session::initialize_at_address(
            Box::new(sensor),
            42,
            &network(false, desired),
            "",
            UserRole::Admin,
        );
        assert!(session.is_ok());
        let calls = probe.calls();
        assert!(!calls.contains(&"SetAddress"));
        assert!(calls.contains(&"Connect"));
    }

    #[test]
    fn test_teardown_is_idempotent() {
        let sensor = MockSensor::new();
        let probe = sensor.probe();
        let mut session =
            Session::initialize(Box::new(sensor), "", UserRole::Admin).unwrap();
        session.teardown();
        session.teardown();
        drop(session);
        let calls = probe.calls();
        assert_eq!(calls.iter().filter(|c| **c == "Stop").count(), 1);
        assert_eq!(calls.iter().filter(|c| **c == "Logout").count(), 1);
        assert_eq!(calls.iter().filter(|c| **c == "Destroy").count(), 1);
    }

    #[test]
    fn test_teardown_swallows_step_failures() {
        let sensor = MockSensor::new().failing_stop(Status::BadState);
        let probe = sensor.probe();
        let mut session =
            Session::initialize(Box::new(sensor), "", UserRole::Admin).unwrap();
        session.teardown();
        // Later steps still ran despite the stop failure.
        let calls = probe.calls();
        assert!(calls.contains(&"Logout"));
        assert!(calls.contains(&"Destroy"));
    }
}
