//! Operator-editable configuration file handling.
//!
//! The `.cfg` file is an INI-style key/value file with `System`,
//! `Network`, `Encoder`, `Trigger`, `Filtering`, and `Output` sections.
//! Loading is two-phase, as everywhere else in this codebase: the `config`
//! crate parses the file into typed sections with defaults, then the
//! accessor methods validate the raw values into domain types so invalid
//! configuration is caught before any device call.

use std::net::Ipv4Addr;
use std::path::Path;

use config::{Config, File, FileFormat};
use serde::Deserialize;

use crate::driver::{AddressInfo, ResamplingMode};
use crate::encoder::{EncoderConfig, TravelDirection};
use crate::error::{AppResult, DaqError};
use crate::filter::FilterConfig;
use crate::session::NetworkConfig;
use crate::trigger::{Trigger, TriggerConfig};

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SystemSection {
    /// Device serial number.
    pub device_id: u32,
    /// Login credential.
    pub password: String,
}

impl Default for SystemSection {
    fn default() -> Self {
        Self {
            device_id: 0,
            password: String::new(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct NetworkSection {
    pub reconfigure: bool,
    pub use_dhcp: bool,
    pub address: String,
    pub subnet_mask: String,
    pub gateway: String,
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            reconfigure: false,
            use_dhcp: false,
            address: "192.168.1.10".to_string(),
            subnet_mask: "255.255.255.0".to_string(),
            gateway: "0.0.0.0".to_string(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct EncoderSection {
    pub model: String,
    /// Millimeters per encoder tick.
    pub resolution: f64,
    /// Desired trigger threshold in millimeters.
    pub travel_threshold: f64,
    pub travel_direction: String,
}

impl Default for EncoderSection {
    fn default() -> Self {
        Self {
            model: "<unspecified>".to_string(),
            resolution: 0.0,
            travel_threshold: 0.0,
            travel_direction: "bidirectional".to_string(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TriggerSection {
    pub r#type: String,
    /// Frame rate of a time trigger, Hz.
    pub frame_rate: f64,
    pub travel_threshold: f64,
    pub travel_direction: String,
    pub enable_gate: bool,
}

impl Default for TriggerSection {
    fn default() -> Self {
        Self {
            r#type: "Time".to_string(),
            frame_rate: 0.0,
            travel_threshold: 0.0,
            travel_direction: "bidirectional".to_string(),
            enable_gate: false,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct FilteringSection {
    pub scanner_resolution: String,
    pub xgap_fill: f64,
    pub ygap_fill: f64,
    pub xsmooth: f64,
    pub ysmooth: f64,
}

impl Default for FilteringSection {
    fn default() -> Self {
        Self {
            scanner_resolution: "medium".to_string(),
            xgap_fill: 0.0,
            ygap_fill: 0.0,
            xsmooth: 0.0,
            ysmooth: 0.0,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    /// Free-text comment written into the output file header.
    pub comment: Option<String>,
}

/// Parsed configuration file.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(alias = "System")]
    pub system: SystemSection,
    #[serde(alias = "Network")]
    pub network: NetworkSection,
    #[serde(alias = "Encoder")]
    pub encoder: EncoderSection,
    #[serde(alias = "Trigger")]
    pub trigger: TriggerSection,
    #[serde(alias = "Filtering")]
    pub filtering: FilteringSection,
    #[serde(alias = "Output")]
    pub output: OutputSection,
}

impl Settings {
    /// Loads and parses the configuration file. A missing file is fatal.
    pub fn load(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            return Err(DaqError::Configuration(format!(
                "Unable to find configuration file '{}'",
                path.display()
            )));
        }
        let settings = Config::builder()
            .add_source(File::from(path).format(FileFormat::Ini))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    pub fn device_id(&self) -> u32 {
        self.system.device_id
    }

    pub fn credential(&self) -> &str {
        &self.system.password
    }

    /// Validated encoder configuration.
    pub fn encoder(&self) -> AppResult<EncoderConfig> {
        EncoderConfig::new(
            self.encoder.model.clone(),
            self.encoder.resolution,
            self.encoder.travel_threshold,
            TravelDirection::parse(&self.encoder.travel_direction),
        )
    }

    /// Trigger strategy. An unrecognized type defaults to time triggering,
    /// matching the file format's historical behavior.
    pub fn trigger(&self) -> TriggerConfig {
        let section = &self.trigger;
        let trigger = if section.r#type.eq_ignore_ascii_case("encoder") {
            Trigger::Encoder {
                travel_threshold_mm: section.travel_threshold,
                direction: TravelDirection::parse(&section.travel_direction),
            }
        } else if section.r#type.eq_ignore_ascii_case("input") {
            Trigger::DigitalInput
        } else if section.r#type.eq_ignore_ascii_case("software") {
            Trigger::Software
        } else {
            Trigger::Time {
                frame_rate_hz: section.frame_rate,
            }
        };
        TriggerConfig {
            trigger,
            enable_gate: section.enable_gate,
        }
    }

    /// Filter windows and resampling tier.
    pub fn filter(&self) -> FilterConfig {
        let tier = &self.filtering.scanner_resolution;
        let resampling = if tier.eq_ignore_ascii_case("low") {
            ResamplingMode::MaxSpeed
        } else if tier.eq_ignore_ascii_case("high") {
            ResamplingMode::MaxResolution
        } else {
            ResamplingMode::Balanced
        };
        FilterConfig {
            resampling,
            x_gap_mm: self.filtering.xgap_fill,
            y_gap_mm: self.filtering.ygap_fill,
            x_smooth_mm: self.filtering.xsmooth,
            y_smooth_mm: self.filtering.ysmooth,
        }
    }

    /// Validated network bring-up parameters.
    pub fn network(&self) -> AppResult<NetworkConfig> {
        Ok(NetworkConfig {
            reconfigure: self.network.reconfigure,
            address: AddressInfo {
                use_dhcp: self.network.use_dhcp,
                address: parse_ip("Network.address", &self.network.address)?,
                mask: parse_ip("Network.subnet_mask", &self.network.subnet_mask)?,
                gateway: parse_ip("Network.gateway", &self.network.gateway)?,
            },
        })
    }
}

fn parse_ip(option: &str, text: &str) -> AppResult<Ipv4Addr> {
    text.parse().map_err(|_| {
        DaqError::Configuration(format!("Bad value '{}' for option {}", text, option))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_cfg(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scanner.cfg");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        (dir, path)
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let result = Settings::load(Path::new("/no/such/scanner.cfg"));
        assert!(matches!(result, Err(DaqError::Configuration(_))));
    }

    #[test]
    fn test_full_file_parses() {
        let (_dir, path) = write_cfg(
            "[System]\n\
             device_id = 1234567\n\
             \n\
             [Network]\n\
             reconfigure = true\n\
             address = 192.168.1.20\n\
             \n\
             [Encoder]\n\
             model = LME-500\n\
             resolution = 0.05\n\
             travel_threshold = 0.25\n\
             travel_direction = forward\n\
             \n\
             [Trigger]\n\
             type = Encoder\n\
             travel_threshold = 0.25\n\
             travel_direction = forward\n\
             enable_gate = true\n\
             \n\
             [Filtering]\n\
             scanner_resolution = high\n\
             xgap_fill = 0.5\n",
        );
        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.device_id(), 1234567);

        let network = settings.network().unwrap();
        assert!(network.reconfigure);
        assert_eq!(network.address.address, Ipv4Addr::new(192, 168, 1, 20));
        assert_eq!(network.address.mask, Ipv4Addr::new(255, 255, 255, 0));

        let encoder = settings.encoder().unwrap();
        assert_eq!(encoder.model, "LME-500");
        assert_eq!(encoder.resolution_mm, 0.05);
        assert_eq!(encoder.direction, TravelDirection::Forward);

        let trigger = settings.trigger();
        assert!(trigger.enable_gate);
        assert_eq!(
            trigger.trigger,
            Trigger::Encoder {
                travel_threshold_mm: 0.25,
                direction: TravelDirection::Forward,
            }
        );

        let filter = settings.filter();
        assert_eq!(filter.resampling, ResamplingMode::MaxResolution);
        assert_eq!(filter.x_gap_mm, 0.5);
        assert_eq!(filter.y_gap_mm, 0.0);
    }

    #[test]
    fn test_defaults_when_sections_missing() {
        let (_dir, path) = write_cfg("[Encoder]\nresolution = 0.1\n");
        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.device_id(), 0);
        assert_eq!(settings.credential(), "");

        let network = settings.network().unwrap();
        assert!(!network.reconfigure);
        assert_eq!(network.address.address, Ipv4Addr::new(192, 168, 1, 10));

        // Unspecified trigger defaults to time triggering.
        let trigger = settings.trigger();
        assert_eq!(trigger.trigger, Trigger::Time { frame_rate_hz: 0.0 });
        assert!(!trigger.enable_gate);

        let filter = settings.filter();
        assert_eq!(filter.resampling, ResamplingMode::Balanced);
    }

    #[test]
    fn test_unset_encoder_resolution_fails_validation() {
        let (_dir, path) = write_cfg("[System]\ndevice_id = 1\n");
        let settings = Settings::load(&path).unwrap();
        assert!(settings.encoder().is_err());
    }

    #[test]
    fn test_bad_network_address_fails_validation() {
        let (_dir, path) = write_cfg("[Network]\naddress = not-an-ip\n");
        let settings = Settings::load(&path).unwrap();
        let result = settings.network();
        assert!(matches!(result, Err(DaqError::Configuration(_))));
    }

    #[test]
    fn test_unknown_trigger_type_defaults_to_time() {
        let (_dir, path) = write_cfg("[Trigger]\ntype = telepathy\nframe_rate = 30\n");
        let settings = Settings::load(&path).unwrap();
        assert_eq!(
            settings.trigger().trigger,
            Trigger::Time { frame_rate_hz: 30.0 }
        );
    }
}
