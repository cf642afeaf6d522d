//! Configuration loading using Figment.
//!
//! Configuration is read from a TOML or YAML file (chosen by extension) and then
//! overridden by environment variables prefixed with `HEXAPOD_`. Nested keys are
//! separated by a double underscore:
//!
//! ```text
//! HEXAPOD_SERIAL__PORT=/dev/ttyUSB0
//! HEXAPOD_VISUALIZATION__UPDATE_RATE=30
//! ```
//!
//! Loading always validates. A [`HexapodConfig`] returned by [`HexapodConfig::load_from`]
//! has exactly six well-formed legs and every value within its documented range.
//!
//! # Example
//! ```no_run
//! use hexapod_telemetry::config::HexapodConfig;
//!
//! let config = HexapodConfig::load_from("config.yaml")?;
//! let geometry = config.robot_geometry()?;
//! println!("{} on {}", config.application.name, config.serial.port);
//! # Ok::<(), hexapod_telemetry::error::ConfigError>(())
//! ```

use crate::error::ConfigError;
use crate::geometry::{BodyDimensions, LegGeometry, LegIndex, RobotGeometry, LEG_COUNT};
use crate::validation;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "HEXAPOD_";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HexapodConfig {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Serial link to the robot
    #[serde(default)]
    pub serial: SerialConfig,
    /// Physical robot description
    pub robot: RobotConfig,
    /// Frame output settings
    #[serde(default)]
    pub visualization: VisualizationConfig,
    /// Data interpretation settings
    #[serde(default)]
    pub data: DataConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    #[serde(default = "default_app_name")]
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Serial port configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Port name, e.g. `COM5` or `/dev/ttyUSB0`
    #[serde(default = "default_port")]
    pub port: String,
    /// Baud rate, one of [`validation::STANDARD_BAUD_RATES`]
    #[serde(default = "default_baudrate")]
    pub baudrate: u32,
    /// Read timeout in seconds
    #[serde(default = "default_timeout_secs", alias = "timeout")]
    pub timeout_secs: f64,
}

impl SerialConfig {
    /// Read timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs.max(0.0))
    }
}

/// Robot body and legs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotConfig {
    /// Body dimensions (meters)
    pub body: BodyDimensions,
    /// Legs keyed by index "0" to "5"
    pub legs: BTreeMap<String, LegConfig>,
}

/// One leg as written in the configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegConfig {
    /// Display name
    pub name: String,
    /// Mount position `[x, y, z]` in body coordinates (meters)
    pub position: Vec<f64>,
    /// Mount rotation about body Z (radians)
    pub rotation: f64,
    /// `[coxa, femur, tibia]` or `[femur, tibia]` (meters)
    pub link_lengths: Vec<f64>,
    /// Calibration offsets for coxa, femur, tibia (radians)
    pub joint_angle_offsets: Vec<f64>,
}

/// Frame output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualizationConfig {
    /// Frames per second, 1-120
    #[serde(default = "default_update_rate")]
    pub update_rate: u32,
    /// Sample history length, 10-1000
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Include the body outline in the scene description
    #[serde(default = "default_true")]
    pub show_body: bool,
    /// Include leg chains in frames
    #[serde(default = "default_true")]
    pub show_legs: bool,
    /// Include the body axes in the scene description
    #[serde(default = "default_true")]
    pub show_coordinates: bool,
    /// Named RGB colors, each channel 0-255
    #[serde(default = "default_colors")]
    pub colors: BTreeMap<String, Vec<i64>>,
}

impl VisualizationConfig {
    /// Interval between frames.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.update_rate.max(1)))
    }
}

/// Handedness of the output coordinate frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateSystem {
    /// X forward, Y left, Z up (robot native)
    #[default]
    RightHand,
    /// Y mirrored
    LeftHand,
}

/// Length unit of output coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Units {
    /// Meters (robot native)
    #[default]
    Meters,
    /// Millimeters
    Millimeters,
}

impl Units {
    /// Factor converting meters into this unit.
    pub fn per_meter(self) -> f64 {
        match self {
            Units::Meters => 1.0,
            Units::Millimeters => 1000.0,
        }
    }
}

/// Data interpretation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    /// Output handedness
    #[serde(default)]
    pub coordinate_system: CoordinateSystem,
    /// Output units
    #[serde(default)]
    pub units: Units,
    /// Average reported foot positions over recent samples
    #[serde(default)]
    pub enable_smoothing: bool,
    /// Number of samples to average, 1-50
    #[serde(default = "default_smoothing_window")]
    pub smoothing_window: usize,
}

// Default value functions
fn default_app_name() -> String {
    "Hexapod Telemetry".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_port() -> String {
    "COM5".to_string()
}

fn default_baudrate() -> u32 {
    115200
}

fn default_timeout_secs() -> f64 {
    1.0
}

fn default_update_rate() -> u32 {
    60
}

fn default_buffer_size() -> usize {
    100
}

fn default_true() -> bool {
    true
}

fn default_colors() -> BTreeMap<String, Vec<i64>> {
    BTreeMap::from([
        ("body".to_string(), vec![100, 100, 100]),
        ("legs".to_string(), vec![50, 150, 200]),
        ("coordinates".to_string(), vec![255, 0, 0]),
    ])
}

fn default_smoothing_window() -> usize {
    5
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            log_level: default_log_level(),
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            baudrate: default_baudrate(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            update_rate: default_update_rate(),
            buffer_size: default_buffer_size(),
            show_body: true,
            show_legs: true,
            show_coordinates: true,
            colors: default_colors(),
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            coordinate_system: CoordinateSystem::default(),
            units: Units::default(),
            enable_smoothing: false,
            smoothing_window: default_smoothing_window(),
        }
    }
}

/// Reference leg layout: name, mount position, mount rotation.
const DEFAULT_LEGS: [(&str, [f64; 3], f64); LEG_COUNT] = [
    ("Left Front", [0.075, 0.075, 0.0], 0.7854),
    ("Left Middle", [0.0, 0.085, 0.0], 1.5708),
    ("Left Back", [-0.075, 0.075, 0.0], 2.3562),
    ("Right Front", [0.075, -0.075, 0.0], -0.7854),
    ("Right Middle", [0.0, -0.085, 0.0], -1.5708),
    ("Right Back", [-0.075, -0.075, 0.0], -2.3562),
];

/// Default link lengths `[coxa, femur, tibia]` (meters).
pub const DEFAULT_LINK_LENGTHS: [f64; 3] = [0.03, 0.08, 0.12];

/// File formats accepted by the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.toml`
    Toml,
    /// `.yaml` / `.yml`
    Yaml,
}

impl ConfigFormat {
    /// Picks the format from the file extension; anything but `.yaml`/`.yml` is TOML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                ConfigFormat::Yaml
            }
            _ => ConfigFormat::Toml,
        }
    }
}

impl HexapodConfig {
    /// The reference hexapod: six legs on a 0.2 x 0.15 x 0.05 m body.
    pub fn default_config() -> Self {
        let legs = DEFAULT_LEGS
            .iter()
            .enumerate()
            .map(|(i, (name, position, rotation))| {
                (
                    i.to_string(),
                    LegConfig {
                        name: (*name).to_string(),
                        position: position.to_vec(),
                        rotation: *rotation,
                        link_lengths: DEFAULT_LINK_LENGTHS.to_vec(),
                        joint_angle_offsets: vec![0.0; 3],
                    },
                )
            })
            .collect();

        Self {
            application: ApplicationConfig::default(),
            serial: SerialConfig::default(),
            robot: RobotConfig {
                body: BodyDimensions {
                    length: 0.2,
                    width: 0.15,
                    height: 0.05,
                },
                legs,
            },
            visualization: VisualizationConfig::default(),
            data: DataConfig::default(),
        }
    }

    /// Loads and validates configuration from `path`, applying `HEXAPOD_` overrides.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::load_with_env(path, ENV_PREFIX)
    }

    /// Like [`HexapodConfig::load_from`] with a custom environment prefix.
    pub fn load_with_env<P: AsRef<Path>>(path: P, env_prefix: &str) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }

        let base = match ConfigFormat::from_path(path) {
            ConfigFormat::Toml => Figment::from(Toml::file(path)),
            ConfigFormat::Yaml => {
                let text = std::fs::read_to_string(path)?;
                Figment::from(Serialized::defaults(yaml_document(&text)?))
            }
        };

        let config: Self = base
            .merge(Env::prefixed(env_prefix).split("__"))
            .extract()?;
        config.validate()?;

        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Checks every value against its documented range, including the leg table.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::invalid(
                "application.log_level",
                format!(
                    "'{}' is not one of: {}",
                    self.application.log_level,
                    valid_levels.join(", ")
                ),
            ));
        }

        validation::is_not_empty(&self.serial.port)
            .map_err(|e| ConfigError::invalid("serial.port", e))?;
        validation::is_standard_baud_rate(self.serial.baudrate)
            .map_err(|e| ConfigError::invalid("serial.baudrate", e))?;
        validation::is_positive(self.serial.timeout_secs)
            .map_err(|e| ConfigError::invalid("serial.timeout_secs", e))?;

        let body = &self.robot.body;
        for (field, value) in [
            ("robot.body.length", body.length),
            ("robot.body.width", body.width),
            ("robot.body.height", body.height),
        ] {
            validation::is_positive(value).map_err(|e| ConfigError::invalid(field, e))?;
        }

        let vis = &self.visualization;
        validation::is_in_range(vis.update_rate, 1..=120)
            .map_err(|_| ConfigError::invalid("visualization.update_rate", "must be 1-120"))?;
        validation::is_in_range(vis.buffer_size, 10..=1000)
            .map_err(|_| ConfigError::invalid("visualization.buffer_size", "must be 10-1000"))?;
        for (name, rgb) in &vis.colors {
            validation::is_rgb(rgb)
                .map_err(|e| ConfigError::invalid(format!("visualization.colors.{name}"), e))?;
        }

        validation::is_in_range(self.data.smoothing_window, 1..=50)
            .map_err(|_| ConfigError::invalid("data.smoothing_window", "must be 1-50"))?;

        self.robot_geometry().map(|_| ())
    }

    /// Builds the validated robot geometry from the leg table.
    ///
    /// # Errors
    /// [`ConfigError::ExtraLegs`] for keys other than "0" to "5",
    /// [`ConfigError::MissingLegs`] when any of the six is absent, and any error from
    /// [`LegGeometry::new`].
    pub fn robot_geometry(&self) -> Result<RobotGeometry, ConfigError> {
        let mut slots: [Option<(&String, &LegConfig)>; LEG_COUNT] = Default::default();
        let mut extra = Vec::new();

        for (key, leg) in &self.robot.legs {
            let Some(index) = key.trim().parse::<u8>().ok().and_then(LegIndex::new) else {
                extra.push(key.clone());
                continue;
            };
            let slot = &mut slots[index.as_usize()];
            if let Some((first, _)) = slot {
                return Err(ConfigError::invalid(
                    "robot.legs",
                    format!("keys '{first}' and '{key}' both name leg {index}"),
                ));
            }
            *slot = Some((key, leg));
        }
        if !extra.is_empty() {
            return Err(ConfigError::ExtraLegs(extra));
        }

        let missing: Vec<u8> = LegIndex::ALL
            .iter()
            .filter(|leg| slots[leg.as_usize()].is_none())
            .map(|leg| leg.get())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingLegs(missing));
        }

        let mut legs = Vec::with_capacity(LEG_COUNT);
        for (index, slot) in LegIndex::ALL.into_iter().zip(slots) {
            let Some((_, leg)) = slot else {
                return Err(ConfigError::MissingLegs(vec![index.get()]));
            };
            legs.push(leg.to_geometry(index)?);
        }
        let legs: [LegGeometry; LEG_COUNT] = legs
            .try_into()
            .map_err(|_| ConfigError::invalid("robot.legs", "expected six legs"))?;

        Ok(RobotGeometry::new(self.robot.body, legs))
    }

    /// Serializes the configuration in the format implied by `path` and writes it there.
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let text = match ConfigFormat::from_path(path) {
            ConfigFormat::Toml => {
                toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
            }
            ConfigFormat::Yaml => {
                serde_yaml::to_string(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
            }
        };
        std::fs::write(path, text)?;
        tracing::info!(path = %path.display(), "Default configuration written");
        Ok(())
    }

    /// Writes [`HexapodConfig::default_config`] to `path`.
    pub fn write_default<P: AsRef<Path>>(path: P) -> Result<(), ConfigError> {
        Self::default_config().write_to(path)
    }
}

impl LegConfig {
    fn to_geometry(&self, index: LegIndex) -> Result<LegGeometry, ConfigError> {
        let position: [f64; 3] = self.position.as_slice().try_into().map_err(|_| {
            ConfigError::invalid(
                format!("robot.legs.{index}.position"),
                format!("must have exactly 3 coordinates, got {}", self.position.len()),
            )
        })?;
        LegGeometry::new(
            index,
            self.name.clone(),
            position,
            self.rotation,
            &self.link_lengths,
            &self.joint_angle_offsets,
        )
    }

    /// Mount position as a point, if it has three coordinates.
    pub fn mount_point(&self) -> Option<Point3<f64>> {
        match *self.position.as_slice() {
            [x, y, z] => Some(Point3::new(x, y, z)),
            _ => None,
        }
    }
}

/// Parses a YAML document into a string-keyed tree.
///
/// YAML allows `0:` style integer keys for the leg table; they are turned into strings
/// so that the document can be merged with other providers.
fn yaml_document(text: &str) -> Result<serde_json::Value, ConfigError> {
    let value: serde_yaml::Value = serde_yaml::from_str(text)
        .map_err(|e| ConfigError::invalid("yaml", format!("Invalid YAML: {e}")))?;
    yaml_to_tree(value)
}

fn yaml_to_tree(value: serde_yaml::Value) -> Result<serde_json::Value, ConfigError> {
    use serde_json::Value as J;
    use serde_yaml::Value as Y;

    Ok(match value {
        Y::Null => J::Null,
        Y::Bool(b) => J::Bool(b),
        Y::Number(n) => {
            if let Some(i) = n.as_i64() {
                J::from(i)
            } else if let Some(u) = n.as_u64() {
                J::from(u)
            } else {
                // NaN and infinities become null and fail numeric extraction
                n.as_f64().map_or(J::Null, J::from)
            }
        }
        Y::String(s) => J::String(s),
        Y::Sequence(items) => J::Array(
            items
                .into_iter()
                .map(yaml_to_tree)
                .collect::<Result<_, _>>()?,
        ),
        Y::Mapping(map) => {
            let mut object = serde_json::Map::with_capacity(map.len());
            for (key, value) in map {
                let key = match key {
                    Y::String(s) => s,
                    Y::Number(n) => n.to_string(),
                    Y::Bool(b) => b.to_string(),
                    other => {
                        return Err(ConfigError::invalid(
                            "yaml",
                            format!("unsupported mapping key {other:?}"),
                        ))
                    }
                };
                object.insert(key, yaml_to_tree(value)?);
            }
            J::Object(object)
        }
        Y::Tagged(tagged) => yaml_to_tree(tagged.value)?,
    })
}
