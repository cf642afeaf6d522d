//! Configuration files on disk: format detection, defaults, validation, env overrides.

use hexapod_telemetry::config::{CoordinateSystem, HexapodConfig, Units};
use hexapod_telemetry::geometry::LegIndex;
use hexapod_telemetry::ConfigError;
use std::fs;
use tempfile::TempDir;

const FIVE_LEG_YAML: &str = r#"
robot:
  body: { length: 0.2, width: 0.15, height: 0.05 }
  legs:
    0: { name: "Left Front", position: [0.075, 0.075, 0.0], rotation: 0.7854, link_lengths: [0.03, 0.08, 0.12], joint_angle_offsets: [0.0, 0.0, 0.0] }
    1: { name: "Left Middle", position: [0.0, 0.075, 0.0], rotation: 1.5708, link_lengths: [0.03, 0.08, 0.12], joint_angle_offsets: [0.0, 0.0, 0.0] }
    2: { name: "Left Rear", position: [-0.075, 0.075, 0.0], rotation: 2.3562, link_lengths: [0.03, 0.08, 0.12], joint_angle_offsets: [0.0, 0.0, 0.0] }
    3: { name: "Right Rear", position: [-0.075, -0.075, 0.0], rotation: -2.3562, link_lengths: [0.03, 0.08, 0.12], joint_angle_offsets: [0.0, 0.0, 0.0] }
    4: { name: "Right Middle", position: [0.0, -0.075, 0.0], rotation: -1.5708, link_lengths: [0.03, 0.08, 0.12], joint_angle_offsets: [0.0, 0.0, 0.0] }
"#;

fn write(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_default_yaml_round_trips() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config_default.yaml");

    HexapodConfig::write_default(&path).unwrap();
    let loaded = HexapodConfig::load_with_env(&path, "HEXAPOD_TEST_UNUSED_YAML_").unwrap();

    assert_eq!(loaded, HexapodConfig::default_config());
}

#[test]
fn test_default_toml_round_trips() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config_default.toml");

    HexapodConfig::write_default(&path).unwrap();
    let loaded = HexapodConfig::load_with_env(&path, "HEXAPOD_TEST_UNUSED_TOML_").unwrap();

    assert_eq!(loaded, HexapodConfig::default_config());
    let geometry = loaded.robot_geometry().unwrap();
    assert_eq!(geometry.leg(LegIndex::ALL[3]).name, "Right Front");
}

#[test]
fn test_missing_file_is_not_found() {
    let dir = TempDir::new().unwrap();
    let err = HexapodConfig::load_from(dir.path().join("absent.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::NotFound(_)));
}

#[test]
fn test_optional_sections_take_defaults() {
    let dir = TempDir::new().unwrap();
    let mut yaml = FIVE_LEG_YAML.to_string();
    yaml.push_str(
        "    5: { name: \"Right Front\", position: [0.075, -0.075, 0.0], rotation: -0.7854, \
         link_lengths: [0.08, 0.12], joint_angle_offsets: [0.0, 0.1, -0.1] }\n",
    );
    let path = write(&dir, "minimal.yml", &yaml);

    let config = HexapodConfig::load_with_env(&path, "HEXAPOD_TEST_UNUSED_MIN_").unwrap();

    assert_eq!(config.serial.port, "COM5");
    assert_eq!(config.serial.baudrate, 115_200);
    assert_eq!(config.visualization.update_rate, 60);
    assert_eq!(config.data.units, Units::Meters);
    assert_eq!(config.data.coordinate_system, CoordinateSystem::RightHand);

    let geometry = config.robot_geometry().unwrap();
    let front = geometry.leg(LegIndex::ALL[5]);
    assert_eq!(front.link_lengths.as_array(), [0.0, 0.08, 0.12]);
    assert_eq!(front.joint_angle_offsets, [0.0, 0.1, -0.1]);
}

#[test]
fn test_missing_leg_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "five_legs.yaml", FIVE_LEG_YAML);

    let err = HexapodConfig::load_with_env(&path, "HEXAPOD_TEST_UNUSED_FIVE_").unwrap_err();
    match err {
        ConfigError::MissingLegs(missing) => assert_eq!(missing, vec![5]),
        other => panic!("expected MissingLegs, got {other:?}"),
    }
}

#[test]
fn test_extra_leg_rejected() {
    let dir = TempDir::new().unwrap();
    let mut yaml = FIVE_LEG_YAML.to_string();
    yaml.push_str(
        "    6: { name: \"Tail\", position: [0.0, 0.0, 0.0], rotation: 0.0, \
         link_lengths: [0.03, 0.08, 0.12], joint_angle_offsets: [0.0, 0.0, 0.0] }\n",
    );
    let path = write(&dir, "extra.yaml", &yaml);

    let err = HexapodConfig::load_with_env(&path, "HEXAPOD_TEST_UNUSED_EXTRA_").unwrap_err();
    assert!(matches!(err, ConfigError::ExtraLegs(ref keys) if keys == &["6".to_string()]));
}

#[test]
fn test_out_of_range_value_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    let mut config = HexapodConfig::default_config();
    config.visualization.update_rate = 500;
    config.write_to(&path).unwrap();

    let err = HexapodConfig::load_with_env(&path, "HEXAPOD_TEST_UNUSED_RANGE_").unwrap_err();
    assert!(err.to_string().contains("visualization.update_rate"));
}

#[test]
fn test_malformed_toml_is_load_error() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "broken.toml", "[serial\nport = ");

    let err = HexapodConfig::load_with_env(&path, "HEXAPOD_TEST_UNUSED_BROKEN_").unwrap_err();
    assert!(matches!(err, ConfigError::Load(_)));
}

#[test]
fn test_env_overrides_file_values() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");
    HexapodConfig::write_default(&path).unwrap();

    // Prefix is unique to this test so parallel tests never observe it.
    std::env::set_var("HEXAPOD_TEST_ENV_SERIAL__PORT", "/dev/ttyACM0");
    std::env::set_var("HEXAPOD_TEST_ENV_SERIAL__BAUDRATE", "57600");
    let loaded = HexapodConfig::load_with_env(&path, "HEXAPOD_TEST_ENV_");
    std::env::remove_var("HEXAPOD_TEST_ENV_SERIAL__PORT");
    std::env::remove_var("HEXAPOD_TEST_ENV_SERIAL__BAUDRATE");

    let loaded = loaded.unwrap();
    assert_eq!(loaded.serial.port, "/dev/ttyACM0");
    assert_eq!(loaded.serial.baudrate, 57_600);
    assert_eq!(loaded.robot, HexapodConfig::default_config().robot);
}
