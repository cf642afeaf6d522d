//! # Hexapod Telemetry
//!
//! Ingests the serial log stream of a six-legged walking robot, extracts per-leg
//! inverse-kinematics samples and reconstructs each leg as a chain of 3D joint positions
//! (mount, coxa, femur, tibia, foot) in body coordinates.
//!
//! ## Crate Structure
//!
//! - **`parser`**: Turns one telemetry line into a [`sample::LegSample`] or a classified
//!   [`parser::ParseError`] (malformed, truncated, invalid leg index).
//! - **`data`**: The [`data::SampleBuffer`], a latest-value-per-leg store shared between
//!   the ingestion task and frame consumers, with a bounded arrival history.
//! - **`kinematics`**: Forward kinematics from calibrated joint angles and static
//!   [`geometry::LegGeometry`] to a [`kinematics::JointChain`].
//! - **`ingest`**: The [`ingest::StreamIngestor`] and its line transports (serial port,
//!   any async reader, synthetic demo gait).
//! - **`frame`**: Periodic [`frame::SkeletonFrame`] assembly for renderers.
//! - **`geometry`**: Leg indices, mount poses, link lengths, body dimensions.
//! - **`config`**: Figment-based configuration loading and validation.
//! - **`logging`**: `tracing` subscriber setup.
//! - **`demo`**: Tripod and wave gait generators.
//! - **`report`**: Console formatting of samples.
//! - **`error`**: `ConfigError` and the application-level `TelemetryError`.
//! - **`validation`**: Small checks used by configuration validation.

pub mod config;
pub mod data;
pub mod demo;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod ingest;
pub mod kinematics;
pub mod logging;
pub mod parser;
pub mod report;
pub mod sample;
pub mod validation;

pub use error::{AppResult, ConfigError, TelemetryError};
