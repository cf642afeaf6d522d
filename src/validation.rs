//! Small reusable checks for configuration values.
use std::ops::RangeInclusive;

/// Baud rates the robot's USB-UART bridge can be configured for.
pub const STANDARD_BAUD_RATES: [u32; 8] = [9600, 19200, 38400, 57600, 115200, 230400, 460800, 921600];

/// Validates that a baud rate is one of [`STANDARD_BAUD_RATES`].
///
/// # Arguments
///
/// * `baud` - The baud rate to validate.
///
/// # Returns
///
/// * `Ok(())` if the baud rate is supported.
/// * `Err(&'static str)` otherwise.
pub fn is_standard_baud_rate(baud: u32) -> Result<(), &'static str> {
    if STANDARD_BAUD_RATES.contains(&baud) {
        Ok(())
    } else {
        Err("Baudrate must be one of: 9600, 19200, 38400, 57600, 115200, 230400, 460800, 921600")
    }
}

/// Validates that a float is neither NaN nor infinite.
pub fn is_finite(value: f64) -> Result<(), &'static str> {
    if value.is_finite() {
        Ok(())
    } else {
        Err("Value must be a finite number")
    }
}

/// Validates that a float is finite and strictly greater than zero.
pub fn is_positive(value: f64) -> Result<(), &'static str> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err("Value must be positive and finite")
    }
}

/// Validates that a float is finite and greater than or equal to zero.
pub fn is_non_negative(value: f64) -> Result<(), &'static str> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err("Value must be non-negative and finite")
    }
}

/// Validates if a given value is within a specified numeric range.
///
/// # Arguments
///
/// * `value` - The value to validate.
/// * `range` - The inclusive range to validate against.
///
/// # Returns
///
/// * `Ok(())` if the value is within the range.
/// * `Err(&'static str)` if the value is outside the range.
pub fn is_in_range<T: PartialOrd>(value: T, range: RangeInclusive<T>) -> Result<(), &'static str> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err("Value is outside the specified range")
    }
}

/// Validates if a given string is not empty.
pub fn is_not_empty(value: &str) -> Result<(), &'static str> {
    if !value.trim().is_empty() {
        Ok(())
    } else {
        Err("Value cannot be empty")
    }
}

/// Validates an RGB triple given as a slice of integers in 0..=255.
pub fn is_rgb(rgb: &[i64]) -> Result<(), &'static str> {
    if rgb.len() != 3 {
        return Err("Color must have 3 RGB values");
    }
    if rgb.iter().all(|c| (0..=255).contains(c)) {
        Ok(())
    } else {
        Err("Color RGB values must be 0-255")
    }
}
