//! CLI module for roadsafe.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use crate::sensor::SensorReadings;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// RoadSafe - guideline-grounded road-safety recommendations
///
/// Maps road-condition queries and sensor readings to recommendations that cite
/// IRC / MoRTH road-safety guidelines.
#[derive(Parser, Debug)]
#[command(name = "roadsafe")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the guideline index from a spreadsheet (xlsx, xls, ods, csv, tsv)
    Index {
        /// Guideline table; the first row is the header
        input: PathBuf,
    },

    /// Analyze one query and/or sensor block and print the recommendation
    Ask {
        /// Road safety query
        query: Option<String>,

        /// Sensor data block, one "Label: value" per line
        #[arg(short, long, conflicts_with = "sensor_file")]
        sensor: Option<String>,

        /// Read the sensor data block from a file
        #[arg(long)]
        sensor_file: Option<PathBuf>,

        #[command(flatten)]
        readings: SensorArgs,

        /// Export the exchange to this file
        #[arg(short, long)]
        export: Option<PathBuf>,

        /// Export format (pdf, json, text); guessed from the file extension if omitted
        #[arg(long, requires = "export")]
        format: Option<String>,
    },

    /// Start an interactive chat session
    Chat,

    /// Start HTTP API server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Show information about the built index
    Info,

    /// Check configuration, credentials and the index
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Structured sensor readings given as flags.
#[derive(Args, Debug, Clone, Default)]
pub struct SensorArgs {
    /// IR sensor distance in meters
    #[arg(long)]
    pub distance: Option<f64>,

    /// Temperature in °C
    #[arg(long)]
    pub temperature: Option<f64>,

    /// Relative humidity in %
    #[arg(long)]
    pub humidity: Option<f64>,

    /// PIR motion sensor (0 or 1)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=1))]
    pub motion: Option<u8>,

    /// MQ135 air quality in ppm
    #[arg(long)]
    pub ppm: Option<f64>,

    /// Gyroscope angle difference in degrees
    #[arg(long, allow_negative_numbers = true)]
    pub gyro_angle_diff: Option<f64>,
}

impl SensorArgs {
    pub fn to_readings(&self) -> SensorReadings {
        SensorReadings {
            distance_m: self.distance,
            temperature_c: self.temperature,
            humidity_pct: self.humidity,
            motion: self.motion.map(|m| m == 1),
            ppm: self.ppm,
            gyro_angle_diff: self.gyro_angle_diff,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}
