pub mod calibration;
pub mod cleanup;
pub mod cli;
pub mod config;
pub mod doe;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod pipeline;
pub mod report;
pub mod util;
