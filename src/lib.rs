//! sumo-source - declarative Sumo Logic collector source management
//!
//! This crate reconciles the sources registered on a Sumo Logic collector
//! against source tasks declared in configuration files, using the Sumo Logic
//! REST API.

pub mod apply;
pub mod config;
pub mod sumologic;
