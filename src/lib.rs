//! Filmbot appliance control plane
//!
//! Compiles recording schedules into systemd timer/service pairs and keeps
//! them in sync, and samples appliance health to decide when to e-mail an
//! operator.

pub mod alert;
pub mod cli;
pub mod config;
pub mod health;
pub mod host;
pub mod schedule;
