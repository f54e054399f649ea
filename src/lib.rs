//! Terminal monitor for DigitalOcean droplet resource utilization
//!
//! Polls the monitoring API on a fixed interval and redraws a table of CPU,
//! memory, load and root-filesystem usage for every droplet on the account.

pub mod core;
pub mod screens;
pub mod utils;
