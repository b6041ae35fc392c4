pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod media;
pub mod metrics;
pub mod plugin;
pub mod relay;
pub mod stdio;
pub mod transport;

#[cfg(test)]
pub mod test_utils;
