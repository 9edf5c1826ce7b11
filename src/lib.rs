// Library exports for testing

pub mod artifacts;
pub mod cli;
pub mod config;
pub mod factory;
pub mod network;
