//! HTTP surface and configuration of the docker exporter binary

pub mod api;
pub mod config;
