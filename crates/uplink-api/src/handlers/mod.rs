//! HTTP handlers

pub mod files;
pub mod uploads;
