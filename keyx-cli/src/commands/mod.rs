//! CLI Commands

pub mod exchange;
pub mod keys;
pub mod params;
