//! Host system information

pub mod resources;
