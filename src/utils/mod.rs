//! Utility modules: developer trace capture and log4rs setup.
pub mod devlog;
pub mod logger;
