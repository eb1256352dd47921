// Library exports for testing
pub mod aggregate;
pub mod config;
pub mod discord;
pub mod error;
pub mod health;
pub mod logging;
pub mod platform;
pub mod report;
pub mod scan;
pub mod scheduler;
pub mod window;
