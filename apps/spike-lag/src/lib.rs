pub mod cli;
pub mod config;
pub mod error;
pub mod report;
pub mod series;
pub mod services;
pub mod time;
