pub mod banner;
pub mod config;
pub mod consts;
pub mod engine;
pub mod error;
pub mod extract;
pub mod history;
pub mod model;
pub mod pacing;
pub mod platform;
pub mod report;
pub mod scan;
pub mod stats;
pub mod text;
