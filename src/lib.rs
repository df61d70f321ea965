pub mod config;
pub mod diff;
pub mod discover;
pub mod error;
pub mod github;
pub mod key;
pub mod lcov;
pub mod lifecycle;
pub mod model;
pub mod report;
pub mod retrieve;
pub mod store;
