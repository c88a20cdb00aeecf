pub mod config;
pub mod consumer;
pub mod document;
pub mod error;
pub mod handler;
pub mod healthcheck;
pub mod identifier;
pub mod kafka;
pub mod mapper;
pub mod message;
pub mod metrics;
pub mod model;
pub mod router;
pub mod sink;
pub mod time;
pub mod transcript;
