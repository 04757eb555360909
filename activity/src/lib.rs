pub mod api;
pub mod config;
pub mod coordinator;
pub mod dashboard;
pub mod endpoints;
pub mod event;
pub mod feed;
pub mod normalizer;
pub mod poller;
pub mod prometheus;
pub mod router;
pub mod server;
pub mod store;
pub mod time;
