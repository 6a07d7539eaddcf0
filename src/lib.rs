pub mod app;
pub mod auth;
pub mod cascade;
pub mod config;
pub mod events;
pub mod github;
pub mod persist;
pub mod ui;
