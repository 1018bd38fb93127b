pub mod bot;
pub mod commands;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod platform;
pub mod store;
pub mod webhook;
