pub mod activity;
pub mod config;
pub mod import;
pub mod pages;
pub mod rss;
pub mod server;
