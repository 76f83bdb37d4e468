//! Scrivo: a blogging backend with bearer-token accounts, tagged posts,
//! threaded comments, search and site statistics.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
