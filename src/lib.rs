// src/lib.rs

//! listwatch: listing-page watcher, Telegram notifier and channel summarizer

pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
