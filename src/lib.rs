// src/lib.rs

//! Shipment status reconciliation and bulk update engine.

pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;

pub use engine::Engine;
