//! pixelrelay - server-side pixel event ingestion
//!
//! Receives storefront pixel events over HTTP, authorizes them against the
//! PixelApp's assigned domain, stores them, maintains session and daily
//! aggregates and relays eligible events to the Conversions API.
//!
//! # Architecture
//! - `api`: HTTP handlers and middleware
//! - `services`: tracking, domain guard, aggregates, token lifecycle, forwarding
//! - `storage`: SeaORM data access behind a resilient executor
//! - `cache`: TTL read cache for aggregate views
//! - `config`: Configuration management
//! - `runtime`: Application lifecycle and execution modes
//! - `system`: Logging setup

pub mod api;
pub mod cache;
pub mod cli;
pub mod config;
pub mod errors;
pub mod runtime;
pub mod services;
pub mod storage;
pub mod system;
pub mod utils;
