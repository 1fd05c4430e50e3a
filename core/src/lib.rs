//! Core library for the nosh nutrition tracker.
//!
//! Owns the nutrition document (day buckets, goals, food palette), its
//! local persistence, the TTL cache, the sync engine that reconciles the
//! document with a remote store, and the toast notification queue. The CLI
//! and server crates supply the transports.

pub mod cache;
pub mod models;
pub mod notify;
pub mod openfoodfacts;
pub mod service;
pub mod state;
pub mod storage;
pub mod sync;
