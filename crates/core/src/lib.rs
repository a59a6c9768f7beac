//! Core business logic for the classifieds backend.
//!
//! Moderation, ranking and upsell rules live here as plain functions over
//! entity models; the services wrap them with persistence and side effects.

pub mod services;

pub use services::*;
