// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Challenge-Tracker: local-first profile, points and certification engine
//! for a diet and workout challenge.
//!
//! This crate provides the session's profile store and the JSON API that
//! the UI talks to.

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use services::{GeminiClient, ProfileStore};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<ProfileStore>,
    pub recommender: GeminiClient,
}
