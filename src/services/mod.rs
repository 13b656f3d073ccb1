// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod clock;
pub mod credential;
pub mod outbox;
pub mod recommend;
pub mod store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use outbox::{RemoteOp, RetryPolicy};
pub use recommend::GeminiClient;
pub use store::{ProfileStore, ResetOutcome, StoreSettings, SyncReport};
