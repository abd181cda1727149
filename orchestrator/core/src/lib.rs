// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Service lifecycle orchestration core
//!
//! Loads a compose-like topology into an immutable [`domain::project::Project`],
//! classifies its services, and drives bring-up, bring-down and interactive
//! sessions against a pluggable container backend.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Domain model, application services, backend adapters

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
