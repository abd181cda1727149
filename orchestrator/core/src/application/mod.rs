// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Application services
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Orchestrate lifecycle requests and interactive sessions

pub mod orchestrator;
pub mod session_bridge;

pub use orchestrator::LifecycleOrchestrator;
pub use session_bridge::SessionBridge;
