// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain model
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Project model, classification, backend and loader ports, errors

pub mod backend;
pub mod classification;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod project;
pub mod topology;
