// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod compose_loader;
pub mod docker_backend;
pub mod docker_endpoint;
pub mod in_memory_backend;
pub mod topology_source;

pub use compose_loader::ComposeTopologyLoader;
pub use docker_backend::DockerBackend;
pub use in_memory_backend::{BackendCall, InMemoryBackend};
pub use topology_source::{download_topology, fetch_topology, TopologySource, TopologySourceError};
