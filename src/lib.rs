// Copyright 2026 Lanemap Contributors
// SPDX-License-Identifier: Apache-2.0

//! Lanemap — read-only query and traversal helpers over in-memory lanelet maps.
//!
//! A lanelet map is a layered road-network model: points form linestrings,
//! linestrings bound lanelets and areas, and regulatory elements (traffic
//! lights, signs, right-of-way rules) tie them together. This crate holds the
//! map in memory, indexes the ownership relationships once at build time, and
//! answers usage and extraction queries over them without ever mutating the
//! map.

pub mod cli;
pub mod map;
pub mod query;

pub use map::builder::LaneletMapBuilder;
pub use map::layers::LaneletMap;
pub use map::osm::{from_osm_str, load_osm};
pub use map::types::*;
pub use query::references::{find_references, PrimitiveRef, References};
