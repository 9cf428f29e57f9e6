//! In-memory lanelet map: primitive types, layers, builder, and OSM loading.

pub mod builder;
pub mod layers;
pub mod osm;
pub mod types;
