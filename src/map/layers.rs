//! The `LaneletMap`: five primitive layers plus precomputed usage indexes.
//!
//! The map is read-only once built. All child→parent lookups ("which
//! lanelets use this linestring") are answered from indexes constructed by
//! [`LaneletMapBuilder`](crate::map::builder::LaneletMapBuilder), so every
//! usage query is a single hash lookup.

use crate::map::types::*;
use fnv::FnvHashMap;

/// Inverse of the stored parent→child references, deduplicated per
/// (parent, child) pair. Vectors are ordered by ascending parent id.
#[derive(Debug, Clone, Default)]
pub(crate) struct UsageIndex {
    pub line_strings_by_point: FnvHashMap<Id, Vec<Id>>,
    pub lanelets_by_line_string: FnvHashMap<Id, Vec<Id>>,
    pub areas_by_line_string: FnvHashMap<Id, Vec<Id>>,
    pub regulatory_elements_by_line_string: FnvHashMap<Id, Vec<Id>>,
    pub lanelets_by_regulatory_element: FnvHashMap<Id, Vec<Id>>,
    pub areas_by_regulatory_element: FnvHashMap<Id, Vec<Id>>,
}

/// An in-memory lanelet map.
#[derive(Debug, Clone)]
pub struct LaneletMap {
    pub(crate) points: FnvHashMap<Id, Point3d>,
    pub(crate) line_strings: FnvHashMap<Id, LineString3d>,
    pub(crate) lanelets: FnvHashMap<Id, Lanelet>,
    pub(crate) areas: FnvHashMap<Id, Area>,
    pub(crate) regulatory_elements: FnvHashMap<Id, RegulatoryElement>,
    pub(crate) usage: UsageIndex,
}

fn slice_of(index: &FnvHashMap<Id, Vec<Id>>, id: Id) -> &[Id] {
    index.get(&id).map(Vec::as_slice).unwrap_or(&[])
}

impl LaneletMap {
    // ─── Layer lookup ─────────────────────────────────────────

    pub fn point(&self, id: Id) -> Option<&Point3d> {
        self.points.get(&id)
    }

    pub fn line_string(&self, id: Id) -> Option<&LineString3d> {
        self.line_strings.get(&id)
    }

    pub fn lanelet(&self, id: Id) -> Option<&Lanelet> {
        self.lanelets.get(&id)
    }

    pub fn area(&self, id: Id) -> Option<&Area> {
        self.areas.get(&id)
    }

    pub fn regulatory_element(&self, id: Id) -> Option<&RegulatoryElement> {
        self.regulatory_elements.get(&id)
    }

    pub fn has_point(&self, id: Id) -> bool {
        self.points.contains_key(&id)
    }

    pub fn has_line_string(&self, id: Id) -> bool {
        self.line_strings.contains_key(&id)
    }

    pub fn has_lanelet(&self, id: Id) -> bool {
        self.lanelets.contains_key(&id)
    }

    pub fn has_area(&self, id: Id) -> bool {
        self.areas.contains_key(&id)
    }

    pub fn has_regulatory_element(&self, id: Id) -> bool {
        self.regulatory_elements.contains_key(&id)
    }

    // ─── Layer iteration ──────────────────────────────────────

    pub fn points(&self) -> impl Iterator<Item = &Point3d> {
        self.points.values()
    }

    pub fn line_strings(&self) -> impl Iterator<Item = &LineString3d> {
        self.line_strings.values()
    }

    pub fn lanelets(&self) -> impl Iterator<Item = &Lanelet> {
        self.lanelets.values()
    }

    pub fn areas(&self) -> impl Iterator<Item = &Area> {
        self.areas.values()
    }

    pub fn regulatory_elements(&self) -> impl Iterator<Item = &RegulatoryElement> {
        self.regulatory_elements.values()
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    pub fn line_string_count(&self) -> usize {
        self.line_strings.len()
    }

    pub fn lanelet_count(&self) -> usize {
        self.lanelets.len()
    }

    pub fn area_count(&self) -> usize {
        self.areas.len()
    }

    pub fn regulatory_element_count(&self) -> usize {
        self.regulatory_elements.len()
    }

    /// True when no layer holds any primitive.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
            && self.line_strings.is_empty()
            && self.lanelets.is_empty()
            && self.areas.is_empty()
            && self.regulatory_elements.is_empty()
    }

    // ─── Usage lookup ─────────────────────────────────────────

    /// Linestrings whose point list contains `point`.
    pub fn line_strings_using_point(&self, point: Id) -> &[Id] {
        slice_of(&self.usage.line_strings_by_point, point)
    }

    /// Lanelets whose left or right bound is `line_string`.
    pub fn lanelets_using_line_string(&self, line_string: Id) -> &[Id] {
        slice_of(&self.usage.lanelets_by_line_string, line_string)
    }

    /// Areas whose outer or inner rings contain `line_string`.
    pub fn areas_using_line_string(&self, line_string: Id) -> &[Id] {
        slice_of(&self.usage.areas_by_line_string, line_string)
    }

    /// Regulatory elements any of whose roles reference `line_string`.
    pub fn regulatory_elements_using_line_string(&self, line_string: Id) -> &[Id] {
        slice_of(&self.usage.regulatory_elements_by_line_string, line_string)
    }

    /// Lanelets governed by `regulatory_element`.
    pub fn lanelets_using_regulatory_element(&self, regulatory_element: Id) -> &[Id] {
        slice_of(&self.usage.lanelets_by_regulatory_element, regulatory_element)
    }

    /// Areas governed by `regulatory_element`.
    pub fn areas_using_regulatory_element(&self, regulatory_element: Id) -> &[Id] {
        slice_of(&self.usage.areas_by_regulatory_element, regulatory_element)
    }
}
