//! Usage search: which higher-level elements reference a primitive.
//!
//! [`find_references`] descends from the queried primitive to its
//! constituent parts (a lanelet to its bounds, a bound to its points), then
//! climbs from every part through the map's usage indexes, collecting the
//! top-level primitives reached. Lanelets and areas are always recorded;
//! linestrings and regulatory elements are recorded only when nothing owns
//! them, since on their own they are not meaningful map objects.
//!
//! Both directions carry visited sets, so shared sub-primitives are walked
//! once and the rule/lanelet reference cycles formed by right-of-way rules
//! cannot recurse forever.

use crate::map::layers::LaneletMap;
use crate::map::types::*;
use fnv::FnvHashSet;
use serde::{Deserialize, Serialize};

/// A primitive named by layer and id, the argument of [`find_references`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "layer", content = "id", rename_all = "snake_case")]
pub enum PrimitiveRef {
    Point(Id),
    LineString(Id),
    Lanelet(Id),
    Area(Id),
    RegulatoryElement(Id),
}

/// Referencing primitives found by [`find_references`], one deduplicated id
/// set per layer. Points never appear: nothing is "just a point" at the top
/// of the ownership graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct References {
    pub line_strings: FnvHashSet<Id>,
    pub lanelets: FnvHashSet<Id>,
    pub areas: FnvHashSet<Id>,
    pub regulatory_elements: FnvHashSet<Id>,
}

impl References {
    pub fn is_empty(&self) -> bool {
        self.line_strings.is_empty()
            && self.lanelets.is_empty()
            && self.areas.is_empty()
            && self.regulatory_elements.is_empty()
    }

    /// Total number of referencing primitives across all layers.
    pub fn total(&self) -> usize {
        self.line_strings.len()
            + self.lanelets.len()
            + self.areas.len()
            + self.regulatory_elements.len()
    }
}

/// Find all primitives that reference the given primitive (or any of its
/// constituent parts) in `map`.
///
/// Returns `MapError::MissingPrimitive` when the id is not present in the
/// named layer.
pub fn find_references(map: &LaneletMap, primitive: PrimitiveRef) -> MapResult<References> {
    let mut walker = Walker::new(map);

    match primitive {
        PrimitiveRef::Point(id) => {
            require(map.has_point(id), "point", id)?;
            walker.climb_point(id);
        }
        PrimitiveRef::LineString(id) => {
            require(map.has_line_string(id), "line_string", id)?;
            walker.descend_line_string(id);
        }
        PrimitiveRef::Lanelet(id) => {
            require(map.has_lanelet(id), "lanelet", id)?;
            walker.descend_lanelet(id);
        }
        PrimitiveRef::Area(id) => {
            require(map.has_area(id), "area", id)?;
            walker.descend_area(id);
        }
        PrimitiveRef::RegulatoryElement(id) => {
            require(map.has_regulatory_element(id), "regulatory_element", id)?;
            walker.descend_regulatory_element(id);
        }
    }

    Ok(walker.refs)
}

fn require(exists: bool, layer: &'static str, id: Id) -> MapResult<()> {
    if exists {
        Ok(())
    } else {
        Err(MapError::MissingPrimitive { layer, id })
    }
}

// ─── Traversal state ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Layer {
    Point,
    LineString,
    Lanelet,
    Area,
    RegulatoryElement,
}

struct Walker<'a> {
    map: &'a LaneletMap,
    refs: References,
    seen_up: FnvHashSet<(Layer, Id)>,
    seen_down: FnvHashSet<(Layer, Id)>,
}

impl<'a> Walker<'a> {
    fn new(map: &'a LaneletMap) -> Self {
        Self {
            map,
            refs: References::default(),
            seen_up: FnvHashSet::default(),
            seen_down: FnvHashSet::default(),
        }
    }

    // ─── Climbing (child → parent) ────────────────────────────

    fn climb_point(&mut self, id: Id) {
        if !self.seen_up.insert((Layer::Point, id)) {
            return;
        }
        // An unowned point is not a meaningful object on its own; nothing
        // gets recorded for it.
        for &ls in self.map.line_strings_using_point(id) {
            self.climb_line_string(ls);
        }
    }

    fn climb_line_string(&mut self, id: Id) {
        if !self.seen_up.insert((Layer::LineString, id)) {
            return;
        }

        let lanelets = self.map.lanelets_using_line_string(id);
        let areas = self.map.areas_using_line_string(id);
        let rules = self.map.regulatory_elements_using_line_string(id);
        let owned = !lanelets.is_empty() || !areas.is_empty() || !rules.is_empty();

        for &ll in lanelets {
            self.climb_lanelet(ll);
        }
        for &area in areas {
            self.climb_area(area);
        }
        for &re in rules {
            self.climb_regulatory_element(re);
        }

        if !owned && self.map.has_line_string(id) {
            self.refs.line_strings.insert(id);
        }
    }

    fn climb_lanelet(&mut self, id: Id) {
        if !self.seen_up.insert((Layer::Lanelet, id)) {
            return;
        }
        // Nothing owns a lanelet; record it.
        if self.map.has_lanelet(id) {
            self.refs.lanelets.insert(id);
        }
    }

    fn climb_area(&mut self, id: Id) {
        if !self.seen_up.insert((Layer::Area, id)) {
            return;
        }
        if self.map.has_area(id) {
            self.refs.areas.insert(id);
        }
    }

    fn climb_regulatory_element(&mut self, id: Id) {
        if !self.seen_up.insert((Layer::RegulatoryElement, id)) {
            return;
        }

        let lanelets = self.map.lanelets_using_regulatory_element(id);
        let areas = self.map.areas_using_regulatory_element(id);
        let owned = !lanelets.is_empty() || !areas.is_empty();

        for &ll in lanelets {
            self.climb_lanelet(ll);
        }
        for &area in areas {
            self.climb_area(area);
        }

        if !owned && self.map.has_regulatory_element(id) {
            self.refs.regulatory_elements.insert(id);
        }
    }

    // ─── Descending (parent → child) ──────────────────────────

    fn descend_line_string(&mut self, id: Id) {
        if !self.seen_down.insert((Layer::LineString, id)) {
            return;
        }
        let Some(ls) = self.map.line_string(id) else {
            return;
        };
        let points = ls.points.clone();
        for p in points {
            self.climb_point(p);
        }
    }

    fn descend_lanelet(&mut self, id: Id) {
        if !self.seen_down.insert((Layer::Lanelet, id)) {
            return;
        }
        let Some(ll) = self.map.lanelet(id) else {
            return;
        };
        let (left, right) = (ll.left_bound, ll.right_bound);
        let rules = ll.regulatory_elements.clone();
        self.descend_line_string(left);
        self.descend_line_string(right);
        for re in rules {
            self.descend_regulatory_element(re);
        }
    }

    fn descend_area(&mut self, id: Id) {
        if !self.seen_down.insert((Layer::Area, id)) {
            return;
        }
        let Some(area) = self.map.area(id) else {
            return;
        };
        let mut rings = area.outer_bound.clone();
        rings.extend(area.inner_bounds.iter().flatten());
        let rules = area.regulatory_elements.clone();
        for ls in rings {
            self.descend_line_string(ls);
        }
        for re in rules {
            self.descend_regulatory_element(re);
        }
    }

    fn descend_regulatory_element(&mut self, id: Id) {
        if !self.seen_down.insert((Layer::RegulatoryElement, id)) {
            return;
        }
        let Some(re) = self.map.regulatory_element(id) else {
            return;
        };
        let line_strings = re.line_string_members();
        let lanelets = re.lanelet_members();
        let points = re.point_members();
        let areas = re.area_members();

        for ls in line_strings {
            self.descend_line_string(ls);
        }
        for ll in lanelets {
            self.descend_lanelet(ll);
        }
        for p in points {
            self.climb_point(p);
        }
        for area in areas {
            self.descend_area(area);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::builder::LaneletMapBuilder;

    /// Two lanelets sharing a bound, a traffic light attached to the first
    /// lanelet, plus an orphan linestring off to the side.
    fn shared_bound_map() -> LaneletMap {
        let mut b = LaneletMapBuilder::new();
        for id in 1..=10 {
            b.add_point(Point3d::new(id, id as f64, 0.0, 0.0));
        }
        b.add_line_string(LineString3d::new(20, vec![1, 2]));
        b.add_line_string(LineString3d::new(21, vec![3, 4])); // shared bound
        b.add_line_string(LineString3d::new(22, vec![5, 6]));
        b.add_line_string(LineString3d::new(23, vec![7, 8])); // light bar
        b.add_line_string(LineString3d::new(24, vec![9, 10])); // orphan

        b.add_regulatory_element(RegulatoryElement::traffic_light(200, vec![23], None));

        let mut left = Lanelet::new(100, 20, 21);
        left.regulatory_elements.push(200);
        b.add_lanelet(left);
        b.add_lanelet(Lanelet::new(101, 21, 22));
        b.build().unwrap()
    }

    #[test]
    fn test_point_on_shared_bound_reaches_both_lanelets() {
        let map = shared_bound_map();
        let refs = find_references(&map, PrimitiveRef::Point(3)).unwrap();
        assert!(refs.lanelets.contains(&100));
        assert!(refs.lanelets.contains(&101));
        assert_eq!(refs.lanelets.len(), 2);
        assert!(refs.line_strings.is_empty());
        assert!(refs.areas.is_empty());
    }

    #[test]
    fn test_point_on_private_bound_reaches_one_lanelet() {
        let map = shared_bound_map();
        let refs = find_references(&map, PrimitiveRef::Point(1)).unwrap();
        assert_eq!(refs.lanelets.len(), 1);
        assert!(refs.lanelets.contains(&100));
    }

    #[test]
    fn test_orphan_line_string_records_itself() {
        let map = shared_bound_map();
        let refs = find_references(&map, PrimitiveRef::Point(9)).unwrap();
        assert_eq!(refs.line_strings.len(), 1);
        assert!(refs.line_strings.contains(&24));
        assert!(refs.lanelets.is_empty());
    }

    #[test]
    fn test_owned_rule_resolves_to_owning_lanelet() {
        // The light bar's points climb through the rule to lanelet 100; the
        // rule itself is owned, so it is not recorded.
        let map = shared_bound_map();
        let refs = find_references(&map, PrimitiveRef::Point(7)).unwrap();
        assert!(refs.lanelets.contains(&100));
        assert!(refs.regulatory_elements.is_empty());
    }

    #[test]
    fn test_unowned_rule_records_itself() {
        let mut b = LaneletMapBuilder::new();
        b.add_point(Point3d::new(1, 0.0, 0.0, 0.0));
        b.add_point(Point3d::new(2, 1.0, 0.0, 0.0));
        b.add_line_string(LineString3d::new(20, vec![1, 2]));
        b.add_regulatory_element(RegulatoryElement::traffic_light(200, vec![20], None));
        let map = b.build().unwrap();

        let refs = find_references(&map, PrimitiveRef::Point(1)).unwrap();
        assert!(refs.regulatory_elements.contains(&200));
        assert!(refs.line_strings.is_empty(), "owned linestring must not self-record");
    }

    #[test]
    fn test_lanelet_closure_includes_neighbors() {
        // Descending lanelet 101's bounds and climbing back up reaches
        // lanelet 100 through the shared bound.
        let map = shared_bound_map();
        let refs = find_references(&map, PrimitiveRef::Lanelet(101)).unwrap();
        assert!(refs.lanelets.contains(&100));
        assert!(refs.lanelets.contains(&101));
    }

    #[test]
    fn test_area_closure() {
        let mut b = LaneletMapBuilder::new();
        for id in 1..=4 {
            b.add_point(Point3d::new(id, id as f64, 0.0, 0.0));
        }
        b.add_line_string(LineString3d::new(20, vec![1, 2]));
        b.add_line_string(LineString3d::new(21, vec![3, 4]));
        b.add_area(Area::new(300, vec![20, 21]));
        b.add_lanelet(Lanelet::new(100, 20, 21));
        let map = b.build().unwrap();

        let refs = find_references(&map, PrimitiveRef::Area(300)).unwrap();
        assert!(refs.areas.contains(&300));
        assert!(refs.lanelets.contains(&100));
    }

    #[test]
    fn test_right_of_way_cycle_terminates() {
        // Rule 202 references lanelet 100 and lanelet 100 references rule
        // 202; the visited sets must break the loop.
        let mut b = LaneletMapBuilder::new();
        for id in 1..=4 {
            b.add_point(Point3d::new(id, id as f64, 0.0, 0.0));
        }
        b.add_line_string(LineString3d::new(20, vec![1, 2]));
        b.add_line_string(LineString3d::new(21, vec![3, 4]));
        let mut ll = Lanelet::new(100, 20, 21);
        ll.regulatory_elements.push(202);
        b.add_lanelet(ll);
        b.add_regulatory_element(RegulatoryElement::right_of_way(202, vec![100], vec![], None));
        let map = b.build().unwrap();

        let refs = find_references(&map, PrimitiveRef::Lanelet(100)).unwrap();
        assert!(refs.lanelets.contains(&100));

        let refs = find_references(&map, PrimitiveRef::RegulatoryElement(202)).unwrap();
        assert!(refs.lanelets.contains(&100));
    }

    #[test]
    fn test_missing_primitive_is_an_error() {
        let map = shared_bound_map();
        let err = find_references(&map, PrimitiveRef::Point(999)).unwrap_err();
        assert!(matches!(
            err,
            MapError::MissingPrimitive {
                layer: "point",
                id: 999
            }
        ));
    }

    #[test]
    fn test_references_accounting() {
        let map = shared_bound_map();
        let refs = find_references(&map, PrimitiveRef::Point(3)).unwrap();
        assert!(!refs.is_empty());
        assert_eq!(refs.total(), 2);
    }
}
