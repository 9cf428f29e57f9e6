//! LaneletMapBuilder for incrementally constructing a LaneletMap.
//!
//! Primitives are added in any order; `build()` validates every
//! cross-reference, resolves derived fields, and constructs the usage
//! indexes. Ids come from the map data, not from the builder.

use crate::map::layers::{LaneletMap, UsageIndex};
use crate::map::types::*;
use fnv::{FnvHashMap, FnvHashSet};

/// Builder for constructing a LaneletMap incrementally.
#[derive(Default)]
pub struct LaneletMapBuilder {
    points: Vec<Point3d>,
    line_strings: Vec<LineString3d>,
    lanelets: Vec<Lanelet>,
    areas: Vec<Area>,
    regulatory_elements: Vec<RegulatoryElement>,
}

impl LaneletMapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_point(&mut self, point: Point3d) -> &mut Self {
        self.points.push(point);
        self
    }

    pub fn add_line_string(&mut self, line_string: LineString3d) -> &mut Self {
        self.line_strings.push(line_string);
        self
    }

    pub fn add_lanelet(&mut self, lanelet: Lanelet) -> &mut Self {
        self.lanelets.push(lanelet);
        self
    }

    pub fn add_area(&mut self, area: Area) -> &mut Self {
        self.areas.push(area);
        self
    }

    pub fn add_regulatory_element(&mut self, element: RegulatoryElement) -> &mut Self {
        self.regulatory_elements.push(element);
        self
    }

    pub fn add_traffic_light(&mut self, id: Id, lights: Vec<Id>, stop_line: Option<Id>) -> &mut Self {
        self.add_regulatory_element(RegulatoryElement::traffic_light(id, lights, stop_line))
    }

    pub fn add_traffic_sign(
        &mut self,
        id: Id,
        signs: Vec<Id>,
        sign_type: impl Into<String>,
        ref_lines: Vec<Id>,
    ) -> &mut Self {
        self.add_regulatory_element(RegulatoryElement::traffic_sign(id, signs, sign_type, ref_lines))
    }

    pub fn add_right_of_way(
        &mut self,
        id: Id,
        right_of_way: Vec<Id>,
        yields: Vec<Id>,
        stop_line: Option<Id>,
    ) -> &mut Self {
        self.add_regulatory_element(RegulatoryElement::right_of_way(id, right_of_way, yields, stop_line))
    }

    /// Validate and build the final map.
    ///
    /// Fails on duplicate ids within a layer and on any reference to a
    /// primitive that was never added. Traffic signs without an explicit
    /// sign type inherit the `subtype` attribute of their first sign
    /// linestring.
    pub fn build(mut self) -> MapResult<LaneletMap> {
        let points = into_layer(std::mem::take(&mut self.points), |p| p.id, "point")?;
        let line_strings = into_layer(
            std::mem::take(&mut self.line_strings),
            |ls| ls.id,
            "line_string",
        )?;
        let lanelets = into_layer(std::mem::take(&mut self.lanelets), |ll| ll.id, "lanelet")?;
        let areas = into_layer(std::mem::take(&mut self.areas), |a| a.id, "area")?;
        let mut regulatory_elements = into_layer(
            std::mem::take(&mut self.regulatory_elements),
            |re| re.id,
            "regulatory_element",
        )?;

        // ─── Reference validation ─────────────────────────────

        for ls in line_strings.values() {
            for &p in &ls.points {
                if !points.contains_key(&p) {
                    return Err(dangling("line_string", ls.id, "point", p));
                }
            }
        }

        for ll in lanelets.values() {
            for bound in [ll.left_bound, ll.right_bound] {
                if !line_strings.contains_key(&bound) {
                    return Err(dangling("lanelet", ll.id, "line_string", bound));
                }
            }
            for &re in &ll.regulatory_elements {
                if !regulatory_elements.contains_key(&re) {
                    return Err(dangling("lanelet", ll.id, "regulatory_element", re));
                }
            }
        }

        for area in areas.values() {
            let rings = area
                .outer_bound
                .iter()
                .chain(area.inner_bounds.iter().flatten());
            for &ls in rings {
                if !line_strings.contains_key(&ls) {
                    return Err(dangling("area", area.id, "line_string", ls));
                }
            }
            for &re in &area.regulatory_elements {
                if !regulatory_elements.contains_key(&re) {
                    return Err(dangling("area", area.id, "regulatory_element", re));
                }
            }
        }

        for re in regulatory_elements.values() {
            for ls in re.line_string_members() {
                if !line_strings.contains_key(&ls) {
                    return Err(dangling("regulatory_element", re.id, "line_string", ls));
                }
            }
            for ll in re.lanelet_members() {
                if !lanelets.contains_key(&ll) {
                    return Err(dangling("regulatory_element", re.id, "lanelet", ll));
                }
            }
            for p in re.point_members() {
                if !points.contains_key(&p) {
                    return Err(dangling("regulatory_element", re.id, "point", p));
                }
            }
            for a in re.area_members() {
                if !areas.contains_key(&a) {
                    return Err(dangling("regulatory_element", re.id, "area", a));
                }
            }
        }

        // ─── Derived fields ───────────────────────────────────

        // Traffic signs loaded without a sign type take it from the sign
        // plate linestring, which carries it as a `subtype` tag in map data.
        for re in regulatory_elements.values_mut() {
            if let Rule::TrafficSign {
                signs, sign_type, ..
            } = &mut re.rule
            {
                if sign_type.is_empty() {
                    if let Some(derived) = signs
                        .first()
                        .and_then(|s| line_strings.get(s))
                        .and_then(|ls| ls.subtype())
                    {
                        *sign_type = derived.to_string();
                    }
                }
            }
        }

        // ─── Usage indexes ────────────────────────────────────
        // Parents are visited in ascending id order so index vectors are
        // deterministic.

        let mut usage = UsageIndex::default();

        for ls in sorted_values(&line_strings) {
            let mut seen = FnvHashSet::default();
            for &p in &ls.points {
                if seen.insert(p) {
                    usage.line_strings_by_point.entry(p).or_default().push(ls.id);
                }
            }
        }

        for ll in sorted_values(&lanelets) {
            let mut seen = FnvHashSet::default();
            for bound in [ll.left_bound, ll.right_bound] {
                if seen.insert(bound) {
                    usage
                        .lanelets_by_line_string
                        .entry(bound)
                        .or_default()
                        .push(ll.id);
                }
            }
            let mut seen = FnvHashSet::default();
            for &re in &ll.regulatory_elements {
                if seen.insert(re) {
                    usage
                        .lanelets_by_regulatory_element
                        .entry(re)
                        .or_default()
                        .push(ll.id);
                }
            }
        }

        for area in sorted_values(&areas) {
            let mut seen = FnvHashSet::default();
            let rings = area
                .outer_bound
                .iter()
                .chain(area.inner_bounds.iter().flatten());
            for &ls in rings {
                if seen.insert(ls) {
                    usage.areas_by_line_string.entry(ls).or_default().push(area.id);
                }
            }
            let mut seen = FnvHashSet::default();
            for &re in &area.regulatory_elements {
                if seen.insert(re) {
                    usage
                        .areas_by_regulatory_element
                        .entry(re)
                        .or_default()
                        .push(area.id);
                }
            }
        }

        for re in sorted_values(&regulatory_elements) {
            let mut seen = FnvHashSet::default();
            for ls in re.line_string_members() {
                if seen.insert(ls) {
                    usage
                        .regulatory_elements_by_line_string
                        .entry(ls)
                        .or_default()
                        .push(re.id);
                }
            }
        }

        tracing::debug!(
            points = points.len(),
            line_strings = line_strings.len(),
            lanelets = lanelets.len(),
            areas = areas.len(),
            regulatory_elements = regulatory_elements.len(),
            "lanelet map built"
        );

        Ok(LaneletMap {
            points,
            line_strings,
            lanelets,
            areas,
            regulatory_elements,
            usage,
        })
    }
}

fn dangling(parent_layer: &'static str, parent: Id, child_layer: &'static str, child: Id) -> MapError {
    MapError::DanglingReference {
        parent_layer,
        parent,
        child_layer,
        child,
    }
}

fn into_layer<T>(
    items: Vec<T>,
    id_of: impl Fn(&T) -> Id,
    layer: &'static str,
) -> MapResult<FnvHashMap<Id, T>> {
    let mut out = FnvHashMap::with_capacity_and_hasher(items.len(), Default::default());
    for item in items {
        let id = id_of(&item);
        if out.insert(id, item).is_some() {
            return Err(MapError::DuplicateId { layer, id });
        }
    }
    Ok(out)
}

fn sorted_values<T>(layer: &FnvHashMap<Id, T>) -> Vec<&T> {
    let mut ids: Vec<Id> = layer.keys().copied().collect();
    ids.sort_unstable();
    ids.iter().map(|id| &layer[id]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_builder() -> LaneletMapBuilder {
        let mut b = LaneletMapBuilder::new();
        for id in 1..=4 {
            b.add_point(Point3d::new(id, id as f64, 0.0, 0.0));
        }
        b.add_line_string(LineString3d::new(10, vec![1, 2]));
        b.add_line_string(LineString3d::new(11, vec![3, 4]));
        b
    }

    #[test]
    fn test_build_minimal_map() {
        let mut b = base_builder();
        b.add_lanelet(Lanelet::new(100, 10, 11));
        let map = b.build().unwrap();
        assert_eq!(map.lanelet_count(), 1);
        assert_eq!(map.lanelets_using_line_string(10), &[100]);
        assert_eq!(map.lanelets_using_line_string(11), &[100]);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut b = base_builder();
        b.add_line_string(LineString3d::new(10, vec![1, 2]));
        let err = b.build().unwrap_err();
        assert!(matches!(
            err,
            MapError::DuplicateId {
                layer: "line_string",
                id: 10
            }
        ));
    }

    #[test]
    fn test_dangling_point_rejected() {
        let mut b = LaneletMapBuilder::new();
        b.add_point(Point3d::new(1, 0.0, 0.0, 0.0));
        b.add_line_string(LineString3d::new(10, vec![1, 2]));
        let err = b.build().unwrap_err();
        assert!(matches!(err, MapError::DanglingReference { child: 2, .. }));
    }

    #[test]
    fn test_dangling_regulatory_element_rejected() {
        let mut b = base_builder();
        let mut ll = Lanelet::new(100, 10, 11);
        ll.regulatory_elements.push(200);
        b.add_lanelet(ll);
        let err = b.build().unwrap_err();
        assert!(matches!(
            err,
            MapError::DanglingReference {
                parent: 100,
                child: 200,
                ..
            }
        ));
    }

    #[test]
    fn test_right_of_way_lanelet_reference_validated() {
        let mut b = base_builder();
        b.add_lanelet(Lanelet::new(100, 10, 11));
        b.add_right_of_way(200, vec![100], vec![999], None);
        let err = b.build().unwrap_err();
        assert!(matches!(err, MapError::DanglingReference { child: 999, .. }));
    }

    #[test]
    fn test_sign_type_derived_from_sign_subtype() {
        let mut b = base_builder();
        b.add_line_string(
            LineString3d::new(12, vec![1, 3]).with_attribute(ATTR_SUBTYPE, SIGN_TYPE_STOP),
        );
        b.add_traffic_sign(200, vec![12], "", vec![10]);
        let map = b.build().unwrap();
        let re = map.regulatory_element(200).unwrap();
        match &re.rule {
            Rule::TrafficSign { sign_type, .. } => assert_eq!(sign_type, SIGN_TYPE_STOP),
            _ => panic!("expected traffic sign"),
        }
    }

    #[test]
    fn test_explicit_sign_type_kept() {
        let mut b = base_builder();
        b.add_line_string(
            LineString3d::new(12, vec![1, 3]).with_attribute(ATTR_SUBTYPE, "speed_limit"),
        );
        b.add_regulatory_element(RegulatoryElement::traffic_sign(
            200,
            vec![12],
            SIGN_TYPE_STOP,
            vec![10],
        ));
        let map = b.build().unwrap();
        match &map.regulatory_element(200).unwrap().rule {
            Rule::TrafficSign { sign_type, .. } => assert_eq!(sign_type, SIGN_TYPE_STOP),
            _ => panic!("expected traffic sign"),
        }
    }

    #[test]
    fn test_usage_index_deduplicates_repeated_point() {
        let mut b = LaneletMapBuilder::new();
        b.add_point(Point3d::new(1, 0.0, 0.0, 0.0));
        b.add_point(Point3d::new(2, 1.0, 0.0, 0.0));
        // Closed ring: first point repeated at the end.
        b.add_line_string(LineString3d::new(10, vec![1, 2, 1]));
        let map = b.build().unwrap();
        assert_eq!(map.line_strings_using_point(1), &[10]);
    }

    #[test]
    fn test_regulatory_element_usage_index() {
        let mut b = base_builder();
        b.add_traffic_light(200, vec![10], Some(11));
        let mut ll = Lanelet::new(100, 10, 11);
        ll.regulatory_elements.push(200);
        b.add_lanelet(ll);
        let map = b.build().unwrap();
        assert_eq!(map.regulatory_elements_using_line_string(10), &[200]);
        assert_eq!(map.regulatory_elements_using_line_string(11), &[200]);
        assert_eq!(map.lanelets_using_regulatory_element(200), &[100]);
        assert!(map.areas_using_regulatory_element(200).is_empty());
    }
}
