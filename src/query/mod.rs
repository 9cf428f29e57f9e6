//! Read-only queries over a [`LaneletMap`].
//!
//! Everything here is a free function taking `&LaneletMap`; nothing mutates
//! the map. Functions that take a lanelet slice compose: filter with
//! [`subtype_lanelets`] first, then extract regulatory elements or stop
//! lines from the survivors.

pub mod references;

pub use references::{find_references, PrimitiveRef, References};

use crate::map::layers::LaneletMap;
use crate::map::types::*;
use fnv::FnvHashSet;

/// All lanelets in the map, ordered by ascending id.
pub fn all_lanelets(map: &LaneletMap) -> Vec<&Lanelet> {
    if map.lanelet_count() == 0 {
        tracing::warn!("lanelet map contains no lanelets");
    }
    let mut out: Vec<&Lanelet> = map.lanelets().collect();
    out.sort_by_key(|ll| ll.id);
    out
}

/// Lanelets whose `subtype` attribute equals `subtype`.
pub fn subtype_lanelets<'a>(lanelets: &[&'a Lanelet], subtype: &str) -> Vec<&'a Lanelet> {
    lanelets
        .iter()
        .filter(|ll| ll.subtype() == Some(subtype))
        .copied()
        .collect()
}

/// Lanelets tagged as roads.
pub fn road_lanelets<'a>(lanelets: &[&'a Lanelet]) -> Vec<&'a Lanelet> {
    subtype_lanelets(lanelets, SUBTYPE_ROAD)
}

/// Lanelets tagged as crosswalks.
pub fn crosswalk_lanelets<'a>(lanelets: &[&'a Lanelet]) -> Vec<&'a Lanelet> {
    subtype_lanelets(lanelets, SUBTYPE_CROSSWALK)
}

/// The regulatory elements governing `lanelet`, in the lanelet's own order.
/// Ids that do not resolve are skipped (a built map never has any).
pub fn regulatory_elements_of<'a>(map: &'a LaneletMap, lanelet: &Lanelet) -> Vec<&'a RegulatoryElement> {
    lanelet
        .regulatory_elements
        .iter()
        .filter_map(|&id| map.regulatory_element(id))
        .collect()
}

/// Traffic-light rules referenced by the given lanelets, deduplicated by id.
/// First-seen order is preserved, so a light shared by several lanelets
/// appears once, at the position of the first lanelet referencing it.
pub fn traffic_lights<'a>(map: &'a LaneletMap, lanelets: &[&Lanelet]) -> Vec<&'a RegulatoryElement> {
    unique_rules(map, lanelets, |re| re.is_traffic_light())
}

/// Traffic-light rules that carry individual bulb linestrings.
pub fn traffic_lights_with_bulbs<'a>(
    map: &'a LaneletMap,
    lanelets: &[&Lanelet],
) -> Vec<&'a RegulatoryElement> {
    unique_rules(map, lanelets, |re| {
        matches!(&re.rule, Rule::TrafficLight { light_bulbs, .. } if !light_bulbs.is_empty())
    })
}

fn unique_rules<'a>(
    map: &'a LaneletMap,
    lanelets: &[&Lanelet],
    keep: impl Fn(&RegulatoryElement) -> bool,
) -> Vec<&'a RegulatoryElement> {
    let mut seen: FnvHashSet<Id> = FnvHashSet::default();
    let mut out = Vec::new();
    for ll in lanelets {
        for re in regulatory_elements_of(map, ll) {
            if keep(re) && seen.insert(re.id) {
                out.push(re);
            }
        }
    }
    out
}

/// Stop lines that apply to a single lanelet.
///
/// Three sources, in fixed order: right-of-way rules under which this
/// lanelet must yield, traffic lights, and traffic signs. Signs contribute
/// only their first reference line.
pub fn stop_lines_for_lanelet<'a>(map: &'a LaneletMap, lanelet: &Lanelet) -> Vec<&'a LineString3d> {
    let rules = regulatory_elements_of(map, lanelet);
    let mut out = Vec::new();

    for re in &rules {
        if re.is_right_of_way() && re.maneuver(lanelet.id) == Maneuver::Yield {
            if let Some(ls) = re.stop_line().and_then(|id| map.line_string(id)) {
                out.push(ls);
            }
        }
    }

    for re in &rules {
        if re.is_traffic_light() {
            if let Some(ls) = re.stop_line().and_then(|id| map.line_string(id)) {
                out.push(ls);
            }
        }
    }

    for re in &rules {
        if let Rule::TrafficSign { ref_lines, .. } = &re.rule {
            if let Some(ls) = ref_lines.first().and_then(|&id| map.line_string(id)) {
                out.push(ls);
            }
        }
    }

    out
}

/// Stop lines for every lanelet in the slice, concatenated in input order.
/// Not deduplicated: a stop line shared by two lanelets appears twice.
pub fn stop_lines_for_lanelets<'a>(
    map: &'a LaneletMap,
    lanelets: &[&Lanelet],
) -> Vec<&'a LineString3d> {
    lanelets
        .iter()
        .flat_map(|ll| stop_lines_for_lanelet(map, ll))
        .collect()
}

/// Stop lines belonging to traffic signs of the given type (e.g.
/// [`SIGN_TYPE_STOP`]), deduplicated by stop-line id across all input
/// lanelets. Only each sign's first reference line counts.
pub fn stop_sign_stop_lines<'a>(
    map: &'a LaneletMap,
    lanelets: &[&Lanelet],
    sign_type: &str,
) -> Vec<&'a LineString3d> {
    let mut seen: FnvHashSet<Id> = FnvHashSet::default();
    let mut out = Vec::new();

    for ll in lanelets {
        for re in regulatory_elements_of(map, ll) {
            let Rule::TrafficSign {
                sign_type: st,
                ref_lines,
                ..
            } = &re.rule
            else {
                continue;
            };
            if st != sign_type {
                continue;
            }
            if let Some(ls) = ref_lines.first().and_then(|&id| map.line_string(id)) {
                if seen.insert(ls.id) {
                    out.push(ls);
                }
            }
        }
    }

    out
}
