//! Load lanelet maps from OSM XML.
//!
//! Lanelet map data ships as plain OSM: `<node>` elements become points,
//! `<way>` elements become linestrings, and `<relation>` elements become
//! lanelets, areas (multipolygons), or regulatory elements depending on
//! their `type` tag. Parsing is a single streaming pass that collects raw
//! elements; resolution into typed primitives happens afterwards, so element
//! order in the file does not matter.

use crate::map::builder::LaneletMapBuilder;
use crate::map::layers::LaneletMap;
use crate::map::types::*;
use fnv::FnvHashMap;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::path::Path;

// ─── Raw OSM elements ─────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct RawNode {
    id: Id,
    lat: f64,
    lon: f64,
    tags: FnvHashMap<String, String>,
}

#[derive(Debug, Default)]
struct RawWay {
    id: Id,
    refs: Vec<Id>,
    tags: FnvHashMap<String, String>,
}

#[derive(Debug)]
struct RawMember {
    kind: String,
    role: String,
    ref_id: Id,
}

#[derive(Debug, Default)]
struct RawRelation {
    id: Id,
    members: Vec<RawMember>,
    tags: FnvHashMap<String, String>,
}

#[derive(Debug, Default)]
struct RawOsm {
    nodes: Vec<RawNode>,
    ways: Vec<RawWay>,
    relations: Vec<RawRelation>,
}

/// Which raw element is currently open in the stream.
enum Open {
    None,
    Node(RawNode),
    Way(RawWay),
    Relation(RawRelation),
}

// ─── Public entry points ──────────────────────────────────────────────────────

/// Load a lanelet map from an OSM file on disk.
pub fn load_osm(path: impl AsRef<Path>) -> MapResult<LaneletMap> {
    let xml = std::fs::read_to_string(path)?;
    from_osm_str(&xml)
}

/// Parse a lanelet map from an OSM XML string.
pub fn from_osm_str(xml: &str) -> MapResult<LaneletMap> {
    let raw = parse_raw(xml)?;
    tracing::debug!(
        nodes = raw.nodes.len(),
        ways = raw.ways.len(),
        relations = raw.relations.len(),
        "parsed OSM elements"
    );
    resolve(raw)
}

// ─── Streaming XML pass ───────────────────────────────────────────────────────

fn xml_attrs(e: &BytesStart) -> FnvHashMap<String, String> {
    let mut out = FnvHashMap::default();
    for attr in e.attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = String::from_utf8_lossy(&attr.value).to_string();
        out.insert(key, value);
    }
    out
}

fn parse_raw(xml: &str) -> MapResult<RawOsm> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut raw = RawOsm::default();
    let mut open = Open::None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                handle_open(&mut raw, &mut open, &name, &e, false);
            }
            Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                handle_open(&mut raw, &mut open, &name, &e, true);
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                match name.as_str() {
                    "node" | "way" | "relation" => close_element(&mut raw, &mut open),
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(MapError::Xml(e)),
            _ => {}
        }
    }

    // A map truncated mid-element still yields what was fully closed.
    Ok(raw)
}

/// Dispatch one opening (or self-closing) element into the raw collection.
fn handle_open(raw: &mut RawOsm, open: &mut Open, name: &str, e: &BytesStart, self_closing: bool) {
    let attrs = xml_attrs(e);
    match name {
        "node" => {
            // Elements missing an id are skipped; the file is map data, not
            // something we can repair.
            if let Some(id) = attrs.get("id").and_then(|v| v.parse::<Id>().ok()) {
                let node = RawNode {
                    id,
                    lat: attrs.get("lat").and_then(|v| v.parse().ok()).unwrap_or(0.0),
                    lon: attrs.get("lon").and_then(|v| v.parse().ok()).unwrap_or(0.0),
                    tags: FnvHashMap::default(),
                };
                if self_closing {
                    raw.nodes.push(node);
                } else {
                    *open = Open::Node(node);
                }
            }
        }
        "way" => {
            if let Some(id) = attrs.get("id").and_then(|v| v.parse::<Id>().ok()) {
                let way = RawWay {
                    id,
                    refs: Vec::new(),
                    tags: FnvHashMap::default(),
                };
                if self_closing {
                    raw.ways.push(way);
                } else {
                    *open = Open::Way(way);
                }
            }
        }
        "relation" => {
            if let Some(id) = attrs.get("id").and_then(|v| v.parse::<Id>().ok()) {
                let relation = RawRelation {
                    id,
                    members: Vec::new(),
                    tags: FnvHashMap::default(),
                };
                if self_closing {
                    raw.relations.push(relation);
                } else {
                    *open = Open::Relation(relation);
                }
            }
        }
        "tag" => {
            if let (Some(k), Some(v)) = (attrs.get("k"), attrs.get("v")) {
                match open {
                    Open::Node(n) => {
                        n.tags.insert(k.clone(), v.clone());
                    }
                    Open::Way(w) => {
                        w.tags.insert(k.clone(), v.clone());
                    }
                    Open::Relation(r) => {
                        r.tags.insert(k.clone(), v.clone());
                    }
                    Open::None => {}
                }
            }
        }
        "nd" => {
            if let Open::Way(w) = open {
                if let Some(r) = attrs.get("ref").and_then(|v| v.parse::<Id>().ok()) {
                    w.refs.push(r);
                }
            }
        }
        "member" => {
            if let Open::Relation(rel) = open {
                if let Some(ref_id) = attrs.get("ref").and_then(|v| v.parse::<Id>().ok()) {
                    rel.members.push(RawMember {
                        kind: attrs.get("type").cloned().unwrap_or_default(),
                        role: attrs.get("role").cloned().unwrap_or_default(),
                        ref_id,
                    });
                }
            }
        }
        _ => {}
    }
}

fn close_element(raw: &mut RawOsm, open: &mut Open) {
    match std::mem::replace(open, Open::None) {
        Open::Node(n) => raw.nodes.push(n),
        Open::Way(w) => raw.ways.push(w),
        Open::Relation(r) => raw.relations.push(r),
        Open::None => {}
    }
}

// ─── Resolution into typed primitives ─────────────────────────────────────────

/// Tags that carry coordinates and therefore do not become attributes.
const COORDINATE_TAGS: [&str; 3] = ["local_x", "local_y", "ele"];

fn resolve(raw: RawOsm) -> MapResult<LaneletMap> {
    let mut builder = LaneletMapBuilder::new();

    for node in raw.nodes {
        // Maps with projected coordinates carry them as local_x/local_y
        // tags; plain OSM maps only have lat/lon.
        let x = tag_f64(&node.tags, "local_x").unwrap_or(node.lon);
        let y = tag_f64(&node.tags, "local_y").unwrap_or(node.lat);
        let z = tag_f64(&node.tags, "ele").unwrap_or(0.0);
        let mut point = Point3d::new(node.id, x, y, z);
        point.attributes.extend(
            node.tags
                .into_iter()
                .filter(|(k, _)| !COORDINATE_TAGS.contains(&k.as_str())),
        );
        builder.add_point(point);
    }

    for way in raw.ways {
        let mut ls = LineString3d::new(way.id, way.refs);
        ls.attributes.extend(way.tags);
        builder.add_line_string(ls);
    }

    for rel in &raw.relations {
        match rel.tags.get(ATTR_TYPE).map(String::as_str) {
            Some("lanelet") => builder.add_lanelet(resolve_lanelet(rel)?),
            Some("multipolygon") => builder.add_area(resolve_area(rel)),
            Some("regulatory_element") => builder.add_regulatory_element(resolve_rule(rel)),
            other => {
                tracing::debug!(relation = rel.id, kind = ?other, "skipping relation of unknown type");
                continue;
            }
        };
    }

    builder.build()
}

fn tag_f64(tags: &FnvHashMap<String, String>, key: &str) -> Option<f64> {
    tags.get(key).and_then(|v| v.parse().ok())
}

fn member_ids<'a>(rel: &'a RawRelation, kind: &str, role: &str) -> impl Iterator<Item = Id> + 'a {
    let kind = kind.to_string();
    let role = role.to_string();
    rel.members
        .iter()
        .filter(move |m| m.kind == kind && m.role == role)
        .map(|m| m.ref_id)
}

/// Copy relation tags into primitive attributes, dropping the structural
/// `type` tag (the primitive kind already encodes it).
fn relation_attributes(rel: &RawRelation) -> Attributes {
    rel.tags
        .iter()
        .filter(|(k, _)| k.as_str() != ATTR_TYPE)
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn resolve_lanelet(rel: &RawRelation) -> MapResult<Lanelet> {
    let left = member_ids(rel, "way", "left").next().ok_or_else(|| {
        MapError::InvalidData(format!("lanelet relation {} has no left bound", rel.id))
    })?;
    let right = member_ids(rel, "way", "right").next().ok_or_else(|| {
        MapError::InvalidData(format!("lanelet relation {} has no right bound", rel.id))
    })?;

    let mut lanelet = Lanelet::new(rel.id, left, right);
    lanelet.regulatory_elements = member_ids(rel, "relation", "regulatory_element").collect();
    lanelet.attributes = relation_attributes(rel);
    Ok(lanelet)
}

fn resolve_area(rel: &RawRelation) -> Area {
    let outer: Vec<Id> = member_ids(rel, "way", "outer").collect();
    let inner: Vec<Id> = member_ids(rel, "way", "inner").collect();

    let mut area = Area::new(rel.id, outer);
    if !inner.is_empty() {
        // Inner rings are not grouped in the raw data; treat them as one hole.
        area.inner_bounds = vec![inner];
    }
    area.regulatory_elements = member_ids(rel, "relation", "regulatory_element").collect();
    area.attributes = relation_attributes(rel);
    area
}

fn resolve_rule(rel: &RawRelation) -> RegulatoryElement {
    let subtype = rel.tags.get(ATTR_SUBTYPE).map(String::as_str).unwrap_or("");
    let mut re = match subtype {
        "traffic_light" => {
            let mut re = RegulatoryElement::traffic_light(
                rel.id,
                member_ids(rel, "way", "refers").collect(),
                member_ids(rel, "way", "ref_line").next(),
            );
            if let Rule::TrafficLight { light_bulbs, .. } = &mut re.rule {
                *light_bulbs = member_ids(rel, "way", "light_bulbs").collect();
            }
            re
        }
        "traffic_sign" => RegulatoryElement::traffic_sign(
            rel.id,
            member_ids(rel, "way", "refers").collect(),
            rel.tags.get(ATTR_SIGN_TYPE).cloned().unwrap_or_default(),
            member_ids(rel, "way", "ref_line").collect(),
        ),
        "right_of_way" => RegulatoryElement::right_of_way(
            rel.id,
            member_ids(rel, "relation", "right_of_way").collect(),
            member_ids(rel, "relation", "yield").collect(),
            member_ids(rel, "way", "ref_line").next(),
        ),
        other => {
            tracing::debug!(
                relation = rel.id,
                subtype = other,
                "loading regulatory element as generic rule"
            );
            let parameters = rel
                .members
                .iter()
                .filter_map(|m| {
                    let member = match m.kind.as_str() {
                        "node" => MemberRef::Point(m.ref_id),
                        "way" => MemberRef::LineString(m.ref_id),
                        "relation" => MemberRef::Lanelet(m.ref_id),
                        _ => return None,
                    };
                    Some(RuleParameter {
                        role: m.role.clone(),
                        member,
                    })
                })
                .collect();
            RegulatoryElement::generic(rel.id, parameters)
        }
    };
    re.attributes = relation_attributes(rel);
    re
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::types::Tagged;

    const INTERSECTION_OSM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<osm version="0.6">
  <node id="1" lat="0.0" lon="0.0"><tag k="local_x" v="0.0"/><tag k="local_y" v="0.0"/><tag k="ele" v="1.5"/></node>
  <node id="2" lat="0.0" lon="1.0"><tag k="local_x" v="10.0"/><tag k="local_y" v="0.0"/></node>
  <node id="3" lat="1.0" lon="0.0"/>
  <node id="4" lat="1.0" lon="1.0"/>
  <node id="5" lat="2.0" lon="0.0"/>
  <node id="6" lat="2.0" lon="1.0"/>
  <way id="10"><nd ref="1"/><nd ref="2"/><tag k="type" v="line_thin"/></way>
  <way id="11"><nd ref="3"/><nd ref="4"/></way>
  <way id="12"><nd ref="5"/><nd ref="6"/><tag k="type" v="stop_line"/></way>
  <way id="13"><nd ref="1"/><nd ref="3"/><tag k="subtype" v="stop_sign"/></way>
  <relation id="100">
    <tag k="type" v="lanelet"/>
    <tag k="subtype" v="road"/>
    <member type="way" role="left" ref="10"/>
    <member type="way" role="right" ref="11"/>
    <member type="relation" role="regulatory_element" ref="200"/>
    <member type="relation" role="regulatory_element" ref="201"/>
  </relation>
  <relation id="200">
    <tag k="type" v="regulatory_element"/>
    <tag k="subtype" v="traffic_light"/>
    <member type="way" role="refers" ref="10"/>
    <member type="way" role="ref_line" ref="12"/>
  </relation>
  <relation id="201">
    <tag k="type" v="regulatory_element"/>
    <tag k="subtype" v="traffic_sign"/>
    <member type="way" role="refers" ref="13"/>
    <member type="way" role="ref_line" ref="12"/>
  </relation>
  <relation id="300">
    <tag k="type" v="multipolygon"/>
    <tag k="subtype" v="parking"/>
    <member type="way" role="outer" ref="10"/>
    <member type="way" role="outer" ref="11"/>
  </relation>
</osm>"#;

    #[test]
    fn test_parse_intersection_map() {
        let map = from_osm_str(INTERSECTION_OSM).unwrap();
        assert_eq!(map.point_count(), 6);
        assert_eq!(map.line_string_count(), 4);
        assert_eq!(map.lanelet_count(), 1);
        assert_eq!(map.area_count(), 1);
        assert_eq!(map.regulatory_element_count(), 2);

        let ll = map.lanelet(100).unwrap();
        assert_eq!(ll.left_bound, 10);
        assert_eq!(ll.right_bound, 11);
        assert_eq!(ll.regulatory_elements, vec![200, 201]);
        assert_eq!(ll.subtype(), Some("road"));
    }

    #[test]
    fn test_node_coordinates_prefer_local_tags() {
        let map = from_osm_str(INTERSECTION_OSM).unwrap();
        let p1 = map.point(1).unwrap();
        assert_eq!((p1.x, p1.y, p1.z), (0.0, 0.0, 1.5));
        // Node 2 has local_x but no local_y: y falls back to lat.
        let p2 = map.point(2).unwrap();
        assert_eq!((p2.x, p2.y, p2.z), (10.0, 0.0, 0.0));
        // Node 3 has no local tags at all.
        let p3 = map.point(3).unwrap();
        assert_eq!((p3.x, p3.y), (0.0, 1.0));
        assert!(!p1.has_attribute("local_x"));
    }

    #[test]
    fn test_regulatory_elements_resolved() {
        let map = from_osm_str(INTERSECTION_OSM).unwrap();
        let tl = map.regulatory_element(200).unwrap();
        match &tl.rule {
            Rule::TrafficLight {
                lights, stop_line, ..
            } => {
                assert_eq!(lights, &vec![10]);
                assert_eq!(*stop_line, Some(12));
            }
            _ => panic!("expected traffic light"),
        }

        // Sign type derived from the sign way's subtype tag at build.
        let ts = map.regulatory_element(201).unwrap();
        match &ts.rule {
            Rule::TrafficSign {
                sign_type,
                ref_lines,
                ..
            } => {
                assert_eq!(sign_type, SIGN_TYPE_STOP);
                assert_eq!(ref_lines, &vec![12]);
            }
            _ => panic!("expected traffic sign"),
        }
    }

    #[test]
    fn test_unknown_rule_subtype_becomes_generic() {
        let xml = r#"<osm>
          <node id="1" lat="0" lon="0"/><node id="2" lat="0" lon="1"/>
          <way id="10"><nd ref="1"/><nd ref="2"/></way>
          <relation id="200">
            <tag k="type" v="regulatory_element"/>
            <tag k="subtype" v="speed_limit"/>
            <tag k="sign_value" v="50"/>
            <member type="way" role="refers" ref="10"/>
          </relation>
        </osm>"#;
        let map = from_osm_str(xml).unwrap();
        let re = map.regulatory_element(200).unwrap();
        match &re.rule {
            Rule::Generic { parameters } => {
                assert_eq!(parameters.len(), 1);
                assert_eq!(parameters[0].role, "refers");
                assert_eq!(parameters[0].member, MemberRef::LineString(10));
            }
            _ => panic!("expected generic rule"),
        }
        assert_eq!(re.attribute("sign_value"), Some("50"));
    }

    #[test]
    fn test_lanelet_missing_bound_rejected() {
        let xml = r#"<osm>
          <node id="1" lat="0" lon="0"/><node id="2" lat="0" lon="1"/>
          <way id="10"><nd ref="1"/><nd ref="2"/></way>
          <relation id="100">
            <tag k="type" v="lanelet"/>
            <member type="way" role="left" ref="10"/>
          </relation>
        </osm>"#;
        let err = from_osm_str(xml).unwrap_err();
        assert!(matches!(err, MapError::InvalidData(_)));
    }

    #[test]
    fn test_dangling_way_reference_rejected() {
        let xml = r#"<osm>
          <node id="1" lat="0" lon="0"/>
          <way id="10"><nd ref="1"/><nd ref="99"/></way>
        </osm>"#;
        let err = from_osm_str(xml).unwrap_err();
        assert!(matches!(err, MapError::DanglingReference { child: 99, .. }));
    }

    #[test]
    fn test_unknown_relation_type_skipped() {
        let xml = r#"<osm>
          <relation id="100"><tag k="type" v="route"/></relation>
          <relation id="101"/>
        </osm>"#;
        let map = from_osm_str(xml).unwrap();
        assert!(map.is_empty());
    }

    /// Fuzz test: the OSM parser must never panic on arbitrary input.
    #[test]
    fn test_fuzz_osm_parser() {
        let fuzz_inputs = [
            "",
            "not xml at all",
            "<",
            "<osm>",
            "<osm><node/></osm>",
            "<osm><node id=\"x\"/></osm>",
            "<osm><way id=\"1\"><nd/></way></osm>",
            "<osm><relation id=\"1\"><member/></relation></osm>",
            "<osm><tag k=\"a\" v=\"b\"/></osm>",
            "<osm><node id=\"1\" lat=\"zzz\" lon=\"\"/></osm>",
            "<<<>>>",
            "\x01\x02\x03",
            &"<node>".repeat(5000),
            "<osm><relation id=\"1\"><tag k=\"type\" v=\"lanelet\"/></relation></osm>",
        ];

        for input in &fuzz_inputs {
            // Returning Err or an empty map is fine; panicking is not.
            let _ = from_osm_str(input);
        }
    }
}
