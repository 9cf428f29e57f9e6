//! Core primitive types of a lanelet map.
//!
//! Every primitive carries an `Id` assigned by the map data (ids are global
//! across layers in lanelet maps, but each layer is keyed independently) and
//! a free-form attribute tag map. Cross-references between primitives are
//! stored as ids; the [`LaneletMap`](crate::map::layers::LaneletMap) resolves
//! them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Primitive identifier. Lanelet map data uses signed 64-bit ids.
pub type Id = i64;

/// Free-form string tags attached to a primitive.
pub type Attributes = HashMap<String, String>;

// ─── Well-known attribute keys and values ─────────────────────────────────────

pub const ATTR_TYPE: &str = "type";
pub const ATTR_SUBTYPE: &str = "subtype";
pub const ATTR_ONE_WAY: &str = "one_way";
pub const ATTR_SIGN_TYPE: &str = "sign_type";

pub const SUBTYPE_ROAD: &str = "road";
pub const SUBTYPE_CROSSWALK: &str = "crosswalk";
pub const SUBTYPE_WALKWAY: &str = "walkway";

pub const TYPE_STOP_LINE: &str = "stop_line";
pub const TYPE_TRAFFIC_LIGHT: &str = "traffic_light";
pub const TYPE_TRAFFIC_SIGN: &str = "traffic_sign";

/// Default traffic-sign type used when extracting stop-sign stop lines.
pub const SIGN_TYPE_STOP: &str = "stop_sign";

// ─── Tagged trait ─────────────────────────────────────────────────────────────

/// Attribute access shared by every primitive.
pub trait Tagged {
    fn attributes(&self) -> &Attributes;
    fn attributes_mut(&mut self) -> &mut Attributes;

    fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes().get(key).map(String::as_str)
    }

    fn has_attribute(&self, key: &str) -> bool {
        self.attributes().contains_key(key)
    }

    /// The `subtype` tag, if present.
    fn subtype(&self) -> Option<&str> {
        self.attribute(ATTR_SUBTYPE)
    }

    fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self
    where
        Self: Sized,
    {
        self.attributes_mut().insert(key.into(), value.into());
        self
    }
}

macro_rules! impl_tagged {
    ($($ty:ty),+) => {
        $(impl Tagged for $ty {
            fn attributes(&self) -> &Attributes {
                &self.attributes
            }
            fn attributes_mut(&mut self) -> &mut Attributes {
                &mut self.attributes
            }
        })+
    };
}

// ─── Point ────────────────────────────────────────────────────────────────────

/// A 3D point. Coordinates are map-local metric values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Point3d {
    pub id: Id,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default)]
    pub attributes: Attributes,
}

impl Point3d {
    pub fn new(id: Id, x: f64, y: f64, z: f64) -> Self {
        Self {
            id,
            x,
            y,
            z,
            attributes: Attributes::new(),
        }
    }
}

// ─── LineString ───────────────────────────────────────────────────────────────

/// An ordered polyline of point ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineString3d {
    pub id: Id,
    pub points: Vec<Id>,
    #[serde(default)]
    pub attributes: Attributes,
}

impl LineString3d {
    pub fn new(id: Id, points: Vec<Id>) -> Self {
        Self {
            id,
            points,
            attributes: Attributes::new(),
        }
    }
}

// ─── Lanelet ──────────────────────────────────────────────────────────────────

/// A drivable (or walkable) lane section bounded by two linestrings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lanelet {
    pub id: Id,
    pub left_bound: Id,
    pub right_bound: Id,
    /// Regulatory elements governing this lanelet, in map order.
    #[serde(default)]
    pub regulatory_elements: Vec<Id>,
    #[serde(default)]
    pub attributes: Attributes,
}

impl Lanelet {
    pub fn new(id: Id, left_bound: Id, right_bound: Id) -> Self {
        Self {
            id,
            left_bound,
            right_bound,
            regulatory_elements: Vec::new(),
            attributes: Attributes::new(),
        }
    }
}

// ─── Area ─────────────────────────────────────────────────────────────────────

/// A closed region bounded by one outer ring of linestrings and any number of
/// inner rings (holes).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Area {
    pub id: Id,
    pub outer_bound: Vec<Id>,
    #[serde(default)]
    pub inner_bounds: Vec<Vec<Id>>,
    #[serde(default)]
    pub regulatory_elements: Vec<Id>,
    #[serde(default)]
    pub attributes: Attributes,
}

impl Area {
    pub fn new(id: Id, outer_bound: Vec<Id>) -> Self {
        Self {
            id,
            outer_bound,
            inner_bounds: Vec::new(),
            regulatory_elements: Vec::new(),
            attributes: Attributes::new(),
        }
    }
}

// ─── Regulatory elements ──────────────────────────────────────────────────────

/// A reference to a primitive in another layer, used by generic rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "layer", content = "id", rename_all = "snake_case")]
pub enum MemberRef {
    Point(Id),
    LineString(Id),
    Lanelet(Id),
    Area(Id),
}

/// One role/member pair of a generic rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleParameter {
    pub role: String,
    pub member: MemberRef,
}

/// The typed payload of a regulatory element.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rule {
    TrafficLight {
        /// Light-bar linestrings.
        lights: Vec<Id>,
        /// Individual bulb linestrings, when the map carries them.
        #[serde(default)]
        light_bulbs: Vec<Id>,
        stop_line: Option<Id>,
    },
    TrafficSign {
        /// Sign plate linestrings.
        signs: Vec<Id>,
        /// Sign type, e.g. "stop_sign". Empty when unknown.
        sign_type: String,
        /// Reference lines where the sign applies (stop lines for stop signs).
        ref_lines: Vec<Id>,
    },
    RightOfWay {
        /// Lanelets that have right of way.
        right_of_way: Vec<Id>,
        /// Lanelets that must yield.
        yields: Vec<Id>,
        stop_line: Option<Id>,
    },
    /// Any rule subtype this crate does not model explicitly. Members are
    /// preserved so traversal still sees them.
    Generic { parameters: Vec<RuleParameter> },
}

/// Which maneuver a right-of-way rule prescribes for a given lanelet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Maneuver {
    RightOfWay,
    Yield,
    Unknown,
}

/// A regulatory element: a typed rule plus its attribute tags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegulatoryElement {
    pub id: Id,
    pub rule: Rule,
    #[serde(default)]
    pub attributes: Attributes,
}

impl RegulatoryElement {
    pub fn traffic_light(id: Id, lights: Vec<Id>, stop_line: Option<Id>) -> Self {
        Self {
            id,
            rule: Rule::TrafficLight {
                lights,
                light_bulbs: Vec::new(),
                stop_line,
            },
            attributes: Attributes::new(),
        }
    }

    pub fn traffic_sign(
        id: Id,
        signs: Vec<Id>,
        sign_type: impl Into<String>,
        ref_lines: Vec<Id>,
    ) -> Self {
        Self {
            id,
            rule: Rule::TrafficSign {
                signs,
                sign_type: sign_type.into(),
                ref_lines,
            },
            attributes: Attributes::new(),
        }
    }

    pub fn right_of_way(id: Id, right_of_way: Vec<Id>, yields: Vec<Id>, stop_line: Option<Id>) -> Self {
        Self {
            id,
            rule: Rule::RightOfWay {
                right_of_way,
                yields,
                stop_line,
            },
            attributes: Attributes::new(),
        }
    }

    pub fn generic(id: Id, parameters: Vec<RuleParameter>) -> Self {
        Self {
            id,
            rule: Rule::Generic { parameters },
            attributes: Attributes::new(),
        }
    }

    pub fn is_traffic_light(&self) -> bool {
        matches!(self.rule, Rule::TrafficLight { .. })
    }

    pub fn is_traffic_sign(&self) -> bool {
        matches!(self.rule, Rule::TrafficSign { .. })
    }

    pub fn is_right_of_way(&self) -> bool {
        matches!(self.rule, Rule::RightOfWay { .. })
    }

    /// Stop line of this rule, when the rule kind carries one.
    pub fn stop_line(&self) -> Option<Id> {
        match &self.rule {
            Rule::TrafficLight { stop_line, .. } => *stop_line,
            Rule::RightOfWay { stop_line, .. } => *stop_line,
            _ => None,
        }
    }

    /// Maneuver this rule prescribes for `lanelet`. Only right-of-way rules
    /// prescribe maneuvers; yield membership wins over right-of-way
    /// membership.
    pub fn maneuver(&self, lanelet: Id) -> Maneuver {
        match &self.rule {
            Rule::RightOfWay {
                right_of_way,
                yields,
                ..
            } => {
                if yields.contains(&lanelet) {
                    Maneuver::Yield
                } else if right_of_way.contains(&lanelet) {
                    Maneuver::RightOfWay
                } else {
                    Maneuver::Unknown
                }
            }
            _ => Maneuver::Unknown,
        }
    }

    /// Every linestring id any role of this rule references.
    pub fn line_string_members(&self) -> Vec<Id> {
        match &self.rule {
            Rule::TrafficLight {
                lights,
                light_bulbs,
                stop_line,
            } => {
                let mut out = lights.clone();
                out.extend_from_slice(light_bulbs);
                out.extend(stop_line.iter().copied());
                out
            }
            Rule::TrafficSign {
                signs, ref_lines, ..
            } => {
                let mut out = signs.clone();
                out.extend_from_slice(ref_lines);
                out
            }
            Rule::RightOfWay { stop_line, .. } => stop_line.iter().copied().collect(),
            Rule::Generic { parameters } => parameters
                .iter()
                .filter_map(|p| match p.member {
                    MemberRef::LineString(id) => Some(id),
                    _ => None,
                })
                .collect(),
        }
    }

    /// Every lanelet id any role of this rule references.
    pub fn lanelet_members(&self) -> Vec<Id> {
        match &self.rule {
            Rule::RightOfWay {
                right_of_way,
                yields,
                ..
            } => {
                let mut out = right_of_way.clone();
                out.extend_from_slice(yields);
                out
            }
            Rule::Generic { parameters } => parameters
                .iter()
                .filter_map(|p| match p.member {
                    MemberRef::Lanelet(id) => Some(id),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Point ids referenced directly (generic rules only).
    pub fn point_members(&self) -> Vec<Id> {
        match &self.rule {
            Rule::Generic { parameters } => parameters
                .iter()
                .filter_map(|p| match p.member {
                    MemberRef::Point(id) => Some(id),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Area ids referenced directly (generic rules only).
    pub fn area_members(&self) -> Vec<Id> {
        match &self.rule {
            Rule::Generic { parameters } => parameters
                .iter()
                .filter_map(|p| match p.member {
                    MemberRef::Area(id) => Some(id),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl_tagged!(Point3d, LineString3d, Lanelet, Area, RegulatoryElement);

// ─── Errors ───────────────────────────────────────────────────────────────────

#[derive(thiserror::Error, Debug)]
pub enum MapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Invalid map data: {0}")]
    InvalidData(String),

    #[error("Duplicate id {id} in {layer} layer")]
    DuplicateId { layer: &'static str, id: Id },

    #[error("{layer} {id} not found")]
    MissingPrimitive { layer: &'static str, id: Id },

    #[error("{parent_layer} {parent} references missing {child_layer} {child}")]
    DanglingReference {
        parent_layer: &'static str,
        parent: Id,
        child_layer: &'static str,
        child: Id,
    },
}

/// Convenience result type.
pub type MapResult<T> = Result<T, MapError>;
