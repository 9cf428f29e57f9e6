//! `lanemap refs <map.osm>` — find everything referencing a primitive.

use crate::cli::output;
use crate::map::osm;
use crate::map::types::Id;
use crate::query::{find_references, PrimitiveRef};
use anyhow::{bail, Context, Result};
use std::path::Path;

/// Run the refs command. `layer` names the layer of the queried primitive.
pub fn run(path: &Path, layer: &str, id: Id) -> Result<()> {
    let map = osm::load_osm(path)
        .with_context(|| format!("loading map from {}", path.display()))?;

    let primitive = match layer {
        "point" | "node" => PrimitiveRef::Point(id),
        "line_string" | "linestring" | "way" => PrimitiveRef::LineString(id),
        "lanelet" => PrimitiveRef::Lanelet(id),
        "area" => PrimitiveRef::Area(id),
        "regulatory_element" | "rule" => PrimitiveRef::RegulatoryElement(id),
        other => bail!(
            "unknown layer '{other}'. Use one of: point, line_string, lanelet, area, regulatory_element"
        ),
    };

    let refs = find_references(&map, primitive)?;

    let mut line_strings: Vec<Id> = refs.line_strings.iter().copied().collect();
    let mut lanelets: Vec<Id> = refs.lanelets.iter().copied().collect();
    let mut areas: Vec<Id> = refs.areas.iter().copied().collect();
    let mut rules: Vec<Id> = refs.regulatory_elements.iter().copied().collect();
    line_strings.sort_unstable();
    lanelets.sort_unstable();
    areas.sort_unstable();
    rules.sort_unstable();

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "layer": layer,
            "id": id,
            "total": refs.total(),
            "line_strings": line_strings,
            "lanelets": lanelets,
            "areas": areas,
            "regulatory_elements": rules,
        }));
        return Ok(());
    }

    if refs.is_empty() {
        if !output::is_quiet() {
            eprintln!("  Nothing references {layer} {id}.");
        }
        return Ok(());
    }

    if !output::is_quiet() {
        println!("  {} referencing primitive(s) for {layer} {id}:", refs.total());
        if !lanelets.is_empty() {
            println!("    lanelets:            {lanelets:?}");
        }
        if !areas.is_empty() {
            println!("    areas:               {areas:?}");
        }
        if !rules.is_empty() {
            println!("    regulatory elements: {rules:?}");
        }
        if !line_strings.is_empty() {
            println!("    linestrings:         {line_strings:?}");
        }
    }

    Ok(())
}
