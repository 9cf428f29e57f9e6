//! `lanemap info <map.osm>` — layer and usage statistics for a map.

use crate::cli::output;
use crate::map::osm;
use anyhow::{Context, Result};
use std::path::Path;

/// Run the info command.
pub fn run(path: &Path) -> Result<()> {
    let map = osm::load_osm(path)
        .with_context(|| format!("loading map from {}", path.display()))?;

    let shared_bounds = map
        .line_strings()
        .filter(|ls| map.lanelets_using_line_string(ls.id).len() > 1)
        .count();
    let governed_lanelets = map
        .lanelets()
        .filter(|ll| !ll.regulatory_elements.is_empty())
        .count();

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "file": path.display().to_string(),
            "points": map.point_count(),
            "line_strings": map.line_string_count(),
            "lanelets": map.lanelet_count(),
            "areas": map.area_count(),
            "regulatory_elements": map.regulatory_element_count(),
            "shared_bounds": shared_bounds,
            "governed_lanelets": governed_lanelets,
        }));
        return Ok(());
    }

    if !output::is_quiet() {
        println!("  Map: {}", path.display());
        println!("    points:               {:>8}", map.point_count());
        println!("    linestrings:          {:>8}", map.line_string_count());
        println!("    lanelets:             {:>8}", map.lanelet_count());
        println!("    areas:                {:>8}", map.area_count());
        println!("    regulatory elements:  {:>8}", map.regulatory_element_count());
        println!("    shared lane bounds:   {:>8}", shared_bounds);
        println!("    governed lanelets:    {:>8}", governed_lanelets);
    }

    Ok(())
}
