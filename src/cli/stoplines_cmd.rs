//! `lanemap stoplines <map.osm>` — stop lines that apply to the map's lanelets.

use crate::cli::output;
use crate::map::osm;
use crate::query;
use anyhow::{Context, Result};
use std::path::Path;

/// Run the stoplines command. With `sign_type`, only stop lines of matching
/// traffic signs are reported (deduplicated); otherwise all stop lines per
/// lanelet, in lanelet order.
pub fn run(path: &Path, sign_type: Option<&str>) -> Result<()> {
    let map = osm::load_osm(path)
        .with_context(|| format!("loading map from {}", path.display()))?;

    let lanelets = query::all_lanelets(&map);
    let stop_lines = match sign_type {
        Some(st) => query::stop_sign_stop_lines(&map, &lanelets, st),
        None => query::stop_lines_for_lanelets(&map, &lanelets),
    };

    if output::is_json() {
        let items: Vec<serde_json::Value> = stop_lines
            .iter()
            .map(|ls| {
                serde_json::json!({
                    "id": ls.id,
                    "points": ls.points,
                })
            })
            .collect();
        output::print_json(&serde_json::json!({
            "total": stop_lines.len(),
            "sign_type": sign_type,
            "stop_lines": items,
        }));
        return Ok(());
    }

    if stop_lines.is_empty() {
        if !output::is_quiet() {
            eprintln!("  No stop lines found.");
        }
        return Ok(());
    }

    if !output::is_quiet() {
        println!("  Found {} stop line(s):", stop_lines.len());
        for ls in &stop_lines {
            println!("    [{:>8}] {} point(s)", ls.id, ls.points.len());
        }
    }

    Ok(())
}
