//! `lanemap lanelets <map.osm>` — list lanelets, optionally by subtype.

use crate::cli::output;
use crate::map::osm;
use crate::map::types::Tagged;
use crate::query;
use anyhow::{Context, Result};
use std::path::Path;

/// Run the lanelets command.
pub fn run(path: &Path, subtype: Option<&str>) -> Result<()> {
    let map = osm::load_osm(path)
        .with_context(|| format!("loading map from {}", path.display()))?;

    let all = query::all_lanelets(&map);
    let selected = match subtype {
        Some(s) => query::subtype_lanelets(&all, s),
        None => all,
    };

    if output::is_json() {
        let items: Vec<serde_json::Value> = selected
            .iter()
            .map(|ll| {
                serde_json::json!({
                    "id": ll.id,
                    "subtype": ll.subtype(),
                    "left_bound": ll.left_bound,
                    "right_bound": ll.right_bound,
                    "regulatory_elements": ll.regulatory_elements,
                })
            })
            .collect();
        output::print_json(&serde_json::json!({
            "total": selected.len(),
            "lanelets": items,
        }));
        return Ok(());
    }

    if selected.is_empty() {
        if !output::is_quiet() {
            match subtype {
                Some(s) => eprintln!("  No lanelets with subtype '{s}'."),
                None => eprintln!("  Map has no lanelets."),
            }
        }
        return Ok(());
    }

    if !output::is_quiet() {
        println!("  Found {} lanelet(s):", selected.len());
        for ll in &selected {
            println!(
                "    [{:>8}] {:<12} bounds: {} / {}  rules: {}",
                ll.id,
                ll.subtype().unwrap_or("-"),
                ll.left_bound,
                ll.right_bound,
                ll.regulatory_elements.len(),
            );
        }
    }

    Ok(())
}
