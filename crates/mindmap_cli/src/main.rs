//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `mindmap_core` linkage.
//! - Build a small demo map, run one layout pass and print the export as JSON.
//! - Keep output deterministic apart from generated topic ids.

use log::info;
use mindmap_core::{default_log_level, init_logging, LogTarget, MindMap, Position, TopicPatch};
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    // Results go to stdout, diagnostics to stderr.
    let level =
        std::env::var("MINDMAP_LOG").unwrap_or_else(|_| default_log_level().to_string());
    init_logging(&level, LogTarget::Stderr)?;

    println!("mindmap_core ping={}", mindmap_core::ping());
    println!("mindmap_core version={}", mindmap_core::core_version());

    let mut map = MindMap::default();
    let Some(central) = map.add_main_topic(Position::default()) else {
        return Err("failed to create the central topic".into());
    };
    map.update_topic(central, &TopicPatch::name("Release plan"));
    for name in ["Scope", "Schedule", "Risks"] {
        if let Some(child) = map.add_subtopic(central) {
            map.update_topic(child, &TopicPatch::name(name));
        }
    }
    map.add_main_topic(Position::new(0.0, 400.0));

    map.select(central);
    let moved = map.perform_auto_layout();
    info!("event=cli_layout module=cli status=ok moved={moved}");

    println!("mindmap_core topics={} moved={}", map.store().len(), moved);
    println!("{}", serde_json::to_string_pretty(&map.export_document())?);
    Ok(())
}
