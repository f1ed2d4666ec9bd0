//! `ragline kb`: Load the knowledge base and inspect what a question matches.

use super::load_config;
use ragline_knowledge::{ContextAssembler, KnowledgeBase};
use std::path::Path;

pub async fn run(config_path: &Path, query: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let (base, report) = KnowledgeBase::load(&config.knowledge.dir);
    let store = base.snapshot();

    println!("Knowledge base: {}", base.dir().display());
    println!("  Files loaded:    {}", report.files_loaded);
    println!("  Files skipped:   {}", report.files_skipped);
    println!("  Records skipped: {}", report.records_skipped);
    println!("  Records:         {}", report.records);

    let Some(query) = query else {
        for topic in store.topics() {
            println!("  - {topic}");
        }
        return Ok(());
    };

    let result = ContextAssembler::new(config.knowledge.max_reference_chars).assemble(query, &store);
    println!();
    if result.matched_topics.is_empty() {
        println!("No record matches {query:?}");
        return Ok(());
    }

    println!("Matched: {}", result.matched_topics.join(", "));
    println!("{}", result.reference_text);
    if let Some(images) = &result.images {
        println!("Images:");
        for url in images {
            println!("  {url}");
        }
    }
    if let Some(links) = &result.links {
        println!("Links:");
        for link in links {
            println!("  {}: {}", link.title, link.url);
        }
    }

    Ok(())
}
