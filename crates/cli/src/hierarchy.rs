use smaliscope_core::model::types::to_class_descriptor;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

pub async fn run(path: PathBuf, class: String) -> Result<(), Box<dyn std::error::Error>> {
    let identifier = to_class_descriptor(&class)
        .ok_or_else(|| format!("\"{}\" is not a class name", class))?;
    let index = crate::load_index(&path).await?;
    let cancel = CancellationToken::new();

    let declared = index.find_classes(&identifier, &cancel).await;
    if declared.is_empty() {
        println!("{} is not declared in this project.", identifier);
    }
    for (file, _) in &declared {
        println!("Declared in {}", file);
    }

    println!("\nAncestors:");
    for ancestor in index.find_superclass_chain(&identifier, &cancel).await {
        println!("  {}", ancestor);
    }

    println!("\nSubclasses:");
    for subclass in index.find_subclass_identifiers(&identifier, &cancel).await {
        println!("  {}", subclass);
    }
    Ok(())
}
