use std::path::PathBuf;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct DiagnosticRow {
    #[tabled(rename = "File")]
    file: String,
    #[tabled(rename = "Line")]
    line: usize,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Message")]
    message: String,
}

pub async fn run(path: PathBuf, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let index = crate::load_index(&path).await?;
    let stats = index.stats();
    let broken = index.files_with_diagnostics();

    if json {
        let report = serde_json::json!({
            "stats": stats,
            "diagnostics": broken
                .iter()
                .map(|(file, diagnostics)| serde_json::json!({ "file": file, "diagnostics": diagnostics }))
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Files:       {}", stats.files);
    println!("Parsed:      {}", stats.parsed);
    println!("Failed:      {}", stats.failed);
    println!("Classes:     {}", stats.identifiers);
    println!("Cached:      {} classes, {} bytes", stats.cached_classes, stats.cached_bytes);

    let rows: Vec<DiagnosticRow> = broken
        .into_iter()
        .flat_map(|(file, diagnostics)| {
            let relative = file
                .path()
                .strip_prefix(&path)
                .map(|p| p.display().to_string())
                .unwrap_or_else(|_| file.to_string());
            diagnostics.into_iter().map(move |d| DiagnosticRow {
                file: relative.clone(),
                line: d.range.start_line + 1,
                kind: format!("{:?}", d.kind),
                message: d.message,
            })
        })
        .collect();
    if rows.is_empty() {
        println!("\nNo problems found.");
    } else {
        println!("\n{}", Table::new(rows));
    }
    Ok(())
}
