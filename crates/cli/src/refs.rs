use std::path::PathBuf;
use tabled::{Table, Tabled};
use tokio_util::sync::CancellationToken;

#[derive(Tabled)]
struct OccurrenceRow {
    #[tabled(rename = "Symbol")]
    symbol: String,
    #[tabled(rename = "File")]
    file: String,
    #[tabled(rename = "Line")]
    line: usize,
    #[tabled(rename = "Column")]
    column: usize,
}

pub async fn run(path: PathBuf, symbols: Vec<String>) -> Result<(), Box<dyn std::error::Error>> {
    let index = crate::load_index(&path).await?;
    let found = index
        .find_symbol_occurrences(&symbols, &CancellationToken::new())
        .await;

    let rows: Vec<OccurrenceRow> = found
        .into_iter()
        .flat_map(|(symbol, locations)| {
            let path = path.clone();
            locations.into_iter().map(move |location| OccurrenceRow {
                symbol: symbol.clone(),
                file: location
                    .file
                    .path()
                    .strip_prefix(&path)
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|_| location.file.to_string()),
                line: location.range.start_line + 1,
                column: location.range.start_col + 1,
            })
        })
        .collect();

    if rows.is_empty() {
        println!("No occurrences found.");
    } else {
        println!("{}", Table::new(rows));
    }
    Ok(())
}
