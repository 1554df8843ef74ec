use crate::Session;
use crate::util::{file_to_uri, to_lsp_range};
use smaliscope_core::model::{Diagnostic as CoreDiagnostic, Severity};
use smaliscope_core::runtime::IndexUpdate;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tower_lsp::Client;
use tower_lsp::lsp_types::{Diagnostic, DiagnosticSeverity, MessageType};

pub fn spawn_indexer(session: Arc<Session>, client: Client) {
    // Subscribe before the load starts so that no update is missed.
    let updates = session.engine.subscribe();
    tokio::spawn(publish_diagnostics(session.clone(), client.clone(), updates));

    tokio::spawn(async move {
        let start = std::time::Instant::now();
        client
            .log_message(
                MessageType::INFO,
                format!("Smaliscope indexing started for {:?}", session.root),
            )
            .await;

        if let Err(e) = session.engine.start().await {
            client
                .log_message(MessageType::ERROR, format!("Initial indexing failed: {}", e))
                .await;
            return;
        }

        let stats = session.engine.index().stats();
        client
            .log_message(
                MessageType::INFO,
                format!(
                    "Initial indexing complete in {:?}: {} files, {} classes, {} failed",
                    start.elapsed(),
                    stats.files,
                    stats.identifiers,
                    stats.failed
                ),
            )
            .await;
    });
}

async fn publish_diagnostics(
    session: Arc<Session>,
    client: Client,
    mut updates: tokio::sync::broadcast::Receiver<IndexUpdate>,
) {
    let cancel = session.engine.cancel_token().clone();
    loop {
        let update = tokio::select! {
            _ = cancel.cancelled() => break,
            update = updates.recv() => update,
        };
        match update {
            Ok(update) => {
                let Some(uri) = file_to_uri(&update.file) else {
                    continue;
                };
                let source = session.engine.index().document(&update.file).await;
                let diagnostics = update
                    .diagnostics
                    .iter()
                    .map(|d| to_lsp_diagnostic(d, source.as_deref()))
                    .collect();
                client.publish_diagnostics(uri, diagnostics, None).await;
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!("Diagnostics publisher lagged, {} updates skipped", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

fn to_lsp_diagnostic(
    diagnostic: &CoreDiagnostic,
    source: Option<&smaliscope_core::model::SourceText>,
) -> Diagnostic {
    let range = match source {
        Some(source) => to_lsp_range(source, diagnostic.range),
        None => tower_lsp::lsp_types::Range::new(
            tower_lsp::lsp_types::Position::new(
                diagnostic.range.start_line as u32,
                diagnostic.range.start_col as u32,
            ),
            tower_lsp::lsp_types::Position::new(
                diagnostic.range.end_line as u32,
                diagnostic.range.end_col as u32,
            ),
        ),
    };
    let severity = match diagnostic.severity {
        Severity::Error => DiagnosticSeverity::ERROR,
        Severity::Warning => DiagnosticSeverity::WARNING,
        Severity::Information => DiagnosticSeverity::INFORMATION,
        Severity::Hint => DiagnosticSeverity::HINT,
    };
    Diagnostic {
        range,
        severity: Some(severity),
        source: Some("smaliscope".to_string()),
        message: diagnostic.message.clone(),
        ..Default::default()
    }
}
