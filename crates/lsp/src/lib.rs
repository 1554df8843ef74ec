pub mod capabilities;
pub mod goto;
pub mod hover;
pub mod indexer;
pub mod rename;
pub mod symbols;
pub mod util;

use crate::util::{to_core_position, uri_to_file};
use smaliscope_core::config::IndexConfig;
use smaliscope_core::index::ProjectIndex;
use smaliscope_core::model::Position as CorePosition;
use smaliscope_core::project::{FileId, FsProject};
use smaliscope_core::runtime::{Engine, FileEvent};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};

/// Everything that exists once a workspace root is known.
pub struct Session {
    pub root: PathBuf,
    pub project: Arc<FsProject>,
    pub engine: Engine,
}

impl Session {
    pub fn open(root: PathBuf) -> smaliscope_core::Result<Self> {
        let config = IndexConfig::load(&root)?;
        let project = Arc::new(FsProject::new(root.clone(), &config)?);
        let index = ProjectIndex::new(project.clone(), config);
        Ok(Self {
            root,
            project,
            engine: Engine::new(Arc::new(index)),
        })
    }
}

/// A request position resolved against the index.
pub struct Target {
    pub session: Arc<Session>,
    pub file: FileId,
    pub position: CorePosition,
    pub cancel: CancellationToken,
}

pub struct LspServer {
    client: Client,
    session: Arc<RwLock<Option<Arc<Session>>>>,
}

impl LspServer {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            session: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn session(&self) -> Option<Arc<Session>> {
        self.session.read().await.clone()
    }

    pub async fn locate(&self, uri: &Url, position: Position) -> Option<Target> {
        let session = self.session().await?;
        let file = uri_to_file(uri)?;
        let source = session.engine.index().document(&file).await?;
        let position = to_core_position(&source, position);
        let cancel = session.engine.cancel_token().child_token();
        Some(Target {
            session,
            file,
            position,
            cancel,
        })
    }

    /// Pushes an editor buffer into the index and waits until it is applied.
    async fn update_buffer(&self, uri: &Url, text: String, version: i32) {
        let Some(session) = self.session().await else {
            return;
        };
        let Some(file) = uri_to_file(uri) else {
            return;
        };
        if !session.project.is_relevant(file.path()) {
            return;
        }
        let text: Arc<str> = Arc::from(text);
        session.project.set_overlay(file.clone(), text.clone(), version);
        session
            .engine
            .apply(FileEvent::changed(file, text, Some(version)))
            .await;
    }

    async fn log_request(&self, method: &str, uri: &Url, pos: Option<Position>) {
        let message = match pos {
            Some(pos) => format!(
                "LSP Request: {} uri={} pos={}:{}",
                method, uri, pos.line, pos.character
            ),
            None => format!("LSP Request: {} uri={}", method, uri),
        };
        tracing::debug!("{}", message);
        self.client.log_message(MessageType::LOG, message).await;
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for LspServer {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        #[allow(deprecated)]
        let root_path = params
            .workspace_folders
            .as_ref()
            .and_then(|folders| folders.first())
            .and_then(|folder| folder.uri.to_file_path().ok())
            .or_else(|| params.root_uri.and_then(|uri| uri.to_file_path().ok()));

        if let Some(path) = root_path {
            match Session::open(path.clone()) {
                Ok(session) => {
                    let session = Arc::new(session);
                    *self.session.write().await = Some(session.clone());
                    indexer::spawn_indexer(session, self.client.clone());
                }
                Err(e) => {
                    tracing::error!("Cannot open workspace {:?}: {}", path, e);
                    self.client
                        .log_message(MessageType::ERROR, format!("Cannot open workspace: {}", e))
                        .await;
                }
            }
        }

        Ok(InitializeResult {
            server_info: Some(ServerInfo {
                name: "Smaliscope".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
            capabilities: capabilities::server_capabilities(),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        let registration = Registration {
            id: "smaliscope-watched-files".to_string(),
            method: "workspace/didChangeWatchedFiles".to_string(),
            register_options: serde_json_value(DidChangeWatchedFilesRegistrationOptions {
                watchers: vec![FileSystemWatcher {
                    glob_pattern: GlobPattern::String("**/*.smali".to_string()),
                    kind: None,
                }],
            }),
        };
        if let Err(e) = self.client.register_capability(vec![registration]).await {
            tracing::info!("Client does not watch files for us: {}", e);
        }
    }

    async fn shutdown(&self) -> Result<()> {
        if let Some(session) = self.session.write().await.take() {
            session.engine.shutdown();
        }
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let doc = params.text_document;
        self.log_request("textDocument/didOpen", &doc.uri, None).await;
        self.update_buffer(&doc.uri, doc.text, doc.version).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        // Full sync: the last change carries the whole document.
        let Some(change) = params.content_changes.into_iter().last() else {
            return;
        };
        let doc = params.text_document;
        self.update_buffer(&doc.uri, change.text, doc.version).await;
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        let Some(session) = self.session().await else {
            return;
        };
        let Some(file) = uri_to_file(&params.text_document.uri) else {
            return;
        };
        if !session.project.is_open(&file) {
            session.engine.submit(FileEvent::reload(file));
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        self.log_request("textDocument/didClose", &uri, None).await;
        let Some(session) = self.session().await else {
            return;
        };
        let Some(file) = uri_to_file(&uri) else {
            return;
        };
        if session.project.remove_overlay(&file).is_some() {
            session.engine.submit(FileEvent::reload(file));
        }
    }

    async fn did_change_watched_files(&self, params: DidChangeWatchedFilesParams) {
        let Some(session) = self.session().await else {
            return;
        };
        for change in params.changes {
            let Some(file) = uri_to_file(&change.uri) else {
                continue;
            };
            if !session.project.is_relevant(file.path()) {
                continue;
            }
            let event = match change.typ {
                FileChangeType::CREATED => FileEvent::Created { file },
                FileChangeType::DELETED => FileEvent::Deleted { file },
                _ if session.project.is_open(&file) => continue,
                _ => FileEvent::reload(file),
            };
            session.engine.submit(event);
        }
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let doc = &params.text_document_position_params;
        self.log_request("textDocument/hover", &doc.text_document.uri, Some(doc.position))
            .await;
        hover::hover(self, params).await
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        let doc = &params.text_document_position_params;
        self.log_request(
            "textDocument/definition",
            &doc.text_document.uri,
            Some(doc.position),
        )
        .await;
        goto::definition(self, params).await
    }

    async fn references(&self, params: ReferenceParams) -> Result<Option<Vec<Location>>> {
        let doc = &params.text_document_position;
        self.log_request(
            "textDocument/references",
            &doc.text_document.uri,
            Some(doc.position),
        )
        .await;
        let result = goto::references(self, params).await;
        if let Ok(Some(locs)) = &result {
            self.client
                .log_message(
                    MessageType::LOG,
                    format!("LSP Response: found {} references", locs.len()),
                )
                .await;
        }
        result
    }

    async fn rename(&self, params: RenameParams) -> Result<Option<WorkspaceEdit>> {
        let doc = &params.text_document_position;
        self.log_request("textDocument/rename", &doc.text_document.uri, Some(doc.position))
            .await;
        let result = rename::rename(self, params).await;
        if let Err(e) = &result {
            self.client
                .log_message(MessageType::ERROR, format!("LSP Error: {}", e))
                .await;
        }
        result
    }

    async fn document_symbol(
        &self,
        params: DocumentSymbolParams,
    ) -> Result<Option<DocumentSymbolResponse>> {
        self.log_request("textDocument/documentSymbol", &params.text_document.uri, None)
            .await;
        symbols::document_symbol(self, params).await
    }

    async fn symbol(
        &self,
        params: WorkspaceSymbolParams,
    ) -> Result<Option<Vec<SymbolInformation>>> {
        self.client
            .log_message(
                MessageType::LOG,
                format!("LSP Request: workspace/symbol query='{}'", params.query),
            )
            .await;
        symbols::workspace_symbol(self, params).await
    }
}

fn serde_json_value<T: serde::Serialize>(value: T) -> Option<serde_json::Value> {
    serde_json::to_value(value).ok()
}

pub async fn run_server() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = tower_lsp::LspService::new(LspServer::new);
    tower_lsp::Server::new(stdin, stdout, socket)
        .serve(service)
        .await;

    Ok(())
}
