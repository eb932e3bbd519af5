//! Application state and initialization
//!
//! All services are initialized here and shared with the HTTP handlers
//! through AppState.

use crate::config::ServerConfig;
use crate::database::{create_pool, Repository};
use crate::error::Result;
use crate::render::LopdfRenderer;
use crate::services::{AnnotationsService, LibraryService};
use crate::storage::BlobStore;
use crate::viewer::ViewerController;

/// Central application state holding all services
#[derive(Clone)]
pub struct AppState {
    pub library: LibraryService,
    pub annotations: AnnotationsService,
}

impl AppState {
    pub fn new(repo: Repository, blob_store: BlobStore) -> Self {
        Self {
            library: LibraryService::new(repo.clone(), blob_store),
            annotations: AnnotationsService::new(repo),
        }
    }

    /// Create directories, open the database and the blob store
    pub async fn initialize(config: &ServerConfig) -> Result<Self> {
        tracing::info!("Initializing application");
        tracing::info!("Data directory: {:?}", config.data_dir);

        tokio::fs::create_dir_all(&config.data_dir).await?;

        let pool = create_pool(&config.database_path()).await?;
        let repo = Repository::new(pool);

        let blob_store = BlobStore::new(config.blob_dir());
        blob_store.initialize().await?;

        tracing::info!("Application initialized successfully");

        Ok(Self::new(repo, blob_store))
    }

    /// Viewer engine wired to this state's services
    pub fn viewer(&self) -> ViewerController<LibraryService, AnnotationsService, LopdfRenderer> {
        ViewerController::new(
            self.library.clone(),
            self.annotations.clone(),
            LopdfRenderer::new(),
        )
    }
}
