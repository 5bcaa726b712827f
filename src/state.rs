use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::db::Store;
use crate::services::{LibraryService, UploadService};

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<RwLock<Config>>,

    pub store: Store,

    pub uploads: Arc<UploadService>,

    pub library: Arc<LibraryService>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        store
            .ensure_admin_user(&config.admin.username, &config.admin.password)
            .await?;

        tokio::fs::create_dir_all(&config.uploads.upload_path).await?;

        let config_arc = Arc::new(RwLock::new(config));

        let uploads = Arc::new(UploadService::new(store.clone(), config_arc.clone()));
        let library = Arc::new(LibraryService::new(store.clone(), config_arc.clone()));

        Ok(Self {
            config: config_arc,
            store,
            uploads,
            library,
        })
    }
}
