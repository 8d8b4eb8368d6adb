use std::{collections::VecDeque, path::PathBuf, sync::Arc};
use tokio::sync::RwLock;

use crate::{room::RoomRegistry, storage::FileStore};

/* ------------ shared handles, injected as Extensions ------------ */
pub type SharedRegistry = Arc<RoomRegistry>;
pub type SharedStore    = Arc<dyn FileStore>;

/* ------------ stored uploads, oldest first ------------ */
#[derive(Debug, Clone)]
pub struct MediaEntry {
    pub path: PathBuf,
    pub size: u64,
    pub room: String,
}
pub type MediaLog = Arc<RwLock<VecDeque<MediaEntry>>>;
