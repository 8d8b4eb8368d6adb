use axum::{routing::post, Router, Extension, Json, extract::multipart::Multipart};
use bytes::Bytes;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::{
    config::Config,
    error::{bad, AppErr, AppResult},
    session::deliver_upload,
    state::{SharedRegistry, SharedStore},
};

pub fn router() -> Router {
    Router::new().route("/upload", post(upload_file))
}

/// Multipart fields: `username`, `server_id`, `file` (any order).
pub async fn upload_file(
    Extension(registry): Extension<SharedRegistry>,
    Extension(store): Extension<SharedStore>,
    Extension(config): Extension<Arc<Config>>,
    mut mp: Multipart,
) -> AppResult<Json<Value>> {
    let mut username  = None;
    let mut server_id = None;
    let mut file: Option<(String, Bytes)> = None;

    while let Some(field) = mp.next_field().await.map_err(bad)? {
        let part = field.name().unwrap_or_default().to_owned();
        match part.as_str() {
            "username"  => username  = Some(field.text().await.map_err(bad)?),
            "server_id" => server_id = Some(field.text().await.map_err(bad)?),
            "file" => {
                let name  = field.file_name().unwrap_or("file").to_owned();
                let bytes = field.bytes().await.map_err(bad)?;
                if bytes.len() > config.max_upload_bytes {
                    return Err(AppErr::TooLarge(config.max_upload_bytes));
                }
                file = Some((name, bytes));
            }
            _ => {}
        }
    }

    let Some((name, bytes)) = file else { return Err(bad("no file")) };
    let server_id = server_id.ok_or_else(|| bad("no server_id"))?;

    let (msg, stored) =
        deliver_upload(&registry, store.as_ref(), &server_id, username.as_deref(), &name, bytes).await?;
    Ok(Json(json!({
        "msg_id":    msg.msg_id,
        "file_name": stored.file_name,
        "file_url":  stored.file_url,
        "mime":      stored.mime,
    })))
}
