use anyhow::Context;
use tracing::warn;
use uuid::Uuid;

use super::form::UploadItem;
use crate::state::AppState;

/// Uploads every item under `<prefix>/<owner>/` and returns the object keys.
pub async fn upload_images(
    st: &AppState,
    prefix: &str,
    owner_id: Uuid,
    images: Vec<UploadItem>,
) -> anyhow::Result<Vec<String>> {
    let mut keys = Vec::with_capacity(images.len());
    for img in images {
        let ext = ext_from_mime(&img.content_type).unwrap_or("bin");
        let key = format!("{}/{}/{}.{}", prefix, owner_id, Uuid::new_v4(), ext);
        st.storage
            .put_object(&key, img.body, &img.content_type)
            .await
            .with_context(|| format!("put_object {}", key))?;
        keys.push(key);
    }
    Ok(keys)
}

/// Best effort: a failed delete leaves an orphaned object, never an error.
pub async fn delete_images(st: &AppState, keys: &[String]) {
    for key in keys {
        if let Err(e) = st.storage.delete_object(key).await {
            warn!(error = %e, %key, "delete_object failed");
        }
    }
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}
