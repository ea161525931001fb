use std::collections::HashMap;

use axum::extract::Multipart;
use bytes::Bytes;
use tracing::warn;

use crate::error::{AppError, AppResult};

/// One uploaded file.
#[derive(Debug, Clone)]
pub struct UploadItem {
    pub body: Bytes,
    pub content_type: String,
}

/// A multipart body split into text fields and files. Field names ending in
/// `[]` are folded onto their bare name.
#[derive(Debug, Default)]
pub struct MultipartForm {
    text: HashMap<String, String>,
    files: Vec<(String, UploadItem)>,
}

impl MultipartForm {
    pub async fn read(mut mp: Multipart) -> AppResult<Self> {
        let mut form = Self::default();
        loop {
            let field = match mp.next_field().await {
                Ok(Some(f)) => f,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "malformed multipart body");
                    return Err(AppError::validation("Malformed multipart body"));
                }
            };
            let name = field
                .name()
                .unwrap_or_default()
                .trim_end_matches("[]")
                .to_string();

            if field.file_name().is_some() {
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "application/octet-stream".into());
                let body = field
                    .bytes()
                    .await
                    .map_err(|_| AppError::validation("Malformed multipart body"))?;
                if !body.is_empty() {
                    form.files.push((name, UploadItem { body, content_type }));
                }
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|_| AppError::validation("Malformed multipart body"))?;
                form.text.insert(name, value);
            }
        }
        Ok(form)
    }

    pub fn take_text(&mut self, name: &str) -> Option<String> {
        self.text.remove(name)
    }

    pub fn take_files(&mut self, name: &str) -> Vec<UploadItem> {
        let (taken, rest) = std::mem::take(&mut self.files)
            .into_iter()
            .partition::<Vec<_>, _>(|(n, _)| n == name);
        self.files = rest;
        taken.into_iter().map(|(_, item)| item).collect()
    }

    #[cfg(test)]
    pub fn with_text(mut self, name: &str, value: &str) -> Self {
        self.text.insert(name.to_string(), value.to_string());
        self
    }

    #[cfg(test)]
    pub fn with_file(mut self, name: &str, body: &'static [u8], content_type: &str) -> Self {
        self.files.push((
            name.to_string(),
            UploadItem {
                body: Bytes::from_static(body),
                content_type: content_type.to_string(),
            },
        ));
        self
    }
}
