//! Request body extractors shared by the handlers.

use std::collections::HashMap;

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Multipart, Request},
    http::header,
    Json,
};
use axum_extra::extract::Form;
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// A form body, accepted as `application/json` or url-encoded fields.
/// Repeated url-encoded keys (`products=1&products=2`) collect into sequences.
#[derive(Debug, Clone)]
pub struct FormOrJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for FormOrJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/json"));

        if is_json {
            let Json(value) = Json::<T>::from_request(req, state)
                .await
                .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
            Ok(FormOrJson(value))
        } else {
            let Form(value) = Form::<T>::from_request(req, state)
                .await
                .map_err(|rejection| AppError::BadRequest(rejection.to_string()))?;
            Ok(FormOrJson(value))
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl UploadedFile {
    /// The `charset` parameter of the part's content type, if any.
    pub fn charset(&self) -> Option<&str> {
        self.content_type
            .as_deref()?
            .split(';')
            .skip(1)
            .filter_map(|param| param.trim().split_once('='))
            .find(|(key, _)| key.trim().eq_ignore_ascii_case("charset"))
            .map(|(_, value)| value.trim().trim_matches('"'))
    }
}

/// A fully read multipart body: file parts by field name, plus text fields.
#[derive(Debug, Default)]
pub struct MultipartForm {
    files: Vec<(String, UploadedFile)>,
    fields: HashMap<String, String>,
}

impl MultipartForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = MultipartForm::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|err| AppError::BadRequest(err.body_text()))?
        {
            let name = field.name().unwrap_or_default().to_owned();
            match field.file_name().map(str::to_owned) {
                Some(filename) => {
                    let content_type = field.content_type().map(str::to_owned);
                    let data = field
                        .bytes()
                        .await
                        .map_err(|err| AppError::BadRequest(err.body_text()))?;
                    form.files.push((
                        name,
                        UploadedFile {
                            filename,
                            content_type,
                            data,
                        },
                    ));
                }
                None => {
                    let text = field
                        .text()
                        .await
                        .map_err(|err| AppError::BadRequest(err.body_text()))?;
                    form.fields.insert(name, text);
                }
            }
        }
        Ok(form)
    }

    pub fn file(&self, name: &str) -> Option<&UploadedFile> {
        self.files
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, file)| file)
    }

    /// Every file sent under `name`, in upload order.
    pub fn files_named(&self, name: &str) -> Vec<&UploadedFile> {
        self.files
            .iter()
            .filter(|(field, _)| field == name)
            .map(|(_, file)| file)
            .collect()
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// The named file, or a field error saying it is missing.
    pub fn require_file(&self, name: &str) -> Result<&UploadedFile, AppError> {
        self.file(name)
            .ok_or_else(|| AppError::field(name, "No file was submitted."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charset_is_read_from_content_type() {
        let file = UploadedFile {
            filename: "a.csv".to_owned(),
            content_type: Some("text/csv; charset=\"latin-1\"".to_owned()),
            data: Bytes::new(),
        };
        assert_eq!(file.charset(), Some("latin-1"));

        let plain = UploadedFile {
            content_type: Some("text/csv".to_owned()),
            ..file
        };
        assert_eq!(plain.charset(), None);
    }
}
