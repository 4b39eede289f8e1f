//! Request descriptions.
//!
//! Bodies are kept as plain data so every attempt can rebuild its own
//! `reqwest` body; a multipart form in particular cannot be sent twice.

use axum::body::Bytes;
use reqwest::{multipart, Method};
use serde::Serialize;
use serde_json::Value;

use super::ClientError;

#[derive(Debug, Clone)]
pub enum FormValue {
    Text(String),
    File {
        file_name: String,
        mime: Option<String>,
        bytes: Bytes,
    },
}

#[derive(Debug, Clone)]
pub struct FormField {
    pub name: String,
    pub value: FormValue,
}

impl FormField {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: FormValue::Text(value.into()),
        }
    }

    pub fn file(
        name: impl Into<String>,
        file_name: impl Into<String>,
        mime: Option<&str>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            value: FormValue::File {
                file_name: file_name.into(),
                mime: mime.map(str::to_string),
                bytes: bytes.into(),
            },
        }
    }
}

#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    Form(Vec<FormField>),
}

impl RequestBody {
    pub fn json(value: &impl Serialize) -> Result<Self, ClientError> {
        serde_json::to_value(value)
            .map(RequestBody::Json)
            .map_err(|e| ClientError::InvalidRequest(e.to_string()))
    }

    /// Fresh multipart form; the boundary is chosen by `reqwest`.
    pub(crate) fn form(fields: &[FormField]) -> Result<multipart::Form, ClientError> {
        fields.iter().try_fold(multipart::Form::new(), |form, field| {
            let part = match &field.value {
                FormValue::Text(text) => multipart::Part::text(text.clone()),
                FormValue::File {
                    file_name,
                    mime,
                    bytes,
                } => {
                    let part = multipart::Part::bytes(bytes.to_vec()).file_name(file_name.clone());
                    match mime {
                        Some(mime) => part
                            .mime_str(mime)
                            .map_err(|e| ClientError::InvalidRequest(e.to_string()))?,
                        None => part,
                    }
                }
            };
            Ok(form.part(field.name.clone(), part))
        })
    }
}

/// One logical call; `path` is relative to the gateway origin.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: RequestBody,
    /// Whether a 401 should go through session refresh.
    pub auth_required: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: RequestBody::Empty,
            auth_required: true,
        }
    }

    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    pub fn public(mut self) -> Self {
        self.auth_required = false;
        self
    }
}
