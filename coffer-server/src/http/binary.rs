//! Binary items: multipart upload and raw download.
//!
//! An upload carries exactly two parts. The metadata part is JSON
//! (`Content-Type: application/json` or field name `item`); the payload part
//! is the ciphertext (`application/octet-stream` or field name `data`).
//!
//! Any `multipart/*` body is accepted, so `multipart/related` uploads whose
//! parts carry only a `Content-Type` header work as well as form-data.

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::server::VaultServer;
use crate::storage::VaultItem;
use axum::extract::multipart::Field;
use axum::extract::{FromRequest, Multipart, Path, Request};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use coffer_types::api::{METADATA_PART, PAYLOAD_PART};
use coffer_types::{BinaryData, ItemKind, ItemMeta, Payload};
use std::sync::Arc;

const JSON_CONTENT_TYPE: &str = "application/json";
const OCTET_STREAM: &str = "application/octet-stream";
const FORM_DATA: &str = "multipart/form-data";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PartRole {
    Metadata,
    Payload,
}

impl PartRole {
    /// Content type decides first, field name second.
    fn of(field: &Field<'_>) -> Option<Self> {
        let content_type = field
            .content_type()
            .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase());
        match content_type.as_deref() {
            Some(JSON_CONTENT_TYPE) => return Some(PartRole::Metadata),
            Some(OCTET_STREAM) => return Some(PartRole::Payload),
            _ => {}
        }
        match field.name() {
            Some(METADATA_PART) => Some(PartRole::Metadata),
            Some(PAYLOAD_PART) => Some(PartRole::Payload),
            _ => None,
        }
    }
}

/// A decoded binary upload.
#[derive(Debug)]
pub struct BinaryUpload {
    /// Metadata part.
    pub meta: ItemMeta,
    /// Payload part, ciphertext as received.
    pub data: Vec<u8>,
}

impl BinaryUpload {
    /// Read every part, requiring exactly one of each role.
    pub async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let bad = |msg: String| ApiError::BadRequest(msg);
        let mut meta: Option<ItemMeta> = None;
        let mut data: Option<Vec<u8>> = None;

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| bad(format!("malformed multipart body: {e}")))?
        {
            let role = PartRole::of(&field).ok_or_else(|| {
                bad(format!(
                    "unexpected part {:?}",
                    field.name().unwrap_or_default()
                ))
            })?;
            let bytes = field
                .bytes()
                .await
                .map_err(|e| bad(format!("failed to read part: {e}")))?;

            match role {
                PartRole::Metadata => {
                    if meta.is_some() {
                        return Err(bad("duplicate metadata part".into()));
                    }
                    let parsed: ItemMeta = serde_json::from_slice(&bytes)
                        .map_err(|e| bad(format!("invalid metadata part: {e}")))?;
                    meta = Some(parsed);
                }
                PartRole::Payload => {
                    if data.is_some() {
                        return Err(bad("duplicate payload part".into()));
                    }
                    data = Some(bytes.to_vec());
                }
            }
        }

        let meta = meta.ok_or_else(|| bad("missing metadata part".into()))?;
        let data = data.ok_or_else(|| bad("missing payload part".into()))?;
        meta.validate_for(ItemKind::Binary)?;
        Ok(Self { meta, data })
    }

    fn into_item(self) -> VaultItem {
        VaultItem::new(self.meta, Payload::Binary(BinaryData(self.data)))
    }
}

/// Rewrite a `multipart/<subtype>` content type to form-data, keeping its
/// parameters. The multipart parser only recognises form-data; the part
/// framing is the same for every subtype.
fn as_form_data(headers: &mut HeaderMap) {
    let Some(value) = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
    else {
        return;
    };
    let (essence, params) = value.split_once(';').unwrap_or((value, ""));
    let essence = essence.trim().to_ascii_lowercase();
    if essence == FORM_DATA || !essence.starts_with("multipart/") {
        return;
    }

    let rewritten = if params.trim().is_empty() {
        FORM_DATA.to_string()
    } else {
        format!("{FORM_DATA};{params}")
    };
    if let Ok(value) = HeaderValue::from_str(&rewritten) {
        headers.insert(header::CONTENT_TYPE, value);
    }
}

async fn read_upload(mut req: Request) -> Result<VaultItem, ApiError> {
    as_form_data(req.headers_mut());
    let multipart = Multipart::from_request(req, &())
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?;
    Ok(BinaryUpload::read(multipart).await?.into_item())
}

/// `POST /api/item/binary`
pub async fn create(
    Extension(server): Extension<Arc<VaultServer>>,
    user: AuthUser,
    req: Request,
) -> Result<StatusCode, ApiError> {
    let item = read_upload(req).await?;
    server.storage().insert_item(user.user_id, &item).await?;
    Ok(StatusCode::CREATED)
}

/// `PUT /api/item/binary`
pub async fn update(
    Extension(server): Extension<Arc<VaultServer>>,
    user: AuthUser,
    req: Request,
) -> Result<StatusCode, ApiError> {
    let item = read_upload(req).await?;
    server.storage().update_item(user.user_id, &item).await?;
    Ok(StatusCode::OK)
}

/// `GET /api/item/binary/{key}/download`
pub async fn download(
    Extension(server): Extension<Arc<VaultServer>>,
    user: AuthUser,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let bytes = server.storage().get_binary(user.user_id, &key).await?;
    Ok(([(header::CONTENT_TYPE, OCTET_STREAM)], bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content_type_after(value: &str) -> String {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_str(value).unwrap());
        as_form_data(&mut headers);
        headers[header::CONTENT_TYPE].to_str().unwrap().to_string()
    }

    #[test]
    fn multipart_subtypes_become_form_data() {
        assert_eq!(
            content_type_after("multipart/related; boundary=xyz"),
            "multipart/form-data; boundary=xyz"
        );
        assert_eq!(
            content_type_after("Multipart/Mixed;boundary=\"a b\""),
            "multipart/form-data;boundary=\"a b\""
        );
        assert_eq!(content_type_after("multipart/related"), "multipart/form-data");
    }

    #[test]
    fn other_content_types_are_left_alone() {
        for value in [
            "multipart/form-data; boundary=xyz",
            "application/json",
            "text/plain; charset=utf-8",
        ] {
            assert_eq!(content_type_after(value), value);
        }

        let mut headers = HeaderMap::new();
        as_form_data(&mut headers);
        assert!(headers.get(header::CONTENT_TYPE).is_none());
    }
}
