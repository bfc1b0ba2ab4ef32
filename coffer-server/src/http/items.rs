//! Item endpoints for the JSON kinds, plus get, list and delete.

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::server::VaultServer;
use crate::storage::VaultItem;
use axum::body::Bytes;
use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::{Extension, Json};
use coffer_types::api::{DEFAULT_LIMIT, DEFAULT_PAGE};
use coffer_types::{Envelope, ItemData, ItemKind, ItemMeta, Payload};
use serde::Deserialize;
use std::sync::Arc;

/// Parse `{"item": ..., "data": ...}` for kind `T` and check it is storable.
fn decode_envelope<T: ItemData>(body: &[u8]) -> Result<VaultItem, ApiError> {
    let envelope: Envelope<T> = serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("invalid {} body: {e}", T::KIND)))?;
    envelope.item.validate_for(T::KIND)?;
    envelope.data.validate()?;
    Ok(VaultItem::new(envelope.item, envelope.data.into_payload()))
}

/// `POST /api/item/{kind}`
pub async fn create<T: ItemData>(
    Extension(server): Extension<Arc<VaultServer>>,
    user: AuthUser,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let item = decode_envelope::<T>(&body)?;
    server.storage().insert_item(user.user_id, &item).await?;
    Ok(StatusCode::CREATED)
}

/// `PUT /api/item/{kind}`
pub async fn update<T: ItemData>(
    Extension(server): Extension<Arc<VaultServer>>,
    user: AuthUser,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let item = decode_envelope::<T>(&body)?;
    server.storage().update_item(user.user_id, &item).await?;
    Ok(StatusCode::OK)
}

/// `GET /api/item/{key}`
///
/// Binary items come back with `data: null`; their bytes are served by the
/// download endpoint.
pub async fn get(
    Extension(server): Extension<Arc<VaultServer>>,
    user: AuthUser,
    Path(key): Path<String>,
) -> Result<Json<Envelope<Option<Payload>>>, ApiError> {
    let meta = server.storage().get_item(user.user_id, &key).await?;
    let data = match meta.kind {
        ItemKind::Binary => None,
        _ => Some(server.storage().get_payload(&meta).await?),
    };
    Ok(Json(Envelope::new(meta, data)))
}

/// Raw `?page=&limit=` values.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    page: Option<String>,
    limit: Option<String>,
}

impl ListParams {
    /// `(limit, offset)` for the requested page. Empty values take defaults.
    fn window(&self) -> Result<(u32, u64), ApiError> {
        let page = parse_positive("page", self.page.as_deref(), DEFAULT_PAGE)?;
        let limit = parse_positive("limit", self.limit.as_deref(), DEFAULT_LIMIT)?;
        let offset = u64::from(page - 1) * u64::from(limit);
        Ok((limit, offset))
    }
}

fn parse_positive(name: &str, raw: Option<&str>, default: u32) -> Result<u32, ApiError> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(v) => v
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| ApiError::BadRequest(format!("{name} must be a positive integer"))),
    }
}

/// `GET /api/item/list?page=&limit=`
pub async fn list(
    Extension(server): Extension<Arc<VaultServer>>,
    user: AuthUser,
    params: Option<Query<ListParams>>,
) -> Result<Json<Vec<ItemMeta>>, ApiError> {
    let Query(params) = params.ok_or_else(|| ApiError::BadRequest("invalid query".into()))?;
    let (limit, offset) = params.window()?;
    let items = server
        .storage()
        .list_items(user.user_id, limit, offset)
        .await?;
    Ok(Json(items))
}

/// `DELETE /api/item/{key}`
pub async fn delete(
    Extension(server): Extension<Arc<VaultServer>>,
    user: AuthUser,
    Path(key): Path<String>,
) -> Result<StatusCode, ApiError> {
    server.storage().delete_item(user.user_id, &key).await?;
    Ok(StatusCode::OK)
}
