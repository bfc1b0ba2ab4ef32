//! Route paths and header names shared by server and client.

/// Header carrying the signed bearer token on requests and auth responses.
pub const AUTH_HEADER: &str = "X-Auth-Token";

/// Registration endpoint.
pub const REGISTER_PATH: &str = "/api/user/register";

/// Login endpoint.
pub const LOGIN_PATH: &str = "/api/user/login";

/// Item listing endpoint (`?page=&limit=`).
pub const LIST_PATH: &str = "/api/item/list";

/// Default page for item listing.
pub const DEFAULT_PAGE: u32 = 1;

/// Default page size for item listing.
pub const DEFAULT_LIMIT: u32 = 10;

/// Multipart field name of the metadata part of a binary upload.
pub const METADATA_PART: &str = "item";

/// Multipart field name of the payload part of a binary upload.
pub const PAYLOAD_PART: &str = "data";

/// Path of the create/update endpoint for an item kind.
pub fn kind_path(kind: crate::ItemKind) -> String {
    format!("/api/item/{}", kind.as_str())
}

/// Leading path segments of every item route.
pub const ITEM_SEGMENTS: [&str; 2] = ["api", "item"];

/// Trailing segment of the raw download route, `/api/item/binary/{key}/download`.
pub const DOWNLOAD_SEGMENT: &str = "download";
