use bytes::Bytes;
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::wardrobe::repo::Item;

/// One uploaded image as extracted from the multipart body.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub body: Bytes,
}

/// Normalized create input. The boundary layer (multipart parsing) produces
/// this; the orchestration below never sees raw request bodies.
#[derive(Debug)]
pub struct CreateItemInput {
    pub image: ImageUpload,
    pub item_name: Option<String>,
    pub season: Option<String>,
}

/// Normalized update input; every field optional.
#[derive(Debug, Default)]
pub struct UpdateItemInput {
    pub image: Option<ImageUpload>,
    pub item_name: Option<String>,
    pub season: Option<String>,
}

/// Item as returned to the client (no owner id leak).
#[derive(Debug, Serialize)]
pub struct ItemResponse {
    pub id: Uuid,
    pub item_name: String,
    pub season: String,
    pub image_url: String,
    pub original_image_url: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<Item> for ItemResponse {
    fn from(item: Item) -> Self {
        Self {
            id: item.id,
            item_name: item.item_name,
            season: item.season,
            image_url: item.image_url,
            original_image_url: item.original_image_url,
            file_name: item.file_name,
            file_size: item.file_size,
            created_at: item.created_at,
            updated_at: item.updated_at,
        }
    }
}
