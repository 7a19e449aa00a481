use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::imaging::ProcessedImage;

/// Fixed category set for items. Anything unrecognised maps to `Untitled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Season {
    Spring,
    Summer,
    Fall,
    Winter,
    Untitled,
}

impl Season {
    pub fn as_str(&self) -> &'static str {
        match self {
            Season::Spring => "Spring",
            Season::Summer => "Summer",
            Season::Fall => "Fall",
            Season::Winter => "Winter",
            Season::Untitled => "Untitled",
        }
    }

    /// Case-insensitive parse; missing or invalid values default to
    /// `Untitled` rather than failing the request.
    pub fn parse(value: Option<&str>) -> Season {
        match value.map(|s| s.trim().to_lowercase()).as_deref() {
            Some("spring") => Season::Spring,
            Some("summer") => Season::Summer,
            Some("fall") => Season::Fall,
            Some("winter") => Season::Winter,
            _ => Season::Untitled,
        }
    }
}

/// A user-owned wardrobe item. The artifact columns (image_url,
/// original_image_url, file_name, file_size) are only ever written together
/// from a single transformation response.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Item {
    pub id: Uuid,
    pub user_id: Uuid,
    pub item_name: String,
    pub season: String,
    pub image_url: String,
    pub original_image_url: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

const ITEM_COLUMNS: &str = "id, user_id, item_name, season, image_url, original_image_url, \
     file_name, file_size, created_at, updated_at";

impl Item {
    pub async fn list_by_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<Item>> {
        let rows = sqlx::query_as::<_, Item>(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    /// Owner-filtered lookup: a foreign id and a missing id are
    /// indistinguishable to the caller.
    pub async fn find(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<Item>> {
        let row = sqlx::query_as::<_, Item>(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    pub async fn insert(
        db: &PgPool,
        user_id: Uuid,
        item_name: &str,
        season: Season,
        image: &ProcessedImage,
    ) -> anyhow::Result<Item> {
        let row = sqlx::query_as::<_, Item>(&format!(
            "INSERT INTO items (user_id, item_name, season, image_url, original_image_url, \
             file_name, file_size)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {ITEM_COLUMNS}"
        ))
        .bind(user_id)
        .bind(item_name)
        .bind(season.as_str())
        .bind(&image.processed_url)
        .bind(&image.original_url)
        .bind(&image.file_name)
        .bind(image.file_size)
        .fetch_one(db)
        .await?;
        Ok(row)
    }

    /// Write the new metadata and, when a replacement image was processed,
    /// all four artifact columns together. Last write wins; there is no
    /// version column.
    pub async fn update(
        db: &PgPool,
        user_id: Uuid,
        id: Uuid,
        item_name: &str,
        season: Season,
        image: Option<&ProcessedImage>,
    ) -> anyhow::Result<Option<Item>> {
        let row = match image {
            Some(image) => {
                sqlx::query_as::<_, Item>(&format!(
                    "UPDATE items
                     SET item_name = $3, season = $4, image_url = $5, original_image_url = $6,
                         file_name = $7, file_size = $8, updated_at = now()
                     WHERE id = $1 AND user_id = $2
                     RETURNING {ITEM_COLUMNS}"
                ))
                .bind(id)
                .bind(user_id)
                .bind(item_name)
                .bind(season.as_str())
                .bind(&image.processed_url)
                .bind(&image.original_url)
                .bind(&image.file_name)
                .bind(image.file_size)
                .fetch_optional(db)
                .await?
            }
            None => {
                sqlx::query_as::<_, Item>(&format!(
                    "UPDATE items
                     SET item_name = $3, season = $4, updated_at = now()
                     WHERE id = $1 AND user_id = $2
                     RETURNING {ITEM_COLUMNS}"
                ))
                .bind(id)
                .bind(user_id)
                .bind(item_name)
                .bind(season.as_str())
                .fetch_optional(db)
                .await?
            }
        };
        Ok(row)
    }

    pub async fn delete(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM items WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn season_parses_case_insensitively() {
        assert_eq!(Season::parse(Some("Spring")), Season::Spring);
        assert_eq!(Season::parse(Some("sUmMeR")), Season::Summer);
        assert_eq!(Season::parse(Some("FALL")), Season::Fall);
        assert_eq!(Season::parse(Some("winter")), Season::Winter);
        assert_eq!(Season::parse(Some(" spring ")), Season::Spring);
    }

    #[test]
    fn invalid_season_defaults_to_untitled() {
        assert_eq!(Season::parse(Some("sprummer")), Season::Untitled);
        assert_eq!(Season::parse(Some("")), Season::Untitled);
        assert_eq!(Season::parse(None), Season::Untitled);
    }

    #[test]
    fn season_round_trips_through_its_string_form() {
        for season in [
            Season::Spring,
            Season::Summer,
            Season::Fall,
            Season::Winter,
            Season::Untitled,
        ] {
            assert_eq!(Season::parse(Some(season.as_str())), season);
        }
    }
}
