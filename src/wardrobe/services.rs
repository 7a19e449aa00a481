//! Write orchestration for items: each create/update couples one call to
//! the image processing collaborator with one durable write, and unwinds
//! (or deliberately tolerates) partial failure.

use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::imaging::DeleteScope;
use crate::state::AppState;
use crate::wardrobe::dto::{CreateItemInput, UpdateItemInput};
use crate::wardrobe::repo::{Item, Season};

const DEFAULT_ITEM_NAME: &str = "Untitled";

fn normalize_name(name: Option<String>) -> String {
    match name {
        Some(n) if !n.trim().is_empty() => n.trim().to_string(),
        _ => DEFAULT_ITEM_NAME.to_string(),
    }
}

/// Create an item. The transformation call happens first; nothing is
/// persisted unless it fully succeeds, so a collaborator failure leaves no
/// partial record behind.
pub async fn create_item(
    state: &AppState,
    user_id: Uuid,
    input: CreateItemInput,
) -> Result<Item, ApiError> {
    let item_name = normalize_name(input.item_name);
    let season = Season::parse(input.season.as_deref());

    let image = state
        .imaging
        .process(
            &input.image.file_name,
            &input.image.content_type,
            input.image.body,
        )
        .await?;

    let item = Item::insert(&state.db, user_id, &item_name, season, &image).await?;
    info!(user_id = %user_id, item_id = %item.id, "item created");
    Ok(item)
}

/// Update an item. Metadata changes apply without touching the collaborator.
/// A replacement image first deletes the previous artifact pair
/// (best-effort: cleanup failure must not block the update) and then runs a
/// new transformation. If that transformation fails the record is left
/// untouched, still pointing at its previous artifact fields, and the error
/// is surfaced.
pub async fn update_item(
    state: &AppState,
    user_id: Uuid,
    item_id: Uuid,
    input: UpdateItemInput,
) -> Result<Item, ApiError> {
    let existing = Item::find(&state.db, user_id, item_id)
        .await?
        .ok_or(ApiError::ItemNotFound)?;

    let item_name = input
        .item_name
        .map(|n| normalize_name(Some(n)))
        .unwrap_or_else(|| existing.item_name.clone());
    let season = match input.season.as_deref() {
        Some(s) => Season::parse(Some(s)),
        None => Season::parse(Some(&existing.season)),
    };

    let mut replacement = None;
    if let Some(upload) = input.image {
        if let Some(old_file) = &existing.file_name {
            if let Err(e) = state.imaging.delete(old_file, DeleteScope::Both).await {
                warn!(item_id = %item_id, error = %e, "old artifact cleanup failed; continuing");
            }
        }
        let image = state
            .imaging
            .process(&upload.file_name, &upload.content_type, upload.body)
            .await?;
        replacement = Some(image);
    }

    let updated = Item::update(
        &state.db,
        user_id,
        item_id,
        &item_name,
        season,
        replacement.as_ref(),
    )
    .await?
    .ok_or(ApiError::ItemNotFound)?;

    info!(user_id = %user_id, item_id = %item_id, replaced_image = replacement.is_some(), "item updated");
    Ok(updated)
}

/// Delete an item. Artifact deletion at the collaborator is best-effort:
/// transient storage unavailability must never trap the local record.
pub async fn delete_item(state: &AppState, user_id: Uuid, item_id: Uuid) -> Result<(), ApiError> {
    let existing = Item::find(&state.db, user_id, item_id)
        .await?
        .ok_or(ApiError::ItemNotFound)?;

    if let Some(file_name) = &existing.file_name {
        if let Err(e) = state.imaging.delete(file_name, DeleteScope::Both).await {
            warn!(item_id = %item_id, error = %e, "artifact delete failed; deleting record anyway");
        }
    }

    if !Item::delete(&state.db, user_id, item_id).await? {
        return Err(ApiError::ItemNotFound);
    }
    info!(user_id = %user_id, item_id = %item_id, "item deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use bytes::Bytes;

    use super::*;
    use crate::imaging::{ImageProcessor, ImagingError, ProcessedImage};
    use crate::wardrobe::dto::ImageUpload;

    /// Collaborator that always reports a logical failure.
    struct RejectingImaging;
    #[async_trait]
    impl ImageProcessor for RejectingImaging {
        async fn process(
            &self,
            _f: &str,
            _c: &str,
            _b: Bytes,
        ) -> Result<ProcessedImage, ImagingError> {
            Err(ImagingError::Failed {
                code: "INVALID_FILE_TYPE".into(),
                message: "Invalid file type".into(),
            })
        }
        async fn delete(&self, _f: &str, _s: DeleteScope) -> Result<(), ImagingError> {
            Ok(())
        }
        async fn health(&self) -> Result<serde_json::Value, ImagingError> {
            Ok(serde_json::json!({"status": "healthy"}))
        }
    }

    /// Collaborator that cannot be reached at all.
    struct UnreachableImaging;
    #[async_trait]
    impl ImageProcessor for UnreachableImaging {
        async fn process(
            &self,
            _f: &str,
            _c: &str,
            _b: Bytes,
        ) -> Result<ProcessedImage, ImagingError> {
            Err(ImagingError::Unavailable("connection refused".into()))
        }
        async fn delete(&self, _f: &str, _s: DeleteScope) -> Result<(), ImagingError> {
            Err(ImagingError::Unavailable("connection refused".into()))
        }
        async fn health(&self) -> Result<serde_json::Value, ImagingError> {
            Err(ImagingError::Unavailable("connection refused".into()))
        }
    }

    fn state_with(imaging: Arc<dyn ImageProcessor>) -> AppState {
        let base = AppState::fake();
        AppState::from_parts(base.db, base.config, imaging)
    }

    fn upload() -> ImageUpload {
        ImageUpload {
            file_name: "shirt.jpg".into(),
            content_type: "image/jpeg".into(),
            body: Bytes::from_static(b"not really a jpeg"),
        }
    }

    // The pool in these states connects lazily, so reaching the database
    // would fail the test. A collaborator failure must short-circuit before
    // any persistence is attempted.

    #[tokio::test]
    async fn create_persists_nothing_when_processing_is_rejected() {
        let state = state_with(Arc::new(RejectingImaging));
        let result = create_item(
            &state,
            Uuid::new_v4(),
            CreateItemInput {
                image: upload(),
                item_name: Some("Shirt".into()),
                season: Some("Summer".into()),
            },
        )
        .await;
        match result {
            Err(ApiError::ProcessingFailed { code, .. }) => {
                assert_eq!(code, "INVALID_FILE_TYPE");
            }
            other => panic!("expected ProcessingFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn create_persists_nothing_when_collaborator_is_unreachable() {
        let state = state_with(Arc::new(UnreachableImaging));
        let result = create_item(
            &state,
            Uuid::new_v4(),
            CreateItemInput {
                image: upload(),
                item_name: None,
                season: None,
            },
        )
        .await;
        assert!(matches!(result, Err(ApiError::CollaboratorUnavailable(_))));
    }

    #[test]
    fn missing_or_blank_name_defaults_to_untitled() {
        assert_eq!(normalize_name(None), "Untitled");
        assert_eq!(normalize_name(Some("  ".into())), "Untitled");
        assert_eq!(normalize_name(Some(" Blue Shirt ".into())), "Blue Shirt");
    }
}
