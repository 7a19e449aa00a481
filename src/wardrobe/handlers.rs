use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::auth::jwt::AuthUser;
use crate::error::{ApiError, Envelope, FieldError};
use crate::state::AppState;
use crate::wardrobe::dto::{CreateItemInput, ImageUpload, ItemResponse, UpdateItemInput};
use crate::wardrobe::repo::Item;
use crate::wardrobe::services;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/items", get(list_items).post(create_item))
        .route(
            "/items/:id",
            get(get_item).put(update_item).delete(delete_item),
        )
        // Uploads go through as raw bytes; 20MB leaves headroom over the
        // collaborator's own 5MB cap so its error wins, not a blunt 413.
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024))
}

#[instrument(skip(state))]
pub async fn list_items(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Envelope<Vec<ItemResponse>>>, ApiError> {
    let items = Item::list_by_user(&state.db, user_id).await?;
    let items = items.into_iter().map(ItemResponse::from).collect();
    Ok(Json(Envelope::data(items)))
}

#[instrument(skip(state))]
pub async fn get_item(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Envelope<ItemResponse>>, ApiError> {
    let item = Item::find(&state.db, user_id, id)
        .await?
        .ok_or(ApiError::ItemNotFound)?;
    Ok(Json(Envelope::data(ItemResponse::from(item))))
}

#[instrument(skip(state, multipart))]
pub async fn create_item(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Envelope<ItemResponse>>), ApiError> {
    let form = read_item_form(multipart).await?;
    let Some(image) = form.image else {
        return Err(ApiError::Validation(vec![FieldError::new(
            "image",
            "An image file is required",
        )]));
    };

    let item = services::create_item(
        &state,
        user_id,
        CreateItemInput {
            image,
            item_name: form.item_name,
            season: form.season,
        },
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(Envelope::data(ItemResponse::from(item))),
    ))
}

#[instrument(skip(state, multipart))]
pub async fn update_item(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<Envelope<ItemResponse>>, ApiError> {
    let form = read_item_form(multipart).await?;
    let item = services::update_item(
        &state,
        user_id,
        id,
        UpdateItemInput {
            image: form.image,
            item_name: form.item_name,
            season: form.season,
        },
    )
    .await?;
    Ok(Json(Envelope::data(ItemResponse::from(item))))
}

#[instrument(skip(state))]
pub async fn delete_item(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Envelope<()>>, ApiError> {
    services::delete_item(&state, user_id, id).await?;
    Ok(Json(Envelope::message("Item deleted successfully")))
}

#[derive(Debug, Default)]
struct ItemForm {
    image: Option<ImageUpload>,
    item_name: Option<String>,
    season: Option<String>,
}

/// Normalize the multipart body into a plain structure; nothing past this
/// point sees raw request parts.
async fn read_item_form(mut multipart: Multipart) -> Result<ItemForm, ApiError> {
    let mut form = ItemForm::default();
    while let Some(field) = multipart.next_field().await.map_err(malformed_body)? {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("image") => {
                let file_name = field
                    .file_name()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "upload".into());
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "application/octet-stream".into());
                let body = field.bytes().await.map_err(malformed_body)?;
                // An empty file part means no replacement was selected.
                if !body.is_empty() {
                    form.image = Some(ImageUpload {
                        file_name,
                        content_type,
                        body,
                    });
                }
            }
            Some("item_name") => {
                form.item_name = Some(field.text().await.map_err(malformed_body)?);
            }
            Some("season") => {
                form.season = Some(field.text().await.map_err(malformed_body)?);
            }
            _ => {}
        }
    }
    Ok(form)
}

fn malformed_body(e: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::Validation(vec![FieldError::new(
        "body",
        format!("Malformed multipart body: {e}"),
    )])
}
