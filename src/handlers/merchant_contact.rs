use axum::{extract::{State, Path}, Json, Extension};
use axum::http::StatusCode;
use crate::state::AppState;
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::dtos::merchant::{ContactResponse, CreateContactRequest, UpdateContactRequest};
use crate::models::merchant::MerchantContactRow;
use super::merchant::ensure_merchant_exists;

fn to_response(c: MerchantContactRow) -> ContactResponse {
    ContactResponse {
        id: c.id,
        merchant_id: c.merchant_id,
        name: c.name,
        role_title: c.role_title,
        email: c.email,
        phone: c.phone,
        is_primary: c.is_primary,
        created_at: c.created_at,
    }
}

pub async fn list_contacts(
    State(AppState { db_pool }): State<AppState>,
    Path(merchant_id): Path<i64>,
) -> Result<Json<Vec<ContactResponse>>, AppError> {
    ensure_merchant_exists(&db_pool, merchant_id).await?;

    let contacts = sqlx::query_as::<_, MerchantContactRow>(
        r#"SELECT id, merchant_id, name, role_title, email, phone, is_primary, created_at
           FROM merchant_contacts
           WHERE merchant_id = $1
           ORDER BY is_primary DESC, name ASC"#,
    )
    .bind(merchant_id)
    .fetch_all(&db_pool)
    .await?;

    Ok(Json(contacts.into_iter().map(to_response).collect()))
}

pub async fn create_contact(
    State(AppState { db_pool }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(merchant_id): Path<i64>,
    Json(req): Json<CreateContactRequest>,
) -> Result<(StatusCode, Json<ContactResponse>), AppError> {
    if !auth.is_manager() {
        return Err(AppError::forbidden("Only managers can add merchant contacts"));
    }
    if req.name.trim().is_empty() {
        return Err(AppError::validation("Contact name is required"));
    }
    ensure_merchant_exists(&db_pool, merchant_id).await?;

    let contact = sqlx::query_as::<_, MerchantContactRow>(
        r#"INSERT INTO merchant_contacts (merchant_id, name, role_title, email, phone, is_primary)
           VALUES ($1, $2, $3, $4, $5, $6)
           RETURNING id, merchant_id, name, role_title, email, phone, is_primary, created_at"#,
    )
    .bind(merchant_id)
    .bind(req.name.trim())
    .bind(req.role_title)
    .bind(req.email)
    .bind(req.phone)
    .bind(req.is_primary)
    .fetch_one(&db_pool)
    .await?;

    Ok((StatusCode::CREATED, Json(to_response(contact))))
}

pub async fn update_contact(
    State(AppState { db_pool }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((merchant_id, contact_id)): Path<(i64, i64)>,
    Json(req): Json<UpdateContactRequest>,
) -> Result<Json<ContactResponse>, AppError> {
    if !auth.is_manager() {
        return Err(AppError::forbidden("Only managers can update merchant contacts"));
    }

    let contact = sqlx::query_as::<_, MerchantContactRow>(
        r#"UPDATE merchant_contacts SET
              name = COALESCE($3, name),
              role_title = COALESCE($4, role_title),
              email = COALESCE($5, email),
              phone = COALESCE($6, phone),
              is_primary = COALESCE($7, is_primary)
           WHERE id = $2 AND merchant_id = $1
           RETURNING id, merchant_id, name, role_title, email, phone, is_primary, created_at"#,
    )
    .bind(merchant_id)
    .bind(contact_id)
    .bind(req.name.as_deref().map(str::trim))
    .bind(req.role_title)
    .bind(req.email)
    .bind(req.phone)
    .bind(req.is_primary)
    .fetch_optional(&db_pool)
    .await?
    .ok_or_else(|| AppError::not_found("Contact not found"))?;

    Ok(Json(to_response(contact)))
}

pub async fn delete_contact(
    State(AppState { db_pool }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((merchant_id, contact_id)): Path<(i64, i64)>,
) -> Result<StatusCode, AppError> {
    if !auth.is_manager() {
        return Err(AppError::forbidden("Only managers can delete merchant contacts"));
    }

    let result = sqlx::query("DELETE FROM merchant_contacts WHERE id = $2 AND merchant_id = $1")
        .bind(merchant_id)
        .bind(contact_id)
        .execute(&db_pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Contact not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}
