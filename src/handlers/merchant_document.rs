use axum::{extract::{State, Path}, Json, Extension};
use axum::http::StatusCode;
use crate::state::AppState;
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::dtos::merchant::{CreateDocumentRequest, DocumentResponse};
use crate::models::merchant::MerchantDocumentRow;
use super::merchant::ensure_merchant_exists;

fn to_response(d: MerchantDocumentRow) -> DocumentResponse {
    DocumentResponse {
        id: d.id,
        merchant_id: d.merchant_id,
        title: d.title,
        doc_type: d.doc_type,
        file_url: d.file_url,
        uploaded_by: d.uploaded_by,
        uploaded_at: d.uploaded_at,
    }
}

pub async fn list_documents(
    State(AppState { db_pool }): State<AppState>,
    Path(merchant_id): Path<i64>,
) -> Result<Json<Vec<DocumentResponse>>, AppError> {
    ensure_merchant_exists(&db_pool, merchant_id).await?;

    let documents = sqlx::query_as::<_, MerchantDocumentRow>(
        r#"SELECT id, merchant_id, title, doc_type, file_url, uploaded_by, uploaded_at
           FROM merchant_documents
           WHERE merchant_id = $1
           ORDER BY uploaded_at DESC, id DESC"#,
    )
    .bind(merchant_id)
    .fetch_all(&db_pool)
    .await?;

    Ok(Json(documents.into_iter().map(to_response).collect()))
}

pub async fn create_document(
    State(AppState { db_pool }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(merchant_id): Path<i64>,
    Json(req): Json<CreateDocumentRequest>,
) -> Result<(StatusCode, Json<DocumentResponse>), AppError> {
    if !auth.is_manager() {
        return Err(AppError::forbidden("Only managers can add merchant documents"));
    }
    if req.title.trim().is_empty() {
        return Err(AppError::validation("Document title is required"));
    }
    if req.file_url.trim().is_empty() {
        return Err(AppError::validation("Document file_url is required"));
    }
    ensure_merchant_exists(&db_pool, merchant_id).await?;

    let document = sqlx::query_as::<_, MerchantDocumentRow>(
        r#"INSERT INTO merchant_documents (merchant_id, title, doc_type, file_url, uploaded_by)
           VALUES ($1, $2, $3, $4, $5)
           RETURNING id, merchant_id, title, doc_type, file_url, uploaded_by, uploaded_at"#,
    )
    .bind(merchant_id)
    .bind(req.title.trim())
    .bind(req.doc_type)
    .bind(req.file_url.trim())
    .bind(auth.user_id)
    .fetch_one(&db_pool)
    .await?;

    Ok((StatusCode::CREATED, Json(to_response(document))))
}

pub async fn delete_document(
    State(AppState { db_pool }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((merchant_id, document_id)): Path<(i64, i64)>,
) -> Result<StatusCode, AppError> {
    if !auth.is_manager() {
        return Err(AppError::forbidden("Only managers can delete merchant documents"));
    }

    let result = sqlx::query("DELETE FROM merchant_documents WHERE id = $2 AND merchant_id = $1")
        .bind(merchant_id)
        .bind(document_id)
        .execute(&db_pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Document not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}
