//! HTTP handlers for the books module.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use bookshelf_http::AppError;
use serde_json::Value;

use super::models::{Book, BookListResponse, BookResponse, MessageResponse};
use super::repository::{BookRepository, BookStoreError};
use super::schema;

const INVALID_PAYLOAD: &str = "invalid book payload";

impl From<BookStoreError> for AppError {
    fn from(err: BookStoreError) -> Self {
        match err {
            BookStoreError::NotFound(_) => AppError::not_found(err.to_string()),
            BookStoreError::Conflict(_) => AppError::conflict(err.to_string()),
            BookStoreError::Database(e) => {
                AppError::Internal(anyhow::Error::new(e).context("book store query failed"))
            }
        }
    }
}

/// Routes relative to the module mount point
pub fn router(repo: BookRepository) -> Router {
    Router::new()
        .route("/", get(list_books).post(create_book))
        .route("/health", get(health_check))
        .route(
            "/{isbn}",
            get(get_book).put(update_book).delete(delete_book),
        )
        .with_state(repo)
}

async fn health_check() -> &'static str {
    "books module is healthy"
}

async fn list_books(State(repo): State<BookRepository>) -> Result<Json<BookListResponse>, AppError> {
    let books = repo.list_all().await?;
    Ok(Json(BookListResponse { books }))
}

async fn get_book(
    State(repo): State<BookRepository>,
    Path(isbn): Path<String>,
) -> Result<Json<BookResponse>, AppError> {
    let book = repo.get_by_isbn(&isbn).await?;
    Ok(Json(BookResponse { book }))
}

async fn create_book(
    State(repo): State<BookRepository>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<BookResponse>), AppError> {
    let book = validated_book(payload)?;
    let book = repo.create(&book).await?;

    tracing::info!(isbn = %book.isbn, "book created");
    Ok((StatusCode::CREATED, Json(BookResponse { book })))
}

async fn update_book(
    State(repo): State<BookRepository>,
    Path(isbn): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<BookResponse>, AppError> {
    let book = validated_book(payload)?;

    if book.isbn != isbn {
        return Err(AppError::validation(
            vec![format!(
                "isbn '{}' does not match the isbn in the path '{}'",
                book.isbn, isbn
            )],
            INVALID_PAYLOAD,
        ));
    }

    let book = repo.update_by_isbn(&isbn, &book).await?;

    tracing::info!(isbn = %book.isbn, "book updated");
    Ok(Json(BookResponse { book }))
}

async fn delete_book(
    State(repo): State<BookRepository>,
    Path(isbn): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    repo.delete_by_isbn(&isbn).await?;

    tracing::info!(isbn = %isbn, "book deleted");
    Ok(Json(MessageResponse {
        message: "Book deleted".to_string(),
    }))
}

/// Unwrap the JSON body and run it through the book schema
fn validated_book(payload: Result<Json<Value>, JsonRejection>) -> Result<Book, AppError> {
    let Json(payload) = payload.map_err(|rejection| {
        let message = rejection.body_text();
        match rejection {
            JsonRejection::BytesRejection(bytes) if bytes.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                AppError::payload_too_large(message)
            }
            _ => AppError::bad_request(message),
        }
    })?;
    schema::validate_book(&payload).map_err(|details| AppError::validation(details, INVALID_PAYLOAD))
}
