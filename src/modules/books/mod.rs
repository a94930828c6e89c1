pub mod models;
pub mod repository;
pub mod routes;
pub mod schema;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use bookshelf_kernel::{InitCtx, Migration, Module};
use sqlx::SqlitePool;

use repository::BookRepository;

/// DDL for the `books` table
pub const BOOKS_TABLE_DDL: &str = r#"
    CREATE TABLE IF NOT EXISTS books (
        isbn        TEXT PRIMARY KEY,
        amazon_url  TEXT NOT NULL,
        author      TEXT NOT NULL,
        language    TEXT NOT NULL,
        pages       INTEGER NOT NULL,
        publisher   TEXT NOT NULL,
        title       TEXT NOT NULL,
        year        INTEGER NOT NULL
    );
"#;

/// Book catalogue keyed by ISBN
pub struct BooksModule {
    repo: BookRepository,
}

impl BooksModule {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            repo: BookRepository::new(pool),
        }
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(self.repo.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(openapi_fragment())
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "001_books",
            up: BOOKS_TABLE_DDL,
        }]
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

/// Create a new instance of the books module over `pool`
pub fn create_module(pool: SqlitePool) -> Arc<dyn Module> {
    Arc::new(BooksModule::new(pool))
}

fn error_response(description: &str) -> serde_json::Value {
    serde_json::json!({
        "description": description,
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/ErrorResponse" }
            }
        }
    })
}

fn json_response(description: &str, schema: &serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "description": description,
        "content": {
            "application/json": { "schema": schema }
        }
    })
}

fn openapi_fragment() -> serde_json::Value {
    let book_ref = serde_json::json!({ "$ref": "#/components/schemas/Book" });
    let book_body = serde_json::json!({
        "required": true,
        "content": {
            "application/json": { "schema": book_ref }
        }
    });
    let single_book = serde_json::json!({
        "type": "object",
        "properties": { "book": book_ref },
        "required": ["book"]
    });
    let isbn_param = serde_json::json!([{
        "name": "isbn",
        "in": "path",
        "required": true,
        "schema": { "type": "string" }
    }]);

    serde_json::json!({
        "paths": {
            "/": {
                "get": {
                    "summary": "List books, newest year first",
                    "tags": ["Books"],
                    "responses": {
                        "200": json_response("List of books", &serde_json::json!({
                            "type": "object",
                            "properties": {
                                "books": { "type": "array", "items": book_ref }
                            },
                            "required": ["books"]
                        })),
                        "500": error_response("Internal server error")
                    }
                },
                "post": {
                    "summary": "Create a book",
                    "tags": ["Books"],
                    "requestBody": book_body,
                    "responses": {
                        "201": json_response("Created book", &single_book),
                        "400": error_response("Invalid payload"),
                        "409": error_response("ISBN already exists"),
                        "500": error_response("Internal server error")
                    }
                }
            },
            "/{isbn}": {
                "get": {
                    "summary": "Get a book by ISBN",
                    "tags": ["Books"],
                    "parameters": isbn_param,
                    "responses": {
                        "200": json_response("The book", &single_book),
                        "404": error_response("Unknown ISBN"),
                        "500": error_response("Internal server error")
                    }
                },
                "put": {
                    "summary": "Replace a book",
                    "tags": ["Books"],
                    "parameters": isbn_param,
                    "requestBody": book_body,
                    "responses": {
                        "200": json_response("Updated book", &single_book),
                        "400": error_response("Invalid payload"),
                        "404": error_response("Unknown ISBN"),
                        "500": error_response("Internal server error")
                    }
                },
                "delete": {
                    "summary": "Delete a book",
                    "tags": ["Books"],
                    "parameters": isbn_param,
                    "responses": {
                        "200": json_response("Deletion confirmation", &serde_json::json!({
                            "type": "object",
                            "properties": { "message": { "type": "string" } },
                            "required": ["message"]
                        })),
                        "404": error_response("Unknown ISBN"),
                        "500": error_response("Internal server error")
                    }
                }
            },
            "/health": {
                "get": {
                    "summary": "Books health check",
                    "tags": ["Books"],
                    "responses": {
                        "200": {
                            "description": "OK",
                            "content": {
                                "text/plain": { "schema": { "type": "string" } }
                            }
                        }
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "Book": {
                    "type": "object",
                    "properties": {
                        "isbn": { "type": "string", "description": "Unique identifier for the book" },
                        "amazon_url": { "type": "string", "format": "uri" },
                        "author": { "type": "string" },
                        "language": { "type": "string" },
                        "pages": { "type": "integer", "minimum": 1 },
                        "publisher": { "type": "string" },
                        "title": { "type": "string" },
                        "year": { "type": "integer" }
                    },
                    "required": [
                        "isbn", "amazon_url", "author", "language",
                        "pages", "publisher", "title", "year"
                    ],
                    "additionalProperties": false
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_covers_every_endpoint() {
        let spec = openapi_fragment();
        for method in ["get", "post"] {
            assert!(spec["paths"]["/"][method].is_object(), "missing {method} /");
        }
        for method in ["get", "put", "delete"] {
            assert!(spec["paths"]["/{isbn}"][method].is_object(), "missing {method} /{{isbn}}");
        }
        assert_eq!(spec["components"]["schemas"]["Book"]["required"].as_array().unwrap().len(), 8);
    }
}
