use serde::{Deserialize, Serialize};

/// A book record, one row of the `books` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Book {
    /// ISBN, the primary key
    pub isbn: String,
    /// Link to the book's store page
    pub amazon_url: String,
    pub author: String,
    pub language: String,
    /// Page count, always positive
    pub pages: i32,
    pub publisher: String,
    pub title: String,
    /// Publication year
    pub year: i32,
}

/// `{"book": {...}}`
#[derive(Debug, Serialize, Deserialize)]
pub struct BookResponse {
    pub book: Book,
}

/// `{"books": [...]}`
#[derive(Debug, Serialize, Deserialize)]
pub struct BookListResponse {
    pub books: Vec<Book>,
}

/// `{"message": "..."}`
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}
