use sqlx::SqlitePool;
use thiserror::Error;

use super::models::Book;

const BOOK_COLUMNS: &str = "isbn, amazon_url, author, language, pages, publisher, title, year";

/// Failures of the book accessor
#[derive(Debug, Error)]
pub enum BookStoreError {
    #[error("There is no book with an isbn '{0}")]
    NotFound(String),

    #[error("A book with isbn '{0}' already exists")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type BookStoreResult<T> = Result<T, BookStoreError>;

/// Reads and writes rows of the `books` table.
///
/// Every operation is a single statement running in its own implicit
/// transaction.
#[derive(Clone)]
pub struct BookRepository {
    pool: SqlitePool,
}

impl BookRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, book: &Book) -> BookStoreResult<Book> {
        let sql = format!(
            "INSERT INTO books ({BOOK_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING {BOOK_COLUMNS}"
        );

        let created = sqlx::query_as::<_, Book>(&sql)
            .bind(&book.isbn)
            .bind(&book.amazon_url)
            .bind(&book.author)
            .bind(&book.language)
            .bind(book.pages)
            .bind(&book.publisher)
            .bind(&book.title)
            .bind(book.year)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                    BookStoreError::Conflict(book.isbn.clone())
                }
                other => BookStoreError::Database(other),
            })?;

        tracing::debug!(isbn = %created.isbn, "book created");
        Ok(created)
    }

    pub async fn get_by_isbn(&self, isbn: &str) -> BookStoreResult<Book> {
        let sql = format!("SELECT {BOOK_COLUMNS} FROM books WHERE isbn = ?");

        sqlx::query_as::<_, Book>(&sql)
            .bind(isbn)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| BookStoreError::NotFound(isbn.to_string()))
    }

    /// All books, newest publication year first.
    pub async fn list_all(&self) -> BookStoreResult<Vec<Book>> {
        let sql = format!("SELECT {BOOK_COLUMNS} FROM books ORDER BY year DESC, isbn ASC");

        let books = sqlx::query_as::<_, Book>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(books)
    }

    /// Replace every non-key column of the row keyed by `isbn`.
    pub async fn update_by_isbn(&self, isbn: &str, book: &Book) -> BookStoreResult<Book> {
        let sql = format!(
            "UPDATE books \
             SET amazon_url = ?, author = ?, language = ?, pages = ?, publisher = ?, title = ?, year = ? \
             WHERE isbn = ? \
             RETURNING {BOOK_COLUMNS}"
        );

        let updated = sqlx::query_as::<_, Book>(&sql)
            .bind(&book.amazon_url)
            .bind(&book.author)
            .bind(&book.language)
            .bind(book.pages)
            .bind(&book.publisher)
            .bind(&book.title)
            .bind(book.year)
            .bind(isbn)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| BookStoreError::NotFound(isbn.to_string()))?;

        tracing::debug!(isbn = %updated.isbn, "book updated");
        Ok(updated)
    }

    pub async fn delete_by_isbn(&self, isbn: &str) -> BookStoreResult<()> {
        let result = sqlx::query("DELETE FROM books WHERE isbn = ?")
            .bind(isbn)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(BookStoreError::NotFound(isbn.to_string()));
        }

        tracing::debug!(isbn = %isbn, "book deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::books::BOOKS_TABLE_DDL;
    use bookshelf_kernel::settings::DatabaseSettings;

    async fn repository() -> BookRepository {
        let pool = bookshelf_db::connect(&DatabaseSettings::in_memory())
            .await
            .unwrap();
        sqlx::raw_sql(BOOKS_TABLE_DDL).execute(&pool).await.unwrap();
        BookRepository::new(pool)
    }

    fn book(isbn: &str, year: i32) -> Book {
        Book {
            isbn: isbn.to_string(),
            amazon_url: "http://a.co/eobPtX2".to_string(),
            author: "Matthew Lane".to_string(),
            language: "english".to_string(),
            pages: 264,
            publisher: "Princeton University Press".to_string(),
            title: format!("Book {}", isbn),
            year,
        }
    }

    #[tokio::test]
    async fn create_then_get_returns_same_record() {
        let repo = repository().await;
        let created = repo.create(&book("0691161518", 2017)).await.unwrap();
        assert_eq!(created, book("0691161518", 2017));

        let fetched = repo.get_by_isbn("0691161518").await.unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn duplicate_isbn_is_a_conflict() {
        let repo = repository().await;
        repo.create(&book("0691161518", 2017)).await.unwrap();

        let err = repo.create(&book("0691161518", 2020)).await.unwrap_err();
        assert!(matches!(err, BookStoreError::Conflict(ref isbn) if isbn == "0691161518"));
    }

    #[tokio::test]
    async fn list_orders_by_year_descending() {
        let repo = repository().await;
        repo.create(&book("a", 2012)).await.unwrap();
        repo.create(&book("b", 2017)).await.unwrap();
        repo.create(&book("c", 2015)).await.unwrap();

        let isbns: Vec<String> = repo
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.isbn)
            .collect();
        assert_eq!(isbns, vec!["b", "c", "a"]);
    }

    #[tokio::test]
    async fn update_replaces_fields() {
        let repo = repository().await;
        repo.create(&book("0691161518", 2017)).await.unwrap();

        let mut changed = book("0691161518", 2015);
        changed.author = "Yuval Noah Harari".to_string();
        changed.pages = 512;

        let updated = repo.update_by_isbn("0691161518", &changed).await.unwrap();
        assert_eq!(updated, changed);
        assert_eq!(repo.get_by_isbn("0691161518").await.unwrap(), changed);
    }

    #[tokio::test]
    async fn missing_rows_are_not_found() {
        let repo = repository().await;

        let err = repo.get_by_isbn("999").await.unwrap_err();
        assert_eq!(err.to_string(), "There is no book with an isbn '999");

        assert!(matches!(
            repo.update_by_isbn("999", &book("999", 2000)).await,
            Err(BookStoreError::NotFound(_))
        ));
        assert!(matches!(
            repo.delete_by_isbn("999").await,
            Err(BookStoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_removes_row() {
        let repo = repository().await;
        repo.create(&book("0691161518", 2017)).await.unwrap();

        repo.delete_by_isbn("0691161518").await.unwrap();
        assert!(matches!(
            repo.get_by_isbn("0691161518").await,
            Err(BookStoreError::NotFound(_))
        ));
    }
}
