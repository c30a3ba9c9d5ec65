use sqlx::SqlitePool;

pub async fn init_db(pool: &SqlitePool) -> anyhow::Result<()> {
    // Pragmas for better durability/performance
    if let Err(e) = sqlx::query("PRAGMA journal_mode=WAL;").execute(pool).await {
        tracing::warn!("Failed to set WAL journal mode: {}", e);
    }
    if let Err(e) = sqlx::query("PRAGMA synchronous=NORMAL;").execute(pool).await {
        tracing::warn!("Failed to set synchronous mode: {}", e);
    }
    // Foreign keys are critical - fail if this doesn't work
    sqlx::query("PRAGMA foreign_keys=ON;").execute(pool).await?;

    // Additional tuning (best-effort)
    if let Err(e) = sqlx::query("PRAGMA busy_timeout=10000;").execute(pool).await {
        tracing::warn!("Failed to set busy_timeout: {}", e);
    }
    if let Err(e) = sqlx::query("PRAGMA temp_store=MEMORY;").execute(pool).await {
        tracing::warn!("Failed to set temp_store: {}", e);
    }

    // users table
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'user' CHECK(role IN ('staff','user')),
            password_hash TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
        )"#,
    )
    .execute(pool)
    .await?;

    // tokens table (opaque bearer tokens, one row per active session)
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS tokens (
            token TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
        )"#,
    )
    .execute(pool)
    .await?;

    // books table
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS books (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            author TEXT NOT NULL,
            published_date TEXT NULL,
            genre TEXT NOT NULL DEFAULT '',
            isbn TEXT NULL UNIQUE,
            description TEXT NOT NULL DEFAULT '',
            language TEXT NOT NULL DEFAULT '',
            preview_image_url TEXT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
        )"#,
    )
    .execute(pool)
    .await?;

    // copies table (physical copies of a book at a location)
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS copies (
            id TEXT PRIMARY KEY,
            book_id TEXT NOT NULL,
            location TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            FOREIGN KEY(book_id) REFERENCES books(id) ON DELETE CASCADE
        )"#,
    )
    .execute(pool)
    .await?;

    // borrows table; a borrow is open while returned_at IS NULL
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS borrows (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            copy_id TEXT NOT NULL,
            borrow_date TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            returned_at TEXT NULL,
            FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY(copy_id) REFERENCES copies(id) ON DELETE CASCADE
        )"#,
    )
    .execute(pool)
    .await?;

    // reviews table
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS reviews (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            book_id TEXT NOT NULL,
            rating INTEGER NOT NULL CHECK(rating BETWEEN 1 AND 5),
            comment TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY(book_id) REFERENCES books(id) ON DELETE CASCADE
        )"#,
    )
    .execute(pool)
    .await?;

    // At most one open borrow per copy. The partial unique index is the hard
    // backstop behind the conditional insert in the borrows route, so two
    // concurrent borrow requests can never both commit.
    sqlx::query(
        r#"CREATE UNIQUE INDEX IF NOT EXISTS idx_borrows_copy_open
           ON borrows(copy_id) WHERE returned_at IS NULL"#,
    )
    .execute(pool)
    .await?;

    let indexes = [
        ("idx_tokens_user", "CREATE INDEX IF NOT EXISTS idx_tokens_user ON tokens(user_id)"),
        ("idx_copies_book", "CREATE INDEX IF NOT EXISTS idx_copies_book ON copies(book_id)"),
        ("idx_borrows_user", "CREATE INDEX IF NOT EXISTS idx_borrows_user ON borrows(user_id, borrow_date DESC)"),
        ("idx_borrows_copy", "CREATE INDEX IF NOT EXISTS idx_borrows_copy ON borrows(copy_id, borrow_date DESC)"),
        ("idx_reviews_book", "CREATE INDEX IF NOT EXISTS idx_reviews_book ON reviews(book_id)"),
        ("idx_reviews_user", "CREATE INDEX IF NOT EXISTS idx_reviews_user ON reviews(user_id)"),
        ("idx_books_title", "CREATE INDEX IF NOT EXISTS idx_books_title ON books(title)"),
    ];

    for (name, query) in indexes {
        if let Err(e) = sqlx::query(query).execute(pool).await {
            // Check if it's a "already exists" error
            match &e {
                sqlx::Error::Database(db_err) => {
                    let msg = db_err.message().to_lowercase();
                    if msg.contains("already exists") || msg.contains("duplicate") {
                        tracing::debug!("Index {} already exists, skipping", name);
                    } else {
                        tracing::warn!("Failed to create index {}: {}", name, e);
                    }
                }
                _ => {
                    tracing::warn!("Failed to create index {}: {}", name, e);
                }
            }
        }
    }

    Ok(())
}

/// Returns true when a database error represents a UNIQUE constraint violation
/// on the given column path (e.g. `users.username`).
pub fn is_unique_violation(err: &sqlx::Error, column: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = db_err.message();
            msg.contains("UNIQUE constraint failed") && msg.contains(column)
        }
        _ => false,
    }
}
