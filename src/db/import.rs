//! Bulk product import from a CSV export.
//!
//! Expected layout: a header row, then `id,name,price` per line. The `id`
//! column is ignored; rows get fresh ids and no owner.
//!
//! Records are split on line breaks before fields are parsed, so a quoted
//! field may contain commas and `""` escapes but not a newline.

use sqlx::SqlitePool;
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: expected at least 3 columns, found {found}")]
    MissingColumns { line: usize, found: usize },

    #[error("line {line}: invalid price {value:?}")]
    InvalidPrice { line: usize, value: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A parsed `(name, price)` row
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRow {
    pub name: String,
    pub price: f64,
}

/// Split one CSV line, honouring double-quoted fields and `""` escapes.
fn split_record(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

/// Parse the CSV body, skipping the header and blank lines.
pub fn parse_rows(content: &str) -> Result<Vec<ImportRow>, ImportError> {
    let mut rows = Vec::new();

    for (index, line) in content.lines().enumerate().skip(1) {
        let line_no = index + 1;
        if line.trim().is_empty() {
            continue;
        }

        let fields = split_record(line.trim_end_matches('\r'));
        if fields.len() < 3 {
            return Err(ImportError::MissingColumns {
                line: line_no,
                found: fields.len(),
            });
        }

        let raw_price = fields[2].trim();
        let price = raw_price
            .parse::<f64>()
            .map_err(|_| ImportError::InvalidPrice {
                line: line_no,
                value: raw_price.to_string(),
            })?;

        rows.push(ImportRow {
            name: fields[1].trim().to_string(),
            price,
        });
    }

    Ok(rows)
}

/// Import every row of `path` into `products` inside one transaction.
pub async fn import_products_csv(db: &SqlitePool, path: &Path) -> Result<usize, ImportError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ImportError::Read {
            path: path.display().to_string(),
            source,
        })?;

    let rows = parse_rows(&content)?;
    info!(path = %path.display(), rows = rows.len(), "Importing products");

    let mut tx = db.begin().await?;
    for row in &rows {
        sqlx::query("INSERT INTO products (name, price) VALUES (?, ?)")
            .bind(&row.name)
            .bind(row.price)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    Ok(rows.len())
}
