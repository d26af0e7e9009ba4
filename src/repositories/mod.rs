use sea_orm::{sea_query::LikeExpr, DatabaseConnection};
use std::sync::Arc;

pub mod category_repository;
pub mod flower_repository;
pub mod order_repository;

pub use category_repository::CategoryRepository;
pub use flower_repository::{FlowerFilter, FlowerRepository};
pub use order_repository::{OrderFilter, OrderRepository};

/// Repository trait for common database operations
pub trait Repository {
    fn get_db(&self) -> &DatabaseConnection;
}

#[derive(Debug, Clone)]
pub struct BaseRepository {
    db: Arc<DatabaseConnection>,
}

impl BaseRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl Repository for BaseRepository {
    fn get_db(&self) -> &DatabaseConnection {
        &self.db
    }
}

const LIKE_ESCAPE: char = '\\';

/// `%keyword%` pattern for matching against `lower(column)`.
pub(crate) fn like_pattern(keyword: &str) -> LikeExpr {
    LikeExpr::new(format!("%{}%", escape_like(keyword))).escape(LIKE_ESCAPE)
}

/// Escapes `%`, `_` and the escape character itself. Only ASCII letters are
/// folded: SQLite's `lower()` leaves other characters alone.
fn escape_like(keyword: &str) -> String {
    let mut escaped = String::with_capacity(keyword.len());
    for ch in keyword.trim().chars() {
        if matches!(ch, '%' | '_' | LIKE_ESCAPE) {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(ch.to_ascii_lowercase());
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_metacharacters_are_escaped() {
        assert_eq!(escape_like(" 50%_Off "), "50\\%\\_off");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
    }

    #[test]
    fn only_ascii_letters_are_folded() {
        assert_eq!(escape_like("Hoa HỒNG"), "hoa hỒng");
        assert_eq!(escape_like("hồng"), "hồng");
    }
}
