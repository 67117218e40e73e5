use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;

/// Whether money flows in or out. Shared by categories and journal entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Income,
    Expense,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Income => "income",
            EntryType::Expense => "expense",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "income" => Some(EntryType::Income),
            "expense" => Some(EntryType::Expense),
            _ => None,
        }
    }

    /// Parse a stored value. Unknown values fall back to expense.
    pub(super) fn from_stored(s: &str) -> Self {
        Self::from_str(s).unwrap_or(EntryType::Expense)
    }
}

#[derive(Clone)]
pub struct CategoryStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone)]
pub struct Category {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub entry_type: EntryType,
    pub description: String,
    pub color: String,
    pub icon: String,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: i64,
    user_id: i64,
    name: String,
    #[sqlx(rename = "type")]
    entry_type: String,
    description: String,
    color: String,
    icon: String,
    is_active: i32,
    created_at: String,
    updated_at: String,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            entry_type: EntryType::from_stored(&row.entry_type),
            description: row.description,
            color: row.color,
            icon: row.icon,
            is_active: row.is_active != 0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Fields for a new category.
#[derive(Debug, Clone)]
pub struct NewCategory<'a> {
    pub name: &'a str,
    pub entry_type: EntryType,
    pub description: &'a str,
    pub color: &'a str,
    pub icon: &'a str,
}

/// Partial category update. `None` leaves the column unchanged.
#[derive(Debug, Clone, Default)]
pub struct CategoryUpdate<'a> {
    pub name: Option<&'a str>,
    pub entry_type: Option<EntryType>,
    pub description: Option<&'a str>,
    pub color: Option<&'a str>,
    pub icon: Option<&'a str>,
    pub is_active: Option<bool>,
}

/// Optional list filters.
#[derive(Debug, Clone, Copy, Default)]
pub struct CategoryFilter {
    pub entry_type: Option<EntryType>,
    pub active: Option<bool>,
}

impl CategoryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a category for a user. Returns the category ID.
    pub async fn create(&self, user_id: i64, new: &NewCategory<'_>) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO finance_categories (user_id, name, type, description, color, icon)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(new.name)
        .bind(new.entry_type.as_str())
        .bind(new.description)
        .bind(new.color)
        .bind(new.icon)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Get a category by ID, scoped to its owner.
    pub async fn get_for_user(&self, id: i64, user_id: i64) -> Result<Option<Category>, sqlx::Error> {
        let row: Option<CategoryRow> = sqlx::query_as(
            "SELECT id, user_id, name, type, description, color, icon, is_active, created_at, updated_at
             FROM finance_categories WHERE id = ? AND user_id = ?",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Category::from))
    }

    /// List a user's categories ordered by name.
    pub async fn list_by_user(
        &self,
        user_id: i64,
        filter: CategoryFilter,
    ) -> Result<Vec<Category>, sqlx::Error> {
        let entry_type = filter.entry_type.map(|t| t.as_str());
        let active = filter.active.map(|a| a as i32);

        let rows: Vec<CategoryRow> = sqlx::query_as(
            "SELECT id, user_id, name, type, description, color, icon, is_active, created_at, updated_at
             FROM finance_categories
             WHERE user_id = ?
               AND (? IS NULL OR type = ?)
               AND (? IS NULL OR is_active = ?)
             ORDER BY name ASC, id ASC",
        )
        .bind(user_id)
        .bind(entry_type)
        .bind(entry_type)
        .bind(active)
        .bind(active)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Category::from).collect())
    }

    /// Apply a partial update to a user's category.
    /// Returns false if the category does not exist for this user.
    pub async fn update(
        &self,
        id: i64,
        user_id: i64,
        update: &CategoryUpdate<'_>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE finance_categories SET
                name = COALESCE(?, name),
                type = COALESCE(?, type),
                description = COALESCE(?, description),
                color = COALESCE(?, color),
                icon = COALESCE(?, icon),
                is_active = COALESCE(?, is_active),
                updated_at = datetime('now')
             WHERE id = ? AND user_id = ?",
        )
        .bind(update.name)
        .bind(update.entry_type.map(|t| t.as_str()))
        .bind(update.description)
        .bind(update.color)
        .bind(update.icon)
        .bind(update.is_active.map(|a| a as i32))
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a user's category.
    pub async fn delete_for_user(&self, id: i64, user_id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM finance_categories WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Number of journal entries filed under a category.
    pub async fn count_journals(&self, id: i64) -> Result<i64, sqlx::Error> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM finance_journals WHERE category_id = ?")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count.0)
    }
}
