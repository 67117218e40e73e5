use sqlx::sqlite::SqlitePool;

use super::category::{Category, EntryType};

#[derive(Clone)]
pub struct JournalStore {
    pool: SqlitePool,
}

/// A journal entry together with the category it is filed under.
#[derive(Debug, Clone)]
pub struct Journal {
    pub id: i64,
    pub user_id: i64,
    pub category_id: i64,
    pub entry_type: EntryType,
    pub amount: f64,
    pub title: String,
    pub description: String,
    pub date: String,
    pub payment_method: String,
    pub location: String,
    pub is_recurring: bool,
    pub receipt_url: String,
    pub created_at: String,
    pub updated_at: String,
    pub category: Category,
}

#[derive(sqlx::FromRow)]
struct JournalRow {
    id: i64,
    user_id: i64,
    category_id: i64,
    #[sqlx(rename = "type")]
    entry_type: String,
    amount: f64,
    title: String,
    description: String,
    date: String,
    payment_method: String,
    location: String,
    is_recurring: i32,
    receipt_url: String,
    created_at: String,
    updated_at: String,
    c_name: String,
    c_type: String,
    c_description: String,
    c_color: String,
    c_icon: String,
    c_is_active: i32,
    c_created_at: String,
    c_updated_at: String,
}

impl From<JournalRow> for Journal {
    fn from(row: JournalRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            category_id: row.category_id,
            entry_type: EntryType::from_stored(&row.entry_type),
            amount: row.amount,
            title: row.title,
            description: row.description,
            date: row.date,
            payment_method: row.payment_method,
            location: row.location,
            is_recurring: row.is_recurring != 0,
            receipt_url: row.receipt_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
            category: Category {
                id: row.category_id,
                user_id: row.user_id,
                name: row.c_name,
                entry_type: EntryType::from_stored(&row.c_type),
                description: row.c_description,
                color: row.c_color,
                icon: row.c_icon,
                is_active: row.c_is_active != 0,
                created_at: row.c_created_at,
                updated_at: row.c_updated_at,
            },
        }
    }
}

/// Fields for a new journal entry. The type comes from the category.
#[derive(Debug, Clone)]
pub struct NewJournal<'a> {
    pub category_id: i64,
    pub entry_type: EntryType,
    pub amount: f64,
    pub title: &'a str,
    pub description: &'a str,
    pub date: &'a str,
    pub payment_method: &'a str,
    pub location: &'a str,
    pub is_recurring: bool,
    pub receipt_url: &'a str,
}

/// Partial journal update. `None` leaves the column unchanged.
/// `category_id` and `entry_type` are expected to change together.
#[derive(Debug, Clone, Default)]
pub struct JournalUpdate<'a> {
    pub category_id: Option<i64>,
    pub entry_type: Option<EntryType>,
    pub amount: Option<f64>,
    pub title: Option<&'a str>,
    pub description: Option<&'a str>,
    pub date: Option<&'a str>,
    pub payment_method: Option<&'a str>,
    pub location: Option<&'a str>,
    pub is_recurring: Option<bool>,
    pub receipt_url: Option<&'a str>,
}

/// Optional list filters. Dates are inclusive `YYYY-MM-DD` bounds.
#[derive(Debug, Clone, Default)]
pub struct JournalFilter {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub category_id: Option<i64>,
    pub entry_type: Option<EntryType>,
}

/// Income and expense totals over a date range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JournalSummary {
    pub total_income: f64,
    pub total_expense: f64,
    pub entry_count: i64,
}

impl JournalSummary {
    pub fn net_balance(&self) -> f64 {
        self.total_income - self.total_expense
    }
}

impl JournalStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a journal entry for a user. Returns the entry ID.
    pub async fn create(&self, user_id: i64, new: &NewJournal<'_>) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO finance_journals
                (user_id, category_id, type, amount, title, description, date,
                 payment_method, location, is_recurring, receipt_url)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(new.category_id)
        .bind(new.entry_type.as_str())
        .bind(new.amount)
        .bind(new.title)
        .bind(new.description)
        .bind(new.date)
        .bind(new.payment_method)
        .bind(new.location)
        .bind(new.is_recurring as i32)
        .bind(new.receipt_url)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Get a journal entry by ID, scoped to its owner.
    pub async fn get_for_user(&self, id: i64, user_id: i64) -> Result<Option<Journal>, sqlx::Error> {
        let row: Option<JournalRow> = sqlx::query_as(
            "SELECT j.id, j.user_id, j.category_id, j.type, j.amount, j.title, j.description,
                    j.date, j.payment_method, j.location, j.is_recurring, j.receipt_url,
                    j.created_at, j.updated_at,
                    c.name AS c_name, c.type AS c_type, c.description AS c_description,
                    c.color AS c_color, c.icon AS c_icon, c.is_active AS c_is_active,
                    c.created_at AS c_created_at, c.updated_at AS c_updated_at
             FROM finance_journals j
             JOIN finance_categories c ON c.id = j.category_id
             WHERE j.id = ? AND j.user_id = ?",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Journal::from))
    }

    /// List a page of a user's entries, newest date first.
    pub async fn list(
        &self,
        user_id: i64,
        filter: &JournalFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Journal>, sqlx::Error> {
        let entry_type = filter.entry_type.map(|t| t.as_str());

        let rows: Vec<JournalRow> = sqlx::query_as(
            "SELECT j.id, j.user_id, j.category_id, j.type, j.amount, j.title, j.description,
                    j.date, j.payment_method, j.location, j.is_recurring, j.receipt_url,
                    j.created_at, j.updated_at,
                    c.name AS c_name, c.type AS c_type, c.description AS c_description,
                    c.color AS c_color, c.icon AS c_icon, c.is_active AS c_is_active,
                    c.created_at AS c_created_at, c.updated_at AS c_updated_at
             FROM finance_journals j
             JOIN finance_categories c ON c.id = j.category_id
             WHERE j.user_id = ?
               AND (? IS NULL OR j.date >= ?)
               AND (? IS NULL OR j.date <= ?)
               AND (? IS NULL OR j.category_id = ?)
               AND (? IS NULL OR j.type = ?)
             ORDER BY j.date DESC, j.created_at DESC, j.id DESC
             LIMIT ? OFFSET ?",
        )
        .bind(user_id)
        .bind(filter.start_date.as_deref())
        .bind(filter.start_date.as_deref())
        .bind(filter.end_date.as_deref())
        .bind(filter.end_date.as_deref())
        .bind(filter.category_id)
        .bind(filter.category_id)
        .bind(entry_type)
        .bind(entry_type)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Journal::from).collect())
    }

    /// Count a user's entries matching the filter, ignoring pagination.
    pub async fn count(&self, user_id: i64, filter: &JournalFilter) -> Result<i64, sqlx::Error> {
        let entry_type = filter.entry_type.map(|t| t.as_str());

        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM finance_journals
             WHERE user_id = ?
               AND (? IS NULL OR date >= ?)
               AND (? IS NULL OR date <= ?)
               AND (? IS NULL OR category_id = ?)
               AND (? IS NULL OR type = ?)",
        )
        .bind(user_id)
        .bind(filter.start_date.as_deref())
        .bind(filter.start_date.as_deref())
        .bind(filter.end_date.as_deref())
        .bind(filter.end_date.as_deref())
        .bind(filter.category_id)
        .bind(filter.category_id)
        .bind(entry_type)
        .bind(entry_type)
        .fetch_one(&self.pool)
        .await?;
        Ok(count.0)
    }

    /// Apply a partial update to a user's entry.
    /// Returns false if the entry does not exist for this user.
    pub async fn update(
        &self,
        id: i64,
        user_id: i64,
        update: &JournalUpdate<'_>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE finance_journals SET
                category_id = COALESCE(?, category_id),
                type = COALESCE(?, type),
                amount = COALESCE(?, amount),
                title = COALESCE(?, title),
                description = COALESCE(?, description),
                date = COALESCE(?, date),
                payment_method = COALESCE(?, payment_method),
                location = COALESCE(?, location),
                is_recurring = COALESCE(?, is_recurring),
                receipt_url = COALESCE(?, receipt_url),
                updated_at = datetime('now')
             WHERE id = ? AND user_id = ?",
        )
        .bind(update.category_id)
        .bind(update.entry_type.map(|t| t.as_str()))
        .bind(update.amount)
        .bind(update.title)
        .bind(update.description)
        .bind(update.date)
        .bind(update.payment_method)
        .bind(update.location)
        .bind(update.is_recurring.map(|r| r as i32))
        .bind(update.receipt_url)
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a user's entry.
    pub async fn delete_for_user(&self, id: i64, user_id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM finance_journals WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Totals for entries dated within `[start_date, end_date]`.
    pub async fn summary(
        &self,
        user_id: i64,
        start_date: &str,
        end_date: &str,
    ) -> Result<JournalSummary, sqlx::Error> {
        let (total_income, total_expense, entry_count): (f64, f64, i64) = sqlx::query_as(
            "SELECT TOTAL(CASE WHEN type = 'income' THEN amount ELSE 0.0 END),
                    TOTAL(CASE WHEN type = 'expense' THEN amount ELSE 0.0 END),
                    COUNT(*)
             FROM finance_journals
             WHERE user_id = ? AND date >= ? AND date <= ?",
        )
        .bind(user_id)
        .bind(start_date)
        .bind(end_date)
        .fetch_one(&self.pool)
        .await?;

        Ok(JournalSummary {
            total_income,
            total_expense,
            entry_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, NewCategory};

    struct Fixture {
        db: Database,
        user: i64,
        food: i64,
        salary: i64,
    }

    async fn setup() -> Fixture {
        let db = Database::open(":memory:").await.unwrap();
        let user = db.users().create("A", "a@x.com", "hash").await.unwrap();
        let food = db
            .categories()
            .create(
                user,
                &NewCategory {
                    name: "Food",
                    entry_type: EntryType::Expense,
                    description: "",
                    color: "#000000",
                    icon: "",
                },
            )
            .await
            .unwrap();
        let salary = db
            .categories()
            .create(
                user,
                &NewCategory {
                    name: "Salary",
                    entry_type: EntryType::Income,
                    description: "",
                    color: "#000000",
                    icon: "",
                },
            )
            .await
            .unwrap();
        Fixture {
            db,
            user,
            food,
            salary,
        }
    }

    fn entry(category_id: i64, entry_type: EntryType, amount: f64, date: &str) -> NewJournal<'_> {
        NewJournal {
            category_id,
            entry_type,
            amount,
            title: "entry",
            description: "",
            date,
            payment_method: "",
            location: "",
            is_recurring: false,
            receipt_url: "",
        }
    }

    #[tokio::test]
    async fn test_create_embeds_category() {
        let f = setup().await;
        let id = f
            .db
            .journals()
            .create(f.user, &entry(f.food, EntryType::Expense, 12.5, "2025-01-15"))
            .await
            .unwrap();

        let journal = f.db.journals().get_for_user(id, f.user).await.unwrap().unwrap();
        assert_eq!(journal.amount, 12.5);
        assert_eq!(journal.date, "2025-01-15");
        assert_eq!(journal.category.name, "Food");
        assert_eq!(journal.category.id, f.food);

        assert_eq!(f.db.categories().count_journals(f.food).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_order_filters_and_pagination() {
        let f = setup().await;
        let journals = f.db.journals();
        journals
            .create(f.user, &entry(f.food, EntryType::Expense, 10.0, "2025-01-01"))
            .await
            .unwrap();
        journals
            .create(f.user, &entry(f.salary, EntryType::Income, 100.0, "2025-01-20"))
            .await
            .unwrap();
        journals
            .create(f.user, &entry(f.food, EntryType::Expense, 20.0, "2025-02-03"))
            .await
            .unwrap();

        let all = journals
            .list(f.user, &JournalFilter::default(), 20, 0)
            .await
            .unwrap();
        let dates: Vec<_> = all.iter().map(|j| j.date.as_str()).collect();
        assert_eq!(dates, vec!["2025-02-03", "2025-01-20", "2025-01-01"]);

        let january = JournalFilter {
            start_date: Some("2025-01-01".to_string()),
            end_date: Some("2025-01-31".to_string()),
            ..Default::default()
        };
        assert_eq!(journals.count(f.user, &january).await.unwrap(), 2);

        let expenses = JournalFilter {
            entry_type: Some(EntryType::Expense),
            ..Default::default()
        };
        assert_eq!(journals.count(f.user, &expenses).await.unwrap(), 2);

        let by_category = JournalFilter {
            category_id: Some(f.salary),
            ..Default::default()
        };
        let salary_entries = journals.list(f.user, &by_category, 20, 0).await.unwrap();
        assert_eq!(salary_entries.len(), 1);
        assert_eq!(salary_entries[0].amount, 100.0);

        let page_two = journals
            .list(f.user, &JournalFilter::default(), 2, 2)
            .await
            .unwrap();
        assert_eq!(page_two.len(), 1);
        assert_eq!(page_two[0].date, "2025-01-01");
    }

    #[tokio::test]
    async fn test_update_switches_category_and_type() {
        let f = setup().await;
        let id = f
            .db
            .journals()
            .create(f.user, &entry(f.food, EntryType::Expense, 10.0, "2025-01-01"))
            .await
            .unwrap();

        let update = JournalUpdate {
            category_id: Some(f.salary),
            entry_type: Some(EntryType::Income),
            title: Some("refund"),
            ..Default::default()
        };
        assert!(f.db.journals().update(id, f.user, &update).await.unwrap());

        let journal = f.db.journals().get_for_user(id, f.user).await.unwrap().unwrap();
        assert_eq!(journal.entry_type, EntryType::Income);
        assert_eq!(journal.category.name, "Salary");
        assert_eq!(journal.title, "refund");
        assert_eq!(journal.amount, 10.0);
    }

    #[tokio::test]
    async fn test_summary() {
        let f = setup().await;
        let journals = f.db.journals();

        let empty = journals
            .summary(f.user, "2025-01-01", "2025-01-31")
            .await
            .unwrap();
        assert_eq!(empty.entry_count, 0);
        assert_eq!(empty.total_income, 0.0);

        journals
            .create(f.user, &entry(f.salary, EntryType::Income, 5000.0, "2025-01-01"))
            .await
            .unwrap();
        journals
            .create(f.user, &entry(f.food, EntryType::Expense, 1500.0, "2025-01-31"))
            .await
            .unwrap();
        journals
            .create(f.user, &entry(f.food, EntryType::Expense, 99.0, "2025-02-01"))
            .await
            .unwrap();

        let summary = journals
            .summary(f.user, "2025-01-01", "2025-01-31")
            .await
            .unwrap();
        assert_eq!(summary.total_income, 5000.0);
        assert_eq!(summary.total_expense, 1500.0);
        assert_eq!(summary.net_balance(), 3500.0);
        assert_eq!(summary.entry_count, 2);
    }

    #[tokio::test]
    async fn test_other_user_cannot_touch_entry() {
        let f = setup().await;
        let other = f.db.users().create("B", "b@x.com", "hash").await.unwrap();
        let id = f
            .db
            .journals()
            .create(f.user, &entry(f.food, EntryType::Expense, 10.0, "2025-01-01"))
            .await
            .unwrap();

        assert!(f.db.journals().get_for_user(id, other).await.unwrap().is_none());
        assert!(!f.db.journals().delete_for_user(id, other).await.unwrap());
        assert!(f.db.journals().delete_for_user(id, f.user).await.unwrap());
    }
}
