//! Repository pattern for database operations
//!
//! Provides a clean interface for all data access operations
//! with proper error handling and transaction support.

use crate::api::PaperUpdate;
use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    DbBackend, DbErr, EntityTrait, FromQueryResult, ModelTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, SqlErr, Statement, TransactionTrait,
};
use uuid::Uuid;

/// Input for creating a paper with its linked records
#[derive(Debug, Clone)]
pub struct NewPaper {
    pub title: String,
    pub abstract_text: Option<String>,
    pub year: Option<i32>,
    pub url: Option<String>,
    pub pdf_key: Option<String>,

    /// Normalized author names (trimmed, non-empty)
    pub authors: Vec<String>,

    /// Normalized tag names (trimmed, non-empty)
    pub tags: Vec<String>,

    /// Cited reference titles
    pub references: Vec<String>,
}

/// One row of a paper listing, with aggregated author and tag names
#[derive(Debug, Clone, FromQueryResult)]
pub struct PaperListRow {
    pub id: Uuid,
    pub title: String,
    pub abstract_text: Option<String>,
    pub year: Option<i32>,
    pub url: Option<String>,
    pub pdf_key: Option<String>,
    pub added_by: Uuid,
    pub added_at: sea_orm::prelude::DateTimeWithTimeZone,
    pub updated_at: sea_orm::prelude::DateTimeWithTimeZone,
    pub authors: Option<String>,
    pub tags: Option<String>,
}

/// Admin paper listing row, with the submitter's name joined in
#[derive(Debug, Clone, FromQueryResult)]
pub struct AdminPaperListRow {
    pub id: Uuid,
    pub title: String,
    pub abstract_text: Option<String>,
    pub year: Option<i32>,
    pub url: Option<String>,
    pub pdf_key: Option<String>,
    pub added_by: Uuid,
    pub added_by_name: Option<String>,
    pub added_at: sea_orm::prelude::DateTimeWithTimeZone,
    pub updated_at: sea_orm::prelude::DateTimeWithTimeZone,
    pub authors: Option<String>,
    pub tags: Option<String>,
}

/// Admin user listing row with the per-user paper count
#[derive(Debug, Clone, FromQueryResult)]
pub struct AdminUserListRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
    pub paper_count: i64,
    pub created_at: sea_orm::prelude::DateTimeWithTimeZone,
}

/// Catalog-wide totals
#[derive(Debug, Clone, Default, FromQueryResult)]
pub struct CatalogCountsRow {
    pub total_papers: i64,
    pub total_authors: i64,
    pub total_tags: i64,
    pub total_users: i64,
}

/// Per-year aggregate row
#[derive(Debug, Clone, FromQueryResult)]
pub struct YearBucketRow {
    pub year: Option<i32>,
    pub paper_count: i64,
    pub unique_authors: i64,
    pub unique_tags: i64,
    pub contributors: Option<String>,
}

/// Paper with an above-average author count
#[derive(Debug, Clone, FromQueryResult)]
pub struct AuthorHeavyRow {
    pub id: Uuid,
    pub title: String,
    pub year: Option<i32>,
    pub author_count: i64,
    pub authors: Option<String>,
}

#[derive(Debug, Default, FromQueryResult)]
struct CountRow {
    count: i64,
}

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // User Operations
    // ========================================================================

    /// Create a new user account
    pub async fn create_user(
        &self,
        name: String,
        email: String,
        password_hash: String,
        is_admin: bool,
    ) -> Result<User> {
        let now = chrono::Utc::now();

        let user = UserActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name),
            email: Set(email),
            password_hash: Set(password_hash),
            is_admin: Set(is_admin),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        user.insert(self.write_conn()).await.map_err(map_unique_email)
    }

    /// Find user by ID
    pub async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        UserEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Find user by email
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        UserEntity::find()
            .filter(UserColumn::Email.eq(email))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Paper Operations
    // ========================================================================

    /// List all papers, newest first
    pub async fn list_papers(&self) -> Result<Vec<PaperListRow>> {
        self.paper_rows("", vec![]).await
    }

    /// Case-insensitive substring search over title, abstract, and author names
    pub async fn search_papers(&self, keyword: &str) -> Result<Vec<PaperListRow>> {
        let pattern = like_pattern(keyword);

        self.paper_rows(
            r#"WHERE p.title ILIKE $1
               OR p.abstract_text ILIKE $1
               OR EXISTS (
                   SELECT 1 FROM paper_authors sa
                   JOIN authors au ON au.id = sa.author_id
                   WHERE sa.paper_id = p.id AND au.name ILIKE $1
               )"#,
            vec![pattern.into()],
        )
        .await
    }

    /// List papers carrying the exactly-named tag
    pub async fn papers_by_tag(&self, tag_name: &str) -> Result<Vec<PaperListRow>> {
        self.paper_rows(
            r#"WHERE EXISTS (
                   SELECT 1 FROM paper_tags st
                   JOIN tags tg ON tg.id = st.tag_id
                   WHERE st.paper_id = p.id AND tg.name = $1
               )"#,
            vec![tag_name.into()],
        )
        .await
    }

    /// List papers submitted by a user
    pub async fn papers_by_user(&self, user_id: Uuid) -> Result<Vec<PaperListRow>> {
        self.paper_rows("WHERE p.added_by = $1", vec![user_id.into()])
            .await
    }

    /// Shared listing query; the filter slips in between the joins and the
    /// GROUP BY
    async fn paper_rows(
        &self,
        where_clause: &str,
        values: Vec<sea_orm::Value>,
    ) -> Result<Vec<PaperListRow>> {
        let sql = format!(
            r#"
            SELECT p.id, p.title, p.abstract_text, p.year, p.url, p.pdf_key,
                   p.added_by, p.added_at, p.updated_at,
                   string_agg(DISTINCT a.name, ', ' ORDER BY a.name) AS authors,
                   string_agg(DISTINCT t.name, ', ' ORDER BY t.name) AS tags
            FROM papers p
            LEFT JOIN paper_authors pa ON pa.paper_id = p.id
            LEFT JOIN authors a ON a.id = pa.author_id
            LEFT JOIN paper_tags pt ON pt.paper_id = p.id
            LEFT JOIN tags t ON t.id = pt.tag_id
            {}
            GROUP BY p.id
            ORDER BY p.added_at DESC
            "#,
            where_clause
        );

        let stmt = Statement::from_sql_and_values(DbBackend::Postgres, &sql, values);

        PaperListRow::find_by_statement(stmt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Find paper by ID
    pub async fn find_paper_by_id(&self, id: Uuid) -> Result<Option<Paper>> {
        PaperEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Authors linked to a paper, ordered by name
    pub async fn authors_for_paper(&self, paper: &Paper) -> Result<Vec<Author>> {
        paper
            .find_related(AuthorEntity)
            .order_by_asc(AuthorColumn::Name)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Tags linked to a paper, ordered by name
    pub async fn tags_for_paper(&self, paper: &Paper) -> Result<Vec<Tag>> {
        paper
            .find_related(TagEntity)
            .order_by_asc(TagColumn::Name)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Cited reference titles of a paper, ordered alphabetically
    pub async fn references_for_paper(&self, paper_id: Uuid) -> Result<Vec<String>> {
        let refs = ReferenceEntity::find()
            .filter(ReferenceColumn::PaperId.eq(paper_id))
            .order_by_asc(ReferenceColumn::CitedTitle)
            .all(self.read_conn())
            .await?;

        Ok(refs.into_iter().map(|r| r.cited_title).collect())
    }

    /// Create a paper together with its authors, tags, and references
    ///
    /// Runs in a single transaction so a failure partway leaves no orphan
    /// rows. Author and tag names are upserted by name, so linking to an
    /// existing record never duplicates it.
    pub async fn create_paper(&self, added_by: Uuid, new_paper: NewPaper) -> Result<Uuid> {
        let txn = self.write_conn().begin().await?;

        let paper_id = Uuid::new_v4();
        let now = chrono::Utc::now();

        let paper = PaperActiveModel {
            id: Set(paper_id),
            title: Set(new_paper.title),
            abstract_text: Set(new_paper.abstract_text),
            year: Set(new_paper.year),
            url: Set(new_paper.url),
            pdf_key: Set(new_paper.pdf_key),
            added_by: Set(added_by),
            added_at: Set(now.into()),
            updated_at: Set(now.into()),
        };
        paper.insert(&txn).await?;

        for name in &new_paper.authors {
            let author_id = upsert_author(&txn, name).await?;
            link_author(&txn, paper_id, author_id).await?;
        }

        for name in &new_paper.tags {
            let tag_id = upsert_tag(&txn, name).await?;
            link_tag(&txn, paper_id, tag_id).await?;
        }

        for cited_title in &new_paper.references {
            let reference = ReferenceActiveModel {
                id: Set(Uuid::new_v4()),
                paper_id: Set(paper_id),
                cited_title: Set(cited_title.clone()),
            };
            reference.insert(&txn).await?;
        }

        txn.commit().await?;

        Ok(paper_id)
    }

    /// Replace a paper's own fields and bump its updated_at
    ///
    /// Linked authors, tags, and references are left untouched.
    pub async fn update_paper(&self, id: Uuid, update: &PaperUpdate) -> Result<()> {
        let mut paper: PaperActiveModel = PaperEntity::find_by_id(id)
            .one(self.write_conn())
            .await?
            .ok_or_else(|| AppError::PaperNotFound { id: id.to_string() })?
            .into();

        paper.title = Set(update.title.clone());
        paper.abstract_text = Set(update.abstract_text.clone());
        paper.year = Set(update.year);
        paper.url = Set(update.url.clone());
        paper.pdf_key = Set(update.pdf_key.clone());
        paper.updated_at = Set(chrono::Utc::now().into());

        paper.update(self.write_conn()).await?;
        Ok(())
    }

    /// Delete a paper and its join rows and references in one transaction
    pub async fn delete_paper(&self, id: Uuid) -> Result<()> {
        let txn = self.write_conn().begin().await?;

        PaperAuthorEntity::delete_many()
            .filter(PaperAuthorColumn::PaperId.eq(id))
            .exec(&txn)
            .await?;
        PaperTagEntity::delete_many()
            .filter(PaperTagColumn::PaperId.eq(id))
            .exec(&txn)
            .await?;
        ReferenceEntity::delete_many()
            .filter(ReferenceColumn::PaperId.eq(id))
            .exec(&txn)
            .await?;
        PaperEntity::delete_by_id(id).exec(&txn).await?;

        txn.commit().await?;
        Ok(())
    }

    // ========================================================================
    // Catalog Operations
    // ========================================================================

    /// List all tags ordered by name
    pub async fn list_tags(&self) -> Result<Vec<Tag>> {
        TagEntity::find()
            .order_by_asc(TagColumn::Name)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// List all authors ordered by name
    pub async fn list_authors(&self) -> Result<Vec<Author>> {
        AuthorEntity::find()
            .order_by_asc(AuthorColumn::Name)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Catalog-wide totals in one round trip
    pub async fn catalog_counts(&self) -> Result<CatalogCountsRow> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            SELECT (SELECT COUNT(*) FROM papers)  AS total_papers,
                   (SELECT COUNT(*) FROM authors) AS total_authors,
                   (SELECT COUNT(*) FROM tags)    AS total_tags,
                   (SELECT COUNT(*) FROM users)   AS total_users
            "#,
            vec![],
        );

        let row = CatalogCountsRow::find_by_statement(stmt)
            .one(self.read_conn())
            .await?;

        Ok(row.unwrap_or_default())
    }

    /// Count papers submitted by a user
    pub async fn count_user_papers(&self, user_id: Uuid) -> Result<i64> {
        let count = PaperEntity::find()
            .filter(PaperColumn::AddedBy.eq(user_id))
            .count(self.read_conn())
            .await?;

        Ok(count as i64)
    }

    /// Count papers carrying the exactly-named tag
    pub async fn count_papers_by_tag(&self, tag_name: &str) -> Result<i64> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            SELECT COUNT(*) AS count
            FROM paper_tags pt
            JOIN tags t ON t.id = pt.tag_id
            WHERE t.name = $1
            "#,
            vec![tag_name.into()],
        );

        let row = CountRow::find_by_statement(stmt)
            .one(self.read_conn())
            .await?;

        Ok(row.unwrap_or_default().count)
    }

    /// Count papers added within the last N days
    pub async fn count_recent_papers(&self, days: i32) -> Result<i64> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            SELECT COUNT(*) AS count
            FROM papers
            WHERE added_at >= NOW() - make_interval(days => $1)
            "#,
            vec![days.into()],
        );

        let row = CountRow::find_by_statement(stmt)
            .one(self.read_conn())
            .await?;

        Ok(row.unwrap_or_default().count)
    }

    /// Group papers by publication year with per-year counts and contributors
    pub async fn papers_by_year(&self) -> Result<Vec<YearBucketRow>> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            SELECT p.year,
                   COUNT(DISTINCT p.id) AS paper_count,
                   COUNT(DISTINCT pa.author_id) AS unique_authors,
                   COUNT(DISTINCT pt.tag_id) AS unique_tags,
                   string_agg(DISTINCT u.name, ', ' ORDER BY u.name) AS contributors
            FROM papers p
            LEFT JOIN paper_authors pa ON pa.paper_id = p.id
            LEFT JOIN paper_tags pt ON pt.paper_id = p.id
            LEFT JOIN users u ON u.id = p.added_by
            GROUP BY p.year
            ORDER BY p.year DESC NULLS LAST
            "#,
            vec![],
        );

        YearBucketRow::find_by_statement(stmt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Papers whose author count exceeds the catalog-wide average
    pub async fn papers_with_many_authors(&self) -> Result<Vec<AuthorHeavyRow>> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            SELECT p.id, p.title, p.year,
                   COUNT(pa.author_id) AS author_count,
                   string_agg(DISTINCT a.name, ', ' ORDER BY a.name) AS authors
            FROM papers p
            JOIN paper_authors pa ON pa.paper_id = p.id
            JOIN authors a ON a.id = pa.author_id
            GROUP BY p.id
            HAVING COUNT(pa.author_id) > (
                SELECT AVG(author_total) FROM (
                    SELECT COUNT(*) AS author_total
                    FROM paper_authors
                    GROUP BY paper_id
                ) per_paper
            )
            ORDER BY author_count DESC, p.added_at DESC
            "#,
            vec![],
        );

        AuthorHeavyRow::find_by_statement(stmt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Admin Operations
    // ========================================================================

    /// List all users with their paper counts
    pub async fn admin_list_users(&self) -> Result<Vec<AdminUserListRow>> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            SELECT u.id, u.name, u.email, u.is_admin, u.created_at,
                   COUNT(p.id) AS paper_count
            FROM users u
            LEFT JOIN papers p ON p.added_by = u.id
            GROUP BY u.id
            ORDER BY u.created_at ASC
            "#,
            vec![],
        );

        AdminUserListRow::find_by_statement(stmt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Apply a partial update to a user
    pub async fn admin_update_user(
        &self,
        id: Uuid,
        name: Option<String>,
        email: Option<String>,
        password_hash: Option<String>,
        is_admin: Option<bool>,
    ) -> Result<User> {
        let mut user: UserActiveModel = UserEntity::find_by_id(id)
            .one(self.write_conn())
            .await?
            .ok_or_else(|| AppError::UserNotFound { id: id.to_string() })?
            .into();

        if let Some(name) = name {
            user.name = Set(name);
        }
        if let Some(email) = email {
            user.email = Set(email);
        }
        if let Some(hash) = password_hash {
            user.password_hash = Set(hash);
        }
        if let Some(is_admin) = is_admin {
            user.is_admin = Set(is_admin);
        }
        user.updated_at = Set(chrono::Utc::now().into());

        user.update(self.write_conn()).await.map_err(map_unique_email)
    }

    /// Delete a user and everything they submitted in one transaction
    pub async fn admin_delete_user(&self, id: Uuid) -> Result<()> {
        let txn = self.write_conn().begin().await?;

        let paper_ids: Vec<Uuid> = PaperEntity::find()
            .filter(PaperColumn::AddedBy.eq(id))
            .all(&txn)
            .await?
            .into_iter()
            .map(|p| p.id)
            .collect();

        if !paper_ids.is_empty() {
            PaperAuthorEntity::delete_many()
                .filter(PaperAuthorColumn::PaperId.is_in(paper_ids.clone()))
                .exec(&txn)
                .await?;
            PaperTagEntity::delete_many()
                .filter(PaperTagColumn::PaperId.is_in(paper_ids.clone()))
                .exec(&txn)
                .await?;
            ReferenceEntity::delete_many()
                .filter(ReferenceColumn::PaperId.is_in(paper_ids))
                .exec(&txn)
                .await?;
            PaperEntity::delete_many()
                .filter(PaperColumn::AddedBy.eq(id))
                .exec(&txn)
                .await?;
        }

        UserEntity::delete_by_id(id).exec(&txn).await?;

        txn.commit().await?;
        Ok(())
    }

    /// List all papers with submitter names for the admin view
    pub async fn admin_list_papers(&self) -> Result<Vec<AdminPaperListRow>> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            SELECT p.id, p.title, p.abstract_text, p.year, p.url, p.pdf_key,
                   p.added_by, u.name AS added_by_name, p.added_at, p.updated_at,
                   string_agg(DISTINCT a.name, ', ' ORDER BY a.name) AS authors,
                   string_agg(DISTINCT t.name, ', ' ORDER BY t.name) AS tags
            FROM papers p
            LEFT JOIN users u ON u.id = p.added_by
            LEFT JOIN paper_authors pa ON pa.paper_id = p.id
            LEFT JOIN authors a ON a.id = pa.author_id
            LEFT JOIN paper_tags pt ON pt.paper_id = p.id
            LEFT JOIN tags t ON t.id = pt.tag_id
            GROUP BY p.id, u.name
            ORDER BY p.added_at DESC
            "#,
            vec![],
        );

        AdminPaperListRow::find_by_statement(stmt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }
}

/// Map a unique-constraint violation on the email column to the
/// domain-level duplicate error
fn map_unique_email(err: DbErr) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => AppError::DuplicateEmail,
        _ => err.into(),
    }
}

/// Insert an author by name, returning the existing row's ID on conflict
async fn upsert_author(txn: &DatabaseTransaction, name: &str) -> Result<Uuid> {
    let stmt = Statement::from_sql_and_values(
        DbBackend::Postgres,
        r#"
        INSERT INTO authors (id, name)
        VALUES ($1, $2)
        ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
        vec![Uuid::new_v4().into(), name.into()],
    );

    let row = txn.query_one(stmt).await?.ok_or_else(|| AppError::Internal {
        message: "Author upsert returned no row".to_string(),
    })?;

    row.try_get::<Uuid>("", "id").map_err(Into::into)
}

/// Insert a tag by name, returning the existing row's ID on conflict
async fn upsert_tag(txn: &DatabaseTransaction, name: &str) -> Result<Uuid> {
    let stmt = Statement::from_sql_and_values(
        DbBackend::Postgres,
        r#"
        INSERT INTO tags (id, name)
        VALUES ($1, $2)
        ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
        vec![Uuid::new_v4().into(), name.into()],
    );

    let row = txn.query_one(stmt).await?.ok_or_else(|| AppError::Internal {
        message: "Tag upsert returned no row".to_string(),
    })?;

    row.try_get::<Uuid>("", "id").map_err(Into::into)
}

async fn link_author(txn: &DatabaseTransaction, paper_id: Uuid, author_id: Uuid) -> Result<()> {
    let stmt = Statement::from_sql_and_values(
        DbBackend::Postgres,
        r#"
        INSERT INTO paper_authors (paper_id, author_id)
        VALUES ($1, $2)
        ON CONFLICT DO NOTHING
        "#,
        vec![paper_id.into(), author_id.into()],
    );

    txn.execute(stmt).await?;
    Ok(())
}

async fn link_tag(txn: &DatabaseTransaction, paper_id: Uuid, tag_id: Uuid) -> Result<()> {
    let stmt = Statement::from_sql_and_values(
        DbBackend::Postgres,
        r#"
        INSERT INTO paper_tags (paper_id, tag_id)
        VALUES ($1, $2)
        ON CONFLICT DO NOTHING
        "#,
        vec![paper_id.into(), tag_id.into()],
    );

    txn.execute(stmt).await?;
    Ok(())
}

/// Wrap a search term in `%` wildcards, escaping any LIKE metacharacters
/// it contains so they match literally
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    for ch in term.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    format!("%{}%", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_plain() {
        assert_eq!(like_pattern("attention"), "%attention%");
    }

    #[test]
    fn test_like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern("100%"), "%100\\%%");
        assert_eq!(like_pattern("snake_case"), "%snake\\_case%");
        assert_eq!(like_pattern(r"back\slash"), "%back\\\\slash%");
    }

    #[test]
    fn test_like_pattern_empty_matches_everything() {
        assert_eq!(like_pattern(""), "%%");
    }
}
