//! Repository for the `generated_names` and `generated_name_components` tables.
//!
//! Soft-deleted rows (`is_deleted = true`) are excluded from every read
//! unless the caller goes through an explicit include-deleted path
//! ([`GeneratedNameRepo::find_by_id_include_deleted`] or
//! [`GeneratedNameFilter::include_deleted`]). Hard deletes cascade to the
//! components through the foreign key.

use std::collections::HashMap;

use namelog_core::naming::{
    DEFAULT_CREATED_BY, DEFAULT_USER, SEARCH_RESULT_LIMIT, UNKNOWN_RESOURCE_TYPE,
};
use namelog_core::paging::{clamp_page, clamp_page_size, page_offset, PagedResult};
use namelog_core::types::{DbId, Timestamp};
use sqlx::{PgConnection, PgPool};

use crate::models::generated_name::{
    CreateGeneratedName, CreateGeneratedNameComponent, GeneratedNameComponent,
    GeneratedNameFilter, GeneratedNameRecord, UsageStatistics,
};

// ---------------------------------------------------------------------------
// Column lists
// ---------------------------------------------------------------------------

/// Column list for `generated_names` SELECT / RETURNING clauses.
const COLUMNS: &str = "\
    id, created_at, resource_name, resource_type_name, user_name, message, \
    ip_address, user_agent, session_id, request_id, created_by, updated_at, is_deleted";

/// Column list for INSERT (excludes `id`, `updated_at`, `is_deleted`).
const INSERT_COLUMNS: &str = "\
    created_at, resource_name, resource_type_name, user_name, message, \
    ip_address, user_agent, session_id, request_id, created_by";

/// Column list for `generated_name_components` SELECT / RETURNING clauses.
const COMPONENT_COLUMNS: &str =
    "id, generated_name_id, component_name, component_value, sort_order";

/// Default visibility predicate.
const NOT_DELETED: &str = "is_deleted = false";

/// Newest first; `id` breaks ties so paging is stable.
const ORDER_BY: &str = "ORDER BY created_at DESC, id DESC";

// ---------------------------------------------------------------------------
// GeneratedNameRepo
// ---------------------------------------------------------------------------

/// Provides CRUD, query, statistics and bulk operations for generated names.
pub struct GeneratedNameRepo;

impl GeneratedNameRepo {
    // ── Standard CRUD ────────────────────────────────────────────────

    /// Insert a record and its components in one transaction, returning the
    /// stored row with its assigned id.
    pub async fn create(
        pool: &PgPool,
        input: &CreateGeneratedName,
    ) -> Result<GeneratedNameRecord, sqlx::Error> {
        let result = async {
            let mut tx = pool.begin().await?;
            let record = Self::insert_with_components(&mut *tx, input).await?;
            tx.commit().await?;
            Ok::<_, sqlx::Error>(record)
        }
        .await
        .inspect_err(log_failure("create"))?;

        tracing::info!(
            id = result.id,
            resource_name = %result.resource_name,
            "Created generated name record"
        );
        Ok(result)
    }

    /// Insert a record and its components on an existing connection or
    /// transaction. The caller owns commit/rollback.
    pub async fn insert_with_components(
        conn: &mut PgConnection,
        input: &CreateGeneratedName,
    ) -> Result<GeneratedNameRecord, sqlx::Error> {
        let query = format!(
            "INSERT INTO generated_names ({INSERT_COLUMNS})
             VALUES (COALESCE($1, NOW()), $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING {COLUMNS}"
        );
        let mut record = sqlx::query_as::<_, GeneratedNameRecord>(&query)
            .bind(input.created_at)
            .bind(&input.resource_name)
            .bind(&input.resource_type_name)
            .bind(input.user_name.as_deref().unwrap_or(DEFAULT_USER))
            .bind(&input.message)
            .bind(&input.ip_address)
            .bind(&input.user_agent)
            .bind(&input.session_id)
            .bind(&input.request_id)
            .bind(input.created_by.as_deref().unwrap_or(DEFAULT_CREATED_BY))
            .fetch_one(&mut *conn)
            .await?;

        record.components = insert_components(conn, record.id, &input.components).await?;
        Ok(record)
    }

    /// Find a visible record by id, components loaded in sort order.
    pub async fn get_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<GeneratedNameRecord>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM generated_names WHERE id = $1 AND {NOT_DELETED}");
        fetch_one_with_components(pool, &query, id)
            .await
            .inspect_err(log_failure("get_by_id"))
    }

    /// Find a record by id, including soft-deleted rows.
    pub async fn find_by_id_include_deleted(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<GeneratedNameRecord>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM generated_names WHERE id = $1");
        fetch_one_with_components(pool, &query, id)
            .await
            .inspect_err(log_failure("find_by_id_include_deleted"))
    }

    /// Persist every scalar field of `record` and stamp `updated_at`.
    ///
    /// Components are not touched. Returns `false` if the row no longer exists.
    pub async fn update(pool: &PgPool, record: &GeneratedNameRecord) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generated_names SET
                created_at = $2,
                resource_name = $3,
                resource_type_name = $4,
                user_name = $5,
                message = $6,
                ip_address = $7,
                user_agent = $8,
                session_id = $9,
                request_id = $10,
                created_by = $11,
                is_deleted = $12,
                updated_at = NOW()
             WHERE id = $1",
        )
        .bind(record.id)
        .bind(record.created_at)
        .bind(&record.resource_name)
        .bind(&record.resource_type_name)
        .bind(&record.user_name)
        .bind(&record.message)
        .bind(&record.ip_address)
        .bind(&record.user_agent)
        .bind(&record.session_id)
        .bind(&record.request_id)
        .bind(&record.created_by)
        .bind(record.is_deleted)
        .execute(pool)
        .await
        .inspect_err(log_failure("update"))?;

        let updated = result.rows_affected() > 0;
        if updated {
            tracing::info!(id = record.id, "Updated generated name record");
        }
        Ok(updated)
    }

    /// Permanently delete a record and its components. Returns `true` if a
    /// row was removed. Soft-deleted rows can be purged this way too.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM generated_names WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .inspect_err(log_failure("delete"))?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            tracing::info!(id, "Deleted generated name record");
        }
        Ok(deleted)
    }

    /// Soft-delete a record. Returns `true` if a visible row was marked
    /// deleted; a second call returns `false`. Components stay attached.
    pub async fn soft_delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generated_names SET is_deleted = true, updated_at = NOW() \
             WHERE id = $1 AND is_deleted = false",
        )
        .bind(id)
        .execute(pool)
        .await
        .inspect_err(log_failure("soft_delete"))?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            tracing::info!(id, "Soft deleted generated name record");
        }
        Ok(deleted)
    }

    /// Restore a soft-deleted record. Returns `true` if a row was restored.
    pub async fn restore(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generated_names SET is_deleted = false, updated_at = NOW() \
             WHERE id = $1 AND is_deleted = true",
        )
        .bind(id)
        .execute(pool)
        .await
        .inspect_err(log_failure("restore"))?;
        Ok(result.rows_affected() > 0)
    }

    // ── Listing and search ───────────────────────────────────────────

    /// One page of records matching `filter`, newest first.
    ///
    /// `page` is 1-based. Out-of-range inputs are clamped. The total count
    /// is taken after filtering and before pagination.
    pub async fn get_paged(
        pool: &PgPool,
        page: i64,
        page_size: i64,
        filter: Option<&GeneratedNameFilter>,
    ) -> Result<PagedResult<GeneratedNameRecord>, sqlx::Error> {
        let page = clamp_page(page);
        let page_size = clamp_page_size(page_size);
        let default_filter = GeneratedNameFilter::default();
        let filter = filter.unwrap_or(&default_filter);

        let result = async {
            let (where_clause, bind_values, bind_idx) = build_filter(filter);

            let count_query =
                format!("SELECT COUNT(*)::BIGINT FROM generated_names {where_clause}");
            let total_count =
                bind_values_scalar(sqlx::query_scalar::<_, i64>(&count_query), &bind_values)
                    .fetch_one(pool)
                    .await?;

            let query = format!(
                "SELECT {COLUMNS} FROM generated_names {where_clause} {ORDER_BY} \
                 LIMIT ${bind_idx} OFFSET ${}",
                bind_idx + 1
            );
            let mut items =
                bind_values_as(sqlx::query_as::<_, GeneratedNameRecord>(&query), &bind_values)
                    .bind(page_size)
                    .bind(page_offset(page, page_size))
                    .fetch_all(pool)
                    .await?;
            attach_components(pool, &mut items).await?;

            Ok::<_, sqlx::Error>(PagedResult {
                items,
                total_count,
                page,
                page_size,
            })
        }
        .await;

        result.inspect_err(log_failure("get_paged"))
    }

    /// Visible records for exactly `user`, newest first.
    pub async fn get_by_user(
        pool: &PgPool,
        user: &str,
        limit: i64,
    ) -> Result<Vec<GeneratedNameRecord>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM generated_names \
             WHERE user_name = $1 AND {NOT_DELETED} {ORDER_BY} LIMIT $2"
        );
        let result = async {
            let mut items = sqlx::query_as::<_, GeneratedNameRecord>(&query)
                .bind(user)
                .bind(limit.max(0))
                .fetch_all(pool)
                .await?;
            attach_components(pool, &mut items).await?;
            Ok::<_, sqlx::Error>(items)
        }
        .await;

        result.inspect_err(log_failure("get_by_user"))
    }

    /// The `count` most recently created visible records.
    pub async fn get_recent(
        pool: &PgPool,
        count: i64,
    ) -> Result<Vec<GeneratedNameRecord>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM generated_names WHERE {NOT_DELETED} {ORDER_BY} LIMIT $1"
        );
        let result = async {
            let mut items = sqlx::query_as::<_, GeneratedNameRecord>(&query)
                .bind(count.max(0))
                .fetch_all(pool)
                .await?;
            attach_components(pool, &mut items).await?;
            Ok::<_, sqlx::Error>(items)
        }
        .await;

        result.inspect_err(log_failure("get_recent"))
    }

    /// Case-sensitive substring search across resource name, resource type,
    /// user and component names/values. At most 100 results, newest first.
    pub async fn search(
        pool: &PgPool,
        term: &str,
    ) -> Result<Vec<GeneratedNameRecord>, sqlx::Error> {
        let filter = GeneratedNameFilter {
            search_term: Some(term.to_string()),
            ..Default::default()
        };
        let (where_clause, bind_values, bind_idx) = build_filter(&filter);
        let query = format!(
            "SELECT {COLUMNS} FROM generated_names {where_clause} {ORDER_BY} LIMIT ${bind_idx}"
        );

        let result = async {
            let mut items =
                bind_values_as(sqlx::query_as::<_, GeneratedNameRecord>(&query), &bind_values)
                    .bind(SEARCH_RESULT_LIMIT)
                    .fetch_all(pool)
                    .await?;
            attach_components(pool, &mut items).await?;
            Ok::<_, sqlx::Error>(items)
        }
        .await;

        result.inspect_err(log_failure("search"))
    }

    // ── Counts and statistics ────────────────────────────────────────

    /// Number of visible records.
    pub async fn get_count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let query = format!("SELECT COUNT(*)::BIGINT FROM generated_names WHERE {NOT_DELETED}");
        sqlx::query_scalar::<_, i64>(&query)
            .fetch_one(pool)
            .await
            .inspect_err(log_failure("get_count"))
    }

    /// Number of visible records for exactly `user`.
    pub async fn get_count_by_user(pool: &PgPool, user: &str) -> Result<i64, sqlx::Error> {
        let query = format!(
            "SELECT COUNT(*)::BIGINT FROM generated_names WHERE user_name = $1 AND {NOT_DELETED}"
        );
        sqlx::query_scalar::<_, i64>(&query)
            .bind(user)
            .fetch_one(pool)
            .await
            .inspect_err(log_failure("get_count_by_user"))
    }

    /// Number of visible records for exactly `resource_type`.
    pub async fn get_count_by_resource_type(
        pool: &PgPool,
        resource_type: &str,
    ) -> Result<i64, sqlx::Error> {
        let query = format!(
            "SELECT COUNT(*)::BIGINT FROM generated_names \
             WHERE resource_type_name = $1 AND {NOT_DELETED}"
        );
        sqlx::query_scalar::<_, i64>(&query)
            .bind(resource_type)
            .fetch_one(pool)
            .await
            .inspect_err(log_failure("get_count_by_resource_type"))
    }

    /// Number of rows in the table, soft-deleted ones included.
    pub async fn count_all_rows(pool: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*)::BIGINT FROM generated_names")
            .fetch_one(pool)
            .await
            .inspect_err(log_failure("count_all_rows"))
    }

    /// Visible records created within `[from, to]`, counted per resource type
    /// and ordered by count descending. Blank types are reported as `Unknown`.
    pub async fn get_usage_statistics(
        pool: &PgPool,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<UsageStatistics, sqlx::Error> {
        let query = format!(
            "SELECT COALESCE(NULLIF(btrim(resource_type_name), ''), $3) AS resource_type, \
                    COUNT(*)::BIGINT AS count \
             FROM generated_names \
             WHERE {NOT_DELETED} AND created_at >= $1 AND created_at <= $2 \
             GROUP BY 1 \
             ORDER BY count DESC, resource_type ASC"
        );
        let rows: Vec<(String, i64)> = sqlx::query_as(&query)
            .bind(from)
            .bind(to)
            .bind(UNKNOWN_RESOURCE_TYPE)
            .fetch_all(pool)
            .await
            .inspect_err(log_failure("get_usage_statistics"))?;

        Ok(rows.into_iter().collect())
    }

    // ── Existence checks ─────────────────────────────────────────────

    /// Whether a visible record with exactly this resource name exists.
    pub async fn exists(pool: &PgPool, resource_name: &str) -> Result<bool, sqlx::Error> {
        let query = format!(
            "SELECT EXISTS (SELECT 1 FROM generated_names \
             WHERE resource_name = $1 AND {NOT_DELETED})"
        );
        sqlx::query_scalar::<_, bool>(&query)
            .bind(resource_name)
            .fetch_one(pool)
            .await
            .inspect_err(log_failure("exists"))
    }

    /// Whether a visible record with exactly this resource name and user
    /// exists. Callers use this to prevent duplicate submissions.
    pub async fn is_duplicate(
        pool: &PgPool,
        resource_name: &str,
        user: &str,
    ) -> Result<bool, sqlx::Error> {
        let query = format!(
            "SELECT EXISTS (SELECT 1 FROM generated_names \
             WHERE resource_name = $1 AND user_name = $2 AND {NOT_DELETED})"
        );
        sqlx::query_scalar::<_, bool>(&query)
            .bind(resource_name)
            .bind(user)
            .fetch_one(pool)
            .await
            .inspect_err(log_failure("is_duplicate"))
    }

    /// Migration dedupe check: a visible row with the same resource name,
    /// user and creation time. Runs on the caller's transaction so rows
    /// inserted earlier in the same run are seen.
    pub async fn import_duplicate_exists(
        conn: &mut PgConnection,
        resource_name: &str,
        user: &str,
        created_at: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let query = format!(
            "SELECT EXISTS (SELECT 1 FROM generated_names \
             WHERE resource_name = $1 AND user_name = $2 AND created_at = $3 \
             AND {NOT_DELETED})"
        );
        sqlx::query_scalar::<_, bool>(&query)
            .bind(resource_name)
            .bind(user)
            .bind(created_at)
            .fetch_one(conn)
            .await
    }

    /// Earliest creation time among rows with the given creator tag.
    pub async fn earliest_created_at_by_creator(
        pool: &PgPool,
        created_by: &str,
    ) -> Result<Option<Timestamp>, sqlx::Error> {
        sqlx::query_scalar::<_, Option<Timestamp>>(
            "SELECT MIN(created_at) FROM generated_names WHERE created_by = $1",
        )
        .bind(created_by)
        .fetch_one(pool)
        .await
        .inspect_err(log_failure("earliest_created_at_by_creator"))
    }

    // ── Bulk operations ──────────────────────────────────────────────

    /// Permanently delete every record in `ids` (components cascade).
    /// Unknown ids are ignored. Returns the number of rows removed.
    pub async fn bulk_delete(pool: &PgPool, ids: &[DbId]) -> Result<u64, sqlx::Error> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM generated_names WHERE id = ANY($1)")
            .bind(ids)
            .execute(pool)
            .await
            .inspect_err(log_failure("bulk_delete"))?;

        let deleted = result.rows_affected();
        tracing::info!(deleted, "Bulk deleted generated name records");
        Ok(deleted)
    }

    /// Permanently delete every record created strictly before `cutoff`.
    /// Returns the number of rows removed.
    pub async fn cleanup_old_records(pool: &PgPool, cutoff: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM generated_names WHERE created_at < $1")
            .bind(cutoff)
            .execute(pool)
            .await
            .inspect_err(log_failure("cleanup_old_records"))?;

        let deleted = result.rows_affected();
        tracing::info!(deleted, %cutoff, "Cleaned up old generated name records");
        Ok(deleted)
    }

    /// Permanently delete every record, soft-deleted ones included.
    /// Returns the number of rows removed.
    pub async fn delete_all(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM generated_names")
            .execute(pool)
            .await
            .inspect_err(log_failure("delete_all"))?;

        let deleted = result.rows_affected();
        tracing::info!(deleted, "Deleted all generated name records");
        Ok(deleted)
    }

    /// Replace the whole collection with `inputs`, in one transaction.
    ///
    /// Both tables are truncated and their identities restarted, so the new
    /// records get ids `1..=inputs.len()` in input order.
    pub async fn replace_all(
        pool: &PgPool,
        inputs: &[CreateGeneratedName],
    ) -> Result<Vec<GeneratedNameRecord>, sqlx::Error> {
        let records = async {
            let mut tx = pool.begin().await?;
            sqlx::query(
                "TRUNCATE generated_name_components, generated_names RESTART IDENTITY",
            )
            .execute(&mut *tx)
            .await?;

            let mut records = Vec::with_capacity(inputs.len());
            for input in inputs {
                records.push(Self::insert_with_components(&mut *tx, input).await?);
            }
            tx.commit().await?;
            Ok::<_, sqlx::Error>(records)
        }
        .await
        .inspect_err(log_failure("replace_all"))?;

        tracing::info!(count = records.len(), "Replaced all generated name records");
        Ok(records)
    }
}

// ---------------------------------------------------------------------------
// Component loading
// ---------------------------------------------------------------------------

/// Insert `components` for `generated_name_id` in one statement.
async fn insert_components(
    conn: &mut PgConnection,
    generated_name_id: DbId,
    components: &[CreateGeneratedNameComponent],
) -> Result<Vec<GeneratedNameComponent>, sqlx::Error> {
    if components.is_empty() {
        return Ok(Vec::new());
    }

    let names: Vec<&str> = components.iter().map(|c| c.component_name.as_str()).collect();
    let values: Vec<&str> = components.iter().map(|c| c.component_value.as_str()).collect();
    let orders: Vec<i32> = components.iter().map(|c| c.sort_order).collect();

    let query = format!(
        "INSERT INTO generated_name_components \
            (generated_name_id, component_name, component_value, sort_order) \
         SELECT $1, t.component_name, t.component_value, t.sort_order \
         FROM UNNEST($2::text[], $3::text[], $4::int4[]) \
            AS t(component_name, component_value, sort_order) \
         RETURNING {COMPONENT_COLUMNS}"
    );
    let mut inserted = sqlx::query_as::<_, GeneratedNameComponent>(&query)
        .bind(generated_name_id)
        .bind(names.as_slice())
        .bind(values.as_slice())
        .bind(orders.as_slice())
        .fetch_all(conn)
        .await?;

    inserted.sort_by_key(|c| (c.sort_order, c.id));
    Ok(inserted)
}

/// Run a single-row `query` bound to `id` and attach the row's components.
async fn fetch_one_with_components(
    pool: &PgPool,
    query: &str,
    id: DbId,
) -> Result<Option<GeneratedNameRecord>, sqlx::Error> {
    let Some(record) = sqlx::query_as::<_, GeneratedNameRecord>(query)
        .bind(id)
        .fetch_optional(pool)
        .await?
    else {
        return Ok(None);
    };

    let mut records = [record];
    attach_components(pool, &mut records).await?;
    let [record] = records;
    Ok(Some(record))
}

/// Load the components of every record in `records` with one query and
/// attach them in ascending sort order.
async fn attach_components(
    pool: &PgPool,
    records: &mut [GeneratedNameRecord],
) -> Result<(), sqlx::Error> {
    if records.is_empty() {
        return Ok(());
    }

    let ids: Vec<DbId> = records.iter().map(|r| r.id).collect();
    let query = format!(
        "SELECT {COMPONENT_COLUMNS} FROM generated_name_components \
         WHERE generated_name_id = ANY($1) \
         ORDER BY generated_name_id, sort_order, id"
    );
    let components = sqlx::query_as::<_, GeneratedNameComponent>(&query)
        .bind(ids.as_slice())
        .fetch_all(pool)
        .await?;

    let mut by_parent: HashMap<DbId, Vec<GeneratedNameComponent>> = HashMap::new();
    for component in components {
        by_parent
            .entry(component.generated_name_id)
            .or_default()
            .push(component);
    }
    for record in records.iter_mut() {
        record.components = by_parent.remove(&record.id).unwrap_or_default();
    }
    Ok(())
}

fn log_failure(operation: &'static str) -> impl FnOnce(&sqlx::Error) {
    move |e| tracing::error!(operation, error = %e, "Generated name repository operation failed")
}

// ---------------------------------------------------------------------------
// Internal helpers for dynamic query building
// ---------------------------------------------------------------------------

/// Typed bind value for dynamically-built filter queries.
#[derive(Debug, Clone, PartialEq)]
enum BindValue {
    Text(String),
    Timestamp(Timestamp),
}

/// Build a WHERE clause and bind values from filter criteria.
///
/// Returns `(where_clause, bind_values, next_bind_index)`. The clause always
/// includes the soft-delete exclusion unless `include_deleted` is set, and is
/// empty only when nothing applies.
fn build_filter(filter: &GeneratedNameFilter) -> (String, Vec<BindValue>, u32) {
    let mut conditions: Vec<String> = Vec::new();
    let mut bind_idx = 1u32;
    let mut bind_values: Vec<BindValue> = Vec::new();

    if !filter.include_deleted {
        conditions.push(NOT_DELETED.to_string());
    }

    let substring_filters = [
        ("user_name", &filter.user),
        ("resource_type_name", &filter.resource_type),
        ("resource_name", &filter.resource_name),
    ];
    for (column, value) in substring_filters {
        if let Some(value) = non_empty(value) {
            conditions.push(format!("{column} LIKE ${bind_idx}"));
            bind_idx += 1;
            bind_values.push(BindValue::Text(contains_pattern(value)));
        }
    }

    if let Some(from) = filter.from_date {
        conditions.push(format!("created_at >= ${bind_idx}"));
        bind_idx += 1;
        bind_values.push(BindValue::Timestamp(from));
    }

    if let Some(to) = filter.to_date {
        conditions.push(format!("created_at <= ${bind_idx}"));
        bind_idx += 1;
        bind_values.push(BindValue::Timestamp(to));
    }

    if let Some(ip) = non_empty(&filter.ip_address) {
        conditions.push(format!("ip_address = ${bind_idx}"));
        bind_idx += 1;
        bind_values.push(BindValue::Text(ip.to_string()));
    }

    if let Some(term) = non_empty(&filter.search_term) {
        conditions.push(format!(
            "(resource_name LIKE ${bind_idx} \
              OR resource_type_name LIKE ${bind_idx} \
              OR user_name LIKE ${bind_idx} \
              OR {})",
            any_component(&format!(
                "c.component_name LIKE ${bind_idx} OR c.component_value LIKE ${bind_idx}"
            ))
        ));
        bind_idx += 1;
        bind_values.push(BindValue::Text(contains_pattern(term)));
    }

    if let Some(name) = non_empty(&filter.component_name) {
        conditions.push(any_component(&format!("c.component_name LIKE ${bind_idx}")));
        bind_idx += 1;
        bind_values.push(BindValue::Text(contains_pattern(name)));
    }

    if let Some(value) = non_empty(&filter.component_value) {
        conditions.push(any_component(&format!("c.component_value LIKE ${bind_idx}")));
        bind_idx += 1;
        bind_values.push(BindValue::Text(contains_pattern(value)));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    (where_clause, bind_values, bind_idx)
}

/// "Any attached component matches `predicate`" (components aliased `c`).
fn any_component(predicate: &str) -> String {
    format!(
        "EXISTS (SELECT 1 FROM generated_name_components c \
         WHERE c.generated_name_id = generated_names.id AND ({predicate}))"
    )
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Wrap `term` in `%…%` for a LIKE substring match, escaping the LIKE
/// metacharacters (`\`, `%`, `_`) so they match literally.
fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for ch in term.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

/// Bind a slice of `BindValue` to a sqlx `QueryAs`.
fn bind_values_as<'q, O>(
    mut q: sqlx::query::QueryAs<'q, sqlx::Postgres, O, sqlx::postgres::PgArguments>,
    bind_values: &'q [BindValue],
) -> sqlx::query::QueryAs<'q, sqlx::Postgres, O, sqlx::postgres::PgArguments> {
    for val in bind_values {
        match val {
            BindValue::Text(v) => q = q.bind(v.as_str()),
            BindValue::Timestamp(v) => q = q.bind(*v),
        }
    }
    q
}

/// Bind a slice of `BindValue` to a sqlx `QueryScalar`.
fn bind_values_scalar<'q>(
    mut q: sqlx::query::QueryScalar<'q, sqlx::Postgres, i64, sqlx::postgres::PgArguments>,
    bind_values: &'q [BindValue],
) -> sqlx::query::QueryScalar<'q, sqlx::Postgres, i64, sqlx::postgres::PgArguments> {
    for val in bind_values {
        match val {
            BindValue::Text(v) => q = q.bind(v.as_str()),
            BindValue::Timestamp(v) => q = q.bind(*v),
        }
    }
    q
}
