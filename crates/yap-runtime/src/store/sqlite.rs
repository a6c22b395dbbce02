//! SQLite-based field store
//!
//! Per-group tables are created on demand from a [`TableDescriptor`]:
//! `yap_pattern_<group>`, `yap_data_<group>` and `yap_rows_<group>`.
//! The shared tables `yap_location_rules`, `yap_group_meta` and
//! `yap_flexible_layouts` are created when the store connects.

use super::FieldStore;
use crate::error::{Result, RuntimeError};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use yap_core::{
    FieldDefinition, FieldType, FieldValueRow, GroupMeta, GroupName, LayoutDefinition,
    LocationOperator, LocationRule, LocationType, TableDescriptor, Value,
};

const GLOBAL_SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS yap_location_rules (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        group_name TEXT NOT NULL,
        rule_group INTEGER NOT NULL,
        rule_order INTEGER NOT NULL,
        location_type TEXT NOT NULL,
        location_operator TEXT NOT NULL,
        location_value TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_yap_location_rules_group ON yap_location_rules (group_name)",
    "CREATE TABLE IF NOT EXISTS yap_group_meta (
        group_name TEXT PRIMARY KEY,
        title TEXT NOT NULL DEFAULT '',
        active INTEGER NOT NULL DEFAULT 1,
        modified INTEGER,
        content_hash TEXT
    )",
    "CREATE TABLE IF NOT EXISTS yap_flexible_layouts (
        group_name TEXT NOT NULL,
        field_name TEXT NOT NULL,
        layouts TEXT NOT NULL,
        PRIMARY KEY (group_name, field_name)
    )",
];

/// SQLite field store
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect to a database URL such as `sqlite://fields.db?mode=rwc`
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| RuntimeError::Storage(format!("Failed to connect to {}: {}", url, e)))?;
        Self::with_pool(pool).await
    }

    /// Private in-memory database. A single connection keeps every query
    /// on the same database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::with_pool(pool).await
    }

    /// Wrap an existing pool and create the shared tables
    pub async fn with_pool(pool: SqlitePool) -> Result<Self> {
        for statement in GLOBAL_SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn pattern_from_row(row: &SqliteRow) -> Result<FieldDefinition> {
        let field_type: String = row.try_get("field_type")?;
        let options: String = row.try_get("field_options")?;
        let rules: String = row.try_get("validation_rules")?;
        let logic: Option<String> = row.try_get("conditional_logic")?;
        let repeater_min: Option<i64> = row.try_get("repeater_min")?;
        let repeater_max: Option<i64> = row.try_get("repeater_max")?;

        Ok(FieldDefinition {
            id: Some(row.try_get("id")?),
            generated_name: row.try_get("generated_name")?,
            user_name: row.try_get("user_name")?,
            field_type: FieldType::from_name(&field_type),
            field_options: decode_or_default(&options)?,
            validation_rules: decode_or_default(&rules)?,
            conditional_logic: match logic.as_deref() {
                None | Some("") => None,
                Some(raw) => Some(serde_json::from_str(raw)?),
            },
            is_repeater: row.try_get::<i64, _>("is_repeater")? != 0,
            repeater_min: repeater_min.map(|v| v as u32),
            repeater_max: repeater_max.map(|v| v as u32),
            layout_type: row.try_get("layout_type")?,
            parent_id: row.try_get("parent_id")?,
        })
    }

    fn value_from_row(row: &SqliteRow) -> Result<FieldValueRow> {
        let field_type: String = row.try_get("field_type")?;
        Ok(FieldValueRow {
            id: Some(row.try_get("id")?),
            generated_name: row.try_get("generated_name")?,
            user_name: row.try_get("user_name")?,
            field_type: FieldType::from_name(&field_type),
            field_value: row.try_get("field_value")?,
            associated_id: row.try_get("associated_id")?,
        })
    }

    fn pattern_columns(field: &FieldDefinition) -> Result<(String, String, Option<String>)> {
        let options = serde_json::to_string(&field.field_options)?;
        let rules = serde_json::to_string(&field.validation_rules)?;
        let logic = field
            .conditional_logic
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        Ok((options, rules, logic))
    }

    /// Map "no such table" into `TableMissing` so callers can tell it apart
    fn map_missing(tables: &TableDescriptor) -> impl Fn(sqlx::Error) -> RuntimeError + '_ {
        move |err| {
            if err.to_string().contains("no such table") {
                RuntimeError::TableMissing(tables.data_table.clone())
            } else {
                RuntimeError::Storage(err.to_string())
            }
        }
    }
}

fn decode_or_default<T: serde::de::DeserializeOwned + Default>(raw: &str) -> Result<T> {
    if raw.trim().is_empty() {
        return Ok(T::default());
    }
    Ok(serde_json::from_str(raw)?)
}

#[async_trait::async_trait]
impl FieldStore for SqliteStore {
    async fn table_exists(&self, tables: &TableDescriptor) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1")
            .bind(&tables.data_table)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn create_group_tables(&self, tables: &TableDescriptor) -> Result<()> {
        let statements = [
            format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_name TEXT NOT NULL,
                    generated_name TEXT NOT NULL UNIQUE,
                    field_type TEXT NOT NULL,
                    field_options TEXT NOT NULL DEFAULT '{{}}',
                    validation_rules TEXT NOT NULL DEFAULT '{{}}',
                    conditional_logic TEXT,
                    is_repeater INTEGER NOT NULL DEFAULT 0,
                    repeater_min INTEGER,
                    repeater_max INTEGER,
                    layout_type TEXT,
                    parent_id INTEGER
                )",
                tables.pattern_table
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    generated_name TEXT NOT NULL,
                    user_name TEXT NOT NULL,
                    field_type TEXT NOT NULL,
                    field_value TEXT NOT NULL DEFAULT '',
                    associated_id INTEGER NOT NULL,
                    UNIQUE (generated_name, associated_id)
                )",
                tables.data_table
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    field_name TEXT NOT NULL,
                    associated_id INTEGER NOT NULL,
                    row_index INTEGER NOT NULL,
                    row_value TEXT NOT NULL,
                    PRIMARY KEY (field_name, associated_id, row_index)
                )",
                tables.rows_table
            ),
        ];

        for statement in &statements {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn drop_group_tables(&self, tables: &TableDescriptor) -> Result<()> {
        for table in [&tables.pattern_table, &tables.data_table, &tables.rows_table] {
            sqlx::query(&format!("DROP TABLE IF EXISTS {}", table))
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    async fn list_patterns(&self, tables: &TableDescriptor) -> Result<Vec<FieldDefinition>> {
        let rows = sqlx::query(&format!("SELECT * FROM {} ORDER BY id", tables.pattern_table))
            .fetch_all(&self.pool)
            .await
            .map_err(Self::map_missing(tables))?;
        rows.iter().map(Self::pattern_from_row).collect()
    }

    async fn insert_pattern(
        &self,
        tables: &TableDescriptor,
        field: &FieldDefinition,
    ) -> Result<i64> {
        let (options, rules, logic) = Self::pattern_columns(field)?;
        let query = format!(
            "INSERT INTO {} (user_name, generated_name, field_type, field_options, validation_rules,
                conditional_logic, is_repeater, repeater_min, repeater_max, layout_type, parent_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            tables.pattern_table
        );

        let result = sqlx::query(&query)
            .bind(&field.user_name)
            .bind(&field.generated_name)
            .bind(field.field_type.as_str())
            .bind(options)
            .bind(rules)
            .bind(logic)
            .bind(field.is_repeater as i64)
            .bind(field.repeater_min.map(i64::from))
            .bind(field.repeater_max.map(i64::from))
            .bind(&field.layout_type)
            .bind(field.parent_id)
            .execute(&self.pool)
            .await
            .map_err(Self::map_missing(tables))?;

        Ok(result.last_insert_rowid())
    }

    async fn update_pattern(
        &self,
        tables: &TableDescriptor,
        id: i64,
        field: &FieldDefinition,
    ) -> Result<()> {
        let (options, rules, logic) = Self::pattern_columns(field)?;
        let query = format!(
            "UPDATE {} SET user_name = ?1, generated_name = ?2, field_type = ?3, field_options = ?4,
                validation_rules = ?5, conditional_logic = ?6, is_repeater = ?7, repeater_min = ?8,
                repeater_max = ?9, layout_type = ?10, parent_id = ?11
             WHERE id = ?12",
            tables.pattern_table
        );

        let result = sqlx::query(&query)
            .bind(&field.user_name)
            .bind(&field.generated_name)
            .bind(field.field_type.as_str())
            .bind(options)
            .bind(rules)
            .bind(logic)
            .bind(field.is_repeater as i64)
            .bind(field.repeater_min.map(i64::from))
            .bind(field.repeater_max.map(i64::from))
            .bind(&field.layout_type)
            .bind(field.parent_id)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Self::map_missing(tables))?;

        if result.rows_affected() == 0 {
            return Err(RuntimeError::FieldNotFound(format!("pattern id {}", id)));
        }
        Ok(())
    }

    async fn find_value(
        &self,
        tables: &TableDescriptor,
        generated_name: &str,
        associated_id: i64,
    ) -> Result<Option<FieldValueRow>> {
        let query = format!(
            "SELECT * FROM {} WHERE generated_name = ?1 AND associated_id = ?2 LIMIT 1",
            tables.data_table
        );
        let row = sqlx::query(&query)
            .bind(generated_name)
            .bind(associated_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Self::map_missing(tables))?;
        row.as_ref().map(Self::value_from_row).transpose()
    }

    async fn find_value_by_label(
        &self,
        tables: &TableDescriptor,
        user_name: &str,
        associated_id: i64,
    ) -> Result<Option<FieldValueRow>> {
        let query = format!(
            "SELECT * FROM {} WHERE user_name = ?1 AND associated_id = ?2 ORDER BY id LIMIT 1",
            tables.data_table
        );
        let row = sqlx::query(&query)
            .bind(user_name)
            .bind(associated_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Self::map_missing(tables))?;
        row.as_ref().map(Self::value_from_row).transpose()
    }

    async fn list_values(
        &self,
        tables: &TableDescriptor,
        associated_id: i64,
    ) -> Result<Vec<FieldValueRow>> {
        let query = format!(
            "SELECT * FROM {} WHERE associated_id = ?1 ORDER BY id",
            tables.data_table
        );
        let rows = sqlx::query(&query)
            .bind(associated_id)
            .fetch_all(&self.pool)
            .await
            .map_err(Self::map_missing(tables))?;
        rows.iter().map(Self::value_from_row).collect()
    }

    async fn upsert_value(&self, tables: &TableDescriptor, row: &FieldValueRow) -> Result<()> {
        let query = format!(
            "INSERT INTO {} (generated_name, user_name, field_type, field_value, associated_id)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (generated_name, associated_id) DO UPDATE SET
                user_name = excluded.user_name,
                field_type = excluded.field_type,
                field_value = excluded.field_value",
            tables.data_table
        );
        sqlx::query(&query)
            .bind(&row.generated_name)
            .bind(&row.user_name)
            .bind(row.field_type.as_str())
            .bind(&row.field_value)
            .bind(row.associated_id)
            .execute(&self.pool)
            .await
            .map_err(Self::map_missing(tables))?;
        Ok(())
    }

    async fn count_values(
        &self,
        tables: &TableDescriptor,
        generated_name: &str,
        associated_id: i64,
    ) -> Result<usize> {
        let query = format!(
            "SELECT COUNT(*) AS n FROM {} WHERE generated_name = ?1 AND associated_id = ?2",
            tables.data_table
        );
        let row = sqlx::query(&query)
            .bind(generated_name)
            .bind(associated_id)
            .fetch_one(&self.pool)
            .await
            .map_err(Self::map_missing(tables))?;
        let count: i64 = row.try_get("n")?;
        Ok(count as usize)
    }

    async fn list_rows(
        &self,
        tables: &TableDescriptor,
        field_name: &str,
        associated_id: i64,
    ) -> Result<Vec<Value>> {
        let query = format!(
            "SELECT row_value FROM {} WHERE field_name = ?1 AND associated_id = ?2 ORDER BY row_index",
            tables.rows_table
        );
        let rows = sqlx::query(&query)
            .bind(field_name)
            .bind(associated_id)
            .fetch_all(&self.pool)
            .await
            .map_err(Self::map_missing(tables))?;

        rows.iter()
            .map(|row| {
                let raw: String = row.try_get("row_value")?;
                Ok(serde_json::from_str::<Value>(&raw)?)
            })
            .collect()
    }

    async fn replace_rows(
        &self,
        tables: &TableDescriptor,
        field_name: &str,
        associated_id: i64,
        rows: &[Value],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!(
            "DELETE FROM {} WHERE field_name = ?1 AND associated_id = ?2",
            tables.rows_table
        ))
        .bind(field_name)
        .bind(associated_id)
        .execute(&mut *tx)
        .await
        .map_err(Self::map_missing(tables))?;

        let insert = format!(
            "INSERT INTO {} (field_name, associated_id, row_index, row_value) VALUES (?1, ?2, ?3, ?4)",
            tables.rows_table
        );
        for (index, row) in rows.iter().enumerate() {
            sqlx::query(&insert)
                .bind(field_name)
                .bind(associated_id)
                .bind(index as i64)
                .bind(serde_json::to_string(row)?)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn replace_location_rules(
        &self,
        group: &GroupName,
        rules: &[LocationRule],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM yap_location_rules WHERE group_name = ?1")
            .bind(group.as_str())
            .execute(&mut *tx)
            .await?;

        for rule in rules {
            sqlx::query(
                "INSERT INTO yap_location_rules
                    (group_name, rule_group, rule_order, location_type, location_operator, location_value)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )
            .bind(group.as_str())
            .bind(rule.rule_group as i64)
            .bind(rule.rule_order as i64)
            .bind(rule.location_type.to_string())
            .bind(rule.location_operator.as_str())
            .bind(&rule.location_value)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn location_rules(&self, group: &GroupName) -> Result<Vec<LocationRule>> {
        let rows = sqlx::query(
            "SELECT * FROM yap_location_rules WHERE group_name = ?1 ORDER BY rule_group, rule_order",
        )
        .bind(group.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let location_type: String = row.try_get("location_type")?;
                let operator: String = row.try_get("location_operator")?;
                Ok(LocationRule {
                    group_name: row.try_get("group_name")?,
                    rule_group: row.try_get::<i64, _>("rule_group")? as u32,
                    rule_order: row.try_get::<i64, _>("rule_order")? as u32,
                    location_type: LocationType::parse(&location_type),
                    location_operator: LocationOperator::parse(&operator).ok_or_else(|| {
                        RuntimeError::Storage(format!("unknown location operator '{}'", operator))
                    })?,
                    location_value: row.try_get("location_value")?,
                })
            })
            .collect()
    }

    async fn save_group_meta(&self, meta: &GroupMeta) -> Result<()> {
        sqlx::query(
            "INSERT INTO yap_group_meta (group_name, title, active, modified, content_hash)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (group_name) DO UPDATE SET
                title = excluded.title,
                active = excluded.active,
                modified = excluded.modified,
                content_hash = excluded.content_hash",
        )
        .bind(meta.name.as_str())
        .bind(&meta.title)
        .bind(meta.active as i64)
        .bind(meta.modified)
        .bind(&meta.content_hash)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn group_meta(&self, group: &GroupName) -> Result<Option<GroupMeta>> {
        let row = sqlx::query("SELECT * FROM yap_group_meta WHERE group_name = ?1")
            .bind(group.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(meta_from_row).transpose()
    }

    async fn list_group_meta(&self) -> Result<Vec<GroupMeta>> {
        let rows = sqlx::query("SELECT * FROM yap_group_meta ORDER BY group_name")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(meta_from_row).collect()
    }

    async fn save_layouts(
        &self,
        group: &GroupName,
        field_name: &str,
        layouts: &[LayoutDefinition],
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO yap_flexible_layouts (group_name, field_name, layouts) VALUES (?1, ?2, ?3)
             ON CONFLICT (group_name, field_name) DO UPDATE SET layouts = excluded.layouts",
        )
        .bind(group.as_str())
        .bind(field_name)
        .bind(serde_json::to_string(layouts)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn layouts(
        &self,
        group: &GroupName,
        field_name: &str,
    ) -> Result<Vec<LayoutDefinition>> {
        let row = sqlx::query(
            "SELECT layouts FROM yap_flexible_layouts WHERE group_name = ?1 AND field_name = ?2",
        )
        .bind(group.as_str())
        .bind(field_name)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let raw: String = row.try_get("layouts")?;
                Ok(serde_json::from_str(&raw)?)
            }
            None => Ok(Vec::new()),
        }
    }
}

fn meta_from_row(row: &SqliteRow) -> Result<GroupMeta> {
    let name: String = row.try_get("group_name")?;
    Ok(GroupMeta {
        name: GroupName::new(&name)?,
        title: row.try_get("title")?,
        active: row.try_get::<i64, _>("active")? != 0,
        modified: row.try_get("modified")?,
        content_hash: row.try_get("content_hash")?,
    })
}
