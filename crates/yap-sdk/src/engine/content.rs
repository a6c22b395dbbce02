//! Repeater and flexible content operations
//!
//! Row mutations bypass the value pipeline, so each successful mutation
//! publishes its own value-updated event carrying the whole row set.

use super::{field_not_found, FieldEngine};
use crate::error::Result;
use yap_core::{GroupName, LayoutDefinition, Value};
use yap_runtime::{RenderContext, RenderedSection, RowChange, Section, ValueUpdated};

impl FieldEngine {
    /// Publish the rows on either side of a mutation
    async fn publish_rows<T>(
        &self,
        group: &GroupName,
        name: &str,
        post_id: i64,
        change: RowChange<T>,
    ) -> Result<T> {
        let field = self
            .patterns
            .find_field(group, name)
            .await
            .ok_or_else(|| field_not_found(group, name))?;

        self.events
            .dispatch(&ValueUpdated {
                group: group.clone(),
                field_name: field.generated_name,
                field_label: field.user_name,
                old_value: Some(Value::Array(change.before)),
                new_value: Value::Array(change.after),
                post_id,
            })
            .await;
        Ok(change.outcome)
    }

    // ========== Repeaters ==========

    /// Ordered rows of a repeater field
    pub async fn get_repeater_rows(&self, group: &str, name: &str, post_id: i64) -> Result<Vec<Value>> {
        let group = GroupName::new(group)?;
        Ok(self.repeaters.rows(&group, name, post_id).await?)
    }

    /// Append a row, returning its index
    pub async fn add_repeater_row(
        &self,
        group: &str,
        name: &str,
        post_id: i64,
        row: impl Into<Value>,
    ) -> Result<usize> {
        let group = GroupName::new(group)?;
        let change = self.repeaters.add_row(&group, name, post_id, row.into()).await?;
        self.publish_rows(&group, name, post_id, change).await
    }

    pub async fn update_repeater_row(
        &self,
        group: &str,
        name: &str,
        post_id: i64,
        index: usize,
        row: impl Into<Value>,
    ) -> Result<()> {
        let group = GroupName::new(group)?;
        let change = self
            .repeaters
            .update_row(&group, name, post_id, index, row.into())
            .await?;
        self.publish_rows(&group, name, post_id, change).await
    }

    /// Remove the row at `index`; later rows shift down by one
    pub async fn delete_repeater_row(
        &self,
        group: &str,
        name: &str,
        post_id: i64,
        index: usize,
    ) -> Result<()> {
        let group = GroupName::new(group)?;
        let change = self.repeaters.delete_row(&group, name, post_id, index).await?;
        self.publish_rows(&group, name, post_id, change).await?;
        Ok(())
    }

    pub async fn move_repeater_row(
        &self,
        group: &str,
        name: &str,
        post_id: i64,
        from: usize,
        to: usize,
    ) -> Result<()> {
        let group = GroupName::new(group)?;
        let change = self.repeaters.move_row(&group, name, post_id, from, to).await?;
        self.publish_rows(&group, name, post_id, change).await
    }

    // ========== Flexible content ==========

    pub async fn get_flexible_layouts(&self, group: &str, name: &str) -> Result<Vec<LayoutDefinition>> {
        let group = GroupName::new(group)?;
        Ok(self.flexible.layouts(&group, name).await?)
    }

    /// Replace the layouts a flexible content field accepts
    pub async fn set_flexible_layouts(
        &self,
        group: &str,
        name: &str,
        layouts: &[LayoutDefinition],
    ) -> Result<()> {
        let group = GroupName::new(group)?;
        Ok(self.flexible.set_layouts(&group, name, layouts).await?)
    }

    pub async fn get_flexible_sections(&self, group: &str, name: &str, post_id: i64) -> Result<Vec<Section>> {
        let group = GroupName::new(group)?;
        Ok(self.flexible.sections(&group, name, post_id).await?)
    }

    /// Append a section whose layout is configured for the field,
    /// returning its index
    pub async fn add_flexible_section(
        &self,
        group: &str,
        name: &str,
        post_id: i64,
        section: Section,
    ) -> Result<usize> {
        let group = GroupName::new(group)?;
        let change = self.flexible.add_section(&group, name, post_id, section).await?;
        self.publish_rows(&group, name, post_id, change).await
    }

    pub async fn update_flexible_section(
        &self,
        group: &str,
        name: &str,
        post_id: i64,
        index: usize,
        section: Section,
    ) -> Result<()> {
        let group = GroupName::new(group)?;
        let change = self
            .flexible
            .update_section(&group, name, post_id, index, section)
            .await?;
        self.publish_rows(&group, name, post_id, change).await
    }

    pub async fn delete_flexible_section(
        &self,
        group: &str,
        name: &str,
        post_id: i64,
        index: usize,
    ) -> Result<()> {
        let group = GroupName::new(group)?;
        let change = self.flexible.delete_section(&group, name, post_id, index).await?;
        self.publish_rows(&group, name, post_id, change).await?;
        Ok(())
    }

    pub async fn move_flexible_section(
        &self,
        group: &str,
        name: &str,
        post_id: i64,
        from: usize,
        to: usize,
    ) -> Result<()> {
        let group = GroupName::new(group)?;
        let change = self.flexible.move_section(&group, name, post_id, from, to).await?;
        self.publish_rows(&group, name, post_id, change).await
    }

    /// Sections ready for display in `context`; sections whose layout was
    /// removed are skipped
    pub async fn render_flexible_sections(
        &self,
        group: &str,
        name: &str,
        post_id: i64,
        context: RenderContext,
    ) -> Result<Vec<RenderedSection>> {
        let group = GroupName::new(group)?;
        Ok(self.flexible.render(&group, name, post_id, context).await?)
    }
}
