//! Flexible content sections
//!
//! A flexible content field holds an ordered list of sections, each
//! tagged with one of the layouts configured for that field. Sections
//! share the repeater row storage; layouts live in the layouts table.

use super::repeater::{RepeaterService, RowChange};
use crate::error::{Result, RuntimeError};
use crate::store::FieldStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use yap_core::{FieldEntry, FieldType, GroupName, LayoutDefinition, Value};

/// One stored section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub layout: String,
    #[serde(default)]
    pub fields: HashMap<String, Value>,
}

impl Section {
    pub fn new(layout: impl Into<String>) -> Self {
        Self {
            layout: layout.into(),
            fields: HashMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    fn to_value(&self) -> Value {
        let mut map = HashMap::new();
        map.insert("layout".to_string(), Value::String(self.layout.clone()));
        map.insert("fields".to_string(), Value::Object(self.fields.clone()));
        Value::Object(map)
    }

    fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        let layout = map.get("layout")?.as_str()?.to_string();
        let fields = map
            .get("fields")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        Some(Self { layout, fields })
    }
}

/// Where sections are being rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderContext {
    /// Page builder view with full editing affordances
    Builder,
    /// Plain metabox view
    Metabox,
}

/// A section ready for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedSection {
    /// Position among stored sections
    pub index: usize,
    pub layout: String,
    pub label: String,
    /// Values in the layout's sub field order
    pub fields: Vec<FieldEntry>,
    pub editable: bool,
}

pub struct FlexibleContent {
    store: Arc<dyn FieldStore>,
    repeaters: Arc<RepeaterService>,
}

impl FlexibleContent {
    pub fn new(store: Arc<dyn FieldStore>, repeaters: Arc<RepeaterService>) -> Self {
        Self { store, repeaters }
    }

    /// Layouts allowed for a field
    pub async fn layouts(&self, group: &GroupName, field_name: &str) -> Result<Vec<LayoutDefinition>> {
        let field = self.repeaters.row_field(group, field_name).await?;
        self.store.layouts(group, &field.generated_name).await
    }

    /// Replace the allowed layouts of a field
    pub async fn set_layouts(
        &self,
        group: &GroupName,
        field_name: &str,
        layouts: &[LayoutDefinition],
    ) -> Result<()> {
        let field = self.repeaters.row_field(group, field_name).await?;
        if field.field_type != FieldType::FlexibleContent {
            return Err(RuntimeError::InvalidOperation(format!(
                "'{}' is not a flexible content field",
                field.generated_name
            )));
        }
        self.store.save_layouts(group, &field.generated_name, layouts).await
    }

    /// Stored sections, in order. Rows that are not sections are dropped.
    pub async fn sections(&self, group: &GroupName, field_name: &str, post_id: i64) -> Result<Vec<Section>> {
        let rows = self.repeaters.rows(group, field_name, post_id).await?;
        Ok(rows.iter().filter_map(Section::from_value).collect())
    }

    /// Append a section. Its layout must be configured for the field.
    pub async fn add_section(
        &self,
        group: &GroupName,
        field_name: &str,
        post_id: i64,
        section: Section,
    ) -> Result<RowChange<usize>> {
        self.check_layout(group, field_name, &section.layout).await?;
        self.repeaters
            .add_row(group, field_name, post_id, section.to_value())
            .await
    }

    /// Replace the section at `index`
    pub async fn update_section(
        &self,
        group: &GroupName,
        field_name: &str,
        post_id: i64,
        index: usize,
        section: Section,
    ) -> Result<RowChange> {
        self.check_layout(group, field_name, &section.layout).await?;
        self.repeaters
            .update_row(group, field_name, post_id, index, section.to_value())
            .await
    }

    pub async fn delete_section(
        &self,
        group: &GroupName,
        field_name: &str,
        post_id: i64,
        index: usize,
    ) -> Result<RowChange<Value>> {
        self.repeaters.delete_row(group, field_name, post_id, index).await
    }

    pub async fn move_section(
        &self,
        group: &GroupName,
        field_name: &str,
        post_id: i64,
        from: usize,
        to: usize,
    ) -> Result<RowChange> {
        self.repeaters.move_row(group, field_name, post_id, from, to).await
    }

    /// Render stored sections. Sections whose layout is no longer
    /// configured are skipped.
    pub async fn render(
        &self,
        group: &GroupName,
        field_name: &str,
        post_id: i64,
        context: RenderContext,
    ) -> Result<Vec<RenderedSection>> {
        let layouts = self.layouts(group, field_name).await?;
        let sections = self.sections(group, field_name, post_id).await?;

        let rendered = sections
            .into_iter()
            .enumerate()
            .filter_map(|(index, section)| {
                let Some(layout) = layouts.iter().find(|l| l.name == section.layout) else {
                    debug!("Skipping section {} with unknown layout '{}'", index, section.layout);
                    return None;
                };

                let fields = layout
                    .sub_fields
                    .iter()
                    .map(|sub| FieldEntry {
                        label: sub.user_name.clone(),
                        name: sub.generated_name.clone(),
                        value: section
                            .fields
                            .get(&sub.generated_name)
                            .or_else(|| section.fields.get(&sub.user_name))
                            .cloned()
                            .unwrap_or_default(),
                        field_type: sub.field_type.clone(),
                    })
                    .collect();

                Some(RenderedSection {
                    index,
                    layout: layout.name.clone(),
                    label: layout.label.clone(),
                    fields,
                    editable: context == RenderContext::Builder,
                })
            })
            .collect();

        Ok(rendered)
    }

    async fn check_layout(&self, group: &GroupName, field_name: &str, layout: &str) -> Result<()> {
        let layouts = self.layouts(group, field_name).await?;
        if !layouts.iter().any(|l| l.name == layout) {
            return Err(RuntimeError::InvalidOperation(format!(
                "layout '{}' is not configured for '{}'",
                layout, field_name
            )));
        }
        Ok(())
    }
}
