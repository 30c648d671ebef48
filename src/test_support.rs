// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Fixtures shared by unit tests: a bracket-quoting dialect, three sample
//! entities and a scripted in-memory provider.

use std::{
    collections::VecDeque,
    sync::{Arc, OnceLock}
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::{
    dialect::SqlHelper,
    entity::{Entity, EntityType, PropertyFlags},
    error::Result,
    executor::ResultSet,
    provider::{Command, Connection, ConnectionFactory, ProviderError},
    value::{FromValue, Value, ValueKind}
};

/// `[name]` quoting, `@name` parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct TestDialect;

impl SqlHelper for TestDialect {
    fn quote(&self, identifier: &str) -> String {
        format!("[{identifier}]")
    }

    fn parameter_prefix(&self) -> &str {
        "@"
    }

    fn identity(&self) -> &str {
        "SELECT SCOPE_IDENTITY()"
    }

    fn type_name(&self, kind: ValueKind) -> Option<&str> {
        match kind {
            ValueKind::String => Some("NVARCHAR(MAX)"),
            ValueKind::I32 => Some("INT"),
            ValueKind::I64 => Some("BIGINT"),
            ValueKind::Bool => Some("BIT"),
            _ => None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Article {
    pub id:         i32,
    pub title:      String,
    pub view_count: i32,
    pub name:       Option<String>,
    pub published:  bool,
    pub created_at: DateTime<Utc>,
    pub summary:    String
}

impl Entity for Article {
    fn entity_type() -> &'static EntityType {
        static TYPE: OnceLock<EntityType> = OnceLock::new();
        TYPE.get_or_init(|| {
            EntityType::builder("Article", "Articles")
                .property(
                    "Id",
                    ValueKind::I32,
                    PropertyFlags::KEY | PropertyFlags::IDENTITY
                )
                .property("Title", ValueKind::String, PropertyFlags::NONE)
                .property("ViewCount", ValueKind::I32, PropertyFlags::NONE)
                .property("Name", ValueKind::String, PropertyFlags::NONE)
                .property("Published", ValueKind::Bool, PropertyFlags::NONE)
                .property("CreatedAt", ValueKind::DateTime, PropertyFlags::NOT_UPDATED)
                .property("Summary", ValueKind::String, PropertyFlags::NOT_MAPPED)
                .build()
        })
    }

    fn get(&self, property: &str) -> Value {
        match property {
            "Id" => self.id.into(),
            "Title" => self.title.as_str().into(),
            "ViewCount" => self.view_count.into(),
            "Name" => self.name.clone().into(),
            "Published" => self.published.into(),
            "CreatedAt" => self.created_at.into(),
            "Summary" => self.summary.as_str().into(),
            _ => Value::Null
        }
    }

    fn set(&mut self, property: &str, value: Value) -> Result<()> {
        match property {
            "Id" => self.id = FromValue::from_nullable(value)?,
            "Title" => self.title = FromValue::from_nullable(value)?,
            "ViewCount" => self.view_count = FromValue::from_nullable(value)?,
            "Name" => self.name = FromValue::from_nullable(value)?,
            "Published" => self.published = FromValue::from_nullable(value)?,
            "CreatedAt" => self.created_at = FromValue::from_nullable(value)?,
            "Summary" => self.summary = FromValue::from_nullable(value)?,
            _ => {}
        }
        Ok(())
    }
}

/// Composite key `(SiteId, Id)` with an ordinal column.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Category {
    pub site_id:   i32,
    pub id:        i32,
    pub parent_id: i32,
    pub title:     String,
    pub order:     i32
}

impl Entity for Category {
    fn entity_type() -> &'static EntityType {
        static TYPE: OnceLock<EntityType> = OnceLock::new();
        TYPE.get_or_init(|| {
            EntityType::builder("Category", "Categories")
                .property("SiteId", ValueKind::I32, PropertyFlags::KEY)
                .property("Id", ValueKind::I32, PropertyFlags::KEY)
                .property("ParentId", ValueKind::I32, PropertyFlags::NONE)
                .property("Title", ValueKind::String, PropertyFlags::NONE)
                .property("Order", ValueKind::I32, PropertyFlags::NONE)
                .build()
        })
    }

    fn get(&self, property: &str) -> Value {
        match property {
            "SiteId" => self.site_id.into(),
            "Id" => self.id.into(),
            "ParentId" => self.parent_id.into(),
            "Title" => self.title.as_str().into(),
            "Order" => self.order.into(),
            _ => Value::Null
        }
    }

    fn set(&mut self, property: &str, value: Value) -> Result<()> {
        match property {
            "SiteId" => self.site_id = FromValue::from_nullable(value)?,
            "Id" => self.id = FromValue::from_nullable(value)?,
            "ParentId" => self.parent_id = FromValue::from_nullable(value)?,
            "Title" => self.title = FromValue::from_nullable(value)?,
            "Order" => self.order = FromValue::from_nullable(value)?,
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i16)]
pub enum TagKind {
    #[default]
    Topic = 0,
    Series = 1
}

/// Snake-case columns, enumeration-typed property.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tag {
    pub id:         i64,
    pub article_id: i32,
    pub label:      String,
    pub flag:       bool,
    pub kind:       TagKind
}

impl Entity for Tag {
    fn entity_type() -> &'static EntityType {
        static TYPE: OnceLock<EntityType> = OnceLock::new();
        TYPE.get_or_init(|| {
            EntityType::builder("Tag", "Tags")
                .column_case(convert_case::Case::Snake)
                .property(
                    "Id",
                    ValueKind::I64,
                    PropertyFlags::KEY | PropertyFlags::IDENTITY
                )
                .property("ArticleId", ValueKind::I32, PropertyFlags::NONE)
                .property("Label", ValueKind::String, PropertyFlags::NONE)
                .property("Flag", ValueKind::Bool, PropertyFlags::NONE)
                .property("Kind", ValueKind::I16, PropertyFlags::NONE)
                .build()
        })
    }

    fn get(&self, property: &str) -> Value {
        match property {
            "Id" => self.id.into(),
            "ArticleId" => self.article_id.into(),
            "Label" => self.label.as_str().into(),
            "Flag" => self.flag.into(),
            "Kind" => Value::enumeration(self.kind as i64, ValueKind::I16),
            _ => Value::Null
        }
    }

    fn set(&mut self, property: &str, value: Value) -> Result<()> {
        match property {
            "Id" => self.id = FromValue::from_nullable(value)?,
            "ArticleId" => self.article_id = FromValue::from_nullable(value)?,
            "Label" => self.label = FromValue::from_nullable(value)?,
            "Flag" => self.flag = FromValue::from_nullable(value)?,
            "Kind" => {
                self.kind = match i16::from_nullable(value)? {
                    1 => TagKind::Series,
                    _ => TagKind::Topic
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Shared state of the in-memory provider.
#[derive(Debug, Default)]
pub struct MemoryState {
    /// Every command received, in order.
    pub log:       Vec<Command>,
    /// Writes that became visible (autocommitted or committed).
    pub committed: Vec<Command>,
    /// Queued answers for `query`.
    pub results:   VecDeque<Vec<ResultSet>>,
    /// Queued answers for `execute`; `1` when empty.
    pub affected:  VecDeque<u64>,
    /// Commands whose text contains this fragment fail.
    pub fail_on:   Option<String>,
    pub opened:    usize,
    pub begun:     usize,
    pub commits:   usize,
    pub rollbacks: usize
}

/// Scripted connection factory recording every command.
#[derive(Debug, Clone, Default)]
pub struct MemoryFactory {
    state: Arc<Mutex<MemoryState>>
}

impl MemoryFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue result sets for the next `query`.
    pub fn push_result(&self, sets: Vec<ResultSet>) -> &Self {
        self.state.lock().results.push_back(sets);
        self
    }

    /// Queue an affected-row count for the next `execute`.
    pub fn push_affected(&self, rows: u64) -> &Self {
        self.state.lock().affected.push_back(rows);
        self
    }

    /// Fail every command containing `fragment`.
    pub fn fail_on(&self, fragment: &str) -> &Self {
        self.state.lock().fail_on = Some(fragment.to_string());
        self
    }

    /// Texts of every command received.
    pub fn texts(&self) -> Vec<String> {
        self.state.lock().log.iter().map(|c| c.text.clone()).collect()
    }

    /// Last command received.
    pub fn last(&self) -> Command {
        self.state.lock().log.last().cloned().unwrap_or_default()
    }

    /// Texts of visible writes.
    pub fn committed(&self) -> Vec<String> {
        self.state
            .lock()
            .committed
            .iter()
            .map(|c| c.text.clone())
            .collect()
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&MemoryState) -> R) -> R {
        f(&self.state.lock())
    }
}

#[async_trait]
impl ConnectionFactory for MemoryFactory {
    async fn open(&self) -> Result<Box<dyn Connection>, ProviderError> {
        self.state.lock().opened += 1;
        Ok(Box::new(MemoryConnection {
            state:   Arc::clone(&self.state),
            pending: None
        }))
    }
}

struct MemoryConnection {
    state:   Arc<Mutex<MemoryState>>,
    pending: Option<Vec<Command>>
}

impl MemoryConnection {
    fn record(&mut self, command: &Command) -> Result<(), ProviderError> {
        let mut state = self.state.lock();
        state.log.push(command.clone());
        if let Some(fragment) = &state.fail_on
            && command.text.contains(fragment.as_str())
        {
            return Err(ProviderError::new(format!("simulated failure at `{fragment}`")));
        }
        if !command.text.trim_start().starts_with("SELECT") {
            match &mut self.pending {
                Some(pending) => pending.push(command.clone()),
                None => state.committed.push(command.clone())
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn execute(&mut self, command: &Command) -> Result<u64, ProviderError> {
        self.record(command)?;
        Ok(self.state.lock().affected.pop_front().unwrap_or(1))
    }

    async fn query(&mut self, command: &Command) -> Result<Vec<ResultSet>, ProviderError> {
        self.record(command)?;
        Ok(self.state.lock().results.pop_front().unwrap_or_default())
    }

    async fn begin(&mut self) -> Result<(), ProviderError> {
        self.state.lock().begun += 1;
        self.pending = Some(Vec::new());
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), ProviderError> {
        let mut state = self.state.lock();
        if state.fail_on.as_deref() == Some("COMMIT") {
            return Err(ProviderError::new("simulated commit failure"));
        }
        state.commits += 1;
        if let Some(pending) = self.pending.take() {
            state.committed.extend(pending);
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), ProviderError> {
        self.state.lock().rollbacks += 1;
        self.pending = None;
        Ok(())
    }
}
