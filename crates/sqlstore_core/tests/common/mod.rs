#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use sqlstore_core::{
    DataPage, Identifiable, IdentifiableSqlitePersistence, IndexOptions, PagingParams,
    PersistenceConfig, PersistenceResult, SchemaBuilder, SerdeRowConverter,
};
use std::ops::{Deref, DerefMut};
use std::path::Path;

pub const DUMMY_TABLE: &str = "dummies";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dummy {
    pub id: Option<String>,
    pub key: String,
    pub content: String,
}

impl Dummy {
    pub fn new(key: &str, content: &str) -> Self {
        Self {
            id: None,
            key: key.to_string(),
            content: content.to_string(),
        }
    }

    pub fn with_id(id: &str, key: &str, content: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            ..Self::new(key, content)
        }
    }
}

impl Identifiable<String> for Dummy {
    fn id(&self) -> Option<&String> {
        self.id.as_ref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }
}

#[derive(Debug, Clone, Default)]
pub struct DummyFilter {
    pub key: Option<String>,
}

impl DummyFilter {
    pub fn key(key: &str) -> Self {
        Self {
            key: Some(key.to_string()),
        }
    }

    fn compose(&self) -> Option<String> {
        self.key
            .as_deref()
            .map(|key| format!("\"key\"='{}'", key.replace('\'', "''")))
    }
}

pub fn define_dummy_schema(schema: &mut SchemaBuilder) {
    let table = schema.quoted_table_name().unwrap_or_default();
    schema.ensure_schema(format!(
        "CREATE TABLE {table} (id VARCHAR(32) PRIMARY KEY, \"key\" VARCHAR(50), \"content\" TEXT)"
    ));
    let index = format!("{}_key", schema.table_name().unwrap_or_default());
    schema.ensure_index(&index, &[("key", true)], &IndexOptions::default());
}

/// Entity persistence used across the integration suites.
pub struct DummySqlitePersistence {
    inner: IdentifiableSqlitePersistence<Dummy, String>,
}

impl DummySqlitePersistence {
    pub fn new() -> Self {
        let inner = IdentifiableSqlitePersistence::new(DUMMY_TABLE, SerdeRowConverter::new())
            .unwrap()
            .with_schema_definition(define_dummy_schema);
        Self { inner }
    }

    pub fn get_page_by_filter(
        &self,
        correlation_id: Option<&str>,
        filter: &DummyFilter,
        paging: Option<&PagingParams>,
    ) -> PersistenceResult<DataPage<Dummy>> {
        self.inner.get_page_by_filter(
            correlation_id,
            filter.compose().as_deref(),
            paging,
            Some("\"key\""),
            None,
        )
    }

    pub fn get_count_by_filter(
        &self,
        correlation_id: Option<&str>,
        filter: &DummyFilter,
    ) -> PersistenceResult<u64> {
        self.inner
            .get_count_by_filter(correlation_id, filter.compose().as_deref())
    }
}

impl Deref for DummySqlitePersistence {
    type Target = IdentifiableSqlitePersistence<Dummy, String>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for DummySqlitePersistence {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

pub fn open_in_memory() -> DummySqlitePersistence {
    let persistence = DummySqlitePersistence::new();
    persistence.open(Some("test")).unwrap();
    persistence
}

pub fn open_at(path: &Path) -> DummySqlitePersistence {
    let mut persistence = DummySqlitePersistence::new();
    persistence
        .configure(&PersistenceConfig::default().with_uri(path.to_string_lossy()))
        .unwrap();
    persistence.open(Some("test")).unwrap();
    persistence
}

pub fn fixtures() -> [Dummy; 3] {
    [
        Dummy::with_id("1", "A", "first"),
        Dummy::with_id("2", "B", "second"),
        Dummy::with_id("3", "A", "third"),
    ]
}
