//! Schema statement registry replayed on first open.
//!
//! # Responsibility
//! - Collect DDL statements (tables, indexes) in enqueue order.
//! - Let entity persistences declare their schema through a hook.
//!
//! # Invariants
//! - The statement list is rebuilt from scratch on every open.
//! - Statements are replayed only when the table does not exist yet;
//!   existing tables are never reconciled.

use super::sql_builder::quote_identifier;
use super::sql_builder::qualified_table_name;

/// Options for `SchemaBuilder::ensure_index`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexOptions {
    pub unique: bool,
    /// Dialect-specific index method appended after the table name.
    pub index_type: Option<String>,
}

impl IndexOptions {
    pub fn unique() -> Self {
        Self {
            unique: true,
            index_type: None,
        }
    }
}

/// Ordered DDL statements for one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaBuilder {
    table_name: Option<String>,
    schema_name: Option<String>,
    statements: Vec<String>,
}

impl SchemaBuilder {
    pub fn new(table_name: Option<&str>, schema_name: Option<&str>) -> Self {
        Self {
            table_name: table_name.map(str::to_string),
            schema_name: schema_name.map(str::to_string),
            statements: Vec::new(),
        }
    }

    pub fn table_name(&self) -> Option<&str> {
        self.table_name.as_deref()
    }

    pub fn schema_name(&self) -> Option<&str> {
        self.schema_name.as_deref()
    }

    /// Schema-qualified, quoted table name.
    pub fn quoted_table_name(&self) -> Option<String> {
        qualified_table_name(self.table_name(), self.schema_name())
    }

    /// Appends one raw DDL statement.
    pub fn ensure_schema(&mut self, statement: impl Into<String>) {
        self.statements.push(statement.into());
    }

    /// Appends a `CREATE [UNIQUE] INDEX` statement.
    ///
    /// `keys` lists columns in index order; `false` marks a descending key.
    pub fn ensure_index(&mut self, name: &str, keys: &[(&str, bool)], options: &IndexOptions) {
        let mut builder = String::from("CREATE");
        if options.unique {
            builder.push_str(" UNIQUE");
        }

        // SQLite qualifies the index name, not the indexed table.
        let mut index_name = quote_identifier(name);
        if let Some(schema) = self.schema_name() {
            index_name = format!("{}.{}", quote_identifier(schema), index_name);
        }
        let table = quote_identifier(self.table_name().unwrap_or_default());

        builder.push_str(&format!(" INDEX {index_name} ON {table}"));
        if let Some(index_type) = options.index_type.as_deref() {
            builder.push(' ');
            builder.push_str(index_type);
        }

        let fields = keys
            .iter()
            .map(|(column, ascending)| {
                let column = quote_identifier(column);
                if *ascending {
                    column
                } else {
                    format!("{column} DESC")
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        builder.push_str(&format!("({fields})"));

        self.ensure_schema(builder);
    }

    pub fn clear_schema(&mut self) {
        self.statements.clear();
    }

    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

/// Hook that declares the DDL for a persistence component.
pub trait SchemaDefinition: Send + Sync {
    fn define_schema(&self, schema: &mut SchemaBuilder);
}

impl<F> SchemaDefinition for F
where
    F: Fn(&mut SchemaBuilder) + Send + Sync,
{
    fn define_schema(&self, schema: &mut SchemaBuilder) {
        self(schema)
    }
}

/// Declares nothing; the table is expected to exist already.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSchema;

impl SchemaDefinition for NoSchema {
    fn define_schema(&self, _schema: &mut SchemaBuilder) {}
}
