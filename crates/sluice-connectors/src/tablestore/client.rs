//! The table-store client abstraction and an in-memory implementation.
//!
//! [`TableStoreClient`] captures exactly what the connector needs from
//! the store: table lifecycle with eventual-consistency signals, batched
//! entity-group submission under the store's hard operation cap, and
//! paged queries in the store's restricted filter language.
//!
//! [`MemoryTableStore`] implements the contract in memory for testing
//! and embedded use. It evaluates the same query-language strings the
//! connector renders, records submitted batch sizes, and can simulate
//! the store's delete-reclaim latency so retry discipline is testable.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use parking_lot::{Mutex, RwLock};

use sluice_core::{compare, Operator, Value};

use crate::error::{ConnectorError, Result};

/// The store's hard cap on operations per submitted batch.
pub const MAX_BATCH_OPERATIONS: usize = 100;

/// One stored entity: partition key, row key, store-managed timestamp,
/// and typed properties.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreEntity {
    /// Partition key.
    pub partition_key: String,
    /// Row key, unique within a partition.
    pub row_key: String,
    /// Store-managed modification timestamp.
    pub timestamp: Option<NaiveDateTime>,
    /// Named property values.
    pub properties: BTreeMap<String, Value>,
}

impl StoreEntity {
    /// Creates an entity with the given keys and no properties.
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
            timestamp: None,
            properties: BTreeMap::new(),
        }
    }

    /// Adds a property.
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: Value) -> Self {
        self.properties.insert(name.into(), value);
        self
    }
}

/// One mutation inside a batch.
#[derive(Debug, Clone)]
pub enum BatchOperation {
    /// Insert a new entity; fails if the key pair already exists.
    Insert(StoreEntity),
    /// Insert or replace an entity.
    Upsert(StoreEntity),
    /// Delete by key pair.
    Delete {
        /// Partition key of the entity to delete.
        partition_key: String,
        /// Row key of the entity to delete.
        row_key: String,
    },
}

impl BatchOperation {
    /// The (partition, row) key pair this operation addresses.
    #[must_use]
    pub fn keys(&self) -> (&str, &str) {
        match self {
            BatchOperation::Insert(e) | BatchOperation::Upsert(e) => {
                (&e.partition_key, &e.row_key)
            }
            BatchOperation::Delete {
                partition_key,
                row_key,
            } => (partition_key, row_key),
        }
    }
}

/// Result of a create-if-not-exists probe.
///
/// `PendingDeletion` is the eventual-consistency signal: a same-named
/// table was deleted recently and the store's garbage collector has not
/// reclaimed it yet, so creation must be retried after a delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableCreateOutcome {
    /// The table was created.
    Created,
    /// The table already existed.
    AlreadyExists,
    /// A deleted table of the same name is still being reclaimed.
    PendingDeletion,
}

/// One page of query results with an optional continuation token.
#[derive(Debug, Clone, Default)]
pub struct Page {
    /// Entities in this page.
    pub entities: Vec<StoreEntity>,
    /// Opaque token for the next page; `None` when exhausted.
    pub continuation: Option<String>,
}

/// What the connector needs from the physical table store.
#[async_trait]
pub trait TableStoreClient: Send + Sync {
    /// Creates the table unless it exists, reporting the outcome.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    async fn create_table_if_not_exists(&self, table: &str) -> Result<TableCreateOutcome>;

    /// Deletes the table, returning whether it existed.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    async fn delete_table(&self, table: &str) -> Result<bool>;

    /// Returns `true` when the table exists.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    async fn table_exists(&self, table: &str) -> Result<bool>;

    /// Lists all tables.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Submits one batch of operations. All operations must share a
    /// partition and the batch must respect [`MAX_BATCH_OPERATIONS`].
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::BatchTooLarge`] for an oversized batch
    /// and propagates store errors.
    async fn submit_batch(&self, table: &str, operations: Vec<BatchOperation>) -> Result<()>;

    /// Runs a paged query. `filter` is a store query-language string,
    /// `top` caps the returned entities, and `continuation` resumes a
    /// prior page.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::TableNotFound`] for a missing table and
    /// propagates store errors.
    async fn query(
        &self,
        table: &str,
        filter: Option<&str>,
        top: Option<usize>,
        continuation: Option<&str>,
    ) -> Result<Page>;
}

type EntityMap = BTreeMap<(String, String), StoreEntity>;

/// Separator between partition and row key inside continuation tokens.
const TOKEN_SEPARATOR: char = '\u{1}';

/// In-memory [`TableStoreClient`] for testing and embedded use.
///
/// Entities are held per table in key order, so paging is
/// deterministic. `reclaim_polls` simulates the store's background
/// deletion latency: after a delete, that many create probes observe
/// [`TableCreateOutcome::PendingDeletion`] before creation succeeds.
#[derive(Debug, Default)]
pub struct MemoryTableStore {
    tables: RwLock<HashMap<String, EntityMap>>,
    pending_deletion: Mutex<HashMap<String, u32>>,
    batch_log: Mutex<Vec<usize>>,
    reclaim_polls: u32,
    page_size: usize,
}

impl MemoryTableStore {
    /// Creates an empty store with the default page size (1000).
    #[must_use]
    pub fn new() -> Self {
        Self {
            page_size: 1000,
            ..Self::default()
        }
    }

    /// Shared handle constructor, since the connector holds the client
    /// behind an `Arc`.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Simulates delete-reclaim latency: after a delete, `polls` create
    /// probes observe `PendingDeletion`.
    #[must_use]
    pub fn with_reclaim_polls(mut self, polls: u32) -> Self {
        self.reclaim_polls = polls;
        self
    }

    /// Caps entities per returned page, forcing continuation tokens.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Sizes of every batch submitted so far, in submission order.
    #[must_use]
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_log.lock().clone()
    }

    /// Total entities currently stored in `table`.
    #[must_use]
    pub fn entity_count(&self, table: &str) -> usize {
        self.tables.read().get(table).map_or(0, BTreeMap::len)
    }
}

#[async_trait]
impl TableStoreClient for MemoryTableStore {
    async fn create_table_if_not_exists(&self, table: &str) -> Result<TableCreateOutcome> {
        {
            let mut pending = self.pending_deletion.lock();
            if let Some(remaining) = pending.get_mut(table) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Ok(TableCreateOutcome::PendingDeletion);
                }
                pending.remove(table);
            }
        }
        let mut tables = self.tables.write();
        if tables.contains_key(table) {
            Ok(TableCreateOutcome::AlreadyExists)
        } else {
            tables.insert(table.to_string(), BTreeMap::new());
            Ok(TableCreateOutcome::Created)
        }
    }

    async fn delete_table(&self, table: &str) -> Result<bool> {
        let existed = self.tables.write().remove(table).is_some();
        if existed && self.reclaim_polls > 0 {
            self.pending_deletion
                .lock()
                .insert(table.to_string(), self.reclaim_polls);
        }
        Ok(existed)
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        Ok(self.tables.read().contains_key(table))
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn submit_batch(&self, table: &str, operations: Vec<BatchOperation>) -> Result<()> {
        if operations.len() > MAX_BATCH_OPERATIONS {
            return Err(ConnectorError::BatchTooLarge {
                size: operations.len(),
                max: MAX_BATCH_OPERATIONS,
            });
        }
        if let Some(first) = operations.first() {
            let partition = first.keys().0.to_string();
            if operations.iter().any(|op| op.keys().0 != partition) {
                return Err(ConnectorError::Write(
                    "batch operations must share one partition".into(),
                ));
            }
        }

        let mut tables = self.tables.write();
        let entities = tables
            .get_mut(table)
            .ok_or_else(|| ConnectorError::TableNotFound(table.to_string()))?;

        // Validate first so a failing batch applies nothing.
        for operation in &operations {
            let (pk, rk) = operation.keys();
            let key = (pk.to_string(), rk.to_string());
            match operation {
                BatchOperation::Insert(_) if entities.contains_key(&key) => {
                    return Err(ConnectorError::Write(format!(
                        "entity already exists: {pk}/{rk}"
                    )));
                }
                BatchOperation::Delete { .. } if !entities.contains_key(&key) => {
                    return Err(ConnectorError::Write(format!("entity not found: {pk}/{rk}")));
                }
                _ => {}
            }
        }

        let now = chrono::Utc::now().naive_utc();
        for operation in operations.iter() {
            let (pk, rk) = operation.keys();
            let key = (pk.to_string(), rk.to_string());
            match operation {
                BatchOperation::Insert(entity) | BatchOperation::Upsert(entity) => {
                    let mut stored = entity.clone();
                    stored.timestamp = Some(now);
                    entities.insert(key, stored);
                }
                BatchOperation::Delete { .. } => {
                    entities.remove(&key);
                }
            }
        }

        self.batch_log.lock().push(operations.len());
        Ok(())
    }

    async fn query(
        &self,
        table: &str,
        filter: Option<&str>,
        top: Option<usize>,
        continuation: Option<&str>,
    ) -> Result<Page> {
        let tables = self.tables.read();
        let entities = tables
            .get(table)
            .ok_or_else(|| ConnectorError::TableNotFound(table.to_string()))?;

        let predicate = filter.map(language::parse).transpose()?;

        let start: Bound<(String, String)> = match continuation {
            Some(token) => {
                let (pk, rk) = token.split_once(TOKEN_SEPARATOR).ok_or_else(|| {
                    ConnectorError::Read(format!("malformed continuation token '{token}'"))
                })?;
                Bound::Excluded((pk.to_string(), rk.to_string()))
            }
            None => Bound::Unbounded,
        };

        let limit = top.unwrap_or(usize::MAX).min(self.page_size);
        let mut page = Page::default();
        let mut last_key: Option<(String, String)> = None;
        let mut more = false;
        for (key, entity) in entities.range((start, Bound::Unbounded)) {
            if let Some(predicate) = &predicate {
                if !predicate.matches(entity)? {
                    continue;
                }
            }
            if page.entities.len() == limit {
                more = true;
                break;
            }
            page.entities.push(entity.clone());
            last_key = Some(key.clone());
        }
        if more {
            if let Some((pk, rk)) = last_key {
                page.continuation = Some(format!("{pk}{TOKEN_SEPARATOR}{rk}"));
            }
        }
        Ok(page)
    }
}

/// Parser and evaluator for the store's restricted query language.
///
/// Grammar: `expr := and_expr ('or' and_expr)*`,
/// `and_expr := primary ('and' primary)*`,
/// `primary := '(' expr ')' | ident op literal`.
/// Literals: `'string'` (doubled-quote escape), `guid'…'`,
/// `datetime'…'`, `true`/`false`, `5` (32-bit), `5L` (64-bit), `5.0`
/// (double). `and` binds tighter than `or`.
mod language {
    use super::{compare, ConnectorError, Operator, Result, StoreEntity, Value};

    /// A parsed predicate tree.
    #[derive(Debug)]
    pub enum Predicate {
        /// `ident op literal`
        Clause(String, Operator, Value),
        /// Conjunction.
        And(Box<Predicate>, Box<Predicate>),
        /// Disjunction.
        Or(Box<Predicate>, Box<Predicate>),
    }

    impl Predicate {
        /// Evaluates the predicate against one entity. Entities missing
        /// a referenced property never match.
        pub fn matches(&self, entity: &StoreEntity) -> Result<bool> {
            match self {
                Predicate::Clause(field, operator, literal) => {
                    let Some(actual) = field_value(entity, field) else {
                        return Ok(false);
                    };
                    let ordering = compare(literal.type_code(), &actual, literal)
                        .map_err(ConnectorError::from)?;
                    Ok(operator.matches(ordering))
                }
                Predicate::And(a, b) => Ok(a.matches(entity)? && b.matches(entity)?),
                Predicate::Or(a, b) => Ok(a.matches(entity)? || b.matches(entity)?),
            }
        }
    }

    fn field_value(entity: &StoreEntity, field: &str) -> Option<Value> {
        match field {
            "PartitionKey" => Some(Value::String(entity.partition_key.clone())),
            "RowKey" => Some(Value::String(entity.row_key.clone())),
            "Timestamp" => entity.timestamp.map(Value::DateTime),
            _ => entity.properties.get(field).cloned(),
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Token {
        Ident(String),
        Op(Operator),
        And,
        Or,
        LParen,
        RParen,
        Literal(Value),
    }

    /// Parses a filter string into a predicate tree.
    pub fn parse(filter: &str) -> Result<Predicate> {
        let tokens = tokenize(filter)?;
        let mut parser = Parser { tokens, pos: 0 };
        let predicate = parser.parse_or()?;
        if parser.pos != parser.tokens.len() {
            return Err(bad(filter, "trailing tokens"));
        }
        Ok(predicate)
    }

    fn bad(filter: &str, reason: &str) -> ConnectorError {
        ConnectorError::Read(format!("malformed filter '{filter}': {reason}"))
    }

    struct Parser {
        tokens: Vec<Token>,
        pos: usize,
    }

    impl Parser {
        fn next(&mut self) -> Option<Token> {
            let token = self.tokens.get(self.pos).cloned();
            if token.is_some() {
                self.pos += 1;
            }
            token
        }

        fn parse_or(&mut self) -> Result<Predicate> {
            let mut left = self.parse_and()?;
            while matches!(self.tokens.get(self.pos), Some(Token::Or)) {
                self.pos += 1;
                let right = self.parse_and()?;
                left = Predicate::Or(Box::new(left), Box::new(right));
            }
            Ok(left)
        }

        fn parse_and(&mut self) -> Result<Predicate> {
            let mut left = self.parse_primary()?;
            while matches!(self.tokens.get(self.pos), Some(Token::And)) {
                self.pos += 1;
                let right = self.parse_primary()?;
                left = Predicate::And(Box::new(left), Box::new(right));
            }
            Ok(left)
        }

        fn parse_primary(&mut self) -> Result<Predicate> {
            match self.next() {
                Some(Token::LParen) => {
                    let inner = self.parse_or()?;
                    match self.next() {
                        Some(Token::RParen) => Ok(inner),
                        _ => Err(ConnectorError::Read("unbalanced parentheses".into())),
                    }
                }
                Some(Token::Ident(field)) => {
                    let operator = match self.next() {
                        Some(Token::Op(op)) => op,
                        _ => return Err(ConnectorError::Read("expected operator".into())),
                    };
                    match self.next() {
                        Some(Token::Literal(value)) => {
                            Ok(Predicate::Clause(field, operator, value))
                        }
                        _ => Err(ConnectorError::Read("expected literal".into())),
                    }
                }
                _ => Err(ConnectorError::Read("expected clause".into())),
            }
        }
    }

    #[allow(clippy::too_many_lines)]
    fn tokenize(filter: &str) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        let mut chars = filter.chars().peekable();
        while let Some(&c) = chars.peek() {
            match c {
                c if c.is_whitespace() => {
                    chars.next();
                }
                '(' => {
                    chars.next();
                    tokens.push(Token::LParen);
                }
                ')' => {
                    chars.next();
                    tokens.push(Token::RParen);
                }
                '\'' => {
                    chars.next();
                    tokens.push(Token::Literal(Value::String(read_quoted(
                        filter, &mut chars,
                    )?)));
                }
                c if c.is_ascii_digit() || c == '-' => {
                    let mut number = String::new();
                    number.push(c);
                    chars.next();
                    while let Some(&d) = chars.peek() {
                        if d.is_ascii_digit() || d == '.' || d == 'e' || d == 'E' || d == '+' {
                            number.push(d);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    if chars.peek() == Some(&'L') {
                        chars.next();
                        let n = number
                            .parse::<i64>()
                            .map_err(|_| bad(filter, "bad 64-bit literal"))?;
                        tokens.push(Token::Literal(Value::Int64(n)));
                    } else if number.contains('.') || number.contains('e') || number.contains('E')
                    {
                        let f = number
                            .parse::<f64>()
                            .map_err(|_| bad(filter, "bad double literal"))?;
                        tokens.push(Token::Literal(Value::Double(f)));
                    } else {
                        let n = number
                            .parse::<i32>()
                            .map_err(|_| bad(filter, "bad 32-bit literal"))?;
                        tokens.push(Token::Literal(Value::Int32(n)));
                    }
                }
                c if c.is_ascii_alphabetic() || c == '_' => {
                    let mut word = String::new();
                    while let Some(&w) = chars.peek() {
                        if w.is_ascii_alphanumeric() || w == '_' {
                            word.push(w);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    // Typed literal prefixes attach directly to a quote.
                    if (word == "guid" || word == "datetime") && chars.peek() == Some(&'\'') {
                        chars.next();
                        let text = read_quoted(filter, &mut chars)?;
                        let value = if word == "guid" {
                            uuid::Uuid::parse_str(&text)
                                .map(Value::Guid)
                                .map_err(|_| bad(filter, "bad guid literal"))?
                        } else {
                            chrono::NaiveDateTime::parse_from_str(&text, "%Y-%m-%dT%H:%M:%S%.f")
                                .map(Value::DateTime)
                                .map_err(|_| bad(filter, "bad datetime literal"))?
                        };
                        tokens.push(Token::Literal(value));
                        continue;
                    }
                    tokens.push(match word.as_str() {
                        "and" => Token::And,
                        "or" => Token::Or,
                        "eq" => Token::Op(Operator::Equal),
                        "ne" => Token::Op(Operator::NotEqual),
                        "gt" => Token::Op(Operator::GreaterThan),
                        "ge" => Token::Op(Operator::GreaterThanEqual),
                        "lt" => Token::Op(Operator::LessThan),
                        "le" => Token::Op(Operator::LessThanEqual),
                        "true" => Token::Literal(Value::Boolean(true)),
                        "false" => Token::Literal(Value::Boolean(false)),
                        _ => Token::Ident(word),
                    });
                }
                _ => return Err(bad(filter, "unexpected character")),
            }
        }
        Ok(tokens)
    }

    fn read_quoted(
        filter: &str,
        chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    ) -> Result<String> {
        let mut text = String::new();
        loop {
            match chars.next() {
                Some('\'') => {
                    // A doubled quote is an escaped quote.
                    if chars.peek() == Some(&'\'') {
                        chars.next();
                        text.push('\'');
                    } else {
                        return Ok(text);
                    }
                }
                Some(c) => text.push(c),
                None => return Err(bad(filter, "unterminated string literal")),
            }
        }
    }
}
