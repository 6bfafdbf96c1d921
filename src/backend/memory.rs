//! In-memory reference store.
//!
//! A small, fully in-process implementation of the [`Store`] contract, used
//! by the test suite and for prototyping, the analog of opening a real
//! engine in memory mode. It understands exactly the statement shapes the
//! schema layer generates (`CREATE TABLE IF NOT EXISTS`, `DROP TABLE IF
//! EXISTS`) and the selection forms the access layer builds (`<col>=?`,
//! `<col> IN (?,...)`).
//!
//! Handles are cheap clones over shared state, so "open per execution"
//! works the same way it would against a file-backed engine.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::backend::{OpenStore, RecordSet, Store};
use crate::error::DbError;
use crate::query_args::QueryArgs;
use crate::value::StoreValue;

const CREATE_PREFIX: &str = "CREATE TABLE IF NOT EXISTS ";
const DROP_PREFIX: &str = "DROP TABLE IF EXISTS ";

/// Shared in-memory store; clone to open additional handles.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Shared>>,
}

#[derive(Default)]
struct Shared {
    tables: HashMap<String, MemTable>,
}

struct MemTable {
    columns: Vec<String>,
    identity: Option<usize>,
    rows: Vec<Vec<StoreValue>>,
    next_id: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn shared(&self) -> MutexGuard<'_, Shared> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl OpenStore for MemoryStore {
    fn open(&self) -> Result<Box<dyn Store>, DbError> {
        Ok(Box::new(self.clone()))
    }
}

impl Store for MemoryStore {
    fn create_table(&mut self, ddl: &str) -> Result<(), DbError> {
        let rest = ddl
            .strip_prefix(CREATE_PREFIX)
            .ok_or_else(|| DbError::store(format!("unsupported create statement: {ddl}")))?;
        let (name, columns) = rest
            .split_once(" (")
            .and_then(|(name, cols)| Some((name, cols.strip_suffix(')')?)))
            .ok_or_else(|| DbError::store(format!("malformed create statement: {ddl}")))?;

        let mut shared = self.shared();
        if shared.tables.contains_key(name) {
            // IF NOT EXISTS
            return Ok(());
        }

        let mut names = Vec::new();
        let mut identity = None;
        for fragment in columns.split(',') {
            let fragment = fragment.trim();
            let column = fragment
                .split_whitespace()
                .next()
                .ok_or_else(|| DbError::store(format!("malformed column fragment: {fragment}")))?;
            if fragment.contains("PRIMARY KEY") {
                identity = Some(names.len());
            }
            names.push(column.to_string());
        }
        shared.tables.insert(
            name.to_string(),
            MemTable {
                columns: names,
                identity,
                rows: Vec::new(),
                next_id: 1,
            },
        );
        Ok(())
    }

    fn drop_table(&mut self, ddl: &str) -> Result<(), DbError> {
        let name = ddl
            .strip_prefix(DROP_PREFIX)
            .ok_or_else(|| DbError::store(format!("unsupported drop statement: {ddl}")))?;
        // IF EXISTS
        self.shared().tables.remove(name);
        Ok(())
    }

    fn query(
        &mut self,
        table: &str,
        projection: &[&str],
        args: &QueryArgs,
    ) -> Result<Box<dyn RecordSet>, DbError> {
        if args.group_by().is_some() || args.having().is_some() {
            return Err(DbError::store(
                "group_by/having are not supported by the in-memory store",
            ));
        }

        let shared = self.shared();
        let mem = lookup(&shared, table)?;
        let matcher = Matcher::compile(mem, args.selection(), args.selection_args())?;

        let mut selected: Vec<&Vec<StoreValue>> =
            mem.rows.iter().filter(|r| matcher.matches(r)).collect();

        if let Some(order_by) = args.order_by() {
            let (column, descending) = parse_order_by(order_by);
            let idx = column_index(mem, column)?;
            selected.sort_by(|a, b| {
                let ord = compare(&a[idx], &b[idx]);
                if descending { ord.reverse() } else { ord }
            });
        }

        // projected columns the table actually has; missing names are left
        // out so the reader can surface the shape disagreement itself
        let mut names = Vec::new();
        let mut indices = Vec::new();
        for wanted in projection {
            if let Some(idx) = mem.columns.iter().position(|c| c == wanted) {
                names.push(wanted.to_string());
                indices.push(idx);
            }
        }

        let mut records: Vec<Vec<StoreValue>> = selected
            .into_iter()
            .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
            .collect();

        if args.distinct() {
            let mut unique: Vec<Vec<StoreValue>> = Vec::new();
            for record in records {
                if !unique.contains(&record) {
                    unique.push(record);
                }
            }
            records = unique;
        }

        if let Some(limit) = args.limit() {
            records.truncate(limit as usize);
        }

        Ok(Box::new(MemRecordSet {
            columns: names,
            records: records.into_iter(),
        }))
    }

    fn insert(&mut self, table: &str, values: Vec<(String, StoreValue)>) -> Result<i64, DbError> {
        let mut shared = self.shared();
        let mem = lookup_mut(&mut shared, table)?;
        for (name, _) in &values {
            column_index(mem, name)?;
        }

        let id = mem.next_id;
        mem.next_id += 1;

        // the id goes to whichever column carried PRIMARY KEY in the DDL
        let record = mem
            .columns
            .iter()
            .enumerate()
            .map(|(idx, column)| {
                if Some(idx) == mem.identity {
                    StoreValue::Integer(id)
                } else {
                    values
                        .iter()
                        .find(|(name, _)| name == column)
                        .map(|(_, value)| value.clone())
                        .unwrap_or(StoreValue::Null)
                }
            })
            .collect();
        mem.rows.push(record);
        Ok(id)
    }

    fn update(
        &mut self,
        table: &str,
        values: Vec<(String, StoreValue)>,
        selection: Option<&str>,
        args: &[StoreValue],
    ) -> Result<u64, DbError> {
        let mut shared = self.shared();
        let mem = lookup_mut(&mut shared, table)?;
        let matcher = Matcher::compile(mem, selection, args)?;

        let mut updates = Vec::with_capacity(values.len());
        for (name, value) in values {
            updates.push((column_index(mem, &name)?, value));
        }

        let mut affected = 0;
        for row in &mut mem.rows {
            if matcher.matches(row) {
                for (idx, value) in &updates {
                    row[*idx] = value.clone();
                }
                affected += 1;
            }
        }
        Ok(affected)
    }

    fn delete(
        &mut self,
        table: &str,
        selection: Option<&str>,
        args: &[StoreValue],
    ) -> Result<u64, DbError> {
        let mut shared = self.shared();
        let mem = lookup_mut(&mut shared, table)?;
        let matcher = Matcher::compile(mem, selection, args)?;

        let before = mem.rows.len();
        mem.rows.retain(|row| !matcher.matches(row));
        Ok((before - mem.rows.len()) as u64)
    }
}

fn lookup<'a>(shared: &'a Shared, table: &str) -> Result<&'a MemTable, DbError> {
    shared
        .tables
        .get(table)
        .ok_or_else(|| DbError::store(format!("no such table: {table}")))
}

fn lookup_mut<'a>(shared: &'a mut Shared, table: &str) -> Result<&'a mut MemTable, DbError> {
    shared
        .tables
        .get_mut(table)
        .ok_or_else(|| DbError::store(format!("no such table: {table}")))
}

fn column_index(mem: &MemTable, name: &str) -> Result<usize, DbError> {
    mem.columns
        .iter()
        .position(|c| c == name)
        .ok_or_else(|| DbError::store(format!("no such column: {name}")))
}

fn parse_order_by(order_by: &str) -> (&str, bool) {
    let trimmed = order_by.trim();
    if let Some(column) = trimmed.strip_suffix(" DESC") {
        (column.trim(), true)
    } else if let Some(column) = trimmed.strip_suffix(" ASC") {
        (column.trim(), false)
    } else {
        (trimmed, false)
    }
}

/// Compiled form of the selection grammar the access layer generates.
enum Matcher {
    All,
    Eq { column: usize, value: StoreValue },
    In { column: usize, values: Vec<StoreValue> },
}

impl Matcher {
    fn compile(
        mem: &MemTable,
        selection: Option<&str>,
        args: &[StoreValue],
    ) -> Result<Self, DbError> {
        let Some(selection) = selection else {
            return Ok(Matcher::All);
        };
        let selection = selection.trim();

        if let Some(column) = selection.strip_suffix("=?") {
            let [value] = args else {
                return Err(DbError::store(format!(
                    "selection '{selection}' expects exactly one argument, got {}",
                    args.len()
                )));
            };
            return Ok(Matcher::Eq {
                column: column_index(mem, column.trim())?,
                value: value.clone(),
            });
        }

        if let Some((column, placeholders)) = selection.split_once(" IN (") {
            let placeholders = placeholders
                .strip_suffix(')')
                .ok_or_else(|| DbError::store(format!("malformed selection: {selection}")))?;
            let expected = placeholders.split(',').count();
            if expected != args.len() {
                return Err(DbError::store(format!(
                    "selection '{selection}' expects {expected} arguments, got {}",
                    args.len()
                )));
            }
            return Ok(Matcher::In {
                column: column_index(mem, column.trim())?,
                values: args.to_vec(),
            });
        }

        Err(DbError::store(format!(
            "unsupported selection grammar: {selection}"
        )))
    }

    fn matches(&self, row: &[StoreValue]) -> bool {
        match self {
            Matcher::All => true,
            Matcher::Eq { column, value } => &row[*column] == value,
            Matcher::In { column, values } => values.contains(&row[*column]),
        }
    }
}

fn compare(a: &StoreValue, b: &StoreValue) -> Ordering {
    use StoreValue::*;
    match (a, b) {
        (Null, Null) => Ordering::Equal,
        (Null, _) => Ordering::Less,
        (_, Null) => Ordering::Greater,
        (Integer(x), Integer(y)) => x.cmp(y),
        (Integer(x), Real(y)) => (*x as f64).partial_cmp(y).unwrap_or(Ordering::Equal),
        (Real(x), Integer(y)) => x.partial_cmp(&(*y as f64)).unwrap_or(Ordering::Equal),
        (Real(x), Real(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Text(x), Text(y)) => x.cmp(y),
        (Blob(x), Blob(y)) => x.cmp(y),
        (Integer(_) | Real(_), _) => Ordering::Less,
        (_, Integer(_) | Real(_)) => Ordering::Greater,
        (Text(_), Blob(_)) => Ordering::Less,
        (Blob(_), Text(_)) => Ordering::Greater,
    }
}

struct MemRecordSet {
    columns: Vec<String>,
    records: std::vec::IntoIter<Vec<StoreValue>>,
}

impl RecordSet for MemRecordSet {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_record(&mut self) -> Result<Option<Vec<StoreValue>>, DbError> {
        Ok(self.records.next())
    }
}
