// System catalog: tables, their heaps, and their secondary indexes
//
// The catalog hands out shared, non-owning views; heaps and indexes
// outlive any executor tree that borrows them.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::catalog::schema::Schema;
use crate::index::{HashIndex, Index, IndexError};
use crate::storage::buffer::ParallelBufferPool;
use crate::storage::table::{TableHeap, TableHeapError, TableIterator};
use crate::transaction::lock_manager::LockManager;
use crate::transaction::transaction::Transaction;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Table '{0}' already exists")]
    TableExists(String),

    #[error("Table '{0}' not found")]
    TableNotFound(String),

    #[error("Index '{0}' already exists")]
    IndexExists(String),

    #[error("Table heap error: {0}")]
    TableHeap(#[from] TableHeapError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),
}

pub struct TableInfo {
    pub name: String,
    pub oid: u32,
    pub schema: Schema,
    pub heap: Arc<TableHeap>,
}

pub struct IndexInfo {
    pub name: String,
    pub oid: u32,
    pub table_name: String,
    pub key_schema: Schema,
    pub key_attrs: Vec<usize>,
    pub index: Arc<dyn Index>,
}

pub struct Catalog {
    buffer_pool: Arc<ParallelBufferPool>,
    lock_manager: Option<Arc<LockManager>>,
    tables: HashMap<u32, Arc<TableInfo>>,
    table_names: HashMap<String, u32>,
    indexes: HashMap<u32, Arc<IndexInfo>>,
    index_names: HashMap<(String, String), u32>,
    next_table_oid: u32,
    next_index_oid: u32,
}

impl Catalog {
    pub fn new(
        buffer_pool: Arc<ParallelBufferPool>,
        lock_manager: Option<Arc<LockManager>>,
    ) -> Self {
        Self {
            buffer_pool,
            lock_manager,
            tables: HashMap::new(),
            table_names: HashMap::new(),
            indexes: HashMap::new(),
            index_names: HashMap::new(),
            next_table_oid: 0,
            next_index_oid: 0,
        }
    }

    pub fn create_table(
        &mut self,
        name: impl Into<String>,
        schema: Schema,
    ) -> Result<Arc<TableInfo>, CatalogError> {
        let name = name.into();
        if self.table_names.contains_key(&name) {
            return Err(CatalogError::TableExists(name));
        }

        let oid = self.next_table_oid;
        self.next_table_oid += 1;

        let heap = Arc::new(TableHeap::new(
            self.buffer_pool.clone(),
            self.lock_manager.clone(),
            oid,
        )?);
        let info = Arc::new(TableInfo {
            name: name.clone(),
            oid,
            schema,
            heap,
        });

        self.tables.insert(oid, info.clone());
        self.table_names.insert(name, oid);
        Ok(info)
    }

    pub fn get_table(&self, oid: u32) -> Option<Arc<TableInfo>> {
        self.tables.get(&oid).cloned()
    }

    pub fn get_table_by_name(&self, name: &str) -> Option<Arc<TableInfo>> {
        self.table_names.get(name).and_then(|oid| self.get_table(*oid))
    }

    /// Create a hash index over `key_attrs` of an existing table and
    /// backfill it from the rows already in the heap
    pub fn create_index(
        &mut self,
        _txn: &Arc<Transaction>,
        index_name: impl Into<String>,
        table_name: &str,
        key_attrs: Vec<usize>,
    ) -> Result<Arc<IndexInfo>, CatalogError> {
        let index_name = index_name.into();
        let table = self
            .get_table_by_name(table_name)
            .ok_or_else(|| CatalogError::TableNotFound(table_name.to_string()))?;

        let name_key = (table_name.to_string(), index_name.clone());
        if self.index_names.contains_key(&name_key) {
            return Err(CatalogError::IndexExists(index_name));
        }

        let oid = self.next_index_oid;
        self.next_index_oid += 1;

        let index: Arc<dyn Index> = Arc::new(HashIndex::new(self.buffer_pool.clone())?);

        // backfill from existing rows
        let mut iter = TableIterator::new(table.heap.clone());
        while let Some(rid) = iter.next_rid()? {
            let tuple = table.heap.get_tuple(rid)?;
            index.insert_entry(&tuple.key_from_tuple(&key_attrs), rid)?;
        }

        let info = Arc::new(IndexInfo {
            name: index_name,
            oid,
            table_name: table_name.to_string(),
            key_schema: table.schema.project(&key_attrs),
            key_attrs,
            index,
        });

        self.indexes.insert(oid, info.clone());
        self.index_names.insert(name_key, oid);
        Ok(info)
    }

    pub fn get_index(&self, oid: u32) -> Option<Arc<IndexInfo>> {
        self.indexes.get(&oid).cloned()
    }

    /// Every index defined on a table
    pub fn get_table_indexes(&self, table_name: &str) -> Vec<Arc<IndexInfo>> {
        let mut infos: Vec<Arc<IndexInfo>> = self
            .indexes
            .values()
            .filter(|info| info.table_name == table_name)
            .cloned()
            .collect();
        infos.sort_by_key(|info| info.oid);
        infos
    }
}
