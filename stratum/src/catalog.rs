use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{DbError, DbResult};
use crate::heap_file::HeapFile;
use crate::schema::TupleDesc;

/// The table registry: maps table ids to their heap files and names. The
/// buffer pool resolves page fetches through it, and the query layer uses
/// it to find schemas. Registering a file under an existing id or name
/// replaces the previous entry.
#[derive(Debug, Default)]
pub struct Catalog {
    state: RwLock<CatalogState>,
}

#[derive(Debug, Default)]
struct CatalogState {
    tables: HashMap<i32, Arc<HeapFile>>,
    names: HashMap<i32, String>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(&self, file: Arc<HeapFile>, name: &str) {
        let mut state = self.write_state();
        let table_id = file.table_id();
        if let Some((&old_id, _)) = state
            .names
            .iter()
            .find(|(_, n)| n.as_str() == name)
        {
            if old_id != table_id {
                state.tables.remove(&old_id);
                state.names.remove(&old_id);
            }
        }
        state.tables.insert(table_id, file);
        state.names.insert(table_id, name.to_string());
    }

    pub fn get_table(&self, table_id: i32) -> DbResult<Arc<HeapFile>> {
        self.read_state()
            .tables
            .get(&table_id)
            .cloned()
            .ok_or(DbError::TableNotFound(table_id))
    }

    pub fn tuple_desc(&self, table_id: i32) -> DbResult<Arc<TupleDesc>> {
        Ok(self.get_table(table_id)?.tuple_desc().clone())
    }

    pub fn table_name(&self, table_id: i32) -> DbResult<String> {
        self.read_state()
            .names
            .get(&table_id)
            .cloned()
            .ok_or(DbError::TableNotFound(table_id))
    }

    pub fn table_ids(&self) -> Vec<i32> {
        self.read_state().tables.keys().copied().collect()
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, CatalogState> {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, CatalogState> {
        self.state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
