//! OCC record operations inside a redb transaction.

use projectionkit::{HandlerKey, Version};
use redb::{ReadTransaction, ReadableTable, TableDefinition, TableError, WriteTransaction};

/// Name of the table holding `key`'s records.
pub(crate) fn table_name(key: HandlerKey) -> String {
    format!("projection_occ/{key}")
}

fn definition(name: &str) -> TableDefinition<'_, &'static [u8], &'static [u8]> {
    TableDefinition::new(name)
}

pub(crate) fn query(
    tx: &ReadTransaction,
    table: &str,
    resource: &[u8],
) -> Result<Version, redb::Error> {
    let table = match tx.open_table(definition(table)) {
        Ok(table) => table,
        Err(TableError::TableDoesNotExist(_)) => return Ok(Version::absent()),
        Err(error) => return Err(error.into()),
    };

    Ok(table
        .get(resource)?
        .map_or_else(Version::absent, |stored| Version::from(stored.value())))
}

pub(crate) fn store(
    tx: &WriteTransaction,
    table: &str,
    resource: &[u8],
    version: &Version,
) -> Result<(), redb::Error> {
    let mut table = tx.open_table(definition(table))?;
    if version.is_absent() {
        let _ = table.remove(resource)?;
    } else {
        let _ = table.insert(resource, version.as_bytes())?;
    }
    Ok(())
}

/// Compare-and-set. redb serializes write transactions, so the read and
/// the write below cannot interleave with another writer.
pub(crate) fn update(
    tx: &WriteTransaction,
    table: &str,
    resource: &[u8],
    current: &Version,
    next: &Version,
) -> Result<bool, redb::Error> {
    let mut table = tx.open_table(definition(table))?;

    let matches = match table.get(resource)? {
        None => current.is_absent(),
        Some(stored) => !current.is_absent() && stored.value() == current.as_bytes(),
    };
    if !matches {
        return Ok(false);
    }

    if next.is_absent() {
        let _ = table.remove(resource)?;
    } else {
        let _ = table.insert(resource, next.as_bytes())?;
    }
    Ok(true)
}

pub(crate) fn delete(
    tx: &WriteTransaction,
    table: &str,
    resource: &[u8],
) -> Result<(), redb::Error> {
    let mut table = tx.open_table(definition(table))?;
    let _ = table.remove(resource)?;
    Ok(())
}

pub(crate) fn create_table(tx: &WriteTransaction, table: &str) -> Result<(), redb::Error> {
    let _ = tx.open_table(definition(table))?;
    Ok(())
}

/// Returns whether the table existed.
pub(crate) fn drop_table(tx: &WriteTransaction, table: &str) -> Result<bool, redb::Error> {
    Ok(tx.delete_table(definition(table))?)
}
