//! Record repository implementation

use crate::error::Result;
use crate::models::{Collection, Fields, Record, RecordId};
use libsql::{params, Connection, Row};

/// Trait for record storage operations (async)
#[allow(async_fn_in_trait)]
pub trait RecordRepository {
    /// Get a record by collection and id
    async fn get(&self, collection: Collection, id: &RecordId) -> Result<Option<Record>>;

    /// All records of a collection, in storage order
    async fn list(&self, collection: Collection) -> Result<Vec<Record>>;

    /// Insert or overwrite a whole record
    async fn put(&self, collection: Collection, record: &Record) -> Result<()>;

    /// Remove a record; missing records are not an error
    async fn delete(&self, collection: Collection, id: &RecordId) -> Result<()>;
}

/// libSQL implementation of `RecordRepository`
pub struct LibSqlRecordRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlRecordRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse a record from a database row
    fn parse_record(row: &Row) -> Result<Record> {
        let id: String = row.get(0)?;
        let fields: String = row.get(1)?;
        let sync_status: String = row.get(2)?;

        Ok(Record {
            id: RecordId::parse(&id)?,
            fields: serde_json::from_str::<Fields>(&fields)?,
            sync_status: sync_status.parse()?,
            created_date: row.get(3)?,
            updated_date: row.get(4)?,
        })
    }
}

impl RecordRepository for LibSqlRecordRepository<'_> {
    async fn get(&self, collection: Collection, id: &RecordId) -> Result<Option<Record>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, fields, sync_status, created_date, updated_date
                 FROM records
                 WHERE collection = ? AND id = ?",
                params![collection.as_str(), id.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_record(&row)?)),
            None => Ok(None),
        }
    }

    async fn list(&self, collection: Collection) -> Result<Vec<Record>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, fields, sync_status, created_date, updated_date
                 FROM records
                 WHERE collection = ?
                 ORDER BY rowid",
                params![collection.as_str()],
            )
            .await?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            records.push(Self::parse_record(&row)?);
        }
        Ok(records)
    }

    async fn put(&self, collection: Collection, record: &Record) -> Result<()> {
        let fields = serde_json::to_string(&record.fields)?;

        // Upsert keeps the rowid stable, so storage order is insertion order
        self.conn
            .execute(
                "INSERT INTO records (collection, id, fields, sync_status, created_date, updated_date)
                 VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT(collection, id) DO UPDATE SET
                     fields = excluded.fields,
                     sync_status = excluded.sync_status,
                     created_date = excluded.created_date,
                     updated_date = excluded.updated_date",
                params![
                    collection.as_str(),
                    record.id.as_str(),
                    fields,
                    record.sync_status.as_str(),
                    record.created_date,
                    record.updated_date
                ],
            )
            .await?;

        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &RecordId) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM records WHERE collection = ? AND id = ?",
                params![collection.as_str(), id.as_str()],
            )
            .await?;
        Ok(())
    }
}
