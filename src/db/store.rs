//! SQLite store backing local mode.
//!
//! Mirrors the REST backend's behavior closely enough that the state store
//! cannot tell the two apart: uuid identities, unique device IPs, backups
//! stamping `last_backup` on their device, newest-first backup listing.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Result as SqlResult, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use uuid::Uuid;

use super::models::*;
use crate::models::{DEFAULT_LOCATION, DEFAULT_SSH_PORT};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f";

/// Database error types.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration error: {0}")]
    Migration(String),
    #[error("Encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Store lock poisoned")]
    Poisoned,
}

/// Thread-safe database store.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Create a new store with the given database path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init()?;
        Ok(store)
    }

    /// Initialize the database schema.
    fn init(&self) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute_batch(include_str!("../../migrations/000001_init.up.sql"))
            .map_err(|e| StoreError::Migration(format!("Migration 1 failed: {}", e)))?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    // --- Devices ---

    /// Insert a device and return the stored record.
    pub fn add_device(&self, device: &DeviceCreate) -> Result<DeviceRecord, StoreError> {
        let id = Uuid::new_v4().to_string();
        let location = if device.location.trim().is_empty() {
            DEFAULT_LOCATION
        } else {
            device.location.as_str()
        };
        let created_at = format_timestamp(Utc::now());

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO devices (id, name, ip, vendor, location, last_backup, created_at) VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6)",
            params![id, device.name, device.ip, device.vendor, location, created_at],
        )
        .map_err(|e| conflict_or(e, format!("a device with IP {} already exists", device.ip)))?;

        query_device(&conn, &id)
    }

    /// Get all devices in registration order.
    pub fn get_devices(&self) -> Result<Vec<DeviceRecord>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, ip, vendor, location, last_backup, created_at FROM devices ORDER BY created_at ASC, rowid ASC",
        )?;
        let devices = stmt
            .query_map([], device_from_row)?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(devices)
    }

    /// Get a device by ID.
    pub fn get_device(&self, id: &str) -> Result<DeviceRecord, StoreError> {
        let conn = self.conn()?;
        query_device(&conn, id)
    }

    /// Apply the non-empty fields of `update` to a device.
    pub fn update_device(&self, id: &str, update: &DeviceUpdate) -> Result<DeviceRecord, StoreError> {
        let conn = self.conn()?;
        let existing = query_device(&conn, id)?;

        let pick = |new: &Option<String>, old: String| match new {
            Some(v) if !v.trim().is_empty() => v.clone(),
            _ => old,
        };
        let name = pick(&update.name, existing.name);
        let ip = pick(&update.ip, existing.ip);
        let vendor = pick(&update.vendor, existing.vendor);
        let location = pick(
            &update.location,
            existing.location.unwrap_or_else(|| DEFAULT_LOCATION.to_string()),
        );

        conn.execute(
            "UPDATE devices SET name=?1, ip=?2, vendor=?3, location=?4 WHERE id=?5",
            params![name, ip, vendor, location, id],
        )
        .map_err(|e| conflict_or(e, format!("a device with IP {} already exists", ip)))?;

        query_device(&conn, id)
    }

    /// Delete a device. Its backups are kept.
    pub fn delete_device(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let n = conn.execute("DELETE FROM devices WHERE id = ?1", params![id])?;
        if n == 0 {
            return Err(StoreError::NotFound("Device"));
        }
        Ok(())
    }

    /// Delete several devices, returning how many existed.
    pub fn delete_devices(&self, ids: &[String]) -> Result<usize, StoreError> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        let mut deleted = 0;
        {
            let mut stmt = tx.prepare("DELETE FROM devices WHERE id = ?1")?;
            for id in ids {
                deleted += stmt.execute(params![id])?;
            }
        }
        tx.commit()?;
        Ok(deleted)
    }

    // --- Backups ---

    /// Store a backup and stamp its device's `last_backup`.
    pub fn add_backup(&self, backup: &BackupCreate) -> Result<BackupRecord, StoreError> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;

        let exists: Option<String> = tx
            .query_row(
                "SELECT id FROM devices WHERE id = ?1",
                params![backup.switch_id],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(StoreError::NotFound("Device"));
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let timestamp = format_timestamp(now);
        let filename = backup.filename.clone().unwrap_or_else(|| {
            format!("{}_{}.txt", backup.switch_id, now.format("%Y-%m-%d-%H-%M-%S"))
        });
        let commands = serde_json::to_string(&backup.commands)?;

        tx.execute(
            "INSERT INTO backups (id, switch_id, timestamp, content, filename, commands, template_name, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?3)",
            params![
                id,
                backup.switch_id,
                timestamp,
                backup.content,
                filename,
                commands,
                backup.template_name,
            ],
        )?;
        tx.execute(
            "UPDATE devices SET last_backup = ?1 WHERE id = ?2",
            params![timestamp, backup.switch_id],
        )?;
        tx.commit()?;

        query_backup(&conn, &id)
    }

    /// Get all backups, newest first.
    pub fn get_backups(&self) -> Result<Vec<BackupRecord>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, switch_id, timestamp, content, filename, commands, template_name FROM backups ORDER BY timestamp DESC, rowid DESC",
        )?;
        let backups = stmt
            .query_map([], backup_from_row)?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(backups)
    }

    /// Get a backup by ID.
    pub fn get_backup(&self, id: &str) -> Result<BackupRecord, StoreError> {
        let conn = self.conn()?;
        query_backup(&conn, id)
    }

    pub fn delete_backup(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let n = conn.execute("DELETE FROM backups WHERE id = ?1", params![id])?;
        if n == 0 {
            return Err(StoreError::NotFound("Backup"));
        }
        Ok(())
    }

    // --- Templates ---

    pub fn add_template(&self, template: &TemplateCreate) -> Result<TemplateRecord, StoreError> {
        let id = Uuid::new_v4().to_string();
        let port = if template.port == 0 { DEFAULT_SSH_PORT } else { template.port };

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO templates (id, name, username, password, port, description, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id,
                template.name,
                template.username,
                template.password,
                port,
                template.description,
                format_timestamp(Utc::now()),
            ],
        )?;
        query_template(&conn, &id)
    }

    pub fn get_templates(&self) -> Result<Vec<TemplateRecord>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, username, password, port, description FROM templates ORDER BY created_at ASC, rowid ASC",
        )?;
        let templates = stmt
            .query_map([], template_from_row)?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(templates)
    }

    pub fn update_template(&self, id: &str, update: &TemplateUpdate) -> Result<TemplateRecord, StoreError> {
        let conn = self.conn()?;
        let existing = query_template(&conn, id)?;

        let pick = |new: &Option<String>, old: String| match new {
            Some(v) if !v.is_empty() => v.clone(),
            _ => old,
        };
        let name = pick(&update.name, existing.name.clone());
        let username = pick(&update.username, existing.username.clone());
        let password = pick(&update.password, existing.password.clone());
        let port = match update.port {
            Some(p) if p > 0 => p,
            _ => existing.port,
        };
        // An explicit empty description clears it.
        let description = update.description.clone().or(existing.description.clone());

        conn.execute(
            "UPDATE templates SET name=?1, username=?2, password=?3, port=?4, description=?5 WHERE id=?6",
            params![name, username, password, port, description, id],
        )?;
        query_template(&conn, id)
    }

    pub fn delete_template(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let n = conn.execute("DELETE FROM templates WHERE id = ?1", params![id])?;
        if n == 0 {
            return Err(StoreError::NotFound("Template"));
        }
        Ok(())
    }
}

fn query_device(conn: &Connection, id: &str) -> Result<DeviceRecord, StoreError> {
    conn.query_row(
        "SELECT id, name, ip, vendor, location, last_backup, created_at FROM devices WHERE id = ?1",
        params![id],
        device_from_row,
    )
    .optional()?
    .ok_or(StoreError::NotFound("Device"))
}

fn query_backup(conn: &Connection, id: &str) -> Result<BackupRecord, StoreError> {
    conn.query_row(
        "SELECT id, switch_id, timestamp, content, filename, commands, template_name FROM backups WHERE id = ?1",
        params![id],
        backup_from_row,
    )
    .optional()?
    .ok_or(StoreError::NotFound("Backup"))
}

fn query_template(conn: &Connection, id: &str) -> Result<TemplateRecord, StoreError> {
    conn.query_row(
        "SELECT id, name, username, password, port, description FROM templates WHERE id = ?1",
        params![id],
        template_from_row,
    )
    .optional()?
    .ok_or(StoreError::NotFound("Template"))
}

fn device_from_row(row: &Row<'_>) -> SqlResult<DeviceRecord> {
    Ok(DeviceRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        ip: row.get(2)?,
        vendor: row.get(3)?,
        location: row.get(4)?,
        last_backup: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn backup_from_row(row: &Row<'_>) -> SqlResult<BackupRecord> {
    let commands: String = row.get(5)?;
    Ok(BackupRecord {
        id: row.get(0)?,
        switch_id: row.get(1)?,
        timestamp: row.get(2)?,
        content: row.get(3)?,
        filename: row.get(4)?,
        commands: serde_json::from_str(&commands).unwrap_or_default(),
        template_name: row.get(6)?,
    })
}

fn template_from_row(row: &Row<'_>) -> SqlResult<TemplateRecord> {
    Ok(TemplateRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        username: row.get(2)?,
        password: row.get(3)?,
        port: row.get(4)?,
        description: row.get(5)?,
    })
}

fn conflict_or(e: rusqlite::Error, message: String) -> StoreError {
    match &e {
        rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation => {
            StoreError::Conflict(message)
        }
        _ => StoreError::Sqlite(e),
    }
}

/// Format a timestamp the way the store writes it.
pub fn format_timestamp(t: DateTime<Utc>) -> String {
    t.format(TIME_FORMAT).to_string()
}

/// Parse a timestamp written by the store or returned by the backend.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    // Naive timestamps are UTC
    let formats = [
        TIME_FORMAT,
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
    ];

    for fmt in &formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn new_store() -> (NamedTempFile, Store) {
        let tmp = NamedTempFile::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();
        (tmp, store)
    }

    fn device(name: &str, ip: &str) -> DeviceCreate {
        DeviceCreate {
            name: name.to_string(),
            ip: ip.to_string(),
            vendor: "Cisco IOS".to_string(),
            location: String::new(),
        }
    }

    #[test]
    fn test_device_crud() {
        let (_tmp, store) = new_store();

        let created = store.add_device(&device("SW1", "10.0.0.1")).unwrap();
        assert!(!created.id.is_empty());
        assert_eq!(created.location.as_deref(), Some(DEFAULT_LOCATION));
        assert!(created.last_backup.is_none());

        let update = DeviceUpdate {
            name: Some("SW1-renamed".to_string()),
            ..Default::default()
        };
        let updated = store.update_device(&created.id, &update).unwrap();
        assert_eq!(updated.name, "SW1-renamed");
        assert_eq!(updated.ip, "10.0.0.1");

        store.delete_device(&created.id).unwrap();
        assert!(matches!(
            store.get_device(&created.id),
            Err(StoreError::NotFound("Device"))
        ));
        assert!(matches!(
            store.delete_device(&created.id),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_duplicate_ip_is_conflict() {
        let (_tmp, store) = new_store();
        store.add_device(&device("SW1", "10.0.0.1")).unwrap();
        let err = store.add_device(&device("SW2", "10.0.0.1")).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.get_devices().unwrap().len(), 1);
    }

    #[test]
    fn test_backup_stamps_device_and_keeps_content() {
        let (_tmp, store) = new_store();
        let dev = store.add_device(&device("SW1", "10.0.0.1")).unwrap();

        let content = "hostname SW1\n!\ninterface Gi0/1\n description \"uplink\"\n";
        let backup = store
            .add_backup(&BackupCreate {
                switch_id: dev.id.clone(),
                content: content.to_string(),
                filename: None,
                commands: vec!["show running-config".to_string()],
                template_name: Some("core".to_string()),
            })
            .unwrap();

        let fetched = store.get_backup(&backup.id).unwrap();
        assert_eq!(fetched.content, content);
        assert_eq!(fetched.commands, vec!["show running-config".to_string()]);
        assert!(fetched.filename.unwrap().starts_with(&dev.id));

        let dev = store.get_device(&dev.id).unwrap();
        assert_eq!(dev.last_backup.as_deref(), Some(backup.timestamp.as_str()));
    }

    #[test]
    fn test_backup_requires_device() {
        let (_tmp, store) = new_store();
        let err = store
            .add_backup(&BackupCreate {
                switch_id: "missing".to_string(),
                content: "x".to_string(),
                filename: None,
                commands: vec![],
                template_name: None,
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound("Device")));
        assert!(store.get_backups().unwrap().is_empty());
    }

    #[test]
    fn test_backups_newest_first_and_survive_device_delete() {
        let (_tmp, store) = new_store();
        let dev = store.add_device(&device("SW1", "10.0.0.1")).unwrap();
        let first = store
            .add_backup(&BackupCreate {
                switch_id: dev.id.clone(),
                content: "one".to_string(),
                filename: None,
                commands: vec![],
                template_name: None,
            })
            .unwrap();
        let second = store
            .add_backup(&BackupCreate {
                switch_id: dev.id.clone(),
                content: "two".to_string(),
                filename: None,
                commands: vec![],
                template_name: None,
            })
            .unwrap();

        let ids: Vec<_> = store.get_backups().unwrap().into_iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![second.id.clone(), first.id.clone()]);

        store.delete_device(&dev.id).unwrap();
        assert_eq!(store.get_backups().unwrap().len(), 2);
    }

    #[test]
    fn test_template_update_keeps_unset_fields() {
        let (_tmp, store) = new_store();
        let created = store
            .add_template(&TemplateCreate {
                name: "core".to_string(),
                username: "admin".to_string(),
                password: "secret".to_string(),
                port: 0,
                description: String::new(),
            })
            .unwrap();
        assert_eq!(created.port, DEFAULT_SSH_PORT);

        let updated = store
            .update_template(
                &created.id,
                &TemplateUpdate {
                    port: Some(2222),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.port, 2222);
        assert_eq!(updated.password, "secret");
        assert_eq!(updated.username, "admin");
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp("2024-03-01T10:20:30.123456").is_some());
        assert!(parse_timestamp("2024-03-01T10:20:30Z").is_some());
        assert!(parse_timestamp("2024-03-01 10:20:30.000000001").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }
}
