//! Device registry
//!
//! Flat-file mapping from switch serial number to last-known port state and
//! the remote system name seen on that port. The whole file is the unit of
//! persistence: it is loaded into a [`RegistrySession`] and rewritten
//! atomically (temp file + rename). Sessions hold a single-writer lock so
//! concurrent alerts cannot lose each other's updates.

use crate::error::StorageError;
use log::{debug, info, warn};
use serde::{Deserialize, Deserializer, Serialize, de};
use std::{
    fs::{self, File},
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// System name of a device with nothing attached
pub const NOT_AVAILABLE: &str = "N/A";

const HEADERS: [&str; 4] = ["Serial Number", "Model", "switch_port_connected", "SystemName"];

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct DeviceRecord {
    #[serde(rename = "Serial Number")]
    pub serial_number: String,
    #[serde(rename = "Model", default)]
    pub model: String,
    #[serde(
        rename = "switch_port_connected",
        default,
        deserialize_with = "deserialize_flag"
    )]
    pub port_connected: bool,
    #[serde(rename = "SystemName", default = "not_available")]
    pub system_name: String,
}

impl DeviceRecord {
    /// A freshly provisioned or reset record
    pub fn new(serial_number: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            serial_number: serial_number.into(),
            model: model.into(),
            port_connected: false,
            system_name: NOT_AVAILABLE.to_string(),
        }
    }

    /// Last known system name, `None` when reset
    pub fn known_system_name(&self) -> Option<&str> {
        let name = self.system_name.trim();
        (!name.is_empty() && name != NOT_AVAILABLE).then_some(name)
    }
}

fn not_available() -> String {
    NOT_AVAILABLE.to_string()
}

fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;

    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" | "" => Ok(false),
        other => Err(de::Error::custom(format!(
            "invalid switch_port_connected value: {other}"
        ))),
    }
}

/// Handle to the registry file, cheap to clone
#[derive(Clone, Debug)]
pub struct DeviceRegistry {
    path: PathBuf,
    writer: Arc<Mutex<()>>,
}

/// Working set of the registry, exclusive while alive
pub struct RegistrySession {
    path: PathBuf,
    records: Vec<DeviceRecord>,
    _guard: OwnedMutexGuard<()>,
}

impl DeviceRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acquire the writer lock and load the whole registry
    pub async fn open(&self) -> Result<RegistrySession, StorageError> {
        let guard = self.writer.clone().lock_owned().await;
        let records = read_records(&self.path)?;

        debug!("opened device registry {:?} ({} devices)", self.path, records.len());

        Ok(RegistrySession {
            path: self.path.clone(),
            records,
            _guard: guard,
        })
    }

    /// Read the registry without taking the writer lock
    ///
    /// Writers replace the file by rename, so this sees either the previous
    /// or the next complete registry.
    pub fn snapshot(&self) -> Result<Vec<DeviceRecord>, StorageError> {
        read_records(&self.path)
    }

    /// Replace the registry with default records for `records`
    pub async fn provision(&self, records: Vec<DeviceRecord>) -> Result<usize, StorageError> {
        let _guard = self.writer.lock().await;
        write_records_atomically(&self.path, &records)?;

        info!("provisioned {} devices into {:?}", records.len(), self.path);
        Ok(records.len())
    }
}

impl RegistrySession {
    pub fn records(&self) -> &[DeviceRecord] {
        &self.records
    }

    pub fn find_by_serial(&self, serial: &str) -> Option<&DeviceRecord> {
        self.records.iter().find(|r| r.serial_number == serial)
    }

    /// Update or insert a device, returning whether any field changed
    pub fn upsert(&mut self, serial: &str, port_connected: bool, system_name: &str) -> bool {
        match self.records.iter_mut().find(|r| r.serial_number == serial) {
            Some(record) => {
                let changed =
                    record.port_connected != port_connected || record.system_name != system_name;

                record.port_connected = port_connected;
                record.system_name = system_name.to_string();
                changed
            }
            None => {
                let mut record = DeviceRecord::new(serial, "");
                record.port_connected = port_connected;
                record.system_name = system_name.to_string();
                self.records.push(record);
                true
            }
        }
    }

    /// Rewrite the whole backing file from the working set
    pub fn persist_all(&self) -> Result<(), StorageError> {
        write_records_atomically(&self.path, &self.records)?;
        info!("device registry {:?} updated", self.path);
        Ok(())
    }
}

fn read_records(path: &Path) -> Result<Vec<DeviceRecord>, StorageError> {
    let file = File::open(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => StorageError::Missing {
            path: path.to_path_buf(),
        },
        _ => StorageError::Read {
            path: path.to_path_buf(),
            source,
        },
    })?;

    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);
    let mut records: Vec<DeviceRecord> = Vec::new();

    for row in reader.deserialize::<DeviceRecord>() {
        let mut record = row.map_err(|e| StorageError::Malformed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        if record.serial_number.is_empty() {
            warn!("skipping registry row without serial number in {path:?}");
            continue;
        }

        if record.system_name.is_empty() {
            record.system_name = not_available();
        }

        if records.iter().any(|r| r.serial_number == record.serial_number) {
            warn!(
                "duplicate serial {} in {path:?}, keeping first row",
                record.serial_number
            );
            continue;
        }

        records.push(record);
    }

    Ok(records)
}

fn write_records_atomically(path: &Path, records: &[DeviceRecord]) -> Result<(), StorageError> {
    let write_err = |source| StorageError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_err)?;
    }

    let temp_file_path = path.with_extension("csv.tmp");

    let result = (|| -> std::io::Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(File::create(&temp_file_path)?);

        writer.write_record(HEADERS)?;
        for record in records {
            writer.serialize(record)?;
        }

        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;

        fs::rename(&temp_file_path, path)
    })();

    if let Err(source) = result {
        let _ = fs::remove_file(&temp_file_path);
        return Err(write_err(source));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn registry_with(content: &str) -> (TempDir, DeviceRegistry) {
        let dir = TempDir::new().expect("should create temp dir");
        let path = dir.path().join("ms_device_list.csv");
        fs::write(&path, content).expect("should write registry");
        (dir, DeviceRegistry::new(path))
    }

    mod read {
        use super::*;

        #[tokio::test]
        async fn parses_canonical_rows() {
            let (_dir, registry) = registry_with(
                "Serial Number,Model,switch_port_connected,SystemName\n\
                 Q2XX-1111,MS120-8,false,N/A\n\
                 Q2XX-2222,MS120-8,true,Galley-Switch-3\n",
            );

            let session = registry.open().await.expect("should open");

            assert_eq!(session.records().len(), 2);
            let device = session.find_by_serial("Q2XX-2222").expect("should exist");
            assert!(device.port_connected);
            assert_eq!(device.known_system_name(), Some("Galley-Switch-3"));
        }

        #[tokio::test]
        async fn accepts_capitalized_flags_and_empty_system_name() {
            let (_dir, registry) = registry_with(
                "Serial Number,Model,switch_port_connected,SystemName\n\
                 Q2XX-1111,MS120-8,True,\n",
            );

            let devices = registry.snapshot().expect("should read");
            let device = &devices[0];

            assert!(device.port_connected);
            assert_eq!(device.system_name, NOT_AVAILABLE);
            assert_eq!(device.known_system_name(), None);
        }

        #[tokio::test]
        async fn keeps_first_of_duplicate_serials() {
            let (_dir, registry) = registry_with(
                "Serial Number,Model,switch_port_connected,SystemName\n\
                 Q2XX-1111,MS120-8,false,N/A\n\
                 Q2XX-1111,MS120-8,true,Other\n",
            );

            let session = registry.open().await.expect("should open");
            assert_eq!(session.records().len(), 1);
            assert!(!session.records()[0].port_connected);
        }

        #[tokio::test]
        async fn missing_file_is_distinguished() {
            let dir = TempDir::new().expect("should create temp dir");
            let registry = DeviceRegistry::new(dir.path().join("absent.csv"));

            let result = registry.open().await;
            assert!(matches!(result, Err(StorageError::Missing { .. })));
        }

        #[tokio::test]
        async fn snapshot_does_not_wait_for_open_session() {
            let (_dir, registry) = registry_with(
                "Serial Number,Model,switch_port_connected,SystemName\n\
                 Q2XX-1111,MS120-8,false,N/A\n",
            );

            let _session = registry.open().await.expect("should open");

            assert_eq!(registry.snapshot().expect("should read").len(), 1);
        }

        #[tokio::test]
        async fn invalid_flag_is_malformed() {
            let (_dir, registry) = registry_with(
                "Serial Number,Model,switch_port_connected,SystemName\n\
                 Q2XX-1111,MS120-8,maybe,N/A\n",
            );

            let result = registry.open().await;
            assert!(matches!(result, Err(StorageError::Malformed { .. })));
        }
    }

    mod upsert {
        use super::*;

        #[tokio::test]
        async fn reports_no_change_for_identical_values() {
            let (_dir, registry) = registry_with(
                "Serial Number,Model,switch_port_connected,SystemName\n\
                 Q2XX-1111,MS120-8,false,N/A\n",
            );

            let mut session = registry.open().await.expect("should open");
            assert!(!session.upsert("Q2XX-1111", false, NOT_AVAILABLE));
        }

        #[tokio::test]
        async fn updates_existing_record() {
            let (_dir, registry) = registry_with(
                "Serial Number,Model,switch_port_connected,SystemName\n\
                 Q2XX-1111,MS120-8,false,N/A\n",
            );

            let mut session = registry.open().await.expect("should open");
            assert!(session.upsert("Q2XX-1111", true, "Galley-Switch-3"));

            let device = session.find_by_serial("Q2XX-1111").expect("should exist");
            assert!(device.port_connected);
            assert_eq!(device.system_name, "Galley-Switch-3");
            assert_eq!(device.model, "MS120-8");
        }

        #[tokio::test]
        async fn inserts_unknown_serial() {
            let (_dir, registry) = registry_with(
                "Serial Number,Model,switch_port_connected,SystemName\n",
            );

            let mut session = registry.open().await.expect("should open");
            assert!(session.upsert("Q2XX-9999", false, NOT_AVAILABLE));
            assert_eq!(session.records().len(), 1);
        }
    }

    mod persist {
        use super::*;

        #[tokio::test]
        async fn persisted_changes_are_read_back() {
            let (_dir, registry) = registry_with(
                "Serial Number,Model,switch_port_connected,SystemName\n\
                 Q2XX-1111,MS120-8,false,N/A\n\
                 Q2XX-2222,MS120-8,false,N/A\n",
            );

            {
                let mut session = registry.open().await.expect("should open");
                session.upsert("Q2XX-1111", true, "Galley-Switch-3");
                session.persist_all().expect("should persist");
            }

            let session = registry.open().await.expect("should reopen");
            assert_eq!(
                session.records(),
                &[
                    DeviceRecord {
                        serial_number: "Q2XX-1111".to_string(),
                        model: "MS120-8".to_string(),
                        port_connected: true,
                        system_name: "Galley-Switch-3".to_string(),
                    },
                    DeviceRecord::new("Q2XX-2222", "MS120-8"),
                ]
            );
        }

        #[tokio::test]
        async fn leaves_no_temp_file_behind() {
            let (dir, registry) = registry_with(
                "Serial Number,Model,switch_port_connected,SystemName\n\
                 Q2XX-1111,MS120-8,false,N/A\n",
            );

            let session = registry.open().await.expect("should open");
            session.persist_all().expect("should persist");

            let entries: Vec<_> = fs::read_dir(dir.path())
                .expect("should list dir")
                .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
                .collect();
            assert_eq!(entries, vec!["ms_device_list.csv"]);
        }

        #[tokio::test]
        async fn failed_write_keeps_previous_registry() {
            let (dir, registry) = registry_with(
                "Serial Number,Model,switch_port_connected,SystemName\n\
                 Q2XX-1111,MS120-8,false,N/A\n",
            );
            let before = fs::read_to_string(registry.path()).expect("should read");
            fs::create_dir(dir.path().join("ms_device_list.csv.tmp")).expect("should block temp");

            let mut session = registry.open().await.expect("should open");
            session.upsert("Q2XX-1111", true, "Galley-Switch-3");

            assert!(matches!(
                session.persist_all(),
                Err(StorageError::Write { .. })
            ));
            assert_eq!(fs::read_to_string(registry.path()).expect("should read"), before);
        }

        #[tokio::test]
        async fn empty_registry_keeps_header() {
            let dir = TempDir::new().expect("should create temp dir");
            let path = dir.path().join("data").join("ms_device_list.csv");
            let registry = DeviceRegistry::new(&path);

            registry.provision(Vec::new()).await.expect("should provision");

            let content = fs::read_to_string(&path).expect("should read");
            assert_eq!(
                content.trim(),
                "Serial Number,Model,switch_port_connected,SystemName"
            );
            assert!(registry.open().await.expect("should open").records().is_empty());
        }
    }
}
