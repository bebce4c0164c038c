//! Profile table
//!
//! Read-only mapping from a discovered system name to the SSID index and
//! VLAN that system gets. Curated externally; the file is re-read on each
//! lookup so edits apply without a restart.

use crate::error::StorageError;
use log::{debug, warn};
use serde::Deserialize;
use serde_valid::Validate;
use std::{fs::File, io::ErrorKind, path::PathBuf};

#[derive(Clone, Debug, Deserialize, PartialEq, Validate)]
pub struct ProfileRecord {
    #[serde(rename = "SystemName")]
    pub system_name: String,
    #[serde(rename = "ssid_number", default)]
    #[validate(maximum = 14)]
    pub ssid_number: Option<u8>,
    #[serde(rename = "vlan", default)]
    #[validate(minimum = 1)]
    #[validate(maximum = 4094)]
    pub vlan: Option<u16>,
}

/// SSID index and VLAN resolved for a system name
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SsidAssignment {
    pub ssid_number: u8,
    pub vlan: u16,
}

#[derive(Clone, Debug)]
pub struct ProfileTable {
    path: PathBuf,
}

impl ProfileTable {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn malformed(&self, reason: String) -> StorageError {
        StorageError::Malformed {
            path: self.path.clone(),
            reason,
        }
    }

    /// SSID index and VLAN for `system_name`
    ///
    /// Only the row naming `system_name` is decoded, so a broken row for some
    /// other system does not block this lookup. Returns `None` when the name
    /// is not listed or its row leaves the SSID index or VLAN empty.
    pub fn find_by_system_name(
        &self,
        system_name: &str,
    ) -> Result<Option<SsidAssignment>, StorageError> {
        let system_name = system_name.trim();

        let file = File::open(&self.path).map_err(|source| match source.kind() {
            ErrorKind::NotFound => StorageError::Missing {
                path: self.path.clone(),
            },
            _ => StorageError::Read {
                path: self.path.clone(),
                source,
            },
        })?;

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(file);

        let headers = reader
            .headers()
            .map_err(|e| self.malformed(e.to_string()))?
            .clone();
        let Some(name_column) = headers.iter().position(|h| h == "SystemName") else {
            return Err(self.malformed("no SystemName column".to_string()));
        };

        for row in reader.records() {
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    warn!("skipping unreadable row in {:?}: {e}", self.path);
                    continue;
                }
            };

            if row.get(name_column) != Some(system_name) {
                continue;
            }

            let profile: ProfileRecord = row
                .deserialize(Some(&headers))
                .map_err(|e| self.malformed(format!("profile {system_name}: {e}")))?;

            profile
                .validate()
                .map_err(|e| self.malformed(format!("profile {system_name}: {e}")))?;

            return match (profile.ssid_number, profile.vlan) {
                (Some(ssid_number), Some(vlan)) => Ok(Some(SsidAssignment { ssid_number, vlan })),
                _ => {
                    debug!("profile {system_name} has no complete ssid/vlan assignment");
                    Ok(None)
                }
            };
        }

        debug!("no profile for {system_name} in {:?}", self.path);
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn table_with(content: &str) -> (TempDir, ProfileTable) {
        let dir = TempDir::new().expect("should create temp dir");
        let path = dir.path().join("boats.csv");
        fs::write(&path, content).expect("should write table");
        (dir, ProfileTable::new(path))
    }

    #[test]
    fn resolves_listed_system_name() {
        let (_dir, table) = table_with(
            "SystemName,ssid_number,vlan\n\
             Galley-Switch-3,2,20\n\
             Bridge-Switch-1,3,30\n",
        );

        let assignment = table
            .find_by_system_name("Galley-Switch-3")
            .expect("should read");

        assert_eq!(
            assignment,
            Some(SsidAssignment {
                ssid_number: 2,
                vlan: 20
            })
        );
    }

    #[test]
    fn ignores_extra_columns() {
        let (_dir, table) = table_with(
            "boat,SystemName,ssid_number,vlan,notes\n\
             Sea Breeze,Galley-Switch-3,2,20,aft deck\n",
        );

        assert!(
            table
                .find_by_system_name("Galley-Switch-3")
                .expect("should read")
                .is_some()
        );
    }

    #[test]
    fn unknown_system_name_does_not_resolve() {
        let (_dir, table) = table_with("SystemName,ssid_number,vlan\nGalley-Switch-3,2,20\n");

        assert_eq!(
            table.find_by_system_name("Engine-Room").expect("should read"),
            None
        );
    }

    #[test]
    fn incomplete_row_does_not_resolve() {
        let (_dir, table) = table_with("SystemName,ssid_number,vlan\nGalley-Switch-3,2,\n");

        assert_eq!(
            table
                .find_by_system_name("Galley-Switch-3")
                .expect("should read"),
            None
        );
    }

    #[test]
    fn out_of_range_vlan_is_malformed() {
        let (_dir, table) = table_with("SystemName,ssid_number,vlan\nGalley-Switch-3,2,5000\n");

        let result = table.find_by_system_name("Galley-Switch-3");
        assert!(matches!(result, Err(StorageError::Malformed { .. })));
    }

    #[test]
    fn non_numeric_ssid_is_malformed() {
        let (_dir, table) = table_with("SystemName,ssid_number,vlan\nGalley-Switch-3,two,20\n");

        let result = table.find_by_system_name("Galley-Switch-3");
        assert!(matches!(result, Err(StorageError::Malformed { .. })));
    }

    #[test]
    fn broken_row_for_another_system_is_skipped() {
        let (_dir, table) = table_with(
            "SystemName,ssid_number,vlan\n\
             Galley-Switch-3,2,20\n\
             Engine-Room,two,30\n",
        );

        assert_eq!(
            table
                .find_by_system_name("Galley-Switch-3")
                .expect("should read"),
            Some(SsidAssignment {
                ssid_number: 2,
                vlan: 20
            })
        );
        assert!(matches!(
            table.find_by_system_name("Engine-Room"),
            Err(StorageError::Malformed { .. })
        ));
    }

    #[test]
    fn short_row_for_another_system_is_skipped() {
        let (_dir, table) = table_with(
            "SystemName,ssid_number,vlan\n\
             Engine-Room\n\
             Galley-Switch-3,2,20\n",
        );

        assert!(
            table
                .find_by_system_name("Galley-Switch-3")
                .expect("should read")
                .is_some()
        );
    }

    #[test]
    fn table_without_system_name_column_is_malformed() {
        let (_dir, table) = table_with("name,ssid_number,vlan\nGalley-Switch-3,2,20\n");

        let result = table.find_by_system_name("Galley-Switch-3");
        assert!(matches!(result, Err(StorageError::Malformed { .. })));
    }

    #[test]
    fn missing_file_is_distinguished() {
        let dir = TempDir::new().expect("should create temp dir");
        let table = ProfileTable::new(dir.path().join("absent.csv"));

        let result = table.find_by_system_name("Galley-Switch-3");
        assert!(matches!(result, Err(StorageError::Missing { .. })));
    }
}
