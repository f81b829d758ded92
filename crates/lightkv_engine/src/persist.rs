//! On-disk image of a committed environment.
//!
//! ```text
//! <env_path>/
//! ├─ data.lkv      # CBOR image of every database
//! ├─ data.lkv.tmp  # Temporary file for atomic image writes
//! └─ lock.lkv      # Advisory lock, one environment per directory
//! ```

use crate::table::Table;
use crate::types::DbFlags;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

/// Name of the data image inside an environment directory.
pub const DATA_FILE: &str = "data.lkv";
/// Name of the lock file inside an environment directory.
pub const LOCK_FILE: &str = "lock.lkv";
const DATA_TEMP: &str = "data.lkv.tmp";
const IMAGE_FORMAT: u32 = 1;

/// Every database visible in one snapshot, keyed by name (`None` = default).
pub(crate) type Catalog = BTreeMap<Option<String>, Arc<Table>>;

#[derive(Serialize, Deserialize)]
struct Image {
    format: u32,
    databases: Vec<ImageDatabase>,
}

#[derive(Serialize, Deserialize)]
struct ImageDatabase {
    name: Option<String>,
    flags: u32,
    entries: Vec<(Vec<u8>, Vec<u8>)>,
}

/// Takes the directory lock, creating the lock file if needed.
///
/// Fails with `WouldBlock` when another environment holds it.
pub(crate) fn lock_directory(dir: &Path) -> io::Result<File> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(dir.join(LOCK_FILE))?;
    file.try_lock_exclusive()
        .map_err(|_| io::Error::new(io::ErrorKind::WouldBlock, "environment is locked"))?;
    Ok(file)
}

/// Loads the image in `dir`, if one exists.
pub(crate) fn read_image(dir: &Path) -> io::Result<Option<Catalog>> {
    let path = dir.join(DATA_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let reader = BufReader::new(File::open(&path)?);
    let image: Image = ciborium::from_reader(reader)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
    if image.format != IMAGE_FORMAT {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unsupported image format {}", image.format),
        ));
    }

    let mut catalog = Catalog::new();
    for db in image.databases {
        let table = Table::from_entries(DbFlags::from_bits_truncate(db.flags), db.entries);
        catalog.insert(db.name, Arc::new(table));
    }
    Ok(Some(catalog))
}

fn encode(catalog: &Catalog, out: impl Write) -> io::Result<()> {
    let image = Image {
        format: IMAGE_FORMAT,
        databases: catalog
            .iter()
            .map(|(name, table)| ImageDatabase {
                name: name.clone(),
                flags: table.flags().bits(),
                entries: table.entries().to_vec(),
            })
            .collect(),
    };
    ciborium::into_writer(&image, out).map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))
}

/// Writes the image atomically: temp file, optional fsync, rename.
pub(crate) fn write_image(dir: &Path, catalog: &Catalog, sync: bool) -> io::Result<()> {
    let temp = dir.join(DATA_TEMP);
    {
        let file = File::create(&temp)?;
        let mut writer = BufWriter::new(file);
        encode(catalog, &mut writer)?;
        writer.flush()?;
        if sync {
            writer.get_ref().sync_all()?;
        }
    }
    fs::rename(&temp, dir.join(DATA_FILE))
}

/// Writes the image into a fresh destination directory.
///
/// Fails with `AlreadyExists` if the destination already holds an image.
pub(crate) fn copy_image(destination: &Path, catalog: &Catalog) -> io::Result<()> {
    fs::create_dir_all(destination)?;
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(destination.join(DATA_FILE))?;
    let mut writer = BufWriter::new(file);
    encode(catalog, &mut writer)?;
    writer.flush()?;
    writer.get_ref().sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PutFlags;
    use tempfile::tempdir;

    fn sample_catalog() -> Catalog {
        let mut main = Table::new(DbFlags::empty());
        main.put(b"key", b"value", PutFlags::empty()).unwrap();
        let mut dups = Table::new(DbFlags::DUP_SORT);
        dups.put(b"k", b"1", PutFlags::empty()).unwrap();
        dups.put(b"k", b"2", PutFlags::empty()).unwrap();

        let mut catalog = Catalog::new();
        catalog.insert(None, Arc::new(main));
        catalog.insert(Some("dups".to_string()), Arc::new(dups));
        catalog
    }

    #[test]
    fn missing_image_reads_as_none() {
        let dir = tempdir().unwrap();
        assert!(read_image(dir.path()).unwrap().is_none());
    }

    #[test]
    fn image_survives_write_and_read() {
        let dir = tempdir().unwrap();
        write_image(dir.path(), &sample_catalog(), true).unwrap();

        let catalog = read_image(dir.path()).unwrap().unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog[&None].get(b"key"), Some(&b"value"[..]));
        let dups = &catalog[&Some("dups".to_string())];
        assert!(dups.is_dup_sort());
        assert_eq!(dups.len(), 2);
        assert!(!dir.path().join(DATA_TEMP).exists());
    }

    #[test]
    fn copy_refuses_existing_image() {
        let dir = tempdir().unwrap();
        copy_image(dir.path(), &sample_catalog()).unwrap();
        let err = copy_image(dir.path(), &sample_catalog()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
    }

    #[test]
    fn second_lock_fails() {
        let dir = tempdir().unwrap();
        let _held = lock_directory(dir.path()).unwrap();
        let err = lock_directory(dir.path()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }

    #[test]
    fn corrupt_image_is_invalid_data() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(DATA_FILE), b"not cbor at all").unwrap();
        let err = read_image(dir.path()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
