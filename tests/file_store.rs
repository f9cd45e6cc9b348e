//! File Store Tests
//!
//! - Repository history survives reopening the store file
//! - Corrupted images are rejected, never silently loaded

mod common;

use std::fs;
use std::sync::Arc;

use common::Catalog;
use tempfile::TempDir;
use vdm::store::{FileStore, ObjectStore, StoreError};
use vdm::{Repository, VdmError};

fn open(path: &std::path::Path) -> Arc<dyn ObjectStore> {
    Arc::new(FileStore::open(path).unwrap())
}

// =============================================================================
// Durability
// =============================================================================

/// Committed revisions and objects survive a reopen.
#[test]
fn test_history_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("store.json");

    {
        let repo = Repository::<Catalog>::init(open(&path)).unwrap();
        let (mut txn, catalog) = repo.begin_transaction(None).unwrap();
        catalog
            .packages
            .create([("slug", "anna"), ("title", "Anna Karenina")])
            .unwrap();
        repo.commit(&mut txn).unwrap();
    }

    let repo = Repository::<Catalog>::open(open(&path)).unwrap();
    let youngest = repo.youngest_revision().unwrap().unwrap();
    assert_eq!(youngest.number().unwrap().value(), 2);

    let catalog = repo.model_at(&youngest).unwrap();
    let anna = catalog.packages.get("anna").unwrap();
    assert_eq!(anna.get("title").unwrap(), "Anna Karenina");
}

/// An uncommitted transaction is never persisted as committed.
#[test]
fn test_pending_transaction_not_visible_after_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("store.json");

    {
        let repo = Repository::<Catalog>::init(open(&path)).unwrap();
        let (_, catalog) = repo.begin_transaction(None).unwrap();
        catalog.packages.create([("slug", "draft")]).unwrap();
        repo.context().store().flush().unwrap();
    }

    let repo = Repository::<Catalog>::open(open(&path)).unwrap();
    assert_eq!(repo.history().unwrap().len(), 1);
    let youngest = repo.youngest_revision().unwrap().unwrap();
    assert!(repo.model_at(&youngest).unwrap().packages.get("draft").is_err());
}

// =============================================================================
// Corruption
// =============================================================================

/// Editing the image by hand breaks the checksum.
#[test]
fn test_tampered_image_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("store.json");
    Repository::<Catalog>::init(open(&path)).unwrap();

    let content = fs::read_to_string(&path).unwrap();
    let tampered = content.replace("Initialising", "Initializing");
    assert_ne!(content, tampered);
    fs::write(&path, tampered).unwrap();

    let err = FileStore::open(&path).unwrap_err();
    assert!(matches!(err, StoreError::Corruption(_)));
    assert!(err.is_fatal());

    let wrapped = VdmError::from(err);
    assert_eq!(wrapped.code(), "VDM_STORE_CORRUPTION");
}
