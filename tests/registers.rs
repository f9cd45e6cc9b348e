//! Register Tests
//!
//! - Natural key lookup across revisions
//! - Keyed (many-to-many) registers: links are versioned per transaction
//! - Abandoned transactions never affect committed lookups

mod common;

use common::{memory_repo, Catalog, PackageTag, Tag};
use vdm::store::Fields;
use vdm::{Repository, Revision, State, VdmError, VersionedObject};

// =============================================================================
// Helpers
// =============================================================================

fn seed(repo: &Repository<Catalog>) -> Revision {
    let (mut txn, catalog) = repo.begin_transaction(None).unwrap();
    catalog
        .packages
        .create([("slug", "annakarenina"), ("title", "Anna Karenina")])
        .unwrap();
    catalog
        .packages
        .create([("slug", "warandpeace"), ("title", "War and Peace")])
        .unwrap();
    catalog.tags.create([("name", "russian")]).unwrap();
    catalog.tags.create([("name", "tolstoy")]).unwrap();
    repo.commit(&mut txn).unwrap();
    txn
}

fn tag_names(tags: &[VersionedObject<Tag>]) -> Vec<String> {
    let mut names: Vec<String> = tags
        .iter()
        .filter_map(|t| t.identity_field("name"))
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect();
    names.sort();
    names
}

// =============================================================================
// Register
// =============================================================================

#[test]
fn test_natural_key_lookup() {
    let repo = memory_repo();
    let r2 = seed(&repo);
    let catalog = repo.model_at(&r2).unwrap();

    let anna = catalog.packages.get("annakarenina").unwrap();
    assert_eq!(anna.get("title").unwrap(), "Anna Karenina");
    assert_eq!(catalog.packages.get(anna.id()).unwrap(), anna);
    assert_eq!(catalog.packages.len().unwrap(), 2);

    let err = catalog.packages.get("missing").unwrap_err();
    assert_eq!(err.code(), "VDM_NOT_FOUND");
}

#[test]
fn test_create_outside_transaction() {
    let repo = memory_repo();
    let r2 = seed(&repo);
    let err = repo
        .model_at(&r2)
        .unwrap()
        .packages
        .create([("slug", "x")])
        .unwrap_err();
    assert!(matches!(err, VdmError::NoTransaction(_)));
}

// =============================================================================
// KeyedRegister
// =============================================================================

/// Linking a tag inside a transaction: visible after commit, never at the
/// prior revision.
#[test]
fn test_keyed_register_scenario() {
    let repo = memory_repo();
    let prior = seed(&repo);

    let (mut txn, catalog) = repo.begin_transaction(None).unwrap();
    let anna = catalog.packages.get("annakarenina").unwrap();
    let russian = catalog.tags.get("russian").unwrap();
    anna.keyed::<PackageTag>()
        .unwrap()
        .create(&russian, Fields::new())
        .unwrap();

    // the writer sees its own link
    let tags = anna.keyed::<PackageTag>().unwrap();
    assert_eq!(tag_names(&tags.others(State::Active).unwrap()), vec!["russian"]);

    // prior readers do not, before or after commit
    let before = repo.model_at(&prior).unwrap();
    let anna_before = before.packages.get("annakarenina").unwrap();
    assert!(anna_before
        .keyed::<PackageTag>()
        .unwrap()
        .others(State::Active)
        .unwrap()
        .is_empty());

    repo.commit(&mut txn).unwrap();

    let after = repo.model_at(&txn).unwrap();
    let anna_after = after.packages.get("annakarenina").unwrap();
    let russian_after = after.tags.get("russian").unwrap();
    let tags_after = anna_after.keyed::<PackageTag>().unwrap();
    assert!(tags_after.contains(&russian_after).unwrap());
    assert_eq!(tags_after.list(State::Active).unwrap().len(), 1);

    assert!(anna_before
        .keyed::<PackageTag>()
        .unwrap()
        .get(&russian_after)
        .is_err());
}

/// Removing a link is a soft delete recorded in the next revision.
#[test]
fn test_unlink_is_versioned() {
    let repo = memory_repo();
    seed(&repo);

    let (mut link_txn, catalog) = repo.begin_transaction(None).unwrap();
    let anna = catalog.packages.get("annakarenina").unwrap();
    let tags = anna.keyed::<PackageTag>().unwrap();
    for name in ["russian", "tolstoy"] {
        let tag = catalog.tags.get(name).unwrap();
        tags.create(&tag, Fields::new())
            .unwrap();
    }
    repo.commit(&mut link_txn).unwrap();

    let (mut unlink_txn, catalog) = repo.begin_transaction(None).unwrap();
    let anna = catalog.packages.get("annakarenina").unwrap();
    let tolstoy = catalog.tags.get("tolstoy").unwrap();
    anna.keyed::<PackageTag>().unwrap().delete(&tolstoy).unwrap();
    repo.commit(&mut unlink_txn).unwrap();

    let others_at = |revision: &Revision| {
        let catalog = repo.model_at(revision).unwrap();
        let anna = catalog.packages.get("annakarenina").unwrap();
        tag_names(&anna.keyed::<PackageTag>().unwrap().others(State::Active).unwrap())
    };
    assert_eq!(others_at(&link_txn), vec!["russian", "tolstoy"]);
    assert_eq!(others_at(&unlink_txn), vec!["russian"]);

    let catalog = repo.model_at(&unlink_txn).unwrap();
    let anna = catalog.packages.get("annakarenina").unwrap();
    let deleted = anna
        .keyed::<PackageTag>()
        .unwrap()
        .list(State::Deleted)
        .unwrap();
    assert_eq!(deleted.len(), 1);
}

/// Links belong to their owner only.
#[test]
fn test_links_do_not_leak_between_owners() {
    let repo = memory_repo();
    seed(&repo);

    let (_, catalog) = repo.begin_transaction(None).unwrap();
    let anna = catalog.packages.get("annakarenina").unwrap();
    let war = catalog.packages.get("warandpeace").unwrap();
    let russian = catalog.tags.get("russian").unwrap();
    anna.keyed::<PackageTag>()
        .unwrap()
        .create(&russian, Fields::new())
        .unwrap();

    let err = war.keyed::<PackageTag>().unwrap().get(&russian).unwrap_err();
    assert_eq!(err.code(), "VDM_NOT_IN_REGISTER");
}

/// Unlinking then linking the same pair again keeps one active link.
#[test]
fn test_relink_after_unlink() {
    let repo = memory_repo();
    seed(&repo);

    let link = |repo: &Repository<Catalog>| {
        let (mut txn, catalog) = repo.begin_transaction(None).unwrap();
        let anna = catalog.packages.get("annakarenina").unwrap();
        let russian = catalog.tags.get("russian").unwrap();
        anna.keyed::<PackageTag>()
            .unwrap()
            .create(&russian, Fields::new())
            .unwrap();
        repo.commit(&mut txn).unwrap();
        txn
    };

    let linked = link(&repo);

    let (mut unlink_txn, catalog) = repo.begin_transaction(None).unwrap();
    let anna = catalog.packages.get("annakarenina").unwrap();
    let russian = catalog.tags.get("russian").unwrap();
    anna.keyed::<PackageTag>().unwrap().delete(&russian).unwrap();
    repo.commit(&mut unlink_txn).unwrap();

    let relinked = link(&repo);

    let contains_at = |revision: &Revision| {
        let catalog = repo.model_at(revision).unwrap();
        let anna = catalog.packages.get("annakarenina").unwrap();
        let russian = catalog.tags.get("russian").unwrap();
        anna.keyed::<PackageTag>().unwrap().contains(&russian).unwrap()
    };
    assert!(contains_at(&linked));
    assert!(!contains_at(&unlink_txn));
    assert!(contains_at(&relinked));

    let catalog = repo.model_at(&relinked).unwrap();
    let anna = catalog.packages.get("annakarenina").unwrap();
    let tags = anna.keyed::<PackageTag>().unwrap();
    assert_eq!(tags.len().unwrap(), 1);
    assert!(tags.list(State::Deleted).unwrap().is_empty());
}

// =============================================================================
// Abandoned transactions
// =============================================================================

/// A natural key reused after an abandoned create resolves to the
/// committed object.
#[test]
fn test_natural_key_after_abandoned_create() {
    let repo = memory_repo();
    seed(&repo);

    let (_abandoned, stale) = repo.begin_transaction(None).unwrap();
    stale
        .packages
        .create([("slug", "resurrection"), ("title", "abandoned")])
        .unwrap();

    let (mut txn, catalog) = repo.begin_transaction(None).unwrap();
    let kept = catalog
        .packages
        .create([("slug", "resurrection"), ("title", "Resurrection")])
        .unwrap();
    repo.commit(&mut txn).unwrap();

    let committed = repo.model_at(&txn).unwrap();
    let found = committed.packages.get("resurrection").unwrap();
    assert_eq!(found, kept);
    assert_eq!(found.get("title").unwrap(), "Resurrection");
    assert_eq!(committed.packages.len().unwrap(), 3);
}

/// A link written by an abandoned transaction does not shadow the
/// committed link for the same pair.
#[test]
fn test_keyed_lookup_after_abandoned_link() {
    let repo = memory_repo();
    seed(&repo);

    let (_abandoned, stale) = repo.begin_transaction(None).unwrap();
    let anna = stale.packages.get("annakarenina").unwrap();
    let russian = stale.tags.get("russian").unwrap();
    anna.keyed::<PackageTag>()
        .unwrap()
        .create(&russian, Fields::new())
        .unwrap();

    let (mut txn, catalog) = repo.begin_transaction(None).unwrap();
    let anna = catalog.packages.get("annakarenina").unwrap();
    let russian = catalog.tags.get("russian").unwrap();
    let tags = anna.keyed::<PackageTag>().unwrap();
    assert!(!tags.contains(&russian).unwrap());
    tags.create(&russian, Fields::new()).unwrap();
    repo.commit(&mut txn).unwrap();

    let committed = repo.model_at(&txn).unwrap();
    let anna = committed.packages.get("annakarenina").unwrap();
    let russian = committed.tags.get("russian").unwrap();
    let tags = anna.keyed::<PackageTag>().unwrap();
    assert!(tags.get(&russian).is_ok());
    assert!(tags.contains(&russian).unwrap());
    assert_eq!(tag_names(&tags.others(State::Active).unwrap()), vec!["russian"]);
}
