//! Shared fixtures: a small package catalog with tags.

#![allow(dead_code)]

use std::sync::Arc;

use vdm::register::{Link, Register};
use vdm::store::{MemoryStore, ObjectStore};
use vdm::{Binding, Context, DomainModel, Repository, Versioned};

pub struct Package;

impl Versioned for Package {
    const TABLE: &'static str = "package";
    const VERSION_TABLE: &'static str = "package_revision";
    const FIELDS: &'static [&'static str] = &["name", "title", "license"];
    const IDENTITY_FIELDS: &'static [&'static str] = &["slug"];
    const KEY: Option<&'static str> = Some("slug");
}

pub struct Tag;

impl Versioned for Tag {
    const TABLE: &'static str = "tag";
    const VERSION_TABLE: &'static str = "tag_revision";
    const FIELDS: &'static [&'static str] = &["description"];
    const IDENTITY_FIELDS: &'static [&'static str] = &["name"];
    const KEY: Option<&'static str> = Some("name");
}

pub struct PackageTag;

impl Versioned for PackageTag {
    const TABLE: &'static str = "package_tag";
    const VERSION_TABLE: &'static str = "package_tag_revision";
    const FIELDS: &'static [&'static str] = &[];
    const IDENTITY_FIELDS: &'static [&'static str] = &["package", "tag"];
}

impl Link for PackageTag {
    type Owner = Package;
    type Other = Tag;
    const OWNER_FIELD: &'static str = "package";
    const OTHER_FIELD: &'static str = "tag";
}

pub struct Catalog {
    pub packages: Register<Package>,
    pub tags: Register<Tag>,
}

impl DomainModel for Catalog {
    fn new(ctx: Context, binding: Binding) -> Self {
        Self {
            packages: Register::new(ctx.clone(), binding.clone()),
            tags: Register::new(ctx, binding),
        }
    }
}

pub fn memory_repo() -> Repository<Catalog> {
    let store: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());
    Repository::init(store).expect("init repository")
}
