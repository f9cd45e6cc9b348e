//! Repository - revision history entry point
//!
//! Owns the store context, bootstraps a fresh store, lists the revision
//! history and hands out domain models bound to a revision or to a new
//! transaction.

use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{VdmError, VdmResult};
use crate::observability::{Event, Logger};
use crate::revision::{Revision, REVISION_TABLE};
use crate::state::{State, StateTable, STATE_TABLE};
use crate::store::{ObjectStore, StoreError};
use crate::versioned::{Binding, Context};

/// Author recorded on the bootstrap revision
pub const SYSTEM_AUTHOR: &str = "system";
/// Log message recorded on the bootstrap revision
pub const INIT_LOG_MESSAGE: &str = "Initialising the Repository";

/// A set of registers over one binding.
///
/// Implementors are usually plain structs of [`Register`]s built from the
/// same context and binding.
///
/// [`Register`]: crate::register::Register
pub trait DomainModel: Sized {
    fn new(ctx: Context, binding: Binding) -> Self;

    /// Seeds a freshly initialised repository. Runs once, after the
    /// bootstrap revision is written and before the store is flushed.
    fn initialise_repository(_ctx: &Context, _base: &Revision) -> VdmResult<()> {
        Ok(())
    }
}

/// No registers: for callers that only work with revisions.
impl DomainModel for () {
    fn new(_ctx: Context, _binding: Binding) -> Self {}
}

pub struct Repository<M: DomainModel> {
    ctx: Context,
    default_author: Option<String>,
    _model: PhantomData<M>,
}

impl<M: DomainModel> Repository<M> {
    /// Initialises an empty store: state records, revision 1, then the
    /// model's seed data.
    ///
    /// # Errors
    ///
    /// `InvalidState` if the store already holds state records.
    pub fn init(store: Arc<dyn ObjectStore>) -> VdmResult<Self> {
        if !store.scan(STATE_TABLE)?.is_empty() {
            return Err(VdmError::invalid_state(
                "Repository is already initialised",
            ));
        }
        let ctx = Self::bootstrap(store)?;
        Ok(Self::from_context(ctx))
    }

    /// Attaches to an initialised store.
    ///
    /// # Errors
    ///
    /// `NoHistory` if the store was never initialised.
    pub fn open(store: Arc<dyn ObjectStore>) -> VdmResult<Self> {
        let states = StateTable::load(store.as_ref())?;
        let ctx = Context::new(store, states);
        let repo = Self::from_context(ctx);

        let youngest = repo
            .youngest_revision()?
            .and_then(|r| r.number())
            .map(|n| n.to_string())
            .unwrap_or_default();
        Logger::event(Event::RepositoryOpened, &[("youngest", youngest.as_str())]);
        Ok(repo)
    }

    /// Drops everything in the store and initialises it again.
    pub fn rebuild(&mut self) -> VdmResult<()> {
        Logger::event(Event::RepositoryRebuild, &[]);
        self.ctx.store().clear()?;
        self.ctx = Self::bootstrap(self.ctx.shared_store())?;
        Ok(())
    }

    fn bootstrap(store: Arc<dyn ObjectStore>) -> VdmResult<Context> {
        let states = StateTable::bootstrap(store.as_ref())?;
        let base = Revision::bootstrap(store.as_ref(), &states, SYSTEM_AUTHOR, INIT_LOG_MESSAGE)?;
        let ctx = Context::new(store, states);
        M::initialise_repository(&ctx, &base)?;
        ctx.store().flush()?;

        let number = base.to_string();
        Logger::event(Event::RepositoryInit, &[("revision", number.as_str())]);
        Ok(ctx)
    }

    fn from_context(ctx: Context) -> Self {
        Self {
            ctx,
            default_author: None,
            _model: PhantomData,
        }
    }

    /// Author set on every transaction this repository begins.
    pub fn with_default_author(mut self, author: impl Into<String>) -> Self {
        self.default_author = Some(author.into());
        self
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Every committed revision, youngest first.
    pub fn history(&self) -> VdmResult<Vec<Revision>> {
        let records = self.ctx.store().scan(REVISION_TABLE)?;
        let mut revisions = Vec::new();
        for record in &records {
            let revision = Revision::from_record(self.ctx.states(), record)?;
            if revision.state() == State::Active {
                revisions.push(revision);
            }
        }
        revisions.sort_by(|a, b| b.number().cmp(&a.number()));
        Ok(revisions)
    }

    /// The committed revision with the highest number. Never a pending one.
    pub fn youngest_revision(&self) -> VdmResult<Option<Revision>> {
        Ok(self.history()?.into_iter().next())
    }

    /// The committed revision numbered `number`.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no committed revision has that number
    /// - `Store(Corruption)` if several do
    pub fn get_revision(&self, number: u64) -> VdmResult<Revision> {
        let records = self
            .ctx
            .store()
            .find_by(REVISION_TABLE, "number", &Value::from(number))?;
        let mut matches = Vec::new();
        for record in &records {
            let revision = Revision::from_record(self.ctx.states(), record)?;
            if revision.state() == State::Active {
                matches.push(revision);
            }
        }

        match matches.len() {
            0 => Err(VdmError::not_found(format!("No revision numbered {}", number))),
            1 => Ok(matches.remove(0)),
            count => Err(StoreError::Corruption(format!(
                "{} revisions numbered {}",
                count, number
            ))
            .into()),
        }
    }

    /// Begins a transaction on `base`, or on the youngest revision, and
    /// returns it with a model that writes through it.
    ///
    /// # Errors
    ///
    /// - `NoHistory` if no base is given and nothing is committed
    /// - `InvalidState` if `base` is not committed
    pub fn begin_transaction(&self, base: Option<&Revision>) -> VdmResult<(Revision, M)> {
        let base = match base {
            Some(base) => base.clone(),
            None => self.youngest_revision()?.ok_or_else(|| {
                VdmError::no_history("Cannot begin a transaction: no committed revision")
            })?,
        };
        base.require_active("begin a transaction on")?;

        let store = self.ctx.store();
        let mut txn = Revision::begin(store, self.ctx.states(), Some(&base))?;
        if let Some(author) = &self.default_author {
            txn.set_author(store, author)?;
        }

        let id = txn.id().to_string();
        let on = base.to_string();
        Logger::event(
            Event::TransactionBegin,
            &[("base", on.as_str()), ("transaction", id.as_str())],
        );

        let model = M::new(self.ctx.clone(), Binding::new(base, Some(txn.clone()))?);
        Ok((txn, model))
    }

    /// A model writing through an already started transaction.
    pub fn resume(&self, txn: &Revision) -> VdmResult<M> {
        let base_id = txn.base_revision().ok_or_else(|| {
            VdmError::invalid_state(format!("{} has no base revision", txn))
        })?;
        let base = Revision::load(self.ctx.store(), self.ctx.states(), base_id)?;
        Ok(M::new(
            self.ctx.clone(),
            Binding::new(base, Some(txn.clone()))?,
        ))
    }

    /// Commits `txn`, making everything it wrote visible at once.
    pub fn commit(&self, txn: &mut Revision) -> VdmResult<()> {
        txn.commit(self.ctx.store(), self.ctx.states())
    }

    /// A read-only model as of `revision`.
    pub fn model_at(&self, revision: &Revision) -> VdmResult<M> {
        Ok(M::new(self.ctx.clone(), Binding::at(revision.clone())?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register::Register;
    use crate::store::MemoryStore;
    use crate::versioned::Versioned;

    struct Page;

    impl Versioned for Page {
        const TABLE: &'static str = "page";
        const VERSION_TABLE: &'static str = "page_revision";
        const FIELDS: &'static [&'static str] = &["body"];
    }

    struct Wiki {
        pages: Register<Page>,
    }

    impl DomainModel for Wiki {
        fn new(ctx: Context, binding: Binding) -> Self {
            Self {
                pages: Register::new(ctx, binding),
            }
        }
    }

    fn repo() -> Repository<Wiki> {
        Repository::init(Arc::new(MemoryStore::new())).unwrap()
    }

    #[test]
    fn test_init_writes_bootstrap_revision() {
        let repo = repo();
        let youngest = repo.youngest_revision().unwrap().unwrap();

        assert_eq!(youngest.number().map(|n| n.value()), Some(1));
        assert_eq!(youngest.author(), Some(SYSTEM_AUTHOR));
        assert_eq!(youngest.log_message(), Some(INIT_LOG_MESSAGE));
        assert_eq!(repo.history().unwrap().len(), 1);
    }

    #[test]
    fn test_init_twice_fails() {
        let store: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());
        Repository::<Wiki>::init(store.clone()).unwrap();
        let err = Repository::<Wiki>::init(store).err().unwrap();
        assert!(matches!(err, VdmError::InvalidState(_)));
    }

    #[test]
    fn test_open_uninitialised_store() {
        let err = Repository::<Wiki>::open(Arc::new(MemoryStore::new()))
            .err()
            .unwrap();
        assert!(matches!(err, VdmError::NoHistory(_)));
    }

    #[test]
    fn test_begin_on_youngest_by_default() {
        let repo = repo();
        let (txn, _) = repo.begin_transaction(None).unwrap();
        assert!(txn.is_transaction());
        assert_eq!(
            txn.base_revision(),
            Some(repo.youngest_revision().unwrap().unwrap().id())
        );
    }

    #[test]
    fn test_begin_on_pending_base_fails() {
        let repo = repo();
        let (txn, _) = repo.begin_transaction(None).unwrap();
        let err = repo.begin_transaction(Some(&txn)).err().unwrap();
        assert!(matches!(err, VdmError::InvalidState(_)));
    }

    #[test]
    fn test_commit_moves_youngest() {
        let repo = repo();
        let (mut txn, wiki) = repo.begin_transaction(None).unwrap();
        wiki.pages.create([("body", "hello")]).unwrap();

        // pending revisions never show up in history
        assert_eq!(repo.history().unwrap().len(), 1);

        repo.commit(&mut txn).unwrap();
        let youngest = repo.youngest_revision().unwrap().unwrap();
        assert_eq!(youngest.id(), txn.id());
        assert_eq!(repo.history().unwrap().len(), 2);
        assert_eq!(repo.model_at(&youngest).unwrap().pages.len().unwrap(), 1);
    }

    #[test]
    fn test_get_revision() {
        let repo = repo();
        assert_eq!(repo.get_revision(1).unwrap().author(), Some(SYSTEM_AUTHOR));
        assert!(matches!(repo.get_revision(7), Err(VdmError::NotFound(_))));
    }

    #[test]
    fn test_default_author_applied() {
        let repo = repo().with_default_author("tolstoy");
        let (txn, _) = repo.begin_transaction(None).unwrap();
        assert_eq!(txn.author(), Some("tolstoy"));
    }

    #[test]
    fn test_resume_writes_to_same_transaction() {
        let repo = repo();
        let (mut txn, first) = repo.begin_transaction(None).unwrap();
        first.pages.create([("body", "a")]).unwrap();

        let second = repo.resume(&txn).unwrap();
        assert_eq!(second.pages.len().unwrap(), 1);
        second.pages.create([("body", "b")]).unwrap();

        repo.commit(&mut txn).unwrap();
        let youngest = repo.youngest_revision().unwrap().unwrap();
        assert_eq!(repo.model_at(&youngest).unwrap().pages.len().unwrap(), 2);
    }

    #[test]
    fn test_rebuild_resets_history() {
        let mut repo = repo();
        let (mut txn, _) = repo.begin_transaction(None).unwrap();
        repo.commit(&mut txn).unwrap();
        assert_eq!(repo.history().unwrap().len(), 2);

        repo.rebuild().unwrap();
        let history = repo.history().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].log_message(), Some(INIT_LOG_MESSAGE));
    }
}
