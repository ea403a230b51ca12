use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::NaiveDate;
use engine::{
    Amount, Category, Collection, EngineError, ExpenseStore, ExpenseUpdate, Filter, MemoryStore,
    NewExpense, ProfileStore, RemoteError, RemoteStore, Row, SessionProvider, Tracker, UserId,
};
use serde_json::json;
use tokio::{
    sync::{mpsc, watch},
    time::timeout,
};

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
}

fn alice() -> UserId {
    UserId::new("alice")
}

fn bob() -> UserId {
    UserId::new("bob")
}

/// Backend whose reads and writes can be switched to fail.
#[derive(Default)]
struct Flaky {
    inner: MemoryStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl Flaky {
    fn check(flag: &AtomicBool) -> Result<(), RemoteError> {
        if flag.load(Ordering::SeqCst) {
            return Err(RemoteError::Transport("connection reset".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for Flaky {
    async fn select(&self, collection: Collection, filter: &Filter) -> Result<Vec<Row>, RemoteError> {
        Self::check(&self.fail_reads)?;
        self.inner.select(collection, filter).await
    }

    async fn insert(&self, collection: Collection, row: Row) -> Result<(), RemoteError> {
        Self::check(&self.fail_writes)?;
        self.inner.insert(collection, row).await
    }

    async fn update(
        &self,
        collection: Collection,
        filter: &Filter,
        fields: Row,
    ) -> Result<(), RemoteError> {
        Self::check(&self.fail_writes)?;
        self.inner.update(collection, filter, fields).await
    }

    async fn delete(&self, collection: Collection, filter: &Filter) -> Result<(), RemoteError> {
        Self::check(&self.fail_writes)?;
        self.inner.delete(collection, filter).await
    }
}

/// Backend holding every read while closed. Each held read reports its
/// collection on the returned channel.
struct Gated {
    inner: MemoryStore,
    closed: watch::Sender<bool>,
    entered: mpsc::UnboundedSender<Collection>,
}

impl Gated {
    fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Collection>) {
        let (entered, rx) = mpsc::unbounded_channel();
        let gated = Self {
            inner: MemoryStore::new(),
            closed: watch::Sender::new(false),
            entered,
        };
        (Arc::new(gated), rx)
    }

    fn close(&self) {
        self.closed.send_replace(true);
    }

    fn open(&self) {
        self.closed.send_replace(false);
    }
}

#[async_trait]
impl RemoteStore for Gated {
    async fn select(&self, collection: Collection, filter: &Filter) -> Result<Vec<Row>, RemoteError> {
        let rows = self.inner.select(collection, filter).await;
        let mut closed = self.closed.subscribe();
        if *closed.borrow_and_update() {
            let _ = self.entered.send(collection);
            let _ = closed.wait_for(|closed| !*closed).await;
        }
        rows
    }

    async fn insert(&self, collection: Collection, row: Row) -> Result<(), RemoteError> {
        self.inner.insert(collection, row).await
    }

    async fn update(
        &self,
        collection: Collection,
        filter: &Filter,
        fields: Row,
    ) -> Result<(), RemoteError> {
        self.inner.update(collection, filter, fields).await
    }

    async fn delete(&self, collection: Collection, filter: &Filter) -> Result<(), RemoteError> {
        self.inner.delete(collection, filter).await
    }
}

#[tokio::test]
async fn add_then_list_newest_first() {
    let provider = SessionProvider::signed_in(alice());
    let store = ExpenseStore::new(Arc::new(MemoryStore::new()), provider.session());

    store
        .add(NewExpense::new("Coffee", Amount::new(350), day(2)).with_category(Category::Food))
        .await
        .unwrap();
    store
        .add(
            NewExpense::new("Cinema", Amount::new(1_200), day(9))
                .with_category(Category::Entertainment)
                .with_notes("with Bob"),
        )
        .await
        .unwrap();

    let listed = store.list();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].title, "Cinema");
    assert_eq!(listed[0].notes.as_deref(), Some("with Bob"));
    assert_eq!(listed[1].category, Category::Food);
    assert!(listed.iter().all(|e| e.user_id == alice()));
    assert_eq!(store.total_spent(), Amount::new(1_550));
    assert!(!store.is_loading());
}

#[tokio::test]
async fn update_touches_only_given_fields() {
    let provider = SessionProvider::signed_in(alice());
    let store = ExpenseStore::new(Arc::new(MemoryStore::new()), provider.session());
    store
        .add(
            NewExpense::new("Taxi", Amount::new(2_000), day(4))
                .with_category(Category::Transport)
                .with_notes("airport"),
        )
        .await
        .unwrap();
    let before = store.list().remove(0);

    store
        .update(
            &before.id,
            ExpenseUpdate {
                title: Some("Airport taxi".to_string()),
                notes: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let after = store.list().remove(0);
    assert_eq!(after.id, before.id);
    assert_eq!(after.title, "Airport taxi");
    assert_eq!(after.amount, before.amount);
    assert_eq!(after.category, Category::Transport);
    assert_eq!(after.notes, None);
    assert_eq!(after.created_at, before.created_at);
}

#[tokio::test]
async fn delete_missing_id_is_a_no_op() {
    let provider = SessionProvider::signed_in(alice());
    let store = ExpenseStore::new(Arc::new(MemoryStore::new()), provider.session());
    store
        .add(NewExpense::new("Book", Amount::new(1_500), day(1)))
        .await
        .unwrap();
    let id = store.list()[0].id.clone();

    store.delete(&id).await.unwrap();
    assert!(store.list().is_empty());
    store.delete(&id).await.unwrap();
    store.delete("does-not-exist").await.unwrap();
    assert!(store.list().is_empty());
}

#[tokio::test]
async fn foreign_expense_cannot_be_changed() {
    let remote = Arc::new(MemoryStore::new());
    let bob = SessionProvider::signed_in(UserId::new("bob"));
    let bob_store = ExpenseStore::new(remote.clone(), bob.session());
    bob_store
        .add(NewExpense::new("Rent", Amount::major(900), day(1)).with_category(Category::Bills))
        .await
        .unwrap();
    let id = bob_store.list()[0].id.clone();

    let provider = SessionProvider::signed_in(alice());
    let store = ExpenseStore::new(remote.clone(), provider.session());
    let err = store
        .update(
            &id,
            ExpenseUpdate {
                amount: Some(Amount::new(1)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Backend(RemoteError::Forbidden(_))));
    let err = store.delete(&id).await.unwrap_err();
    assert!(matches!(err, EngineError::Backend(RemoteError::Forbidden(_))));

    bob_store.refetch().await;
    let rent = bob_store.list().remove(0);
    assert_eq!(rent.amount, Amount::major(900));
    assert_eq!(remote.rows(Collection::Expenses).await.len(), 1);
}

#[tokio::test]
async fn signed_out_calls_fail_without_touching_the_backend() {
    let provider = SessionProvider::new();
    let remote = Arc::new(MemoryStore::new());
    let store = ExpenseStore::new(remote.clone(), provider.session());

    let err = store
        .add(NewExpense::new("Tea", Amount::new(300), day(2)))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::NotAuthenticated);
    assert_eq!(store.delete("x").await, Err(EngineError::NotAuthenticated));
    assert!(store.list().is_empty());
    assert_eq!(store.total_spent(), Amount::ZERO);
    assert!(remote.rows(Collection::Expenses).await.is_empty());

    let profiles = ProfileStore::new(remote, provider.session());
    assert_eq!(
        profiles.update_budget(Amount::major(100)).await,
        Err(EngineError::NotAuthenticated)
    );
}

#[tokio::test]
async fn failed_operations_keep_the_previous_snapshot() {
    let remote = Arc::new(Flaky::default());
    let provider = SessionProvider::signed_in(alice());
    let store = ExpenseStore::new(remote.clone(), provider.session());
    store
        .add(NewExpense::new("Lunch", Amount::new(1_250), day(3)))
        .await
        .unwrap();
    let before = store.snapshot();

    remote.fail_writes.store(true, Ordering::SeqCst);
    let err = store
        .add(NewExpense::new("Dinner", Amount::new(3_000), day(3)))
        .await
        .unwrap_err();
    assert!(err.is_backend());
    assert_eq!(store.snapshot(), before);

    remote.fail_writes.store(false, Ordering::SeqCst);
    remote.fail_reads.store(true, Ordering::SeqCst);
    store.refetch().await;
    assert_eq!(store.snapshot().expenses, before.expenses);
    assert!(!store.is_loading());
}

#[tokio::test]
async fn profile_budget_flow() {
    let provider = SessionProvider::signed_in(alice());
    let remote = Arc::new(MemoryStore::new());
    let profiles = ProfileStore::new(remote.clone(), provider.session());

    profiles.provision(Some("Alice")).await.unwrap();
    assert!(profiles.needs_setup());
    assert_eq!(profiles.profile().unwrap().display_name(), Some("Alice"));

    // Provisioning twice keeps the single row.
    profiles.provision(None).await.unwrap();
    assert_eq!(remote.rows(Collection::Profiles).await.len(), 1);

    profiles.update_budget(Amount::major(50_000)).await.unwrap();
    let profile = profiles.profile().unwrap();
    assert!(!profiles.needs_setup());
    assert_eq!(profile.monthly_salary, Amount::major(50_000));
    assert!(profile.salary_set_at.is_some());

    profiles.update_budget(Amount::ZERO).await.unwrap();
    let profile = profiles.profile().unwrap();
    assert!(profiles.needs_setup());
    assert_eq!(profile.salary_set_at, None);
}

#[tokio::test]
async fn missing_profile_does_not_need_setup() {
    let provider = SessionProvider::signed_in(alice());
    let profiles = ProfileStore::new(Arc::new(MemoryStore::new()), provider.session());
    profiles.fetch().await;
    assert!(profiles.profile().is_none());
    assert!(!profiles.needs_setup());
    assert!(!profiles.is_loading());
}

#[tokio::test]
async fn null_salary_row_needs_setup() {
    let remote = Arc::new(MemoryStore::new());
    remote
        .insert(
            Collection::Profiles,
            json!({"user_id": "alice", "full_name": null, "monthly_salary": null}),
        )
        .await
        .unwrap();
    let provider = SessionProvider::signed_in(alice());
    let profiles = ProfileStore::new(remote, provider.session());
    profiles.fetch().await;
    assert!(profiles.needs_setup());
}

#[tokio::test]
async fn dashboard_summary() {
    let provider = SessionProvider::signed_in(alice());
    let tracker = Tracker::new(Arc::new(MemoryStore::new()), provider.session());
    tracker.profile().provision(Some("Alice")).await.unwrap();
    tracker
        .profile()
        .update_budget(Amount::major(50_000))
        .await
        .unwrap();
    tracker
        .expenses()
        .add(NewExpense::new("Groceries", Amount::major(12_000), day(1)).with_category(Category::Food))
        .await
        .unwrap();
    tracker
        .expenses()
        .add(NewExpense::new("Power", Amount::major(8_000), day(2)).with_category(Category::Bills))
        .await
        .unwrap();

    let summary = tracker.summary();
    assert_eq!(summary.budget, Amount::major(50_000));
    assert_eq!(summary.spent, Amount::major(20_000));
    assert_eq!(summary.remaining, Amount::major(30_000));
    assert_eq!(
        summary.categories_by_total(),
        vec![
            (Category::Food, Amount::major(12_000)),
            (Category::Bills, Amount::major(8_000))
        ]
    );
    assert!(!tracker.needs_setup());
    assert!(!tracker.is_loading());
    assert_eq!(tracker.display_name().as_deref(), Some("Alice"));
}

#[tokio::test]
async fn stale_fetch_is_discarded_after_sign_out() {
    let (remote, mut entered) = Gated::new();
    remote
        .inner
        .insert(
            Collection::Expenses,
            json!({"user_id": "alice", "title": "Gift", "amount": 25, "category": "Shopping", "date": "2024-05-05"}),
        )
        .await
        .unwrap();

    let provider = SessionProvider::signed_in(alice());
    let store = Arc::new(ExpenseStore::new(remote.clone(), provider.session()));

    remote.close();
    let pending = tokio::spawn({
        let store = store.clone();
        async move { store.refetch().await }
    });
    assert_eq!(entered.recv().await, Some(Collection::Expenses));

    provider.sign_out();
    store.sync_session().await;
    assert!(store.snapshot().expenses.is_empty());

    remote.open();
    pending.await.unwrap();

    let snapshot = store.snapshot();
    assert!(snapshot.expenses.is_empty());
    assert!(!snapshot.loading);
}

#[tokio::test]
async fn follow_session_clears_on_sign_out() {
    let remote = Arc::new(MemoryStore::new());
    remote
        .insert(
            Collection::Expenses,
            json!({"user_id": "alice", "title": "Gym", "amount": 40, "category": "Healthcare", "date": "2024-05-06"}),
        )
        .await
        .unwrap();
    remote
        .insert(
            Collection::Profiles,
            json!({"user_id": "alice", "full_name": "Alice", "monthly_salary": 1000}),
        )
        .await
        .unwrap();

    let provider = SessionProvider::new();
    let tracker = Arc::new(Tracker::new(remote, provider.session()));
    let mut expenses = tracker.expenses().subscribe();
    let mut profile = tracker.profile().subscribe();

    let follower = tokio::spawn({
        let tracker = tracker.clone();
        async move { tracker.follow_session().await }
    });

    provider.sign_in(alice());
    timeout(
        Duration::from_secs(1),
        expenses.wait_for(|s| s.expenses.len() == 1 && !s.loading),
    )
    .await
    .unwrap()
    .unwrap();
    timeout(
        Duration::from_secs(1),
        profile.wait_for(|s| s.profile.is_some() && !s.loading),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(tracker.summary().remaining, Amount::major(960));

    provider.sign_out();
    timeout(
        Duration::from_secs(1),
        expenses.wait_for(|s| s.expenses.is_empty() && !s.loading),
    )
    .await
    .unwrap()
    .unwrap();
    timeout(Duration::from_secs(1), profile.wait_for(|s| s.profile.is_none()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tracker.summary().spent, Amount::ZERO);
    assert!(tracker.current_user().is_none());

    drop(provider);
    timeout(Duration::from_secs(1), follower)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn sign_out_during_held_reads_clears_both_stores() {
    let (remote, mut entered) = Gated::new();
    remote
        .inner
        .insert(
            Collection::Expenses,
            json!({"user_id": "alice", "title": "Train", "amount": 18, "category": "Transport", "date": "2024-05-07"}),
        )
        .await
        .unwrap();
    remote
        .inner
        .insert(
            Collection::Profiles,
            json!({"user_id": "alice", "full_name": "Alice", "monthly_salary": 1000}),
        )
        .await
        .unwrap();

    let provider = SessionProvider::signed_in(alice());
    let tracker = Arc::new(Tracker::new(remote.clone(), provider.session()));
    let mut expenses = tracker.expenses().subscribe();
    let mut profile = tracker.profile().subscribe();

    remote.close();
    let follower = tokio::spawn({
        let tracker = tracker.clone();
        async move { tracker.follow_session().await }
    });
    let mut held = Vec::new();
    for _ in 0..2 {
        let collection = timeout(Duration::from_secs(1), entered.recv())
            .await
            .unwrap()
            .unwrap();
        held.push(collection);
    }
    assert!(held.contains(&Collection::Expenses));
    assert!(held.contains(&Collection::Profiles));
    assert!(tracker.is_loading());

    provider.sign_out();
    timeout(
        Duration::from_secs(1),
        expenses.wait_for(|s| s.owner.is_none() && s.expenses.is_empty() && !s.loading),
    )
    .await
    .unwrap()
    .unwrap();
    timeout(
        Duration::from_secs(1),
        profile.wait_for(|s| s.owner.is_none() && s.profile.is_none() && !s.loading),
    )
    .await
    .unwrap()
    .unwrap();

    // Both reads are still held here.
    assert!(!tracker.is_loading());
    assert!(tracker.expenses().list().is_empty());
    assert!(tracker.profile().profile().is_none());
    assert_eq!(tracker.summary().spent, Amount::ZERO);
    assert_eq!(tracker.summary().budget, Amount::ZERO);
    assert_eq!(tracker.display_name(), None);

    remote.open();
    drop(provider);
    timeout(Duration::from_secs(1), follower)
        .await
        .unwrap()
        .unwrap();
    assert!(tracker.expenses().snapshot().expenses.is_empty());
    assert!(tracker.profile().snapshot().profile.is_none());
}

#[tokio::test]
async fn switching_user_with_failed_fetch_drops_previous_expenses() {
    let remote = Arc::new(Flaky::default());
    remote
        .inner
        .insert(
            Collection::Expenses,
            json!({"user_id": "alice", "title": "Flowers", "amount": 30, "category": "Shopping", "date": "2024-05-08"}),
        )
        .await
        .unwrap();
    let provider = SessionProvider::signed_in(alice());
    let tracker = Tracker::new(remote.clone(), provider.session());
    tracker.sync_session().await;
    assert_eq!(tracker.expenses().list().len(), 1);

    remote.fail_reads.store(true, Ordering::SeqCst);
    provider.sign_in(bob());
    // Nothing loaded for bob yet.
    assert!(tracker.expenses().list().is_empty());

    tracker.sync_session().await;
    let snapshot = tracker.expenses().snapshot();
    assert_eq!(snapshot.owner, Some(bob()));
    assert!(snapshot.expenses.is_empty());
    assert!(!snapshot.loading);
    assert!(tracker.expenses().list().is_empty());
    assert_eq!(tracker.expenses().total_spent(), Amount::ZERO);
    assert_eq!(tracker.summary().spent, Amount::ZERO);
    assert!(tracker.profile().profile().is_none());
}

#[tokio::test]
async fn switching_to_user_without_profile_drops_previous_profile() {
    let remote = Arc::new(MemoryStore::new());
    remote
        .insert(
            Collection::Profiles,
            json!({"user_id": "alice", "full_name": "Alice", "monthly_salary": 1000}),
        )
        .await
        .unwrap();
    let provider = SessionProvider::signed_in(alice());
    let tracker = Tracker::new(remote, provider.session());
    tracker.sync_session().await;
    assert_eq!(tracker.summary().budget, Amount::major(1_000));

    provider.sign_in(bob());
    tracker.sync_session().await;

    assert!(tracker.profile().profile().is_none());
    assert_eq!(tracker.profile().snapshot().owner, Some(bob()));
    assert!(!tracker.needs_setup());
    assert!(!tracker.is_loading());
    assert_eq!(tracker.summary().budget, Amount::ZERO);
    assert_eq!(tracker.display_name().as_deref(), Some("bob"));
}
