//! Facade bundling the session, both stores and the budget derivations.

use std::sync::Arc;

use crate::{
    budget::BudgetSummary,
    expenses::ExpenseStore,
    profiles::ProfileStore,
    remote::RemoteStore,
    session::{Session, UserId},
};

pub struct Tracker {
    session: Session,
    expenses: ExpenseStore,
    profile: ProfileStore,
}

impl Tracker {
    /// Both stores share one backend and one session.
    pub fn new(remote: Arc<dyn RemoteStore>, session: Session) -> Self {
        Self {
            expenses: ExpenseStore::new(Arc::clone(&remote), session.clone()),
            profile: ProfileStore::new(remote, session.clone()),
            session,
        }
    }

    pub fn expenses(&self) -> &ExpenseStore {
        &self.expenses
    }

    pub fn profile(&self) -> &ProfileStore {
        &self.profile
    }

    pub fn current_user(&self) -> Option<UserId> {
        self.session.current_user()
    }

    /// Budget metrics over the current snapshots.
    pub fn summary(&self) -> BudgetSummary {
        let profile = self.profile.profile();
        let expenses = self.expenses.list();
        BudgetSummary::compute(profile.as_ref(), &expenses)
    }

    pub fn needs_setup(&self) -> bool {
        self.profile.needs_setup()
    }

    /// `true` while either store is loading.
    pub fn is_loading(&self) -> bool {
        self.expenses.is_loading() || self.profile.is_loading()
    }

    /// Name shown in greetings: the profile's name, else the user id.
    pub fn display_name(&self) -> Option<String> {
        let profile = self.profile.profile();
        profile
            .as_ref()
            .and_then(|profile| profile.display_name())
            .map(ToString::to_string)
            .or_else(|| self.current_user().map(|user| user.to_string()))
    }

    /// One-shot alignment of both stores with the current session.
    pub async fn sync_session(&self) {
        tokio::join!(self.expenses.sync_session(), self.profile.sync_session());
    }

    /// Keep both stores following the session until the provider is dropped.
    pub async fn follow_session(&self) {
        tokio::join!(
            self.expenses.follow_session(),
            self.profile.follow_session()
        );
    }
}
