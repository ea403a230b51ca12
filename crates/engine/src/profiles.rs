//! The signed-in user's profile: display name and monthly budget.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::{
    Amount, EngineError, ResultEngine,
    money::null_as_zero,
    remote::{Collection, Filter, RemoteError, RemoteStore},
    session::{Session, UserId},
    util::{decode_rows, double_option},
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub user_id: UserId,
    #[serde(default)]
    pub full_name: Option<String>,
    /// Zero means the budget was never set.
    #[serde(default, deserialize_with = "null_as_zero")]
    pub monthly_salary: Amount,
    #[serde(default)]
    pub salary_set_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// `true` until a budget has been entered.
    pub fn needs_setup(&self) -> bool {
        self.monthly_salary.is_zero()
    }

    /// Name to greet the user with, if one was given.
    pub fn display_name(&self) -> Option<&str> {
        self.full_name.as_deref().filter(|name| !name.trim().is_empty())
    }
}

/// Partial update of a profile; `Some(None)` writes `null`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub full_name: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_salary: Option<Amount>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub salary_set_at: Option<Option<DateTime<Utc>>>,
}

impl ProfileUpdate {
    /// Budget change with its timestamp. A zero budget clears the stamp so
    /// that `salary_set_at` stays present exactly when a budget is set.
    pub fn budget(amount: Amount, now: DateTime<Utc>) -> Self {
        Self {
            full_name: None,
            monthly_salary: Some(amount),
            salary_set_at: Some((!amount.is_zero()).then_some(now)),
        }
    }
}

#[derive(Serialize)]
struct ProfileInsert<'a> {
    user_id: &'a UserId,
    full_name: Option<&'a str>,
    monthly_salary: Amount,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProfileSnapshot {
    /// User the profile was loaded for.
    pub owner: Option<UserId>,
    pub profile: Option<Profile>,
    pub loading: bool,
}

impl ProfileSnapshot {
    fn loading(owner: Option<UserId>) -> Self {
        Self {
            owner,
            profile: None,
            loading: true,
        }
    }

    pub fn needs_setup(&self) -> bool {
        self.profile.as_ref().is_some_and(Profile::needs_setup)
    }

    /// Budget of the loaded profile, zero without one.
    pub fn budget(&self) -> Amount {
        self.profile
            .as_ref()
            .map(|profile| profile.monthly_salary)
            .unwrap_or_default()
    }
}

pub struct ProfileStore {
    remote: Arc<dyn RemoteStore>,
    session: Session,
    snapshot: watch::Sender<ProfileSnapshot>,
}

impl ProfileStore {
    pub fn new(remote: Arc<dyn RemoteStore>, session: Session) -> Self {
        let (snapshot, _) = watch::channel(ProfileSnapshot::loading(None));
        Self {
            remote,
            session,
            snapshot,
        }
    }

    pub fn snapshot(&self) -> ProfileSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ProfileSnapshot> {
        self.snapshot.subscribe()
    }

    /// The signed-in user's profile, if one was loaded for them.
    pub fn profile(&self) -> Option<Profile> {
        let snapshot = self.snapshot.borrow();
        let owned = snapshot
            .owner
            .as_ref()
            .is_some_and(|owner| self.session.is_current(owner));
        if !owned {
            return None;
        }
        snapshot.profile.clone()
    }

    /// Gate for the one-time budget entry flow; evaluated on every call.
    pub fn needs_setup(&self) -> bool {
        self.profile().as_ref().is_some_and(Profile::needs_setup)
    }

    pub fn is_loading(&self) -> bool {
        self.snapshot.borrow().loading
    }

    /// Load the profile row. Without a session the snapshot is cleared
    /// immediately.
    pub async fn fetch(&self) {
        match self.session.current_user() {
            Some(user) => self.fetch_for(&user).await,
            None => self.clear(),
        }
    }

    pub async fn sync_session(&self) {
        self.fetch().await;
    }

    /// Set the monthly budget and stamp `salary_set_at` in the same write.
    pub async fn update_budget(&self, amount: Amount) -> ResultEngine<()> {
        let user = self.session.require_user()?;
        let fields = serde_json::to_value(ProfileUpdate::budget(amount, Utc::now()))?;

        self.remote
            .update(Collection::Profiles, &Filter::owned_by(&user), fields)
            .await
            .inspect_err(|err| tracing::warn!("failed to update budget: {err}"))?;

        self.fetch_for(&user).await;
        Ok(())
    }

    /// Create the profile row if the user has none yet.
    ///
    /// The hosted backend does this on sign-up; local backends rely on this
    /// call instead.
    pub async fn provision(&self, full_name: Option<&str>) -> ResultEngine<()> {
        let user = self.session.require_user()?;
        let existing = self
            .remote
            .select(Collection::Profiles, &Filter::owned_by(&user))
            .await?;

        if existing.is_empty() {
            let row = serde_json::to_value(ProfileInsert {
                user_id: &user,
                full_name,
                monthly_salary: Amount::ZERO,
            })?;
            self.remote.insert(Collection::Profiles, row).await?;
            tracing::info!("provisioned profile for {user}");
        }

        self.fetch_for(&user).await;
        Ok(())
    }

    pub async fn follow_session(&self) {
        let mut current = self.session.watch();
        loop {
            let user = current.borrow_and_update().clone();
            if let Some(user) = user {
                let interrupted = tokio::select! {
                    () = self.fetch_for(&user) => None,
                    changed = current.changed() => Some(changed.is_ok()),
                };
                match interrupted {
                    Some(true) => continue,
                    Some(false) => return,
                    None => {}
                }
            } else {
                self.clear();
            }

            if current.changed().await.is_err() {
                return;
            }
        }
    }

    pub fn clear(&self) {
        self.snapshot.send_replace(ProfileSnapshot::default());
    }

    async fn fetch_for(&self, user: &UserId) {
        if !self.session.is_current(user) {
            return;
        }
        self.snapshot.send_modify(|snapshot| {
            if snapshot.owner.as_ref() != Some(user) {
                *snapshot = ProfileSnapshot::loading(Some(user.clone()));
            }
            snapshot.loading = true;
        });
        tracing::debug!("fetching profile for {user}");

        let result = self
            .remote
            .select(Collection::Profiles, &Filter::owned_by(user))
            .await
            .map_err(EngineError::from)
            .and_then(decode_rows::<Profile>)
            .and_then(single_profile);

        if !self.session.is_current(user) {
            tracing::warn!("discarding profile fetched for {user}: session changed");
            return;
        }

        match result {
            Ok(profile) => {
                self.snapshot.send_replace(ProfileSnapshot {
                    owner: Some(user.clone()),
                    profile: Some(profile),
                    loading: false,
                });
            }
            Err(err) => {
                tracing::error!("error fetching profile: {err}");
                self.snapshot.send_modify(|snapshot| snapshot.loading = false);
            }
        }
    }
}

fn single_profile(mut profiles: Vec<Profile>) -> ResultEngine<Profile> {
    match profiles.len() {
        1 => Ok(profiles.remove(0)),
        0 => Err(RemoteError::NotFound("profile".to_string()).into()),
        n => Err(RemoteError::Conflict(format!("expected one profile, found {n}")).into()),
    }
}
