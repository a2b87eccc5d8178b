//! Scoped check queries: visibility, predicates, week grouping.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

use paydeck_core::domain::check::Check;
use paydeck_core::domain::company::{ClientId, CompanyId};
use paydeck_core::domain::user::{User, UserId};
use paydeck_core::week::{iso_week_label, WeekKey};

use crate::auth::AuthProvider;
use crate::chunk::fetch_by_membership;
use crate::directory::UserDirectory;
use crate::errors::EngineError;
use paydeck_db::repositories::{
    CheckFilter, CheckRepository, ReviewRequestRepository,
};

/// Explicit scope narrowing on top of the caller's visibility. Requested
/// companies are intersected with the caller's membership, never trusted.
#[derive(Clone, Debug, Default)]
pub struct QueryScope {
    pub company_id: Option<CompanyId>,
    pub week: Option<WeekKey>,
    pub created_by: Option<UserId>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReviewStatusFilter {
    #[default]
    All,
    NeedsReview,
    Reviewed,
}

#[derive(Clone, Debug, Default)]
pub struct QueryFilters {
    /// Case-insensitive substring over employee name or creator name.
    pub search_text: Option<String>,
    /// Matches the legacy client field or any relationship's client.
    pub client_id: Option<ClientId>,
    pub review_status: ReviewStatusFilter,
}

/// Effective review state of one check: the stored flag, widened by any
/// open request correlating on the check's (company, week, creator).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReviewState {
    Unreviewed,
    PendingReview,
    Reviewed,
}

#[derive(Clone, Debug)]
pub struct CheckRow {
    pub check: Check,
    pub review_state: ReviewState,
    pub creator_name: String,
}

#[derive(Clone, Debug)]
pub struct WeekBucket {
    pub week_key: WeekKey,
    /// ISO week label for display only; never a grouping key.
    pub label: String,
    pub rows: Vec<CheckRow>,
}

#[derive(Clone, Debug)]
pub struct QuerySnapshot {
    /// Staleness tag: compare against [`CheckQueryEngine::generation`]
    /// and discard when it moved on.
    pub generation: u64,
    pub buckets: Vec<WeekBucket>,
}

pub struct CheckQueryEngine {
    checks: Arc<dyn CheckRepository>,
    requests: Arc<dyn ReviewRequestRepository>,
    directory: UserDirectory,
    generation: AtomicU64,
    name_cache: RwLock<HashMap<UserId, String>>,
}

impl CheckQueryEngine {
    pub fn new(
        checks: Arc<dyn CheckRepository>,
        requests: Arc<dyn ReviewRequestRepository>,
        directory: UserDirectory,
    ) -> Self {
        Self {
            checks,
            requests,
            directory,
            generation: AtomicU64::new(0),
            name_cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Drops cached names and bumps the staleness tag. Called on scope
    /// change, explicit refresh, completed mutations, and identity
    /// changes; never on a timer.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut cache) = self.name_cache.try_write() {
            cache.clear();
        }
    }

    /// Bumps the staleness tag whenever the signed-in identity changes.
    pub fn subscribe_identity(
        self: Arc<Self>,
        auth: &dyn AuthProvider,
    ) -> tokio::task::JoinHandle<()> {
        let mut receiver = auth.watch_identity();
        tokio::spawn(async move {
            while receiver.changed().await.is_ok() {
                self.invalidate();
            }
        })
    }

    pub async fn fetch(
        &self,
        actor: &User,
        scope: &QueryScope,
        filters: &QueryFilters,
    ) -> Result<QuerySnapshot, EngineError> {
        let generation = self.generation();

        let checks = self.fetch_visible(actor, scope).await?;
        let names = self.resolve_names(actor, &checks).await?;
        let states = self.review_states(&checks).await?;

        let mut rows: Vec<CheckRow> = checks
            .into_iter()
            .map(|check| {
                let creator_name = names
                    .get(&check.created_by)
                    .cloned()
                    .unwrap_or_else(|| UserDirectory::fallback_label(&check.created_by));
                let review_state = states
                    .get(&check.id.0)
                    .copied()
                    .unwrap_or(ReviewState::Unreviewed);
                CheckRow { check, review_state, creator_name }
            })
            .filter(|row| row_matches(row, filters))
            .collect();

        // stable: equal check numbers keep their fetched order
        rows.sort_by(|left, right| right.check.check_number.cmp(&left.check.check_number));

        let mut grouped: BTreeMap<WeekKey, Vec<CheckRow>> = BTreeMap::new();
        for row in rows {
            grouped.entry(row.check.week_key()).or_default().push(row);
        }

        let buckets = grouped
            .into_iter()
            .rev()
            .map(|(week_key, rows)| WeekBucket {
                week_key,
                label: iso_week_label(week_key.sunday()),
                rows,
            })
            .collect();

        Ok(QuerySnapshot { generation, buckets })
    }

    /// Applies the caller's visibility before anything else. Admins see
    /// every company; everyone else is cut down to their membership, and
    /// an explicit company override can only narrow, never widen.
    async fn fetch_visible(
        &self,
        actor: &User,
        scope: &QueryScope,
    ) -> Result<Vec<Check>, EngineError> {
        let filter = CheckFilter {
            company_id: None,
            week: scope.week,
            created_by: scope.created_by.clone(),
            reviewed: None,
        };

        if actor.is_admin() {
            let filter = CheckFilter { company_id: scope.company_id.clone(), ..filter };
            return self.checks.list(&filter).await.map_err(EngineError::StoreRead);
        }

        let allowed: Vec<CompanyId> = match &scope.company_id {
            Some(requested) if actor.company_ids.contains(requested) => {
                vec![requested.clone()]
            }
            Some(_) => Vec::new(),
            None => actor.company_ids.clone(),
        };
        if allowed.is_empty() {
            return Ok(Vec::new());
        }

        let checks = self.checks.clone();
        fetch_by_membership(&allowed, |chunk: Vec<CompanyId>| {
            let checks = checks.clone();
            let filter = filter.clone();
            async move { checks.list_by_companies_chunk(&chunk, &filter).await }
        })
        .await
        .map_err(EngineError::StoreRead)
    }

    async fn resolve_names(
        &self,
        actor: &User,
        checks: &[Check],
    ) -> Result<HashMap<UserId, String>, EngineError> {
        let mut creator_ids: Vec<UserId> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        for check in checks {
            if seen.insert(check.created_by.0.as_str()) {
                creator_ids.push(check.created_by.clone());
            }
        }

        let mut resolved: HashMap<UserId, String> = HashMap::new();
        {
            let cache = self.name_cache.read().await;
            for id in &creator_ids {
                if let Some(name) = cache.get(id) {
                    resolved.insert(id.clone(), name.clone());
                }
            }
        }

        let missing: Vec<UserId> = creator_ids
            .iter()
            .filter(|id| !resolved.contains_key(*id))
            .cloned()
            .collect();
        if !missing.is_empty() {
            let fresh = self.directory.resolve(&missing, actor).await?;
            let mut cache = self.name_cache.write().await;
            for (id, name) in fresh {
                cache.insert(id.clone(), name.clone());
                resolved.insert(id, name);
            }
        }

        Ok(resolved)
    }

    async fn review_states(
        &self,
        checks: &[Check],
    ) -> Result<HashMap<String, ReviewState>, EngineError> {
        let mut weeks: HashSet<(CompanyId, WeekKey)> = HashSet::new();
        for check in checks {
            if !check.reviewed {
                weeks.insert((check.company_id.clone(), check.week_key()));
            }
        }

        // correlation triples with an open request, plus directly targeted checks
        let mut open_triples: HashSet<(CompanyId, WeekKey, UserId)> = HashSet::new();
        let mut open_check_ids: HashSet<String> = HashSet::new();
        for (company_id, week_key) in weeks {
            let open = self
                .requests
                .list_open_for_week(&company_id, week_key)
                .await
                .map_err(EngineError::StoreRead)?;
            for request in open {
                if let Some(check_id) = request.check_id() {
                    open_check_ids.insert(check_id.0.clone());
                }
                open_triples.insert((
                    request.company_id.clone(),
                    request.week_key,
                    request.created_by.clone(),
                ));
            }
        }

        Ok(checks
            .iter()
            .map(|check| {
                let state = if check.reviewed {
                    ReviewState::Reviewed
                } else if open_check_ids.contains(&check.id.0)
                    || open_triples.contains(&(
                        check.company_id.clone(),
                        check.week_key(),
                        check.created_by.clone(),
                    ))
                {
                    ReviewState::PendingReview
                } else {
                    ReviewState::Unreviewed
                };
                (check.id.0.clone(), state)
            })
            .collect())
    }
}

fn row_matches(row: &CheckRow, filters: &QueryFilters) -> bool {
    match filters.review_status {
        ReviewStatusFilter::All => {}
        ReviewStatusFilter::NeedsReview => {
            if row.review_state == ReviewState::Reviewed {
                return false;
            }
        }
        ReviewStatusFilter::Reviewed => {
            if row.review_state != ReviewState::Reviewed {
                return false;
            }
        }
    }

    if let Some(client_id) = &filters.client_id {
        let legacy = row.check.client_id.as_ref() == Some(client_id);
        let via_relationship = row
            .check
            .relationship_details
            .iter()
            .any(|detail| detail.client_id == *client_id);
        if !legacy && !via_relationship {
            return false;
        }
    }

    if let Some(needle) = &filters.search_text {
        let needle = needle.trim().to_lowercase();
        if !needle.is_empty() {
            let employee = row.check.employee_name.to_lowercase();
            let creator = row.creator_name.to_lowercase();
            if !employee.contains(&needle) && !creator.contains(&needle) {
                return false;
            }
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;

    use paydeck_core::domain::company::CompanyId;
    use paydeck_core::domain::user::{Role, User, UserId};
    use paydeck_core::week::WeekKey;
    use paydeck_db::fixtures::seed_memory;
    use paydeck_db::repositories::InMemoryStore;

    use super::{
        CheckQueryEngine, QueryFilters, QueryScope, ReviewState, ReviewStatusFilter,
    };
    use crate::directory::UserDirectory;

    async fn engine() -> (Arc<InMemoryStore>, CheckQueryEngine) {
        let store = Arc::new(InMemoryStore::new());
        seed_memory(&store).await.expect("seed");
        let engine = CheckQueryEngine::new(
            store.clone(),
            store.clone(),
            UserDirectory::new(store.clone()),
        );
        (store, engine)
    }

    fn admin() -> User {
        User {
            id: UserId("u-admin".to_string()),
            uid: "auth-admin".to_string(),
            username: Some("pat.admin".to_string()),
            email: None,
            role: Role::Admin,
            can_print_checks: true,
            company_ids: Vec::new(),
        }
    }

    fn clerk() -> User {
        User {
            id: UserId("u-clerk".to_string()),
            uid: "auth-clerk".to_string(),
            username: Some("riley.clerk".to_string()),
            email: None,
            role: Role::User,
            can_print_checks: false,
            company_ids: vec![CompanyId("c-harbor".to_string())],
        }
    }

    fn august_week() -> WeekKey {
        WeekKey::for_date(NaiveDate::from_ymd_opt(2026, 8, 3).expect("date"))
    }

    #[tokio::test]
    async fn buckets_are_ordered_newest_week_first_and_by_check_number_within() {
        let (_, engine) = engine().await;

        let snapshot = engine
            .fetch(&admin(), &QueryScope::default(), &QueryFilters::default())
            .await
            .expect("fetch");

        assert_eq!(snapshot.buckets.len(), 2);
        assert_eq!(snapshot.buckets[0].week_key, august_week());
        let numbers: Vec<i64> = snapshot.buckets[0]
            .rows
            .iter()
            .map(|row| row.check.check_number)
            .collect();
        assert_eq!(numbers, vec![1003, 1002, 1001]);
        // label is presentation-only ISO text, not the key
        assert!(snapshot.buckets[0].label.contains("-W"));
    }

    #[tokio::test]
    async fn restricted_caller_never_sees_other_companies() {
        let (_, engine) = engine().await;

        let snapshot = engine
            .fetch(&clerk(), &QueryScope::default(), &QueryFilters::default())
            .await
            .expect("fetch");
        for bucket in &snapshot.buckets {
            for row in &bucket.rows {
                assert_eq!(row.check.company_id.0, "c-harbor");
            }
        }

        // an explicit scope override cannot widen visibility
        let override_scope = QueryScope {
            company_id: Some(CompanyId("c-lakeside".to_string())),
            ..QueryScope::default()
        };
        let leaked = engine
            .fetch(&clerk(), &override_scope, &QueryFilters::default())
            .await
            .expect("fetch");
        assert!(leaked.buckets.is_empty());
    }

    #[tokio::test]
    async fn search_matches_employee_or_creator_name() {
        let (_, engine) = engine().await;

        let by_employee = engine
            .fetch(
                &admin(),
                &QueryScope::default(),
                &QueryFilters {
                    search_text: Some("dana".to_string()),
                    ..QueryFilters::default()
                },
            )
            .await
            .expect("fetch");
        let total: usize = by_employee.buckets.iter().map(|b| b.rows.len()).sum();
        assert_eq!(total, 1);

        let by_creator = engine
            .fetch(
                &admin(),
                &QueryScope::default(),
                &QueryFilters {
                    search_text: Some("RILEY".to_string()),
                    ..QueryFilters::default()
                },
            )
            .await
            .expect("fetch");
        let total: usize = by_creator.buckets.iter().map(|b| b.rows.len()).sum();
        assert_eq!(total, 3);
    }

    #[tokio::test]
    async fn open_requests_widen_unreviewed_checks_to_pending() {
        let (_, engine) = engine().await;

        let snapshot = engine
            .fetch(
                &admin(),
                &QueryScope {
                    company_id: Some(CompanyId("c-harbor".to_string())),
                    week: Some(august_week()),
                    ..QueryScope::default()
                },
                &QueryFilters::default(),
            )
            .await
            .expect("fetch");

        let rows = &snapshot.buckets[0].rows;
        // the seeded open request covers (c-harbor, this week, auth-clerk)
        for row in rows {
            if row.check.created_by.0 == "auth-clerk" {
                assert_eq!(row.review_state, ReviewState::PendingReview);
            } else {
                assert_eq!(row.review_state, ReviewState::Unreviewed);
            }
        }
    }

    #[tokio::test]
    async fn review_status_filter_keeps_only_matching_rows() {
        let (_, engine) = engine().await;

        let reviewed = engine
            .fetch(
                &admin(),
                &QueryScope::default(),
                &QueryFilters {
                    review_status: ReviewStatusFilter::Reviewed,
                    ..QueryFilters::default()
                },
            )
            .await
            .expect("fetch");
        let ids: Vec<&str> = reviewed
            .buckets
            .iter()
            .flat_map(|b| b.rows.iter().map(|r| r.check.id.0.as_str()))
            .collect();
        assert_eq!(ids, vec!["chk-0999"]);
    }

    #[tokio::test]
    async fn invalidation_bumps_the_generation_tag() {
        let (_, engine) = engine().await;
        let before = engine
            .fetch(&admin(), &QueryScope::default(), &QueryFilters::default())
            .await
            .expect("fetch");

        engine.invalidate();
        let after = engine
            .fetch(&admin(), &QueryScope::default(), &QueryFilters::default())
            .await
            .expect("fetch");

        assert!(after.generation > before.generation);
        assert_eq!(before.generation, 0);
    }

    #[tokio::test]
    async fn restricted_fetch_goes_through_chunked_membership_queries() {
        let (store, engine) = engine().await;

        let mut caller = clerk();
        caller.company_ids =
            (0..25).map(|i| CompanyId(format!("c-extra-{i}"))).collect();
        caller.company_ids.push(CompanyId("c-harbor".to_string()));

        let before = store.membership_queries();
        let snapshot = engine
            .fetch(&caller, &QueryScope::default(), &QueryFilters::default())
            .await
            .expect("fetch");
        // 26 companies -> 3 chunk queries (10, 10, 6); the name resolution
        // afterwards issues its own chunked lookups
        assert!(store.membership_queries() - before >= 3);
        let total: usize = snapshot.buckets.iter().map(|b| b.rows.len()).sum();
        assert_eq!(total, 4);
    }
}
