//! The normalized, indexed view of one uploaded export.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use growth_core::models::{Period, Record};

/// An immutable collection of normalized records plus the indices the metric
/// engine queries.
///
/// Built once per analysis call and discarded with the response; nothing
/// here is shared or mutated across requests.
#[derive(Debug, Clone)]
pub struct Dataset {
    records: Vec<Record>,
    /// Distinct user ids grouped by signup ISO week.
    users_by_signup_week: BTreeMap<Period, HashSet<String>>,
    /// Activity periods per user, ascending.
    activity_by_user: HashMap<String, BTreeSet<Period>>,
    /// Distinct active user ids per period.
    active_by_period: BTreeMap<Period, HashSet<String>>,
    /// First period each user was observed in (signup, or first activity
    /// when the signup date is missing).
    first_seen: HashMap<String, Period>,
}

impl Dataset {
    /// Build the dataset and all derived indices from normalized records.
    pub fn from_records(records: Vec<Record>) -> Dataset {
        let mut users_by_signup_week: BTreeMap<Period, HashSet<String>> = BTreeMap::new();
        let mut activity_by_user: HashMap<String, BTreeSet<Period>> = HashMap::new();
        let mut active_by_period: BTreeMap<Period, HashSet<String>> = BTreeMap::new();
        let mut first_seen: HashMap<String, Period> = HashMap::new();

        for record in &records {
            if let Some(signup) = record.signup_date {
                let period = Period::from_date(signup);
                users_by_signup_week
                    .entry(period)
                    .or_default()
                    .insert(record.user_id.clone());
                Self::observe(&mut first_seen, &record.user_id, period);
            }
            if let Some(activity) = record.activity_date {
                let period = Period::from_date(activity);
                activity_by_user
                    .entry(record.user_id.clone())
                    .or_default()
                    .insert(period);
                active_by_period
                    .entry(period)
                    .or_default()
                    .insert(record.user_id.clone());
                Self::observe(&mut first_seen, &record.user_id, period);
            }
        }

        Dataset {
            records,
            users_by_signup_week,
            activity_by_user,
            active_by_period,
            first_seen,
        }
    }

    fn observe(first_seen: &mut HashMap<String, Period>, user_id: &str, period: Period) {
        first_seen
            .entry(user_id.to_string())
            .and_modify(|p| {
                if period < *p {
                    *p = period;
                }
            })
            .or_insert(period);
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    /// The normalized records, in file order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// `true` when no records survived normalization.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of distinct users observed anywhere in the file.
    pub fn total_users(&self) -> usize {
        self.first_seen.len()
    }

    /// First and last observed period across signups and activity, or
    /// `None` for an empty dataset.
    pub fn period_range(&self) -> Option<(Period, Period)> {
        let signup_keys = self.users_by_signup_week.keys();
        let activity_keys = self.active_by_period.keys();
        let mut all = signup_keys.chain(activity_keys);

        let first = *all.next()?;
        let (min, max) = all.fold((first, first), |(lo, hi), &p| (lo.min(p), hi.max(p)));
        Some((min, max))
    }

    /// Distinct users who signed up in `period`.
    pub fn signups_in(&self, period: Period) -> usize {
        self.users_by_signup_week
            .get(&period)
            .map(|s| s.len())
            .unwrap_or(0)
    }

    /// The set of user ids who signed up in `period`, when any did.
    pub fn signup_cohort(&self, period: Period) -> Option<&HashSet<String>> {
        self.users_by_signup_week.get(&period)
    }

    /// All signup cohorts, keyed by signup week ascending.
    pub fn signup_cohorts(&self) -> &BTreeMap<Period, HashSet<String>> {
        &self.users_by_signup_week
    }

    /// The set of user ids active in `period`, when any were.
    pub fn active_set(&self, period: Period) -> Option<&HashSet<String>> {
        self.active_by_period.get(&period)
    }

    /// Count of distinct users active in `period`.
    pub fn active_in(&self, period: Period) -> usize {
        self.active_set(period).map(|s| s.len()).unwrap_or(0)
    }

    /// Whether `user_id` had any activity in `period`.
    pub fn was_active(&self, user_id: &str, period: Period) -> bool {
        self.activity_by_user
            .get(user_id)
            .map(|periods| periods.contains(&period))
            .unwrap_or(false)
    }

    /// Distinct users first observed in or before `period`.
    pub fn cumulative_users_through(&self, period: Period) -> usize {
        self.first_seen.values().filter(|&&p| p <= period).count()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
