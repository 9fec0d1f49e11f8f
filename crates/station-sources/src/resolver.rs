//! Which stations a fetch cycle covers.
//!
//! Precedence, evaluated once per cycle:
//! 1. an explicit station-ID list wins outright,
//! 2. otherwise a group filter (country, territory, class, facility type),
//! 3. otherwise every active station.

use std::collections::HashSet;

use tracing::{info, warn};

use crate::client::StationRef;

/// How the final station set was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Configured,
    Group,
    Active,
}

/// Outcome of a resolution pass.
#[derive(Debug, Clone)]
pub struct Resolution<S> {
    pub stations: Vec<S>,
    pub selection: Selection,
    /// Configured IDs that were not present in the candidate list.
    pub missing: Vec<String>,
}

type Predicate<'a, S> = Box<dyn Fn(&S) -> bool + Send + Sync + 'a>;

/// Applies the selection precedence to a fetched candidate list.
pub struct StationResolver<'a, S> {
    station_ids: &'a [String],
    group: Option<Predicate<'a, S>>,
    active: Option<Predicate<'a, S>>,
    active_applies_to_group: bool,
}

impl<'a, S: StationRef> StationResolver<'a, S> {
    pub fn new(station_ids: &'a [String]) -> Self {
        Self {
            station_ids,
            group: None,
            active: None,
            active_applies_to_group: true,
        }
    }

    /// Group filter, used only when no explicit IDs are configured.
    pub fn with_group(mut self, filter: impl Fn(&S) -> bool + Send + Sync + 'a) -> Self {
        self.group = Some(Box::new(filter));
        self
    }

    /// Activity predicate, used for the fallback and (by default) under a group filter.
    pub fn with_active(mut self, is_active: impl Fn(&S) -> bool + Send + Sync + 'a) -> Self {
        self.active = Some(Box::new(is_active));
        self
    }

    /// Keep inactive stations that match a group filter.
    pub fn group_ignores_activity(mut self) -> Self {
        self.active_applies_to_group = false;
        self
    }

    pub fn resolve(&self, candidates: Vec<S>) -> Resolution<S> {
        if !self.station_ids.is_empty() {
            let wanted: HashSet<String> = self
                .station_ids
                .iter()
                .map(|id| id.trim().to_ascii_lowercase())
                .collect();
            let stations: Vec<S> = candidates
                .into_iter()
                .filter(|s| wanted.contains(&s.station_id().to_ascii_lowercase()))
                .collect();

            let found: HashSet<String> = stations
                .iter()
                .map(|s| s.station_id().to_ascii_lowercase())
                .collect();
            let missing: Vec<String> = self
                .station_ids
                .iter()
                .filter(|id| !found.contains(&id.trim().to_ascii_lowercase()))
                .cloned()
                .collect();
            if !missing.is_empty() {
                warn!(missing = ?missing, "Configured stations not found upstream");
            }
            info!(
                requested = self.station_ids.len(),
                resolved = stations.len(),
                "Using configured stations"
            );

            return Resolution {
                stations,
                selection: Selection::Configured,
                missing,
            };
        }

        if let Some(group) = &self.group {
            let stations: Vec<S> = candidates
                .into_iter()
                .filter(|s| group(s))
                .filter(|s| !self.active_applies_to_group || self.is_active(s))
                .collect();
            info!(resolved = stations.len(), "Using group-filtered stations");
            return Resolution {
                stations,
                selection: Selection::Group,
                missing: Vec::new(),
            };
        }

        let stations: Vec<S> = candidates.into_iter().filter(|s| self.is_active(s)).collect();
        info!(resolved = stations.len(), "Using all active stations");
        Resolution {
            stations,
            selection: Selection::Active,
            missing: Vec::new(),
        }
    }

    fn is_active(&self, station: &S) -> bool {
        self.active.as_ref().map_or(true, |active| active(station))
    }
}

/// Registry-lag tolerance for "is this station still reporting".
///
/// A station counts as active when it has no end date, or its end year is
/// within `grace_years` of the current year. Unparseable end dates count
/// as active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivePolicy {
    pub grace_years: i32,
}

impl Default for ActivePolicy {
    fn default() -> Self {
        Self { grace_years: 2 }
    }
}

impl ActivePolicy {
    pub fn new(grace_years: i32) -> Self {
        Self { grace_years }
    }

    /// `end_date` is `YYYYMMDD` (only the year is read).
    pub fn is_active(&self, end_date: Option<&str>, current_year: i32) -> bool {
        let Some(end) = end_date.map(str::trim).filter(|s| !s.is_empty()) else {
            return true;
        };
        match end.get(..4).and_then(|year| year.parse::<i32>().ok()) {
            Some(end_year) => end_year >= current_year - self.grace_years,
            None => true,
        }
    }
}

/// Case-insensitive membership for group filters.
pub fn matches_any(value: Option<&str>, wanted: &[String]) -> bool {
    match value {
        Some(value) => wanted.iter().any(|w| w.trim().eq_ignore_ascii_case(value.trim())),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Stub {
        id: String,
        country: &'static str,
        active: bool,
    }

    impl StationRef for Stub {
        fn station_id(&self) -> &str {
            &self.id
        }
    }

    fn stub(id: &str, country: &'static str, active: bool) -> Stub {
        Stub {
            id: id.to_string(),
            country,
            active,
        }
    }

    fn candidates() -> Vec<Stub> {
        vec![
            stub("A1", "US", true),
            stub("B2", "CA", true),
            stub("C3", "US", false),
            stub("D4", "GB", true),
        ]
    }

    #[test]
    fn test_explicit_ids_win() {
        let ids = vec!["c3".to_string(), "zz9".to_string()];
        let resolver = StationResolver::new(&ids)
            .with_group(|s: &Stub| s.country == "CA")
            .with_active(|s: &Stub| s.active);

        let resolution = resolver.resolve(candidates());

        assert_eq!(resolution.selection, Selection::Configured);
        assert_eq!(resolution.stations, vec![stub("C3", "US", false)]);
        assert_eq!(resolution.missing, vec!["zz9".to_string()]);
    }

    #[test]
    fn test_group_filter_applies_activity() {
        let ids: Vec<String> = Vec::new();
        let resolver = StationResolver::new(&ids)
            .with_group(|s: &Stub| s.country == "US")
            .with_active(|s: &Stub| s.active);

        let resolution = resolver.resolve(candidates());

        assert_eq!(resolution.selection, Selection::Group);
        assert_eq!(resolution.stations, vec![stub("A1", "US", true)]);
    }

    #[test]
    fn test_group_can_ignore_activity() {
        let ids: Vec<String> = Vec::new();
        let resolver = StationResolver::new(&ids)
            .with_group(|s: &Stub| s.country == "US")
            .with_active(|s: &Stub| s.active)
            .group_ignores_activity();

        assert_eq!(resolver.resolve(candidates()).stations.len(), 2);
    }

    #[test]
    fn test_fallback_to_active() {
        let ids: Vec<String> = Vec::new();
        let resolver = StationResolver::new(&ids).with_active(|s: &Stub| s.active);

        let resolution = resolver.resolve(candidates());

        assert_eq!(resolution.selection, Selection::Active);
        assert_eq!(resolution.stations.len(), 3);
    }

    #[test]
    fn test_grace_period() {
        let policy = ActivePolicy::default();
        assert!(policy.is_active(Some("20241231"), 2026));
        assert!(!policy.is_active(Some("20241231"), 2027));
        assert!(policy.is_active(None, 2027));
        assert!(policy.is_active(Some(""), 2027));
        assert!(policy.is_active(Some("garbage"), 2027));
    }

    #[test]
    fn test_grace_period_configurable() {
        let strict = ActivePolicy::new(0);
        assert!(!strict.is_active(Some("20241231"), 2025));
        assert!(strict.is_active(Some("20250101"), 2025));
    }

    #[test]
    fn test_matches_any_case_insensitive() {
        let wanted = vec!["United Kingdom".to_string()];
        assert!(matches_any(Some("united kingdom"), &wanted));
        assert!(!matches_any(Some("France"), &wanted));
        assert!(!matches_any(None, &wanted));
    }
}
