//! Discovery stage: find the account's calls and resolve its document.
//!
//! Calls are searched in fixed-size windows walking back from `now`, so no
//! single search is unbounded. Each window is passed through the semantic
//! filter before its matches count. The store location is resolved only
//! after at least one call matched, so unknown accounts leave no folders
//! behind.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use callbrief_config::Config;
use callbrief_gateway_api::{
    Classification, GatewayError, SearchGateway, StorageLocation, StoreGateway, SynthesisGateway,
    TimeWindow, WorkItem,
};

use crate::error::DiscoveryError;
use crate::retry::{RetryPolicy, with_timeout};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryLimits {
    pub max_items: usize,
    pub window: chrono::Duration,
    pub max_windows: u32,
    /// Stop after this many windows in a row without a match
    pub max_consecutive_empty: u32,
    pub time_budget: Duration,
    pub call_timeout: Duration,
    /// Restrict the search to calls hosted by these users; empty means all
    pub team_filter: Vec<String>,
}

impl DiscoveryLimits {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_items: config.max_items(),
            window: chrono::Duration::days(i64::from(config.window_days())),
            max_windows: config.max_windows(),
            max_consecutive_empty: config.max_consecutive_empty(),
            time_budget: config.time_budget(),
            call_timeout: config.call_timeout(),
            team_filter: config.team_user_ids().to_vec(),
        }
    }
}

/// Result of a successful discovery.
#[derive(Debug, Clone)]
pub struct Discovered {
    pub location: StorageLocation,
    /// Newest first, at most `max_items`
    pub items: Vec<WorkItem>,
    /// Unique matches found before truncation
    pub total_matches: usize,
}

pub struct Discovery {
    search: Arc<dyn SearchGateway>,
    synthesis: Arc<dyn SynthesisGateway>,
    store: Arc<dyn StoreGateway>,
    retry: RetryPolicy,
    limits: DiscoveryLimits,
}

impl Discovery {
    pub fn new(
        search: Arc<dyn SearchGateway>,
        synthesis: Arc<dyn SynthesisGateway>,
        store: Arc<dyn StoreGateway>,
        retry: RetryPolicy,
        limits: DiscoveryLimits,
    ) -> Self {
        Self {
            search,
            synthesis,
            store,
            retry,
            limits,
        }
    }

    /// # Errors
    ///
    /// `NoSuchAccount` when no call matches, `AmbiguousAccount` when several
    /// existing folders fit the name, `Gateway` when a collaborator keeps
    /// failing after retries.
    pub async fn discover(
        &self,
        account: &str,
        now: DateTime<Utc>,
    ) -> Result<Discovered, DiscoveryError> {
        let gateway_err = |source: GatewayError| DiscoveryError::Gateway {
            account: account.to_string(),
            source,
        };

        let (mut items, windows) = self.collect_items(account, now).await.map_err(gateway_err)?;
        if items.is_empty() {
            info!(account, windows, "No matching calls");
            return Err(DiscoveryError::NoSuchAccount {
                account: account.to_string(),
            });
        }

        items.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id)));
        let total_matches = items.len();
        if total_matches > self.limits.max_items {
            warn!(
                account,
                total_matches,
                max_items = self.limits.max_items,
                "Only the most recent calls will be processed"
            );
            items.truncate(self.limits.max_items);
        }

        let location = self.resolve_location(account).await?;
        info!(
            account,
            folder = %location.account,
            items = items.len(),
            total_matches,
            windows,
            "Discovery complete"
        );

        Ok(Discovered {
            location,
            items,
            total_matches,
        })
    }

    /// Walk windows back from `now` until enough calls matched, the account
    /// went quiet, or the time budget ran out. Returns the unique matches and
    /// the number of windows searched.
    async fn collect_items(
        &self,
        account: &str,
        now: DateTime<Utc>,
    ) -> Result<(Vec<WorkItem>, u32), GatewayError> {
        let started = Instant::now();
        let team = (!self.limits.team_filter.is_empty()).then_some(self.limits.team_filter.as_slice());
        let timeout = self.limits.call_timeout;

        let mut seen = HashSet::new();
        let mut matches = Vec::new();
        let mut consecutive_empty = 0;
        let mut searched = 0;

        for index in 0..self.limits.max_windows {
            let window = window_at(now, self.limits.window, index);
            searched += 1;

            let listed = self
                .retry
                .run("list_items", || {
                    with_timeout("list_items", timeout, self.search.list_items(account, window, team))
                })
                .await?;

            let fresh: Vec<WorkItem> = listed
                .into_iter()
                .filter(|item| !seen.contains(&item.id))
                .collect();

            let kept = if fresh.is_empty() {
                Vec::new()
            } else {
                let keep = self
                    .retry
                    .run("filter_items", || {
                        with_timeout(
                            "filter_items",
                            timeout,
                            self.synthesis.filter_items(&fresh, account),
                        )
                    })
                    .await?;
                pick(fresh, &keep)
            };

            let window_matches = kept.len();
            for item in kept {
                if seen.insert(item.id.clone()) {
                    matches.push(item);
                }
            }

            debug!(
                account,
                window = index + 1,
                start = %window.start.date_naive(),
                end = %window.end.date_naive(),
                window_matches,
                total = matches.len(),
                "Searched window"
            );

            if window_matches == 0 {
                consecutive_empty += 1;
                if consecutive_empty >= self.limits.max_consecutive_empty {
                    debug!(account, consecutive_empty, "No activity, stopping search");
                    break;
                }
            } else {
                consecutive_empty = 0;
            }

            if matches.len() >= self.limits.max_items {
                break;
            }
            if started.elapsed() >= self.limits.time_budget {
                warn!(
                    account,
                    budget_secs = self.limits.time_budget.as_secs(),
                    "Discovery time budget exhausted"
                );
                break;
            }
        }

        Ok((matches, searched))
    }

    /// Map the account name onto one existing folder, or create one.
    async fn resolve_location(&self, account: &str) -> Result<StorageLocation, DiscoveryError> {
        let timeout = self.limits.call_timeout;
        let gateway_err = |source: GatewayError| DiscoveryError::Gateway {
            account: account.to_string(),
            source,
        };

        let candidates = self
            .retry
            .run("candidates", || {
                with_timeout("candidates", timeout, self.store.candidates(account))
            })
            .await
            .map_err(gateway_err)?;

        let classification = self
            .retry
            .run("classify", || {
                with_timeout("classify", timeout, self.synthesis.classify(&candidates, account))
            })
            .await
            .map_err(gateway_err)?;

        let name = match classification {
            Classification::Chosen(index) => match candidates.get(index) {
                Some(name) => name.clone(),
                None => {
                    return Err(gateway_err(GatewayError::InvalidResponse(format!(
                        "classifier chose candidate {index} of {}",
                        candidates.len()
                    ))));
                }
            },
            Classification::Ambiguous(indices) => {
                let named: Vec<String> = indices
                    .iter()
                    .filter_map(|&i| candidates.get(i).cloned())
                    .collect();
                return Err(DiscoveryError::AmbiguousAccount {
                    account: account.to_string(),
                    candidates: if named.is_empty() { candidates } else { named },
                });
            }
            Classification::NoMatch => account.to_string(),
        };

        self.retry
            .run("resolve_or_create", || {
                with_timeout("resolve_or_create", timeout, self.store.resolve_or_create(&name))
            })
            .await
            .map_err(gateway_err)
    }
}

/// Window `index` counting back from `now`: index 0 ends at `now`.
fn window_at(now: DateTime<Utc>, width: chrono::Duration, index: u32) -> TimeWindow {
    let end = now - width * i32::try_from(index).unwrap_or(i32::MAX);
    TimeWindow {
        start: end - width,
        end,
    }
}

/// Keep the items at `indices`, in their original order.
fn pick(items: Vec<WorkItem>, indices: &[usize]) -> Vec<WorkItem> {
    let wanted: HashSet<usize> = indices.iter().copied().collect();
    items
        .into_iter()
        .enumerate()
        .filter(|(i, _)| wanted.contains(i))
        .map(|(_, item)| item)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedSearch, ScriptedSynthesis, work_item};
    use callbrief_store::MemoryDocumentStore;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap()
    }

    fn limits() -> DiscoveryLimits {
        DiscoveryLimits {
            max_items: 30,
            window: chrono::Duration::days(30),
            max_windows: 24,
            max_consecutive_empty: 6,
            time_budget: Duration::from_secs(60),
            call_timeout: Duration::from_secs(5),
            team_filter: Vec::new(),
        }
    }

    fn discovery(
        search: Arc<ScriptedSearch>,
        synthesis: Arc<ScriptedSynthesis>,
        store: Arc<MemoryDocumentStore>,
        limits: DiscoveryLimits,
    ) -> Discovery {
        Discovery::new(search, synthesis, store, RetryPolicy::none(), limits)
    }

    #[test]
    fn test_windows_tile_backwards() {
        let width = chrono::Duration::days(30);
        let first = window_at(now(), width, 0);
        let second = window_at(now(), width, 1);
        assert_eq!(first.end, now());
        assert_eq!(second.end, first.start);
        assert_eq!(first.end - first.start, width);
    }

    #[tokio::test]
    async fn test_collects_across_windows_newest_first() {
        let search = Arc::new(ScriptedSearch::new(vec![
            work_item("a", now() - chrono::Duration::days(40), "Foo sync"),
            work_item("b", now() - chrono::Duration::days(2), "Foo demo"),
            work_item("c", now() - chrono::Duration::days(70), "Foo kickoff"),
        ]));
        let store = Arc::new(MemoryDocumentStore::new());
        let d = discovery(search.clone(), Arc::new(ScriptedSynthesis::new()), store.clone(), limits());

        let found = d.discover("Foo Inc", now()).await.unwrap();

        let ids: Vec<_> = found.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
        assert_eq!(found.total_matches, 3);
        assert_eq!(found.location.account, "Foo Inc");
        // Three windows with calls, then six empty ones
        assert_eq!(search.list_calls(), 9);
    }

    #[tokio::test]
    async fn test_duplicates_across_windows_are_dropped() {
        let item = work_item("a", now() - chrono::Duration::days(3), "Foo");
        let search = Arc::new(ScriptedSearch::new(vec![item]).repeat_in_every_window());
        let d = discovery(
            search,
            Arc::new(ScriptedSynthesis::new()),
            Arc::new(MemoryDocumentStore::new()),
            limits(),
        );

        let found = d.discover("Foo", now()).await.unwrap();
        assert_eq!(found.items.len(), 1);
    }

    #[tokio::test]
    async fn test_stops_at_max_items_and_truncates() {
        let items = (0..10)
            .map(|i| work_item(&format!("id{i}"), now() - chrono::Duration::hours(i + 1), "Foo"))
            .collect();
        let search = Arc::new(ScriptedSearch::new(items));
        let mut limits = limits();
        limits.max_items = 4;
        let d = discovery(
            search.clone(),
            Arc::new(ScriptedSynthesis::new()),
            Arc::new(MemoryDocumentStore::new()),
            limits,
        );

        let found = d.discover("Foo", now()).await.unwrap();

        assert_eq!(found.items.len(), 4);
        assert_eq!(found.total_matches, 10);
        assert_eq!(found.items[0].id, "id0");
        assert_eq!(search.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_spent_time_budget_stops_after_first_window() {
        let search = Arc::new(ScriptedSearch::new(vec![
            work_item("recent", now() - chrono::Duration::days(2), "Foo demo"),
            work_item("older", now() - chrono::Duration::days(40), "Foo sync"),
        ]));
        let mut limits = limits();
        limits.time_budget = Duration::ZERO;
        let d = discovery(
            search.clone(),
            Arc::new(ScriptedSynthesis::new()),
            Arc::new(MemoryDocumentStore::new()),
            limits,
        );

        let found = d.discover("Foo", now()).await.unwrap();

        let ids: Vec<_> = found.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["recent"]);
        assert_eq!(found.total_matches, 1);
        assert_eq!(search.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_no_matches_is_no_such_account_and_creates_nothing() {
        let search = Arc::new(ScriptedSearch::new(vec![]));
        let store = Arc::new(MemoryDocumentStore::new());
        let d = discovery(search.clone(), Arc::new(ScriptedSynthesis::new()), store.clone(), limits());

        let err = d.discover("Nobody", now()).await.unwrap_err();

        assert_eq!(
            err,
            DiscoveryError::NoSuchAccount {
                account: "Nobody".into()
            }
        );
        assert_eq!(search.list_calls(), 6);
        assert!(store.document("Nobody").is_none());
    }

    #[tokio::test]
    async fn test_filter_rejections_do_not_count() {
        let search = Arc::new(ScriptedSearch::new(vec![
            work_item("x", now() - chrono::Duration::days(1), "Other Co <> Us"),
            work_item("y", now() - chrono::Duration::days(1), "Foo <> Us"),
        ]));
        let synthesis = Arc::new(ScriptedSynthesis::new().keep_titles_containing("Foo"));
        let d = discovery(search, synthesis, Arc::new(MemoryDocumentStore::new()), limits());

        let found = d.discover("Foo", now()).await.unwrap();
        assert_eq!(found.items.len(), 1);
        assert_eq!(found.items[0].id, "y");
    }

    #[tokio::test]
    async fn test_ambiguous_folders_are_fatal() {
        let search = Arc::new(ScriptedSearch::new(vec![work_item(
            "a",
            now() - chrono::Duration::days(1),
            "Acme sync",
        )]));
        let store = Arc::new(
            MemoryDocumentStore::new()
                .with_document("Acme Corp (Accounts)", "")
                .with_document("AcmeIO Inc", ""),
        );
        let synthesis = Arc::new(ScriptedSynthesis::new().classify_as(Classification::Ambiguous(vec![0, 1])));
        let d = discovery(search, synthesis, store, limits());

        match d.discover("Acme", now()).await.unwrap_err() {
            DiscoveryError::AmbiguousAccount { candidates, .. } => {
                assert_eq!(candidates.len(), 2);
                assert!(candidates.contains(&"AcmeIO Inc".to_string()));
            }
            other => panic!("expected ambiguity, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_chosen_folder_is_reused() {
        let search = Arc::new(ScriptedSearch::new(vec![work_item(
            "a",
            now() - chrono::Duration::days(1),
            "Acme sync",
        )]));
        let store = Arc::new(
            MemoryDocumentStore::new()
                .with_document("Acme Corp (Accounts)", "")
                .with_document("AcmeIO Inc", ""),
        );
        let synthesis = Arc::new(ScriptedSynthesis::new().classify_as(Classification::Chosen(1)));
        let d = discovery(search, synthesis, store.clone(), limits());

        let found = d.discover("acme.io", now()).await.unwrap();
        assert_eq!(found.location.account, "AcmeIO Inc");
    }

    #[tokio::test]
    async fn test_search_failure_surfaces_as_gateway_error() {
        let search = Arc::new(ScriptedSearch::new(vec![]).fail_listing(GatewayError::Auth("401".into())));
        let d = discovery(
            search,
            Arc::new(ScriptedSynthesis::new()),
            Arc::new(MemoryDocumentStore::new()),
            limits(),
        );

        assert!(matches!(
            d.discover("Foo", now()).await,
            Err(DiscoveryError::Gateway {
                source: GatewayError::Auth(_),
                ..
            })
        ));
    }
}
