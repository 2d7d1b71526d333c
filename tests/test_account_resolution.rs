//! Account name resolution against existing folders.

use std::sync::Arc;

use chrono::{TimeZone, Utc};

use callbrief_engine::test_support::{ScriptedSearch, ScriptedSynthesis, work_item};
use callbrief::{CallbriefError, CancellationToken, Config, ExitCode, Orchestrator, RunError, RunSettings};
use callbrief_engine::DiscoveryError;
use callbrief_gateway_api::{Classification, StoreGateway};
use callbrief_store::MemoryDocumentStore;

fn acme_store() -> Arc<MemoryDocumentStore> {
    Arc::new(
        MemoryDocumentStore::new()
            .with_document("Acme Corp (Accounts)", "")
            .with_document("AcmeIO Inc", ""),
    )
}

fn acme_search() -> Arc<ScriptedSearch> {
    let at = Utc.with_ymd_and_hms(2026, 9, 10, 14, 0, 0).unwrap();
    Arc::new(ScriptedSearch::new(vec![work_item("acme-1", at, "Acme weekly")]))
}

fn orchestrator(synthesis: ScriptedSynthesis, store: Arc<MemoryDocumentStore>) -> Orchestrator {
    Orchestrator::new(
        acme_search(),
        Arc::new(synthesis),
        store,
        RunSettings::from_config(&Config::default()),
    )
}

fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 9, 15, 0, 0, 0).unwrap()
}

#[tokio::test]
async fn test_ambiguous_name_is_fatal_and_lists_candidates() {
    let store = acme_store();
    let synthesis = ScriptedSynthesis::new().classify_as(Classification::Ambiguous(vec![0, 1]));

    let err = orchestrator(synthesis, store.clone())
        .run_at("Acme", now(), CancellationToken::new())
        .await
        .unwrap_err();

    let RunError::Discovery(DiscoveryError::AmbiguousAccount { candidates, .. }) = &err else {
        panic!("expected ambiguity, got {err:?}");
    };
    assert_eq!(candidates.len(), 2);

    // Nothing was written to either folder
    assert_eq!(store.write_count(), 0);

    let cli_err = CallbriefError::from(err);
    assert_eq!(cli_err.to_exit_code(), ExitCode::AMBIGUOUS_ACCOUNT);
    let shown = cli_err.display_for_user();
    assert!(shown.contains("Acme Corp (Accounts)"));
    assert!(shown.contains("AcmeIO Inc"));
}

#[tokio::test]
async fn test_specific_name_selects_one_folder() {
    let store = acme_store();
    let synthesis = ScriptedSynthesis::new().classify_as(Classification::Chosen(1));

    let report = orchestrator(synthesis, store.clone())
        .run_at("acme.io", now(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.location.account, "AcmeIO Inc");
    assert!(store.document("AcmeIO Inc").unwrap().contains("acme-1"));
    assert_eq!(store.document("Acme Corp (Accounts)").unwrap(), "");
}

#[tokio::test]
async fn test_unmatched_name_creates_a_new_folder() {
    let store = acme_store();

    let report = orchestrator(ScriptedSynthesis::new(), store.clone())
        .run_at("Acorn Labs", now(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.location.account, "Acorn Labs");
    let candidates = store.candidates("A").await.unwrap();
    assert_eq!(candidates.len(), 3);
}
