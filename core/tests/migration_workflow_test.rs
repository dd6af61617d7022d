//! Integration tests for the envsync migration workflow
//! Tests the complete flow: load -> reconcile -> select -> migrate -> backup

mod common;
use common::TestWorkspace;

use envsync_core::{
    Classification, DatasetStore, ErrorKind, MigrationRequest, MigrationSession, Selection,
    SelectionBuilder, ViewFilter,
};
use serde_json::json;
use std::sync::Arc;

fn session(workspace: &TestWorkspace) -> MigrationSession {
    MigrationSession::new(
        Arc::new(workspace.store()),
        workspace.config.excluded_columns(),
    )
}

#[tokio::test]
async fn test_compare_fixture_environments() {
    let workspace = TestWorkspace::new("local.toml");
    workspace.install_dataset("eni_dev.json", "remote_eni_dev");
    workspace.install_dataset("eni_prod.json", "remote_eni_prod");

    let comparison = session(&workspace)
        .compare("remote_eni_dev", "remote_eni_prod")
        .await
        .unwrap();
    let rec = &comparison.reconciliation;

    let names: Vec<_> = rec.tables().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["Features", "Labels", "Regions", "Deprecated"]);

    // rollout changed; lastUpdated is excluded
    let checkout = rec.row("Features", "checkout.v2").unwrap();
    assert_eq!(checkout.classification, Classification::Diff);
    assert_eq!(checkout.differing_columns, vec!["rollout"]);
    // only lastUpdated differs
    assert_eq!(
        rec.row("Features", "search.fuzzy").unwrap().classification,
        Classification::Same
    );
    assert_eq!(
        rec.row("Features", "legacy.flag").unwrap().classification,
        Classification::MissingInSource
    );
    // "" description on one side, absent on the other; text differs
    assert_eq!(
        rec.row("Labels", "cart.title").unwrap().differing_columns,
        vec!["text"]
    );

    let missing = rec.filtered(ViewFilter::Missing, None);
    assert_eq!(missing.counts().total(), 6);
}

#[tokio::test]
async fn test_migrate_with_builder_selection() {
    let workspace = TestWorkspace::new("local.toml");
    workspace.install_dataset("eni_dev.json", "remote_eni_dev");
    workspace.install_dataset("eni_prod.json", "remote_eni_prod");
    let session = session(&workspace);

    let comparison = session
        .compare("remote_eni_dev", "remote_eni_prod")
        .await
        .unwrap();
    let mut builder = SelectionBuilder::new(&comparison.reconciliation);
    builder.table("Regions").unwrap();
    builder.table("Deprecated").unwrap();
    builder.row("Features", "legacy.flag").unwrap();
    builder.row("Features", "banner.holiday").unwrap();
    builder.cells("Features", "checkout.v2", &["rollout"]).unwrap();
    let selection = builder.build();

    let request = MigrationRequest {
        source: "remote_eni_dev".into(),
        target: "remote_eni_prod".into(),
        selection,
    };
    let preview = session.preview(&request).await.unwrap();
    assert_eq!(preview.tables, 2);
    assert_eq!(preview.rows, 4);

    let report = session.migrate(&request).await.unwrap();
    assert_eq!(report.summary.tables_copied, 1);
    assert_eq!(report.summary.rows_copied, 3);
    assert_eq!(report.summary.tables_deleted, 1);
    assert_eq!(report.summary.rows_deleted, 1);

    let migrated = workspace.read_dataset("remote_eni_prod");
    assert!(!migrated.contains_table("Deprecated"));
    assert_eq!(migrated.rows("Regions").len(), 2);

    let features = migrated.rows("Features");
    let keys: Vec<_> = features.iter().map(|r| r.key().unwrap()).collect();
    assert_eq!(keys, vec!["checkout.v2", "search.fuzzy", "banner.holiday"]);
    let checkout = &features[0];
    assert_eq!(checkout.get("rollout").unwrap().to_string(), "50");
    // cell-level copy leaves other columns alone
    assert_eq!(checkout.get("lastUpdated").unwrap().to_string(), "2024-12-01");

    // the backup holds the pre-merge target
    let backup = report.backup.unwrap();
    let backed_up = std::fs::read(&backup.location).unwrap();
    let backed_up = envsync_core::Dataset::from_slice("backup", &backed_up).unwrap();
    assert!(backed_up.contains_table("Deprecated"));
    assert_eq!(Some(backed_up.digest().unwrap()), backup.digest);

    let listed = workspace.store().list_backups(Some("remote_eni_prod")).await.unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn test_migrate_from_request_body() {
    let workspace = TestWorkspace::new("local.toml");
    workspace.install_dataset("eni_dev.json", "remote_eni_dev");
    workspace.install_dataset("eni_prod.json", "remote_eni_prod");

    let body = json!({
        "source": "remote_eni_dev",
        "target": "remote_eni_prod",
        "selectedTables": ["Labels"],
        "selectedRows": [{"table": "Features"}],
        "selectedCells": []
    });
    let (request, warnings) = MigrationRequest::from_request(&body).unwrap();
    assert_eq!(warnings.len(), 1);

    let mut report = session(&workspace).migrate(&request).await.unwrap();
    report.warnings.extend(warnings);

    assert_eq!(report.summary.tables_copied, 1);
    assert_eq!(report.summary.rows_copied, 2);
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(
        workspace.read_dataset("remote_eni_prod").rows("Labels"),
        workspace.read_dataset("remote_eni_dev").rows("Labels")
    );
}

#[tokio::test]
async fn test_missing_source_leaves_target_untouched() {
    let workspace = TestWorkspace::new("local.toml");
    workspace.install_dataset("eni_prod.json", "remote_eni_prod");
    let before = workspace.read_dataset("remote_eni_prod");

    let err = session(&workspace)
        .migrate(&MigrationRequest {
            source: "remote_eni_dev".into(),
            target: "remote_eni_prod".into(),
            selection: Selection {
                selected_tables: vec!["Features".into()],
                ..Default::default()
            },
        })
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.dataset(), Some("remote_eni_dev"));
    assert_eq!(workspace.read_dataset("remote_eni_prod"), before);
    assert!(workspace.store().list_backups(None).await.unwrap().is_empty());
}
