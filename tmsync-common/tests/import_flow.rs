//! End-to-end import: discover → upload → fetch → reconcile → write back.

use std::path::Path;
use tmsync_common::config::{RegistryConfig, SyncConfig};
use tmsync_common::registry::mock::{FakeClock, MockTransport};
use tmsync_common::registry::{HttpMethod, ImportOptions, RegistryClient};
use tmsync_common::suite::find_suite_files;
use tmsync_common::sync::{ImportMode, ImportSession};
use tmsync_common::testing::{SAMPLE_SUITE, init_test_logging};

const CHECKOUT_SUITE: &str = "\
*** Test Cases ***
Pay By Card
    Log    card

Pay By Invoice
    Log    invoice
";

fn config() -> SyncConfig {
    let mut config = SyncConfig {
        registry: RegistryConfig {
            url: "https://registry.test".to_string(),
            api_key: Some("tstmt_secret".to_string()),
            probe_connectivity: false,
            ..RegistryConfig::default()
        },
        ..SyncConfig::default()
    };
    config.import.labels = vec!["robot".to_string()];
    config
}

fn session(
    config: &SyncConfig,
    transport: &MockTransport,
    options: ImportOptions,
) -> ImportSession<MockTransport, FakeClock> {
    let client = RegistryClient::new(&config.registry, transport.clone(), FakeClock::new())
        .expect("client");
    ImportSession::with_client(config, ImportMode::Upload(options), Some(client))
}

fn write(dir: &Path, name: &str, contents: &str) {
    std::fs::write(dir.join(name), contents).expect("write suite");
}

#[test]
fn test_import_assigns_learned_ids() {
    init_test_logging();
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "login.robot", SAMPLE_SUITE);
    write(dir.path(), "02__checkout.robot", CHECKOUT_SUITE);
    write(dir.path(), "notes.txt", "not a suite");

    let transport = MockTransport::new();
    transport.respond(HttpMethod::Post, "/api/load", 200, "{}");
    transport.respond(
        HttpMethod::Get,
        "/api/test_data",
        200,
        r#"{
            "tests": {
                "Login#Valid Login": "@Tv1",
                "Login#Invalid Password": "@Tc51dd44d",
                "Checkout#Pay By Card": "@Tcard1",
                "checkout.robot#Checkout#Pay By Card": "@Tcard1",
                "checkout.robot#Checkout#Pay By Invoice": "@Tinv1",
                "Locked Account": "@Tlock"
            },
            "suites": {"Login": "@S1", "Checkout": "@S2"}
        }"#,
    );

    let config = config();
    let mut session = session(&config, &transport, ImportOptions::default());
    for file in find_suite_files(&[dir.path().to_path_buf()]).unwrap() {
        session.visit_file(&file).unwrap();
    }
    assert_eq!(session.tests().len(), 5);

    let summary = session.close().unwrap();

    assert!(summary.uploaded);
    let report = summary.reconciled.expect("reconciled");
    // Valid Login, Invalid Password (already marked), Pay By Card.
    assert_eq!(report.matched, 3);
    assert_eq!(report.assigned, 2);
    assert_eq!(report.already_marked, 1);

    let login = std::fs::read_to_string(dir.path().join("login.robot")).unwrap();
    assert!(login.contains("\nValid Login @Tv1\n"));
    assert!(login.contains("\nInvalid Password @Tc51dd44d\n"));
    // Title-only key has no suite and never matches.
    assert!(login.contains("\nLocked Account\n"));

    let checkout = std::fs::read_to_string(dir.path().join("02__checkout.robot")).unwrap();
    assert!(checkout.contains("Pay By Card @Tcard1"));
    // Only seen through a three-part key: suite unknown, left unassigned.
    assert!(checkout.contains("\nPay By Invoice\n"));
}

#[test]
fn test_upload_body_carries_code_suites_and_labels() {
    init_test_logging();
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "02__checkout.robot", CHECKOUT_SUITE);

    let transport = MockTransport::new();
    transport.respond(HttpMethod::Post, "/api/load", 200, "{}");
    transport.respond(HttpMethod::Get, "/api/test_data", 200, r#"{"tests": {}}"#);

    let config = config();
    let options = ImportOptions {
        create: true,
        no_detach: true,
        ..ImportOptions::default()
    };
    let mut session = session(&config, &transport, options);
    session
        .visit_file(&dir.path().join("02__checkout.robot"))
        .unwrap();
    session.close().unwrap();

    let body = transport.requests_to("/api/load")[0].json_body().unwrap();
    assert_eq!(body["framework"], "robot");
    assert_eq!(body["create"], true);
    assert_eq!(body["no-detach"], true);
    assert_eq!(body["sync"], true);
    let tests = body["tests"].as_array().unwrap();
    assert_eq!(tests.len(), 2);
    assert_eq!(tests[0]["name"], "Pay By Card");
    assert_eq!(tests[0]["suites"], serde_json::json!(["Checkout"]));
    assert_eq!(tests[0]["file"], "02__checkout.robot");
    assert_eq!(tests[0]["labels"], "robot");
    assert_eq!(tests[0]["code"], "Pay By Card\n    Log    card\n");
}

#[test]
fn test_failed_fetch_leaves_files_untouched() {
    init_test_logging();
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "02__checkout.robot", CHECKOUT_SUITE);

    let transport = MockTransport::new();
    transport.respond(HttpMethod::Post, "/api/load", 200, "{}");
    transport.respond(HttpMethod::Get, "/api/test_data", 404, "");

    let config = config();
    let mut session = session(&config, &transport, ImportOptions::default());
    session
        .visit_file(&dir.path().join("02__checkout.robot"))
        .unwrap();
    let summary = session.close().unwrap();

    assert!(summary.uploaded);
    assert!(summary.reconciled.is_none());
    assert_eq!(
        std::fs::read_to_string(dir.path().join("02__checkout.robot")).unwrap(),
        CHECKOUT_SUITE
    );
}

#[test]
fn test_remove_ids_then_reimport_restores_names() {
    init_test_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("login.robot");
    std::fs::write(&path, SAMPLE_SUITE).unwrap();

    let config = config();
    let mut stripper: ImportSession<MockTransport, FakeClock> =
        ImportSession::with_client(&config, ImportMode::RemoveIds, None);
    assert_eq!(stripper.visit_file(&path).unwrap(), 1);
    assert!(stripper.close().unwrap().reconciled.is_none());
    assert!(
        std::fs::read_to_string(&path)
            .unwrap()
            .contains("\nInvalid Password\n")
    );

    let transport = MockTransport::new();
    transport.respond(HttpMethod::Post, "/api/load", 200, "{}");
    transport.respond(
        HttpMethod::Get,
        "/api/test_data",
        200,
        r#"{"tests": {"Login#Invalid Password": "@Tc51dd44d"}, "suites": {"Login": "@S1"}}"#,
    );
    let mut session = session(&config, &transport, ImportOptions::default());
    session.visit_file(&path).unwrap();
    session.close().unwrap();

    assert_eq!(std::fs::read_to_string(&path).unwrap(), SAMPLE_SUITE);
}
