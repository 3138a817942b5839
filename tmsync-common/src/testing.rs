//! Test helpers shared by unit and integration tests.

use tracing_subscriber::{EnvFilter, fmt};

/// Route tracing output through the test harness writer.
///
/// Safe to call from every test; only the first call installs a subscriber.
/// `TMSYNC_TEST_LOG` overrides the default `tmsync_common=debug` filter.
pub fn init_test_logging() {
    let filter = std::env::var("TMSYNC_TEST_LOG")
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("tmsync_common=debug"));

    let _ = fmt()
        .with_test_writer()
        .with_env_filter(filter)
        .try_init();
}

/// A small suite in the layout the rewriter expects: a settings section,
/// three tests (one already marked, one with tags) and a keyword.
pub const SAMPLE_SUITE: &str = "\
*** Settings ***
Documentation     Login flows
Library           Collections

*** Test Cases ***
Valid Login
    [Tags]    smoke    @regression
    Open Browser    ${URL}
    Input Text    user    demo

Invalid Password @Tc51dd44d
    Open Browser    ${URL}
    Input Text    user    wrong

Locked Account
    [Documentation]    Account locked after retries
    Log    locked

*** Keywords ***
Open Browser
    [Arguments]    ${url}
    Log    ${url}
";
