//! Registry request and response bodies.

use crate::types::{LocalTest, TestResult};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

pub const FRAMEWORK: &str = "robot";
pub const LANGUAGE: &str = "python";

/// Flags controlling how the registry ingests an inventory upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportOptions {
    /// Do not create empty suites.
    pub no_empty: bool,
    /// Do not mark tests missing from this upload as detached.
    pub no_detach: bool,
    /// Mirror the local directory structure; files are sent as full paths.
    pub structure: bool,
    /// Create tests that do not exist yet.
    pub create: bool,
    /// Prefix for relative file names when `structure` is off.
    pub directory: Option<String>,
    /// Sent with every test as one comma-joined string.
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadRequest {
    pub framework: &'static str,
    pub language: &'static str,
    pub noempty: bool,
    #[serde(rename = "no-detach")]
    pub no_detach: bool,
    pub structure: bool,
    pub create: bool,
    pub sync: bool,
    pub tests: Vec<LoadTest>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadTest {
    pub name: String,
    pub suites: Vec<String>,
    pub code: Option<String>,
    pub file: String,
    pub labels: String,
}

impl LoadRequest {
    pub fn new(tests: &[LocalTest], options: &ImportOptions) -> Self {
        let labels = options.labels.join(",");
        Self {
            framework: FRAMEWORK,
            language: LANGUAGE,
            noempty: options.no_empty,
            no_detach: options.no_detach,
            // The registry cannot honor both; empty-suite pruning wins.
            structure: options.structure && !options.no_empty,
            create: options.create,
            sync: true,
            tests: tests
                .iter()
                .map(|test| LoadTest {
                    name: test.raw_title.clone(),
                    suites: vec![test.suite_title.clone()],
                    code: test.source_text.clone(),
                    file: upload_file_name(test, options),
                    labels: labels.clone(),
                })
                .collect(),
        }
    }
}

fn upload_file_name(test: &LocalTest, options: &ImportOptions) -> String {
    if options.structure {
        return test.file_path.display().to_string();
    }
    match &options.directory {
        Some(dir) => normalize_path(&Path::new(dir).join(&test.file_name)),
        None => test.file_name.clone(),
    }
}

/// Lexically resolve `.` and `..` components without touching the disk.
fn normalize_path(path: &Path) -> String {
    use std::path::Component;

    let mut parts: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }
    parts
        .iter()
        .collect::<std::path::PathBuf>()
        .display()
        .to_string()
}

/// Registry inventory: composite key → remote id, plus known suite names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RemoteInventory {
    /// Entries in document order.
    #[serde(default, deserialize_with = "ordered_pairs")]
    pub tests: Vec<(String, String)>,
    #[serde(default)]
    pub suites: HashMap<String, serde_json::Value>,
}

impl RemoteInventory {
    pub fn suite_names(&self) -> impl Iterator<Item = &str> {
        self.suites.keys().map(String::as_str)
    }
}

/// Deserialize a JSON object of string values preserving key order.
fn ordered_pairs<'de, D>(deserializer: D) -> Result<Vec<(String, String)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct PairsVisitor;

    impl<'de> Visitor<'de> for PairsVisitor {
        type Value = Vec<(String, String)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of test keys to ids")
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut pairs = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((key, value)) = map.next_entry::<String, String>()? {
                pairs.push((key, value));
            }
            Ok(pairs)
        }
    }

    deserializer.deserialize_map(PairsVisitor)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateRunRequest {
    pub api_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_event: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_title: Option<String>,
}

/// A run created on the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunHandle {
    pub uid: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub public_url: Option<String>,
}

impl RunHandle {
    /// Handle for a run created elsewhere (e.g. by a previous process).
    pub fn existing(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            url: None,
            public_url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchRequest<'a> {
    pub tests: &'a [TestResult],
    pub batch_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinishRunRequest {
    pub status_event: &'static str,
}

impl FinishRunRequest {
    pub fn finish() -> Self {
        Self {
            status_event: "finish",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sample_test() -> LocalTest {
        LocalTest::new("Login @Tabc", "Auth", "/repo/suites/auth.robot")
            .with_source_text("Login @Tabc\n    Log    in\n")
    }

    #[test]
    fn load_request_uses_wire_field_names() {
        let options = ImportOptions {
            no_detach: true,
            create: true,
            labels: vec!["smoke".into(), "ci".into()],
            ..ImportOptions::default()
        };
        let request = LoadRequest::new(&[sample_test()], &options);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["framework"], FRAMEWORK);
        assert_eq!(json["no-detach"], true);
        assert_eq!(json["noempty"], false);
        assert_eq!(json["create"], true);
        assert_eq!(json["sync"], true);
        assert_eq!(json["tests"][0]["name"], "Login @Tabc");
        assert_eq!(json["tests"][0]["suites"], serde_json::json!(["Auth"]));
        assert_eq!(json["tests"][0]["file"], "auth.robot");
        assert_eq!(json["tests"][0]["labels"], "smoke,ci");
        assert_eq!(json["tests"][0]["code"], "Login @Tabc\n    Log    in\n");
    }

    #[test]
    fn no_empty_disables_structure() {
        let options = ImportOptions {
            no_empty: true,
            structure: true,
            ..ImportOptions::default()
        };
        let request = LoadRequest::new(&[sample_test()], &options);
        assert!(!request.structure);
        // File naming still follows the requested structure mode.
        assert_eq!(request.tests[0].file, "/repo/suites/auth.robot");
    }

    #[test]
    fn directory_prefix_applies_without_structure() {
        let options = ImportOptions {
            directory: Some("imports/./robot/../ui".to_string()),
            ..ImportOptions::default()
        };
        let request = LoadRequest::new(&[sample_test()], &options);
        assert_eq!(
            PathBuf::from(&request.tests[0].file),
            PathBuf::from("imports/ui/auth.robot")
        );
    }

    #[test]
    fn inventory_preserves_key_order() {
        let inventory: RemoteInventory = serde_json::from_str(
            r#"{"tests": {"z#Last": "@T1", "a#First": "@T2"}, "suites": {"z": "@S1"}}"#,
        )
        .unwrap();
        assert_eq!(inventory.tests[0].0, "z#Last");
        assert_eq!(inventory.tests[1].0, "a#First");
        assert_eq!(inventory.suite_names().collect::<Vec<_>>(), vec!["z"]);
    }

    #[test]
    fn create_run_request_omits_nulls() {
        let request = CreateRunRequest {
            api_key: "key".to_string(),
            access_event: None,
            title: Some("Nightly".to_string()),
            group_title: None,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({"api_key": "key", "title": "Nightly"})
        );
    }
}
