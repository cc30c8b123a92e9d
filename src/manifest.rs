//! Manifest (package.json style) editing over the staged tree: dependency and
//! script upserts. Output is rewritten with two-space pretty printing, the
//! convention the scaffolded projects already use.

use crate::tree::{StagedTree, TreeError};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error("malformed manifest at {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("manifest at {path} is not a JSON object")]
    NotAnObject { path: String },

    #[error("missing entry `{key}` in {path}")]
    MissingKey { path: String, key: String },
}

/// Upsert `name: version_range` into the manifest's `dependencies` record.
pub fn add_dependency(
    tree: &mut dyn StagedTree,
    manifest_path: &str,
    name: &str,
    version_range: &str,
) -> Result<(), ManifestError> {
    upsert(tree, manifest_path, "dependencies", name, version_range)
}

/// Upsert `name: command` into the manifest's `scripts` record.
pub fn set_script(
    tree: &mut dyn StagedTree,
    manifest_path: &str,
    name: &str,
    command: &str,
) -> Result<(), ManifestError> {
    upsert(tree, manifest_path, "scripts", name, command)
}

/// Read `section.key` from the manifest, if present.
pub fn get_entry(
    tree: &dyn StagedTree,
    manifest_path: &str,
    section: &str,
    key: &str,
) -> Result<Option<String>, ManifestError> {
    let root = parse(tree, manifest_path)?;
    Ok(root
        .get(section)
        .and_then(|record| record.get(key))
        .and_then(Value::as_str)
        .map(str::to_string))
}

fn parse(tree: &dyn StagedTree, manifest_path: &str) -> Result<Value, ManifestError> {
    let text = tree.read_text(manifest_path)?;
    serde_json::from_str(&text).map_err(|source| ManifestError::Parse {
        path: manifest_path.to_string(),
        source,
    })
}

/// Apply an in-place edit to a JSON document in the staged tree, rewriting it
/// with two-space pretty printing and a trailing newline.
pub fn update_document(
    tree: &mut dyn StagedTree,
    document_path: &str,
    edit: impl FnOnce(&mut Map<String, Value>) -> Result<(), ManifestError>,
) -> Result<(), ManifestError> {
    let mut root = parse(tree, document_path)?;
    let object = root.as_object_mut().ok_or_else(|| ManifestError::NotAnObject {
        path: document_path.to_string(),
    })?;
    edit(object)?;

    let mut rendered = serde_json::to_string_pretty(&root).map_err(|source| {
        ManifestError::Parse {
            path: document_path.to_string(),
            source,
        }
    })?;
    rendered.push('\n');
    tree.write_text(document_path, &rendered)?;
    Ok(())
}

fn upsert(
    tree: &mut dyn StagedTree,
    manifest_path: &str,
    section: &str,
    key: &str,
    value: &str,
) -> Result<(), ManifestError> {
    let path = manifest_path.to_string();
    update_document(tree, manifest_path, |object| {
        let record = object
            .entry(section.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        let record = record
            .as_object_mut()
            .ok_or(ManifestError::NotAnObject { path })?;
        record.insert(key.to_string(), Value::String(value.to_string()));
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::MemoryTree;

    const MANIFEST: &str = r#"{
  "name": "demo",
  "dependencies": {
    "@angular/core": "^6.0.0"
  }
}
"#;

    #[test]
    fn adds_a_dependency() {
        let mut tree = MemoryTree::new().with_file("app/package.json", MANIFEST);
        add_dependency(&mut tree, "app/package.json", "cors", "~2.8.4").unwrap();

        let entry = get_entry(&tree, "app/package.json", "dependencies", "cors").unwrap();
        assert_eq!(entry.as_deref(), Some("~2.8.4"));
        // Existing entries survive the rewrite
        let kept = get_entry(&tree, "app/package.json", "dependencies", "@angular/core").unwrap();
        assert_eq!(kept.as_deref(), Some("^6.0.0"));
    }

    #[test]
    fn overwrites_an_existing_dependency() {
        let mut tree = MemoryTree::new().with_file("app/package.json", MANIFEST);
        add_dependency(&mut tree, "app/package.json", "@angular/core", "^7.0.0").unwrap();

        let entry = get_entry(&tree, "app/package.json", "dependencies", "@angular/core").unwrap();
        assert_eq!(entry.as_deref(), Some("^7.0.0"));
    }

    #[test]
    fn creates_scripts_record_when_absent() {
        let mut tree = MemoryTree::new().with_file("app/package.json", MANIFEST);
        set_script(&mut tree, "app/package.json", "server", "node local.js").unwrap();

        let entry = get_entry(&tree, "app/package.json", "scripts", "server").unwrap();
        assert_eq!(entry.as_deref(), Some("node local.js"));
    }

    #[test]
    fn output_uses_two_space_indentation() {
        let mut tree = MemoryTree::new().with_file("app/package.json", MANIFEST);
        set_script(&mut tree, "app/package.json", "server", "node local.js").unwrap();

        let text = tree.read_text("app/package.json").unwrap();
        assert!(text.contains("\n  \"scripts\""));
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn missing_manifest_propagates_not_found() {
        let mut tree = MemoryTree::new();
        let result = add_dependency(&mut tree, "app/package.json", "cors", "~2.8.4");
        assert!(matches!(
            result,
            Err(ManifestError::Tree(TreeError::NotFound { .. }))
        ));
    }

    #[test]
    fn update_document_rewrites_nested_structures() {
        let mut tree = MemoryTree::new().with_file(
            "app/angular.json",
            r#"{"projects": {"demo": {"architect": {}}}}"#,
        );

        update_document(&mut tree, "app/angular.json", |root| {
            let architect = root
                .get_mut("projects")
                .and_then(|p| p.get_mut("demo"))
                .and_then(|d| d.get_mut("architect"))
                .and_then(Value::as_object_mut)
                .ok_or(ManifestError::MissingKey {
                    path: "app/angular.json".to_string(),
                    key: "projects.demo.architect".to_string(),
                })?;
            architect.insert("server".to_string(), Value::String("x".to_string()));
            Ok(())
        })
        .unwrap();

        let text = tree.read_text("app/angular.json").unwrap();
        assert!(text.contains("\"server\": \"x\""));
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn update_document_edit_failure_leaves_file_untouched() {
        let mut tree = MemoryTree::new().with_file("app/angular.json", r#"{"projects": {}}"#);

        let result = update_document(&mut tree, "app/angular.json", |_root| {
            Err(ManifestError::MissingKey {
                path: "app/angular.json".to_string(),
                key: "projects.demo".to_string(),
            })
        });

        assert!(matches!(result, Err(ManifestError::MissingKey { .. })));
        assert_eq!(
            tree.read_text("app/angular.json").unwrap(),
            r#"{"projects": {}}"#
        );
    }

    #[test]
    fn malformed_manifest_is_an_error() {
        let mut tree = MemoryTree::new().with_file("app/package.json", "{ not json");
        let result = set_script(&mut tree, "app/package.json", "x", "y");
        assert!(matches!(result, Err(ManifestError::Parse { .. })));
    }
}
