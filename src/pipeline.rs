//! Fixed-order rule pipeline over one staged project tree.
//!
//! Steps run in declared order and fail fast; a failing step aborts the rest
//! and no rollback of already-applied edits is performed. Ordering matters:
//! injection passes read files that template materialization wrote.

use crate::inject::{inject_capability, InjectOutcome};
use crate::manifest::{self, ManifestError};
use crate::template::{self, PlaceholderMap};
use crate::tree::StagedTree;
use crate::wiring::{Capability, ModuleWiring, TaskDescriptor, TaskQueue};
use crate::{diag, ts::Dialect};
use anyhow::{Context, Result};
use regex::Regex;
use serde_json::{json, Value};
use tracing::info;

/// Options describing the project being transformed.
#[derive(Debug, Clone)]
pub struct ScaffoldOptions {
    /// Project directory inside the staged tree
    pub directory: String,
    /// Project name used in generated build scripts
    pub project: String,
    /// Source root relative to the project directory (usually `src`)
    pub source_root: String,
    /// Distribution output directory, feeds the `distFolder` placeholder
    pub dist_folder: String,
    /// Skip queueing the package-install follow-up task
    pub skip_install: bool,
}

impl ScaffoldOptions {
    pub fn manifest_path(&self) -> String {
        format!("{}/package.json", self.directory)
    }

    pub fn source_root_path(&self) -> String {
        format!("{}/{}", self.directory, self.source_root)
    }
}

/// Mutable state shared by the steps of one pipeline run.
#[derive(Debug)]
pub struct PipelineContext {
    pub options: ScaffoldOptions,
    pub placeholders: PlaceholderMap,
}

impl PipelineContext {
    pub fn new(options: ScaffoldOptions) -> Self {
        let mut placeholders = PlaceholderMap::new();
        placeholders.insert("distFolder".to_string(), options.dist_folder.clone());
        placeholders.insert(
            "browserDistFolder".to_string(),
            format!("{}/browser", options.dist_folder),
        );
        Self {
            options,
            placeholders,
        }
    }
}

/// External collaborators handed to every step.
pub struct Collaborators<'a> {
    pub wiring: &'a mut dyn ModuleWiring,
    pub tasks: &'a mut dyn TaskQueue,
}

/// One named rule in the pipeline.
pub trait PipelineStep {
    fn name(&self) -> &'static str;

    fn run(
        &self,
        tree: &mut dyn StagedTree,
        ctx: &mut PipelineContext,
        collab: &mut Collaborators<'_>,
    ) -> Result<()>;
}

/// An explicit, ordered list of named steps.
#[derive(Default)]
pub struct Pipeline {
    steps: Vec<Box<dyn PipelineStep>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_step(mut self, step: Box<dyn PipelineStep>) -> Self {
        self.steps.push(step);
        self
    }

    /// The standard transformation sequence: prune conflicting server
    /// artifacts, materialize templates, extend the manifest, point the CLI
    /// config at the split output paths, wire modules, repoint the bootstrap
    /// call, inject portability capabilities, queue the install task.
    pub fn standard(options: &ScaffoldOptions) -> Self {
        let server_script = format!(
            "ng run {}:server && webpack --config webpack.server.config.js --progress --colors",
            options.project
        );
        let app_module = format!("{}/src/app/app.module.ts", options.directory);

        Self::new()
            .with_step(Box::new(PruneConflicts {
                dependency: "@ng-toolkit/serverless".to_string(),
                files: vec![
                    "local.js".to_string(),
                    "server.ts".to_string(),
                    "webpack.server.config.js".to_string(),
                ],
            }))
            .with_step(Box::new(MaterializeTemplates {
                template_dir: "files".to_string(),
            }))
            .with_step(Box::new(EditManifest {
                dependencies: vec![
                    ("@angular/platform-browser".to_string(), "^6.0.0".to_string()),
                    ("@angular/platform-server".to_string(), "^6.0.0".to_string()),
                    (
                        "@nguniversal/module-map-ngfactory-loader".to_string(),
                        "^6.0.0".to_string(),
                    ),
                    ("webpack-cli".to_string(), "^2.1.4".to_string()),
                    ("ts-loader".to_string(), "4.2.0".to_string()),
                    ("@nguniversal/express-engine".to_string(), "^6.0.0".to_string()),
                    ("cors".to_string(), "~2.8.4".to_string()),
                ],
                scripts: vec![
                    ("build:server:prod".to_string(), server_script),
                    ("build:browser:prod".to_string(), "ng build --prod".to_string()),
                    (
                        "build:prod".to_string(),
                        "npm run build:server:prod && npm run build:browser:prod".to_string(),
                    ),
                    ("server".to_string(), "node local.js".to_string()),
                ],
            }))
            .with_step(Box::new(UpdateCliConfig))
            .with_step(Box::new(WireModules {
                edits: vec![
                    ClauseEditRequest::add(&app_module, "imports", "CommonModule"),
                    ClauseEditRequest::add(&app_module, "imports", "NgtUniversalModule"),
                    ClauseEditRequest::remove(&app_module, "imports", "BrowserModule"),
                ],
            }))
            .with_step(Box::new(SwapBootstrap {
                main_file: format!("{}/src/main.ts", options.directory),
                entry_module: "AppModule".to_string(),
                browser_module: "AppBrowserModule".to_string(),
                browser_module_specifier: "./app/app.browser.module".to_string(),
            }))
            .with_step(Box::new(InjectGlobals {
                capabilities: vec![Capability::local_storage(), Capability::window()],
            }))
            .with_step(Box::new(QueueInstall))
    }

    /// Run every step in declared order, failing fast with step context.
    pub fn run(
        &self,
        tree: &mut dyn StagedTree,
        ctx: &mut PipelineContext,
        collab: &mut Collaborators<'_>,
    ) -> Result<()> {
        for step in &self.steps {
            info!(step = step.name(), "running pipeline step");
            diag::report("pipeline.step", step.name());
            step.run(tree, ctx, collab)
                .with_context(|| format!("pipeline step `{}` failed", step.name()))?;
        }
        Ok(())
    }
}

/// Delete project files that a previously-installed provider already owns.
pub struct PruneConflicts {
    pub dependency: String,
    pub files: Vec<String>,
}

impl PipelineStep for PruneConflicts {
    fn name(&self) -> &'static str {
        "prune-conflicts"
    }

    fn run(
        &self,
        tree: &mut dyn StagedTree,
        ctx: &mut PipelineContext,
        _collab: &mut Collaborators<'_>,
    ) -> Result<()> {
        let manifest_path = ctx.options.manifest_path();
        let owned = manifest::get_entry(tree, &manifest_path, "dependencies", &self.dependency)?
            .is_some();
        if !owned {
            return Ok(());
        }

        for file in &self.files {
            let path = format!("{}/{}", ctx.options.directory, file);
            if tree.exists(&path) {
                tree.delete(&path)?;
            }
        }
        Ok(())
    }
}

/// Copy template files into the project directory, finalizing `__name__`
/// placeholders as each file is materialized.
pub struct MaterializeTemplates {
    /// Directory inside the staged tree holding the merged template files
    pub template_dir: String,
}

impl PipelineStep for MaterializeTemplates {
    fn name(&self) -> &'static str {
        "materialize-templates"
    }

    fn run(
        &self,
        tree: &mut dyn StagedTree,
        ctx: &mut PipelineContext,
        _collab: &mut Collaborators<'_>,
    ) -> Result<()> {
        let mut sources = Vec::new();
        tree.visit(&self.template_dir, &mut |path| {
            sources.push(path.to_string());
        });

        let prefix = format!("{}/", self.template_dir);
        for source_path in sources {
            let relative = source_path
                .strip_prefix(&prefix)
                .unwrap_or(source_path.as_str());
            let text = tree.read_text(&source_path)?;
            let finalized = template::substitute(&text, &ctx.placeholders);
            let destination = format!("{}/{}", ctx.options.directory, relative);
            tree.write_text(&destination, &finalized)?;
        }
        Ok(())
    }
}

/// Add dependencies and scripts to the project manifest.
pub struct EditManifest {
    pub dependencies: Vec<(String, String)>,
    pub scripts: Vec<(String, String)>,
}

impl PipelineStep for EditManifest {
    fn name(&self) -> &'static str {
        "edit-manifest"
    }

    fn run(
        &self,
        tree: &mut dyn StagedTree,
        ctx: &mut PipelineContext,
        _collab: &mut Collaborators<'_>,
    ) -> Result<()> {
        let manifest_path = ctx.options.manifest_path();
        for (name, range) in &self.dependencies {
            manifest::add_dependency(tree, &manifest_path, name, range)?;
        }
        for (name, command) in &self.scripts {
            manifest::set_script(tree, &manifest_path, name, command)?;
        }
        Ok(())
    }
}

/// Point the CLI config's build target at the browser output directory and
/// add a server build target next to it.
pub struct UpdateCliConfig;

impl PipelineStep for UpdateCliConfig {
    fn name(&self) -> &'static str {
        "update-cli-config"
    }

    fn run(
        &self,
        tree: &mut dyn StagedTree,
        ctx: &mut PipelineContext,
        _collab: &mut Collaborators<'_>,
    ) -> Result<()> {
        let config_path = format!("{}/angular.json", ctx.options.directory);
        let project = ctx.options.project.clone();
        let dist = ctx.options.dist_folder.clone();
        let error_path = config_path.clone();

        manifest::update_document(tree, &config_path, move |root| {
            let missing = |key: &str| ManifestError::MissingKey {
                path: error_path.clone(),
                key: key.to_string(),
            };

            let architect = root
                .get_mut("projects")
                .and_then(|projects| projects.get_mut(&project))
                .and_then(|entry| entry.get_mut("architect"))
                .and_then(Value::as_object_mut)
                .ok_or_else(|| missing(&format!("projects.{project}.architect")))?;

            architect
                .get_mut("build")
                .and_then(|build| build.get_mut("options"))
                .and_then(Value::as_object_mut)
                .ok_or_else(|| missing("architect.build.options"))?
                .insert("outputPath".to_string(), json!(format!("{dist}/browser")));

            architect.insert(
                "server".to_string(),
                json!({
                    "builder": "@angular-devkit/build-angular:server",
                    "options": {
                        "outputPath": format!("{dist}/server"),
                        "main": "src/main.server.ts",
                        "tsConfig": "src/tsconfig.server.json"
                    }
                }),
            );
            Ok(())
        })?;
        Ok(())
    }
}

/// Repoint the main entry file's `bootstrapModule(...)` call from the entry
/// module to the browser module, and request the matching import.
pub struct SwapBootstrap {
    pub main_file: String,
    pub entry_module: String,
    pub browser_module: String,
    pub browser_module_specifier: String,
}

impl PipelineStep for SwapBootstrap {
    fn name(&self) -> &'static str {
        "swap-bootstrap"
    }

    fn run(
        &self,
        tree: &mut dyn StagedTree,
        _ctx: &mut PipelineContext,
        collab: &mut Collaborators<'_>,
    ) -> Result<()> {
        let text = tree.read_text(&self.main_file)?;
        let pattern = format!(
            r"bootstrapModule\(\s*{}\s*\)",
            regex::escape(&self.entry_module)
        );
        // The module name is escaped, so the pattern is always valid.
        let call = Regex::new(&pattern).expect("escaped bootstrap pattern is valid");
        if !call.is_match(&text) {
            // Already swapped, or a non-standard entry file; nothing to do.
            return Ok(());
        }

        let replacement = format!("bootstrapModule({})", self.browser_module);
        let swapped = call
            .replace_all(&text, regex::NoExpand(&replacement))
            .into_owned();
        tree.write_text(&self.main_file, &swapped)?;
        collab.wiring.add_import(
            tree,
            &self.main_file,
            &self.browser_module,
            &self.browser_module_specifier,
        )?;
        Ok(())
    }
}

/// One requested clause edit on a structural descriptor.
#[derive(Debug, Clone)]
pub struct ClauseEditRequest {
    pub descriptor_path: String,
    pub clause: String,
    pub entry: String,
    pub remove: bool,
}

impl ClauseEditRequest {
    pub fn add(descriptor_path: &str, clause: &str, entry: &str) -> Self {
        Self {
            descriptor_path: descriptor_path.to_string(),
            clause: clause.to_string(),
            entry: entry.to_string(),
            remove: false,
        }
    }

    pub fn remove(descriptor_path: &str, clause: &str, entry: &str) -> Self {
        Self {
            descriptor_path: descriptor_path.to_string(),
            clause: clause.to_string(),
            entry: entry.to_string(),
            remove: true,
        }
    }
}

/// Apply clause edits through the module-wiring collaborator.
pub struct WireModules {
    pub edits: Vec<ClauseEditRequest>,
}

impl PipelineStep for WireModules {
    fn name(&self) -> &'static str {
        "wire-modules"
    }

    fn run(
        &self,
        tree: &mut dyn StagedTree,
        _ctx: &mut PipelineContext,
        collab: &mut Collaborators<'_>,
    ) -> Result<()> {
        for edit in &self.edits {
            if edit.remove {
                collab.wiring.remove_clause_entry(
                    tree,
                    &edit.descriptor_path,
                    &edit.clause,
                    &edit.entry,
                )?;
            } else {
                collab.wiring.add_clause_entry(
                    tree,
                    &edit.descriptor_path,
                    &edit.clause,
                    &edit.entry,
                )?;
            }
        }
        Ok(())
    }
}

/// Run the injection pass for each capability over every TypeScript file
/// under the project's source root.
pub struct InjectGlobals {
    pub capabilities: Vec<Capability>,
}

impl PipelineStep for InjectGlobals {
    fn name(&self) -> &'static str {
        "inject-globals"
    }

    fn run(
        &self,
        tree: &mut dyn StagedTree,
        ctx: &mut PipelineContext,
        collab: &mut Collaborators<'_>,
    ) -> Result<()> {
        let mut files = Vec::new();
        tree.visit(&ctx.options.source_root_path(), &mut |path| {
            let is_source = path
                .rsplit('.')
                .next()
                .and_then(Dialect::from_extension)
                .is_some();
            if is_source {
                files.push(path.to_string());
            }
        });

        let mut rewritten = 0usize;
        for path in &files {
            for capability in &self.capabilities {
                match inject_capability(tree, collab.wiring, path, capability)? {
                    InjectOutcome::Rewritten { edits } => rewritten += edits,
                    InjectOutcome::Unchanged => {}
                }
            }
        }
        info!(files = files.len(), rewritten, "injection pass complete");
        Ok(())
    }
}

/// Queue the package-install follow-up task unless installs were skipped.
pub struct QueueInstall;

impl PipelineStep for QueueInstall {
    fn name(&self) -> &'static str {
        "queue-install"
    }

    fn run(
        &self,
        _tree: &mut dyn StagedTree,
        ctx: &mut PipelineContext,
        collab: &mut Collaborators<'_>,
    ) -> Result<()> {
        if !ctx.options.skip_install {
            collab.tasks.queue(TaskDescriptor::PackageInstall {
                directory: ctx.options.directory.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::MemoryTree;
    use crate::wiring::{RecordingQueue, RecordingWiring};

    fn options() -> ScaffoldOptions {
        ScaffoldOptions {
            directory: "app".to_string(),
            project: "demo".to_string(),
            source_root: "src".to_string(),
            dist_folder: "dist/demo".to_string(),
            skip_install: false,
        }
    }

    #[test]
    fn materialize_resolves_placeholders_into_project_dir() {
        let mut tree = MemoryTree::new()
            .with_file("files/server.ts", "const dir = '__distFolder__/assets';")
            .with_file("files/local.js", "require('./__distFolder__/server');");
        let mut ctx = PipelineContext::new(options());
        let mut wiring = RecordingWiring::new();
        let mut tasks = RecordingQueue::new();
        let mut collab = Collaborators {
            wiring: &mut wiring,
            tasks: &mut tasks,
        };

        let step = MaterializeTemplates {
            template_dir: "files".to_string(),
        };
        step.run(&mut tree, &mut ctx, &mut collab).unwrap();

        assert_eq!(
            tree.read_text("app/server.ts").unwrap(),
            "const dir = 'dist/demo/assets';"
        );
        assert_eq!(
            tree.read_text("app/local.js").unwrap(),
            "require('./dist/demo/server');"
        );
    }

    #[test]
    fn prune_skips_when_dependency_absent() {
        let mut tree = MemoryTree::new()
            .with_file("app/package.json", r#"{"dependencies": {}}"#)
            .with_file("app/server.ts", "server");
        let mut ctx = PipelineContext::new(options());
        let mut wiring = RecordingWiring::new();
        let mut tasks = RecordingQueue::new();
        let mut collab = Collaborators {
            wiring: &mut wiring,
            tasks: &mut tasks,
        };

        let step = PruneConflicts {
            dependency: "@ng-toolkit/serverless".to_string(),
            files: vec!["server.ts".to_string()],
        };
        step.run(&mut tree, &mut ctx, &mut collab).unwrap();
        assert!(tree.exists("app/server.ts"));
    }

    #[test]
    fn prune_deletes_owned_files() {
        let mut tree = MemoryTree::new()
            .with_file(
                "app/package.json",
                r#"{"dependencies": {"@ng-toolkit/serverless": "1.1.28"}}"#,
            )
            .with_file("app/server.ts", "server")
            .with_file("app/local.js", "local");
        let mut ctx = PipelineContext::new(options());
        let mut wiring = RecordingWiring::new();
        let mut tasks = RecordingQueue::new();
        let mut collab = Collaborators {
            wiring: &mut wiring,
            tasks: &mut tasks,
        };

        let step = PruneConflicts {
            dependency: "@ng-toolkit/serverless".to_string(),
            files: vec![
                "server.ts".to_string(),
                "local.js".to_string(),
                "webpack.server.config.js".to_string(),
            ],
        };
        step.run(&mut tree, &mut ctx, &mut collab).unwrap();
        assert!(!tree.exists("app/server.ts"));
        assert!(!tree.exists("app/local.js"));
    }

    const CLI_CONFIG: &str = r#"{
  "projects": {
    "demo": {
      "sourceRoot": "src",
      "architect": {
        "build": {
          "options": {
            "outputPath": "dist/demo",
            "main": "src/main.ts"
          }
        }
      }
    }
  }
}
"#;

    #[test]
    fn cli_config_gains_split_output_paths() {
        let mut tree = MemoryTree::new().with_file("app/angular.json", CLI_CONFIG);
        let mut ctx = PipelineContext::new(options());
        let mut wiring = RecordingWiring::new();
        let mut tasks = RecordingQueue::new();
        let mut collab = Collaborators {
            wiring: &mut wiring,
            tasks: &mut tasks,
        };

        UpdateCliConfig.run(&mut tree, &mut ctx, &mut collab).unwrap();

        let text = tree.read_text("app/angular.json").unwrap();
        let config: Value = serde_json::from_str(&text).unwrap();
        let architect = &config["projects"]["demo"]["architect"];
        assert_eq!(
            architect["build"]["options"]["outputPath"],
            json!("dist/demo/browser")
        );
        assert_eq!(
            architect["server"]["builder"],
            json!("@angular-devkit/build-angular:server")
        );
        assert_eq!(
            architect["server"]["options"]["outputPath"],
            json!("dist/demo/server")
        );
        assert_eq!(architect["server"]["options"]["main"], json!("src/main.server.ts"));
        // Unrelated keys survive the rewrite
        assert_eq!(config["projects"]["demo"]["sourceRoot"], json!("src"));
    }

    #[test]
    fn cli_config_without_the_project_is_an_error() {
        let mut tree =
            MemoryTree::new().with_file("app/angular.json", r#"{"projects": {}}"#);
        let mut ctx = PipelineContext::new(options());
        let mut wiring = RecordingWiring::new();
        let mut tasks = RecordingQueue::new();
        let mut collab = Collaborators {
            wiring: &mut wiring,
            tasks: &mut tasks,
        };

        let err = UpdateCliConfig
            .run(&mut tree, &mut ctx, &mut collab)
            .unwrap_err();
        assert!(err.to_string().contains("projects.demo.architect"));
    }

    #[test]
    fn swap_bootstrap_repoints_the_entry_call() {
        let main = "platformBrowserDynamic().bootstrapModule( AppModule )\n  .catch(err => console.log(err));\n";
        let mut tree = MemoryTree::new().with_file("app/src/main.ts", main);
        let mut ctx = PipelineContext::new(options());
        let mut wiring = RecordingWiring::new();
        let mut tasks = RecordingQueue::new();
        let mut collab = Collaborators {
            wiring: &mut wiring,
            tasks: &mut tasks,
        };

        let step = SwapBootstrap {
            main_file: "app/src/main.ts".to_string(),
            entry_module: "AppModule".to_string(),
            browser_module: "AppBrowserModule".to_string(),
            browser_module_specifier: "./app/app.browser.module".to_string(),
        };
        step.run(&mut tree, &mut ctx, &mut collab).unwrap();

        let text = tree.read_text("app/src/main.ts").unwrap();
        assert!(text.contains("bootstrapModule(AppBrowserModule)"));
        assert!(!text.contains("AppModule )"));
        assert_eq!(wiring.imports.len(), 1);
        assert_eq!(wiring.imports[0].symbol, "AppBrowserModule");

        // A second run finds no entry-module call and requests nothing new.
        let mut collab = Collaborators {
            wiring: &mut wiring,
            tasks: &mut tasks,
        };
        step.run(&mut tree, &mut ctx, &mut collab).unwrap();
        assert_eq!(tree.read_text("app/src/main.ts").unwrap(), text);
        assert_eq!(wiring.imports.len(), 1);
    }

    #[test]
    fn queue_install_honors_skip_flag() {
        let mut tree = MemoryTree::new();
        let mut opts = options();
        opts.skip_install = true;
        let mut ctx = PipelineContext::new(opts);
        let mut wiring = RecordingWiring::new();
        let mut tasks = RecordingQueue::new();
        let mut collab = Collaborators {
            wiring: &mut wiring,
            tasks: &mut tasks,
        };

        QueueInstall.run(&mut tree, &mut ctx, &mut collab).unwrap();
        assert!(tasks.tasks.is_empty());
    }

    #[test]
    fn context_exposes_dist_placeholders() {
        let ctx = PipelineContext::new(options());
        assert_eq!(ctx.placeholders["distFolder"], "dist/demo");
        assert_eq!(ctx.placeholders["browserDistFolder"], "dist/demo/browser");
    }
}
