use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use scaffold_patcher::diag::{self, DiagnosticsSink};
use scaffold_patcher::inject::{inject_capability, InjectOutcome};
use scaffold_patcher::pipeline::{Collaborators, Pipeline, PipelineContext, ScaffoldOptions};
use scaffold_patcher::tree::{DiskTree, MemoryTree, StagedTree};
use scaffold_patcher::ts::{ReferenceScanner, TargetReference};
use scaffold_patcher::wiring::{Capability, ModuleWiring, TaskDescriptor, TaskQueue, WiringError};
use similar::{ChangeTag, TextDiff};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "scaffold-patcher")]
#[command(about = "Project scaffolding transformer with syntax-aware dependency injection", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full transformation pipeline over a project tree
    Apply {
        /// Root of the staged project tree
        #[arg(short, long)]
        root: PathBuf,

        /// Project directory inside the tree
        #[arg(short, long, default_value = "")]
        directory: String,

        /// Project name used in generated build scripts
        #[arg(short, long)]
        project: String,

        /// Source root relative to the project directory
        #[arg(long, default_value = "src")]
        source_root: String,

        /// Distribution output directory
        #[arg(long, default_value = "dist")]
        dist_folder: String,

        /// Do not queue the package-install follow-up task
        #[arg(long)]
        skip_install: bool,

        /// Stage everything in memory and show diffs without touching disk
        #[arg(short = 'n', long)]
        dry_run: bool,
    },

    /// Rewrite free references to one global in a single file
    Inject {
        /// File to rewrite
        #[arg(short, long)]
        file: PathBuf,

        /// Free-variable name to qualify
        #[arg(long, default_value = "window")]
        name: String,

        /// Type label for the injected member
        #[arg(long, default_value = "Window")]
        type_label: String,

        /// Module providing the injection token
        #[arg(long, default_value = "@ng-toolkit/universal")]
        provider_module: String,

        /// Provider token identifier
        #[arg(long, default_value = "WINDOW")]
        provider_token: String,

        /// Show a unified diff of the rewrite
        #[arg(short, long)]
        diff: bool,
    },

    /// List free references to a name without rewriting
    Scan {
        /// File to scan
        #[arg(short, long)]
        file: PathBuf,

        /// Free-variable name to look for
        #[arg(long, default_value = "window")]
        name: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    diag::init(Box::new(TracingSink));

    let cli = Cli::parse();

    match cli.command {
        Commands::Apply {
            root,
            directory,
            project,
            source_root,
            dist_folder,
            skip_install,
            dry_run,
        } => cmd_apply(
            root,
            ScaffoldOptions {
                directory,
                project,
                source_root,
                dist_folder,
                skip_install,
            },
            dry_run,
        ),

        Commands::Inject {
            file,
            name,
            type_label,
            provider_module,
            provider_token,
            diff,
        } => cmd_inject(
            file,
            Capability::new(name, type_label, provider_module, provider_token),
            diff,
        ),

        Commands::Scan { file, name } => cmd_scan(file, &name),
    }
}

/// Diagnostics sink that forwards events onto the tracing pipeline.
struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn report(&self, event: &str, context: &str) {
        tracing::info!(event, context, "diagnostic");
    }
}

/// Wiring collaborator that reports each requested edit on the console.
/// The actual module editing is owned by an external tool; the pipeline only
/// needs the requests surfaced.
struct ConsoleWiring;

impl ModuleWiring for ConsoleWiring {
    fn add_clause_entry(
        &mut self,
        _tree: &mut dyn StagedTree,
        descriptor_path: &str,
        clause: &str,
        entry: &str,
    ) -> Result<(), WiringError> {
        println!(
            "  {} {entry} -> {clause} of {descriptor_path}",
            "wire+".green()
        );
        Ok(())
    }

    fn remove_clause_entry(
        &mut self,
        _tree: &mut dyn StagedTree,
        descriptor_path: &str,
        clause: &str,
        entry: &str,
    ) -> Result<(), WiringError> {
        println!(
            "  {} {entry} -x {clause} of {descriptor_path}",
            "wire-".red()
        );
        Ok(())
    }

    fn add_import(
        &mut self,
        _tree: &mut dyn StagedTree,
        file_path: &str,
        symbol: &str,
        module_specifier: &str,
    ) -> Result<(), WiringError> {
        println!(
            "  {} {symbol} from '{module_specifier}' -> {file_path}",
            "import".green()
        );
        Ok(())
    }

    fn register_constructor_dependency(
        &mut self,
        _tree: &mut dyn StagedTree,
        class_file: &str,
        capability: &Capability,
    ) -> Result<(), WiringError> {
        println!(
            "  {} {}: {} ({} from {})",
            "inject".cyan(),
            class_file,
            capability.name,
            capability.provider_token,
            capability.provider_module
        );
        Ok(())
    }
}

struct ConsoleQueue;

impl TaskQueue for ConsoleQueue {
    fn queue(&mut self, task: TaskDescriptor) {
        match task {
            TaskDescriptor::PackageInstall { directory } => {
                println!("  {} package install in {directory}", "queued".yellow());
            }
        }
    }
}

fn cmd_apply(root: PathBuf, options: ScaffoldOptions, dry_run: bool) -> Result<()> {
    let pipeline = Pipeline::standard(&options);
    let mut ctx = PipelineContext::new(options);
    let mut wiring = ConsoleWiring;
    let mut tasks = ConsoleQueue;
    let mut collab = Collaborators {
        wiring: &mut wiring,
        tasks: &mut tasks,
    };

    if dry_run {
        let disk = DiskTree::new(&root);
        let mut staged = MemoryTree::new();
        disk.visit("", &mut |path| {
            // Binary assets cannot be staged as text; skip them.
            if let Ok(text) = disk.read_text(path) {
                // MemoryTree writes are infallible.
                let _ = staged.write_text(path, &text);
            }
        });
        let before = staged.clone();

        pipeline.run(&mut staged, &mut ctx, &mut collab)?;
        print_tree_diff(&before, &staged);
        println!("{}", "dry run: no files written".yellow());
        return Ok(());
    }

    let mut tree = DiskTree::new(&root);
    pipeline.run(&mut tree, &mut ctx, &mut collab)?;
    println!("{}", "pipeline complete".green());
    Ok(())
}

fn print_tree_diff(before: &MemoryTree, after: &MemoryTree) {
    let mut paths = Vec::new();
    after.visit("", &mut |path| paths.push(path.to_string()));

    for path in paths {
        let old = before.read_text(&path).unwrap_or_default();
        let new = after.read_text(&path).unwrap_or_default();
        if old == new {
            continue;
        }

        println!("{}", path.bold());
        let diff = TextDiff::from_lines(&old, &new);
        for change in diff.iter_all_changes() {
            match change.tag() {
                ChangeTag::Delete => print!("{}", format!("-{change}").red()),
                ChangeTag::Insert => print!("{}", format!("+{change}").green()),
                ChangeTag::Equal => {}
            }
        }
    }
}

fn cmd_inject(file: PathBuf, capability: Capability, show_diff: bool) -> Result<()> {
    let parent = file
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let name = file
        .file_name()
        .context("file path has no file name")?
        .to_string_lossy()
        .to_string();

    let mut tree = DiskTree::new(parent);
    let before = tree.read_text(&name)?;
    let mut wiring = ConsoleWiring;

    let outcome = inject_capability(&mut tree, &mut wiring, &name, &capability)?;

    match outcome {
        InjectOutcome::Rewritten { edits } => {
            println!(
                "{} {} ({} reference{})",
                "rewrote".green(),
                file.display(),
                edits,
                if edits == 1 { "" } else { "s" }
            );
            if show_diff {
                let after = tree.read_text(&name)?;
                let diff = TextDiff::from_lines(&before, &after);
                for change in diff.iter_all_changes() {
                    match change.tag() {
                        ChangeTag::Delete => print!("{}", format!("-{change}").red()),
                        ChangeTag::Insert => print!("{}", format!("+{change}").green()),
                        ChangeTag::Equal => {}
                    }
                }
            }
        }
        InjectOutcome::Unchanged => {
            println!("{} {}", "unchanged".yellow(), file.display());
        }
    }
    Ok(())
}

fn cmd_scan(file: PathBuf, name: &str) -> Result<()> {
    let source = std::fs::read_to_string(&file)
        .with_context(|| format!("failed to read {}", file.display()))?;

    let mut scanner = ReferenceScanner::new()?;
    let target = TargetReference::new(name, "this.");
    let spans = scanner.scan(&source, &target)?;

    if spans.is_empty() {
        println!("{} no free references to `{name}`", "scan".cyan());
        return Ok(());
    }

    for span in &spans {
        let line = source[..span.byte_start].lines().count();
        println!(
            "{} {}:{} bytes {}..{}",
            "scan".cyan(),
            file.display(),
            line,
            span.byte_start,
            span.byte_end
        );
    }
    println!("{} {} free reference(s)", "scan".cyan(), spans.len());
    Ok(())
}
