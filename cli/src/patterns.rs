use clap::Parser;
use mur_patterns::SearchOptions;
use mur_patterns::VerifyOptions;
use mur_patterns::factory;
use mur_patterns::factory::Backend;
use mur_patterns::factory::StoreConfig;
use mur_patterns::injection;
use mur_patterns::integrity;
use mur_patterns::search;
use mur_patterns::verify;
use std::path::PathBuf;

/// Manage and audit the local pattern knowledge base.
#[derive(Debug, Parser)]
#[command(name = "mur", version)]
pub struct Cli {
    /// Pattern directory (defaults to $MUR_PATTERNS_DIR or ~/.mur/patterns).
    #[arg(long, global = true)]
    pub dir: Option<PathBuf>,

    /// Storage backend (defaults to $MUR_PATTERN_BACKEND or yaml).
    #[arg(long, global = true, value_enum)]
    pub backend: Option<BackendArg>,

    #[command(subcommand)]
    pub cmd: PatternCommand,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum BackendArg {
    Yaml,
    Sqlite,
}

impl From<BackendArg> for Backend {
    fn from(b: BackendArg) -> Self {
        match b {
            BackendArg::Yaml => Backend::Yaml,
            BackendArg::Sqlite => Backend::Sqlite,
        }
    }
}

/// Pattern subcommands.
#[derive(Debug, clap::Subcommand)]
pub enum PatternCommand {
    /// Rank patterns against a free-text query.
    Search {
        /// Query terms; joined with spaces and lowercased.
        terms: Vec<String>,
        /// Only patterns carrying this tag.
        #[arg(long)]
        tag: Option<String>,
        /// Only patterns confirmed for this language domain.
        #[arg(long)]
        domain: Option<String>,
        /// Maximum number of results; 0 for all.
        #[arg(long, default_value_t = 10)]
        limit: usize,
        /// Emit JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Check content hashes and injection risk of every pattern.
    Verify {
        /// Recalculate missing or mismatched hashes.
        #[arg(long)]
        fix: bool,
        /// Emit JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// List stored patterns.
    List,
    /// Show one pattern after verifying its hash.
    Show { name: String },
    /// Show basic statistics about stored patterns.
    Stats,
}

/// Execute the pattern command.
pub fn run(cli: Cli) -> anyhow::Result<()> {
    let config = StoreConfig {
        backend: cli.backend.map(Backend::from),
        dir: cli.dir,
    };
    tracing::debug!(backend = ?config.backend, dir = ?config.dir, "opening pattern store");
    let store = factory::open_store(&config)?;

    match cli.cmd {
        PatternCommand::Search {
            terms,
            tag,
            domain,
            limit,
            json,
        } => {
            let opts = SearchOptions {
                tag,
                domain,
                limit,
                ..SearchOptions::from_terms(terms.as_slice())
            };
            let results = search::search(store.as_ref(), &opts)?;
            if json {
                let rows: Vec<_> = results
                    .iter()
                    .map(|r| {
                        serde_json::json!({
                            "name": r.pattern.name,
                            "score": r.score,
                            "description": r.pattern.description,
                            "tags": r.pattern.display_tags(),
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else if results.is_empty() {
                println!("No matching patterns.");
            } else {
                for r in &results {
                    println!(
                        "{:>4}  {:<30}  {}",
                        r.score, r.pattern.name, r.pattern.description
                    );
                }
            }
        }
        PatternCommand::Verify { fix, json } => {
            let report = verify::verify(store.as_ref(), VerifyOptions { repair: fix })?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "checks": report.checks,
                        "summary": report.summary(),
                    }))?
                );
                return Ok(());
            }
            if report.checks.is_empty() {
                println!("No patterns found.");
                return Ok(());
            }
            println!("Pattern Integrity Check");
            println!("=======================");
            println!();
            for check in &report.checks {
                let issues = check.issues();
                if issues.is_empty() {
                    println!("  ✓ {:<30}  {}", check.name, check.trust_level);
                } else {
                    println!(
                        "  ⚠ {:<30}  {}  [{}]",
                        check.name,
                        check.trust_level,
                        issues.join(", ")
                    );
                }
            }
            let s = report.summary();
            println!();
            println!(
                "Results: {} OK, {} mismatch, {} missing hash, {} injection warnings",
                s.ok, s.mismatched, s.missing, s.injection_warnings
            );
            if fix && s.repaired > 0 {
                println!("Fixed: {} patterns", s.repaired);
            }
            if s.repair_failed > 0 {
                println!("Could not fix: {} patterns", s.repair_failed);
            }
        }
        PatternCommand::List => {
            for p in store.list()? {
                println!("{:<30}  {:<10}  {}", p.name, p.lifecycle.status.as_str(), p.description);
            }
        }
        PatternCommand::Show { name } => {
            let p = integrity::load_verified(store.as_ref(), &name)?;
            println!("name:   {}", p.name);
            println!("trust:  {}", p.security.trust_level);
            println!("domain: {}", p.primary_domain());
            println!("tags:   {}", p.display_tags().join(", "));
            for w in &p.security.warnings {
                println!("warning: {w}");
            }
            println!();
            println!("{}", p.content);
            println!();
            print!("{}", injection::format_findings(&injection::scan(&p.content).findings));
        }
        PatternCommand::Stats => {
            let stats = store.stats()?;
            println!("{stats}");
        }
    }
    Ok(())
}
