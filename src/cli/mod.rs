//! Login Anomaly CLI Module
//!
//! Command-line interface for scoring login attempts and re-scoring them
//! with a saved model bundle.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::anomaly::Contamination;
use crate::data::{InMemorySource, RecordLoader};
use crate::export::{rank_by_score, ModelBundle, ReportWriter};
use crate::feature_engineering::FeatureEngineer;
use crate::pipeline::{PipelineConfig, ScoredRecord, ScoringPipeline};

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }
fn alert(s: &str) -> ColoredString  { s.truecolor(240, 110, 100) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(&format!("{:<18}", key)), val.white())
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_warn(msg: &str) {
    println!("  {} {}", alert("!"), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "login-anomaly")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Rank login attempts by isolation-forest anomaly score")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train on trusted logins and score every login attempt
    Score {
        /// Login attempts (CSV, TSV, or JSON Lines)
        #[arg(short, long)]
        data: PathBuf,

        /// Explicit trusted training set; derived from the ASN policy when omitted
        #[arg(long)]
        trusted: Option<PathBuf>,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of isolation trees
        #[arg(long)]
        trees: Option<usize>,

        /// Expected anomaly fraction in the trusted set, in (0, 0.5]
        #[arg(long)]
        contamination: Option<f64>,

        /// Random seed
        #[arg(long)]
        seed: Option<u64>,

        /// Worker threads (all cores when omitted)
        #[arg(long)]
        jobs: Option<usize>,

        /// Rows shown in the ranked table
        #[arg(long)]
        top: Option<usize>,

        /// Write all scored records, most anomalous first, to this CSV file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write all scored records in `created_at` order to this CSV file
        #[arg(long)]
        timeline: Option<PathBuf>,

        /// Save the fitted model bundle to this file
        #[arg(long)]
        model_out: Option<PathBuf>,
    },

    /// Score login attempts with a saved model bundle
    Rescore {
        /// Model bundle written by `score --model-out`
        #[arg(short, long)]
        model: PathBuf,

        /// Login attempts (CSV, TSV, or JSON Lines)
        #[arg(short, long)]
        data: PathBuf,

        /// Write all scored records, most anomalous first, to this CSV file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write all scored records in `created_at` order to this CSV file
        #[arg(long)]
        timeline: Option<PathBuf>,

        /// Rows shown in the ranked table
        #[arg(long, default_value = "20")]
        top: usize,
    },
}

/// Command-line overrides applied on top of the configuration file
#[derive(Debug, Clone, Default)]
pub struct ScoreOverrides {
    pub trees: Option<usize>,
    pub contamination: Option<f64>,
    pub seed: Option<u64>,
    pub jobs: Option<usize>,
    pub top: Option<usize>,
}

impl ScoreOverrides {
    /// Apply the set overrides to `config`
    pub fn apply(&self, mut config: PipelineConfig) -> PipelineConfig {
        if let Some(trees) = self.trees {
            config = config.with_n_estimators(trees);
        }
        if let Some(c) = self.contamination {
            config = config.with_contamination(Contamination::Fraction(c));
        }
        if let Some(seed) = self.seed {
            config = config.with_random_state(Some(seed));
        }
        if let Some(jobs) = self.jobs {
            config = config.with_n_jobs(jobs);
        }
        if let Some(top) = self.top {
            config = config.with_top_n(top);
        }
        config
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_score(
    data_path: &Path,
    trusted_path: Option<&Path>,
    config_path: Option<&Path>,
    overrides: &ScoreOverrides,
    output: Option<&Path>,
    timeline: Option<&Path>,
    model_out: Option<&Path>,
) -> anyhow::Result<()> {
    section("Score");

    let base = match config_path {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };
    let config = overrides.apply(base);
    config.validate()?;

    step_run("Loading login attempts");
    let start = Instant::now();
    let loader = RecordLoader::new();
    let records = loader.load_auto(data_path)?;
    step_done(&format!("{} records in {:?}", records.len(), start.elapsed()));

    let mut source = InMemorySource::new(records).with_policy(config.trust.clone());
    if let Some(path) = trusted_path {
        step_run("Loading trusted set");
        let trusted = loader.load_auto(path)?;
        step_done(&format!("{} records", trusted.len()));
        source = source.with_trusted(trusted);
    }

    step_run(&format!("Training {} trees", config.n_estimators.to_string().cyan()));
    let pipeline = ScoringPipeline::new(config.clone());
    let outcome = pipeline.run_source(&source)?;
    step_done(&format!("{} ms", outcome.summary.elapsed_ms));

    if outcome.used_fallback_training {
        step_warn("No trusted records; the model was trained on all records");
    }

    print_summary(
        outcome.summary.n_records,
        Some(outcome.summary.n_training),
        outcome.summary.n_flagged,
        outcome.summary.threshold,
    );
    print_ranked(&outcome.ranked(config.top_n));

    if let Some(path) = output {
        let ranked = rank_by_score(&outcome.scored);
        ReportWriter::new().write_path(path, ranked)?;
        step_ok(&format!("Report → {}", path.display()));
    }
    if let Some(path) = timeline {
        ReportWriter::new().write_path(path, outcome.time_ordered())?;
        step_ok(&format!("Timeline → {}", path.display()));
    }
    if let Some(path) = model_out {
        outcome.bundle.save(path)?;
        step_ok(&format!("Model → {}", path.display()));
    }

    println!();
    Ok(())
}

pub fn cmd_rescore(
    model_path: &Path,
    data_path: &Path,
    output: Option<&Path>,
    timeline: Option<&Path>,
    top: usize,
) -> anyhow::Result<()> {
    section("Rescore");

    step_run("Loading model bundle");
    let bundle = ModelBundle::load(model_path)?;
    step_done(&format!(
        "{} trees, trained {}",
        bundle.forest.trees().len(),
        bundle.metadata.trained_at.format("%Y-%m-%d %H:%M")
    ));

    step_run("Loading login attempts");
    let mut records = RecordLoader::new().load_auto(data_path)?;
    records.sort_by_key(|r| r.created_at);
    step_done(&format!("{} records", records.len()));

    step_run("Scoring");
    let start = Instant::now();
    let scored = bundle.score_records(&FeatureEngineer::new(), &records)?;
    step_done(&format!("{:?}", start.elapsed()));

    let n_flagged = scored.iter().filter(|s| s.is_anomaly).count();
    print_summary(scored.len(), None, n_flagged, bundle.forest.decision_threshold());

    let ranked = rank_by_score(&scored);
    print_ranked(&ranked[..top.min(ranked.len())]);

    if let Some(path) = output {
        ReportWriter::new().write_path(path, ranked)?;
        step_ok(&format!("Report → {}", path.display()));
    }
    if let Some(path) = timeline {
        // `records` was sorted by created_at before scoring
        ReportWriter::new().write_path(path, &scored)?;
        step_ok(&format!("Timeline → {}", path.display()));
    }

    println!();
    Ok(())
}

fn print_summary(n_records: usize, n_training: Option<usize>, n_flagged: usize, threshold: f64) {
    println!();
    line_box_top();
    line_box_center(&"Login Anomaly Summary".white().bold().to_string());
    line_box_sep();
    line_box(&kv("Records", &n_records.to_string()));
    if let Some(n) = n_training {
        line_box(&kv("Training records", &n.to_string()));
    }
    let flagged = if n_flagged > 0 {
        alert(&n_flagged.to_string()).to_string()
    } else {
        ok("0").to_string()
    };
    line_box(&format!("{} {}", muted(&format!("{:<18}", "Flagged")), flagged));
    line_box(&kv("Threshold", &format!("{:.4}", threshold)));
    line_box_bottom();
}

fn print_ranked(rows: &[&ScoredRecord]) {
    if rows.is_empty() {
        return;
    }
    section(&format!("Top {} by anomaly score", rows.len()));
    println!(
        "  {}",
        muted(&format!(
            "{:<4} {:<12} {:<16} {:<18} {:<20} {:>7} {}",
            "#", "id", "ip", "country/city", "asn", "score", ""
        ))
    );
    for (rank, row) in rows.iter().enumerate() {
        let r = &row.record;
        let place = format!(
            "{}/{}",
            r.country.as_deref().unwrap_or("-"),
            r.city.as_deref().unwrap_or("-")
        );
        let line = format!(
            "{:<4} {:<12} {:<16} {:<18} {:<20} {:>7.4}",
            rank + 1,
            truncate(&r.id, 12),
            truncate(r.ip_address.as_deref().unwrap_or("-"), 16),
            truncate(&place, 18),
            truncate(r.asn.as_deref().unwrap_or("-"), 20),
            row.anomaly_score,
        );
        if row.is_anomaly {
            println!("  {} {}", line.white(), alert("anomaly"));
        } else {
            println!("  {}", line.white());
        }
    }
}
