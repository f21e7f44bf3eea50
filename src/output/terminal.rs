// Colored terminal output for stage summaries and the labelled-data report.
//
// main.rs prints through these functions; tracing handles the detailed
// per-item diagnostics.

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use crate::classifier::labeler::LabelStats;
use crate::classifier::Classification;
use crate::db::models::{Label, LabelledView};
use crate::pipeline::ConnectorStats;
use crate::quality::QualityReport;
use crate::report::Summary;

/// A bar for long-running loops ("  Labeling [=====>    ] 40/100 (12s)").
pub fn progress_bar(len: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    let style = ProgressStyle::default_bar()
        .template(&format!("  {label} [{{bar:30}}] {{pos}}/{{len}} ({{eta}})"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}

/// Per-connector results of a scrape.
pub fn display_connector_stats(stats: &[ConnectorStats]) {
    println!("\n{}", "=== Scrape ===".bold());

    if stats.is_empty() {
        println!("  No connectors enabled. Check HATEWATCH_SOURCES.");
        return;
    }

    println!(
        "  {:<10} {:>8} {:>8} {:>10}  {}",
        "Source".dimmed(),
        "Emitted".dimmed(),
        "New".dimmed(),
        "Duplicate".dimmed(),
        "Status".dimmed(),
    );
    println!("  {}", "-".repeat(60).dimmed());

    for s in stats {
        let status = match &s.error {
            Some(e) => format!("stopped: {}", super::truncate_chars(e, 60)).red().to_string(),
            None => "ok".green().to_string(),
        };
        println!(
            "  {:<10} {:>8} {:>8} {:>10}  {}",
            s.name, s.emitted, s.inserted, s.duplicates, status
        );
    }
}

pub fn display_quality_report(report: &QualityReport) {
    println!("\n{}", "=== Clean ===".bold());
    println!("  Rows loaded:          {}", report.rows_loaded);
    println!("  Dropped (null title): {}", report.rows_dropped_null_title);
    println!("  Rows written:         {}", report.rows_written);
    println!();

    for expectation in &report.expectations {
        let mark = if expectation.passed {
            "pass".green()
        } else {
            "FAIL".red().bold()
        };
        println!("  [{}] {}", mark, expectation.name.replace('_', " "));
    }

    println!(
        "\n  Titles with special characters cleaned: {} ({:.1}%)",
        report.special_char_titles,
        report.special_char_fraction * 100.0
    );
}

pub fn display_label_stats(stats: &LabelStats) {
    println!("\n{}", "=== Label ===".bold());
    println!("  Posts sent:     {}", stats.total);
    println!(
        "  Labelled:       {} ({} cyberhate, {} neutral)",
        stats.labelled(),
        stats.cyberhate.to_string().red(),
        stats.neutral.to_string().green()
    );
    if stats.indeterminate > 0 {
        println!("  Indeterminate:  {}", stats.indeterminate.to_string().yellow());
    }
    if stats.failed > 0 {
        println!("  Failed calls:   {}", stats.failed.to_string().red());
    }
}

pub fn display_classification(text: &str, classification: &Classification) {
    let label = match classification.label {
        Label::Cyberhate => classification.label.to_string().red().bold(),
        Label::Neutral => classification.label.to_string().green(),
    };
    println!("\n  \"{}\"", super::truncate_chars(text, 120).dimmed());
    println!("  Label:      {}", label);
    println!("  Confidence: {:.2}%", classification.confidence * 100.0);
}

/// The labelled-data report: headline numbers, per-community split, recent rows.
pub fn display_report(summary: &Summary, recent: &[LabelledView]) {
    if summary.total_posts == 0 {
        println!("No labelled posts yet. Run `hatewatch run` (or scrape, clean, label) first.");
        return;
    }

    println!("\n{}", "=== Cyberbullying Report ===".bold());
    println!("  Total posts:            {}", summary.total_posts);
    match summary.cyberhate_percent {
        Some(pct) => println!("  % cyberhate:            {:.1}%", pct),
        None => println!("  % cyberhate:            n/a"),
    }
    println!(
        "  Most active community:  {}",
        summary.most_active_community.as_deref().unwrap_or("n/a")
    );
    println!(
        "  Top platform:           {}",
        summary.top_platform.as_deref().unwrap_or("n/a")
    );
    if let (Some(hate), Some(neutral)) = (summary.avg_comments_cyberhate, summary.avg_comments_neutral) {
        println!(
            "  Avg comments:           {:.1} cyberhate / {:.1} neutral",
            hate, neutral
        );
    }

    println!("\n  {:<24} {:>9} {:>8}", "Community".dimmed(), "Cyberhate".dimmed(), "Neutral".dimmed());
    println!("  {}", "-".repeat(43).dimmed());
    for c in &summary.communities {
        println!("  {:<24} {:>9} {:>8}", c.community, c.cyberhate, c.neutral);
    }

    if recent.is_empty() {
        return;
    }

    println!("\n{}", format!("=== Most recent ({}) ===", recent.len()).bold());
    for row in recent {
        let label = match row.label {
            Some(Label::Cyberhate) => "1".red().bold(),
            Some(Label::Neutral) => "0".green(),
            None => "?".dimmed(),
        };
        let topic = row.topic.as_deref().unwrap_or("");
        println!(
            "  [{}] {} {:<8} {:<14} {}",
            label,
            row.timestamp.dimmed(),
            row.platform,
            super::truncate_chars(&row.community, 14),
            super::truncate_chars(topic, 80)
        );
    }
}
