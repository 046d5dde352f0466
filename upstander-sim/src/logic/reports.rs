use anyhow::Result;
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;
use std::collections::BTreeSet;
use std::io::Write;

use upstander_engine::{AggregateMetrics, CriterionOutcome, JourneyRecord, JourneyStore};

use super::survey::RATING_QUESTIONS;

/// Excerpts listed per theme in human-readable reports.
const EXCERPTS_PER_THEME: usize = 3;

/// Everything a finished run reports on.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub title: String,
    pub strategy: String,
    pub seed: u64,
    pub generated_at: DateTime<Utc>,
    pub abandoned: usize,
    pub metrics: AggregateMetrics,
    pub journeys: JourneyStore,
}

fn percent(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

fn observed(outcome: &CriterionOutcome) -> String {
    outcome
        .observed
        .map_or_else(|| "n/a".to_string(), |value| format!("{value:.2}"))
}

fn status_text(outcome: &CriterionOutcome) -> &'static str {
    match (outcome.passed(), outcome.failure) {
        (true, _) => "PASS",
        (false, Some(upstander_engine::FailureCause::InsufficientData)) => "FAIL (insufficient data)",
        (false, _) => "FAIL",
    }
}

pub fn generate_console_report(out: &mut dyn Write, report: &RunReport) -> Result<()> {
    let metrics = &report.metrics;
    writeln!(out)?;
    writeln!(out, "{}", format!("📊 {} Study Results", report.title).bright_cyan().bold())?;
    writeln!(out, "{}", "==============================".cyan())?;
    writeln!(out, "Strategy: {} (seed {})", report.strategy, report.seed)?;
    writeln!(
        out,
        "Journeys: {}/{} completed ({})",
        metrics.completed_journeys,
        metrics.total_journeys,
        percent(metrics.completion_rate)
    )?;
    if report.abandoned > 0 {
        writeln!(out, "Abandoned: {}", report.abandoned.to_string().yellow())?;
    }
    if let Some(time) = metrics.time_minutes {
        writeln!(
            out,
            "Time: mean {:.1} min (range {:.1}-{:.1})",
            time.mean, time.min, time.max
        )?;
    }
    for (label, count) in &metrics.outcome_counts {
        writeln!(out, "   {label}: {count}")?;
    }
    writeln!(out)?;

    writeln!(out, "{}", "🎯 Success Criteria".bright_yellow().bold())?;
    for (name, outcome) in &metrics.success_criteria_status {
        let status = if outcome.passed() {
            "✅ PASS".green()
        } else {
            "❌ FAIL".red()
        };
        writeln!(
            out,
            "{status} {} {} {} (observed {})",
            name.bold(),
            outcome.metric,
            outcome.threshold,
            observed(outcome)
        )?;
    }
    writeln!(out)?;

    if !metrics.per_dimension_means.is_empty() {
        writeln!(out, "{}", "⭐ Ratings".bright_yellow().bold())?;
        for (dimension, mean) in &metrics.per_dimension_means {
            let pass = metrics
                .per_dimension_pass_pct
                .get(dimension)
                .copied()
                .unwrap_or_default();
            writeln!(out, "   {dimension}: {mean:.2}/5 ({} rated 4-5)", percent(pass))?;
        }
        writeln!(out)?;
    }

    if !metrics.skill_stats.is_empty() {
        writeln!(out, "{}", "🧠 Skills".bright_yellow().bold())?;
        for (skill, summary) in &metrics.skill_stats {
            writeln!(
                out,
                "   {skill}: mean {:.2}, median {:.1}, sd {:.2}",
                summary.mean, summary.median, summary.std_dev
            )?;
        }
        writeln!(out)?;
    }

    for (name, tally) in &metrics.keyword_tallies {
        writeln!(
            out,
            "{}",
            format!("🗣️ {name} ({} responses)", tally.responses)
                .bright_yellow()
                .bold()
        )?;
        for (label, count) in &tally.counts {
            writeln!(out, "   {label}: {count}")?;
        }
        writeln!(out)?;
    }

    let verdict = if metrics.all_criteria_passed() {
        "All success criteria met".green().bold()
    } else {
        format!(
            "{}/{} success criteria met",
            metrics.criteria_passed(),
            metrics.success_criteria_status.len()
        )
        .red()
        .bold()
    };
    writeln!(out, "{verdict}")?;
    Ok(())
}

pub fn generate_json_report(out: &mut dyn Write, report: &RunReport) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, report)?;
    writeln!(out)?;
    Ok(())
}

pub fn generate_markdown_report(out: &mut dyn Write, report: &RunReport) -> Result<()> {
    let metrics = &report.metrics;
    writeln!(out, "# {} Study Results\n", report.title)?;
    writeln!(
        out,
        "_Generated {} with strategy **{}**, seed {}._\n",
        report.generated_at.format("%Y-%m-%d %H:%M UTC"),
        report.strategy,
        report.seed
    )?;

    writeln!(out, "## Summary\n")?;
    writeln!(out, "- **Journeys**: {}", metrics.total_journeys)?;
    writeln!(
        out,
        "- **Completed**: {} ({})",
        metrics.completed_journeys,
        percent(metrics.completion_rate)
    )?;
    if report.abandoned > 0 {
        writeln!(out, "- **Abandoned**: {}", report.abandoned)?;
    }
    if let Some(time) = metrics.time_minutes {
        writeln!(
            out,
            "- **Time**: mean {:.1} min, median {:.1} min, range {:.1}-{:.1} min",
            time.mean, time.median, time.min, time.max
        )?;
    }
    writeln!(out)?;

    writeln!(out, "## Success Criteria\n")?;
    writeln!(out, "| Criterion | Metric | Threshold | Observed | Status |")?;
    writeln!(out, "|---|---|---|---|---|")?;
    for (name, outcome) in &metrics.success_criteria_status {
        writeln!(
            out,
            "| {name} | {} | {} | {} | {} |",
            outcome.metric,
            outcome.threshold,
            observed(outcome),
            status_text(outcome)
        )?;
    }
    writeln!(out)?;

    if !metrics.per_dimension_means.is_empty() {
        writeln!(out, "## Ratings\n")?;
        writeln!(out, "| Dimension | Mean | Median | Rated 4-5 | Responses |")?;
        writeln!(out, "|---|---|---|---|---|")?;
        for (dimension, mean) in &metrics.per_dimension_means {
            let median = metrics.per_dimension_medians.get(dimension).copied().unwrap_or_default();
            let pass = metrics.per_dimension_pass_pct.get(dimension).copied().unwrap_or_default();
            let count = metrics.per_dimension_counts.get(dimension).copied().unwrap_or_default();
            writeln!(
                out,
                "| {dimension} | {mean:.2} | {median:.1} | {} | {count} |",
                percent(pass)
            )?;
        }
        writeln!(out)?;
    }

    if !metrics.dimension_correlations.is_empty() {
        writeln!(out, "### Strongest correlations\n")?;
        for corr in &metrics.dimension_correlations {
            writeln!(
                out,
                "- {} ~ {}: r = {:.2} (n = {})",
                corr.first, corr.second, corr.coefficient, corr.samples
            )?;
        }
        writeln!(out)?;
    }

    if !metrics.skill_stats.is_empty() {
        writeln!(out, "## Skill Development\n")?;
        writeln!(out, "| Skill | Mean | Median | SD | Min | Max |")?;
        writeln!(out, "|---|---|---|---|---|---|")?;
        for (skill, s) in &metrics.skill_stats {
            writeln!(
                out,
                "| {skill} | {:.2} | {:.1} | {:.2} | {} | {} |",
                s.mean, s.median, s.std_dev, s.min, s.max
            )?;
        }
        writeln!(out)?;
    }

    if !metrics.choice_distribution.is_empty() {
        writeln!(out, "## Decision Patterns\n")?;
        for (node, options) in &metrics.choice_distribution {
            let total: usize = options.values().sum();
            writeln!(out, "### {node}\n")?;
            for (option, count) in options {
                #[allow(clippy::cast_precision_loss)]
                let share = *count as f64 / total.max(1) as f64;
                writeln!(out, "- {option}: {count} ({})", percent(share))?;
            }
            writeln!(out)?;
        }
    }

    for (name, tally) in &metrics.keyword_tallies {
        writeln!(out, "## Keyword Tally: {name}\n")?;
        writeln!(out, "- **Responses**: {}", tally.responses)?;
        for (label, count) in &tally.counts {
            writeln!(out, "- **{label}**: {count}")?;
        }
        writeln!(out)?;
        for sample in &tally.samples {
            writeln!(
                out,
                "> {} ({})\n",
                sample.text.replace('\n', " "),
                sample.persona_id
            )?;
        }
    }

    if metrics.theme_buckets.values().any(|bucket| !bucket.is_empty()) {
        writeln!(out, "## Themes\n")?;
        for (theme, excerpts) in &metrics.theme_buckets {
            if excerpts.is_empty() {
                continue;
            }
            writeln!(out, "### {theme} ({})\n", excerpts.len())?;
            for excerpt in excerpts.iter().take(EXCERPTS_PER_THEME) {
                writeln!(
                    out,
                    "> {} ({}, {})\n",
                    excerpt.text.replace('\n', " "),
                    excerpt.persona_id,
                    excerpt.field
                )?;
            }
        }
    }
    Ok(())
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// One row per journey. Skill columns cover every skill any journey touched.
pub fn generate_csv_report(out: &mut dyn Write, journeys: &JourneyStore) -> Result<()> {
    let skills: BTreeSet<&str> = journeys
        .iter()
        .flat_map(|record| record.final_skills().iter().map(|(skill, _)| skill))
        .collect();

    let mut header = vec![
        "persona_id".to_string(),
        "outcome".to_string(),
        "completed".to_string(),
        "elapsed_minutes".to_string(),
        "path".to_string(),
    ];
    header.extend(skills.iter().map(|skill| format!("skill_{skill}")));
    header.extend(RATING_QUESTIONS.iter().map(|(dimension, _)| (*dimension).to_string()));
    writeln!(out, "{}", header.join(","))?;

    for record in journeys {
        writeln!(out, "{}", csv_row(record, &skills).join(","))?;
    }
    Ok(())
}

fn csv_row(record: &JourneyRecord, skills: &BTreeSet<&str>) -> Vec<String> {
    let mut row = vec![
        csv_field(record.persona_id()),
        record.outcome().label().to_string(),
        record.completed().to_string(),
        format!("{:.2}", record.elapsed_minutes()),
        csv_field(&record.visited_node_ids().join(">")),
    ];
    row.extend(skills.iter().map(|skill| record.final_skills().get(skill).to_string()));
    row.extend(RATING_QUESTIONS.iter().map(|(dimension, _)| {
        record
            .feedback()
            .and_then(|feedback| feedback.rating(dimension))
            .map(|rating| rating.value().to_string())
            .unwrap_or_default()
    }));
    row
}
