//! Markdown formatting of job reports and stored novels

use crate::crawler::{JobOutcome, JobReport};
use crate::storage::{ChapterRef, ChapterView, NovelSummary};

/// Formats a job report as markdown
///
/// Partial success is shown as counts plus the list of failed chapters,
/// never as a plain failure.
pub fn format_job_report(report: &JobReport) -> String {
    let mut md = String::new();

    md.push_str(&format!("# Crawl Job {}\n\n", report.job_id));
    md.push_str(&format!("- **Source**: {}\n", report.source_url));
    if let Some(key) = &report.novel_key {
        md.push_str(&format!("- **Novel**: {}\n", key));
    }

    let status = match &report.outcome {
        JobOutcome::Created(_) => "created".to_string(),
        JobOutcome::Refreshed(_) => "refreshed".to_string(),
        JobOutcome::Recovered(_) => "recovered".to_string(),
        JobOutcome::AlreadyExists { .. } => "already exists".to_string(),
        JobOutcome::Failed { reason } => format!("failed ({})", reason),
        JobOutcome::Cancelled { phase } => format!("cancelled during {}", phase),
    };
    md.push_str(&format!("- **Status**: {}\n", status));

    if let Some(tally) = report.outcome.tally() {
        md.push_str("\n## Chapters\n\n");
        md.push_str(&format!("- **Discovered**: {}\n", tally.discovered));
        md.push_str(&format!("- **Fetched**: {}\n", tally.fetched));
        md.push_str(&format!("- **Failed**: {}\n", tally.failed));

        if !tally.failures.is_empty() {
            md.push_str("\n## Failed Chapters\n\n");
            md.push_str("| Chapter | URL | Error |\n");
            md.push_str("|---------|-----|-------|\n");
            for failure in &tally.failures {
                md.push_str(&format!(
                    "| {} | {} | {} |\n",
                    failure.key.chapter_id, failure.url, failure.error
                ));
            }
        }
    }

    md
}

/// Formats a catalog as a markdown table in ordinal order
pub fn format_catalog(novel_key: &str, chapters: &[ChapterRef]) -> String {
    let mut md = format!("# {}\n\n", novel_key);

    if chapters.is_empty() {
        md.push_str("No chapters.\n");
        return md;
    }

    md.push_str("| # | Chapter | Key |\n");
    md.push_str("|---|---------|-----|\n");
    for chapter in chapters {
        md.push_str(&format!(
            "| {} | {} | {} |\n",
            chapter.ordinal,
            chapter.title,
            chapter.key()
        ));
    }
    md
}

pub fn format_chapter(chapter: &ChapterView) -> String {
    format!(
        "# {}\n\n## {}. {}\n\n{}\n",
        chapter.novel_title, chapter.ordinal, chapter.title, chapter.text
    )
}

/// Formats stored novels with their content coverage
pub fn format_novels(novels: &[NovelSummary]) -> String {
    if novels.is_empty() {
        return "No novels stored.\n".to_string();
    }

    let mut md = String::new();
    md.push_str("| ID | Novel | Chapters | Content | Pending | Source |\n");
    md.push_str("|----|-------|----------|---------|---------|--------|\n");
    for summary in novels {
        md.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} |\n",
            summary.novel.id,
            summary.novel.title,
            summary.chapter_count,
            summary.content_count,
            summary.pending_count(),
            summary.novel.source_url
        ));
    }
    md
}
