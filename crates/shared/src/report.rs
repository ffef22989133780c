use chrono::{DateTime, Local};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::AgentError;
use crate::models::{Record, Status};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Html,
    Org,
}

impl ReportFormat {
    /// `.org` files get org-mode, everything else HTML
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("org") => ReportFormat::Org,
            _ => ReportFormat::Html,
        }
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "html" => Ok(ReportFormat::Html),
            "org" => Ok(ReportFormat::Org),
            other => Err(format!("Unknown report format: {}. Use 'html' or 'org'", other)),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportFormat::Html => f.write_str("html"),
            ReportFormat::Org => f.write_str("org"),
        }
    }
}

/// Renders processed records; every other record is skipped.
pub struct SnippetReport;

impl SnippetReport {
    pub fn render(format: ReportFormat, records: &[Record], generated_at: DateTime<Local>) -> String {
        match format {
            ReportFormat::Html => Self::generate_html(records, generated_at),
            ReportFormat::Org => Self::generate_org(records, generated_at),
        }
    }

    fn processed(records: &[Record]) -> impl Iterator<Item = &Record> {
        records.iter().filter(|r| r.status() == Status::Processed)
    }

    fn headline(records: &[Record], generated_at: DateTime<Local>) -> String {
        format!(
            "Generated {} ({} of {} sources processed)",
            generated_at.format("%a %-d %b %Y at %H:%M"),
            Self::processed(records).count(),
            records.len()
        )
    }

    pub fn generate_html(records: &[Record], generated_at: DateTime<Local>) -> String {
        let mut html = String::new();

        html.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
        html.push_str("  <meta charset=\"UTF-8\">\n");
        html.push_str("  <title>AI Generated Snippets</title>\n");
        html.push_str("  <style>\n");
        html.push_str("    body { font-family: Arial, sans-serif; max-width: 900px; margin: 40px auto; padding: 0 20px; line-height: 1.6; }\n");
        html.push_str("    h1 { color: #2c3e50; border-bottom: 3px solid #3498db; padding-bottom: 10px; }\n");
        html.push_str("    h2 { color: #34495e; padding: 10px; background-color: #ecf0f1; border-left: 4px solid #3498db; word-break: break-all; }\n");
        html.push_str("    h3 { color: #2c3e50; margin-top: 20px; }\n");
        html.push_str("    .generated { color: #7f8c8d; font-size: 0.9em; }\n");
        html.push_str("    .link { color: #3498db; text-decoration: none; }\n");
        html.push_str("    section.snippet { page-break-after: always; }\n");
        html.push_str("    hr { border: none; border-top: 1px solid #ddd; margin: 30px 0; }\n");
        html.push_str("  </style>\n");
        html.push_str("</head>\n<body>\n");

        html.push_str("<h1>AI Generated Snippets</h1>\n");
        html.push_str(&format!(
            "<p class=\"generated\">{}</p>\n",
            Self::escape_html(&Self::headline(records, generated_at))
        ));

        for record in Self::processed(records) {
            html.push_str("<section class=\"snippet\">\n");
            html.push_str(&format!(
                "  <h2>URL: <a href=\"{}\" class=\"link\" target=\"_blank\">{}</a></h2>\n",
                Self::escape_html(record.source()),
                Self::escape_html(record.source())
            ));
            html.push_str("  <h3>Title</h3>\n");
            html.push_str(&format!("  <p>{}</p>\n", Self::escape_html(record.title())));
            html.push_str("  <h3>SEO Keywords</h3>\n");
            html.push_str(&format!(
                "  <p>{}</p>\n",
                Self::escape_html(&record.keywords().join(", "))
            ));
            html.push_str("  <h3>Final Summary</h3>\n");
            html.push_str(&format!(
                "  <p>{}</p>\n",
                Self::escape_html(record.final_summary())
            ));
            html.push_str("</section>\n<hr>\n");
        }

        html.push_str("</body>\n</html>");
        html
    }

    pub fn generate_org(records: &[Record], generated_at: DateTime<Local>) -> String {
        let mut org = String::new();

        org.push_str("#+TITLE: AI Generated Snippets\n");
        org.push_str(&format!("#+DATE: {}\n\n", generated_at.format("%a, %-d %B %Y")));
        org.push_str(&format!("{}\n\n", Self::headline(records, generated_at)));

        for record in Self::processed(records) {
            org.push_str(&format!("* URL: {}\n\n", record.source()));
            org.push_str(&format!("** Title\n{}\n\n", record.title()));
            org.push_str(&format!("** SEO Keywords\n{}\n\n", record.keywords().join(", ")));
            org.push_str(&format!("** Final Summary\n{}\n\n", record.final_summary()));
        }

        org
    }

    fn escape_html(text: &str) -> String {
        text.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
            .replace('"', "&quot;")
            .replace('\'', "&#39;")
    }

    /// Persist a rendered report. Failure never touches record status.
    pub fn save(content: &str, path: &Path) -> Result<PathBuf, AgentError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| AgentError::WriteFailed(format!("{}: {}", parent.display(), e)))?;
        }

        fs::write(path, content)
            .map_err(|e| AgentError::WriteFailed(format!("{}: {}", path.display(), e)))?;

        Ok(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentType, Enrichment, ExtractedContent};
    use chrono::TimeZone;

    fn processed(source: &str, title: &str) -> Record {
        let mut record = Record::new(source);
        record.classify(ContentType::WebPage).unwrap();
        record
            .mark_extracted(ExtractedContent::new(title, "body"))
            .unwrap();
        record
            .mark_processed(Enrichment {
                summary: "summary".to_string(),
                keywords: vec!["alpha".to_string(), "beta".to_string()],
                final_summary: "Final words.".to_string(),
                degraded: false,
            })
            .unwrap();
        record
    }

    fn failed(source: &str) -> Record {
        let mut record = Record::new(source);
        record
            .fail(&AgentError::ClassificationFailed(source.to_string()))
            .unwrap();
        record
    }

    fn date() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 2, 1, 12, 0, 0).unwrap()
    }

    // ==================== HTML Escaping Tests ====================

    #[test]
    fn test_escape_html_combined() {
        assert_eq!(
            SnippetReport::escape_html("<a href=\"test\">Click & Go</a>"),
            "&lt;a href=&quot;test&quot;&gt;Click &amp; Go&lt;/a&gt;"
        );
    }

    #[test]
    fn test_escape_html_single_quotes() {
        assert_eq!(SnippetReport::escape_html("It's here"), "It&#39;s here");
    }

    // ==================== HTML Generation Tests ====================

    #[test]
    fn test_generate_html_contains_processed_records() {
        let records = vec![processed("https://example.com/a", "First Story")];
        let html = SnippetReport::generate_html(&records, date());

        assert!(html.contains("AI Generated Snippets"));
        assert!(html.contains("https://example.com/a"));
        assert!(html.contains("First Story"));
        assert!(html.contains("alpha, beta"));
        assert!(html.contains("Final words."));
        assert!(html.contains("1 of 1 sources processed"));
    }

    #[test]
    fn test_generate_html_skips_failed_records() {
        let records = vec![
            processed("https://example.com/a", "Kept"),
            failed("https://broken.example/b"),
        ];
        let html = SnippetReport::generate_html(&records, date());

        assert!(html.contains("Kept"));
        assert!(!html.contains("broken.example"));
        assert!(html.contains("1 of 2 sources processed"));
    }

    #[test]
    fn test_generate_html_escapes_special_chars() {
        let records = vec![processed("https://example.com/?a=1&b=2", "Apple & <Google>")];
        let html = SnippetReport::generate_html(&records, date());

        assert!(html.contains("Apple &amp; &lt;Google&gt;"));
        assert!(html.contains("https://example.com/?a=1&amp;b=2"));
    }

    // ==================== Org Mode Generation Tests ====================

    #[test]
    fn test_generate_org() {
        let records = vec![processed("https://example.com/a", "Story Title"), failed("x")];
        let org = SnippetReport::generate_org(&records, date());

        assert!(org.contains("#+TITLE: AI Generated Snippets"));
        assert!(org.contains("#+DATE: Sun, 1 February 2026"));
        assert!(org.contains("* URL: https://example.com/a"));
        assert!(org.contains("** Title\nStory Title"));
        assert!(org.contains("** SEO Keywords\nalpha, beta"));
        assert!(org.contains("** Final Summary\nFinal words."));
        assert!(!org.contains("* URL: x"));
    }

    // ==================== Format and Save Tests ====================

    #[test]
    fn test_format_from_path_and_str() {
        assert_eq!(ReportFormat::from_path(Path::new("out.ORG")), ReportFormat::Org);
        assert_eq!(ReportFormat::from_path(Path::new("out.html")), ReportFormat::Html);
        assert_eq!("org".parse::<ReportFormat>(), Ok(ReportFormat::Org));
        assert!("docx".parse::<ReportFormat>().is_err());
    }

    #[test]
    fn test_save_reports_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();

        let err = SnippetReport::save("content", &blocker.join("report.html")).unwrap_err();
        assert!(matches!(err, AgentError::WriteFailed(_)));
    }

    #[test]
    fn test_save_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("report.html");

        let saved = SnippetReport::save("content", &path).unwrap();

        assert_eq!(saved, path);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "content");
    }
}
