use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::Batch;

/// One URL per line. Blank lines and `#` comments are skipped; everything
/// else is kept as typed, duplicates included.
pub fn parse_url_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Read a URL list file
pub fn read_url_file(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        anyhow::bail!("URL file not found: {}", path.display());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read URL file: {}", path.display()))?;

    Ok(parse_url_list(&content))
}

/// Save every record of a batch, failures included, as pretty JSON
pub fn save_records_json(batch: &Batch, path: &Path) -> Result<PathBuf> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let json = serde_json::to_string_pretty(batch).context("Failed to serialize records")?;

    fs::write(path, json)
        .with_context(|| format!("Failed to write records file: {}", path.display()))?;

    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentError;
    use crate::models::Record;

    #[test]
    fn test_parse_url_list_skips_blanks_and_comments() {
        let text = "https://a.com\n\n  # reading list\n  https://b.com/paper.pdf  \nhttps://a.com\n";

        assert_eq!(
            parse_url_list(text),
            vec!["https://a.com", "https://b.com/paper.pdf", "https://a.com"]
        );
    }

    #[test]
    fn test_read_missing_file() {
        let err = read_url_file(Path::new("/definitely/not/here.txt")).unwrap_err();
        assert!(err.to_string().contains("URL file not found"));
    }

    #[test]
    fn test_save_records_json_keeps_failures() {
        let dir = tempfile::tempdir().unwrap();
        let mut failed = Record::new("not-a-url");
        failed
            .fail(&AgentError::ClassificationFailed("not-a-url".into()))
            .unwrap();
        let batch = Batch::new(vec![failed]);

        let path = save_records_json(&batch, &dir.path().join("records.json")).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();

        assert_eq!(json["records"][0]["source"], "not-a-url");
        assert_eq!(json["records"][0]["status"], "Error");
        assert_eq!(json["records"][0]["error_kind"], "ClassificationFailed");
        assert!(json["records"][0].get("raw_text").is_none());
    }
}
