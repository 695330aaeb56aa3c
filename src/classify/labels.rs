use std::path::Path;

use anyhow::{anyhow, Result};

/// Parse a label list: one label per line, whitespace trimmed, blank lines skipped.
pub fn parse_labels(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Read a label file from disk.
pub fn load_labels(path: &Path) -> Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read label file {}: {}", path.display(), e))?;
    let labels = parse_labels(&raw);
    if labels.is_empty() {
        return Err(anyhow!("label file {} is empty", path.display()));
    }
    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parse_skips_blank_lines_and_trims() {
        let labels = parse_labels("background\n  tench \n\r\ngoldfish\r\n\n");
        assert_eq!(labels, vec!["background", "tench", "goldfish"]);
    }

    #[test]
    fn load_rejects_empty_file() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(b"\n\n")?;
        assert!(load_labels(file.path()).is_err());
        Ok(())
    }

    #[test]
    fn load_reads_labels() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(b"cat\ndog\n")?;
        assert_eq!(load_labels(file.path())?, vec!["cat", "dog"]);
        Ok(())
    }
}
