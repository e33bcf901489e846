use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};

use crate::model::Message;

pub fn write_history(dir: &Path, messages: &[Message], now: DateTime<Utc>) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create export directory '{}'", dir.display()))?;

    let path = dir.join(format!("{}.chatml.json", now.timestamp_millis()));
    let body = serde_json::to_string_pretty(messages).context("Failed to serialize history")?;
    fs::write(&path, body)
        .with_context(|| format!("Failed to write history export '{}'", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::Value;
    use std::fs;

    use super::write_history;
    use crate::model::Message;

    #[test]
    fn export_writes_role_and_content_records() {
        let dir = tempfile::tempdir().expect("tempdir");
        let now = Utc.timestamp_millis_opt(1_700_000_000_123).single().expect("valid");
        let messages = vec![Message::system("be brief"), Message::user("hi")];

        let path = write_history(dir.path(), &messages, now).expect("export");

        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some("1700000000123.chatml.json")
        );
        let parsed: Value =
            serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("json");
        assert_eq!(
            parsed,
            serde_json::json!([
                {"role": "system", "content": "be brief"},
                {"role": "user", "content": "hi"}
            ])
        );
    }

    #[test]
    fn export_creates_missing_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("a").join("b");
        let path = write_history(&nested, &[], Utc::now()).expect("export");
        assert!(path.starts_with(&nested));
        assert_eq!(fs::read_to_string(&path).expect("read"), "[]");
    }
}
