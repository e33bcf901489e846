use crate::config::Config;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebBrowsingDecider {
    force_marker: String,
    staleness_phrases: Vec<String>,
}

impl WebBrowsingDecider {
    pub fn new(force_marker: impl Into<String>, staleness_phrases: &[String]) -> Self {
        Self {
            force_marker: force_marker.into(),
            staleness_phrases: staleness_phrases
                .iter()
                .map(|phrase| phrase.to_lowercase())
                .filter(|phrase| !phrase.is_empty())
                .collect(),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.force_search_marker.clone(), &cfg.staleness_phrases)
    }

    pub fn is_forced(&self, user_text: &str) -> bool {
        !self.force_marker.is_empty() && user_text.contains(&self.force_marker)
    }

    pub fn strip_marker(&self, user_text: &str) -> String {
        if self.force_marker.is_empty() {
            return user_text.trim().to_string();
        }
        user_text
            .replace(&self.force_marker, " ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn needs_live_data(&self, assistant_text: &str) -> bool {
        let lowered = assistant_text.to_lowercase();
        self.staleness_phrases
            .iter()
            .any(|phrase| lowered.contains(phrase.as_str()))
    }
}
