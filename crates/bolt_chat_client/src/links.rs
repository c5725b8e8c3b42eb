//! Follow-up links shown under each completed reply.

use serde::{Deserialize, Serialize};

/// Encyclopedia language used when none is configured.
pub const DEFAULT_ENCYCLOPEDIA_LANG: &str = "ko";

/// Web search, video search and encyclopedia URLs for one prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Links {
    pub search: String,
    pub video: String,
    pub encyclopedia: String,
}

/// Builds [`Links`] by percent-encoding a prompt into fixed URL templates.
#[derive(Debug, Clone)]
pub struct LinkGenerator {
    encyclopedia_lang: String,
}

impl Default for LinkGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_ENCYCLOPEDIA_LANG)
    }
}

impl LinkGenerator {
    pub fn new(encyclopedia_lang: impl Into<String>) -> Self {
        let lang = encyclopedia_lang.into();
        let lang = lang.trim();
        Self {
            encyclopedia_lang: if lang.is_empty() {
                DEFAULT_ENCYCLOPEDIA_LANG.to_string()
            } else {
                lang.to_string()
            },
        }
    }

    pub fn links_for(&self, prompt: &str) -> Links {
        let q = urlencoding::encode(prompt);
        Links {
            search: format!("https://www.google.com/search?q={}", q),
            video: format!("https://www.youtube.com/results?search_query={}", q),
            encyclopedia: format!(
                "https://{}.wikipedia.org/wiki/{}",
                self.encyclopedia_lang, q
            ),
        }
    }
}
