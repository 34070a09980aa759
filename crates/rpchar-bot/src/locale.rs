//! Display locale for command names.

use serde::Deserialize;
use std::fmt;

/// Language used when rendering command names in help texts and suggestions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    De,
    En,
}

impl Locale {
    pub fn code(self) -> &'static str {
        match self {
            Locale::De => "de",
            Locale::En => "en",
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Localized names of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Names {
    pub de: String,
    pub en: String,
    pub alts: Vec<String>,
}

impl Names {
    pub fn new(de: impl Into<String>, en: impl Into<String>) -> Self {
        Self {
            de: de.into(),
            en: en.into(),
            alts: Vec::new(),
        }
    }

    pub fn with_alts<I, S>(mut self, alts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.alts.extend(alts.into_iter().map(Into::into));
        self
    }

    /// The canonical spelling for `locale`.
    pub fn get(&self, locale: Locale) -> &str {
        match locale {
            Locale::De => &self.de,
            Locale::En => &self.en,
        }
    }

    /// Every spelling, de and en first, duplicates removed.
    pub fn all(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::with_capacity(2 + self.alts.len());
        for name in [self.de.as_str(), self.en.as_str()]
            .into_iter()
            .chain(self.alts.iter().map(String::as_str))
        {
            if !names.iter().any(|n| n.eq_ignore_ascii_case(name)) && !name.is_empty() {
                names.push(name);
            }
        }
        names
    }

    /// Case-insensitive match against any spelling.
    pub fn matches(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.all().iter().any(|n| n.to_lowercase() == name)
    }
}
