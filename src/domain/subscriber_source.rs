use std::fmt::Display;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

/// Where on the site a signup came from. Stored as text for attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubscriberSource {
    Popup,
    Footer,
    BlogCta,
    HomeCta,
}

impl SubscriberSource {
    pub const ALL: [SubscriberSource; 4] = [Self::Popup, Self::Footer, Self::BlogCta, Self::HomeCta];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Popup => "popup",
            Self::Footer => "footer",
            Self::BlogCta => "blog-cta",
            Self::HomeCta => "home-cta",
        }
    }
}

impl FromStr for SubscriberSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|source| source.as_str() == s)
            .ok_or_else(|| {
                let allowed: Vec<&str> = Self::ALL.iter().map(|s| s.as_str()).collect();
                format!("source must be one of: {}", allowed.join(", "))
            })
    }
}

impl Display for SubscriberSource {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
