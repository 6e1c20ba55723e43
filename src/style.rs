//! Summary styles.
//!
//! The style is the only knob the end user turns on the prompt itself. It is
//! parsed from free text at the service boundary and rejected there when it is
//! not recognised, so no provider ever sees an unknown style.

use crate::error::DigestError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a slide's text should be summarised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SummaryStyle {
    /// Two or three sentences on the key points. (default)
    #[default]
    Concise,
    /// One detailed paragraph covering everything important.
    Detailed,
    /// Three to five bullet points of takeaways.
    BulletPoints,
}

impl SummaryStyle {
    /// Every supported style, in display order.
    pub const ALL: [SummaryStyle; 3] = [
        SummaryStyle::Concise,
        SummaryStyle::Detailed,
        SummaryStyle::BulletPoints,
    ];

    /// Canonical identifier, as accepted by [`FromStr`].
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryStyle::Concise => "concise",
            SummaryStyle::Detailed => "detailed",
            SummaryStyle::BulletPoints => "bullet-points",
        }
    }

    /// The instruction placed in front of the slide text.
    pub fn instruction(&self) -> &'static str {
        match self {
            SummaryStyle::Concise => {
                "Provide a concise 2-3 sentence summary focusing on key points"
            }
            SummaryStyle::Detailed => {
                "Provide a detailed paragraph summarizing all important information"
            }
            SummaryStyle::BulletPoints => {
                "Provide a summary as 3-5 bullet points of the key takeaways"
            }
        }
    }
}

impl fmt::Display for SummaryStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SummaryStyle {
    type Err = DigestError;

    /// Case-insensitive; `_` and spaces are treated as `-` so
    /// "Bullet Points" and "bullet_points" both parse.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalised: String = s
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == '_' || c == ' ' { '-' } else { c })
            .collect();

        match normalised.as_str() {
            "concise" => Ok(SummaryStyle::Concise),
            "detailed" => Ok(SummaryStyle::Detailed),
            "bullet-points" | "bullets" | "bullet" => Ok(SummaryStyle::BulletPoints),
            _ => Err(DigestError::InvalidStyle {
                style: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_and_display_names() {
        assert_eq!("concise".parse::<SummaryStyle>().unwrap(), SummaryStyle::Concise);
        assert_eq!("Detailed".parse::<SummaryStyle>().unwrap(), SummaryStyle::Detailed);
        assert_eq!(
            "Bullet Points".parse::<SummaryStyle>().unwrap(),
            SummaryStyle::BulletPoints
        );
        assert_eq!(
            "bullet_points".parse::<SummaryStyle>().unwrap(),
            SummaryStyle::BulletPoints
        );
    }

    #[test]
    fn rejects_unknown_style() {
        let err = "haiku".parse::<SummaryStyle>().unwrap_err();
        assert!(matches!(err, DigestError::InvalidStyle { ref style } if style == "haiku"));
        assert!(err.is_caller_error());
    }

    #[test]
    fn instructions_are_distinct() {
        let mut seen: Vec<&str> = SummaryStyle::ALL.iter().map(|s| s.instruction()).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn round_trips_through_as_str() {
        for style in SummaryStyle::ALL {
            assert_eq!(style.as_str().parse::<SummaryStyle>().unwrap(), style);
        }
    }

    #[test]
    fn serde_uses_kebab_case() {
        let json = serde_json::to_string(&SummaryStyle::BulletPoints).unwrap();
        assert_eq!(json, "\"bullet-points\"");
    }
}
