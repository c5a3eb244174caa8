use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use regex::Regex;

/// Pulls the acquisition timestamp out of study folder names such as
/// `20230714_101530_LSPINE`.
#[derive(Debug)]
pub(super) struct StudyDateParser {
    token: Regex,
}

impl StudyDateParser {
    pub(super) fn new() -> Result<Self> {
        Ok(Self {
            token: Regex::new(r"(\d{8})_(\d{6})")
                .context("failed to compile study date regex")?,
        })
    }

    /// Only the first token is considered; a token that is not a real
    /// calendar date yields `None`.
    pub(super) fn parse(&self, study_name: &str) -> Option<NaiveDateTime> {
        let captures = self.token.captures(study_name)?;
        let compact = format!("{}{}", captures.get(1)?.as_str(), captures.get(2)?.as_str());
        NaiveDateTime::parse_from_str(&compact, "%Y%m%d%H%M%S").ok()
    }
}
