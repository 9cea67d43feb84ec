//! Class vocabulary for vocalization types.
//!
//! The class indices are fixed: they must line up with the output units of
//! the classifier head and with the annotation files, so they are part of
//! the crate's public contract rather than a config knob.

use crate::error::{Error, Result};

/// Number of vocalization classes.
pub const NUM_CLASSES: usize = 5;

/// Vocalization type, with the class index used by the classifier head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum VocalizationLabel {
    #[serde(rename = "Junk")]
    Junk = 0,
    #[serde(rename = "Non-Canonical")]
    NonCanonical = 1,
    #[serde(rename = "Canonical")]
    Canonical = 2,
    #[serde(rename = "Laughing")]
    Laughing = 3,
    #[serde(rename = "Crying")]
    Crying = 4,
}

impl VocalizationLabel {
    /// All labels in class-index order.
    pub const ALL: [VocalizationLabel; NUM_CLASSES] = [
        VocalizationLabel::Junk,
        VocalizationLabel::NonCanonical,
        VocalizationLabel::Canonical,
        VocalizationLabel::Laughing,
        VocalizationLabel::Crying,
    ];

    /// Class index of this label.
    pub fn as_index(self) -> usize {
        self as usize
    }

    /// Label for a class index, if it is in range.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Canonical annotation string.
    pub fn name(self) -> &'static str {
        match self {
            VocalizationLabel::Junk => "Junk",
            VocalizationLabel::NonCanonical => "Non-Canonical",
            VocalizationLabel::Canonical => "Canonical",
            VocalizationLabel::Laughing => "Laughing",
            VocalizationLabel::Crying => "Crying",
        }
    }

    /// Label for a canonical annotation string.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Junk" => Some(VocalizationLabel::Junk),
            "Non-Canonical" => Some(VocalizationLabel::NonCanonical),
            "Canonical" => Some(VocalizationLabel::Canonical),
            "Laughing" => Some(VocalizationLabel::Laughing),
            "Crying" => Some(VocalizationLabel::Crying),
            _ => None,
        }
    }
}

impl std::fmt::Display for VocalizationLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// How to treat annotation strings outside the vocabulary.
///
/// An empty annotation always means "unlabeled" and is never an error; the
/// policy only applies to non-empty strings that are not canonical names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelPolicy {
    /// Unknown labels are errors.
    #[default]
    Strict,
    /// Unknown labels are logged and coerced to [`VocalizationLabel::Junk`].
    CoerceToJunk,
}

impl LabelPolicy {
    /// Parses a raw annotation string under this policy.
    ///
    /// Returns `Ok(None)` for the empty string (unlabeled example).
    pub fn parse(self, id: &str, raw: &str) -> Result<Option<VocalizationLabel>> {
        if raw.is_empty() {
            return Ok(None);
        }
        match VocalizationLabel::from_name(raw) {
            Some(label) => Ok(Some(label)),
            None => match self {
                LabelPolicy::Strict => Err(Error::UnknownLabel {
                    id: id.to_string(),
                    label: raw.to_string(),
                }),
                LabelPolicy::CoerceToJunk => {
                    tracing::warn!("example {id}: unknown label '{raw}', coercing to Junk");
                    Ok(Some(VocalizationLabel::Junk))
                }
            },
        }
    }
}
