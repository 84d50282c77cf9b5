//! Record, status and input-layout types shared by every stage of a run

use std::fmt;
use std::str::FromStr;

/// How control keys are derived for a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyMode {
    /// Key is `{document_type}.{sanitized(year.title)}.pdf`; the output
    /// tree itself acts as the status log.
    Metadata,
    /// Key is the raw DOI; statuses persist in the control log.
    Doi,
}

/// Column layout of an input batch, detected from its header width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputLayout {
    /// Merged export from several repositories (has a `Repository` column)
    RepositoryUnion,
    /// Export from a single repository
    RepositoryUnique,
    /// Bare `Item, DOI` list
    DoiList,
}

impl InputLayout {
    /// Detect layout from the number of columns in the header row
    pub fn from_column_count(columns: usize) -> Option<Self> {
        match columns {
            9 => Some(Self::RepositoryUnion),
            8 => Some(Self::RepositoryUnique),
            2 => Some(Self::DoiList),
            _ => None,
        }
    }

    pub fn key_mode(self) -> KeyMode {
        match self {
            Self::RepositoryUnion | Self::RepositoryUnique => KeyMode::Metadata,
            Self::DoiList => KeyMode::Doi,
        }
    }

    pub fn has_repository(self) -> bool {
        matches!(self, Self::RepositoryUnion)
    }
}

impl fmt::Display for InputLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RepositoryUnion => "repository_union",
            Self::RepositoryUnique => "repository_unique",
            Self::DoiList => "doi_list",
        })
    }
}

/// Retrieval status of a control key.
///
/// "Unknown" (never attempted, nothing on disk) is not a variant: it is
/// the absence of an entry, i.e. `Option<Status>::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Artifact present and verified
    Ok,
    /// Last attempt failed; retried on every run
    NotAvailable,
    /// Record has no DOI; never attempted
    Nonexistent,
}

impl Status {
    /// Label written to the control log and the summary artifact.
    pub fn label(self) -> &'static str {
        match self {
            Self::Ok => "Ok",
            Self::NotAvailable => "Not available",
            Self::Nonexistent => "Non-existent",
        }
    }

    /// Terminal statuses are never re-attempted.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ok | Self::Nonexistent)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Status label that matches none of the known statuses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown status label: {:?}", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for Status {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Ok" => Ok(Self::Ok),
            "Not available" => Ok(Self::NotAvailable),
            "Non-existent" => Ok(Self::Nonexistent),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// One bibliographic entry of the input batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    /// 1-based ordinal, stable within a run
    pub index: usize,
    pub title: Option<String>,
    pub year: Option<i32>,
    pub doi: Option<String>,
    pub document_type: Option<String>,
    // Passthrough metadata, reporting only
    pub language: Option<String>,
    pub cited_by: Option<u64>,
    pub authors: Option<String>,
    pub repository: Option<String>,
}

impl Record {
    /// DOI if present and non-blank.
    pub fn doi(&self) -> Option<&str> {
        self.doi.as_deref().map(str::trim).filter(|d| !d.is_empty())
    }

    /// Short human label for log lines: title in metadata mode, DOI otherwise.
    pub fn label(&self, mode: KeyMode) -> &str {
        match mode {
            KeyMode::Metadata => self.title.as_deref().unwrap_or("(untitled)"),
            KeyMode::Doi => self.doi().unwrap_or("(no DOI)"),
        }
    }
}
