//! SEARCH criteria and message sequence sets

use crate::error::{Error, Result};
use chrono::NaiveDate;
use std::fmt;

/// One element of a sequence set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqItem {
    Single(u32),
    Range(u32, u32),
    /// `n:*` -- from `n` to the highest number in the mailbox.
    RangeFrom(u32),
    /// `*` -- the highest number in the mailbox.
    Star,
}

impl fmt::Display for SeqItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(n) => write!(f, "{n}"),
            Self::Range(a, b) => write!(f, "{a}:{b}"),
            Self::RangeFrom(n) => write!(f, "{n}:*"),
            Self::Star => f.write_str("*"),
        }
    }
}

/// A non-empty message sequence set (`2,4:7,12:*`).
///
/// Message numbers and UIDs are never zero; constructors reject it
/// before anything reaches the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceSet(Vec<SeqItem>);

impl SequenceSet {
    pub fn single(n: u32) -> Result<Self> {
        if n == 0 {
            return Err(Error::InvalidArgument(
                "message numbers start at 1".to_string(),
            ));
        }
        Ok(Self(vec![SeqItem::Single(n)]))
    }

    pub fn range(start: u32, end: u32) -> Result<Self> {
        if start == 0 || end == 0 {
            return Err(Error::InvalidArgument(
                "message numbers start at 1".to_string(),
            ));
        }
        if start > end {
            return Err(Error::InvalidArgument(format!(
                "backwards range {start}:{end}"
            )));
        }
        Ok(Self(vec![SeqItem::Range(start, end)]))
    }

    /// `n:*`
    pub fn from_number_to_end(start: u32) -> Result<Self> {
        if start == 0 {
            return Err(Error::InvalidArgument(
                "message numbers start at 1".to_string(),
            ));
        }
        Ok(Self(vec![SeqItem::RangeFrom(start)]))
    }

    /// The whole mailbox, `1:*`.
    #[must_use]
    pub fn all() -> Self {
        Self(vec![SeqItem::RangeFrom(1)])
    }

    /// Normalize a list of ids into ascending unique ranges.
    ///
    /// `[5, 1, 2, 3, 9, 2]` becomes `1:3,5,9`.
    pub fn from_ids(ids: impl IntoIterator<Item = u32>) -> Result<Self> {
        let mut ids: Vec<u32> = ids.into_iter().collect();
        if ids.contains(&0) {
            return Err(Error::InvalidArgument(
                "message numbers start at 1".to_string(),
            ));
        }
        ids.sort_unstable();
        ids.dedup();
        if ids.is_empty() {
            return Err(Error::InvalidArgument("empty sequence set".to_string()));
        }

        let mut items = Vec::new();
        let mut start = ids[0];
        let mut end = ids[0];
        for &id in &ids[1..] {
            if id == end + 1 {
                end = id;
            } else {
                items.push(run(start, end));
                start = id;
                end = id;
            }
        }
        items.push(run(start, end));
        Ok(Self(items))
    }
}

fn run(start: u32, end: u32) -> SeqItem {
    if start == end {
        SeqItem::Single(start)
    } else {
        SeqItem::Range(start, end)
    }
}

impl fmt::Display for SequenceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, item) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{item}")?;
        }
        Ok(())
    }
}

/// A SEARCH criteria tree (RFC 3501 section 6.4.4).
///
/// `And` serializes as juxtaposition, the implicit conjunction of the
/// SEARCH grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchCriterion {
    All,
    Answered,
    Deleted,
    Draft,
    Flagged,
    New,
    Old,
    Recent,
    Seen,
    Unanswered,
    Undeleted,
    Undraft,
    Unflagged,
    Unseen,
    Bcc(String),
    Body(String),
    Cc(String),
    From(String),
    Subject(String),
    Text(String),
    To(String),
    Header(String, String),
    Keyword(String),
    Unkeyword(String),
    Larger(u32),
    Smaller(u32),
    Before(NaiveDate),
    On(NaiveDate),
    Since(NaiveDate),
    SentBefore(NaiveDate),
    SentOn(NaiveDate),
    SentSince(NaiveDate),
    Uid(SequenceSet),
    Sequence(SequenceSet),
    Not(Box<SearchCriterion>),
    Or(Box<SearchCriterion>, Box<SearchCriterion>),
    And(Vec<SearchCriterion>),
}

impl SearchCriterion {
    /// IMAP date syntax: `d-MMM-yyyy`, day not zero-padded.
    pub(crate) fn format_date(date: NaiveDate) -> String {
        date.format("%-d-%b-%Y").to_string()
    }
}
