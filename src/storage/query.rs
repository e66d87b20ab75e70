//! Filter, search, ordering and pagination shared by every store.

use std::cmp::Ordering;

use crate::core::Submission;

pub const DEFAULT_TAKE: usize = 100;

/// Query over stored submissions.
///
/// Blank (empty or whitespace-only) `form_type` and `search` values are
/// ignored. Matching is case-insensitive; `search` is a plain substring test
/// against both the payload text and the form type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionQuery {
    pub form_type: Option<String>,
    pub search: Option<String>,
    pub skip: usize,
    pub take: usize,
}

impl Default for SubmissionQuery {
    fn default() -> Self {
        Self {
            form_type: None,
            search: None,
            skip: 0,
            take: DEFAULT_TAKE,
        }
    }
}

impl SubmissionQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn form_type(mut self, form_type: impl Into<String>) -> Self {
        self.form_type = Some(form_type.into());
        self
    }

    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    pub fn take(mut self, take: usize) -> Self {
        self.take = take;
        self
    }

    /// Sets `skip`/`take` from a 1-based page number.
    pub fn page(mut self, page: usize, page_size: usize) -> Self {
        self.skip = page.saturating_sub(1).saturating_mul(page_size);
        self.take = page_size;
        self
    }

    /// Lowercased form type filter, if one applies.
    pub fn form_type_key(&self) -> Option<String> {
        non_blank_key(self.form_type.as_deref())
    }

    /// Lowercased search term, if one applies.
    pub fn search_key(&self) -> Option<String> {
        non_blank_key(self.search.as_deref())
    }

    pub fn matches(&self, submission: &Submission) -> bool {
        Matcher::new(self).matches(submission)
    }

    /// Runs the full pipeline over an in-memory candidate set.
    pub fn apply<I>(&self, candidates: I) -> Vec<Submission>
    where
        I: IntoIterator<Item = Submission>,
    {
        let matcher = Matcher::new(self);
        let mut selected: Vec<Submission> = candidates
            .into_iter()
            .filter(|submission| matcher.matches(submission))
            .collect();

        selected.sort_by(newest_first);

        selected
            .into_iter()
            .skip(self.skip)
            .take(self.take)
            .collect()
    }
}

/// Descending by `submitted_at`; equal timestamps fall back to ascending id.
pub fn newest_first(left: &Submission, right: &Submission) -> Ordering {
    right
        .submitted_at
        .cmp(&left.submitted_at)
        .then_with(|| left.id.cmp(&right.id))
}

/// Ascending by `submitted_at`, the order used for the backing file.
pub fn oldest_first(left: &Submission, right: &Submission) -> Ordering {
    left.submitted_at
        .cmp(&right.submitted_at)
        .then_with(|| left.id.cmp(&right.id))
}

/// Case folding used by every backend for comparisons.
pub fn fold_case(value: &str) -> String {
    value.to_lowercase()
}

fn non_blank_key(value: Option<&str>) -> Option<String> {
    value
        .filter(|value| !value.trim().is_empty())
        .map(fold_case)
}

struct Matcher {
    form_type: Option<String>,
    search: Option<String>,
}

impl Matcher {
    fn new(query: &SubmissionQuery) -> Self {
        Self {
            form_type: query.form_type_key(),
            search: query.search_key(),
        }
    }

    fn matches(&self, submission: &Submission) -> bool {
        let form_type = fold_case(&submission.form_type);

        if let Some(expected) = &self.form_type
            && &form_type != expected
        {
            return false;
        }

        match &self.search {
            Some(term) => {
                fold_case(&submission.payload).contains(term.as_str())
                    || form_type.contains(term.as_str())
            }
            None => true,
        }
    }
}
