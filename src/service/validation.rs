//! Input rules applied at the service boundary, before the store is reached.

use regex::Regex;
use serde::de::IgnoredAny;

use crate::core::{Result, StoreError};

pub const MAX_FORM_TYPE_CHARS: usize = 50;
pub const MAX_PAYLOAD_CHARS: usize = 100_000;
pub const MAX_SEARCH_CHARS: usize = 200;
pub const MAX_PAGE_SIZE: usize = 200;

lazy_static::lazy_static! {
    static ref FORM_TYPE_PATTERN: Regex = Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid form type pattern");
}

pub fn validate_form_type(form_type: &str) -> Result<()> {
    if form_type.trim().is_empty() {
        return Err(StoreError::validation("form type must not be blank"));
    }
    if form_type.chars().count() > MAX_FORM_TYPE_CHARS {
        return Err(StoreError::validation(format!(
            "form type must be at most {MAX_FORM_TYPE_CHARS} characters"
        )));
    }
    if !FORM_TYPE_PATTERN.is_match(form_type) {
        return Err(StoreError::validation(
            "form type must be alphanumeric, underscores or hyphens",
        ));
    }
    Ok(())
}

/// Checks size and JSON well-formedness without building a value tree.
///
/// The size limit applies to the trimmed text, which is what gets stored.
pub fn validate_payload(payload: &str) -> Result<()> {
    if payload.trim().chars().count() > MAX_PAYLOAD_CHARS {
        return Err(StoreError::validation("payload exceeds allowed size"));
    }
    serde_json::from_str::<IgnoredAny>(payload)
        .map_err(|err| StoreError::validation(format!("payload must contain valid JSON: {err}")))?;
    Ok(())
}

pub fn validate_page(page: usize, page_size: usize) -> Result<()> {
    if page < 1 {
        return Err(StoreError::validation("page must be >= 1"));
    }
    if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
        return Err(StoreError::validation(format!(
            "page size must be between 1 and {MAX_PAGE_SIZE}"
        )));
    }
    Ok(())
}

pub fn validate_search(search: Option<&str>) -> Result<()> {
    match search {
        Some(term) if term.chars().count() > MAX_SEARCH_CHARS => {
            Err(StoreError::validation("search term too long"))
        }
        _ => Ok(()),
    }
}
