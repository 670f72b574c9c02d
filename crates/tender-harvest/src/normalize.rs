//! Mapping raw listing rows onto [`Notice`]
//!
//! The upstream has renamed fields more than once, so every field is read
//! through a priority list of keys: the first key holding a non-blank value
//! wins. Nothing in here fails on a malformed row; rows without a usable
//! identifier are dropped with `None` and the rest is left to [`validate`].

use crate::api::endpoints::{self, DEFAULT_BASE_URL};
use crate::error::ValidationError;
use serde_json::Value;
use tender_common::types::{
    Notice, CATEGORY_PLACEHOLDER, ORGANIZATION_PLACEHOLDER, TITLE_PLACEHOLDER,
};
use tracing::{debug, warn};

/// Shortest identifier accepted by [`validate`]
pub const MIN_ID_LEN: usize = 1;

/// Keys probed, in order, for the array of rows in a listing response
pub const LIST_KEYS: &[&str] = &["result", "list", "resultList", "data", "rows"];

/// Priority lists of upstream keys, one per notice field
pub mod chains {
    pub const ID: &[&str] = &["bidPbancNo", "bidNo", "pbancNo"];
    pub const TITLE: &[&str] = &["bidPbancNm", "pbancNm"];
    pub const ORGANIZATION: &[&str] = &["grpNm", "instNm", "pbancInstNm"];
    pub const CATEGORY: &[&str] = &["prcmBsneSeCdNm", "pbancTyCdNm"];
    pub const METHOD: &[&str] = &["bidMthdCdNm", "bidMthdNm"];
    pub const DUE_DATE: &[&str] = &["onbsPrnmntEdDt", "bidClseDt"];
    pub const ANNOUNCE_DATE: &[&str] = &["pbancPstgDt", "regDt"];
    pub const BUDGET: &[&str] = &["bscAmt", "presmptPrc"];
    pub const COUNTERPARTY: &[&str] = &["dmndComp", "dmndCompNm"];
}

/// Detail response keys used for enrichment
const DETAIL_BUDGET_KEY: &str = "bscAmt";
const DETAIL_COUNTERPARTY_KEY: &str = "dmndComp";

/// Key under which the detail payload is kept inside `raw_payload`
pub const DETAIL_PAYLOAD_KEY: &str = "detail";

/// Turns raw upstream rows into notices
#[derive(Debug, Clone)]
pub struct Normalizer {
    detail_base: String,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl Normalizer {
    /// `detail_base` is the host used for each notice's `detail_url`
    pub fn new(detail_base: impl Into<String>) -> Self {
        Self {
            detail_base: detail_base.into(),
        }
    }

    pub fn detail_base(&self) -> &str {
        &self.detail_base
    }

    /// Rows contained in a listing response
    pub fn extract_list(&self, response: &Value) -> Vec<Value> {
        if let Value::Array(rows) = response {
            return rows.clone();
        }

        for key in LIST_KEYS {
            if let Some(Value::Array(rows)) = response.get(key) {
                debug!(key, count = rows.len(), "Extracted listing rows");
                return rows.clone();
            }
        }

        let keys: Vec<&str> = response
            .as_object()
            .map(|obj| obj.keys().map(String::as_str).collect())
            .unwrap_or_default();
        warn!(?keys, "No listing rows found in response");
        Vec::new()
    }

    /// Map one raw row; `None` when no identifier can be resolved
    pub fn transform(&self, raw: &Value) -> Option<Notice> {
        let id = first_text(raw, chains::ID)?;

        let notice = Notice {
            title: first_text(raw, chains::TITLE).unwrap_or_else(|| TITLE_PLACEHOLDER.to_string()),
            organization: first_text(raw, chains::ORGANIZATION)
                .unwrap_or_else(|| ORGANIZATION_PLACEHOLDER.to_string()),
            category: first_text(raw, chains::CATEGORY)
                .unwrap_or_else(|| CATEGORY_PLACEHOLDER.to_string()),
            method: first_text(raw, chains::METHOD),
            due_date: first_value(raw, chains::DUE_DATE).and_then(normalize_date),
            announce_date: first_value(raw, chains::ANNOUNCE_DATE).and_then(normalize_date),
            budget: first_text(raw, chains::BUDGET).unwrap_or_default(),
            counterparty: first_text(raw, chains::COUNTERPARTY),
            detail_url: endpoints::notice_page_url(&self.detail_base, &id),
            raw_payload: raw.clone(),
            id,
        };

        notice.is_complete().then_some(notice)
    }

    /// Fill gaps from a detail response and keep it alongside the list row
    pub fn enrich(&self, mut notice: Notice, detail: &Value) -> Notice {
        if !detail.is_object() {
            return notice;
        }

        if notice.budget.is_empty() {
            if let Some(budget) = first_text(detail, &[DETAIL_BUDGET_KEY]) {
                notice.budget = budget;
            }
        }

        if notice.counterparty.is_none() {
            notice.counterparty = first_text(detail, &[DETAIL_COUNTERPARTY_KEY]);
        }

        if let Value::Object(payload) = &mut notice.raw_payload {
            payload.insert(DETAIL_PAYLOAD_KEY.to_string(), detail.clone());
        }

        notice
    }
}

/// Business-rule gate applied right before persistence
pub fn validate(notice: &Notice) -> Result<(), ValidationError> {
    if notice.id.is_empty() {
        return Err(ValidationError::MissingId);
    }

    if notice.title.is_empty() || notice.has_placeholder_title() {
        return Err(ValidationError::InvalidTitle(notice.title.clone()));
    }

    if notice.id.chars().count() < MIN_ID_LEN {
        return Err(ValidationError::IdTooShort(notice.id.clone()));
    }

    Ok(())
}

/// Normalize an upstream date to `YYYY-MM-DD`.
///
/// Separators (`/`, `-`) are dropped and anything after a space or `T` is
/// cut. Exactly eight remaining digits are reformatted; any other string comes
/// back unchanged. Non-string values yield `None`.
pub fn normalize_date(value: &Value) -> Option<String> {
    let input = value.as_str()?;
    if input.is_empty() {
        return None;
    }

    let date_part = input.split([' ', 'T']).next().unwrap_or(input);
    let digits: String = date_part.chars().filter(|c| *c != '/' && *c != '-').collect();

    if digits.len() == 8 && digits.bytes().all(|b| b.is_ascii_digit()) {
        Some(format!("{}-{}-{}", &digits[..4], &digits[4..6], &digits[6..]))
    } else {
        Some(input.to_string())
    }
}

/// Scalar as text; blank strings and non-scalars count as absent
fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        },
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn first_text(raw: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| raw.get(key).and_then(as_text))
}

fn first_value<'a>(raw: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| raw.get(key))
        .find(|value| as_text(value).is_some())
}
