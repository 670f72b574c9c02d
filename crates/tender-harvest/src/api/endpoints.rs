//! Upstream endpoint URLs and request bodies
//!
//! Both endpoints take a POST with a single nested parameter object. Keys the
//! harvester does not use are still sent as empty strings; the server rejects
//! bodies with missing keys.

use crate::error::{HarvestError, Result};
use chrono::{Days, NaiveDate};
use serde_json::{json, Value};

/// Public procurement portal host
pub const DEFAULT_BASE_URL: &str = "https://nuri.g2b.go.kr";

/// Paginated notice listing
pub const LIST_PATH: &str = "/nn/nnb/nnba/selectBidPbancList.do";

/// Single notice detail
pub const DETAIL_PATH: &str = "/nn/nnb/nnbb/selectBidNoceDetl.do";

/// Notice order requested when none is given
pub const DEFAULT_NOTICE_ORDER: &str = "000";

/// How far past today the bid-opening window extends
const OPENING_WINDOW_DAYS: u64 = 30;

fn trim_base(base_url: &str) -> &str {
    base_url.trim_end_matches('/')
}

/// Build the listing URL
pub fn list_url(base_url: &str) -> String {
    format!("{}{}", trim_base(base_url), LIST_PATH)
}

/// Build the detail URL
pub fn detail_url(base_url: &str) -> String {
    format!("{}{}", trim_base(base_url), DETAIL_PATH)
}

/// Public detail page for a notice.
///
/// The identifier is inserted verbatim, without percent-encoding.
pub fn notice_page_url(base_url: &str, notice_id: &str) -> String {
    format!("{}{}?pbancNo={}", trim_base(base_url), DETAIL_PATH, notice_id)
}

fn ymd(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Listing request body for one page.
///
/// Posting window is `[today - lookback_days, today]`; opening window is
/// `[today, today + 30 days]`. Fails when either bound leaves the calendar.
pub fn list_payload(
    page: u32,
    records_per_page: u32,
    lookback_days: u32,
    today: NaiveDate,
) -> Result<Value> {
    let posted_from = today
        .checked_sub_days(Days::new(u64::from(lookback_days)))
        .ok_or_else(|| {
            HarvestError::config(format!("lookback of {lookback_days} days is out of range"))
        })?;
    let opens_until = today
        .checked_add_days(Days::new(OPENING_WINDOW_DAYS))
        .ok_or_else(|| HarvestError::config("opening window is out of range"))?;

    Ok(json!({
        "dlParamM": {
            "bidPbancNo": "",
            "bidPbancOrd": "",
            "bidPbancNm": "",
            "prcmBsneSeCd": "",
            "bidPbancPgstCd": "",
            "bidMthdCd": "",
            "currentPage": page,
            "frgnrRprsvYn": "",
            "kbrdrId": "",
            "onbsPrnmntEdDt": ymd(opens_until),
            "onbsPrnmntStDt": ymd(today),
            "pbancInstUntyGrpNo": "",
            "pbancKndCd": "",
            "pbancPstgEdDt": ymd(today),
            "pbancPstgStDt": ymd(posted_from),
            "pbancPstgYn": "Y",
            "pbancSttsCd": "",
            "pdngYn": "",
            "recordCountPerPage": records_per_page.to_string(),
            "rowNum": "",
            "scsbdMthdCd": "",
            "stdCtrtMthdCd": "",
            "untyGrpNo": "",
            "usrTyCd": ""
        }
    }))
}

/// Detail request body for one notice
pub fn detail_payload(notice_id: &str, notice_order: &str) -> Value {
    json!({
        "dlSrchCndtM": {
            "pbancFlag": "",
            "bidPbancNo": notice_id,
            "bidPbancOrd": notice_order,
            "bidClsfNo": "0",
            "bidPrgrsOrd": "000",
            "bidPbancNm": "",
            "bidPbancPgstCd": "",
            "flag": "bidDtl",
            "frgnrRprsvYn": "",
            "kbrdrId": "",
            "odn3ColCn": "",
            "paramGbn": "1",
            "pbancInstUntyGrpNo": "",
            "pbancPstgEdDt": "",
            "pbancPstgStDt": "",
            "prcmBsneSeCd": "",
            "pstNo": notice_id,
            "recordCountPerPage": "",
            "rowNum": "",
            "untyGrpNo": ""
        }
    })
}
