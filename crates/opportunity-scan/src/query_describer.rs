use std::borrow::Cow;

use crate::url_window::{MODIFIED_FROM, MODIFIED_TO};

/// Returned when a URL carries no query string to describe.
pub const INVALID_QUERY_DESCRIPTION: &str = "Invalid or missing search URL.";

/// Human-readable, one line per recognized parameter, in URL order.
///
/// Unknown parameters and blank values are skipped.
pub fn describe_url(url: &str) -> String {
    match described_lines(url, &[]) {
        Some(lines) => lines.join("\n"),
        None => INVALID_QUERY_DESCRIPTION.to_string(),
    }
}

/// [`describe_url`] flattened onto one line for email subjects. The
/// modification window is left out since every run replaces it.
pub fn describe_search_inline(url: &str) -> String {
    match described_lines(url, &[MODIFIED_FROM, MODIFIED_TO]) {
        Some(lines) => lines.join("; "),
        None => INVALID_QUERY_DESCRIPTION.to_string(),
    }
}

fn described_lines(url: &str, skip: &[&str]) -> Option<Vec<String>> {
    let (_, query) = url.split_once('?')?;
    let query = query.split_once('#').map_or(query, |(query, _)| query);

    let lines = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = decode(key);
            if skip.contains(&&*key) {
                return None;
            }
            describe_parameter(&key, &decode(value))
        })
        .collect();

    Some(lines)
}

/// Label a single decoded parameter, or `None` when it should not be shown.
pub fn describe_parameter(key: &str, value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    let line = match key {
        "q" => format!("Keyword: {value}"),
        "response_date.from" => format!("Response deadline (from): {value}"),
        "response_date.to" => format!("Response deadline (to): {value}"),
        "modified_date.from" => format!("Modified date (from): {value}"),
        "modified_date.to" => format!("Modified date (to): {value}"),
        "naics" => format!("NAICS code(s): {value}"),
        "psc" => format!("PSC code(s): {}", value.replace(',', ", ")),
        "organization_id" => format!("Org ID: {value}"),
        "vendor_name" => format!("Vendor: {value}"),
        "ueiSAM" => format!("UEI SAM: {value}"),
        "notice_type" => format!("Notice type(s): {value}"),
        "set_aside" => format!("Set-Aside: {value}"),
        _ => return None,
    };

    Some(line)
}

fn decode(raw: &str) -> Cow<'_, str> {
    if !raw.contains(['%', '+']) {
        return Cow::Borrowed(raw);
    }
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => Cow::Owned(decoded.into_owned()),
        Err(_) => Cow::Owned(spaced),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_and_psc() {
        assert_eq!(
            describe_url("https://x?q=rockets&psc=A1,B2"),
            "Keyword: rockets\nPSC code(s): A1, B2"
        );
    }

    #[test]
    fn test_keeps_parameter_order_and_skips_unknown() {
        let url = "https://sam.gov/search?index=opp&set_aside=SBA&page=1&naics=336414\
                   &notice_type=o,k&response_date.to=2026-12-01&sort=-modifiedDate";
        assert_eq!(
            describe_url(url),
            "Set-Aside: SBA\nNAICS code(s): 336414\nNotice type(s): o,k\n\
             Response deadline (to): 2026-12-01"
        );
    }

    #[test]
    fn test_decodes_values() {
        assert_eq!(
            describe_url("https://x?q=rocket%20engines&vendor_name=Acme+Corp&psc=A1%2CB2"),
            "Keyword: rocket engines\nVendor: Acme Corp\nPSC code(s): A1, B2"
        );
    }

    #[test]
    fn test_blank_values_produce_no_line() {
        assert_eq!(
            describe_url("https://x?q=&modified_date.to=&organization_id=42&ueiSAM"),
            "Org ID: 42"
        );
        assert_eq!(describe_url("https://x?q=%20"), "");
    }

    #[test]
    fn test_missing_query_string() {
        assert_eq!(describe_url("https://sam.gov/search"), INVALID_QUERY_DESCRIPTION);
        assert_eq!(describe_url(""), INVALID_QUERY_DESCRIPTION);
        assert_eq!(describe_search_inline("nope"), INVALID_QUERY_DESCRIPTION);
    }

    #[test]
    fn test_fragment_is_ignored() {
        assert_eq!(
            describe_url("https://x?q=rockets&modified_date.from=2026-10-15-00:00#top"),
            "Keyword: rockets\nModified date (from): 2026-10-15-00:00"
        );
    }

    #[test]
    fn test_search_form_leaves_out_modification_window() {
        assert_eq!(
            describe_search_inline(
                "https://x?q=rockets&modified_date.from=2020-01-01-00:00\
                 &modified_date.to=2020-02-01-00:00&naics=336414"
            ),
            "Keyword: rockets; NAICS code(s): 336414"
        );
    }

    #[test]
    fn test_undecodable_value_kept_raw() {
        assert_eq!(
            describe_parameter("q", &decode("100%")),
            Some("Keyword: 100%".to_string())
        );
    }
}
