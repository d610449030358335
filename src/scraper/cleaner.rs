// ── Text → value conversions ──────────────────────────────────────────────────

/// Relative prefix the listing pages put in front of every product link.
pub const LISTING_LINK_PREFIX: &str = "../../../";

/// Map a `star-rating` modifier class to its tier.
/// "One" → 1 … "Five" → 5, anything else → 0.
pub fn rating_from_class(class: &str) -> u8 {
    match class {
        "One" => 1,
        "Two" => 2,
        "Three" => 3,
        "Four" => 4,
        "Five" => 5,
        _ => 0,
    }
}

/// First parenthesised integer in an availability string.
/// "In stock (22 available)" → 22 | "In stock" → None
pub fn parse_stock_count(availability: &str) -> Option<u32> {
    let (_, after) = availability.split_once('(')?;
    let digits: String = after
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Parse the bolded result count of a listing page. "1,000" is accepted.
pub fn parse_result_count(s: &str) -> Option<u32> {
    let cleaned = s.trim().replace(',', "");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

/// ceil(total / page_size); 0 results → 0 pages.
pub fn page_count(total_results: u32, page_size: u32) -> u32 {
    if page_size == 0 {
        return 0;
    }
    total_results.div_ceil(page_size)
}

/// Strip the listing's `../../../` escape so the link can be joined onto the
/// catalogue root.
pub fn strip_listing_prefix(href: &str) -> &str {
    href.strip_prefix(LISTING_LINK_PREFIX).unwrap_or(href)
}

/// Trim the ends only; inner line breaks and spacing are kept. `None` for blank text.
pub fn trim_text(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
}

/// Collapse whitespace runs and trim, for labels. Returns `None` for blank text.
pub fn clean_text(s: &str) -> Option<String> {
    let joined = s.split_whitespace().collect::<Vec<_>>().join(" ");
    if joined.is_empty() { None } else { Some(joined) }
}
