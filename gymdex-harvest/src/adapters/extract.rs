//! Pattern extraction over flattened search result text
//!
//! All extraction runs on tag-stripped text (see [`super::html`]). Patterns
//! target Korean gym listings: local phone formats, KRW price tags near
//! membership keywords, HH:MM hour ranges, rating/review figures near their
//! labels, and a fixed facility/service keyword set.

use once_cell::sync::Lazy;
use regex::Regex;

/// Korean phone numbers: Seoul (02), mobile (010), other area codes (0XX)
/// and 15XX/16XX service numbers
static PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(0\d{1,2}[-. ]\d{3,4}[-. ]\d{4}|1[5-9]\d{2}[-. ]\d{4})")
        .expect("phone regex is hardcoded and must compile")
});

/// HH:MM - HH:MM operating hour ranges (also ~ and 〜 separators)
static HOURS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{1,2}):(\d{2})\s*[-~〜]\s*(\d{1,2}):(\d{2})")
        .expect("hours regex is hardcoded and must compile")
});

/// KRW amounts: "120,000원", "3000원", "12만원", "12 만 원"
static AMOUNT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{1,3}(?:,\d{3})+|\d+)\s*(만)?\s*원")
        .expect("amount regex is hardcoded and must compile")
});

/// Rating value: 0-5 with up to two decimals
static RATING_NUM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([0-5](?:\.\d{1,2})?)").expect("rating regex is hardcoded and must compile")
});

/// Review counts: plain or comma-grouped integers
static COUNT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{1,3}(?:,\d{3})+|\d+)").expect("count regex is hardcoded and must compile")
});

/// Instagram profile URLs occasionally visible in listing text
static INSTAGRAM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"instagram\.com/([A-Za-z0-9_.]+)")
        .expect("instagram regex is hardcoded and must compile")
});

/// Road-name addresses: optional city, district, road/street + number
static ADDRESS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:[가-힣]+시\s+)?[가-힣]+[구군]\s+[가-힣0-9]+(?:로|길)\s*\d+(?:-\d+)?")
        .expect("address regex is hardcoded and must compile")
});

const MONTHLY_FEE_KEYWORDS: &[&str] = &["월회비", "월 회비", "회원권", "한달", "1개월", "월"];
const DAY_PASS_KEYWORDS: &[&str] = &["일일권", "일일 이용", "1일권", "당일", "일일"];
const RATING_KEYWORDS: &[&str] = &["평점", "별점", "rating"];
const REVIEW_KEYWORDS: &[&str] = &["방문자리뷰", "리뷰", "후기", "블로그리뷰"];

/// Coarse gym-relevance keywords: how likely is this text about a gym at all
const RELEVANCE_KEYWORDS: &[&str] = &[
    "헬스", "피트니스", "휘트니스", "체육관", "짐", "gym", "fitness", "운동", "트레이닝",
];

/// (needle, canonical label) pairs for amenity keywords
const FACILITY_KEYWORDS: &[(&str, &str)] = &[
    ("샤워", "샤워실"),
    ("주차", "주차장"),
    ("사우나", "사우나"),
    ("락커", "락커룸"),
    ("라커", "락커룸"),
    ("운동복", "운동복 대여"),
    ("인바디", "인바디"),
];

/// (needle, canonical label) pairs for program/service keywords
const SERVICE_KEYWORDS: &[(&str, &str)] = &[
    ("PT", "PT"),
    ("퍼스널트레이닝", "PT"),
    ("GX", "GX"),
    ("그룹운동", "GX"),
    ("요가", "요가"),
    ("필라테스", "필라테스"),
    ("스피닝", "스피닝"),
    ("크로스핏", "크로스핏"),
];

/// First phone number in the text
pub fn extract_phone(text: &str) -> Option<String> {
    PHONE_RE
        .find(text)
        .map(|m| m.as_str().replace(['.', ' '], "-"))
}

/// First operating-hours range, normalized to ("HH:MM", "HH:MM")
///
/// A 24-hour marker wins over any explicit range.
pub fn extract_hours(text: &str) -> Option<(String, String)> {
    if is_24h(text) {
        return Some(("00:00".to_string(), "24:00".to_string()));
    }
    let caps = HOURS_RE.captures(text)?;
    let open_h: u8 = caps[1].parse().ok()?;
    let close_h: u8 = caps[3].parse().ok()?;
    if open_h > 24 || close_h > 24 {
        return None;
    }
    Some((
        format!("{:02}:{}", open_h, &caps[2]),
        format!("{:02}:{}", close_h, &caps[4]),
    ))
}

/// 24-hour operation marker
pub fn is_24h(text: &str) -> bool {
    text.contains("24시간") || text.contains("24시 ") || text.to_lowercase().contains("24h")
}

/// Monthly membership and day-pass fees, in KRW
///
/// An amount counts only when it appears shortly after a matching keyword;
/// bare numbers elsewhere in the page are ignored.
pub fn extract_prices(text: &str) -> (Option<u32>, Option<u32>) {
    let monthly = amount_near_keywords(text, MONTHLY_FEE_KEYWORDS, 10_000..=5_000_000);
    let day_pass = amount_near_keywords(text, DAY_PASS_KEYWORDS, 1_000..=200_000);
    (monthly, day_pass)
}

fn amount_near_keywords(
    text: &str,
    keywords: &[&str],
    plausible: std::ops::RangeInclusive<u32>,
) -> Option<u32> {
    for keyword in keywords {
        let mut search_from = 0;
        while let Some(rel) = text[search_from..].find(keyword) {
            let keyword_end = search_from + rel + keyword.len();
            let window = window_after(text, keyword_end, 24);
            if let Some(caps) = AMOUNT_RE.captures(window) {
                if let Some(amount) = parse_amount(&caps) {
                    if plausible.contains(&amount) {
                        return Some(amount);
                    }
                }
            }
            search_from = keyword_end;
        }
    }
    None
}

fn parse_amount(caps: &regex::Captures<'_>) -> Option<u32> {
    let digits: u32 = caps[1].replace(',', "").parse().ok()?;
    if caps.get(2).is_some() {
        digits.checked_mul(10_000)
    } else {
        Some(digits)
    }
}

/// Rating (0.0-5.0) appearing near a rating keyword
pub fn extract_rating(text: &str) -> Option<f32> {
    for keyword in RATING_KEYWORDS {
        if let Some(pos) = find_ci(text, keyword) {
            let window = window_after(text, pos + keyword.len(), 12);
            if let Some(caps) = RATING_NUM_RE.captures(window) {
                let value: f32 = caps[1].parse().ok()?;
                if (0.0..=5.0).contains(&value) {
                    return Some(value);
                }
            }
        }
    }
    None
}

/// Review count appearing near a review keyword
pub fn extract_review_count(text: &str) -> Option<u32> {
    for keyword in REVIEW_KEYWORDS {
        if let Some(pos) = text.find(keyword) {
            let window = window_after(text, pos + keyword.len(), 16);
            if let Some(caps) = COUNT_RE.captures(window) {
                if let Ok(count) = caps[1].replace(',', "").parse() {
                    return Some(count);
                }
            }
        }
    }
    None
}

/// Amenity labels found anywhere in the text, deduplicated
pub fn extract_facilities(text: &str) -> Vec<String> {
    keyword_labels(text, FACILITY_KEYWORDS)
}

/// Program/service labels found anywhere in the text, deduplicated
pub fn extract_services(text: &str) -> Vec<String> {
    keyword_labels(text, SERVICE_KEYWORDS)
}

fn keyword_labels(text: &str, pairs: &[(&str, &str)]) -> Vec<String> {
    let mut labels: Vec<String> = Vec::new();
    for (needle, label) in pairs {
        if text.contains(needle) && !labels.iter().any(|l| l == label) {
            labels.push((*label).to_string());
        }
    }
    labels
}

/// Instagram profile reference, when one is visible in the text
pub fn extract_instagram(text: &str) -> Option<String> {
    INSTAGRAM_RE
        .captures(text)
        .map(|caps| format!("https://instagram.com/{}", &caps[1]))
}

/// First road-name address in the text
pub fn extract_address(text: &str) -> Option<String> {
    ADDRESS_RE.find(text).map(|m| m.as_str().trim().to_string())
}

/// Coarse relevance factor: how gym-like is this text
///
/// Scales a source's base confidence: 1.0 with two or more domain keyword
/// hits, 0.85 with one, 0.7 with none.
pub fn relevance_factor(text: &str) -> f32 {
    let lower = text.to_lowercase();
    let hits = RELEVANCE_KEYWORDS
        .iter()
        .filter(|k| lower.contains(&k.to_lowercase()))
        .count();
    match hits {
        0 => 0.7,
        1 => 0.85,
        _ => 1.0,
    }
}

/// Case-insensitive find for mixed Korean/Latin keywords
///
/// Offsets come from the lowercased copy; non-ASCII case folding can shift
/// byte positions, so only boundary-safe offsets are returned.
fn find_ci(text: &str, keyword: &str) -> Option<usize> {
    let pos = text.to_lowercase().find(&keyword.to_lowercase())?;
    let end = pos + keyword.len();
    if text.is_char_boundary(pos) && text.is_char_boundary(end) {
        Some(pos)
    } else {
        None
    }
}

/// Slice up to `max_chars` characters after a byte offset, respecting
/// char boundaries (the offset must itself lie on one)
fn window_after(text: &str, from: usize, max_chars: usize) -> &str {
    let rest = &text[from..];
    match rest.char_indices().nth(max_chars) {
        Some((end, _)) => &rest[..end],
        None => rest,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_phone_seoul_and_mobile() {
        assert_eq!(
            extract_phone("문의 02-123-4567 로 전화"),
            Some("02-123-4567".to_string())
        );
        assert_eq!(
            extract_phone("상담 010.9876.5432"),
            Some("010-9876-5432".to_string())
        );
        assert_eq!(
            extract_phone("대표번호 1588-0000"),
            Some("1588-0000".to_string())
        );
        assert_eq!(extract_phone("전화번호 없음"), None);
    }

    #[test]
    fn test_extract_hours_range() {
        let (open, close) = extract_hours("영업시간 6:00~23:30 연중무휴").unwrap();
        assert_eq!(open, "06:00");
        assert_eq!(close, "23:30");
    }

    #[test]
    fn test_extract_hours_24h_marker_wins() {
        let (open, close) = extract_hours("24시간 운영 06:00-23:00").unwrap();
        assert_eq!(open, "00:00");
        assert_eq!(close, "24:00");
    }

    #[test]
    fn test_extract_hours_rejects_bogus_times() {
        assert_eq!(extract_hours("스코어 33:00~99:00"), None);
    }

    #[test]
    fn test_extract_prices_monthly_and_day() {
        let (monthly, day) = extract_prices("월회비 99,000원 / 일일권 15,000원");
        assert_eq!(monthly, Some(99_000));
        assert_eq!(day, Some(15_000));
    }

    #[test]
    fn test_extract_prices_man_won_unit() {
        let (monthly, _) = extract_prices("회원권 12만원 부터");
        assert_eq!(monthly, Some(120_000));
    }

    #[test]
    fn test_extract_prices_ignores_far_numbers() {
        // Amount is nowhere near a fee keyword
        let (monthly, day) = extract_prices("주소 123번지 운영중 연락처 등록 50,000원은 다른 문맥에서");
        assert_eq!(monthly, None);
        assert_eq!(day, None);
    }

    #[test]
    fn test_extract_rating() {
        assert_eq!(extract_rating("방문자 평점 4.5 (리뷰 120)"), Some(4.5));
        assert_eq!(extract_rating("별점 3.8점"), Some(3.8));
        assert_eq!(extract_rating("평점 정보 없음"), None);
    }

    #[test]
    fn test_extract_review_count_with_commas() {
        assert_eq!(extract_review_count("방문자리뷰 1,234개"), Some(1234));
        assert_eq!(extract_review_count("후기 45건"), Some(45));
        assert_eq!(extract_review_count("리뷰 없음"), None);
    }

    #[test]
    fn test_extract_facilities_dedup() {
        let labels = extract_facilities("샤워실 완비, 샤워 가능, 주차장 있음, 사우나");
        assert_eq!(labels, vec!["샤워실", "주차장", "사우나"]);
    }

    #[test]
    fn test_extract_services_maps_aliases() {
        let labels = extract_services("PT 전문, 퍼스널트레이닝, 요가, GX 프로그램");
        assert_eq!(labels, vec!["PT", "GX", "요가"]);
    }

    #[test]
    fn test_relevance_factor_tiers() {
        assert_eq!(relevance_factor("헬스장 피트니스 센터"), 1.0);
        assert_eq!(relevance_factor("동네 체육관"), 0.85);
        assert_eq!(relevance_factor("맛집 후기"), 0.7);
    }

    #[test]
    fn test_extract_address_road_name() {
        assert_eq!(
            extract_address("위치: 서울특별시 강남구 테헤란로 123 2층"),
            Some("서울특별시 강남구 테헤란로 123".to_string())
        );
        assert_eq!(
            extract_address("마포구 양화로 45-1 인근"),
            Some("마포구 양화로 45-1".to_string())
        );
        assert_eq!(extract_address("주소가 따로 없습니다"), None);
    }

    #[test]
    fn test_extract_instagram() {
        assert_eq!(
            extract_instagram("instagram.com/abc_gym 팔로우"),
            Some("https://instagram.com/abc_gym".to_string())
        );
        assert_eq!(extract_instagram("인스타 없음"), None);
    }

    #[test]
    fn test_window_after_respects_utf8_boundaries() {
        let text = "월회비 구만구천원입니다";
        let pos = text.find("월회비").unwrap() + "월회비".len();
        // Must not panic on multi-byte boundaries
        let window = window_after(text, pos, 5);
        assert!(window.chars().count() <= 5);
    }
}
