//! Derived fields added to catalogue payloads before they reach clients.
//!
//! Every function here is pure and total: odd inputs produce documented
//! defaults rather than errors.

use std::{
    cmp::Reverse,
    collections::{BTreeSet, HashSet},
    hash::Hash,
};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::{Book, DramaDetail, Episode, SeriesData, lenient_i64_value, truthy};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 20;
pub const DEFAULT_AGE_RATING: i64 = 18;

/// Categories always offered by the catalogue endpoint, whatever is trending.
pub const COMMON_CATEGORIES: [&str; 10] = [
    "Romance",
    "Drama",
    "Fantasy",
    "Action",
    "Comedy",
    "Historical",
    "Modern",
    "Family",
    "School",
    "Supernatural",
];

const SIMILAR_MATCH_WEIGHT: i64 = 10;
const SIMILAR_HOT_BONUS: i64 = 5;
const RECOMMENDED_HOT_BONUS: i64 = 15;

/// `H:MM:SS` from one hour up, `M:SS` below; anything not positive is `0:00`.
pub fn format_duration(seconds: i64) -> String {
    if seconds <= 0 {
        return "0:00".to_string();
    }
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

/// Thousands-grouped count, `"0"` when missing.
pub fn format_count(count: Option<i64>) -> String {
    let Some(count) = count else {
        return "0".to_string();
    };
    let digits = count.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if count < 0 {
        grouped.push('-');
    }
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    grouped
}

pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// ISO-8601 form of a Unix timestamp in seconds; `None` for zero or an
/// out-of-range value.
pub fn epoch_to_iso(secs: i64) -> Option<String> {
    if secs == 0 {
        return None;
    }
    DateTime::<Utc>::from_timestamp(secs, 0).map(iso_timestamp)
}

/// Positive integer from a query value, `default` for anything else.
pub fn coerce_positive(raw: Option<&str>, default: u32) -> u32 {
    raw.and_then(|raw| raw.trim().parse::<i64>().ok())
        .filter(|value| *value > 0)
        .and_then(|value| u32::try_from(value).ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageParams {
    pub page: u32,
    pub limit: u32,
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl PageParams {
    pub fn from_query(page: Option<&str>, limit: Option<&str>) -> Self {
        Self {
            page: coerce_positive(page, DEFAULT_PAGE),
            limit: coerce_positive(limit, DEFAULT_LIMIT),
        }
    }

    pub fn offset(&self) -> usize {
        (self.page as usize - 1) * self.limit as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: usize,
    pub total_pages: usize,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    fn total_pages(total: usize, limit: u32) -> usize {
        total.div_ceil(limit as usize)
    }

    pub fn empty(params: PageParams) -> Self {
        Self {
            page: params.page,
            limit: params.limit,
            total: 0,
            total_pages: 0,
            has_next: false,
            has_prev: false,
        }
    }
}

/// Slices one page out of a full list.
pub fn paginate<T: Clone>(items: &[T], params: PageParams) -> (Vec<T>, Pagination) {
    let total = items.len();
    let offset = params.offset();
    let end = offset.saturating_add(params.limit as usize);
    let page = items[offset.min(total)..end.min(total)].to_vec();
    let pagination = Pagination {
        page: params.page,
        limit: params.limit,
        total,
        total_pages: Pagination::total_pages(total, params.limit),
        has_next: end < total,
        has_prev: offset > 0,
    };
    (page, pagination)
}

/// Pagination for results the catalogue already offset: `items` is the page
/// the catalogue returned, truncated to `limit` here.
pub fn paginate_upstream_page<T>(mut items: Vec<T>, params: PageParams) -> (Vec<T>, Pagination) {
    let total = items.len();
    items.truncate(params.limit as usize);
    let pagination = Pagination {
        page: params.page,
        limit: params.limit,
        total,
        total_pages: Pagination::total_pages(total, params.limit),
        has_next: (params.limit as usize) < total,
        has_prev: params.page > 1,
    };
    (items, pagination)
}

/// Keeps the first item seen for every key, in iteration order.
pub fn dedupe_by_key<T, K, F>(items: impl IntoIterator<Item = T>, key: F) -> Vec<T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(key(item)))
        .collect()
}

pub fn dedupe_books(books: impl IntoIterator<Item = Book>) -> Vec<Book> {
    dedupe_by_key(books, |book| book.book_id.clone())
}

/// Stable sort, highest score first; equal scores keep their input order.
pub fn rank_by_score<T>(items: &mut [T], score: impl Fn(&T) -> i64) {
    items.sort_by_key(|item| Reverse(score(item)));
}

/// Case-insensitive substring match against a book's category tags.
pub fn in_category(book: &Book, category: &str) -> bool {
    let needle = category.to_lowercase();
    book.stat_infos
        .iter()
        .any(|info| info.to_lowercase().contains(&needle))
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredBook {
    #[serde(flatten)]
    pub book: Book,
    pub relevance_score: i64,
    pub matching_categories: Vec<String>,
}

pub fn score_similar(book: Book, categories: &[String]) -> ScoredBook {
    let matching_categories: Vec<String> = book
        .stat_infos
        .iter()
        .filter(|info| categories.contains(info))
        .cloned()
        .collect();
    let mut relevance_score = SIMILAR_MATCH_WEIGHT * matching_categories.len() as i64;
    if book.is_hot() {
        relevance_score += SIMILAR_HOT_BONUS;
    }
    ScoredBook {
        book,
        relevance_score,
        matching_categories,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationSource {
    Trending,
    Latest,
}

impl RecommendationSource {
    pub fn baseline(self) -> i64 {
        match self {
            RecommendationSource::Trending => 80,
            RecommendationSource::Latest => 70,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecommendedBook {
    #[serde(flatten)]
    pub book: Book,
    pub recommendation_source: RecommendationSource,
    pub recommendation_score: i64,
}

pub fn recommend(book: Book, source: RecommendationSource) -> RecommendedBook {
    let bonus = if book.is_hot() { RECOMMENDED_HOT_BONUS } else { 0 };
    RecommendedBook {
        recommendation_score: source.baseline() + bonus,
        recommendation_source: source,
        book,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrichedEpisode {
    #[serde(flatten)]
    pub episode: Episode,
    pub episode_number: Option<i64>,
    pub duration_formatted: String,
    pub likes_formatted: String,
    pub has_disclaimer: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disclaimer_content: Option<Value>,
}

pub fn enrich_episode(episode: &Episode) -> EnrichedEpisode {
    let disclaimer = episode.disclaimer_info.as_ref();
    EnrichedEpisode {
        episode_number: episode.vid_index,
        duration_formatted: format_duration(episode.duration.unwrap_or(0.0) as i64),
        likes_formatted: format_count(episode.digged_count.filter(|count| *count != 0)),
        has_disclaimer: disclaimer.is_some_and(truthy),
        disclaimer_content: disclaimer
            .and_then(|info| info.get("content"))
            .filter(|content| !content.is_null())
            .cloned(),
        episode: episode.clone(),
    }
}

/// One entry of a `category_schema` document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRef {
    #[serde(default, rename(deserialize = "category_id"))]
    pub id: Option<Value>,
    #[serde(default)]
    pub name: Option<Value>,
    #[serde(default)]
    pub schema: Option<Value>,
}

/// `Ok(None)` when the series carries no schema at all.
pub fn parse_category_schema(
    series: &SeriesData,
) -> Result<Option<Vec<CategoryRef>>, serde_json::Error> {
    match &series.category_schema {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(raw)) if raw.is_empty() => Ok(None),
        Some(Value::String(raw)) => serde_json::from_str(raw).map(Some),
        Some(other) => serde_json::from_value(other.clone()).map(Some),
    }
}

/// Category names of a drama: the schema names, or the detail's `stat_infos`
/// when the schema is unreadable.
pub fn category_names(detail: &DramaDetail) -> Vec<String> {
    let Some(series) = &detail.video_data else {
        return Vec::new();
    };
    match parse_category_schema(series) {
        Ok(refs) => refs
            .unwrap_or_default()
            .into_iter()
            .filter_map(|category| match category.name {
                Some(Value::String(name)) => Some(name),
                _ => None,
            })
            .collect(),
        Err(err) => {
            tracing::warn!(error = %err, "unreadable category_schema, using stat_infos");
            detail.stat_infos.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailMetadata {
    pub total_episodes: i64,
    pub follower_count: i64,
    pub play_count: i64,
    pub age_rating: i64,
    pub status: &'static str,
    pub can_download: bool,
    pub share_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrichedSeries {
    #[serde(flatten)]
    pub series: SeriesData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories_parsed: Option<Vec<CategoryRef>>,
    pub episodes_enriched: Vec<EnrichedEpisode>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrichedDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_data: Option<EnrichedSeries>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stat_infos: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    pub metadata: DetailMetadata,
}

fn detail_metadata(series: Option<&SeriesData>) -> DetailMetadata {
    let nested_i64 = |field: &str, member: &str| {
        series
            .and_then(|series| series.nested(field, member))
            .and_then(lenient_i64_value)
            .filter(|value| *value != 0)
    };
    DetailMetadata {
        total_episodes: series.and_then(|s| s.episode_cnt).unwrap_or(0),
        follower_count: series.and_then(|s| s.followed_cnt).unwrap_or(0),
        play_count: series.and_then(|s| s.series_play_cnt).unwrap_or(0),
        age_rating: nested_i64("age_gate_info", "age_gate").unwrap_or(DEFAULT_AGE_RATING),
        status: if series.and_then(|s| s.series_status) == Some(1) {
            "ongoing"
        } else {
            "completed"
        },
        can_download: series
            .and_then(|series| series.nested("download_config", "can_download"))
            .is_some_and(truthy),
        share_count: nested_i64("share_info", "share_cnt").unwrap_or(0),
    }
}

pub fn enrich_detail(detail: DramaDetail) -> EnrichedDetail {
    let metadata = detail_metadata(detail.video_data.as_ref());
    let video_data = detail.video_data.map(|series| {
        let categories_parsed = match parse_category_schema(&series) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::warn!(error = %err, "failed to parse category_schema");
                Some(Vec::new())
            }
        };
        EnrichedSeries {
            categories_parsed,
            episodes_enriched: series.video_list.iter().map(enrich_episode).collect(),
            series,
        }
    });
    let mut extra = detail.extra;
    extra.remove("metadata");
    EnrichedDetail {
        video_data,
        stat_infos: detail.stat_infos,
        extra,
        metadata,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryEntry {
    pub id: usize,
    pub name: String,
    pub slug: String,
    pub count: usize,
}

pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

/// Every tag seen on `books` plus [`COMMON_CATEGORIES`], sorted by name, with
/// the number of books carrying each tag.
pub fn category_catalogue(books: &[Book]) -> Vec<CategoryEntry> {
    let mut names: BTreeSet<String> = books
        .iter()
        .flat_map(|book| book.stat_infos.iter())
        .map(|info| info.trim())
        .filter(|info| !info.is_empty())
        .map(str::to_owned)
        .collect();
    names.extend(COMMON_CATEGORIES.iter().map(|name| name.to_string()));

    names
        .into_iter()
        .enumerate()
        .map(|(index, name)| CategoryEntry {
            id: index + 1,
            slug: slugify(&name),
            count: books
                .iter()
                .filter(|book| book.stat_infos.contains(&name))
                .count(),
            name,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn book(id: &str, tags: &[&str], hot: bool) -> Book {
        serde_json::from_value(json!({
            "book_id": id,
            "stat_infos": tags,
            "is_hot": if hot { "1" } else { "0" },
            "book_name": format!("Drama {id}"),
        }))
        .unwrap()
    }

    #[test]
    fn durations_format_like_a_player_clock() {
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(-5), "0:00");
        assert_eq!(format_duration(59), "0:59");
        assert_eq!(format_duration(125), "2:05");
        assert_eq!(format_duration(3600), "1:00:00");
        assert_eq!(format_duration(3661), "1:01:01");
    }

    #[test]
    fn counts_are_grouped_by_thousands() {
        assert_eq!(format_count(None), "0");
        assert_eq!(format_count(Some(7)), "7");
        assert_eq!(format_count(Some(1234)), "1,234");
        assert_eq!(format_count(Some(1_234_567)), "1,234,567");
        assert_eq!(format_count(Some(-12_000)), "-12,000");
    }

    #[test]
    fn epoch_conversion_uses_millisecond_iso() {
        assert_eq!(
            epoch_to_iso(1_700_000_000).as_deref(),
            Some("2023-11-14T22:13:20.000Z")
        );
        assert_eq!(epoch_to_iso(0), None);
    }

    #[test]
    fn page_params_fall_back_to_defaults() {
        assert_eq!(PageParams::from_query(None, None), PageParams::default());
        assert_eq!(
            PageParams::from_query(Some("abc"), Some("-3")),
            PageParams { page: 1, limit: 20 }
        );
        assert_eq!(
            PageParams::from_query(Some("0"), Some(" 5 ")),
            PageParams { page: 1, limit: 5 }
        );
        assert_eq!(PageParams::from_query(Some("3"), Some("10")).offset(), 20);
    }

    #[test]
    fn paginate_slices_forty_five_items() {
        let items: Vec<u32> = (0..45).collect();

        let (first, meta) = paginate(&items, PageParams { page: 1, limit: 20 });
        assert_eq!(first.len(), 20);
        assert!(meta.has_next);
        assert!(!meta.has_prev);
        assert_eq!(meta.total_pages, 3);

        let (last, meta) = paginate(&items, PageParams { page: 3, limit: 20 });
        assert_eq!(last, (40..45).collect::<Vec<_>>());
        assert!(!meta.has_next);
        assert!(meta.has_prev);

        let (beyond, meta) = paginate(&items, PageParams { page: 9, limit: 20 });
        assert!(beyond.is_empty());
        assert_eq!(meta.total, 45);
    }

    #[test]
    fn pagination_serialises_camel_case() {
        let (_, meta) = paginate(&[1, 2, 3], PageParams { page: 1, limit: 2 });
        assert_eq!(
            serde_json::to_value(meta).unwrap(),
            json!({"page": 1, "limit": 2, "total": 3, "totalPages": 2, "hasNext": true, "hasPrev": false})
        );
    }

    #[test]
    fn upstream_page_is_truncated_to_limit() {
        let (items, meta) = paginate_upstream_page(vec![1, 2, 3, 4, 5], PageParams { page: 2, limit: 3 });
        assert_eq!(items, vec![1, 2, 3]);
        assert!(meta.has_next);
        assert!(meta.has_prev);
        assert_eq!(meta.total, 5);
    }

    #[test]
    fn dedupe_keeps_first_record() {
        let first = vec![book("1", &["Romance"], false), book("2", &[], false)];
        let second = vec![book("2", &["Action"], true), book("3", &[], false)];

        let merged = dedupe_books(first.into_iter().chain(second));
        let ids: Vec<_> = merged.iter().map(|b| b.book_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert!(merged[1].stat_infos.is_empty());
        assert!(!merged[1].is_hot());
    }

    #[test]
    fn similar_scores_count_matches_and_hotness() {
        let categories = vec!["Romance".to_string(), "Modern".to_string()];
        let scored = score_similar(book("9", &["Romance", "Modern", "Action"], true), &categories);
        assert_eq!(scored.relevance_score, 25);
        assert_eq!(scored.matching_categories, categories);

        let cold = score_similar(book("8", &["Action"], false), &categories);
        assert_eq!(cold.relevance_score, 0);
    }

    #[test]
    fn ranking_is_stable() {
        let mut books = vec![
            recommend(book("a", &[], false), RecommendationSource::Latest),
            recommend(book("b", &[], false), RecommendationSource::Trending),
            recommend(book("c", &[], true), RecommendationSource::Latest),
            recommend(book("d", &[], false), RecommendationSource::Trending),
        ];
        rank_by_score(&mut books, |book| book.recommendation_score);
        let order: Vec<_> = books.iter().map(|b| b.book.book_id.as_str()).collect();
        assert_eq!(order, vec!["c", "b", "d", "a"]);
        assert_eq!(books[0].recommendation_score, 85);
    }

    #[test]
    fn category_match_is_case_insensitive_substring() {
        let romance = book("1", &["Modern Romance"], false);
        assert!(in_category(&romance, "romance"));
        assert!(!in_category(&romance, "action"));
    }

    #[test]
    fn episode_enrichment_adds_display_fields() {
        let episode: Episode = serde_json::from_value(json!({
            "vid": 7312345678901_i64,
            "vid_index": 3,
            "duration": 95.7,
            "digged_count": 12345,
            "disclaimer_info": {"content": "Fiction"}
        }))
        .unwrap();
        let enriched = enrich_episode(&episode);
        assert_eq!(enriched.episode_number, Some(3));
        assert_eq!(enriched.duration_formatted, "1:35");
        assert_eq!(enriched.likes_formatted, "12,345");
        assert!(enriched.has_disclaimer);
        assert_eq!(enriched.disclaimer_content, Some(json!("Fiction")));

        let wire = serde_json::to_value(&enriched).unwrap();
        assert_eq!(wire["vid"], json!("7312345678901"));
    }

    #[test]
    fn detail_enrichment_fills_metadata_defaults() {
        let detail: DramaDetail = serde_json::from_value(json!({
            "video_data": {
                "series_title": "Moonlit Vows",
                "category_schema": "[{\"category_id\": 4, \"name\": \"Romance\", \"schema\": \"x\"}]",
                "video_list": [{"vid": "1", "vid_index": 1, "duration": 60}],
                "episode_cnt": 80,
                "series_status": 1,
                "share_info": {"share_cnt": "42"}
            },
            "stat_infos": ["Romance"]
        }))
        .unwrap();
        let enriched = enrich_detail(detail);

        assert_eq!(
            enriched.metadata,
            DetailMetadata {
                total_episodes: 80,
                follower_count: 0,
                play_count: 0,
                age_rating: 18,
                status: "ongoing",
                can_download: false,
                share_count: 42,
            }
        );
        let series = enriched.video_data.unwrap();
        assert_eq!(series.episodes_enriched[0].duration_formatted, "1:00");
        let parsed = series.categories_parsed.unwrap();
        assert_eq!(parsed[0].id, Some(json!(4)));
        assert_eq!(parsed[0].name, Some(json!("Romance")));
    }

    #[test]
    fn category_names_fall_back_to_stat_infos() {
        let broken: DramaDetail = serde_json::from_value(json!({
            "video_data": {"category_schema": "{not json"},
            "stat_infos": ["Revenge", "CEO"]
        }))
        .unwrap();
        assert_eq!(category_names(&broken), vec!["Revenge", "CEO"]);

        let absent: DramaDetail =
            serde_json::from_value(json!({"video_data": {}, "stat_infos": ["Revenge"]})).unwrap();
        assert!(category_names(&absent).is_empty());
    }

    #[test]
    fn catalogue_merges_trending_tags_with_common_ones() {
        let books = vec![
            book("1", &["Romance", " CEO Love "], false),
            book("2", &["Romance"], false),
        ];
        let catalogue = category_catalogue(&books);

        assert_eq!(catalogue.len(), 11);
        assert_eq!(catalogue[0].name, "Action");
        assert_eq!(catalogue[0].id, 1);
        let ceo = catalogue.iter().find(|c| c.name == "CEO Love").unwrap();
        assert_eq!(ceo.slug, "ceo-love");
        assert_eq!(ceo.count, 0);
        let romance = catalogue.iter().find(|c| c.name == "Romance").unwrap();
        assert_eq!(romance.count, 2);
    }
}
