//! Listing, search, detail and discovery endpoints.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{AppState, CacheClass, Envelope};
use crate::{
    enrich::{
        CategoryEntry, EnrichedDetail, EnrichedEpisode, PageParams, Pagination, RecommendationSource,
        RecommendedBook, ScoredBook, category_catalogue, category_names, coerce_positive,
        dedupe_books, dedupe_by_key, enrich_detail, enrich_episode, in_category, paginate,
        paginate_upstream_page, rank_by_score, recommend, score_similar,
    },
    error::{ApiError, ApiResult},
    model::{Book, DramaDetail, UpstreamReply, drama_detail, listing_books, search_books},
    stream::process_stream_data,
    upstream::{Endpoint, UpstreamError},
    video_id::clean_video_id,
};

const DEFAULT_SIMILAR_LIMIT: u32 = 6;
const DEFAULT_RECOMMENDED_LIMIT: u32 = 12;
const SIMILAR_CATEGORY_SEARCHES: usize = 3;
const SIMILAR_SEARCH_LIMIT: u32 = 5;

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    page: Option<String>,
    limit: Option<String>,
}

impl PageQuery {
    fn params(&self) -> PageParams {
        PageParams::from_query(self.page.as_deref(), self.limit.as_deref())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    query: Option<String>,
    page: Option<String>,
    limit: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    limit: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BookPage {
    books: Vec<Book>,
    pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct SearchPage {
    query: String,
    books: Vec<Book>,
    pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct CategoryPage {
    category: String,
    books: Vec<Book>,
    pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct EpisodePage {
    drama_id: String,
    drama_title: Option<String>,
    total_episodes: usize,
    episodes: Vec<EnrichedEpisode>,
    pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct DramaInfo {
    id: String,
    title: Option<String>,
    cover: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EpisodeView {
    #[serde(flatten)]
    episode: EnrichedEpisode,
    stream_available: bool,
    stream_data: Option<Value>,
    next_episode: Option<i64>,
    prev_episode: Option<i64>,
    total_episodes: usize,
    drama_info: DramaInfo,
}

#[derive(Debug, Serialize)]
pub struct CategoryList {
    categories: Vec<CategoryEntry>,
    total: usize,
}

#[derive(Debug, Serialize)]
pub struct OriginalDrama {
    id: String,
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    categories: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SimilarDramas {
    Popular {
        similar: Vec<Book>,
        total: usize,
        based_on: &'static str,
        original_drama: OriginalDrama,
    },
    ByCategory {
        similar: Vec<ScoredBook>,
        total: usize,
        based_on_categories: Vec<String>,
        original_drama: OriginalDrama,
    },
}

#[derive(Debug, Serialize)]
pub struct Recommendations {
    recommended: Vec<RecommendedBook>,
    total: usize,
    sources: [RecommendationSource; 2],
}

pub async fn latest(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Envelope<BookPage>>> {
    listing(&state, Endpoint::Latest, "latest", query.params(), "Failed to fetch latest dramas").await
}

pub async fn trending(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Envelope<BookPage>>> {
    listing(
        &state,
        Endpoint::Trending,
        "trending",
        query.params(),
        "Failed to fetch trending dramas",
    )
    .await
}

async fn listing(
    state: &AppState,
    endpoint: Endpoint,
    name: &str,
    params: PageParams,
    failure: &str,
) -> ApiResult<Json<Envelope<BookPage>>> {
    let key = format!("{name}:{}:{}", params.page, params.limit);
    let payload = state
        .fetch(&key, CacheClass::Listing, &endpoint)
        .await
        .map_err(|err| state.upstream_failure(failure, &err))?;

    let page = match listing_books(&payload) {
        Some(books) => {
            let (books, pagination) = paginate(&books, params);
            BookPage { books, pagination }
        }
        None => BookPage {
            books: Vec::new(),
            pagination: Pagination::empty(params),
        },
    };
    Ok(Envelope::success(page))
}

fn search_endpoint(query: &str, params: PageParams) -> Endpoint {
    Endpoint::Search {
        query: query.to_owned(),
        limit: params.limit,
        offset: (params.page - 1).saturating_mul(params.limit),
    }
}

pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Envelope<SearchPage>>> {
    let term = query.query.as_deref().unwrap_or_default().trim().to_owned();
    if term.chars().count() < 2 {
        return Err(ApiError::bad_request(
            "Search query must be at least 2 characters long",
        ));
    }

    let params = PageParams::from_query(query.page.as_deref(), query.limit.as_deref());
    let key = format!("search:{term}:{}:{}", params.page, params.limit);
    let payload = state
        .fetch(&key, CacheClass::Listing, &search_endpoint(&term, params))
        .await
        .map_err(|err| state.upstream_failure("Failed to search dramas", &err))?;

    let (books, pagination) = match search_books(&payload) {
        Some(books) => paginate_upstream_page(dedupe_books(books), params),
        None => (Vec::new(), Pagination::empty(params)),
    };
    Ok(Envelope::success(SearchPage {
        query: term,
        books,
        pagination,
    }))
}

fn cleaned_book_id(raw: &str) -> ApiResult<String> {
    let id = clean_video_id(raw);
    if id.is_empty() {
        return Err(ApiError::bad_request("Book ID is required"));
    }
    Ok(id)
}

async fn fetch_detail(
    state: &AppState,
    id: &str,
    failure: &str,
) -> ApiResult<(Arc<Value>, Option<DramaDetail>)> {
    let payload = state
        .fetch(
            &format!("detail:{id}"),
            CacheClass::Listing,
            &Endpoint::Detail {
                book_id: id.to_owned(),
            },
        )
        .await
        .map_err(|err| state.id_failure("book ID", failure, &err))?;
    let detail = drama_detail(&payload);
    Ok((payload, detail))
}

pub async fn detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Envelope<EnrichedDetail>>> {
    let id = cleaned_book_id(&id)?;
    let (payload, detail) = fetch_detail(&state, &id, "Failed to fetch drama details").await?;
    let detail = detail.ok_or_else(|| {
        ApiError::not_found("Drama not found")
            .with_details(UpstreamReply::parse(&payload).failure_message("No data returned"))
    })?;
    Ok(Envelope::success(enrich_detail(detail)))
}

pub async fn episodes(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Envelope<EpisodePage>>> {
    let id = cleaned_book_id(&id)?;
    let (_, detail) = fetch_detail(&state, &id, "Failed to fetch drama episodes").await?;
    let series = detail
        .and_then(|detail| detail.video_data)
        .ok_or_else(|| ApiError::not_found("Drama not found or no episodes available"))?;

    let (page, pagination) = paginate(&series.video_list, query.params());
    Ok(Envelope::success(EpisodePage {
        drama_id: id,
        drama_title: series.series_title.clone(),
        total_episodes: series.video_list.len(),
        episodes: page.iter().map(enrich_episode).collect(),
        pagination,
    }))
}

pub async fn episode(
    State(state): State<AppState>,
    Path((id, number)): Path<(String, String)>,
) -> ApiResult<Json<Envelope<EpisodeView>>> {
    let id = cleaned_book_id(&id)?;
    let (_, detail) = fetch_detail(&state, &id, "Failed to fetch episode").await?;
    let series = detail
        .and_then(|detail| detail.video_data)
        .ok_or_else(|| ApiError::not_found("Drama not found"))?;

    let not_found = || ApiError::not_found(format!("Episode {number} not found"));
    let episode_number = number.trim().parse::<i64>().map_err(|_| not_found())?;
    let episode = series.episode(episode_number).ok_or_else(not_found)?;

    let stream_endpoint = Endpoint::Stream {
        video_id: episode.vid.clone(),
    };
    let stream_data = match state
        .fetch(&format!("stream:{}", episode.vid), CacheClass::Stream, &stream_endpoint)
        .await
    {
        Ok(payload) => UpstreamReply::parse(&payload)
            .success_data()
            .map(process_stream_data),
        Err(err) => {
            tracing::warn!(vid = %episode.vid, error = %err, "episode stream unavailable");
            None
        }
    };

    let total_episodes = series.video_list.len();
    Ok(Envelope::success(EpisodeView {
        episode: enrich_episode(episode),
        stream_available: stream_data.is_some(),
        stream_data,
        next_episode: (episode_number < total_episodes as i64).then_some(episode_number + 1),
        prev_episode: (episode_number > 1).then_some(episode_number - 1),
        total_episodes,
        drama_info: DramaInfo {
            id,
            title: series.series_title.clone(),
            cover: series.series_cover.clone(),
            description: series.series_intro.clone(),
        },
    }))
}

async fn trending_books(state: &AppState) -> Result<Option<Vec<Book>>, UpstreamError> {
    let payload = state
        .fetch("trending", CacheClass::Listing, &Endpoint::Trending)
        .await?;
    Ok(listing_books(&payload))
}

async fn latest_books(state: &AppState) -> Result<Option<Vec<Book>>, UpstreamError> {
    let payload = state
        .fetch("latest", CacheClass::Listing, &Endpoint::Latest)
        .await?;
    Ok(listing_books(&payload))
}

pub async fn categories(State(state): State<AppState>) -> ApiResult<Json<Envelope<CategoryList>>> {
    let books = trending_books(&state)
        .await
        .map_err(|err| state.upstream_failure("Failed to fetch categories", &err))?;
    let categories = books
        .map(|books| category_catalogue(&books))
        .unwrap_or_default();
    Ok(Envelope::success(CategoryList {
        total: categories.len(),
        categories,
    }))
}

pub async fn category(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Envelope<CategoryPage>>> {
    let name = name.trim().to_owned();
    if name.is_empty() {
        return Err(ApiError::bad_request("Category name is required"));
    }

    let params = query.params();
    let key = format!("category:{name}:{}:{}", params.page, params.limit);
    let payload = state
        .fetch(&key, CacheClass::Listing, &search_endpoint(&name, params))
        .await
        .map_err(|err| state.upstream_failure("Failed to fetch category dramas", &err))?;

    let (books, pagination) = match search_books(&payload) {
        Some(books) => {
            let matching = books.into_iter().filter(|book| in_category(book, &name));
            paginate_upstream_page(dedupe_books(matching), params)
        }
        None => (Vec::new(), Pagination::empty(params)),
    };
    Ok(Envelope::success(CategoryPage {
        category: name,
        books,
        pagination,
    }))
}

pub async fn similar(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Json<Envelope<SimilarDramas>>> {
    let id = cleaned_book_id(&id)?;
    let limit = coerce_positive(query.limit.as_deref(), DEFAULT_SIMILAR_LIMIT) as usize;
    let (_, detail) = fetch_detail(&state, &id, "Failed to fetch similar dramas").await?;
    let detail = detail
        .filter(|detail| detail.video_data.is_some())
        .ok_or_else(|| ApiError::not_found("Drama not found"))?;
    let title = detail
        .video_data
        .as_ref()
        .and_then(|series| series.series_title.clone());
    let categories = category_names(&detail);

    if categories.is_empty() {
        match trending_books(&state).await {
            Ok(Some(books)) => {
                let similar: Vec<Book> = books
                    .into_iter()
                    .filter(|book| book.book_id != id)
                    .take(limit)
                    .collect();
                return Ok(Envelope::success(SimilarDramas::Popular {
                    total: similar.len(),
                    similar,
                    based_on: "popular_dramas",
                    original_drama: OriginalDrama {
                        id,
                        title,
                        categories: None,
                    },
                }));
            }
            Ok(None) => {}
            Err(err) => tracing::warn!(error = %err, "trending fallback for similar dramas failed"),
        }
    }

    let searches = categories
        .iter()
        .take(SIMILAR_CATEGORY_SEARCHES)
        .map(|category| {
            let state = &state;
            async move {
                let endpoint = Endpoint::Search {
                    query: category.clone(),
                    limit: SIMILAR_SEARCH_LIMIT,
                    offset: 0,
                };
                match state
                    .fetch(&format!("search_similar:{category}"), CacheClass::Listing, &endpoint)
                    .await
                {
                    Ok(payload) => search_books(&payload).unwrap_or_default(),
                    Err(err) => {
                        tracing::warn!(%category, error = %err, "similar-category search failed");
                        Vec::new()
                    }
                }
            }
        });

    let candidates = join_all(searches)
        .await
        .into_iter()
        .flatten()
        .filter(|book| book.book_id != id)
        .map(|book| score_similar(book, &categories));
    let mut similar = dedupe_by_key(candidates, |scored| scored.book.book_id.clone());
    rank_by_score(&mut similar, |scored| scored.relevance_score);
    similar.truncate(limit);

    Ok(Envelope::success(SimilarDramas::ByCategory {
        total: similar.len(),
        similar,
        based_on_categories: categories.clone(),
        original_drama: OriginalDrama {
            id,
            title,
            categories: Some(categories),
        },
    }))
}

pub async fn recommended(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Json<Envelope<Recommendations>>> {
    let limit = coerce_positive(query.limit.as_deref(), DEFAULT_RECOMMENDED_LIMIT) as usize;
    let (trending, latest) = tokio::join!(trending_books(&state), latest_books(&state));

    let mut candidates = Vec::new();
    for (source, books) in [
        (RecommendationSource::Trending, trending),
        (RecommendationSource::Latest, latest),
    ] {
        match books {
            Ok(books) => candidates.extend(
                books
                    .unwrap_or_default()
                    .into_iter()
                    .map(|book| recommend(book, source)),
            ),
            Err(err) => tracing::warn!(?source, error = %err, "recommendation source unavailable"),
        }
    }

    let mut recommended = dedupe_by_key(candidates, |item| item.book.book_id.clone());
    rank_by_score(&mut recommended, |item| item.recommendation_score);
    recommended.truncate(limit);

    Ok(Envelope::success(Recommendations {
        total: recommended.len(),
        recommended,
        sources: [RecommendationSource::Trending, RecommendationSource::Latest],
    }))
}
