//! Deterministic post-processing of search fan-out results
//!
//! Items are deduplicated by normalized URL and then grouped with a greedy,
//! single-pass token-set Jaccard clustering. Both steps depend only on
//! their input order, so identical inputs always give identical output.

use crate::types::{Coverage, SearchHit, SearchResultItem};
use std::collections::{BTreeSet, HashMap};
use url::Url;

/// Default Jaccard similarity needed to join an existing cluster
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.2;

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "from", "are", "was", "were", "you", "your",
    "how", "what", "why", "when", "who", "which", "into", "about", "can", "will", "has", "have",
    "its", "our", "their", "not", "but", "all", "more", "new", "best", "top", "use", "using",
];

/// Hits returned by one successful per-keyword query
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub keyword_id: String,
    pub hits: Vec<SearchHit>,
}

/// Cluster membership before the model has labelled it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemCluster {
    pub id: String,
    pub item_ids: Vec<String>,
}

/// Deterministic product of one search fan-out, before synthesis
#[derive(Debug, Clone, PartialEq)]
pub struct SearchFindings {
    pub items: Vec<SearchResultItem>,
    pub clusters: Vec<ItemCluster>,
    pub coverage: Coverage,
}

/// Canonical form of a URL for duplicate detection.
///
/// Scheme, `www.` prefix, fragment, `utm_*` parameters and trailing
/// slashes are ignored; host comparison is case-insensitive. Unparseable
/// input falls back to its trimmed lowercase form.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let parsed = match Url::parse(trimmed) {
        Ok(url) => url,
        Err(_) => return trimmed.trim_end_matches('/').to_lowercase(),
    };

    let host = parsed.host_str().unwrap_or_default();
    let host = host.strip_prefix("www.").unwrap_or(host);

    let mut normalized = host.to_string();
    if let Some(port) = parsed.port() {
        normalized.push_str(&format!(":{}", port));
    }
    normalized.push_str(parsed.path().trim_end_matches('/'));

    let params: Vec<String> = parsed
        .query_pairs()
        .filter(|(key, _)| !key.starts_with("utm_"))
        .map(|(key, value)| format!("{}={}", key, value))
        .collect();
    if !params.is_empty() {
        normalized.push('?');
        normalized.push_str(&params.join("&"));
    }

    normalized
}

/// Merge per-query hits into one deduplicated item list.
///
/// Outcomes must be in query order. The first occurrence of a normalized
/// URL wins; later occurrences only add their keyword id. Items get ids
/// `src-1`, `src-2`, ... in first-occurrence order.
pub fn merge_hits(outcomes: &[QueryOutcome]) -> Vec<SearchResultItem> {
    let mut items: Vec<SearchResultItem> = Vec::new();
    let mut index_by_url: HashMap<String, usize> = HashMap::new();

    for outcome in outcomes {
        let mut hits: Vec<&SearchHit> = outcome.hits.iter().collect();
        hits.sort_by_key(|h| h.position);

        for hit in hits {
            if hit.url.trim().is_empty() {
                continue;
            }
            let normalized = normalize_url(&hit.url);

            match index_by_url.get(&normalized) {
                Some(&idx) => {
                    let item = &mut items[idx];
                    if !item.keyword_ids.contains(&outcome.keyword_id) {
                        item.keyword_ids.push(outcome.keyword_id.clone());
                    }
                    item.source_rank = item.source_rank.min(hit.position);
                }
                None => {
                    index_by_url.insert(normalized.clone(), items.len());
                    items.push(SearchResultItem {
                        id: format!("src-{}", items.len() + 1),
                        url: hit.url.trim().to_string(),
                        normalized_url: normalized,
                        title: hit.title.trim().to_string(),
                        snippet: hit.snippet.trim().to_string(),
                        source_rank: hit.position,
                        keyword_ids: vec![outcome.keyword_id.clone()],
                    });
                }
            }
        }
    }

    items
}

fn tokens(item: &SearchResultItem) -> BTreeSet<String> {
    format!("{} {}", item.title, item.snippet)
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 3 && !STOPWORDS.contains(t))
        .map(str::to_string)
        .collect()
}

fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    intersection / union
}

/// Group items by topical similarity.
///
/// Items are visited in list order. Each joins the first cluster whose seed
/// (its first member) is at least `threshold` similar, otherwise it seeds a
/// new cluster. Cluster ids are `cl-1`, `cl-2`, ... in creation order.
pub fn cluster_items(items: &[SearchResultItem], threshold: f64) -> Vec<ItemCluster> {
    let mut clusters: Vec<(BTreeSet<String>, ItemCluster)> = Vec::new();

    for item in items {
        let item_tokens = tokens(item);
        let target = clusters
            .iter_mut()
            .find(|(seed, _)| jaccard(seed, &item_tokens) >= threshold);

        match target {
            Some((_, cluster)) => cluster.item_ids.push(item.id.clone()),
            None => {
                let id = format!("cl-{}", clusters.len() + 1);
                clusters.push((
                    item_tokens,
                    ItemCluster {
                        id,
                        item_ids: vec![item.id.clone()],
                    },
                ));
            }
        }
    }

    clusters.into_iter().map(|(_, cluster)| cluster).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn hit(url: &str, title: &str, snippet: &str, position: u32) -> SearchHit {
        SearchHit {
            title: title.to_string(),
            url: url.to_string(),
            snippet: snippet.to_string(),
            position,
        }
    }

    #[rstest]
    #[case("https://www.Example.com/Guide/", "example.com/Guide")]
    #[case("http://example.com/guide#intro", "example.com/guide")]
    #[case("https://example.com/guide?utm_source=x&page=2", "example.com/guide?page=2")]
    #[case("https://example.com:8443/a", "example.com:8443/a")]
    #[case("not a url/", "not a url")]
    fn test_normalize_url(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(normalize_url(raw), expected);
    }

    #[test]
    fn test_merge_dedupes_across_queries() {
        let outcomes = vec![
            QueryOutcome {
                keyword_id: "kw-1".to_string(),
                hits: vec![
                    hit("https://a.com/x", "A", "alpha", 1),
                    hit("https://b.com/y", "B", "beta", 2),
                ],
            },
            QueryOutcome {
                keyword_id: "kw-2".to_string(),
                hits: vec![
                    hit("http://www.a.com/x/", "A again", "alpha", 1),
                    hit("https://c.com/z", "C", "gamma", 2),
                ],
            },
        ];

        let items = merge_hits(&outcomes);
        let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["src-1", "src-2", "src-3"]);

        let first = &items[0];
        assert_eq!(first.title, "A");
        assert_eq!(first.keyword_ids, vec!["kw-1", "kw-2"]);

        let unique: BTreeSet<_> = items.iter().map(|i| i.normalized_url.clone()).collect();
        assert_eq!(unique.len(), items.len());
    }

    #[test]
    fn test_merge_orders_hits_by_position() {
        let outcomes = vec![QueryOutcome {
            keyword_id: "kw-1".to_string(),
            hits: vec![
                hit("https://second.com", "Second", "", 2),
                hit("https://first.com", "First", "", 1),
            ],
        }];
        let items = merge_hits(&outcomes);
        assert_eq!(items[0].title, "First");
        assert_eq!(items[0].source_rank, 1);
    }

    #[test]
    fn test_clustering_is_deterministic_and_groups_similar_items() {
        let outcomes = vec![QueryOutcome {
            keyword_id: "kw-1".to_string(),
            hits: vec![
                hit("https://a.com", "Rust async runtime", "tokio async runtime internals", 1),
                hit("https://b.com", "Tokio runtime guide", "async runtime tokio scheduler", 2),
                hit("https://c.com", "Gardening tips", "grow tomatoes indoors", 3),
            ],
        }];
        let items = merge_hits(&outcomes);

        let first = cluster_items(&items, DEFAULT_SIMILARITY_THRESHOLD);
        let second = cluster_items(&items, DEFAULT_SIMILARITY_THRESHOLD);
        assert_eq!(first, second);

        assert_eq!(first.len(), 2);
        assert_eq!(first[0].id, "cl-1");
        assert_eq!(first[0].item_ids, vec!["src-1", "src-2"]);
        assert_eq!(first[1].item_ids, vec!["src-3"]);
    }

    #[test]
    fn test_every_item_lands_in_exactly_one_cluster() {
        let outcomes = vec![QueryOutcome {
            keyword_id: "kw-1".to_string(),
            hits: (1..=6)
                .map(|i| hit(&format!("https://site{}.com", i), "", "", i))
                .collect(),
        }];
        let items = merge_hits(&outcomes);
        let clusters = cluster_items(&items, DEFAULT_SIMILARITY_THRESHOLD);

        let members: Vec<_> = clusters.iter().flat_map(|c| c.item_ids.clone()).collect();
        assert_eq!(members.len(), items.len());
        // Empty token sets never match, so each item seeds its own cluster
        assert_eq!(clusters.len(), 6);
    }
}
