//! Wikidata SPARQL lookup, the fallback title source.
//!
//! The same query runs twice, once with localized labels and once with
//! English labels. Wikidata answers with the bare entity id (`Q12345`) when an
//! entity has no label in the requested language; such labels are dropped.

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::{debug, warn};

use super::tmdb::year_from_date;
use super::traits::MetadataProvider;
use crate::config::Config;
use crate::errors::ProviderResult;
use crate::gateway::{GatewayRequest, RequestGateway};
use crate::models::{MediaKind, TitleInfo};

pub const PROVIDER_NAME: &str = "wikidata";

const ENGLISH: &str = "en";

static ENTITY_ID: OnceLock<Regex> = OnceLock::new();
static IMDB_ID: OnceLock<Regex> = OnceLock::new();

fn entity_id_regex() -> &'static Regex {
    ENTITY_ID.get_or_init(|| Regex::new(r"^Q\d+$").expect("valid entity id regex"))
}

fn imdb_id_regex() -> &'static Regex {
    IMDB_ID.get_or_init(|| Regex::new(r"^tt\d+$").expect("valid imdb id regex"))
}

/// Drop labels that are really unlabeled entity ids
pub fn sanitize_label(label: Option<String>) -> Option<String> {
    label
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty() && !entity_id_regex().is_match(l))
}

#[derive(Debug, Deserialize)]
struct SparqlResponse {
    results: SparqlResults,
}

#[derive(Debug, Deserialize)]
struct SparqlResults {
    #[serde(default)]
    bindings: Vec<HashMap<String, SparqlValue>>,
}

#[derive(Debug, Deserialize)]
struct SparqlValue {
    value: String,
}

type Binding = HashMap<String, SparqlValue>;

fn binding_value(binding: Option<&Binding>, field: &str) -> Option<String> {
    binding
        .and_then(|b| b.get(field))
        .map(|v| v.value.clone())
}

/// Kind from the entity's `instance of` label, in Czech or English
fn kind_from_instance(label: &str) -> Option<MediaKind> {
    let label = label.to_lowercase();
    if label.contains("series") || label.contains("seriál") {
        Some(MediaKind::Series)
    } else if label.contains("film") {
        Some(MediaKind::Movie)
    } else {
        None
    }
}

fn title_query(imdb_id: &str, language: &str) -> String {
    format!(
        r#"SELECT ?film ?filmLabel ?originalTitle ?publicationDate ?instanceLabel WHERE {{
  ?film wdt:P345 "{imdb_id}".
  OPTIONAL {{ ?film wdt:P1476 ?originalTitle. }}
  OPTIONAL {{ ?film wdt:P577 ?publicationDate. }}
  OPTIONAL {{ ?film wdt:P31 ?instance. }}
  SERVICE wikibase:label {{ bd:serviceParam wikibase:language "{language}". }}
}}"#
    )
}

fn merge_bindings(localized: Option<&Binding>, english: Option<&Binding>) -> Option<TitleInfo> {
    let localized_title = sanitize_label(binding_value(localized, "filmLabel"));
    let english_title = sanitize_label(binding_value(english, "filmLabel"));
    let original_title = sanitize_label(
        binding_value(localized, "originalTitle").or_else(|| binding_value(english, "originalTitle")),
    );
    let year = year_from_date(
        binding_value(localized, "publicationDate")
            .or_else(|| binding_value(english, "publicationDate"))
            .as_deref(),
    );
    let kind = binding_value(localized, "instanceLabel")
        .as_deref()
        .and_then(kind_from_instance)
        .or_else(|| {
            binding_value(english, "instanceLabel")
                .as_deref()
                .and_then(kind_from_instance)
        });

    let info = TitleInfo {
        localized_title,
        original_language_title: english_title,
        original_title,
        year,
        kind,
        external_metadata_id: None,
    };
    info.display_title().is_some().then_some(info)
}

pub struct WikidataProvider {
    gateway: RequestGateway,
    endpoint: String,
    language: String,
}

impl WikidataProvider {
    pub fn new<E: Into<String>, L: Into<String>>(gateway: RequestGateway, endpoint: E, language: L) -> Self {
        Self {
            gateway,
            endpoint: endpoint.into(),
            language: language.into(),
        }
    }

    pub fn from_config(gateway: RequestGateway, config: &Config) -> Self {
        Self::new(
            gateway,
            config.endpoints.wikidata_endpoint.clone(),
            config.metadata.wikidata_language.clone(),
        )
    }

    async fn first_binding(&self, imdb_id: &str, language: &str) -> ProviderResult<Option<Binding>> {
        let request = GatewayRequest::get(PROVIDER_NAME, self.endpoint.as_str())
            .query("query", title_query(imdb_id, language))
            .header("Accept", "application/sparql-results+json");
        let response: SparqlResponse = self.gateway.enqueue(request).await?.json(PROVIDER_NAME)?;
        Ok(response.results.bindings.into_iter().next())
    }
}

#[async_trait]
impl MetadataProvider for WikidataProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn find_by_external_id(&self, external_id: &str) -> ProviderResult<Option<TitleInfo>> {
        // The id is interpolated into the query text
        if !imdb_id_regex().is_match(external_id) {
            debug!("Skipping Wikidata lookup for non-IMDb id {}", external_id);
            return Ok(None);
        }

        debug!(
            "Fetching {} and English titles for {} from Wikidata",
            self.language, external_id
        );
        let (localized, english) = tokio::join!(
            self.first_binding(external_id, &self.language),
            self.first_binding(external_id, ENGLISH),
        );

        let (localized, english) = match (localized, english) {
            (Err(e), Err(_)) => return Err(e),
            (Err(e), Ok(english)) => {
                warn!("Wikidata {} lookup failed for {}: {}", self.language, external_id, e);
                (None, english)
            }
            (Ok(localized), Err(e)) => {
                warn!("Wikidata English lookup failed for {}: {}", external_id, e);
                (localized, None)
            }
            (Ok(localized), Ok(english)) => (localized, english),
        };

        let info = merge_bindings(localized.as_ref(), english.as_ref());
        match &info {
            Some(info) => debug!(
                "Wikidata titles for {}: localized {:?}, English {:?}, year {:?}",
                external_id, info.localized_title, info.original_language_title, info.year
            ),
            None => debug!("Wikidata has no usable title for {}", external_id),
        }
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::RouteTransport;
    use rstest::rstest;
    use std::sync::Arc;

    fn sparql_body(label: &str, extra: &str) -> String {
        format!(
            r#"{{"results":{{"bindings":[{{"filmLabel":{{"type":"literal","value":"{label}"}}{extra}}}]}}}}"#
        )
    }

    #[rstest]
    #[case(Some("Q12345"), None)]
    #[case(Some("  "), None)]
    #[case(Some("Hra o trůny"), Some("Hra o trůny"))]
    #[case(Some("Q-Force"), Some("Q-Force"))]
    #[case(None, None)]
    fn test_sanitize_label(#[case] input: Option<&str>, #[case] expected: Option<&str>) {
        assert_eq!(
            sanitize_label(input.map(str::to_string)).as_deref(),
            expected
        );
    }

    #[rstest]
    #[case("televizní seriál", Some(MediaKind::Series))]
    #[case("television series", Some(MediaKind::Series))]
    #[case("film", Some(MediaKind::Movie))]
    #[case("animated feature film", Some(MediaKind::Movie))]
    #[case("human", None)]
    fn test_kind_from_instance(#[case] label: &str, #[case] expected: Option<MediaKind>) {
        assert_eq!(kind_from_instance(label), expected);
    }

    #[tokio::test]
    async fn test_lookup_merges_both_languages() {
        let extra = r#","publicationDate":{"value":"2011-04-17T00:00:00Z"},"instanceLabel":{"value":"television series"}"#;
        let transport = Arc::new(
            RouteTransport::new()
                .route("language \"cs\"", 200, &sparql_body("Q23572", extra))
                .route("language \"en\"", 200, &sparql_body("Game of Thrones", extra)),
        );
        let provider = WikidataProvider::new(transport.gateway(), "https://wd.test/sparql", "cs");

        let info = provider.find_by_external_id("tt0944947").await.unwrap().unwrap();
        assert_eq!(info.localized_title, None);
        assert_eq!(info.original_language_title.as_deref(), Some("Game of Thrones"));
        assert_eq!(info.display_title(), Some("Game of Thrones"));
        assert_eq!(info.year, Some(2011));
        assert_eq!(info.kind, Some(MediaKind::Series));

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0]
            .headers
            .contains(&("Accept".to_string(), "application/sparql-results+json".to_string())));
    }

    #[tokio::test]
    async fn test_lookup_survives_one_failed_language() {
        let transport = Arc::new(
            RouteTransport::new()
                .route("language \"cs\"", 500, "")
                .route("language \"en\"", 200, &sparql_body("Game of Thrones", "")),
        );
        let provider = WikidataProvider::new(transport.gateway(), "https://wd.test/sparql", "cs");

        let info = provider.find_by_external_id("tt0944947").await.unwrap().unwrap();
        assert_eq!(info.display_title(), Some("Game of Thrones"));
    }

    #[tokio::test]
    async fn test_lookup_without_bindings_is_none() {
        let transport = Arc::new(
            RouteTransport::new().route("sparql", 200, r#"{"results":{"bindings":[]}}"#),
        );
        let provider = WikidataProvider::new(transport.gateway(), "https://wd.test/sparql", "cs");
        assert!(provider.find_by_external_id("tt0000001").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_non_imdb_ids_are_not_queried() {
        let transport = Arc::new(RouteTransport::new());
        let provider = WikidataProvider::new(transport.gateway(), "https://wd.test/sparql", "cs");

        assert!(provider.find_by_external_id("kitsu:1\" }").await.unwrap().is_none());
        assert!(transport.requests().is_empty());
    }
}
