//! PubMed adapter: two-step NCBI E-utilities retrieval (esearch -> efetch).
//!
//! Grounded on the reference architecture's `roxmltree`-based Atom-feed
//! parser (`client/providers/arxiv.rs`), adapted to the Entrez XML shape
//! instead (esearch's `IdList`, efetch's `PubmedArticleSet`).

use super::{ProviderAdapter, SearchOutcome, StrategyRequest};
use crate::model::{Article, Source};
use crate::{Error, Result};
use async_trait::async_trait;
use roxmltree::Document;
use std::time::Duration;
use tracing::{debug, warn};

pub struct PubmedAdapter {
    http: reqwest::Client,
    base_url: String,
}

impl PubmedAdapter {
    #[must_use]
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    fn build_search_query(&self, request: &StrategyRequest) -> String {
        let clause = request
            .keywords
            .iter()
            .map(|k| format!("\"{k}\"[Title/Abstract]"))
            .collect::<Vec<_>>()
            .join(" OR ");
        let date_clause = format!(
            "{}:{}[dp]",
            request.start.format("%Y/%m/%d"),
            request.end.format("%Y/%m/%d")
        );
        format!("({clause}) AND {date_clause}")
    }

    /// Retries transient failures (network errors, 429, 5xx) up to the
    /// crate's default retry policy.
    async fn esearch(&self, request: &StrategyRequest) -> Result<Vec<String>> {
        let url = format!("{}/esearch.fcgi", self.base_url.trim_end_matches('/'));
        let term = self.build_search_query(request);
        let retmax = request.limit.to_string();
        debug!(url = %url, term = %term, "pubmed esearch");

        let attempt = || async {
            let response = self
                .http
                .get(&url)
                .query(&[
                    ("db", "pubmed"),
                    ("term", &term),
                    ("retmax", &retmax),
                    ("retmode", "xml"),
                ])
                .send()
                .await
                .map_err(Error::Http)?;
            super::classify_status("pubmed", response.status())?;
            let body = response.text().await.map_err(Error::Http)?;
            parse_esearch(&body)
        };
        crate::resilience::retry(attempt, "pubmed_esearch").await
    }

    /// Retries transient failures the same way [`Self::esearch`] does.
    async fn efetch(&self, ids: &[String]) -> Result<Vec<Article>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/efetch.fcgi", self.base_url.trim_end_matches('/'));
        let id_list = ids.join(",");

        let attempt = || async {
            let response = self
                .http
                .get(&url)
                .query(&[("db", "pubmed"), ("id", &id_list), ("retmode", "xml")])
                .send()
                .await
                .map_err(Error::Http)?;
            super::classify_status("pubmed", response.status())?;
            let body = response.text().await.map_err(Error::Http)?;
            parse_efetch(&body)
        };
        crate::resilience::retry(attempt, "pubmed_efetch").await
    }
}

fn parse_esearch(xml: &str) -> Result<Vec<String>> {
    let doc = Document::parse(xml)
        .map_err(|e| Error::Parse {
            context: "pubmed esearch".to_string(),
            message: e.to_string(),
        })?;
    let ids = doc
        .descendants()
        .filter(|n| n.has_tag_name("Id"))
        .filter_map(|n| n.text().map(str::to_string))
        .collect();
    Ok(ids)
}

fn text_of<'a>(node: roxmltree::Node<'a, 'a>, tag: &str) -> Option<String> {
    node.descendants()
        .find(|n| n.has_tag_name(tag))
        .and_then(|n| n.text())
        .map(|s| s.trim().to_string())
}

fn parse_efetch(xml: &str) -> Result<Vec<Article>> {
    let doc = Document::parse(xml)
        .map_err(|e| Error::Parse {
            context: "pubmed efetch".to_string(),
            message: e.to_string(),
        })?;

    let mut articles = Vec::new();
    for entry in doc.descendants().filter(|n| n.has_tag_name("PubmedArticle")) {
        let pmid = text_of(entry, "PMID").unwrap_or_default();
        let title = text_of(entry, "ArticleTitle").unwrap_or_default();

        let abstract_text = entry
            .descendants()
            .filter(|n| n.has_tag_name("AbstractText"))
            .filter_map(|n| n.text())
            .collect::<Vec<_>>()
            .join(" ");

        let authors = entry
            .descendants()
            .filter(|n| n.has_tag_name("Author"))
            .filter_map(|author| {
                let last = text_of(author, "LastName")?;
                let first = text_of(author, "ForeName").unwrap_or_default();
                Some(format!("{first} {last}").trim().to_string())
            })
            .collect::<Vec<_>>();

        let year = text_of(entry, "Year");
        let medline_date = text_of(entry, "MedlineDate");
        let raw_date = year.or(medline_date);

        if title.is_empty() && pmid.is_empty() {
            continue;
        }
        let url = format!("https://pubmed.ncbi.nlm.nih.gov/{pmid}/");
        let mut article = Article::new(title, abstract_text, url, Source::Pubmed, String::new());
        article.raw_date = raw_date;
        article.authors = authors;
        articles.push(article);
    }
    Ok(articles)
}

#[async_trait]
impl ProviderAdapter for PubmedAdapter {
    fn source(&self) -> Source {
        Source::Pubmed
    }

    async fn search(&self, request: &StrategyRequest) -> SearchOutcome {
        let ids = match self.esearch(request).await {
            Ok(ids) => ids,
            Err(err) => {
                warn!(error = %err, "pubmed esearch failed");
                return SearchOutcome::failed(Error::ProviderFailed {
                    provider: "pubmed".to_string(),
                    strategy: request.strategy_name.clone(),
                    cause: err.to_string(),
                });
            }
        };

        match self.efetch(&ids).await {
            Ok(mut articles) => {
                for article in &mut articles {
                    article.strategy = request.strategy_name.clone();
                }
                SearchOutcome::ok(articles)
            }
            Err(err) => {
                warn!(error = %err, "pubmed efetch failed");
                SearchOutcome::failed(Error::ProviderFailed {
                    provider: "pubmed".to_string(),
                    strategy: request.strategy_name.clone(),
                    cause: err.to_string(),
                })
            }
        }
    }

    fn min_interval(&self) -> Duration {
        // NCBI's documented rate rule without an API key.
        Duration::from_millis(334)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ESEARCH_XML: &str = r#"<?xml version="1.0"?>
<eSearchResult><IdList><Id>111</Id><Id>222</Id></IdList></eSearchResult>"#;

    const EFETCH_XML: &str = r#"<?xml version="1.0"?>
<PubmedArticleSet>
  <PubmedArticle>
    <MedlineCitation>
      <PMID>111</PMID>
      <Article>
        <ArticleTitle>Immunotherapy outcomes in prostate cancer</ArticleTitle>
        <Abstract><AbstractText>We studied outcomes.</AbstractText></Abstract>
        <AuthorList>
          <Author><LastName>Smith</LastName><ForeName>Jane</ForeName></Author>
        </AuthorList>
        <Journal><JournalIssue><PubDate><Year>2024</Year></PubDate></JournalIssue></Journal>
      </Article>
    </MedlineCitation>
  </PubmedArticle>
</PubmedArticleSet>"#;

    #[test]
    fn parses_esearch_ids() {
        let ids = parse_esearch(ESEARCH_XML).unwrap();
        assert_eq!(ids, vec!["111".to_string(), "222".to_string()]);
    }

    #[test]
    fn parses_efetch_articles_with_authors_and_date() {
        let articles = parse_efetch(EFETCH_XML).unwrap();
        assert_eq!(articles.len(), 1);
        let a = &articles[0];
        assert_eq!(a.title, "Immunotherapy outcomes in prostate cancer");
        assert_eq!(a.authors, vec!["Jane Smith".to_string()]);
        assert_eq!(a.raw_date.as_deref(), Some("2024"));
        assert!(a.url.contains("111"));
    }

    #[test]
    fn search_query_joins_keywords_with_or_and_date_range() {
        let adapter = PubmedAdapter::new(reqwest::Client::new(), "https://example.com");
        let request = StrategyRequest {
            keywords: vec!["prostate cancer".to_string(), "immunotherapy".to_string()],
            start: chrono::NaiveDate::from_ymd_opt(2024, 10, 1).unwrap(),
            end: chrono::NaiveDate::from_ymd_opt(2024, 10, 17).unwrap(),
            limit: 50,
            strategy_name: "primary".to_string(),
            domains: vec![],
            neural: false,
        };
        let query = adapter.build_search_query(&request);
        assert!(query.contains("\"prostate cancer\"[Title/Abstract]"));
        assert!(query.contains("OR"));
        assert!(query.contains("2024/10/01:2024/10/17[dp]"));
    }
}
