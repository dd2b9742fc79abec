//! Scored article and post collection.
//!
//! News is walked in date chunks. Inside a chunk each day runs as its own
//! task, bounded by a semaphore; every article gets a time budget and a day
//! always ends up with exactly `articles_per_day` rows.

use crate::align::DateRange;
use crate::config::{NewsConfig, RedditConfig};
use crate::models::{ArticleRef, RedditPost, SentimentRecord};
use crate::sentiment::SentimentScorer;
use crate::sources::cleaner::{detect_language, is_credible};
use crate::sources::{NewsSource, PageSource, PostSource};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct CollectStats {
    pub scored: usize,
    pub placeholders: usize,
    pub timeouts: usize,
    pub errors: usize,
}

enum Outcome {
    Scored(SentimentRecord),
    TimedOut,
    Unusable,
}

pub struct NewsCollector {
    news: Arc<dyn NewsSource>,
    pages: Arc<dyn PageSource>,
    scorer: Arc<dyn SentimentScorer>,
    config: NewsConfig,
}

impl NewsCollector {
    pub fn new(
        news: Arc<dyn NewsSource>,
        pages: Arc<dyn PageSource>,
        scorer: Arc<dyn SentimentScorer>,
        config: NewsConfig,
    ) -> Self {
        Self {
            news,
            pages,
            scorer,
            config,
        }
    }

    /// Scored records for every day of `range`, sorted by (date, title).
    pub async fn collect(&self, range: DateRange) -> (Vec<SentimentRecord>, CollectStats) {
        let mut stats = CollectStats::default();
        let mut by_day: BTreeMap<NaiveDate, Vec<SentimentRecord>> = BTreeMap::new();
        let sem = Arc::new(Semaphore::new(self.config.concurrency.max(1)));

        for chunk in range.chunks(self.config.batch_days) {
            let articles = match self.news.search_articles(chunk).await {
                Ok(a) => a,
                Err(e) => {
                    warn!("{}..{}: news search failed: {:#}", chunk.start(), chunk.end(), e);
                    stats.errors += 1;
                    Vec::new()
                }
            };
            let grouped = self.group_credible(articles, chunk);
            info!(
                "{}..{}: {} credible articles",
                chunk.start(),
                chunk.end(),
                grouped.values().map(Vec::len).sum::<usize>()
            );

            let mut handles = Vec::new();
            for date in chunk.days() {
                let candidates = grouped.get(&date).cloned().unwrap_or_default();
                let pages = Arc::clone(&self.pages);
                let scorer = Arc::clone(&self.scorer);
                let sem = Arc::clone(&sem);
                let per_day = self.config.articles_per_day;
                let budget = Duration::from_secs(self.config.article_timeout_secs);

                let handle = tokio::spawn(async move {
                    let _permit = sem.acquire().await?;
                    Ok::<_, anyhow::Error>(
                        score_day(pages, scorer, candidates, per_day, budget).await,
                    )
                });
                handles.push((date, handle));
            }

            for (date, handle) in handles {
                match handle.await {
                    Ok(Ok((records, day_stats))) => {
                        stats.scored += day_stats.scored;
                        stats.timeouts += day_stats.timeouts;
                        by_day.insert(date, records);
                    }
                    Ok(Err(e)) => {
                        warn!("{}: {:#}", date, e);
                        stats.errors += 1;
                    }
                    Err(e) => {
                        error!("Task panic for {}: {}", date, e);
                        stats.errors += 1;
                    }
                }
            }
        }

        let mut records = Vec::with_capacity(range.len() * self.config.articles_per_day);
        for date in range.days() {
            let mut day = by_day.remove(&date).unwrap_or_default();
            while day.len() < self.config.articles_per_day {
                day.push(SentimentRecord::placeholder(date));
            }
            records.extend(day);
        }
        stats.placeholders = records.iter().filter(|r| r.is_placeholder()).count();
        sort_records(&mut records);
        (records, stats)
    }

    /// Credible, de-duplicated articles of `chunk`, grouped by day.
    fn group_credible(
        &self,
        articles: Vec<ArticleRef>,
        chunk: DateRange,
    ) -> BTreeMap<NaiveDate, Vec<ArticleRef>> {
        let mut seen = HashSet::new();
        let mut grouped: BTreeMap<NaiveDate, Vec<ArticleRef>> = BTreeMap::new();
        for a in articles {
            if !chunk.contains(a.seen_date) || !is_credible(&a.url, &self.config.credible_domains) {
                continue;
            }
            if seen.insert(a.url.clone()) {
                grouped.entry(a.seen_date).or_default().push(a);
            }
        }
        grouped
    }
}

/// Score candidates in order until `per_day` records exist. Unreadable pages
/// are skipped; an article that exceeds its budget counts as a neutral
/// placeholder.
async fn score_day(
    pages: Arc<dyn PageSource>,
    scorer: Arc<dyn SentimentScorer>,
    candidates: Vec<ArticleRef>,
    per_day: usize,
    budget: Duration,
) -> (Vec<SentimentRecord>, CollectStats) {
    let mut out = Vec::with_capacity(per_day);
    let mut stats = CollectStats::default();

    for article in candidates {
        if out.len() >= per_day {
            break;
        }
        match score_article(pages.as_ref(), scorer.as_ref(), &article, budget).await {
            Outcome::Scored(r) => {
                stats.scored += 1;
                out.push(r);
            }
            Outcome::TimedOut => {
                warn!("{}: timed out after {:?}", article.url, budget);
                stats.timeouts += 1;
                out.push(SentimentRecord::placeholder(article.seen_date));
            }
            Outcome::Unusable => {}
        }
    }
    (out, stats)
}

async fn score_article(
    pages: &dyn PageSource,
    scorer: &dyn SentimentScorer,
    article: &ArticleRef,
    budget: Duration,
) -> Outcome {
    let work = async {
        let text = pages.article_text(&article.url).await?;
        let language = article.language.clone().or_else(|| detect_language(&text));
        Ok::<_, anyhow::Error>((scorer.score(&text).await, language))
    };
    match timeout(budget, work).await {
        Err(_) => Outcome::TimedOut,
        Ok(Err(e)) => {
            debug!("{}: {:#}", article.url, e);
            Outcome::Unusable
        }
        Ok(Ok((s, language))) => Outcome::Scored(SentimentRecord {
            date: article.seen_date,
            title: Some(article.title.clone()),
            score: s.score,
            sentiment: s.label,
            language,
        }),
    }
}

/// Date first, then title; placeholders sort ahead of titled rows.
pub fn sort_records(records: &mut [SentimentRecord]) {
    records.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.title.cmp(&b.title)));
}

// ── Reddit ────────────────────────────────────────────────────────────────────

/// Search every configured subreddit and score each post. A subreddit that
/// fails is logged and skipped.
pub async fn collect_posts(
    posts: Arc<dyn PostSource>,
    scorer: Arc<dyn SentimentScorer>,
    config: &RedditConfig,
    range: DateRange,
) -> (Vec<SentimentRecord>, CollectStats) {
    let sem = Arc::new(Semaphore::new(config.concurrency.max(1)));
    let mut stats = CollectStats::default();
    let mut handles = Vec::new();

    for sub in &config.subreddits {
        let name = sub.clone();
        let posts = Arc::clone(&posts);
        let sem = Arc::clone(&sem);
        let handle = tokio::spawn(async move {
            let _permit = sem.acquire().await?;
            posts.fetch_posts(&name, range).await
        });
        handles.push((sub.clone(), handle));
    }

    let mut all: Vec<RedditPost> = Vec::new();
    for (sub, handle) in handles {
        match handle.await {
            Ok(Ok(batch)) => {
                info!("r/{}: {} posts", sub, batch.len());
                all.extend(batch);
            }
            Ok(Err(e)) => {
                warn!("r/{}: {:#}", sub, e);
                stats.errors += 1;
            }
            Err(e) => {
                error!("Task panic for r/{}: {}", sub, e);
                stats.errors += 1;
            }
        }
    }

    // Cross-posts show up once per subreddit
    let mut seen = HashSet::new();
    all.retain(|p| seen.insert((p.date, p.title.to_lowercase())));

    let mut records = Vec::with_capacity(all.len());
    for post in &all {
        let text = post.text();
        let s = scorer.score(&text).await;
        records.push(SentimentRecord {
            date: post.date,
            title: Some(post.title.clone()),
            score: s.score,
            sentiment: s.label,
            language: detect_language(&text),
        });
    }
    stats.scored = records.len();
    sort_records(&mut records);
    (records, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SentimentLabel;
    use crate::sentiment::LexiconScorer;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, day).unwrap()
    }

    fn art(day: u32, url: &str, title: &str) -> ArticleRef {
        ArticleRef {
            url: url.to_string(),
            title: title.to_string(),
            seen_date: d(day),
            language: Some("English".into()),
        }
    }

    struct FakeNews(Vec<ArticleRef>);

    #[async_trait]
    impl NewsSource for FakeNews {
        async fn search_articles(&self, range: DateRange) -> Result<Vec<ArticleRef>> {
            Ok(self
                .0
                .iter()
                .filter(|a| range.contains(a.seen_date))
                .cloned()
                .collect())
        }
    }

    /// Serves canned text; "slow" URLs never answer, unknown URLs fail.
    struct FakePages(HashMap<String, String>);

    #[async_trait]
    impl PageSource for FakePages {
        async fn article_text(&self, url: &str) -> Result<String> {
            if url.contains("slow") {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            self.0
                .get(url)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("404"))
        }
    }

    fn config() -> NewsConfig {
        NewsConfig {
            credible_domains: vec!["reuters.com".into(), "cnbc.com".into()],
            articles_per_day: 2,
            batch_days: 2,
            concurrency: 2,
            article_timeout_secs: 1,
            ..NewsConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_collect_pads_filters_and_times_out() {
        let articles = vec![
            art(1, "https://www.reuters.com/good", "Apple posts record profits"),
            art(1, "https://www.reuters.com/good", "duplicate url"),
            art(1, "https://blog.example.com/x", "Not credible"),
            art(1, "https://www.cnbc.com/missing", "Dead link"),
            art(1, "https://www.cnbc.com/bad", "Shares plunge"),
            art(1, "https://www.reuters.com/late", "Never scored"),
            art(2, "https://www.reuters.com/slow", "Slow page"),
        ];
        let mut pages = HashMap::new();
        pages.insert("https://www.reuters.com/good".to_string(), "great strong growth".to_string());
        pages.insert("https://www.cnbc.com/bad".to_string(), "terrible crash".to_string());
        pages.insert("https://www.reuters.com/late".to_string(), "good".to_string());

        let collector = NewsCollector::new(
            Arc::new(FakeNews(articles)),
            Arc::new(FakePages(pages)),
            Arc::new(LexiconScorer::new()),
            config(),
        );
        let range = DateRange::new(d(1), d(3)).unwrap();
        let (records, stats) = collector.collect(range).await;

        assert_eq!(records.len(), 6);
        assert!(records.windows(2).all(|w| w[0].date <= w[1].date));

        let day1: Vec<_> = records.iter().filter(|r| r.date == d(1)).collect();
        assert_eq!(day1[0].title.as_deref(), Some("Apple posts record profits"));
        assert_eq!(day1[0].sentiment, SentimentLabel::Positive);
        assert_eq!(day1[1].title.as_deref(), Some("Shares plunge"));
        assert_eq!(day1[1].sentiment, SentimentLabel::Negative);

        // Day 2: one timeout placeholder plus padding; day 3: padding only
        assert!(records.iter().filter(|r| r.date != d(1)).all(|r| r.is_placeholder() && r.score == 0.0));
        assert_eq!(stats.scored, 2);
        assert_eq!(stats.timeouts, 1);
        assert_eq!(stats.placeholders, 4);
    }

    struct FakePosts;

    #[async_trait]
    impl PostSource for FakePosts {
        async fn fetch_posts(&self, subreddit: &str, _range: DateRange) -> Result<Vec<RedditPost>> {
            if subreddit == "broken" {
                anyhow::bail!("403");
            }
            Ok(vec![
                RedditPost {
                    subreddit: subreddit.to_string(),
                    date: d(2),
                    title: "AAPL great quarter".into(),
                    selftext: "The company reported higher revenue than analysts expected and the stock went up after the call".into(),
                },
                RedditPost {
                    subreddit: subreddit.to_string(),
                    date: d(1),
                    title: format!("{subreddit} daily thread"),
                    selftext: String::new(),
                },
            ])
        }
    }

    #[tokio::test]
    async fn test_collect_posts_dedups_and_skips_failures() {
        let cfg = RedditConfig {
            subreddits: vec!["stocks".into(), "apple".into(), "broken".into()],
            ..RedditConfig::default()
        };
        let range = DateRange::new(d(1), d(5)).unwrap();
        let (records, stats) =
            collect_posts(Arc::new(FakePosts), Arc::new(LexiconScorer::new()), &cfg, range).await;
        assert_eq!(records.len(), 3);
        assert_eq!(stats.errors, 1);
        assert_eq!(records[0].date, d(1));
        assert_eq!(records[2].title.as_deref(), Some("AAPL great quarter"));
        assert_eq!(records[2].sentiment, SentimentLabel::Positive);
        assert_eq!(records[2].language.as_deref(), Some("English"));
    }

    /// Serves every page after a delay, tracking the most calls in flight.
    #[derive(Default)]
    struct CountingPages {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl PageSource for CountingPages {
        async fn article_text(&self, _url: &str) -> Result<String> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok("Analysts said the company delivered strong results and shares moved higher in early trading".into())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_days_bounded_by_limit() {
        let articles: Vec<ArticleRef> = (1..=6)
            .map(|day| ArticleRef {
                language: None,
                ..art(day, &format!("https://www.reuters.com/{day}"), "Apple update")
            })
            .collect();
        let pages = Arc::new(CountingPages::default());
        let collector = NewsCollector::new(
            Arc::new(FakeNews(articles)),
            Arc::clone(&pages) as Arc<dyn PageSource>,
            Arc::new(LexiconScorer::new()),
            NewsConfig {
                articles_per_day: 1,
                batch_days: 6,
                concurrency: 2,
                ..config()
            },
        );
        let range = DateRange::new(d(1), d(6)).unwrap();
        let (records, stats) = collector.collect(range).await;

        assert_eq!(stats.scored, 6);
        assert_eq!(pages.peak.load(Ordering::SeqCst), 2);
        // No language from the search result, so it comes from the page text
        assert!(records.iter().all(|r| r.language.as_deref() == Some("English")));
    }
}
