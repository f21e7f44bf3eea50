// Quora browser-automation connector.
//
// Drives a headless Chromium through chromiumoxide. For each keyword the
// search results page is opened in one tab and scrolled `max_pages` times;
// every new question link found is visited in its own short-lived tab and
// its first few answers are emitted as posts. The answer text is the title
// (the field that gets classified), the question is the body.
//
// The browser is owned by a `BrowserSession`. The stream closes it when it
// finishes; if the stream is dropped early, the session's Drop kills the
// Chromium process and stops the CDP handler task.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::{Context, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use chrono::Utc;
use futures::StreamExt;
use rand::Rng;
use reqwest::Url;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{Connector, PostStream};
use crate::db::models::{Platform, RawPost};
use crate::error::SourceError;

const SOURCE: &str = "quora";

pub const DEFAULT_BASE_URL: &str = "https://www.quora.com";

pub const DEFAULT_KEYWORDS: &[&str] = &[
    "bullying",
    "racism",
    "hate",
    "discrimination",
    "slur",
    "abuse",
    "prejudice",
];

/// Question links on a results page. Profile pages also contain "/What-"
/// style slugs in some layouts, so they're excluded.
const QUESTION_LINK_SELECTOR: &str = r#"a[href*="/What-"]:not([href*="/profile/"])"#;

const ANSWER_SELECTOR: &str = "div.q-text.qu-display--block";

/// Answers longer than this are cut.
pub const MAX_ANSWER_CHARS: usize = 700;

/// Prefix keeping Quora answer ids apart from other platforms' ids.
pub const ID_PREFIX: &str = "qa_";

#[derive(Debug, Clone)]
pub struct QuoraConfig {
    pub keywords: Vec<String>,
    /// Times the results page is scrolled to load more questions.
    pub max_pages: usize,
    /// Answers taken from each question.
    pub max_answers: usize,
    pub chrome_path: Option<String>,
    /// Bound on every explicit wait for an element.
    pub element_timeout: Duration,
    /// Random pause between page actions, drawn uniformly from this range.
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub base_url: String,
}

impl Default for QuoraConfig {
    fn default() -> Self {
        Self {
            keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            max_pages: 2,
            max_answers: 3,
            chrome_path: None,
            element_timeout: Duration::from_secs(10),
            min_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(5),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

pub struct QuoraConnector {
    config: QuoraConfig,
}

impl QuoraConnector {
    pub fn new(config: QuoraConfig) -> Self {
        Self { config }
    }

    fn random_delay(&self) -> Duration {
        random_between(self.config.min_delay, self.config.max_delay)
    }

    fn search_url(&self, keyword: &str) -> Result<Url> {
        let base = format!("{}/search", self.config.base_url.trim_end_matches('/'));
        Url::parse_with_params(&base, &[("q", keyword)])
            .with_context(|| format!("Invalid Quora search URL for keyword {keyword:?}"))
    }

    /// Collect absolute question links currently on the results page.
    async fn question_links(&self, page: &Page) -> Vec<String> {
        let elements = match page.find_elements(QUESTION_LINK_SELECTOR).await {
            Ok(elements) => elements,
            Err(e) => {
                warn!(error = %e, "Could not read question links");
                return Vec::new();
            }
        };

        let mut links = Vec::new();
        for element in elements {
            let Ok(Some(href)) = element.attribute("href").await else {
                continue;
            };
            if let Some(link) = absolutize(&self.config.base_url, &href) {
                if is_question_link(&link) && !links.contains(&link) {
                    links.push(link);
                }
            }
        }
        links
    }

    /// Open one question in its own tab and pull its top answers.
    /// The tab is closed whatever happens inside.
    async fn scrape_question(
        &self,
        session: &BrowserSession,
        keyword: &str,
        link: &str,
    ) -> Result<Vec<RawPost>> {
        let page = session
            .browser
            .new_page(link)
            .await
            .with_context(|| format!("Failed to open {link}"))?;

        let result = self.read_answers(&page, keyword, link).await;

        if let Err(e) = page.close().await {
            debug!(error = %e, "Failed to close question tab");
        }
        result
    }

    async fn read_answers(&self, page: &Page, keyword: &str, link: &str) -> Result<Vec<RawPost>> {
        wait_for_element(page, "h1", self.config.element_timeout).await?;
        tokio::time::sleep(self.random_delay()).await;

        let question = page
            .get_title()
            .await
            .ok()
            .flatten()
            .map(|t| t.trim().to_string())
            .unwrap_or_default();

        // Answers render lazily below the fold
        page.evaluate("window.scrollTo(0, document.body.scrollHeight);")
            .await
            .context("Failed to scroll question page")?;
        tokio::time::sleep(self.random_delay()).await;

        let answers = page
            .find_elements(ANSWER_SELECTOR)
            .await
            .context("Failed to read answers")?;

        let mut posts = Vec::new();
        for (index, element) in answers.iter().take(self.config.max_answers).enumerate() {
            let Some(text) = element_text(element).await else {
                continue;
            };
            let Some(answer) = normalize_answer(&text) else {
                continue;
            };
            posts.push(RawPost {
                id: answer_id(link, index + 1),
                title: Some(answer),
                body: (!question.is_empty()).then(|| question.clone()),
                url: link.to_string(),
                score: 0,
                comment_count: 0,
                community: keyword.to_string(),
                captured_at: Utc::now(),
                platform: Platform::Quora,
            });
        }
        Ok(posts)
    }
}

impl Connector for QuoraConnector {
    fn name(&self) -> &'static str {
        SOURCE
    }

    fn platform(&self) -> Platform {
        Platform::Quora
    }

    fn posts(&self) -> PostStream<'_> {
        Box::pin(async_stream::stream! {
            let session = match BrowserSession::launch(self.config.chrome_path.as_deref()).await {
                Ok(session) => session,
                Err(e) => {
                    yield Err(SourceError::Fatal {
                        source_name: SOURCE,
                        message: format!("{e:#}"),
                    });
                    return;
                }
            };

            let mut visited: HashSet<String> = HashSet::new();
            let mut seen: HashSet<String> = HashSet::new();
            let mut emitted = 0usize;

            for keyword in &self.config.keywords {
                info!(keyword = %keyword, "Searching Quora");

                let url = match self.search_url(keyword) {
                    Ok(url) => url,
                    Err(e) => {
                        warn!(keyword = %keyword, error = %e, "Skipping keyword");
                        continue;
                    }
                };

                let results = match session.browser.new_page(url.as_str()).await {
                    Ok(page) => page,
                    Err(e) => {
                        warn!(keyword = %keyword, error = %e, "Could not open search page");
                        continue;
                    }
                };

                if let Err(e) =
                    wait_for_element(&results, QUESTION_LINK_SELECTOR, self.config.element_timeout).await
                {
                    warn!(keyword = %keyword, error = %e, "No question links appeared");
                }

                for depth in 0..self.config.max_pages {
                    tokio::time::sleep(self.random_delay()).await;

                    let links = self.question_links(&results).await;
                    debug!(keyword = %keyword, page = depth + 1, links = links.len(), "Scanned results page");

                    for link in links {
                        if !visited.insert(link.clone()) {
                            continue;
                        }
                        match self.scrape_question(&session, keyword, &link).await {
                            Ok(posts) => {
                                if posts.is_empty() {
                                    debug!(url = %link, "No answers found");
                                }
                                for post in posts {
                                    if !seen.insert(post.id.clone()) {
                                        continue;
                                    }
                                    emitted += 1;
                                    yield Ok(post);
                                }
                            }
                            Err(e) => warn!(url = %link, error = %format!("{e:#}"), "Skipping question"),
                        }
                    }

                    // Load the next batch of results
                    if let Err(e) = results
                        .evaluate("window.scrollTo(0, document.body.scrollHeight);")
                        .await
                    {
                        warn!(keyword = %keyword, error = %e, "Could not scroll results page");
                        break;
                    }
                }

                if let Err(e) = results.close().await {
                    debug!(error = %e, "Failed to close search tab");
                }
            }

            session.close().await;
            info!(posts = emitted, questions = visited.len(), "Quora collection finished");
        })
    }
}

/// An owned headless browser plus the task driving its CDP event loop.
pub struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl BrowserSession {
    pub async fn launch(chrome_path: Option<&str>) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .window_size(1920, 1080)
            .no_sandbox()
            .disable_default_args()
            .arg("--headless=new")
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-extensions")
            .arg("--mute-audio");

        if let Some(path) = chrome_path {
            builder = builder.chrome_executable(path);
        }

        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("Failed to launch headless Chromium")?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler error: {e}");
                }
            }
        });

        info!("Headless browser started");
        Ok(Self { browser, handler })
    }

    /// Shut Chromium down and wait for the process to exit.
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!(error = %e, "Failed to close browser cleanly");
        }
        if let Err(e) = self.browser.wait().await {
            debug!(error = %e, "Failed waiting for browser exit");
        }
        info!("Headless browser closed");
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        // Browser's own Drop kills the child process; the handler would
        // otherwise spin on a dead websocket.
        self.handler.abort();
    }
}

/// Poll for `selector` until it appears or `timeout` elapses.
pub async fn wait_for_element(page: &Page, selector: &str, timeout: Duration) -> Result<Element> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Ok(element) = page.find_element(selector).await {
            return Ok(element);
        }
        if Instant::now() >= deadline {
            anyhow::bail!("Timed out after {:?} waiting for {selector}", timeout);
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
}

async fn element_text(element: &Element) -> Option<String> {
    element.inner_text().await.ok().flatten()
}

fn random_between(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let secs = rand::thread_rng().gen_range(min.as_secs_f64()..max.as_secs_f64());
    Duration::from_secs_f64(secs)
}

/// Resolve a possibly-relative href against the site root. Query and
/// fragment are dropped so share links and anchors map to one question.
fn absolutize(base_url: &str, href: &str) -> Option<String> {
    let base = Url::parse(base_url).ok()?;
    let mut url = base.join(href).ok()?;
    url.set_query(None);
    url.set_fragment(None);
    Some(url.to_string())
}

/// Question pages, not profiles.
pub fn is_question_link(href: &str) -> bool {
    href.contains("/What-") && !href.contains("/profile/")
}

/// Collapse whitespace (newlines included) and cut to `MAX_ANSWER_CHARS`.
/// Empty answers become `None`.
pub fn normalize_answer(text: &str) -> Option<String> {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }
    Some(collapsed.chars().take(MAX_ANSWER_CHARS).collect())
}

/// Stable id for the `n`th answer (1-based) of a question.
pub fn answer_id(question_url: &str, n: usize) -> String {
    let slug = Url::parse(question_url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.rfind(|s| !s.is_empty()).map(str::to_string))
        })
        .unwrap_or_else(|| question_url.to_string());
    format!("{ID_PREFIX}{slug}_{n}")
}
