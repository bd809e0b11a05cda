// src/pipeline/harvest.rs

//! Comment harvesting pipeline.
//!
//! Resolver → content enumeration → (per item) body filter → comment
//! harvest → comment filter → accumulate → export. Items and pages are
//! processed strictly in sequence.

use std::collections::HashSet;
use std::path::PathBuf;

use chrono::Utc;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::models::{
    Comment, Config, ContentItem, Credentials, FilterConfig, HarvestReport, TimeWindow,
};
use crate::services::ExclusionSet;
use crate::source::{CommentSource, SourceKind, open_source};
use crate::storage::{ColumnLabels, CsvSink, ExportTable, TabularSink};

/// Inbound harvest request.
#[derive(Debug, Clone)]
pub struct HarvestRequest {
    /// Account handle or channel name
    pub account: String,

    /// First day of the window, `YYYY-MM-DD`
    pub start: String,

    /// End of the window, `YYYY-MM-DD`: 00:00 of that date in the reference zone
    pub end: String,

    /// Source override (default: `[harvest].source`)
    pub source: Option<SourceKind>,

    /// Export path override (default: `{output_dir}/{source}_comments.csv`)
    pub output: Option<PathBuf>,
}

impl HarvestRequest {
    pub fn new(account: impl Into<String>, start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            start: start.into(),
            end: end.into(),
            source: None,
            output: None,
        }
    }

    pub fn with_source(mut self, source: SourceKind) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// Source kind for this request under `config`.
    pub fn kind(&self, config: &Config) -> SourceKind {
        self.source.unwrap_or(config.harvest.source)
    }

    /// Normalize the requested dates in the configured reference zone.
    pub fn window(&self, config: &Config) -> Result<TimeWindow> {
        TimeWindow::parse_with_offset_hours(&self.start, &self.end, config.harvest.utc_offset_hours)
    }
}

/// Comments and counters accumulated by one run.
#[derive(Debug, Clone, Default)]
pub struct HarvestOutcome {
    /// Kept comments in harvest order
    pub comments: Vec<Comment>,
    pub items_seen: usize,
    pub items_skipped: usize,
    pub items_failed: usize,
    pub comments_excluded: usize,
}

/// Filter stage configuration for one run.
#[derive(Debug, Clone, Default)]
pub struct Harvester {
    comment_filter: ExclusionSet,
    item_markers: ExclusionSet,
}

impl Harvester {
    pub fn new(comment_filter: ExclusionSet, item_markers: ExclusionSet) -> Self {
        Self {
            comment_filter,
            item_markers,
        }
    }

    pub fn from_config(config: &FilterConfig) -> Self {
        Self::new(
            ExclusionSet::new(&config.comment_keywords),
            ExclusionSet::new(&config.item_markers),
        )
    }

    /// Harvest every in-window item of `account` from `source`.
    ///
    /// Resolution and content listing failures end the run. A failure while
    /// pulling one item's comments drops that item and moves on.
    pub async fn run(
        &self,
        source: &dyn CommentSource,
        account: &str,
        window: &TimeWindow,
        cancel: &CancellationToken,
    ) -> Result<HarvestOutcome> {
        ensure_active(cancel)?;
        let id = source.resolve_identifier(account).await?;
        log::info!("Resolved '{}' to {}", account, id);

        let mut outcome = HarvestOutcome::default();
        let mut seen_items: HashSet<String> = HashSet::new();
        let mut seen_comments: HashSet<(String, String)> = HashSet::new();

        let mut items = source.enumerate_content(&id, window);
        loop {
            ensure_active(cancel)?;
            let Some(item) = items.next().await else {
                break;
            };
            let item = item?;

            if !seen_items.insert(item.id.clone()) {
                log::debug!("Item {} listed twice, ignoring", item.id);
                continue;
            }
            outcome.items_seen += 1;

            if let Some(marker) = item
                .body_text
                .as_deref()
                .and_then(|body| self.item_markers.first_match(body))
            {
                log::info!("Skipping {} (body contains '{}')", item.id, marker);
                outcome.items_skipped += 1;
                continue;
            }

            match self.harvest_item(source, &item, window, cancel).await {
                Ok((kept, excluded)) => {
                    outcome.comments_excluded += excluded;
                    let before = outcome.comments.len();
                    for comment in kept {
                        if let Some((item_id, comment_id)) = comment.dedup_key() {
                            if !seen_comments.insert((item_id.to_owned(), comment_id.to_owned())) {
                                log::debug!("Comment {} on {} delivered twice", comment_id, item_id);
                                continue;
                            }
                        }
                        outcome.comments.push(comment);
                    }
                    log::info!(
                        "{} '{}': {} comments",
                        item.id,
                        crate::utils::log::preview(&item.title, 40),
                        outcome.comments.len() - before
                    );
                }
                Err(AppError::Cancelled) => return Err(AppError::Cancelled),
                Err(e) => {
                    log::warn!("Comments of {} failed, skipping item: {}", item.id, e);
                    outcome.items_failed += 1;
                }
            }
        }

        Ok(outcome)
    }

    /// Pull all comments of one item and apply the comment filter.
    ///
    /// Returns the kept comments and the number excluded.
    async fn harvest_item(
        &self,
        source: &dyn CommentSource,
        item: &ContentItem,
        window: &TimeWindow,
        cancel: &CancellationToken,
    ) -> Result<(Vec<Comment>, usize)> {
        let mut raw = Vec::new();
        let mut comments = source.enumerate_comments(item, window);
        loop {
            ensure_active(cancel)?;
            match comments.next().await {
                Some(comment) => raw.push(comment?),
                None => break,
            }
        }

        let total = raw.len();
        let kept = self.comment_filter.retain_comments(raw);
        let excluded = total - kept.len();
        Ok((kept, excluded))
    }
}

fn ensure_active(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(AppError::Cancelled);
    }
    Ok(())
}

/// Run one harvest end to end and export the result.
///
/// The window is validated before any credential check or network activity.
/// The source is closed on every exit path once opened.
pub async fn run_harvest(
    config: &Config,
    credentials: &Credentials,
    request: &HarvestRequest,
    cancel: &CancellationToken,
) -> Result<HarvestReport> {
    let window = request.window(config)?;
    let kind = request.kind(config);
    credentials.require_for(kind)?;

    let source = open_source(config, credentials, kind).await?;
    let result = harvest_into(source.as_ref(), &CsvSink::new(), config, request, &window, cancel).await;
    if let Err(e) = source.close().await {
        log::warn!("Closing {} source failed: {}", kind, e);
    }
    result
}

/// Harvest from an already opened source and write the export to `sink`.
pub async fn harvest_into(
    source: &dyn CommentSource,
    sink: &dyn TabularSink,
    config: &Config,
    request: &HarvestRequest,
    window: &TimeWindow,
    cancel: &CancellationToken,
) -> Result<HarvestReport> {
    let started_at = Utc::now();
    let kind = source.kind();

    crate::utils::log::header(&format!("Harvesting {} comments of '{}'", kind, request.account));
    crate::utils::log::sub_item(&format!(
        "Window: {} .. {} (UTC{:+})",
        request.start,
        request.end,
        config.harvest.utc_offset_hours
    ));

    crate::utils::log::step(1, 2, "Collecting comments");
    let outcome = Harvester::from_config(&config.filter)
        .run(source, &request.account, window, cancel)
        .await?;

    if outcome.comments.is_empty() {
        log::warn!("No comments harvested for '{}'", request.account);
    }

    crate::utils::log::step(2, 2, "Exporting");
    let labels = ColumnLabels::for_source(kind, config.export.header_style);
    let table = ExportTable::from_comments(labels, &outcome.comments);
    let path = config.export_path(kind, request.output.as_deref());
    let exported_path = sink.write(&table, &path).await?;

    let report = HarvestReport {
        source: kind,
        comment_count: table.len(),
        exported_path,
        items_seen: outcome.items_seen,
        items_skipped: outcome.items_skipped,
        items_failed: outcome.items_failed,
        comments_excluded: outcome.comments_excluded,
        started_at,
        finished_at: Utc::now(),
    };

    crate::utils::log::summary(
        "Harvest complete",
        &[
            ("Items", report.items_seen.to_string()),
            ("Skipped", report.items_skipped.to_string()),
            ("Failed", report.items_failed.to_string()),
            ("Excluded comments", report.comments_excluded.to_string()),
            ("Rows", report.comment_count.to_string()),
            ("Path", report.exported_path.display().to_string()),
        ],
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use futures::stream::{self, BoxStream};

    use chrono::NaiveDate;

    use super::*;
    use crate::models::{offset_from_hours, parse_timestamp};

    /// Scripted source with per-item comment outcomes.
    #[derive(Default)]
    struct FakeSource {
        /// Resolved identifier; `None` means no match
        channel: Option<&'static str>,
        items: Vec<Result<ContentItem>>,
        /// Comment texts per item; `"id|text"` pins the comment id, otherwise
        /// ids are positional
        comments: Vec<(&'static str, Result<Vec<&'static str>>)>,
        calls: Mutex<Vec<String>>,
        /// Cancel this token when comments of the given item are requested
        cancel_on: Option<(&'static str, CancellationToken)>,
    }

    impl FakeSource {
        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    fn clone_result<T: Clone>(result: &Result<T>) -> Result<T> {
        match result {
            Ok(value) => Ok(value.clone()),
            Err(AppError::Source { stage, context, status, message }) => Err(AppError::Source {
                stage: stage.clone(),
                context: context.clone(),
                status: *status,
                message: message.clone(),
            }),
            Err(e) => Err(AppError::source("fake", "fake", e)),
        }
    }

    #[async_trait]
    impl CommentSource for FakeSource {
        fn kind(&self) -> SourceKind {
            SourceKind::YouTube
        }

        async fn resolve_identifier(&self, name: &str) -> Result<String> {
            self.record(format!("resolve {name}"));
            self.channel
                .map(String::from)
                .ok_or_else(|| AppError::not_found("resolve channel", name))
        }

        fn enumerate_content<'a>(
            &'a self,
            id: &'a str,
            _window: &'a TimeWindow,
        ) -> BoxStream<'a, Result<ContentItem>> {
            self.record(format!("content {id}"));
            Box::pin(stream::iter(self.items.iter().map(clone_result)))
        }

        fn enumerate_comments<'a>(
            &'a self,
            item: &'a ContentItem,
            _window: &'a TimeWindow,
        ) -> BoxStream<'a, Result<Comment>> {
            self.record(format!("comments {}", item.id));
            if let Some((id, token)) = &self.cancel_on {
                if *id == item.id {
                    token.cancel();
                }
            }

            let scripted = self
                .comments
                .iter()
                .find(|(id, _)| *id == item.id)
                .map(|(_, result)| clone_result(result))
                .unwrap_or_else(|| Ok(Vec::new()));

            let results: Vec<Result<Comment>> = match scripted {
                Ok(texts) => texts
                    .into_iter()
                    .enumerate()
                    .map(|(index, raw)| {
                        let (id, text) = match raw.split_once('|') {
                            Some((id, text)) => (id.to_string(), text),
                            None => (format!("{}-{index}", item.id), raw),
                        };
                        Ok(Comment {
                            text: text.to_string(),
                            published_at: NaiveDate::from_ymd_opt(2024, 11, 6).unwrap(),
                            source_item_id: item.id.clone(),
                            source_title: item.title.clone(),
                            source_url: item.url.clone(),
                            comment_id: Some(id),
                        })
                    })
                    .collect(),
                Err(e) => vec![Err(e)],
            };
            Box::pin(stream::iter(results))
        }

        async fn close(&self) -> Result<()> {
            self.record("close".to_string());
            Ok(())
        }
    }

    /// Sink that keeps the table in memory.
    #[derive(Default)]
    struct MemorySink {
        written: Mutex<Option<ExportTable>>,
    }

    #[async_trait]
    impl TabularSink for MemorySink {
        async fn write(&self, table: &ExportTable, path: &std::path::Path) -> Result<PathBuf> {
            *self.written.lock().unwrap() = Some(table.clone());
            Ok(path.to_path_buf())
        }
    }

    fn item(id: &str, body: Option<&str>) -> Result<ContentItem> {
        Ok(ContentItem {
            id: id.to_string(),
            title: format!("Title {id}"),
            published_at: parse_timestamp("2024-11-05T10:00:00Z").unwrap(),
            body_text: body.map(String::from),
            url: format!("https://www.youtube.com/watch?v={id}"),
        })
    }

    fn window() -> TimeWindow {
        TimeWindow::parse("2024-10-28", "2024-12-11", offset_from_hours(9).unwrap()).unwrap()
    }

    fn harvester() -> Harvester {
        Harvester::from_config(&FilterConfig::default())
    }

    #[tokio::test]
    async fn test_two_items_three_comments_each() {
        let source = FakeSource {
            channel: Some("UC1"),
            items: vec![item("v1", None), item("v2", None)],
            comments: vec![
                ("v1", Ok(vec!["좋아요", "최고", "감사합니다"])),
                ("v2", Ok(vec!["a", "b", "c"])),
            ],
            ..FakeSource::default()
        };
        let sink = MemorySink::default();
        let request = HarvestRequest::new("example_channel", "2024-10-28", "2024-12-11");

        let report = harvest_into(
            &source,
            &sink,
            &Config::default(),
            &request,
            &window(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(report.comment_count, 6);
        assert_eq!(report.items_seen, 2);
        assert_eq!(report.exported_path, PathBuf::from("dataset/youtube_comments.csv"));
        let table = sink.written.lock().unwrap().clone().unwrap();
        assert_eq!(table.labels().as_array(), ["published_at", "comment", "video_url"]);
        assert_eq!(table.rows()[3].source_url, "https://www.youtube.com/watch?v=v2");
    }

    #[tokio::test]
    async fn test_keyword_comments_are_excluded() {
        let source = FakeSource {
            channel: Some("UC1"),
            items: vec![item("v1", None)],
            comments: vec![("v1", Ok(vec!["오늘 이벤트 당첨!", "좋은 영상", "참가합니다"]))],
            ..FakeSource::default()
        };

        let outcome = harvester()
            .run(&source, "example_channel", &window(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.comments.len(), 1);
        assert_eq!(outcome.comments[0].text, "좋은 영상");
        assert_eq!(outcome.comments_excluded, 2);
    }

    #[tokio::test]
    async fn test_not_found_stops_before_enumeration() {
        let source = FakeSource::default();

        let err = harvester()
            .run(&source, "nobody", &window(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
        assert_eq!(source.calls(), ["resolve nobody"]);
    }

    #[tokio::test]
    async fn test_failed_item_is_skipped_and_run_continues() {
        let source = FakeSource {
            channel: Some("UC1"),
            items: vec![item("v1", None), item("v2", None)],
            comments: vec![
                ("v1", Err(AppError::source_status("list comments", "v1", 500, "boom"))),
                ("v2", Ok(vec!["ok"])),
            ],
            ..FakeSource::default()
        };

        let outcome = harvester()
            .run(&source, "c", &window(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.items_failed, 1);
        assert_eq!(outcome.comments.len(), 1);
        assert_eq!(outcome.comments[0].source_item_id, "v2");
    }

    #[tokio::test]
    async fn test_content_error_aborts_run() {
        let source = FakeSource {
            channel: Some("UC1"),
            items: vec![
                item("v1", None),
                Err(AppError::source_status("list videos", "UC1", 400, "bad cursor")),
                item("v3", None),
            ],
            ..FakeSource::default()
        };

        let err = harvester()
            .run(&source, "c", &window(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Source { status: Some(400), .. }));
        assert!(!source.calls().contains(&"comments v3".to_string()));
    }

    #[tokio::test]
    async fn test_marked_items_and_duplicates_are_skipped() {
        let source = FakeSource {
            channel: Some("UC1"),
            items: vec![
                item("p1", Some("가을 이벤트 안내 #이벤트")),
                item("p2", Some("일상 사진")),
                item("p2", Some("일상 사진")),
            ],
            comments: vec![
                ("p1", Ok(vec!["should not be read"])),
                ("p2", Ok(vec!["멋져요"])),
            ],
            ..FakeSource::default()
        };

        let outcome = harvester()
            .run(&source, "lx.corp", &window(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.items_seen, 2);
        assert_eq!(outcome.items_skipped, 1);
        assert_eq!(outcome.comments.len(), 1);
        assert!(!source.calls().contains(&"comments p1".to_string()));
    }

    #[tokio::test]
    async fn test_same_text_from_different_threads_is_kept() {
        let source = FakeSource {
            channel: Some("UC1"),
            items: vec![item("v1", None)],
            comments: vec![("v1", Ok(vec!["a|좋아요", "b|좋아요", "c|좋아요", "b|좋아요"]))],
            ..FakeSource::default()
        };

        let outcome = harvester()
            .run(&source, "c", &window(), &CancellationToken::new())
            .await
            .unwrap();
        let ids: Vec<&str> = outcome
            .comments
            .iter()
            .filter_map(|c| c.comment_id.as_deref())
            .collect();
        assert_eq!(ids, ["a", "b", "c"]);
        assert!(outcome.comments.iter().all(|c| c.text == "좋아요"));
    }

    #[tokio::test]
    async fn test_cancellation_writes_nothing() {
        let token = CancellationToken::new();
        let source = FakeSource {
            channel: Some("UC1"),
            items: vec![item("v1", None), item("v2", None)],
            comments: vec![("v1", Ok(vec!["x"])), ("v2", Ok(vec!["y"]))],
            cancel_on: Some(("v1", token.clone())),
            ..FakeSource::default()
        };
        let sink = MemorySink::default();
        let request = HarvestRequest::new("c", "2024-10-28", "2024-12-11");

        let err = harvest_into(&source, &sink, &Config::default(), &request, &window(), &token)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Cancelled));
        assert!(sink.written.lock().unwrap().is_none());
        assert!(!source.calls().contains(&"comments v2".to_string()));
    }

    #[tokio::test]
    async fn test_cancelled_before_start_skips_resolution() {
        let token = CancellationToken::new();
        token.cancel();
        let source = FakeSource {
            channel: Some("UC1"),
            ..FakeSource::default()
        };

        let err = harvester().run(&source, "c", &window(), &token).await.unwrap_err();
        assert!(matches!(err, AppError::Cancelled));
        assert!(source.calls().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_window_fails_before_credentials() {
        let request = HarvestRequest::new("c", "2024-13-40", "2024-12-11");
        let err = run_harvest(
            &Config::default(),
            &Credentials::default(),
            &request,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidWindow(_)));
    }

    #[tokio::test]
    async fn test_missing_api_key_is_config_error() {
        let request = HarvestRequest::new("c", "2024-10-28", "2024-12-11");
        let err = run_harvest(
            &Config::default(),
            &Credentials::default(),
            &request,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
