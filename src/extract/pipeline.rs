//! Chart Search Pipeline
//! Drives keyword anchoring, next-page retries and the whole-page fallback
//! for one document as an explicit state machine.
//!
//! ```text
//! Searching{Anchored, 0} ──page exhausted──▶ Searching{Mention, 0}
//!        │ crop                                     │ crop
//!        ▼                                          ▼
//!      Found ◀──────────────────────────────────── Found
//!                                                   │ pages exhausted
//!                                                   ▼
//!                                         ExhaustedFallback(whole page?)
//! ```

use super::cropper::{ChartCropper, Extraction};
use super::error_log::{ErrorLog, ErrorRecord};
use super::selector::KeywordSelector;
use super::ExtractError;
use crate::config::ExtractConfig;
use crate::detect::CandidateRegion;
use crate::pdf::{render_clip, PageRect, PageSource};
use image::DynamicImage;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Which pass of the search is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPhase {
    /// Keyword span anchors a clipped render below it
    Anchored,
    /// Any page whose text mentions a phrase, rendered whole
    Mention,
}

/// How a chart was located.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureKind {
    Anchored,
    NextPage,
    Fallback,
    FallbackNextPage,
}

impl CaptureKind {
    pub fn is_fallback(self) -> bool {
        matches!(self, CaptureKind::Fallback | CaptureKind::FallbackNextPage)
    }
}

/// A cropped chart.
#[derive(Debug, Clone, Serialize)]
pub struct ChartCapture {
    /// 0-based page index
    pub page: usize,
    pub kind: CaptureKind,
    pub indicator_text: String,
    pub render_path: PathBuf,
    pub crop_path: PathBuf,
    pub bbox_path: PathBuf,
    pub region: CandidateRegion,
}

/// A whole-page render kept as the lower-confidence last resort.
#[derive(Debug, Clone, Serialize)]
pub struct PageCapture {
    pub page: usize,
    pub image_path: PathBuf,
}

#[derive(Debug, Clone)]
pub enum SearchState {
    Searching { phase: SearchPhase, page: usize },
    Found(ChartCapture),
    ExhaustedFallback(Option<PageCapture>),
}

impl SearchState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SearchState::Searching { .. })
    }
}

/// Final outcome for one document.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Found(ChartCapture),
    WholePage(PageCapture),
    NotFound { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentResult {
    pub name: String,
    pub total_pages: usize,
    pub outcome: Outcome,
    pub detected_keywords: Vec<String>,
}

impl DocumentResult {
    /// A chart crop or a whole-page fallback was produced.
    pub fn captured(&self) -> bool {
        !matches!(self.outcome, Outcome::NotFound { .. })
    }

    /// Image to show for this document, and whether it is lower confidence.
    pub fn capture_image(&self) -> Option<(&Path, bool)> {
        match &self.outcome {
            Outcome::Found(c) => Some((c.crop_path.as_path(), c.kind.is_fallback())),
            Outcome::WholePage(p) => Some((p.image_path.as_path(), true)),
            Outcome::NotFound { .. } => None,
        }
    }
}

/// Searches one document for its chart.
pub struct ChartSearch<'a, S: PageSource + ?Sized> {
    source: &'a S,
    source_path: PathBuf,
    settings: &'a ExtractConfig,
    selector: KeywordSelector,
    cropper: ChartCropper<'a>,
    logs_dir: PathBuf,
    error_log: Option<&'a ErrorLog>,
    detected_keywords: Vec<String>,
    last_error: Option<String>,
    whole_page: Option<PageCapture>,
}

impl<'a, S: PageSource + ?Sized> ChartSearch<'a, S> {
    pub fn new(
        source: &'a S,
        source_path: &Path,
        settings: &'a ExtractConfig,
        output_dir: &Path,
        logs_dir: &Path,
        error_log: Option<&'a ErrorLog>,
    ) -> Self {
        Self {
            source,
            source_path: source_path.to_path_buf(),
            settings,
            selector: KeywordSelector::new(settings.keywords.as_slice()),
            cropper: ChartCropper::new(output_dir, logs_dir, error_log),
            logs_dir: logs_dir.to_path_buf(),
            error_log,
            detected_keywords: Vec::new(),
            last_error: None,
            whole_page: None,
        }
    }

    /// Run the state machine to a terminal state.
    pub fn run(mut self) -> Result<DocumentResult, ExtractError> {
        fs::create_dir_all(&self.logs_dir)?;

        let mut state = SearchState::Searching {
            phase: SearchPhase::Anchored,
            page: 0,
        };
        while !state.is_terminal() {
            state = self.step(state);
        }

        let outcome = match state {
            SearchState::Found(capture) => Outcome::Found(capture),
            SearchState::ExhaustedFallback(Some(page)) => {
                warn!(
                    "{}: no chart region isolated, keeping whole page {} as fallback",
                    self.source.name(),
                    page.page + 1
                );
                Outcome::WholePage(page)
            }
            _ => {
                let error = self
                    .last_error
                    .take()
                    .unwrap_or_else(|| "No chart found".to_string());
                self.log_not_found(&error);
                Outcome::NotFound { error }
            }
        };

        Ok(DocumentResult {
            name: self.source.name().to_string(),
            total_pages: self.source.page_count(),
            outcome,
            detected_keywords: self.detected_keywords,
        })
    }

    /// One transition.
    pub fn step(&mut self, state: SearchState) -> SearchState {
        let (phase, page) = match state {
            SearchState::Searching { phase, page } => (phase, page),
            terminal => return terminal,
        };
        let count = self.source.page_count();

        match phase {
            SearchPhase::Anchored if page >= count => SearchState::Searching {
                phase: SearchPhase::Mention,
                page: 0,
            },
            SearchPhase::Mention if page >= count => {
                SearchState::ExhaustedFallback(self.whole_page.take())
            }
            SearchPhase::Anchored => match self.try_anchored(page) {
                Ok(Some(capture)) => SearchState::Found(capture),
                Ok(None) => SearchState::Searching { phase, page: page + 1 },
                Err(e) => self.page_failed(phase, page, e),
            },
            SearchPhase::Mention => match self.try_mention(page) {
                Ok(Some(capture)) => SearchState::Found(capture),
                Ok(None) => SearchState::Searching { phase, page: page + 1 },
                Err(e) => self.page_failed(phase, page, e),
            },
        }
    }

    fn try_anchored(&mut self, page: usize) -> Result<Option<ChartCapture>, ExtractError> {
        debug!("Analyzing page {} of {}", page + 1, self.source.name());
        let matches = self.selector.page_matches(self.source, page)?;
        for m in &matches {
            info!(
                "Found indicator: '{}' on page {} (confidence {})",
                m.text,
                m.page + 1,
                m.confidence
            );
            if !self.detected_keywords.contains(&m.text) {
                self.detected_keywords.push(m.text.clone());
            }
        }
        let Some(anchor) = KeywordSelector::anchor(matches) else {
            return Ok(None);
        };

        let (page_w, page_h) = self.source.page_size(page)?;
        let clip = PageRect::new(
            0.0,
            (anchor.rect.y0 - self.settings.capture_above).max(0.0),
            page_w,
            (anchor.rect.y0 + self.settings.capture_below).min(page_h),
        );
        let render = render_clip(self.source, page, self.settings.anchor_zoom, clip)?;
        let stem = format!("{}_chart", self.source.name());
        if let Some(capture) =
            self.crop(render, &stem, page, CaptureKind::Anchored, &anchor.text)?
        {
            return Ok(Some(capture));
        }

        info!("No plot contours found on page {}. Checking next page.", page + 1);
        self.try_next_page(
            page,
            self.settings.anchor_zoom,
            CaptureKind::NextPage,
            "Next page after keyword match",
        )
    }

    fn try_mention(&mut self, page: usize) -> Result<Option<ChartCapture>, ExtractError> {
        if !self.selector.page_mentions(self.source, page)? {
            return Ok(None);
        }

        info!(
            "Fallback: found keyword mention on page {}, capturing entire page",
            page + 1
        );
        let render = self.source.render(page, self.settings.fallback_zoom)?;
        let source = self.source;
        let name = source.name();
        let stem = format!("{name}_chart_fallback");
        // Each mention page keeps its own render; the first one is the whole-page capture
        let render_path = self.save_render(&render, &format!("{stem}_page{}", page + 1))?;
        if self.whole_page.is_none() {
            self.whole_page = Some(PageCapture {
                page,
                image_path: render_path.clone(),
            });
        }

        let extraction = self.cropper.extract(render, name, &stem, &render_path);
        if let Some(capture) = Self::capture(
            extraction,
            page,
            CaptureKind::Fallback,
            "Fallback capture - keyword mention found",
            render_path,
        ) {
            return Ok(Some(capture));
        }

        self.try_next_page(
            page,
            self.settings.fallback_zoom,
            CaptureKind::FallbackNextPage,
            "Next page after fallback keyword mention",
        )
    }

    /// Render `page + 1` whole and try to crop it.
    fn try_next_page(
        &mut self,
        page: usize,
        zoom: f32,
        kind: CaptureKind,
        indicator: &str,
    ) -> Result<Option<ChartCapture>, ExtractError> {
        let next = page + 1;
        if next >= self.source.page_count() {
            return Ok(None);
        }

        debug!("Checking page {} for charts...", next + 1);
        let render = self.source.render(next, zoom)?;
        let suffix = if kind.is_fallback() {
            "chart_fallback_next_page"
        } else {
            "chart_next_page"
        };
        let stem = format!("{}_{}", self.source.name(), suffix);
        let capture = self.crop(render, &stem, next, kind, indicator)?;
        if capture.is_some() {
            info!("Found chart on next page (page {})", next + 1);
        }
        Ok(capture)
    }

    fn crop(
        &self,
        render: DynamicImage,
        stem: &str,
        page: usize,
        kind: CaptureKind,
        indicator: &str,
    ) -> Result<Option<ChartCapture>, ExtractError> {
        let render_path = self.save_render(&render, stem)?;
        let extraction = self
            .cropper
            .extract(render, self.source.name(), stem, &render_path);
        Ok(Self::capture(extraction, page, kind, indicator, render_path))
    }

    fn capture(
        extraction: Extraction,
        page: usize,
        kind: CaptureKind,
        indicator: &str,
        render_path: PathBuf,
    ) -> Option<ChartCapture> {
        match extraction {
            Extraction::Cropped {
                region,
                crop_path,
                bbox_path,
            } => Some(ChartCapture {
                page,
                kind,
                indicator_text: indicator.to_string(),
                render_path,
                crop_path,
                bbox_path,
                region,
            }),
            Extraction::Uncropped { .. } => None,
        }
    }

    fn save_render(&self, render: &DynamicImage, stem: &str) -> Result<PathBuf, ExtractError> {
        let path = self.logs_dir.join(format!("{stem}.png"));
        render.save(&path)?;
        debug!("Saved page render to {}", path.display());
        Ok(path)
    }

    fn page_failed(&mut self, phase: SearchPhase, page: usize, err: ExtractError) -> SearchState {
        let message = match phase {
            SearchPhase::Anchored => format!("Error extracting plot: {err}"),
            SearchPhase::Mention => format!("Error in fallback capture: {err}"),
        };
        warn!("{} page {}: {}", self.source.name(), page + 1, message);
        self.last_error = Some(message);
        SearchState::Searching {
            phase,
            page: page + 1,
        }
    }

    fn log_not_found(&self, error: &str) {
        warn!("No chart found in {}: {}", self.source.name(), error);
        if let Some(log) = self.error_log {
            let record = ErrorRecord::now(self.source.name(), &self.source_path, error)
                .pages_checked(self.source.page_count())
                .keywords(self.detected_keywords.clone());
            log.record(&record);
        }
    }
}
