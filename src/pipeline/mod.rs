use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub mod compose;
pub mod extract;
pub mod trim;

pub use compose::ComposeReport;

use crate::acquire::{self, MediaSource, YtDlpSource};
use crate::cache::{CacheLedger, RunKey, Stage};
use crate::config::{self, Config, OutputConfig};
use crate::media::{FfmpegEngine, MediaEngine, AUDIO_EXTENSION};
use crate::package;
use crate::utils;
use crate::validate::{OutputTarget, ValidatedRequest};
use crate::workspace::{self, WorkArea};
use crate::{MashupError, Result};

/// Why an item was left out of a stage's output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The item could not be decoded or encoded
    DecodeFailed(String),

    /// The track is shorter than the trim duration
    TooShort { actual_secs: f64, required_secs: u64 },

    /// Another item in the same stage already produced this output name
    NameCollision { existing: String },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::DecodeFailed(message) => write!(f, "{}", message),
            SkipReason::TooShort {
                actual_secs,
                required_secs,
            } => write!(
                f,
                "shorter than {} seconds ({:.1}s)",
                required_secs, actual_secs
            ),
            SkipReason::NameCollision { existing } => {
                write!(f, "{} was already produced by another item", existing)
            }
        }
    }
}

/// Result of processing one item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemOutcome {
    Produced(PathBuf),
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemReport {
    pub name: String,
    pub outcome: ItemOutcome,
}

impl ItemReport {
    fn skipped(name: String, reason: SkipReason) -> Self {
        Self {
            name,
            outcome: ItemOutcome::Skipped(reason),
        }
    }

    pub fn is_produced(&self) -> bool {
        matches!(self.outcome, ItemOutcome::Produced(_))
    }
}

/// Summary of one cacheable stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: Stage,

    /// Whether the stage reused a directory produced for the same parameters
    pub cached: bool,

    pub items: Vec<ItemReport>,
}

impl StageReport {
    pub fn produced(&self) -> usize {
        self.items.iter().filter(|i| i.is_produced()).count()
    }

    pub fn skipped(&self) -> usize {
        self.items.len() - self.produced()
    }
}

/// Everything a run needs beyond the validated parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRequest {
    #[serde(flatten)]
    pub params: ValidatedRequest,

    /// File name of the composed output inside the output directory
    pub composed_name: String,

    /// File name of the archive inside the output directory
    pub archive_name: String,
}

impl PipelineRequest {
    pub fn new(params: ValidatedRequest, target: Option<&OutputTarget>, names: &OutputConfig) -> Self {
        let (composed_name, archive_name) = match target {
            Some(OutputTarget::Audio(name)) => (name.clone(), names.archive_name.clone()),
            Some(OutputTarget::Archive(name)) => (names.composed_name.clone(), name.clone()),
            None => (names.composed_name.clone(), names.archive_name.clone()),
        };
        Self {
            params,
            composed_name,
            archive_name,
        }
    }
}

/// Outcome of a full pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub run_id: Uuid,
    pub request: PipelineRequest,
    pub stages: Vec<StageReport>,
    pub composed: ComposeReport,
    pub archive: PathBuf,
    pub completed_at: DateTime<Utc>,
}

impl PipelineReport {
    pub fn stage(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == stage)
    }
}

/// The four-stage mashup pipeline shared by both front doors
pub struct MashupPipeline {
    source: Box<dyn MediaSource>,
    engine: Box<dyn MediaEngine>,
    area: WorkArea,
    search_suffix: String,
    restricted: bool,
    show_progress: bool,
}

impl MashupPipeline {
    pub fn new(source: Box<dyn MediaSource>, engine: Box<dyn MediaEngine>, area: WorkArea) -> Self {
        Self {
            source,
            engine,
            area,
            search_suffix: "songs".to_string(),
            restricted: false,
            show_progress: false,
        }
    }

    /// Pipeline over yt-dlp and ffmpeg as configured, honouring the restricted-host flag
    pub fn from_config(config: &Config, work_dir: Option<&Path>) -> Self {
        let root = work_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(|| config.workspace.root.clone());

        Self::new(
            Box::new(YtDlpSource::new(&config.tools)),
            Box::new(FfmpegEngine::new(&config.tools)),
            WorkArea::new(root),
        )
        .search_suffix(&config.tools.search_suffix)
        .restricted(config::restricted_from_env())
    }

    pub fn search_suffix(mut self, suffix: &str) -> Self {
        self.search_suffix = suffix.to_string();
        self
    }

    pub fn restricted(mut self, restricted: bool) -> Self {
        self.restricted = restricted;
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn work_area(&self) -> &WorkArea {
        &self.area
    }

    /// Run acquire, extract, trim and compose, then package the composed output
    pub async fn run(&self, request: &PipelineRequest) -> Result<PipelineReport> {
        if self.restricted {
            return Err(MashupError::RestrictedEnvironment.into());
        }

        let params = &request.params;
        let area = WorkArea::create(self.area.root())?;
        let mut ledger = CacheLedger::load(area.root());

        tracing::info!(
            "Starting mashup for \"{}\": {} items, {}s each, work area {}",
            params.subject,
            params.item_count,
            params.duration_secs,
            area.root().display()
        );

        let acquired = self.acquire_stage(&area, &mut ledger, params).await?;
        let extracted = self.extract_stage(&area, &mut ledger, params).await?;
        let trimmed = self.trim_stage(&area, &mut ledger, params).await?;

        tracing::info!("Merging trimmed audio files...");
        let composed_path = area.output().join(&request.composed_name);
        let composed = compose::compose(self.engine.as_ref(), &area.trimmed(), &composed_path).await?;

        let archive_path = area.output().join(&request.archive_name);
        let archive = package::package_single(&composed.output, &archive_path)?;

        Ok(PipelineReport {
            run_id: Uuid::new_v4(),
            request: request.clone(),
            stages: vec![acquired, extracted, trimmed],
            composed,
            archive,
            completed_at: Utc::now(),
        })
    }

    /// Decide whether a stage directory can be reused; otherwise empty it for a rebuild
    fn reuse_or_reset(&self, ledger: &mut CacheLedger, stage: Stage, key: &RunKey, dir: &Path) -> Result<bool> {
        let populated = workspace::is_populated(dir)?;

        if populated && ledger.matches(stage, key) {
            tracing::info!("{} output already present for these parameters. Skipping {}.", stage, stage);
            return Ok(true);
        }

        if populated {
            tracing::warn!(
                "{} contains output from different parameters, rebuilding",
                dir.display()
            );
            workspace::clear_dir(dir)?;
        }

        ledger.invalidate_from(stage);
        ledger.save()?;
        Ok(false)
    }

    fn cached_report(stage: Stage, dir: &Path) -> Result<StageReport> {
        let items = workspace::list_files(dir)?
            .into_iter()
            .map(|path| ItemReport {
                name: display_name(&path),
                outcome: ItemOutcome::Produced(path),
            })
            .collect();
        Ok(StageReport {
            stage,
            cached: true,
            items,
        })
    }

    async fn acquire_stage(
        &self,
        area: &WorkArea,
        ledger: &mut CacheLedger,
        params: &ValidatedRequest,
    ) -> Result<StageReport> {
        let stage = Stage::Acquire;
        let key = RunKey::for_stage(stage, params);
        let dir = area.videos();

        if self.reuse_or_reset(ledger, stage, &key, &dir)? {
            return Self::cached_report(stage, &dir);
        }

        let query = acquire::search_query(&params.subject, &self.search_suffix);
        tracing::info!(
            "Downloading {} videos for \"{}\" from {}",
            params.item_count,
            query,
            self.source.platform_name()
        );

        let progress = utils::spinner("Downloading videos...", self.show_progress);
        let fetched = self.source.fetch(&query, params.item_count, &dir).await;
        progress.finish_and_clear();
        let fetched = fetched.context("Video download failed")?;

        tracing::info!("Video download completed: {} files", fetched);

        ledger.record(stage, key);
        ledger.save()?;

        let items = workspace::list_files(&dir)?
            .into_iter()
            .map(|path| ItemReport {
                name: display_name(&path),
                outcome: ItemOutcome::Produced(path),
            })
            .collect();
        Ok(StageReport {
            stage,
            cached: false,
            items,
        })
    }

    async fn extract_stage(
        &self,
        area: &WorkArea,
        ledger: &mut CacheLedger,
        params: &ValidatedRequest,
    ) -> Result<StageReport> {
        let stage = Stage::Extract;
        let key = RunKey::for_stage(stage, params);
        let dir = area.audios();

        if self.reuse_or_reset(ledger, stage, &key, &dir)? {
            return Self::cached_report(stage, &dir);
        }

        tracing::info!("Converting videos to audio...");
        let sources = workspace::list_files(&area.videos())?;
        let progress = utils::progress_bar(sources.len() as u64, "Extracting audio", self.show_progress);

        let mut items = Vec::with_capacity(sources.len());
        for source in &sources {
            progress.set_message(display_name(source));
            items.push(extract::extract_item(self.engine.as_ref(), source, &dir).await);
            progress.inc(1);
        }
        progress.finish_and_clear();

        let report = StageReport {
            stage,
            cached: false,
            items,
        };
        tracing::info!(
            "Audio conversion completed: {} converted, {} skipped",
            report.produced(),
            report.skipped()
        );

        ledger.record(stage, key);
        ledger.save()?;
        Ok(report)
    }

    async fn trim_stage(
        &self,
        area: &WorkArea,
        ledger: &mut CacheLedger,
        params: &ValidatedRequest,
    ) -> Result<StageReport> {
        let stage = Stage::Trim;
        let key = RunKey::for_stage(stage, params);
        let dir = area.trimmed();

        if self.reuse_or_reset(ledger, stage, &key, &dir)? {
            return Self::cached_report(stage, &dir);
        }

        tracing::info!("Trimming first {} seconds from each audio...", params.duration_secs);
        let sources = workspace::list_files_with_extension(&area.audios(), AUDIO_EXTENSION)?;
        let progress = utils::progress_bar(sources.len() as u64, "Trimming audio", self.show_progress);

        let mut items = Vec::with_capacity(sources.len());
        for source in &sources {
            progress.set_message(display_name(source));
            items.push(trim::trim_item(self.engine.as_ref(), source, &dir, params.duration_secs).await);
            progress.inc(1);
        }
        progress.finish_and_clear();

        let report = StageReport {
            stage,
            cached: false,
            items,
        };
        tracing::info!(
            "Audio trimming completed: {} trimmed, {} skipped",
            report.produced(),
            report.skipped()
        );

        ledger.record(stage, key);
        ledger.save()?;
        Ok(report)
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquire::MockMediaSource;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Engine whose "media" files hold their length in seconds as text
    #[derive(Default, Clone)]
    struct FakeEngine {
        joined: Arc<Mutex<Vec<Vec<String>>>>,
    }

    fn read_secs(path: &Path) -> Result<f64> {
        let text = fs_err::read_to_string(path)?;
        text.trim()
            .parse::<f64>()
            .map_err(|_| anyhow::anyhow!("cannot decode {}", path.display()))
    }

    #[async_trait]
    impl MediaEngine for FakeEngine {
        async fn probe_duration(&self, path: &Path) -> Result<f64> {
            read_secs(path)
        }

        async fn extract_audio(&self, source: &Path, target: &Path) -> Result<()> {
            let secs = read_secs(source)?;
            fs_err::write(target, secs.to_string())?;
            Ok(())
        }

        async fn trim(&self, source: &Path, target: &Path, seconds: u64) -> Result<()> {
            let secs = read_secs(source)?.min(seconds as f64);
            fs_err::write(target, secs.to_string())?;
            Ok(())
        }

        async fn concat(&self, inputs: &[PathBuf], target: &Path) -> Result<()> {
            let mut total = 0.0;
            for input in inputs {
                total += read_secs(input)?;
            }
            self.joined
                .lock()
                .unwrap()
                .push(inputs.iter().map(|p| display_name(p)).collect());
            fs_err::write(target, total.to_string())?;
            Ok(())
        }
    }

    fn params(count: u32, duration: u64) -> ValidatedRequest {
        ValidatedRequest {
            subject: "Test Singer".to_string(),
            item_count: count,
            duration_secs: duration,
        }
    }

    fn request(count: u32, duration: u64) -> PipelineRequest {
        PipelineRequest::new(params(count, duration), None, &OutputConfig::default())
    }

    /// Source that writes `lengths.len()` items, one per length
    fn source_with(lengths: Vec<&'static str>) -> MockMediaSource {
        let mut source = MockMediaSource::new();
        source
            .expect_fetch()
            .withf(|query, count, _dest| query == "Test Singer songs" && *count == 11)
            .times(1)
            .returning(move |_query, _count, dest| {
                for (i, length) in lengths.iter().enumerate() {
                    fs_err::write(dest.join(format!("Song {:02}.webm", i)), length)?;
                }
                Ok(lengths.len())
            });
        source.expect_platform_name().return_const("Fake");
        source
    }

    fn idle_source() -> MockMediaSource {
        let mut source = MockMediaSource::new();
        source.expect_fetch().never();
        source.expect_platform_name().return_const("Fake");
        source
    }

    fn eleven_items_one_short() -> Vec<&'static str> {
        let mut lengths = vec!["180"; 11];
        lengths[7] = "15";
        lengths
    }

    #[tokio::test]
    async fn test_end_to_end_drops_short_track() {
        let dir = tempfile::tempdir().unwrap();
        let engine = FakeEngine::default();
        let pipeline = MashupPipeline::new(
            Box::new(source_with(eleven_items_one_short())),
            Box::new(engine.clone()),
            WorkArea::new(dir.path()),
        );

        let report = pipeline.run(&request(11, 21)).await.unwrap();

        assert_eq!(report.stage(Stage::Acquire).unwrap().produced(), 11);
        assert_eq!(report.stage(Stage::Extract).unwrap().produced(), 11);

        let trimmed = report.stage(Stage::Trim).unwrap();
        assert_eq!(trimmed.produced(), 10);
        let dropped: Vec<&ItemReport> = trimmed.items.iter().filter(|i| !i.is_produced()).collect();
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].name, "Song 07.mp3");
        assert!(matches!(
            dropped[0].outcome,
            ItemOutcome::Skipped(SkipReason::TooShort { required_secs: 21, .. })
        ));

        assert_eq!(report.composed.duration_secs, Some(210.0));
        assert_eq!(report.composed.tracks.len(), 10);
        assert_eq!(package::list_entries(&report.archive).unwrap(), vec!["final_mashup.mp3"]);
        assert!(report.archive.ends_with("output/mashup_result.zip"));
    }

    #[tokio::test]
    async fn test_tracks_joined_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        let engine = FakeEngine::default();
        let pipeline = MashupPipeline::new(
            Box::new(source_with(vec!["30"; 11])),
            Box::new(engine.clone()),
            WorkArea::new(dir.path()),
        );

        pipeline.run(&request(11, 21)).await.unwrap();

        let joined = engine.joined.lock().unwrap();
        assert_eq!(joined.len(), 1);
        let mut sorted = joined[0].clone();
        sorted.sort();
        assert_eq!(joined[0], sorted);
        assert_eq!(joined[0][0], "Song 00.mp3");
    }

    #[tokio::test]
    async fn test_second_run_reuses_stages_and_recomposes() {
        let dir = tempfile::tempdir().unwrap();
        let engine = FakeEngine::default();

        let first = MashupPipeline::new(
            Box::new(source_with(eleven_items_one_short())),
            Box::new(engine.clone()),
            WorkArea::new(dir.path()),
        );
        let first_report = first.run(&request(11, 21)).await.unwrap();

        let second = MashupPipeline::new(Box::new(idle_source()), Box::new(engine.clone()), WorkArea::new(dir.path()));
        let second_report = second.run(&request(11, 21)).await.unwrap();

        for stage in Stage::ALL {
            let before = first_report.stage(stage).unwrap();
            let after = second_report.stage(stage).unwrap();
            assert!(!before.cached);
            assert!(after.cached);
            assert_eq!(after.produced(), before.produced());
        }
        assert_eq!(engine.joined.lock().unwrap().len(), 2);
        assert_eq!(second_report.composed.duration_secs, Some(210.0));
    }

    #[tokio::test]
    async fn test_changed_duration_rebuilds_trim_only() {
        let dir = tempfile::tempdir().unwrap();
        let engine = FakeEngine::default();

        MashupPipeline::new(
            Box::new(source_with(eleven_items_one_short())),
            Box::new(engine.clone()),
            WorkArea::new(dir.path()),
        )
        .run(&request(11, 21))
        .await
        .unwrap();

        let report = MashupPipeline::new(Box::new(idle_source()), Box::new(engine.clone()), WorkArea::new(dir.path()))
            .run(&request(11, 30))
            .await
            .unwrap();

        assert!(report.stage(Stage::Acquire).unwrap().cached);
        assert!(report.stage(Stage::Extract).unwrap().cached);
        assert!(!report.stage(Stage::Trim).unwrap().cached);
        assert_eq!(report.composed.duration_secs, Some(300.0));
    }

    #[tokio::test]
    async fn test_stale_directory_without_ledger_is_rebuilt() {
        let dir = tempfile::tempdir().unwrap();
        let area = WorkArea::create(dir.path()).unwrap();
        fs_err::write(area.videos().join("Old Song.webm"), "999").unwrap();

        let report = MashupPipeline::new(
            Box::new(source_with(vec!["60"; 11])),
            Box::new(FakeEngine::default()),
            WorkArea::new(dir.path()),
        )
        .run(&request(11, 21))
        .await
        .unwrap();

        assert!(!area.videos().join("Old Song.webm").exists());
        assert_eq!(report.stage(Stage::Acquire).unwrap().produced(), 11);
        assert_eq!(report.composed.duration_secs, Some(231.0));
    }

    #[tokio::test]
    async fn test_undecodable_item_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut lengths = vec!["60"; 11];
        lengths[3] = "not audio";

        let report = MashupPipeline::new(
            Box::new(source_with(lengths)),
            Box::new(FakeEngine::default()),
            WorkArea::new(dir.path()),
        )
        .run(&request(11, 21))
        .await
        .unwrap();

        let extracted = report.stage(Stage::Extract).unwrap();
        assert_eq!(extracted.produced(), 10);
        assert!(extracted
            .items
            .iter()
            .any(|i| matches!(i.outcome, ItemOutcome::Skipped(SkipReason::DecodeFailed(_)))));
        assert_eq!(report.stage(Stage::Trim).unwrap().produced(), 10);
    }

    #[tokio::test]
    async fn test_items_sharing_a_stem_keep_first_track() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = MockMediaSource::new();
        source
            .expect_fetch()
            .times(1)
            .returning(|_query, _count, dest| {
                fs_err::write(dest.join("Song.mp4"), "90")?;
                fs_err::write(dest.join("Song.webm"), "45")?;
                for i in 0..9 {
                    fs_err::write(dest.join(format!("Track {:02}.webm", i)), "60")?;
                }
                Ok(11)
            });
        source.expect_platform_name().return_const("Fake");

        let report = MashupPipeline::new(
            Box::new(source),
            Box::new(FakeEngine::default()),
            WorkArea::new(dir.path()),
        )
        .run(&request(11, 21))
        .await
        .unwrap();

        let extracted = report.stage(Stage::Extract).unwrap();
        assert_eq!(extracted.produced(), 10);
        let collided: Vec<&ItemReport> = extracted.items.iter().filter(|i| !i.is_produced()).collect();
        assert_eq!(collided.len(), 1);
        assert_eq!(collided[0].name, "Song.webm");
        assert_eq!(
            collided[0].outcome,
            ItemOutcome::Skipped(SkipReason::NameCollision {
                existing: "Song.mp3".to_string()
            })
        );

        let audios = workspace::list_files(&WorkArea::new(dir.path()).audios()).unwrap();
        assert_eq!(audios.len(), extracted.produced());
        assert_eq!(fs_err::read_to_string(dir.path().join("audios/Song.mp3")).unwrap(), "90");
    }

    #[tokio::test]
    async fn test_all_tracks_too_short_fails_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = MashupPipeline::new(
            Box::new(source_with(vec!["15"; 11])),
            Box::new(FakeEngine::default()),
            WorkArea::new(dir.path()),
        );

        let err = pipeline.run(&request(11, 21)).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MashupError>(),
            Some(MashupError::NoTrimmedTracks(_))
        ));
        assert!(!workspace::is_populated(&pipeline.work_area().output()).unwrap());
    }

    #[tokio::test]
    async fn test_restricted_environment_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = MashupPipeline::new(
            Box::new(idle_source()),
            Box::new(FakeEngine::default()),
            WorkArea::new(dir.path().join("work")),
        )
        .restricted(true);

        let err = pipeline.run(&request(11, 21)).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MashupError>(),
            Some(MashupError::RestrictedEnvironment)
        ));
        assert!(!dir.path().join("work").exists());
    }

    #[tokio::test]
    async fn test_provider_error_aborts_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = MockMediaSource::new();
        source
            .expect_fetch()
            .times(1)
            .returning(|_, _, _| Err(MashupError::AcquisitionFailed("quota".to_string()).into()));
        source.expect_platform_name().return_const("Fake");

        let err = MashupPipeline::new(Box::new(source), Box::new(FakeEngine::default()), WorkArea::new(dir.path()))
            .run(&request(11, 21))
            .await
            .unwrap_err();
        assert!(err
            .chain()
            .any(|cause| matches!(cause.downcast_ref::<MashupError>(), Some(MashupError::AcquisitionFailed(_)))));
    }

    #[test]
    fn test_request_names_follow_output_target() {
        let names = OutputConfig::default();
        let audio = PipelineRequest::new(params(11, 21), Some(&OutputTarget::Audio("mix.mp3".into())), &names);
        assert_eq!(audio.composed_name, "mix.mp3");
        assert_eq!(audio.archive_name, "mashup_result.zip");

        let archive = PipelineRequest::new(params(11, 21), Some(&OutputTarget::Archive("mix.zip".into())), &names);
        assert_eq!(archive.composed_name, "final_mashup.mp3");
        assert_eq!(archive.archive_name, "mix.zip");
    }
}
