//! Transformation orchestrator — the central state machine.
//!
//! `Upload → Processing → {Result | Error | Upload-with-gate}`. One remote
//! call per run, raced inside a `tokio::select!` loop against a scripted
//! progress schedule and the transport-progress channel. The schedule is
//! decorative: it paces perceived progress during one long opaque server
//! call and never blocks (or is blocked by) the response. Because the
//! schedule lives inside the submit future, a finished run cannot leak
//! timers into the next one; a run generation token plus a monotonic
//! progress check guards everything else.

use doppel_core::api::{ProgressFn, SwapApi};
use doppel_core::error::{ApiError, ValidationError};
use doppel_core::types::{
    FeatureKind, ProcessingState, ProcessingStep, SelectedFile, Transformation,
};
use doppel_core::upload::{FileCandidate, UploadManager};
use doppel_core::usage::UsageTracker;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::gate::{AuthProvider, RegistrationGate};

/// Transport upload progress never overtakes the scripted narrative.
const UPLOAD_PROGRESS_CAP: u8 = 20;
const UPLOAD_MESSAGE: &str = "Uploading your selfie securely...";

/// Pause between the matched announcement and the swap step, and between the
/// swap step and landing in Result.
const SWAP_STEP_DELAY: Duration = Duration::from_millis(1000);
const COMPLETE_DELAY: Duration = Duration::from_millis(1000);

/// One decorative cue: applied `at` after the run starts, unless the run has
/// already moved past it.
struct ScriptCue {
    at: Duration,
    step: ProcessingStep,
    progress: u8,
    message: &'static str,
}

fn script_for(mode: FeatureKind) -> [ScriptCue; 3] {
    match mode {
        FeatureKind::Match => [
            ScriptCue {
                at: Duration::from_millis(500),
                step: ProcessingStep::Analyzing,
                progress: 25,
                message: "AI is analyzing your facial features...",
            },
            ScriptCue {
                at: Duration::from_millis(1500),
                step: ProcessingStep::Analyzing,
                progress: 45,
                message: "Identifying unique facial characteristics...",
            },
            ScriptCue {
                at: Duration::from_millis(3000),
                step: ProcessingStep::Matching,
                progress: 65,
                message: "Searching through historical figures...",
            },
        ],
        FeatureKind::Randomize => [
            ScriptCue {
                at: Duration::from_millis(500),
                step: ProcessingStep::Analyzing,
                progress: 25,
                message: "AI is preparing a random transformation...",
            },
            ScriptCue {
                at: Duration::from_millis(1500),
                step: ProcessingStep::Analyzing,
                progress: 45,
                message: "Spinning the wheel of history...",
            },
            ScriptCue {
                at: Duration::from_millis(3000),
                step: ProcessingStep::Matching,
                progress: 65,
                message: "Selecting your random historical twin...",
            },
        ],
    }
}

/// Where the flow currently stands. `Result` and `Error` are terminal for a
/// run; `reset` returns to `Upload`.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowState {
    Upload,
    Processing,
    Result(Transformation),
    Error(String),
}

impl FlowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Result(_) | Self::Error(_))
    }
}

pub struct Orchestrator<A: SwapApi> {
    api: Arc<A>,
    usage: UsageTracker,
    upload: UploadManager,
    gate: RegistrationGate,
    state: FlowState,
    processing: ProcessingState,
    /// Run generation token; bumped on every submit and reset so updates
    /// queued by a previous run can never land on a newer one.
    run: u64,
    progress_tx: Option<mpsc::UnboundedSender<ProcessingState>>,
}

impl<A: SwapApi> Orchestrator<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self {
            api,
            usage: UsageTracker::new(),
            upload: UploadManager::new(),
            gate: RegistrationGate::new(),
            state: FlowState::Upload,
            processing: ProcessingState::initial(),
            run: 0,
            progress_tx: None,
        }
    }

    /// Receive a copy of every processing update. One subscriber at a time;
    /// subscribing again replaces the previous receiver.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<ProcessingState> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.progress_tx = Some(tx);
        rx
    }

    /// Initial usage fetch. Failure is tolerated: the tracker stays empty and
    /// quota checks fail open — the server enforces via 429 regardless.
    pub async fn bootstrap(&mut self) {
        match self.api.get_usage_status().await {
            Ok(usage) => self.usage.record(usage),
            Err(err) => {
                tracing::warn!(error = %err, "initial usage fetch failed; failing open");
            }
        }
    }

    pub fn select_file(&mut self, candidate: FileCandidate) -> Result<(), ValidationError> {
        self.upload.select(candidate).map(|_| ())
    }

    pub fn clear_file(&mut self) {
        self.upload.clear();
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn processing(&self) -> &ProcessingState {
        &self.processing
    }

    pub fn usage(&self) -> &UsageTracker {
        &self.usage
    }

    pub fn upload(&self) -> &UploadManager {
        &self.upload
    }

    pub fn gate(&self) -> &RegistrationGate {
        &self.gate
    }

    pub fn can_use(&self, feature: FeatureKind) -> bool {
        self.usage.can_use(feature)
    }

    /// Dismiss the registration gate without authenticating.
    pub fn dismiss_gate(&mut self) {
        self.gate.close();
    }

    /// Route a sign-up through the injected provider, close the gate, and
    /// refresh usage so a newly privileged session is picked up.
    pub async fn sign_up(&mut self, auth: &dyn AuthProvider) {
        if auth.is_ready() && auth.sign_up().await.is_some() {
            // New identity: the old anonymous snapshot no longer applies
            self.usage.clear();
        }
        self.gate.close();
        self.refresh_usage().await;
    }

    pub async fn log_in(&mut self, auth: &dyn AuthProvider) {
        if auth.is_ready() && auth.log_in().await.is_some() {
            self.usage.clear();
        }
        self.gate.close();
        self.refresh_usage().await;
    }

    /// Submit the selected selfie for transformation.
    ///
    /// No-op without a validated selection or while a run is in flight. When
    /// quota for `mode` is known to be exhausted, opens the registration gate
    /// without issuing the remote call.
    pub async fn submit(&mut self, mode: FeatureKind) {
        let file = match self.upload.selected() {
            Some(f) => f.clone(),
            None => {
                tracing::debug!(%mode, "submit ignored: no file selected");
                return;
            }
        };
        if self.state == FlowState::Processing {
            tracing::debug!(%mode, "submit ignored: run already in flight");
            return;
        }
        if !self.usage.can_use(mode) {
            tracing::info!(%mode, "quota exhausted, opening registration gate");
            self.gate.open(mode);
            self.state = FlowState::Upload;
            return;
        }

        self.run += 1;
        let run = self.run;
        self.state = FlowState::Processing;
        self.processing = ProcessingState::initial();
        tracing::info!(%mode, run, file = %file.name, "starting transformation");

        self.apply(run, ProcessingStep::Uploading, 10, UPLOAD_MESSAGE, None);

        let outcome = self.drive_request(run, &file, mode).await;
        match outcome {
            Ok(result) => self.finish_success(run, mode, result).await,
            Err(ApiError::UsageLimit(limit)) => {
                tracing::info!(feature = %limit.feature_type, "usage limit reported by server");
                self.usage.apply_limit_error(&limit);
                self.gate.open(limit.feature_type);
                self.processing = ProcessingState::initial();
                self.state = FlowState::Upload;
            }
            Err(err) => {
                tracing::warn!(error = %err, "transformation failed");
                self.state = FlowState::Error(err.to_string());
            }
        }
    }

    /// Race the in-flight request against the decorative schedule and the
    /// transport-progress channel. Unfired cues die with the loop.
    async fn drive_request(
        &mut self,
        run: u64,
        file: &SelectedFile,
        mode: FeatureKind,
    ) -> Result<Transformation, ApiError> {
        let (upload_tx, mut upload_rx) = mpsc::unbounded_channel::<f32>();
        let on_progress: ProgressFn = Box::new(move |frac| {
            let _ = upload_tx.send(frac);
        });

        let api = Arc::clone(&self.api);
        let file = file.clone();
        let api_fut = async move { api.submit_transformation(&file, mode, on_progress).await };
        tokio::pin!(api_fut);

        let script = script_for(mode);
        let started = tokio::time::Instant::now();
        let mut cue_idx = 0;

        loop {
            let deadline = script.get(cue_idx).map(|cue| started + cue.at);
            tokio::select! {
                result = &mut api_fut => break result,
                Some(frac) = upload_rx.recv() => {
                    let pct = ((frac * 100.0) as u8).min(UPLOAD_PROGRESS_CAP);
                    self.apply(run, ProcessingStep::Uploading, pct, UPLOAD_MESSAGE, None);
                }
                _ = tokio::time::sleep_until(
                    deadline.unwrap_or_else(|| started + Duration::from_secs(86_400))
                ), if deadline.is_some() => {
                    let cue = &script[cue_idx];
                    self.apply(run, cue.step, cue.progress, cue.message, None);
                    cue_idx += 1;
                }
            }
        }
    }

    /// Post-success tail of the narrative, then land in `Result` and refresh
    /// usage once so counters stay current for the next attempt.
    async fn finish_success(&mut self, run: u64, mode: FeatureKind, result: Transformation) {
        let name = result.match_name.clone();
        let found = match mode {
            FeatureKind::Match => format!("Perfect match found: {name}!"),
            FeatureKind::Randomize => format!("Random selection: {name}!"),
        };
        self.apply(run, ProcessingStep::Matching, 80, &found, Some(name.clone()));
        tokio::time::sleep(SWAP_STEP_DELAY).await;
        self.apply(
            run,
            ProcessingStep::Swapping,
            95,
            &format!("Transforming you into {name}..."),
            Some(name.clone()),
        );
        tokio::time::sleep(COMPLETE_DELAY).await;
        self.apply(run, ProcessingStep::Complete, 100, &result.message, Some(name));

        // The generate response piggybacks a snapshot; adopt it, then do the
        // authoritative refresh.
        if let Some(usage) = &result.usage {
            self.usage.record(usage.clone());
        }
        self.state = FlowState::Result(result);
        self.refresh_usage().await;
    }

    async fn refresh_usage(&mut self) {
        match self.api.get_usage_status().await {
            Ok(usage) => self.usage.record(usage),
            Err(err) => tracing::debug!(error = %err, "usage refresh failed"),
        }
    }

    /// Return to `Upload` from any state: selection, result, error, and the
    /// processing snapshot all go back to initial values, and the run token
    /// is bumped so nothing queued by the old run can land.
    pub fn reset(&mut self) {
        self.run += 1;
        self.upload.clear();
        self.processing = ProcessingState::initial();
        self.state = FlowState::Upload;
    }

    /// Apply a progress update if it still belongs to the current run.
    ///
    /// Guards: matching run token, still in `Processing`, and progress never
    /// moves backwards — a late transport callback cannot drag a 45% run back
    /// to the upload step.
    fn apply(
        &mut self,
        run: u64,
        step: ProcessingStep,
        progress: u8,
        message: &str,
        matched_figure: Option<String>,
    ) {
        if run != self.run || self.state != FlowState::Processing {
            return;
        }
        if progress < self.processing.progress {
            return;
        }
        self.processing = ProcessingState {
            step,
            progress,
            message: message.to_string(),
            matched_figure: matched_figure.or_else(|| self.processing.matched_figure.take()),
        };
        tracing::debug!(?step, progress, "processing update");
        if let Some(tx) = &self.progress_tx {
            let _ = tx.send(self.processing.clone());
        }
    }
}
