//! The worker's request loop.

use std::sync::Arc;

use page_core::{PageBundle, RenderRequest, RequestId, WorkerPhase};
use page_ipc::{ErrorReport, IncomingMessage, IpcChannel, IpcError, OutgoingResponse};
use page_observability::MetricsCollector;
use tracing::{debug, error, info, info_span, trace, Instrument};

use crate::classify::classify;
use crate::engine::{EngineRequest, RenderEngine, ResponseShim};
use crate::error::{RenderError, WorkerError};
use crate::manifest::{DynamicManifest, LoadableManifest};
use crate::options::{status_for_path, synthesize};

/// Process-lifetime state shared by every request.
///
/// Built once at startup and never mutated.
pub struct WorkerContext {
    bundle: PageBundle,
    manifest: Arc<dyn LoadableManifest>,
}

impl WorkerContext {
    /// Create a context using the key-decoding manifest resolver.
    pub fn new(bundle: PageBundle) -> Self {
        Self {
            bundle,
            manifest: Arc::new(DynamicManifest),
        }
    }
}

/// Handle one request: synthesize options, render, classify.
pub async fn handle_request<E>(
    ctx: &WorkerContext,
    engine: &E,
    request: RenderRequest,
) -> Result<OutgoingResponse, RenderError>
where
    E: RenderEngine + ?Sized,
{
    let request_id = RequestId::generate();
    let is_data_req = ctx.bundle.is_data_req();
    let span = info_span!(
        "render",
        request_id = %request_id,
        path = %request.path,
        data_request = is_data_req,
    );

    async move {
        let mut metrics = MetricsCollector::new(request_id, request.path.clone(), is_data_req);

        metrics.synthesize_started();
        let options = synthesize(&ctx.bundle, &request, ctx.manifest.clone());
        let status_code = status_for_path(&request.path);
        let engine_req = EngineRequest::from_request(&request);
        let mut res = ResponseShim::new(status_code);
        let query = request.merged_query();
        metrics.synthesize_finished();
        trace!(options = %options.describe(), "synthesized render options");

        metrics.render_started();
        let outcome = engine
            .render(&engine_req, &mut res, &request.path, &query, &options)
            .await
            .map_err(RenderError::Engine)?;
        metrics.render_finished();
        debug!(outcome = outcome.kind(), "engine finished");

        metrics.classify_started();
        let classified = classify(outcome, is_data_req, status_code)?;
        metrics.classify_finished(
            classified.kind,
            classified.response.status_code(),
            classified.body_bytes(),
        );

        let metrics = metrics.finish();
        info!(
            outcome = classified.kind.as_str(),
            status = ?metrics.status_code,
            total_us = metrics.total_us,
            "request completed"
        );
        debug!(metrics = %metrics.to_json(), "request metrics");

        Ok(classified.response)
    }
    .instrument(span)
    .await
}

/// Drives the request loop for one page.
pub struct PageWorker<E> {
    ctx: WorkerContext,
    engine: E,
    phase: WorkerPhase,
    requests_served: u64,
}

impl<E: RenderEngine> PageWorker<E> {
    /// Create a worker.
    pub fn new(ctx: WorkerContext, engine: E) -> Self {
        Self {
            ctx,
            engine,
            phase: WorkerPhase::WaitingForRequest,
            requests_served: 0,
        }
    }

    /// Current loop phase.
    pub fn phase(&self) -> WorkerPhase {
        self.phase
    }

    /// Number of responses sent.
    pub fn requests_served(&self) -> u64 {
        self.requests_served
    }

    /// Serve requests until the host hangs up or something fails.
    ///
    /// Returns `Ok(())` when the host closes the channel. Any error ends the
    /// loop; every error except a protocol violation is first reported
    /// through the channel's error path. The caller is expected to exit the
    /// process with a failure status on `Err`.
    pub async fn run<C>(&mut self, channel: &mut C) -> Result<(), WorkerError>
    where
        C: IpcChannel + ?Sized,
    {
        info!(
            data_request = self.ctx.bundle.is_data_req(),
            component = self.ctx.bundle.component().name(),
            stripped = self.ctx.bundle.component_stripped(),
            "worker ready"
        );

        loop {
            self.enter(WorkerPhase::WaitingForRequest);
            let request = match channel.recv().await {
                Ok(IncomingMessage::Headers(request)) => request,
                Err(IpcError::Closed) => {
                    info!(served = self.requests_served, "host closed channel");
                    self.enter(WorkerPhase::Terminated);
                    return Ok(());
                }
                Err(IpcError::UnexpectedMessageType(kind)) => {
                    return Err(self.fail(channel, WorkerError::Protocol(kind)).await);
                }
                Err(err) => return Err(self.fail(channel, err.into()).await),
            };

            self.enter(WorkerPhase::Processing);
            let response = match handle_request(&self.ctx, &self.engine, request).await {
                Ok(response) => response,
                Err(err) => return Err(self.fail(channel, err.into()).await),
            };

            self.enter(WorkerPhase::Sending);
            if let Err(err) = channel.send(response).await {
                return Err(self.fail(channel, err.into()).await);
            }
            self.requests_served += 1;
        }
    }

    async fn fail<C>(&mut self, channel: &mut C, err: WorkerError) -> WorkerError
    where
        C: IpcChannel + ?Sized,
    {
        error!(error = %err, "stopping worker");
        if err.is_reported() {
            if let Err(send_err) = channel.send_error(ErrorReport::from_error(&err)).await {
                error!(error = %send_err, "failed to report error to host");
            }
        }
        self.enter(WorkerPhase::Terminated);
        err
    }

    fn enter(&mut self, next: WorkerPhase) {
        debug_assert!(
            self.phase == next || self.phase.can_transition_to(next),
            "illegal phase transition {:?} -> {:?}",
            self.phase,
            next
        );
        trace!(from = self.phase.as_str(), to = next.as_str(), "phase");
        self.phase = next;
    }
}
