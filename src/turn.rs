use crate::approval::{ApprovalPrompt, ApprovalReply};
use crate::display::ExecutionDisplay;
use crate::engine::client::EngineClient;
use crate::router::StreamEventRouter;
use crate::state::TurnContext;
use crate::types::{ResumeCommand, SuspendRequest};
use anyhow::Result;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Phases of one conversational turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Running,
    WaitingForApproval,
    Resuming,
    Completed,
}

/// What a settled turn hands back to the caller. `content` is None when the
/// engine never produced a final answer (for example, a tools-only turn);
/// showing "nothing to say" is the caller's business.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub content: Option<String>,
    pub elapsed: Duration,
}

/// Drives one whole turn: opens stream passes, routes their events, obtains
/// a human decision whenever the engine suspends, forwards exactly one
/// resume command per decision, and repeats until no interrupt is pending.
pub struct TurnController<'a> {
    engine: &'a EngineClient,
    context: &'a mut TurnContext,
    cancel: CancellationToken,
}

impl<'a> TurnController<'a> {
    pub fn new(
        engine: &'a EngineClient,
        context: &'a mut TurnContext,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            engine,
            context,
            cancel,
        }
    }

    /// Run the turn to completion. Never returns an error: failures fold
    /// into a final-answer-shaped message so the outer loop always survives.
    pub async fn run_turn(
        &mut self,
        input: String,
        display: &mut ExecutionDisplay,
        approval: &mut dyn ApprovalPrompt,
    ) -> TurnOutcome {
        let started = Instant::now();
        let content = match self.drive(input, display, approval).await {
            Ok(content) => content,
            Err(error) => Some(format!("The turn failed before completing: {error}")),
        };

        TurnOutcome {
            content,
            elapsed: started.elapsed(),
        }
    }

    async fn drive(
        &mut self,
        input: String,
        display: &mut ExecutionDisplay,
        approval: &mut dyn ApprovalPrompt,
    ) -> Result<Option<String>> {
        let session = self.context.session_id().to_string();
        let mode = self.context.reasoning_mode().to_string();
        let mut next_input = Some(self.context.compose_input(&input));

        let mut final_content: Option<String> = None;
        let mut pending: Option<SuspendRequest> = None;
        let mut approved = false;
        let mut phase = TurnPhase::Running;

        loop {
            match phase {
                TurnPhase::Running => {
                    let stream = self
                        .engine
                        .open_stream(&session, next_input.take().as_deref(), &mode)
                        .await?;
                    let outcome =
                        StreamEventRouter::route_pass(stream, display, &self.cancel).await;

                    if self.cancel.is_cancelled() {
                        // Interrupted turns end here; nothing is resumed.
                        phase = TurnPhase::Completed;
                        continue;
                    }

                    if let Some(text) = outcome.final_content.filter(|text| !text.is_empty()) {
                        final_content = Some(text);
                    }

                    // The stream channel and the persisted-state query are
                    // one logical suspend source; the channel value wins
                    // when both are available for the same pass.
                    pending = match outcome.interrupt {
                        Some(request) => Some(request),
                        None => self.engine.pending_interrupt(&session).await?,
                    };

                    phase = if pending.is_some() {
                        TurnPhase::WaitingForApproval
                    } else {
                        TurnPhase::Completed
                    };
                }
                TurnPhase::WaitingForApproval => {
                    let Some(request) = pending.take() else {
                        phase = TurnPhase::Completed;
                        continue;
                    };

                    phase = match approval.ask(&request) {
                        ApprovalReply::Approved => {
                            approved = true;
                            TurnPhase::Resuming
                        }
                        ApprovalReply::Denied => {
                            approved = false;
                            TurnPhase::Resuming
                        }
                        ApprovalReply::Aborted => TurnPhase::Completed,
                    };
                }
                TurnPhase::Resuming => {
                    self.engine
                        .send_resume(&session, &ResumeCommand { approved })
                        .await?;
                    next_input = None;
                    phase = TurnPhase::Running;
                }
                TurnPhase::Completed => break,
            }
        }

        Ok(final_content)
    }
}
