//! Tagging orchestrator: one alarm in, one tag decision out.
//!
//! # Pipeline
//!
//! ```text
//! Validate ──► Classify ──► LoadParams ──► Connect ──► Fetch ──► Resolve ──► Apply
//!                 │                                                 │          │
//!                 ▼                                                 ▼          ▼
//!          NotActionable                                     NoMatchingTag   Tagged
//! ```
//!
//! Every stage either advances, finishes with an [`Outcome`], or fails
//! with a [`TaggingError`] naming the stage. Outcomes are answered with
//! status 200, errors with 500 and the error text as body.

use std::sync::Arc;

use tracing::{debug, info};

use vmtier_core::event;
use vmtier_core::tier;
use vmtier_core::{AlarmNotification, ConnectionParams, ObjectRef, ParamsSource, ResourceCategory, TierName};
use vmtier_directory::{Session, SessionManager};

use crate::error::{TaggingError, TaggingResult};
use crate::fetcher::fetch_hardware;
use crate::resolver::{ResolvedTag, resolve_tag};

pub const STATUS_OK: u16 = 200;
pub const STATUS_INTERNAL_ERROR: u16 = 500;

/// Body and status code returned to the invoking transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl InvocationResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: STATUS_OK,
            body: message.into().into_bytes(),
        }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self {
            status: STATUS_INTERNAL_ERROR,
            body: message.into().into_bytes(),
        }
    }

    pub fn body_text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Terminal, non-error result of an invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Not a red CPU/memory alarm.
    NotActionable,
    /// The category has no tag for the computed tier.
    NoMatchingTag {
        vm: ObjectRef,
        category: &'static str,
        tier: TierName,
    },
    Tagged {
        vm: ObjectRef,
        tag_id: String,
        category_id: String,
    },
}

impl Outcome {
    pub fn message(&self) -> String {
        match self {
            Outcome::NotActionable => "Alert not for CPU/Memory in red, nothing to do.".to_string(),
            Outcome::NoMatchingTag { vm, category, tier } => format!(
                "no tag named {tier} in category {category}, {} was not tagged",
                vm.value
            ),
            Outcome::Tagged {
                vm,
                tag_id,
                category_id,
            } => format!("{} was tagged with {tag_id}, {category_id}", vm.value),
        }
    }
}

/// What the alarm asks for, once it is known to be actionable.
#[derive(Debug, Clone)]
struct Target {
    vm: ObjectRef,
    category: ResourceCategory,
    tag_category: &'static str,
}

/// Position of an invocation in the pipeline.
enum Stage {
    Validate,
    Classify(AlarmNotification),
    LoadParams(Target),
    Connect(Target, ConnectionParams),
    Fetch(Target, Arc<Session>),
    Resolve(Target, Arc<Session>, TierName),
    Apply(Target, Arc<Session>, ResolvedTag),
    Done(Outcome),
}

/// Runs the tagging pipeline for each invocation.
///
/// Cheap to share: all invocations in a process should go through one
/// orchestrator so they share its `SessionManager`.
pub struct TaggingOrchestrator {
    params: Arc<dyn ParamsSource>,
    sessions: Arc<SessionManager>,
}

impl TaggingOrchestrator {
    pub fn new(params: Arc<dyn ParamsSource>, sessions: Arc<SessionManager>) -> Self {
        Self { params, sessions }
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Handle one invocation payload.
    pub async fn handle(&self, payload: &[u8]) -> InvocationResponse {
        match self.run(payload).await {
            Ok(outcome) => {
                let message = outcome.message();
                info!(%message, "invocation finished");
                InvocationResponse::ok(message)
            }
            Err(e) => {
                debug!(error = %e, "invocation failed");
                InvocationResponse::internal_error(e.to_string())
            }
        }
    }

    /// Drive the pipeline to an outcome.
    pub async fn run(&self, payload: &[u8]) -> TaggingResult<Outcome> {
        let mut stage = Stage::Validate;
        loop {
            stage = match stage {
                Stage::Validate => Stage::Classify(event::validate(payload)?),
                Stage::Classify(notification) => classify(notification),
                Stage::LoadParams(target) => {
                    let params = self.params.load()?;
                    Stage::Connect(target, params)
                }
                Stage::Connect(target, params) => {
                    let session = self
                        .sessions
                        .ensure_session(&params)
                        .await
                        .map_err(TaggingError::Connect)?;
                    Stage::Fetch(target, session)
                }
                Stage::Fetch(target, session) => {
                    let hardware = fetch_hardware(&session, &target.vm).await?;
                    match tier::next_tier(target.category, &hardware) {
                        Some(tier) => Stage::Resolve(target, session, tier),
                        None => Stage::Done(Outcome::NotActionable),
                    }
                }
                Stage::Resolve(target, session, tier) => {
                    match resolve_tag(&session, target.tag_category, &tier)
                        .await
                        .map_err(TaggingError::Resolve)?
                    {
                        Some(tag) => Stage::Apply(target, session, tag),
                        None => Stage::Done(Outcome::NoMatchingTag {
                            vm: target.vm,
                            category: target.tag_category,
                            tier,
                        }),
                    }
                }
                Stage::Apply(target, session, tag) => {
                    session
                        .directory()
                        .attach_tag(&tag.tag_id, &target.vm)
                        .await
                        .map_err(TaggingError::Apply)?;
                    Stage::Done(Outcome::Tagged {
                        vm: target.vm,
                        tag_id: tag.tag_id,
                        category_id: tag.category_id,
                    })
                }
                Stage::Done(outcome) => return Ok(outcome),
            };
        }
    }
}

fn classify(notification: AlarmNotification) -> Stage {
    if !event::is_actionable(&notification) {
        return Stage::Done(Outcome::NotActionable);
    }

    let category = event::classify(&notification);
    match category.tag_category() {
        Some(tag_category) => Stage::LoadParams(Target {
            vm: notification.vm,
            category,
            tag_category,
        }),
        None => Stage::Done(Outcome::NotActionable),
    }
}
