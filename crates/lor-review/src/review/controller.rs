use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::artifact::{ArtifactError, ArtifactStore};
use super::branch::{BranchMatch, BranchMatcher};
use super::domain::{ApplicantRecord, ProfileUpdate, Requirement, Username};
use super::letter::{LetterComposer, LetterFields, TemplateCatalog, TemplateError};
use super::notify::{NotificationDispatcher, OutboundMessage, TransportError};
use super::repository::{ApplicantRepository, RepositoryError};

/// Reviewer action on one applicant, addressed by username rather than by the
/// row's position in any listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ReviewCommand {
    Approve {
        username: Username,
    },
    Reject {
        username: Username,
    },
    Delete {
        username: Username,
    },
    SubmitDetails {
        username: Username,
        #[serde(default)]
        details: ProfileUpdate,
    },
}

impl ReviewCommand {
    pub fn username(&self) -> &Username {
        match self {
            Self::Approve { username }
            | Self::Reject { username }
            | Self::Delete { username }
            | Self::SubmitDetails { username, .. } => username,
        }
    }

    pub fn action(&self) -> ReviewAction {
        match self {
            Self::Approve { .. } => ReviewAction::Approve,
            Self::Reject { .. } => ReviewAction::Reject,
            Self::Delete { .. } => ReviewAction::Delete,
            Self::SubmitDetails { .. } => ReviewAction::SubmitDetails,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewAction {
    Approve,
    Reject,
    Delete,
    SubmitDetails,
}

impl ReviewAction {
    pub fn label(self) -> &'static str {
        match self {
            Self::Approve => "approval",
            Self::Reject => "rejection",
            Self::Delete => "deletion",
            Self::SubmitDetails => "details submission",
        }
    }
}

/// Pipeline stages, in the order an approval runs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Lookup,
    Validate,
    ResolveBranch,
    Compose,
    Persist,
    Update,
    Remove,
    Dispatch,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Self::Lookup => "applicant lookup",
            Self::Validate => "validation",
            Self::ResolveBranch => "branch matching",
            Self::Compose => "letter composition",
            Self::Persist => "letter storage",
            Self::Update => "profile update",
            Self::Remove => "record removal",
            Self::Dispatch => "email delivery",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("requirement must be either 'HigherStudies' or 'Professional' (got '{0}')")]
    InvalidRequirement(String),
    #[error("{0} is required before a letter can be generated")]
    MissingField(&'static str),
}

/// Failure taxonomy surfaced to reviewers.
#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("applicant '{0}' not found")]
    NotFound(Username),
    #[error(transparent)]
    Persistence(RepositoryError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl From<RepositoryError> for ReviewError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::NotFound(username) => Self::NotFound(username),
            other => Self::Persistence(other),
        }
    }
}

/// Action failure with enough context for an operator to reconcile partial
/// work: which stage failed, which stages already took effect, and the letter
/// written before the failure, if any. Nothing is rolled back.
#[derive(Debug)]
pub struct StageError {
    pub action: ReviewAction,
    pub username: Username,
    pub stage: Stage,
    pub completed: Vec<Stage>,
    pub letter_path: Option<PathBuf>,
    pub source: ReviewError,
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} for '{}' failed during {}: {}",
            self.action.label(),
            self.username,
            self.stage.label(),
            self.source
        )?;
        if let Some(path) = &self.letter_path {
            write!(
                f,
                "; the letter was already saved to {} but was not emailed",
                path.display()
            )?;
        }
        Ok(())
    }
}

impl std::error::Error for StageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApprovalReport {
    pub username: Username,
    pub requirement: Requirement,
    pub branch: BranchMatch,
    pub letter_path: PathBuf,
    pub recipient: String,
    pub signatory: Option<String>,
    pub stages: Vec<Stage>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmissionOutcome {
    Complete {
        username: Username,
    },
    Incomplete {
        username: Username,
        missing: Vec<&'static str>,
        notified: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReviewOutcome {
    Approved(ApprovalReport),
    Rejected { username: Username, notified: String },
    Deleted { username: Username, removed: bool },
    DetailsSubmitted(SubmissionOutcome),
}

struct Progress<'a> {
    action: ReviewAction,
    username: &'a Username,
    completed: Vec<Stage>,
    letter_path: Option<PathBuf>,
}

impl<'a> Progress<'a> {
    fn new(action: ReviewAction, username: &'a Username) -> Self {
        Self {
            action,
            username,
            completed: Vec::new(),
            letter_path: None,
        }
    }

    fn run<T, E>(&mut self, stage: Stage, result: Result<T, E>) -> Result<T, StageError>
    where
        E: Into<ReviewError>,
    {
        match result {
            Ok(value) => {
                self.completed.push(stage);
                Ok(value)
            }
            Err(err) => Err(self.fail(stage, err.into())),
        }
    }

    fn fail(&self, stage: Stage, source: ReviewError) -> StageError {
        warn!(
            action = self.action.label(),
            username = %self.username,
            stage = stage.label(),
            completed = ?self.completed,
            error = %source,
            "review action failed"
        );
        StageError {
            action: self.action,
            username: self.username.clone(),
            stage,
            completed: self.completed.clone(),
            letter_path: self.letter_path.clone(),
            source,
        }
    }
}

struct ApprovalInput<'r> {
    requirement: Requirement,
    full_name: &'r str,
    branch: &'r str,
}

fn validate_for_approval(
    record: &ApplicantRecord,
) -> Result<ApprovalInput<'_>, ValidationError> {
    let raw = record.requirement.as_deref().unwrap_or_default();
    let requirement = Requirement::parse(raw)
        .ok_or_else(|| ValidationError::InvalidRequirement(raw.to_string()))?;

    Ok(ApprovalInput {
        requirement,
        full_name: required("full_name", &record.full_name)?,
        branch: required("branch", &record.branch)?,
    })
}

fn required<'r>(name: &'static str, field: &'r Option<String>) -> Result<&'r str, ValidationError> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .ok_or(ValidationError::MissingField(name))
}

/// Stateless orchestrator: every call reads what it needs from the repository
/// and runs to completion before returning.
pub struct ReviewController<R, D, S> {
    repository: Arc<R>,
    dispatcher: Arc<D>,
    artifacts: Arc<S>,
    matcher: BranchMatcher,
    templates: TemplateCatalog,
    composer: LetterComposer,
}

impl<R, D, S> ReviewController<R, D, S>
where
    R: ApplicantRepository + 'static,
    D: NotificationDispatcher + 'static,
    S: ArtifactStore + 'static,
{
    pub fn new(
        repository: Arc<R>,
        dispatcher: Arc<D>,
        artifacts: Arc<S>,
        matcher: BranchMatcher,
        templates: TemplateCatalog,
    ) -> Self {
        Self {
            repository,
            dispatcher,
            artifacts,
            matcher,
            templates,
            composer: LetterComposer,
        }
    }

    pub fn matcher(&self) -> &BranchMatcher {
        &self.matcher
    }

    pub fn applicants(&self) -> Result<Vec<ApplicantRecord>, ReviewError> {
        Ok(self.repository.list_all()?)
    }

    pub fn applicant(&self, username: &Username) -> Result<ApplicantRecord, ReviewError> {
        Ok(self.repository.get_by_username(username)?)
    }

    pub fn dispatch(&self, command: ReviewCommand) -> Result<ReviewOutcome, StageError> {
        debug!(
            action = command.action().label(),
            username = %command.username(),
            "dispatching review command"
        );
        match command {
            ReviewCommand::Approve { username } => {
                self.approve(&username).map(ReviewOutcome::Approved)
            }
            ReviewCommand::Reject { username } => {
                let notified = self.reject(&username)?;
                Ok(ReviewOutcome::Rejected { username, notified })
            }
            ReviewCommand::Delete { username } => {
                let removed = self.delete(&username)?;
                Ok(ReviewOutcome::Deleted { username, removed })
            }
            ReviewCommand::SubmitDetails { username, details } => self
                .submit_details(&username, details)
                .map(ReviewOutcome::DetailsSubmitted),
        }
    }

    /// Generate, store, and email the recommendation letter. Stages after a
    /// failure do not run; stages before it keep their effects.
    pub fn approve(&self, username: &Username) -> Result<ApprovalReport, StageError> {
        let mut progress = Progress::new(ReviewAction::Approve, username);

        let record = progress.run(Stage::Lookup, self.repository.get_by_username(username))?;
        let input = progress.run(Stage::Validate, validate_for_approval(&record))?;
        let branch = self.matcher.match_branch(input.branch);
        progress.completed.push(Stage::ResolveBranch);
        if !branch.accepted {
            warn!(
                username = %username,
                branch = input.branch,
                score = branch.score,
                "branch below threshold, using fallback"
            );
        }

        let (body, extension, signatory) =
            progress.run(Stage::Compose, self.compose(&record, input.requirement))?;
        let letter_path = progress.run(
            Stage::Persist,
            self.artifacts.save(
                &branch.canonical,
                input.full_name,
                &body,
                extension.as_deref(),
            ),
        )?;
        progress.letter_path = Some(letter_path.clone());

        let message = OutboundMessage::recommendation(&record.email, &letter_path);
        progress.run(Stage::Dispatch, self.dispatcher.send(&message))?;

        info!(
            username = %username,
            branch = %branch.canonical,
            path = %letter_path.display(),
            "recommendation letter generated and sent"
        );

        Ok(ApprovalReport {
            username: username.clone(),
            requirement: input.requirement,
            branch,
            letter_path,
            recipient: record.email.clone(),
            signatory,
            stages: progress.completed,
            completed_at: Utc::now(),
        })
    }

    /// Email the rejection notice. The record stays in the active view.
    pub fn reject(&self, username: &Username) -> Result<String, StageError> {
        let mut progress = Progress::new(ReviewAction::Reject, username);
        let record = progress.run(Stage::Lookup, self.repository.get_by_username(username))?;
        progress.run(
            Stage::Dispatch,
            self.dispatcher.send(&OutboundMessage::rejection(&record.email)),
        )?;
        info!(username = %username, "application rejected");
        Ok(record.email)
    }

    pub fn delete(&self, username: &Username) -> Result<bool, StageError> {
        let mut progress = Progress::new(ReviewAction::Delete, username);
        let removed = progress.run(Stage::Remove, self.repository.delete(username))?;
        info!(username = %username, removed, "applicant deleted");
        Ok(removed)
    }

    /// Store the applicant's details. Incomplete submissions keep whatever was
    /// supplied and trigger a single reminder email; it is not retried.
    pub fn submit_details(
        &self,
        username: &Username,
        details: ProfileUpdate,
    ) -> Result<SubmissionOutcome, StageError> {
        let mut progress = Progress::new(ReviewAction::SubmitDetails, username);
        let details = details.normalized();

        if let Some(complete) = details.complete() {
            progress.run(
                Stage::Update,
                self.repository.update_full(username, &complete),
            )?;
            info!(username = %username, "applicant details saved");
            return Ok(SubmissionOutcome::Complete {
                username: username.clone(),
            });
        }

        let record = progress.run(Stage::Lookup, self.repository.get_by_username(username))?;
        progress.run(
            Stage::Update,
            self.repository.update_partial(username, &details),
        )?;
        let notice = OutboundMessage::incomplete_details(&record.email, username.as_str());
        progress.run(Stage::Dispatch, self.dispatcher.send(&notice))?;

        let missing = details.missing_fields();
        info!(username = %username, missing = ?missing, "incomplete details, reminder sent");
        Ok(SubmissionOutcome::Incomplete {
            username: username.clone(),
            missing,
            notified: record.email,
        })
    }

    fn compose(
        &self,
        record: &ApplicantRecord,
        requirement: Requirement,
    ) -> Result<(String, Option<String>, Option<String>), ReviewError> {
        let template = self.templates.load(requirement)?;
        let signatory = self.repository.admin_username()?;
        if signatory.is_none() {
            warn!(username = %record.username, "no admin row found, letter has no signatory");
        }
        let fields = LetterFields::from_record(record, signatory.clone());
        let body = self.composer.compose(&template, &fields);
        Ok((body, template.extension, signatory))
    }
}
