use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use serde_json::Value;
use tempfile::TempDir;

use crate::config::MatcherConfig;
use crate::review::artifact::FsArtifactStore;
use crate::review::branch::BranchMatcher;
use crate::review::controller::ReviewController;
use crate::review::domain::{ApplicantRecord, ProfileDetails, ProfileUpdate, Username};
use crate::review::letter::TemplateCatalog;
use crate::review::notify::{NotificationDispatcher, OutboundMessage, TransportError};
use crate::review::repository::{ApplicantRepository, RepositoryError};

pub(super) const HIGHER_STUDIES_TEMPLATE: &str =
    "{full_name} ({branch}, {specialization}): {he_or_she}/{his_or_her}/{him_or_her}. \
     Contact {phone}. Signed {admin_username}";
pub(super) const PROFESSIONAL_TEMPLATE: &str = "Employ {full_name}; {he_or_she} is ready.";

pub(super) fn alice() -> ApplicantRecord {
    let mut record = ApplicantRecord::registered("alice23", "alice@example.edu", "s3cret");
    record.full_name = Some("Alice Rao".to_string());
    record.branch = Some("Comp Sci & Engg".to_string());
    record.specialization = Some("Machine Learning".to_string());
    record.requirement = Some("HigherStudies".to_string());
    record.gender = Some("Female".to_string());
    record.phone = Some("555-0101".to_string());
    record
}

pub(super) fn bob() -> ApplicantRecord {
    let mut record = ApplicantRecord::registered("bob", "bob@example.edu", "hunter2");
    record.gender = Some("Male".to_string());
    record.requirement = Some("Professional".to_string());
    record
}

pub(super) fn username(value: &str) -> Username {
    Username::new(value)
}

/// Working directory holding the templates and the letter output root.
pub(super) struct Workspace {
    pub(super) dir: TempDir,
}

impl Workspace {
    pub(super) fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let templates = dir.path().join("templates");
        fs::create_dir_all(&templates).expect("template dir");
        fs::write(templates.join("LOR.txt"), HIGHER_STUDIES_TEMPLATE).expect("write template");
        fs::write(templates.join("LOR1.txt"), PROFESSIONAL_TEMPLATE).expect("write template");
        Self { dir }
    }

    pub(super) fn template(&self, name: &str) -> PathBuf {
        self.dir.path().join("templates").join(name)
    }

    pub(super) fn output_root(&self) -> PathBuf {
        self.dir.path().join("All_LORs")
    }

    pub(super) fn letter(&self, branch: &str, file_name: &str) -> PathBuf {
        self.output_root().join(branch).join(file_name)
    }

    pub(super) fn catalog(&self) -> TemplateCatalog {
        TemplateCatalog::new(self.template("LOR.txt"), self.template("LOR1.txt"))
    }

    pub(super) fn controller<R, D>(
        &self,
        repository: Arc<R>,
        dispatcher: Arc<D>,
    ) -> ReviewController<R, D, FsArtifactStore>
    where
        R: ApplicantRepository + 'static,
        D: NotificationDispatcher + 'static,
    {
        ReviewController::new(
            repository,
            dispatcher,
            Arc::new(FsArtifactStore::new(self.output_root())),
            BranchMatcher::standard(&MatcherConfig::default()),
            self.catalog(),
        )
    }
}

pub(super) fn build_controller() -> (
    ReviewController<MemoryRepository, RecordingDispatcher, FsArtifactStore>,
    Arc<MemoryRepository>,
    Arc<RecordingDispatcher>,
    Workspace,
) {
    let workspace = Workspace::new();
    let repository = Arc::new(MemoryRepository::seeded(vec![alice(), bob()], Some("registrar")));
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let controller = workspace.controller(repository.clone(), dispatcher.clone());
    (controller, repository, dispatcher, workspace)
}

pub(super) fn file_count(root: &Path) -> usize {
    if !root.exists() {
        return 0;
    }
    fs::read_dir(root)
        .expect("read dir")
        .map(|entry| {
            let path = entry.expect("dir entry").path();
            if path.is_dir() {
                file_count(&path)
            } else {
                1
            }
        })
        .sum()
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    serde_json::from_slice(&bytes).expect("json body")
}

#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    records: Arc<Mutex<Vec<ApplicantRecord>>>,
    admin: Arc<Mutex<Option<String>>>,
}

impl MemoryRepository {
    pub(super) fn seeded(records: Vec<ApplicantRecord>, admin: Option<&str>) -> Self {
        Self {
            records: Arc::new(Mutex::new(records)),
            admin: Arc::new(Mutex::new(admin.map(str::to_string))),
        }
    }

    pub(super) fn snapshot(&self) -> Vec<ApplicantRecord> {
        self.records.lock().expect("repository mutex poisoned").clone()
    }

    pub(super) fn record(&self, username: &str) -> Option<ApplicantRecord> {
        self.snapshot()
            .into_iter()
            .find(|record| record.username.as_str() == username)
    }

    pub(super) fn set(&self, record: ApplicantRecord) {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        match guard.iter_mut().find(|stored| stored.username == record.username) {
            Some(stored) => *stored = record,
            None => guard.push(record),
        }
    }

    fn modify(
        &self,
        username: &Username,
        apply: impl FnOnce(&mut ApplicantRecord),
    ) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let record = guard
            .iter_mut()
            .find(|record| &record.username == username)
            .ok_or_else(|| RepositoryError::NotFound(username.clone()))?;
        apply(record);
        Ok(())
    }
}

impl ApplicantRepository for MemoryRepository {
    fn list_all(&self) -> Result<Vec<ApplicantRecord>, RepositoryError> {
        Ok(self.snapshot())
    }

    fn get_by_username(&self, username: &Username) -> Result<ApplicantRecord, RepositoryError> {
        self.record(username.as_str())
            .ok_or_else(|| RepositoryError::NotFound(username.clone()))
    }

    fn insert(&self, record: &ApplicantRecord) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.iter().any(|stored| stored.username == record.username) {
            return Err(RepositoryError::Conflict(record.username.clone()));
        }
        guard.push(record.clone());
        Ok(())
    }

    fn update_partial(
        &self,
        username: &Username,
        update: &ProfileUpdate,
    ) -> Result<(), RepositoryError> {
        self.modify(username, |record| {
            let merge = |stored: &mut Option<String>, value: &Option<String>| {
                if value.is_some() {
                    *stored = value.clone();
                }
            };
            merge(&mut record.full_name, &update.full_name);
            merge(&mut record.branch, &update.branch);
            merge(&mut record.specialization, &update.specialization);
            merge(&mut record.phone, &update.phone);
        })
    }

    fn update_full(
        &self,
        username: &Username,
        details: &ProfileDetails,
    ) -> Result<(), RepositoryError> {
        self.modify(username, |record| {
            record.full_name = Some(details.full_name.clone());
            record.branch = Some(details.branch.clone());
            record.specialization = Some(details.specialization.clone());
            record.phone = Some(details.phone.clone());
        })
    }

    fn delete(&self, username: &Username) -> Result<bool, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let before = guard.len();
        guard.retain(|record| &record.username != username);
        Ok(guard.len() != before)
    }

    fn ensure_columns(&self, _columns: &[&str]) -> Result<(), RepositoryError> {
        Ok(())
    }

    fn admin_username(&self) -> Result<Option<String>, RepositoryError> {
        Ok(self.admin.lock().expect("admin mutex poisoned").clone())
    }
}

pub(super) struct UnavailableRepository;

impl UnavailableRepository {
    fn error() -> RepositoryError {
        RepositoryError::Unavailable("database is locked".to_string())
    }
}

impl ApplicantRepository for UnavailableRepository {
    fn list_all(&self) -> Result<Vec<ApplicantRecord>, RepositoryError> {
        Err(Self::error())
    }

    fn get_by_username(&self, _username: &Username) -> Result<ApplicantRecord, RepositoryError> {
        Err(Self::error())
    }

    fn insert(&self, _record: &ApplicantRecord) -> Result<(), RepositoryError> {
        Err(Self::error())
    }

    fn update_partial(
        &self,
        _username: &Username,
        _update: &ProfileUpdate,
    ) -> Result<(), RepositoryError> {
        Err(Self::error())
    }

    fn update_full(
        &self,
        _username: &Username,
        _details: &ProfileDetails,
    ) -> Result<(), RepositoryError> {
        Err(Self::error())
    }

    fn delete(&self, _username: &Username) -> Result<bool, RepositoryError> {
        Err(Self::error())
    }

    fn ensure_columns(&self, _columns: &[&str]) -> Result<(), RepositoryError> {
        Err(Self::error())
    }

    fn admin_username(&self) -> Result<Option<String>, RepositoryError> {
        Err(Self::error())
    }
}

#[derive(Default, Clone)]
pub(super) struct RecordingDispatcher {
    sent: Arc<Mutex<Vec<OutboundMessage>>>,
}

impl RecordingDispatcher {
    pub(super) fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().expect("dispatcher mutex poisoned").clone()
    }
}

impl NotificationDispatcher for RecordingDispatcher {
    fn send(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        self.sent
            .lock()
            .expect("dispatcher mutex poisoned")
            .push(message.clone());
        Ok(())
    }
}

pub(super) struct FailingDispatcher;

impl NotificationDispatcher for FailingDispatcher {
    fn send(&self, _message: &OutboundMessage) -> Result<(), TransportError> {
        Err(TransportError::Authentication(
            "535 5.7.8 Username and Password not accepted".to_string(),
        ))
    }
}
