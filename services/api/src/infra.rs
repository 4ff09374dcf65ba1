use lor_review::config::{AppConfig, ConfigError};
use lor_review::review::{
    BranchMatcher, FsArtifactStore, NotificationDispatcher, OutboundMessage, RepositoryError,
    ReviewController, SmtpDispatcher, SqliteApplicantRepository, TemplateCatalog, TransportError,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

pub(crate) type Controller = ReviewController<SqliteApplicantRepository, Mailer, FsArtifactStore>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Outbound mail for the binary: real SMTP, or log-only when running dry.
#[derive(Debug)]
pub(crate) enum Mailer {
    Smtp(SmtpDispatcher),
    DryRun,
}

impl Mailer {
    pub(crate) fn from_config(config: &AppConfig, dry_run: bool) -> Result<Self, ConfigError> {
        if dry_run {
            info!("dry run: emails will be logged, not sent");
            return Ok(Self::DryRun);
        }
        SmtpDispatcher::new(&config.mail).map(Self::Smtp)
    }

    pub(crate) fn delivery(&self) -> Delivery {
        match self {
            Mailer::Smtp(_) => Delivery::Sent,
            Mailer::DryRun => Delivery::Logged,
        }
    }
}

/// What became of a message the mailer accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    Sent,
    Logged,
}

impl Delivery {
    pub(crate) fn describe(self, recipient: &str) -> String {
        match self {
            Delivery::Sent => format!("sent to {recipient}"),
            Delivery::Logged => format!("logged for {recipient}, not delivered (dry run)"),
        }
    }
}

impl NotificationDispatcher for Mailer {
    fn send(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        match self {
            Mailer::Smtp(smtp) => smtp.send(message),
            Mailer::DryRun => {
                info!(
                    recipient = %message.recipient,
                    subject = %message.subject,
                    attachment = ?message.attachment,
                    "dry run: email not sent"
                );
                Ok(())
            }
        }
    }
}

pub(crate) fn open_repository(
    config: &AppConfig,
) -> Result<SqliteApplicantRepository, RepositoryError> {
    SqliteApplicantRepository::open(&config.storage.database_path)
}

pub(crate) fn build_controller(
    config: &AppConfig,
    repository: Arc<SqliteApplicantRepository>,
    mailer: Mailer,
) -> Controller {
    let storage = &config.storage;
    ReviewController::new(
        repository,
        Arc::new(mailer),
        Arc::new(FsArtifactStore::new(&storage.output_root)),
        BranchMatcher::standard(&config.matcher),
        TemplateCatalog::new(
            &storage.higher_studies_template,
            &storage.professional_template,
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn message() -> OutboundMessage {
        OutboundMessage {
            recipient: "alice@example.edu".to_string(),
            subject: "Recommendation letter".to_string(),
            body: "Please find your letter attached.".to_string(),
            attachment: Some(PathBuf::from("letters/Comp Sci/Alice Rao_LOR.txt")),
        }
    }

    #[test]
    fn dry_run_mailer_accepts_messages_without_delivering_them() {
        let mailer = Mailer::DryRun;
        assert!(mailer.send(&message()).is_ok());
        assert_eq!(mailer.delivery(), Delivery::Logged);
    }

    #[test]
    fn logged_delivery_never_reads_as_sent() {
        let text = Delivery::Logged.describe("alice@example.edu");
        assert!(text.contains("alice@example.edu"));
        assert!(text.contains("dry run"));
        assert!(!text.contains("sent to"));

        assert_eq!(
            Delivery::Sent.describe("alice@example.edu"),
            "sent to alice@example.edu"
        );
    }
}
