use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use serde::Serialize;
use tracing::info;

use crate::config::{ConfigError, MailConfig, MailCredentials, SmtpSecurity};

pub const RECOMMENDATION_SUBJECT: &str = "Recommendation Letter";
pub const REJECTION_SUBJECT: &str = "Application Rejection";
pub const INCOMPLETE_SUBJECT: &str = "Incomplete Details";

/// One outbound email with at most one attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundMessage {
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub attachment: Option<PathBuf>,
}

impl OutboundMessage {
    pub fn recommendation(recipient: impl Into<String>, letter: impl Into<PathBuf>) -> Self {
        Self {
            recipient: recipient.into(),
            subject: RECOMMENDATION_SUBJECT.to_string(),
            body: "Please find the attached recommendation letter.".to_string(),
            attachment: Some(letter.into()),
        }
    }

    pub fn rejection(recipient: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            subject: REJECTION_SUBJECT.to_string(),
            body: "Dear Applicant,\n\nYour application has been rejected. \
                   If you have any questions, please contact the authority."
                .to_string(),
            attachment: None,
        }
    }

    pub fn incomplete_details(recipient: impl Into<String>, username: &str) -> Self {
        Self {
            recipient: recipient.into(),
            subject: INCOMPLETE_SUBJECT.to_string(),
            body: format!(
                "Dear {username}, you have not filled in all required details. \
                 Please fill in all fields."
            ),
            attachment: None,
        }
    }
}

/// Outbound email seam. Each call is a single synchronous attempt; callers get
/// the failure back immediately and nothing is queued or retried.
pub trait NotificationDispatcher: Send + Sync {
    fn send(&self, message: &OutboundMessage) -> Result<(), TransportError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("unable to reach mail server: {0}")]
    Connection(String),
    #[error("mail server rejected credentials: {0}")]
    Authentication(String),
    #[error("invalid message: {0}")]
    Message(String),
    #[error("unable to read attachment {}: {source}", path.display())]
    Attachment {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("mail server refused the message: {0}")]
    Send(String),
}

/// SMTP dispatcher opening one authenticated, encrypted session per message.
#[derive(Debug, Clone)]
pub struct SmtpDispatcher {
    host: String,
    port: u16,
    security: SmtpSecurity,
    credentials: MailCredentials,
}

impl SmtpDispatcher {
    pub fn new(config: &MailConfig) -> Result<Self, ConfigError> {
        let credentials = config.require_credentials()?.clone();
        Ok(Self {
            host: config.host.clone(),
            port: config.port,
            security: config.security,
            credentials,
        })
    }

    pub fn sender(&self) -> &str {
        &self.credentials.address
    }

    fn transport(&self) -> Result<SmtpTransport, TransportError> {
        let builder = match self.security {
            SmtpSecurity::StartTls => SmtpTransport::starttls_relay(&self.host),
            SmtpSecurity::ImplicitTls => SmtpTransport::relay(&self.host),
        }
        .map_err(|err| TransportError::Connection(err.to_string()))?;

        Ok(builder
            .port(self.port)
            .credentials(Credentials::new(
                self.credentials.address.clone(),
                self.credentials.password.clone(),
            ))
            .build())
    }

    fn build_message(&self, message: &OutboundMessage) -> Result<Message, TransportError> {
        let from: Mailbox = parse_mailbox(&self.credentials.address)?;
        let to: Mailbox = parse_mailbox(&message.recipient)?;
        let builder = Message::builder()
            .from(from)
            .to(to)
            .subject(message.subject.clone());

        let built = match &message.attachment {
            None => builder
                .header(ContentType::TEXT_PLAIN)
                .body(message.body.clone()),
            Some(path) => {
                let attachment = read_attachment(path)?;
                builder.multipart(
                    MultiPart::mixed()
                        .singlepart(SinglePart::plain(message.body.clone()))
                        .singlepart(attachment),
                )
            }
        };
        built.map_err(|err| TransportError::Message(err.to_string()))
    }
}

impl NotificationDispatcher for SmtpDispatcher {
    fn send(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        let email = self.build_message(message)?;
        let transport = self.transport()?;
        transport.send(&email).map_err(classify)?;
        info!(
            recipient = %message.recipient,
            subject = %message.subject,
            attachment = message.attachment.is_some(),
            "email sent"
        );
        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, TransportError> {
    address
        .trim()
        .parse::<Mailbox>()
        .map_err(|err| TransportError::Message(format!("'{address}': {err}")))
}

fn read_attachment(path: &Path) -> Result<SinglePart, TransportError> {
    let content = fs::read(path).map_err(|source| TransportError::Attachment {
        path: path.to_path_buf(),
        source,
    })?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "letter".to_string());
    let content_type = ContentType::parse(mime::APPLICATION_OCTET_STREAM.as_ref())
        .map_err(|err| TransportError::Message(err.to_string()))?;
    Ok(Attachment::new(filename).body(content, content_type))
}

fn classify(err: lettre::transport::smtp::Error) -> TransportError {
    let code = err.status().map(|code| code.to_string());
    match code.as_deref() {
        // 530/534/535: authentication required, mechanism too weak, bad credentials.
        Some(code) if code.starts_with("53") => TransportError::Authentication(err.to_string()),
        _ if err.is_permanent() || err.is_transient() => TransportError::Send(err.to_string()),
        _ => TransportError::Connection(err.to_string()),
    }
}
