use async_trait::async_trait;
use chrono::{DateTime, Utc};
use farm_core::error::AppError;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials, Message,
    SmtpTransport, Transport,
};
use std::sync::Mutex;
use std::time::Duration;

#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send_invitation_email(
        &self,
        to_email: &str,
        farm_name: &str,
        invite_url: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError>;
}

/// SMTP-backed provider.
#[derive(Clone)]
pub struct SmtpEmail {
    mailer: SmtpTransport,
    from_email: String,
}

impl SmtpEmail {
    pub fn new(config: &crate::config::SmtpConfig) -> Result<Self, AppError> {
        let creds = Credentials::new(config.user.clone(), config.password.clone());

        let mailer = SmtpTransport::relay(&config.host)
            .map_err(|e| AppError::InternalError(anyhow::anyhow!(e.to_string())))?
            .credentials(creds)
            .port(587)
            .timeout(Some(Duration::from_secs(10)))
            .build();

        tracing::info!(host = %config.host, "Email service initialized");

        Ok(Self {
            mailer,
            from_email: config.from_email.clone(),
        })
    }
}

#[async_trait]
impl EmailProvider for SmtpEmail {
    async fn send_invitation_email(
        &self,
        to_email: &str,
        farm_name: &str,
        invite_url: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let subject = format!("You have been invited to join {}", farm_name);
        let body = format!(
            "You have been invited to join the farm \"{}\".\n\n\
             Accept the invitation here: {}\n\n\
             This invitation expires on {}.",
            farm_name,
            invite_url,
            expires_at.to_rfc3339()
        );

        let email = Message::builder()
            .from(
                self.from_email
                    .parse()
                    .map_err(|e: lettre::address::AddressError| AppError::InternalError(e.into()))?,
            )
            .to(to_email
                .parse()
                .map_err(|e: lettre::address::AddressError| AppError::InternalError(e.into()))?)
            .subject(subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| AppError::InternalError(e.into()))?;

        // SmtpTransport is blocking; keep it off the async runtime.
        let mailer = self.mailer.clone();
        let result = tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| AppError::InternalError(e.into()))?;

        match result {
            Ok(_) => {
                tracing::info!(to = %to_email, subject = %subject, "Invitation email sent");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, to = %to_email, "Failed to send invitation email");
                Err(AppError::EmailError(e.to_string()))
            }
        }
    }
}

/// Recorded invitation email, for assertions in tests.
#[derive(Debug, Clone)]
pub struct SentInvitation {
    pub to_email: String,
    pub farm_name: String,
    pub invite_url: String,
    pub expires_at: DateTime<Utc>,
}

/// Recording provider for tests and local development.
#[derive(Default)]
pub struct MockEmailService {
    sent: Mutex<Vec<SentInvitation>>,
}

impl MockEmailService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentInvitation> {
        self.sent.lock().expect("mock email lock poisoned").clone()
    }
}

#[async_trait]
impl EmailProvider for MockEmailService {
    async fn send_invitation_email(
        &self,
        to_email: &str,
        farm_name: &str,
        invite_url: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        tracing::debug!(to = %to_email, farm = %farm_name, "Mock invitation email");
        self.sent
            .lock()
            .expect("mock email lock poisoned")
            .push(SentInvitation {
                to_email: to_email.to_string(),
                farm_name: farm_name.to_string(),
                invite_url: invite_url.to_string(),
                expires_at,
            });
        Ok(())
    }
}
