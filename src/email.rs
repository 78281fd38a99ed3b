//! Transactional email delivery for invitation links.
//!
//! Sends through the Resend API when an API key is configured; without one,
//! sends are skipped and the caller decides what to do with the message.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AppConfig;

const RESEND_API_URL: &str = "https://api.resend.com/emails";

/// Outbound email calls time out after this long; no retries follow.
const EMAIL_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("email provider request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("email provider returned {status}: {message}")]
    Upstream { status: u16, message: String },
}

/// Whether a message actually went out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailOutcome {
    Sent,
    /// No API key configured; nothing was dispatched.
    Skipped,
}

#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<EmailOutcome, EmailError>;
}

/// Resend API request body.
#[derive(Debug, Serialize)]
struct ResendEmailRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: &'a str,
    text: &'a str,
    html: &'a str,
}

/// Resend API response.
#[derive(Debug, Deserialize)]
struct ResendEmailResponse {
    #[allow(dead_code)]
    id: String,
}

/// [`Mailer`] backed by the Resend API.
pub struct ResendMailer {
    api_key: Option<String>,
    from: String,
    client: Client,
}

impl ResendMailer {
    pub fn new(config: &AppConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(EMAIL_REQUEST_TIMEOUT).build()?;
        Ok(Self {
            api_key: config.resend_api_key.clone(),
            from: format!(
                "{} <{}>",
                config.email_from_name, config.email_from_address
            ),
            client,
        })
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, message: &EmailMessage) -> Result<EmailOutcome, EmailError> {
        let Some(api_key) = self.api_key.as_deref() else {
            tracing::warn!(to = %message.to, "no email API key configured, skipping send");
            return Ok(EmailOutcome::Skipped);
        };

        let request = ResendEmailRequest {
            from: &self.from,
            to: vec![&message.to],
            subject: &message.subject,
            text: &message.text,
            html: &message.html,
        };

        let response = self
            .client
            .post(RESEND_API_URL)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message_body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %message_body, "email provider rejected send");
            return Err(EmailError::Upstream {
                status: status.as_u16(),
                message: message_body,
            });
        }

        let _result: ResendEmailResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse email provider response");
            e
        })?;
        tracing::info!(to = %message.to, "invitation email sent");
        Ok(EmailOutcome::Sent)
    }
}

/// Compose the invitation message embedding a provider-generated link.
pub fn invitation_email(to: &str, org_slug: &str, link: &str) -> EmailMessage {
    let subject = format!("You're invited to join {} on Divisadero", org_slug);
    let text = format!(
        "You've been invited to join {} on Divisadero.\n\nAccept the invitation here:\n\n{}\n\nIf you weren't expecting this, you can ignore this email.",
        org_slug, link
    );
    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"></head>
<body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
<h2 style="color: #333;">You're invited to join {org}</h2>
<p>You've been invited to join <strong>{org}</strong> on Divisadero.</p>
<div style="margin: 24px 0; text-align: center;">
<a href="{link}" style="background: #333; color: #fff; padding: 12px 24px; border-radius: 8px; text-decoration: none; display: inline-block;">Accept invitation</a>
</div>
<p style="color: #666;">Or paste this link into your browser:<br><a href="{link}">{link}</a></p>
<hr style="border: none; border-top: 1px solid #eee; margin: 30px 0;">
<p style="color: #999; font-size: 12px;">If you weren't expecting this, you can ignore this email.</p>
</body>
</html>"#,
        org = org_slug,
        link = link,
    );

    EmailMessage {
        to: to.to_string(),
        subject,
        text,
        html,
    }
}
