use aws_sdk_sesv2::types::{Body, Content, Destination, EmailContent, Message};
use pawto_core::notification::EmailMessage;
use thiserror::Error;

use super::block_on;

#[derive(Debug, Error)]
#[error("failed to send email to '{to}': {message}")]
pub struct MailError {
    pub to: String,
    pub message: String,
}

pub trait Mailer {
    fn send(&self, message: &EmailMessage) -> Result<(), MailError>;
}

pub struct SesMailer {
    sender: String,
    ses_client: aws_sdk_sesv2::Client,
}

impl SesMailer {
    pub fn new(sender: impl Into<String>, ses_client: aws_sdk_sesv2::Client) -> Self {
        Self {
            sender: sender.into(),
            ses_client,
        }
    }
}

impl Mailer for SesMailer {
    fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        let mail_error = |detail: String| MailError {
            to: message.to.clone(),
            message: detail,
        };
        let utf8 = |data: &str| {
            Content::builder()
                .data(data)
                .charset("UTF-8")
                .build()
                .map_err(|error| mail_error(error.to_string()))
        };

        let content = EmailContent::builder()
            .simple(
                Message::builder()
                    .subject(utf8(&message.subject)?)
                    .body(Body::builder().text(utf8(&message.body)?).build())
                    .build(),
            )
            .build();
        let request = self
            .ses_client
            .send_email()
            .from_email_address(&self.sender)
            .destination(Destination::builder().to_addresses(&message.to).build())
            .content(content);

        block_on(request.send())
            .map(|_| ())
            .map_err(|error| mail_error(error.to_string()))?;
        tracing::info!(to = %message.to, subject = %message.subject, "email sent");
        Ok(())
    }
}
