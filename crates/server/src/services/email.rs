//! Email notifications.
//!
//! Uses SMTP via lettre for delivery with Askama templates. Notifications are
//! fire-and-forget: the `notify_*` methods spawn the send and only log a
//! failure.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;
use tracing::warn;

use crate::config::EmailConfig;

const PROJECT_NAME: &str = "Dub";

/// HTML template for the welcome email.
#[derive(Template)]
#[template(path = "email/welcome.html")]
struct WelcomeEmailHtml<'a> {
    project: &'a str,
    username: &'a str,
    vbucks: u64,
    starter_item: &'a str,
}

/// Plain text template for the welcome email.
#[derive(Template)]
#[template(path = "email/welcome.txt")]
struct WelcomeEmailText<'a> {
    project: &'a str,
    username: &'a str,
    vbucks: u64,
    starter_item: &'a str,
}

/// HTML template for a purchase receipt.
#[derive(Template)]
#[template(path = "email/purchase.html")]
struct PurchaseEmailHtml<'a> {
    username: &'a str,
    item_name: &'a str,
    price: u64,
    balance: u64,
}

/// Plain text template for a purchase receipt.
#[derive(Template)]
#[template(path = "email/purchase.txt")]
struct PurchaseEmailText<'a> {
    username: &'a str,
    item_name: &'a str,
    price: u64,
    balance: u64,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// Welcome email contents.
#[derive(Debug, Clone)]
pub struct Welcome {
    pub to: String,
    pub username: String,
    pub vbucks: u64,
    pub starter_item: String,
}

/// Purchase receipt contents.
#[derive(Debug, Clone)]
pub struct Receipt {
    pub to: String,
    pub username: String,
    pub item_name: String,
    pub price: u64,
    pub balance: u64,
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
        })
    }

    /// Send the welcome email after registration.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_welcome(&self, welcome: &Welcome) -> Result<(), EmailError> {
        let (html, text) = render_welcome(welcome)?;
        let subject = format!("Welcome to {PROJECT_NAME}, {}!", welcome.username);
        self.send_multipart_email(&welcome.to, &subject, &text, &html)
            .await
    }

    /// Send a purchase receipt.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_receipt(&self, receipt: &Receipt) -> Result<(), EmailError> {
        let (html, text) = render_receipt(receipt)?;
        let subject = format!("Your {PROJECT_NAME} purchase: {}", receipt.item_name);
        self.send_multipart_email(&receipt.to, &subject, &text, &html)
            .await
    }

    /// Send the welcome email in the background.
    pub fn notify_welcome(&self, welcome: Welcome) {
        let service = self.clone();
        tokio::spawn(async move {
            if let Err(e) = service.send_welcome(&welcome).await {
                warn!(error = %e, to = %welcome.to, "Failed to send welcome email");
            }
        });
    }

    /// Send a purchase receipt in the background.
    pub fn notify_receipt(&self, receipt: Receipt) {
        let service = self.clone();
        tokio::spawn(async move {
            if let Err(e) = service.send_receipt(&receipt).await {
                warn!(error = %e, to = %receipt.to, "Failed to send purchase receipt");
            }
        });
    }

    /// Send a multipart email with both plain text and HTML versions.
    async fn send_multipart_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        self.mailer.send(email).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }
}

fn render_welcome(welcome: &Welcome) -> Result<(String, String), EmailError> {
    let html = WelcomeEmailHtml {
        project: PROJECT_NAME,
        username: &welcome.username,
        vbucks: welcome.vbucks,
        starter_item: &welcome.starter_item,
    }
    .render()?;
    let text = WelcomeEmailText {
        project: PROJECT_NAME,
        username: &welcome.username,
        vbucks: welcome.vbucks,
        starter_item: &welcome.starter_item,
    }
    .render()?;
    Ok((html, text))
}

fn render_receipt(receipt: &Receipt) -> Result<(String, String), EmailError> {
    let html = PurchaseEmailHtml {
        username: &receipt.username,
        item_name: &receipt.item_name,
        price: receipt.price,
        balance: receipt.balance,
    }
    .render()?;
    let text = PurchaseEmailText {
        username: &receipt.username,
        item_name: &receipt.item_name,
        price: receipt.price,
        balance: receipt.balance,
    }
    .render()?;
    Ok((html, text))
}
