use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use lettre::address::AddressError;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::{Credentials, DEFAULT_MECHANISMS};
use lettre::transport::smtp::client::{AsyncSmtpConnection, TlsParameters};
use lettre::transport::smtp::extension::ClientId;
use lettre::{Address, Message};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Invalid address: {0}")]
    Address(#[from] AddressError),

    #[error("Failed to build message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("Transport error: {0}")]
    Other(String),
}

/// SMTP 配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailSettings {
    pub server: String,
    pub port: u16,
    pub sender_name: String,
    pub sender_email: String,
    pub username: String,
    pub password: String,
    /// true 使用隐式 TLS，false 使用 STARTTLS
    pub use_ssl: bool,
    /// use_ssl 为 false 时是否要求 STARTTLS；关闭后明文发送，仅用于本机中继
    pub starttls: bool,
    pub timeout_secs: u64,
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            server: String::new(),
            port: 587,
            sender_name: "Host Resource Monitor".to_string(),
            sender_email: String::new(),
            username: String::new(),
            password: String::new(),
            use_ssl: false,
            starttls: true,
            timeout_secs: 30,
        }
    }
}

impl MailSettings {
    /// 用于打印，密码被遮盖
    pub fn redacted(&self) -> Self {
        let mut settings = self.clone();
        if !settings.password.is_empty() {
            settings.password = "******".to_string();
        }
        settings
    }
}

/// 一封待投递的邮件（单个收件人）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub recipient: String,
    pub subject: String,
    pub html_body: String,
}

/// 邮件传输
///
/// 每次调用都是一次完整的 连接 -> 认证 -> 发送 -> 断开，
/// 任何一步失败都作为本次尝试的失败返回。
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn deliver(&self, mail: &OutgoingMail) -> Result<(), TransportError>;
}

/// 基于 lettre 的 SMTP 传输
pub struct SmtpMailTransport {
    settings: MailSettings,
}

impl SmtpMailTransport {
    pub fn new(settings: MailSettings) -> Self {
        Self { settings }
    }

    fn build_message(&self, mail: &OutgoingMail) -> Result<Message, TransportError> {
        let sender_name = match self.settings.sender_name.trim() {
            "" => None,
            name => Some(name.to_string()),
        };
        let from = Mailbox::new(sender_name, self.settings.sender_email.parse::<Address>()?);
        let to: Mailbox = mail.recipient.parse()?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(mail.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(mail.html_body.clone())?;

        Ok(message)
    }

    /// 建立连接并完成 EHLO，按配置使用隐式 TLS 或 STARTTLS
    async fn connect(&self) -> Result<AsyncSmtpConnection, TransportError> {
        let hello = ClientId::default();
        let timeout = Some(Duration::from_secs(self.settings.timeout_secs));
        let server = (self.settings.server.as_str(), self.settings.port);

        if self.settings.use_ssl {
            let tls = TlsParameters::new(self.settings.server.clone())?;
            let conn =
                AsyncSmtpConnection::connect_tokio1(server, timeout, &hello, Some(tls), None)
                    .await?;
            return Ok(conn);
        }

        let mut conn =
            AsyncSmtpConnection::connect_tokio1(server, timeout, &hello, None, None).await?;
        if self.settings.starttls {
            let tls = TlsParameters::new(self.settings.server.clone())?;
            conn.starttls(tls, &hello).await?;
        }
        Ok(conn)
    }

    async fn authenticate_and_send(
        &self,
        conn: &mut AsyncSmtpConnection,
        message: &Message,
    ) -> Result<(), TransportError> {
        if !self.settings.username.is_empty() {
            let credentials = Credentials::new(
                self.settings.username.clone(),
                self.settings.password.clone(),
            );
            conn.auth(DEFAULT_MECHANISMS, &credentials).await?;
        }

        conn.send(message.envelope(), &message.formatted()).await?;
        Ok(())
    }
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    async fn deliver(&self, mail: &OutgoingMail) -> Result<(), TransportError> {
        let message = self.build_message(mail)?;

        let mut conn = self.connect().await?;
        if let Err(e) = self.authenticate_and_send(&mut conn, &message).await {
            conn.abort().await;
            return Err(e);
        }

        // QUIT 失败同样算本次尝试失败
        conn.quit().await?;
        Ok(())
    }
}
