pub mod email;
pub mod message;
pub mod notifier;
pub mod transport;

pub use email::EmailNotifier;
pub use message::{parse_recipients, NotificationRequest};
pub use notifier::{DeliveryReport, Notifier, RecipientOutcome, RetryPolicy};
pub use transport::{MailSettings, MailTransport, OutgoingMail, SmtpMailTransport, TransportError};
