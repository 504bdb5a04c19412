use std::time::Duration;

use chrono::Utc;
use lettre::address::Envelope;
use lettre::message::header::{ContentType, Header, HeaderName, HeaderValue, To};
use lettre::message::{Mailbox, Mailboxes};
use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::transport::smtp::client::{SmtpConnection, TlsParameters};
use lettre::transport::smtp::commands::{Data, Mail, Rcpt};
use lettre::transport::smtp::extension::ClientId;
use lettre::{Address, Message};
use log::{info, warn};

#[cfg(test)]
use mockall::automock;

use crate::config::SmtpSettings;
use crate::error::{Error, Result};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(60);

/// Per-recipient result of one send.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Delivery {
    pub accepted: usize,
    pub refused: Vec<(Address, String)>,
}

/// An open, not yet authenticated session with a mail relay.
#[cfg_attr(test, automock)]
pub trait MailRelay {
    fn authenticate(&mut self, username: &str, password: &str) -> Result<()>;

    /// Delivers `message` to the envelope recipients. A refused recipient is
    /// recorded in the returned [`Delivery`]; the send fails only when every
    /// recipient is refused.
    fn send(&mut self, envelope: &Envelope, message: &[u8]) -> Result<Delivery>;

    /// Ends the session. Must be safe to call after any failure.
    fn quit(&mut self);
}

#[cfg_attr(test, automock)]
pub trait Connect {
    fn connect(&self, server: &str, port: u16) -> Result<Box<dyn MailRelay>>;
}

/// Opens implicit-TLS SMTP connections.
#[derive(Debug, Default, Clone, Copy)]
pub struct SmtpConnector;

impl Connect for SmtpConnector {
    fn connect(&self, server: &str, port: u16) -> Result<Box<dyn MailRelay>> {
        let connection_err = |e: lettre::transport::smtp::Error| Error::Connection {
            server: format!("{}:{}", server, port),
            reason: e.to_string(),
        };

        let tls = TlsParameters::new(server.to_string()).map_err(connection_err)?;
        let conn = SmtpConnection::connect(
            (server, port),
            Some(CONNECT_TIMEOUT),
            &ClientId::default(),
            Some(&tls),
            None,
        )
        .map_err(connection_err)?;

        Ok(Box::new(SmtpRelay { conn }))
    }
}

struct SmtpRelay {
    conn: SmtpConnection,
}

impl MailRelay for SmtpRelay {
    fn authenticate(&mut self, username: &str, password: &str) -> Result<()> {
        let creds = Credentials::new(username.to_string(), password.to_string());
        self.conn
            .auth(&[Mechanism::Plain, Mechanism::Login], &creds)
            .map_err(|e| Error::Authentication(e.to_string()))?;
        Ok(())
    }

    fn send(&mut self, envelope: &Envelope, message: &[u8]) -> Result<Delivery> {
        let transport_err = |e: lettre::transport::smtp::Error| Error::Transport(e.to_string());

        self.conn
            .command(Mail::new(envelope.from().cloned(), vec![]))
            .map_err(transport_err)?;

        let mut delivery = Delivery::default();
        for to in envelope.to() {
            match self.conn.command(Rcpt::new(to.clone(), vec![])) {
                Ok(_) => delivery.accepted += 1,
                Err(e) => delivery.refused.push((to.clone(), e.to_string())),
            }
        }
        if delivery.accepted == 0 {
            return Err(Error::RecipientsRefused {
                count: delivery.refused.len(),
            });
        }

        self.conn.command(Data).map_err(transport_err)?;
        self.conn.message(message).map_err(transport_err)?;
        Ok(delivery)
    }

    fn quit(&mut self) {
        if let Err(e) = self.conn.quit() {
            warn!("QUIT failed, dropping connection: {}", e);
            self.conn.abort();
        }
    }
}

/// Owns a relay session for the length of one send and always ends it.
struct Session(Box<dyn MailRelay>);

impl Drop for Session {
    fn drop(&mut self) {
        self.0.quit();
    }
}

/// `List-Unsubscribe`, which lettre has no typed header for.
#[derive(Debug, Clone, PartialEq)]
pub struct ListUnsubscribe(String);

impl ListUnsubscribe {
    pub fn mailto(address: &Address) -> Self {
        Self(format!("<mailto:{}?subject=unsubscribe>", address))
    }
}

impl Header for ListUnsubscribe {
    fn name() -> HeaderName {
        HeaderName::new_from_ascii_str("List-Unsubscribe")
    }

    fn parse(s: &str) -> std::result::Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Self(s.to_string()))
    }

    fn display(&self) -> HeaderValue {
        HeaderValue::new(Self::name(), self.0.clone())
    }
}

fn parse_address(address: &str) -> Result<Address> {
    address.parse().map_err(|e: lettre::address::AddressError| Error::InvalidAddress {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

/// Turns raw mailing list lines into envelope addresses. Surrounding
/// whitespace is dropped; blank lines and lines that are not addresses are
/// skipped with a warning.
fn envelope_recipients(recipients: &[String]) -> Result<Vec<Address>> {
    let mut to = Vec::with_capacity(recipients.len());
    for line in recipients {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_address(line) {
            Ok(address) => to.push(address),
            Err(e) => warn!("skipping recipient: {}", e),
        }
    }

    if to.is_empty() {
        return Err(Error::NoRecipients);
    }
    Ok(to)
}

/// Builds the outgoing message. Recipients go only into the envelope; the
/// `To` header is left empty.
pub fn build_message(
    settings: &SmtpSettings,
    subject: &str,
    body: &str,
    recipients: &[String],
) -> Result<Message> {
    let sender = parse_address(&settings.username)?;
    let to = envelope_recipients(recipients)?;
    let envelope = Envelope::new(Some(sender.clone()), to)?;

    let display_name = Some(settings.display_name.clone()).filter(|n| !n.is_empty());
    let msg_id = format!(
        "<{}.{}@{}>",
        uuid::Uuid::new_v4(),
        Utc::now().timestamp(),
        sender.domain()
    );

    let message = Message::builder()
        .from(Mailbox::new(display_name, sender.clone()))
        .header(To::from(Mailboxes::new()))
        .subject(subject)
        .message_id(Some(msg_id))
        .header(ListUnsubscribe::mailto(&sender))
        .header(ContentType::TEXT_PLAIN)
        .envelope(envelope)
        .body(body.to_string())?;
    Ok(message)
}

/// Sends one message per call over a fresh connection. No retries.
pub struct Dispatcher {
    connector: Box<dyn Connect>,
}

impl Dispatcher {
    pub fn new(connector: Box<dyn Connect>) -> Self {
        Self { connector }
    }

    pub fn send(
        &self,
        settings: &SmtpSettings,
        subject: &str,
        body: &str,
        recipients: &[String],
    ) -> Result<Delivery> {
        info!("connecting to {}:{}", settings.server, settings.port);
        let mut session = Session(self.connector.connect(&settings.server, settings.port)?);

        session.0.authenticate(&settings.username, &settings.password)?;
        info!("logged in as {}", settings.username);

        let message = build_message(settings, subject, body, recipients)?;
        let delivery = session.0.send(message.envelope(), &message.formatted())?;

        for (address, reason) in &delivery.refused {
            warn!("{} refused: {}", address, reason);
        }
        info!(
            "sent \"{}\" to {} recipient(s), {} refused",
            subject,
            delivery.accepted,
            delivery.refused.len()
        );
        Ok(delivery)
    }
}
