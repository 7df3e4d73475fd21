//! Mailboxes read from contact cells and channel definitions.

use crate::{MailError, Result};
use lettre::message::Mailbox;
use std::fmt;
use std::str::FromStr;

/// A parsed mailbox: the bare address plus an optional display name.
///
/// Cells may hold either `ana@example.com` or `Ana Lima <ana@example.com>`;
/// surrounding whitespace is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    pub email: String,
    pub name: Option<String>,
}

impl Address {
    /// Parse a cell value into a mailbox.
    pub fn parse(cell: &str) -> Result<Self> {
        let cell = cell.trim();
        if cell.is_empty() {
            return Err(MailError::InvalidAddress("empty address".to_string()));
        }
        let mailbox = Mailbox::from_str(cell)
            .map_err(|err| MailError::InvalidAddress(format!("{cell}: {err}")))?;
        Ok(mailbox.into())
    }

    pub(crate) fn to_mailbox(&self) -> Result<Mailbox> {
        let email: lettre::Address = self.email.parse()?;
        Ok(Mailbox::new(self.name.clone(), email))
    }
}

impl From<Mailbox> for Address {
    fn from(mailbox: Mailbox) -> Self {
        Self {
            email: mailbox.email.to_string(),
            name: mailbox.name.filter(|name| !name.trim().is_empty()),
        }
    }
}

impl FromStr for Address {
    type Err = MailError;

    fn from_str(cell: &str) -> Result<Self> {
        Self::parse(cell)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name} <{}>", self.email),
            None => f.write_str(&self.email),
        }
    }
}
