//! Sender address records (RFC 5322 §3.4).

/// A parsed email address split into the parts directory naming needs.
///
/// # Examples
/// - `"Juan García <juan@ejemplo.com>"` → `display_name = "Juan García"`, `mailbox = "juan"`, `host = "ejemplo.com"`
/// - `"user@example.com"` → `display_name = ""`, `mailbox = "user"`, `host = "example.com"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    /// Human-readable display name (may be empty).
    pub display_name: String,
    /// Local part before the `@`.
    pub mailbox: String,
    /// Domain after the `@` (may be empty for malformed addresses).
    pub host: String,
}

impl Address {
    /// Build an address from a display name and a bare `user@domain` spec.
    ///
    /// The split happens at the last `@`, so quoted local parts containing
    /// `@` keep their full mailbox.
    pub fn new(display_name: impl Into<String>, addr_spec: &str) -> Self {
        let addr_spec = addr_spec.trim();
        let (mailbox, host) = match addr_spec.rfind('@') {
            Some(at) => (&addr_spec[..at], &addr_spec[at + 1..]),
            None => (addr_spec, ""),
        };
        Self {
            display_name: display_name.into().trim().to_string(),
            mailbox: mailbox.to_string(),
            host: host.to_lowercase(),
        }
    }

    /// The bare `mailbox@host` form.
    pub fn addr_spec(&self) -> String {
        if self.host.is_empty() {
            self.mailbox.clone()
        } else {
            format!("{}@{}", self.mailbox, self.host)
        }
    }

    /// Format for display: `"Display Name <mailbox@host>"` or just `"mailbox@host"`.
    pub fn display(&self) -> String {
        if self.display_name.is_empty() {
            self.addr_spec()
        } else {
            format!("{} <{}>", self.display_name, self.addr_spec())
        }
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}
