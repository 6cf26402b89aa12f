use std::{
    collections::BTreeMap,
    fmt::{self, Display},
    ops::{Deref, DerefMut},
    sync::LazyLock,
};

use regex::Regex;
use serde::{Deserialize, Serialize};

#[allow(clippy::expect_used, reason = "The pattern is a literal")]
static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)^(([^<>()\[\]\.,;:\s@"]+(\.[^<>()\[\]\.,;:\s@"]+)*)|(".+"))@(([^<>()\[\]\.,;:\s@"]+\.)+[^<>()\[\]\.,;:\s@"]{2,})$"#,
    )
    .expect("email pattern compiles")
});

/// Check an address against the accepted mailbox grammar
///
/// Either a dotted local part or a quoted local part, followed by a dotted
/// domain whose last label has at least two characters.
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    !email.trim().is_empty() && EMAIL.is_match(email)
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl Address {
    #[must_use]
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        is_valid_email(&self.email)
    }
}

/// Renders `Name <email>` when a name is present, the bare address otherwise
impl Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => write!(f, "{name} <{}>", self.email),
            _ => f.write_str(&self.email),
        }
    }
}

/// A receiving address along with its personalisation values
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub address: Address,
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

impl Recipient {
    #[must_use]
    pub fn new(address: Address) -> Self {
        Self {
            address,
            variables: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    /// Variables used when personalising content for this recipient.
    ///
    /// `name` and `email` are filled in from the address unless the caller
    /// already supplied them.
    #[must_use]
    pub fn personalisation(&self) -> BTreeMap<String, String> {
        let mut vars = self.variables.clone();
        if let Some(name) = &self.address.name {
            vars.entry("name".to_string()).or_insert_with(|| name.clone());
        }
        vars.insert("email".to_string(), self.address.email.clone());
        vars
    }
}

impl From<Address> for Recipient {
    fn from(value: Address) -> Self {
        Self::new(value)
    }
}

impl Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.address, f)
    }
}

impl Deref for Recipient {
    type Target = Address;

    fn deref(&self) -> &Self::Target {
        &self.address
    }
}

impl DerefMut for Recipient {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.address
    }
}
