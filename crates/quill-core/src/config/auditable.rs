//! Per-model auditing options.
//!
//! Each audited entity type is configured once, at registration time:
//!
//! ```yaml
//! models:
//!   posts:
//!     exclude_columns: [cached_slug]
//!     user_class_name: User
//!     user_method: current_user
//!   imports:
//!     exclude_columns: checksum
//!     user_class_name: false
//! ```

use serde::{Deserialize, Serialize};

/// Actor source used when the option is left out.
pub const DEFAULT_USER_CLASS: &str = "User";

/// Actor accessor used when the option is left out.
pub const DEFAULT_USER_METHOD: &str = "current_user";

/// Auditing options for one entity type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditableOptions {
    /// Columns added to the default exclusion set.
    #[serde(default)]
    pub exclude_columns: ColumnList,

    /// Name of the actor source, or `false` to disable user resolution.
    #[serde(default)]
    pub user_class_name: UserClass,

    /// Name of the accessor returning the current actor.
    #[serde(default = "default_user_method")]
    pub user_method: String,

    /// Whether destroying a record clears the link on its audit entries.
    #[serde(default = "default_true")]
    pub nullify_on_destroy: bool,
}

impl Default for AuditableOptions {
    fn default() -> Self {
        Self {
            exclude_columns: ColumnList::default(),
            user_class_name: UserClass::default(),
            user_method: default_user_method(),
            nullify_on_destroy: true,
        }
    }
}

impl AuditableOptions {
    /// Add columns to the exclusion list.
    pub fn exclude<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list = self.exclude_columns.into_vec();
        list.extend(columns.into_iter().map(Into::into));
        self.exclude_columns = ColumnList::Many(list);
        self
    }

    /// Resolve actors through the given source name.
    pub fn user_class(mut self, name: impl Into<String>) -> Self {
        self.user_class_name = UserClass::Named(name.into());
        self
    }

    /// Turn user resolution off.
    pub fn without_user(mut self) -> Self {
        self.user_class_name = UserClass::Disabled;
        self
    }

    /// Use a different accessor on the actor source.
    pub fn user_method(mut self, method: impl Into<String>) -> Self {
        self.user_method = method.into();
        self
    }

    /// Keep audit links when a record is destroyed.
    pub fn keep_links_on_destroy(mut self) -> Self {
        self.nullify_on_destroy = false;
        self
    }
}

/// One column name or a list of them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ColumnList {
    /// A single column.
    One(String),
    /// Several columns.
    Many(Vec<String>),
}

impl Default for ColumnList {
    fn default() -> Self {
        ColumnList::Many(Vec::new())
    }
}

impl ColumnList {
    /// Borrow the column names.
    pub fn as_slice(&self) -> &[String] {
        match self {
            ColumnList::One(column) => std::slice::from_ref(column),
            ColumnList::Many(columns) => columns,
        }
    }

    /// Take the column names.
    pub fn into_vec(self) -> Vec<String> {
        match self {
            ColumnList::One(column) => vec![column],
            ColumnList::Many(columns) => columns,
        }
    }
}

/// The actor source setting: a name, or disabled.
///
/// Accepts a string or `false` in configuration files. `true` selects the
/// default source; an empty string disables resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "UserClassRepr", into = "UserClassRepr")]
pub enum UserClass {
    /// No user is recorded on audit entries.
    Disabled,
    /// Resolve the actor through the named source.
    Named(String),
}

impl Default for UserClass {
    fn default() -> Self {
        UserClass::Named(DEFAULT_USER_CLASS.to_string())
    }
}

impl UserClass {
    /// The configured source name, if resolution is enabled.
    pub fn name(&self) -> Option<&str> {
        match self {
            UserClass::Disabled => None,
            UserClass::Named(name) => Some(name),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum UserClassRepr {
    Flag(bool),
    Name(String),
}

impl TryFrom<UserClassRepr> for UserClass {
    type Error = String;

    fn try_from(value: UserClassRepr) -> Result<Self, Self::Error> {
        Ok(match value {
            UserClassRepr::Flag(false) => UserClass::Disabled,
            UserClassRepr::Flag(true) => UserClass::default(),
            UserClassRepr::Name(name) if name.trim().is_empty() => UserClass::Disabled,
            UserClassRepr::Name(name) => UserClass::Named(name),
        })
    }
}

impl From<UserClass> for UserClassRepr {
    fn from(value: UserClass) -> Self {
        match value {
            UserClass::Disabled => UserClassRepr::Flag(false),
            UserClass::Named(name) => UserClassRepr::Name(name),
        }
    }
}

fn default_user_method() -> String {
    DEFAULT_USER_METHOD.to_string()
}

fn default_true() -> bool {
    true
}
