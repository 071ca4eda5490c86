use std::collections::HashSet;

use crate::error::Error;

/// An authenticated caller that passed the access policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub login: String,
}

/// Decides whether a signed-in login may publish, list or remove content.
///
/// With an empty allow-list every signed-in login is accepted. Logins compare
/// case-insensitively, as GitHub handles do.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    allow_list: HashSet<String>,
}

impl AccessPolicy {
    pub fn new<I, S>(logins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allow_list = logins
            .into_iter()
            .map(|l| l.as_ref().trim().to_lowercase())
            .filter(|l| !l.is_empty())
            .collect();
        Self { allow_list }
    }

    pub fn is_allowed(&self, login: &str) -> bool {
        let login = login.trim();
        !login.is_empty()
            && (self.allow_list.is_empty() || self.allow_list.contains(&login.to_lowercase()))
    }

    /// Admit `login`, or explain why not.
    pub fn authorize(&self, login: Option<&str>) -> Result<Principal, Error> {
        let login = login
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .ok_or(Error::Unauthenticated)?;
        if !self.is_allowed(login) {
            tracing::info!(login, "principal rejected by allow-list");
            return Err(Error::Forbidden(format!(
                "User '{login}' is not permitted to modify the catalog"
            )));
        }
        Ok(Principal {
            login: login.to_string(),
        })
    }
}
