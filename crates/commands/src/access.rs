use herald_common::types::AccessPolicy;

use crate::command::Principal;

/// Result of the capability check for a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Allowed,
    /// Logged, never answered: replying would reveal the bot is listening.
    Denied(AccessDenied),
}

/// Reason a command was denied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDenied {
    EmptyAllowlist,
    NotOnAllowlist,
}

impl std::fmt::Display for AccessDenied {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyAllowlist => write!(f, "allowlist is empty"),
            Self::NotOnAllowlist => write!(f, "principal not on allowlist"),
        }
    }
}

/// Static allow-list lookup.
#[derive(Debug, Clone, Default)]
pub struct AccessControl {
    policy: AccessPolicy,
    allowlist: Vec<String>,
}

impl AccessControl {
    pub fn new(policy: AccessPolicy, allowlist: Vec<String>) -> Self {
        Self { policy, allowlist }
    }

    /// Admit everyone.
    pub fn open() -> Self {
        Self::new(AccessPolicy::Open, Vec::new())
    }

    /// Check whether `principal` may issue commands.
    ///
    /// The principal matches when its id or its username matches an entry.
    pub fn authorize(&self, principal: &Principal) -> Access {
        match self.policy {
            AccessPolicy::Open => Access::Allowed,
            AccessPolicy::Allowlist => {
                // An explicit allowlist policy with no entries means "deny
                // everyone", not "allow everyone".
                if self.allowlist.is_empty() {
                    return Access::Denied(AccessDenied::EmptyAllowlist);
                }
                let by_id = is_allowed(&principal.id, &self.allowlist);
                let by_username = principal
                    .username
                    .as_deref()
                    .is_some_and(|u| is_allowed(u.trim_start_matches('@'), &self.allowlist));
                if by_id || by_username {
                    Access::Allowed
                } else {
                    Access::Denied(AccessDenied::NotOnAllowlist)
                }
            },
        }
    }
}

/// Case-insensitive match of `peer` against allow-list entries. Entries may
/// use `*` as a wildcard and a leading `@` on usernames.
fn is_allowed(peer: &str, allowlist: &[String]) -> bool {
    let peer_lower = peer.to_lowercase();
    allowlist.iter().any(|pattern| {
        let pat = pattern.trim().trim_start_matches('@').to_lowercase();
        if pat.contains('*') {
            glob_match(&pat, &peer_lower)
        } else {
            pat == peer_lower
        }
    })
}

/// `*` matches any run of characters, including none.
fn glob_match(pattern: &str, text: &str) -> bool {
    let mut segments = pattern.split('*');
    let first = segments.next().unwrap_or_default();
    let Some(mut rest) = text.strip_prefix(first) else {
        return false;
    };
    let segments: Vec<&str> = segments.collect();
    let Some((last, middle)) = segments.split_last() else {
        return rest.is_empty();
    };
    for segment in middle {
        match rest.find(segment) {
            Some(idx) => rest = &rest[idx + segment.len()..],
            None => return false,
        }
    }
    rest.ends_with(last)
}
