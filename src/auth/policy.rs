use async_trait::async_trait;

use crate::auth::Role;
use crate::error::AppError;

/// Allow/deny oracle for `(subject, resource, action)`.
///
/// Implementations backed by a remote engine report outages as
/// `ServiceUnavailable`.
#[async_trait]
pub trait PolicyEngine: Send + Sync {
    async fn enforce(&self, subject: &str, resource: &str, action: &str) -> Result<bool, AppError>;
}

/// One rule: requests whose path starts with `prefix` and whose method matches
/// `action` (`*` for any) need at least `min_role`.
#[derive(Debug, Clone)]
pub struct PolicyRule {
    pub action: String,
    pub prefix: String,
    pub min_role: Role,
}

/// Built-in engine that decides by role rank.
///
/// The rule with the longest matching prefix wins; an exact action match beats
/// `*` at equal length. Paths without a rule need the `user` role. Subjects that
/// are not a known role are denied.
#[derive(Debug, Clone, Default)]
pub struct RolePolicy {
    rules: Vec<PolicyRule>,
}

impl RolePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule(mut self, action: &str, prefix: &str, min_role: Role) -> Self {
        self.rules.push(PolicyRule {
            action: action.to_uppercase(),
            prefix: prefix.to_string(),
            min_role,
        });
        self
    }

    /// Rules for the routes served by this crate.
    pub fn standard() -> Self {
        Self::new()
            .rule("*", "/api/users/", Role::Admin)
            .rule("GET", "/api/users/me", Role::User)
            .rule("PUT", "/api/users/{id}/role", Role::Super)
    }

    /// Minimum role required for `action` on `resource`.
    pub fn required_role(&self, resource: &str, action: &str) -> Role {
        self.rules
            .iter()
            .filter(|rule| rule.action == "*" || rule.action.eq_ignore_ascii_case(action))
            .filter(|rule| matches_prefix(&rule.prefix, resource))
            .max_by_key(|rule| (segment_len(&rule.prefix), rule.action != "*"))
            .map_or(Role::User, |rule| rule.min_role)
    }
}

#[async_trait]
impl PolicyEngine for RolePolicy {
    async fn enforce(&self, subject: &str, resource: &str, action: &str) -> Result<bool, AppError> {
        let role: Role = match subject.parse() {
            Ok(role) => role,
            Err(_) => return Ok(false),
        };
        Ok(role.has_role_or_higher(self.required_role(resource, action)))
    }
}

/// Segment-wise prefix match where a `{...}` segment matches any one segment.
fn matches_prefix(prefix: &str, path: &str) -> bool {
    let mut path_segments = path.split('/');
    for expected in prefix.split('/') {
        match path_segments.next() {
            Some(actual) if is_placeholder(expected) && !actual.is_empty() => {}
            Some(actual) if actual == expected => {}
            // Trailing slash in the rule: anything (or nothing) below it.
            _ if expected.is_empty() => {}
            _ => return false,
        }
    }
    true
}

fn is_placeholder(segment: &str) -> bool {
    segment.starts_with('{') && segment.ends_with('}')
}

fn segment_len(prefix: &str) -> usize {
    prefix.split('/').filter(|s| !s.is_empty()).count()
}
