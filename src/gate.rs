//! Role-based access gate consulted before every user operation.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::auth::Principal;
use crate::error::ApiError;
use crate::models::{Role, UnknownRole};
use crate::repository::RepositoryState;

/// Operation
///
/// The five operations the gate can be asked about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operation {
    List,
    Get,
    Create,
    Update,
    Delete,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::List,
        Operation::Get,
        Operation::Create,
        Operation::Update,
        Operation::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::List => "list",
            Operation::Get => "get",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| PolicyError::UnknownOperation(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("unknown operation {0:?} in access policy")]
    UnknownOperation(String),
    #[error("malformed access policy entry {0:?}, expected <operation>=<role>")]
    MalformedEntry(String),
    #[error(transparent)]
    UnknownRole(#[from] UnknownRole),
}

/// AccessPolicy
///
/// Per-operation required role. An operation without a rule is open to every caller and
/// costs no store lookup.
///
/// The default restricts `list` and `get` to role `user` and leaves the mutations open.
/// Integrators that want mutations gated (or reads opened) change it through
/// `ACCESS_POLICY`; see [`AccessPolicy::parse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPolicy {
    rules: HashMap<Operation, Role>,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::open()
            .restrict(Operation::List, Role::User)
            .restrict(Operation::Get, Role::User)
    }
}

impl AccessPolicy {
    /// A policy with no rules at all.
    pub fn open() -> Self {
        Self {
            rules: HashMap::new(),
        }
    }

    pub fn restrict(mut self, op: Operation, role: Role) -> Self {
        self.rules.insert(op, role);
        self
    }

    pub fn unrestrict(mut self, op: Operation) -> Self {
        self.rules.remove(&op);
        self
    }

    pub fn required_role(&self, op: Operation) -> Option<Role> {
        self.rules.get(&op).copied()
    }

    /// parse
    ///
    /// Applies a comma-separated list of `<operation>=<role>` overrides on top of the default
    /// policy. The role `any` removes the rule for that operation. Blank input yields the
    /// default.
    ///
    /// `"delete=admin,get=any"` keeps `list=user`, opens `get`, and restricts `delete` to admins.
    pub fn parse(spec: &str) -> Result<Self, PolicyError> {
        let mut policy = Self::default();
        for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (op, role) = entry
                .split_once('=')
                .ok_or_else(|| PolicyError::MalformedEntry(entry.to_string()))?;
            let op: Operation = op.trim().parse()?;
            policy = match role.trim() {
                "any" => policy.unrestrict(op),
                role => policy.restrict(op, role.parse()?),
            };
        }
        Ok(policy)
    }
}

/// CallerContext
///
/// The immutable, request-scoped value passed from the handler through the resolver, the gate
/// and the service. It carries the raw path id exactly as received and the caller identity
/// attached by the `Caller` extractor; nothing else about the request reaches the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerContext {
    requested_id: Option<String>,
    principal: Principal,
}

impl CallerContext {
    /// Context for collection operations (`list`, `create`).
    pub fn new(principal: Principal) -> Self {
        Self {
            requested_id: None,
            principal,
        }
    }

    /// Context for operations addressed at `/users/{id}`.
    pub fn for_id(principal: Principal, raw_id: impl Into<String>) -> Self {
        Self {
            requested_id: Some(raw_id.into()),
            principal,
        }
    }

    pub fn requested_id(&self) -> Option<&str> {
        self.requested_id.as_deref()
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(&'static str),
}

impl Decision {
    pub const FORBIDDEN: Decision = Decision::Deny("forbidden");

    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// Short-circuits the pipeline on denial.
    pub fn into_result(self) -> Result<(), ApiError> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(_) => Err(ApiError::Forbidden),
        }
    }
}

/// AccessGate
///
/// Decides whether a caller may run an operation. The gate never trusts the path id: the
/// caller is whoever the `Principal` says. When the principal is only an identifier, the
/// role is read from the store, and any failure to read it denies.
#[derive(Clone)]
pub struct AccessGate {
    policy: AccessPolicy,
    repo: RepositoryState,
}

impl AccessGate {
    pub fn new(policy: AccessPolicy, repo: RepositoryState) -> Self {
        Self { policy, repo }
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    pub async fn authorize(&self, ctx: &CallerContext, op: Operation) -> Decision {
        let Some(required) = self.policy.required_role(op) else {
            return Decision::Allow;
        };

        let role = match ctx.principal() {
            Principal::Anonymous => None,
            Principal::Claimed { role } => Some(*role),
            Principal::Identified { id } => match self.repo.find(*id).await {
                Ok(Some(user)) => Some(user.role),
                Ok(None) => {
                    tracing::debug!(caller = id, "caller record not found");
                    None
                }
                Err(e) => {
                    tracing::warn!(caller = id, error = %e, "caller role lookup failed");
                    None
                }
            },
        };

        if role == Some(required) {
            Decision::Allow
        } else {
            tracing::info!(
                operation = %op,
                required = %required,
                actual = ?role,
                "access denied"
            );
            Decision::FORBIDDEN
        }
    }
}
