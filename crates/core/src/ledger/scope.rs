//! Organizational scopes: who owns an account, and which slice of the log a
//! balance query covers.

use serde::{Deserialize, Serialize};
use safar_shared::types::{AgencyId, AreaAgencyId, BranchId, OrganizationId};

use super::error::LedgerError;
use super::types::AccountKind;

/// Owner of an account. An account belongs to at most one of organization,
/// branch or agency; `Unscoped` is the platform-level owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum AccountScope {
    /// Platform-level account.
    Unscoped,
    /// Organization account.
    Organization(OrganizationId),
    /// Branch account.
    Branch(BranchId),
    /// Agency account.
    Agency(AgencyId),
}

impl AccountScope {
    /// Builds a scope from the three nullable owner columns.
    ///
    /// # Errors
    ///
    /// Returns `InvalidScope` when more than one owner is set.
    pub fn from_parts(
        organization_id: Option<OrganizationId>,
        branch_id: Option<BranchId>,
        agency_id: Option<AgencyId>,
    ) -> Result<Self, LedgerError> {
        match (organization_id, branch_id, agency_id) {
            (None, None, None) => Ok(Self::Unscoped),
            (Some(org), None, None) => Ok(Self::Organization(org)),
            (None, Some(branch), None) => Ok(Self::Branch(branch)),
            (None, None, Some(agency)) => Ok(Self::Agency(agency)),
            _ => Err(LedgerError::InvalidScope(format!(
                "account scope must name at most one owner (organization={organization_id:?}, branch={branch_id:?}, agency={agency_id:?})"
            ))),
        }
    }

    /// Splits the scope into the three nullable owner columns.
    #[must_use]
    pub const fn parts(
        self,
    ) -> (Option<OrganizationId>, Option<BranchId>, Option<AgencyId>) {
        match self {
            Self::Unscoped => (None, None, None),
            Self::Organization(org) => (Some(org), None, None),
            Self::Branch(branch) => (None, Some(branch), None),
            Self::Agency(agency) => (None, None, Some(agency)),
        }
    }

    /// Default account name for this scope and kind, e.g. `"Organization 11 Cash"`.
    #[must_use]
    pub fn account_name(self, kind: AccountKind) -> String {
        match self {
            Self::Unscoped => format!("Platform {}", kind.label()),
            Self::Organization(org) => format!("Organization {org} {}", kind.label()),
            Self::Branch(branch) => format!("Branch {branch} {}", kind.label()),
            Self::Agency(agency) => format!("Agency {agency} {}", kind.label()),
        }
    }
}

impl std::fmt::Display for AccountScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unscoped => f.write_str("platform"),
            Self::Organization(org) => write!(f, "organization {org}"),
            Self::Branch(branch) => write!(f, "branch {branch}"),
            Self::Agency(agency) => write!(f, "agency {agency}"),
        }
    }
}

/// Entity kinds the pending-balance scanner iterates over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// An agency ("agent").
    Agent,
    /// An area agency ("area agent").
    AreaAgent,
    /// A branch.
    Branch,
    /// An organization.
    Organization,
}

impl EntityKind {
    /// Returns the code used on the command line and in reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::AreaAgent => "area-agent",
            Self::Branch => "branch",
            Self::Organization => "organization",
        }
    }

    /// Pairs the kind with a raw platform id.
    #[must_use]
    pub const fn entity(self, id: i64) -> EntityRef {
        match self {
            Self::Agent => EntityRef::Agency(AgencyId(id)),
            Self::AreaAgent => EntityRef::AreaAgency(AreaAgencyId(id)),
            Self::Branch => EntityRef::Branch(BranchId(id)),
            Self::Organization => EntityRef::Organization(OrganizationId(id)),
        }
    }
}

impl std::str::FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "agent" | "agency" => Ok(Self::Agent),
            "area-agent" | "area-agency" => Ok(Self::AreaAgent),
            "branch" => Ok(Self::Branch),
            "organization" | "org" => Ok(Self::Organization),
            _ => Err(format!("Unknown entity kind: {s}")),
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One concrete entity, each variant carrying its own id type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EntityRef {
    /// An agency.
    Agency(AgencyId),
    /// An area agency.
    AreaAgency(AreaAgencyId),
    /// A branch.
    Branch(BranchId),
    /// An organization.
    Organization(OrganizationId),
}

impl EntityRef {
    /// Kind of this entity.
    #[must_use]
    pub const fn kind(self) -> EntityKind {
        match self {
            Self::Agency(_) => EntityKind::Agent,
            Self::AreaAgency(_) => EntityKind::AreaAgent,
            Self::Branch(_) => EntityKind::Branch,
            Self::Organization(_) => EntityKind::Organization,
        }
    }

    /// Raw platform id.
    #[must_use]
    pub const fn raw_id(self) -> i64 {
        match self {
            Self::Agency(id) => id.0,
            Self::AreaAgency(id) => id.0,
            Self::Branch(id) => id.0,
            Self::Organization(id) => id.0,
        }
    }

    /// The balance filter that selects this entity's entries.
    #[must_use]
    pub const fn filter(self) -> ScopeFilter {
        match self {
            Self::Agency(id) => ScopeFilter::Agency(id),
            Self::AreaAgency(id) => ScopeFilter::AreaAgency(id),
            Self::Branch(id) => ScopeFilter::Branch(id),
            Self::Organization(id) => ScopeFilter::Organization(id),
        }
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind(), self.raw_id())
    }
}

/// Selects the entries (or lines) a balance query covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", content = "id", rename_all = "snake_case")]
pub enum ScopeFilter {
    /// Entries whose seller organization matches.
    Organization(OrganizationId),
    /// Entries referencing the branch.
    Branch(BranchId),
    /// Entries referencing the agency.
    Agency(AgencyId),
    /// Entries referencing the area agency.
    AreaAgency(AreaAgencyId),
    /// Inter-organization settlement between two organizations.
    OrganizationPair {
        /// The organization the result is read from.
        a: OrganizationId,
        /// The other organization.
        b: OrganizationId,
    },
}

impl ScopeFilter {
    /// Account owner for line-granularity queries.
    ///
    /// # Errors
    ///
    /// Area agencies and organization pairs own no accounts.
    pub fn account_scope(self) -> Result<AccountScope, LedgerError> {
        match self {
            Self::Organization(org) => Ok(AccountScope::Organization(org)),
            Self::Branch(branch) => Ok(AccountScope::Branch(branch)),
            Self::Agency(agency) => Ok(AccountScope::Agency(agency)),
            Self::AreaAgency(_) | Self::OrganizationPair { .. } => Err(LedgerError::InvalidScope(
                format!("{self} owns no accounts; line granularity is unavailable"),
            )),
        }
    }

    /// Validates the filter itself.
    ///
    /// # Errors
    ///
    /// Returns `InvalidScope` for a pair naming the same organization twice.
    pub fn validate(self) -> Result<Self, LedgerError> {
        match self {
            Self::OrganizationPair { a, b } if a == b => Err(LedgerError::InvalidScope(format!(
                "organization pair needs two distinct organizations, got {a} twice"
            ))),
            other => Ok(other),
        }
    }
}

impl std::fmt::Display for ScopeFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Organization(id) => write!(f, "organization {id}"),
            Self::Branch(id) => write!(f, "branch {id}"),
            Self::Agency(id) => write!(f, "agency {id}"),
            Self::AreaAgency(id) => write!(f, "area agency {id}"),
            Self::OrganizationPair { a, b } => write!(f, "organizations {a} and {b}"),
        }
    }
}

impl From<EntityRef> for ScopeFilter {
    fn from(entity: EntityRef) -> Self {
        entity.filter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::str::FromStr;

    #[test]
    fn test_scope_from_parts() {
        assert_eq!(
            AccountScope::from_parts(Some(OrganizationId(11)), None, None).unwrap(),
            AccountScope::Organization(OrganizationId(11))
        );
        assert_eq!(
            AccountScope::from_parts(None, None, None).unwrap(),
            AccountScope::Unscoped
        );
    }

    #[test]
    fn test_scope_rejects_two_owners() {
        let err = AccountScope::from_parts(Some(OrganizationId(1)), Some(BranchId(2)), None)
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_SCOPE");
    }

    #[test]
    fn test_scope_parts_round_trip() {
        let scope = AccountScope::Agency(AgencyId(40));
        let (org, branch, agency) = scope.parts();
        assert_eq!(AccountScope::from_parts(org, branch, agency).unwrap(), scope);
    }

    #[test]
    fn test_account_name() {
        let scope = AccountScope::Organization(OrganizationId(11));
        assert_eq!(scope.account_name(AccountKind::Cash), "Organization 11 Cash");
    }

    #[rstest]
    #[case("agent", EntityKind::Agent)]
    #[case("area_agent", EntityKind::AreaAgent)]
    #[case("Area-Agency", EntityKind::AreaAgent)]
    #[case("org", EntityKind::Organization)]
    #[case("branch", EntityKind::Branch)]
    fn test_entity_kind_from_str(#[case] input: &str, #[case] expected: EntityKind) {
        assert_eq!(EntityKind::from_str(input).unwrap(), expected);
    }

    #[test]
    fn test_entity_ref_filter() {
        let entity = EntityKind::AreaAgent.entity(9);
        assert_eq!(entity, EntityRef::AreaAgency(AreaAgencyId(9)));
        assert_eq!(entity.filter(), ScopeFilter::AreaAgency(AreaAgencyId(9)));
        assert_eq!(entity.to_string(), "area-agent 9");
    }

    #[test]
    fn test_line_granularity_needs_account_owner() {
        assert!(ScopeFilter::Branch(BranchId(3)).account_scope().is_ok());
        assert!(ScopeFilter::AreaAgency(AreaAgencyId(3)).account_scope().is_err());
        let pair = ScopeFilter::OrganizationPair {
            a: OrganizationId(11),
            b: OrganizationId(15),
        };
        assert!(pair.account_scope().is_err());
    }

    #[test]
    fn test_pair_needs_distinct_organizations() {
        let pair = ScopeFilter::OrganizationPair {
            a: OrganizationId(11),
            b: OrganizationId(11),
        };
        assert!(pair.validate().is_err());
    }
}
