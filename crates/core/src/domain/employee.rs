use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::chain::ApprovalRole;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EmployeeId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrgUnitId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    pub name: String,
    pub org_unit_id: OrgUnitId,
    pub supervisor_id: Option<EmployeeId>,
}

/// Who holds each non-supervisor role for one organizational unit.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub org_unit_id: Option<OrgUnitId>,
    assignees: BTreeMap<ApprovalRole, EmployeeId>,
}

impl RoleAssignment {
    pub fn new(org_unit_id: OrgUnitId) -> Self {
        Self { org_unit_id: Some(org_unit_id), assignees: BTreeMap::new() }
    }

    /// Supervisor assignments are ignored; that role is resolved per employee.
    pub fn with(mut self, role: ApprovalRole, employee_id: EmployeeId) -> Self {
        self.assign(role, employee_id);
        self
    }

    pub fn assign(&mut self, role: ApprovalRole, employee_id: EmployeeId) {
        if role.is_per_employee() {
            return;
        }
        self.assignees.insert(role, employee_id);
    }

    pub fn assignee(&self, role: ApprovalRole) -> Option<&EmployeeId> {
        self.assignees.get(&role)
    }

    pub fn assignees(&self) -> impl Iterator<Item = (ApprovalRole, &EmployeeId)> {
        self.assignees.iter().map(|(role, employee_id)| (*role, employee_id))
    }
}

/// The identity behind an approve/reject click. `employee_id` is the employee
/// record linked to the login, absent for accounts with no employee profile.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActingUser {
    pub user_id: String,
    pub employee_id: Option<EmployeeId>,
}

impl ActingUser {
    pub fn employee(user_id: impl Into<String>, employee_id: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), employee_id: Some(EmployeeId(employee_id.into())) }
    }

    pub fn unlinked(user_id: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), employee_id: None }
    }

    pub fn label(&self) -> &str {
        self.employee_id.as_ref().map(|id| id.0.as_str()).unwrap_or(self.user_id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use crate::chain::ApprovalRole;

    use super::{ActingUser, EmployeeId, OrgUnitId, RoleAssignment};

    #[test]
    fn supervisor_cannot_be_assigned_per_unit() {
        let assignment = RoleAssignment::new(OrgUnitId("acme".to_string()))
            .with(ApprovalRole::Supervisor, EmployeeId("E-9".to_string()))
            .with(ApprovalRole::HrManager, EmployeeId("E-4".to_string()));

        assert_eq!(assignment.assignee(ApprovalRole::Supervisor), None);
        assert_eq!(
            assignment.assignee(ApprovalRole::HrManager),
            Some(&EmployeeId("E-4".to_string()))
        );
        assert_eq!(assignment.assignees().count(), 1);
    }

    #[test]
    fn acting_user_label_prefers_employee_id() {
        assert_eq!(ActingUser::employee("u-1", "E-1").label(), "E-1");
        assert_eq!(ActingUser::unlinked("u-2").label(), "u-2");
    }
}
