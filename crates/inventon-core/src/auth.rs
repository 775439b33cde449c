use std::collections::HashSet;

use inventon_types::api::Claims;

/// OR of three independent signals. A missing role member set is not an
/// error, it only leaves the other two signals.
pub fn is_privileged(
    user_id: i64,
    designated_role_members: Option<&HashSet<i64>>,
    blanket_permission: bool,
    is_resource_owner: bool,
) -> bool {
    let in_role = designated_role_members.is_some_and(|members| members.contains(&user_id));
    in_role || blanket_permission || is_resource_owner
}

/// Caller identity as asserted by the platform front end.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i64,
    pub role_ids: Vec<i64>,
    pub administrator: bool,
    pub owner: bool,
}

impl From<&Claims> for Actor {
    fn from(claims: &Claims) -> Self {
        Self {
            user_id: claims.sub,
            role_ids: claims.roles.clone(),
            administrator: claims.administrator,
            owner: claims.owner,
        }
    }
}

/// Decides who may run administrative operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthorizationGate {
    admin_role_id: Option<i64>,
}

impl AuthorizationGate {
    pub fn new(admin_role_id: Option<i64>) -> Self {
        Self { admin_role_id }
    }

    pub fn is_privileged(&self, actor: &Actor) -> bool {
        is_privileged(
            actor.user_id,
            self.role_members(actor).as_ref(),
            actor.administrator,
            actor.owner,
        )
    }

    /// The configured role's members as far as this actor can tell: itself
    /// when it holds the role, nobody otherwise. `None` when no role is configured.
    fn role_members(&self, actor: &Actor) -> Option<HashSet<i64>> {
        self.admin_role_id.map(|role| {
            actor
                .role_ids
                .contains(&role)
                .then_some(actor.user_id)
                .into_iter()
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_signal_grants() {
        let members: HashSet<i64> = [1, 2].into_iter().collect();
        assert!(is_privileged(1, Some(&members), false, false));
        assert!(is_privileged(9, Some(&members), true, false));
        assert!(is_privileged(9, Some(&members), false, true));
        assert!(!is_privileged(9, Some(&members), false, false));
    }

    #[test]
    fn missing_role_degrades_to_other_signals() {
        assert!(!is_privileged(1, None, false, false));
        assert!(is_privileged(1, None, true, false));
        assert!(is_privileged(1, None, false, true));
    }

    #[test]
    fn gate_checks_configured_role() {
        let gate = AuthorizationGate::new(Some(77));
        let member = Actor {
            user_id: 5,
            role_ids: vec![10, 77],
            ..Default::default()
        };
        let outsider = Actor {
            user_id: 6,
            role_ids: vec![10],
            ..Default::default()
        };
        assert!(gate.is_privileged(&member));
        assert!(!gate.is_privileged(&outsider));
        assert!(gate.is_privileged(&Actor {
            administrator: true,
            ..outsider.clone()
        }));
    }

    #[test]
    fn unconfigured_role_never_matches() {
        let gate = AuthorizationGate::new(None);
        let actor = Actor {
            user_id: 5,
            role_ids: vec![77],
            ..Default::default()
        };
        assert!(!gate.is_privileged(&actor));
        assert!(gate.is_privileged(&Actor { owner: true, ..actor }));
    }

    #[test]
    fn gate_agrees_with_signal_function() {
        for admin_role_id in [None, Some(77)] {
            let gate = AuthorizationGate::new(admin_role_id);
            for roles in [vec![], vec![77]] {
                for (administrator, owner) in [(false, false), (true, false), (false, true)] {
                    let actor = Actor {
                        user_id: 5,
                        role_ids: roles.clone(),
                        administrator,
                        owner,
                    };
                    let members = gate.role_members(&actor);
                    assert_eq!(
                        gate.is_privileged(&actor),
                        is_privileged(5, members.as_ref(), administrator, owner)
                    );
                }
            }
        }
        let holder = Actor {
            user_id: 5,
            role_ids: vec![77],
            ..Default::default()
        };
        assert_eq!(
            AuthorizationGate::new(Some(77)).role_members(&holder),
            Some(HashSet::from([5]))
        );
        assert_eq!(AuthorizationGate::new(None).role_members(&holder), None);
    }

    #[test]
    fn actor_from_claims() {
        let claims = Claims {
            sub: 42,
            username: "kim".into(),
            display_name: None,
            roles: vec![3],
            administrator: false,
            owner: true,
            exp: 0,
        };
        let actor = Actor::from(&claims);
        assert_eq!(actor.user_id, 42);
        assert_eq!(actor.role_ids, vec![3]);
        assert!(actor.owner);
    }
}
