//! Packaged built-in roles and templates.

use chrono::Utc;
use promptlib_compose::race_content;
use promptlib_primitives::{Role, Template};

use crate::StoreResult;

const DEFAULT_ROLES: &str = include_str!("../defaults/roles.json");
const DEFAULT_TEMPLATES: &str = include_str!("../defaults/templates.json");

/// Returns the packaged roles, flagged built-in and stamped with the current time.
///
/// # Errors
///
/// Returns a serialization error if the packaged document is malformed.
pub fn default_roles() -> StoreResult<Vec<Role>> {
    let now = Utc::now();
    let mut roles: Vec<Role> = serde_json::from_str(DEFAULT_ROLES)?;
    for role in &mut roles {
        role.is_default = true;
        role.created_at = now;
        role.updated_at = now;
    }
    Ok(roles)
}

/// Returns the packaged templates with rendered content.
///
/// # Errors
///
/// Returns a serialization error if the packaged document is malformed.
pub fn default_templates() -> StoreResult<Vec<Template>> {
    let now = Utc::now();
    let mut templates: Vec<Template> = serde_json::from_str(DEFAULT_TEMPLATES)?;
    for template in &mut templates {
        template.normalize_legacy();
        template.content = race_content(template);
        template.created_at = now;
        template.updated_at = now;
    }
    Ok(templates)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packaged_roles_parse() {
        let roles = default_roles().unwrap();
        let ids: Vec<_> = roles.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["quality-analyst", "automation-expert", "code-developer"]);
        assert!(roles.iter().all(|r| r.is_default));
    }

    #[test]
    fn packaged_templates_reference_packaged_roles() {
        let roles = default_roles().unwrap();
        let templates = default_templates().unwrap();
        assert_eq!(templates.len(), 5);
        for template in &templates {
            assert!(roles.iter().any(|r| r.id == template.role), "{}", template.name);
            assert!(template.content.starts_with("Role:\n"));
            assert_eq!(template.created_by, "system");
        }
        let bdd = templates
            .iter()
            .find(|t| t.name == "Generate BDD Scenarios")
            .unwrap();
        assert!(!bdd.show_programming_language);
    }
}
