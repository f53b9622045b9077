//! Directory preview results

use super::DirectoryConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Attribute map of one directory entry, as returned by a search
pub type EntryAttributes = HashMap<String, Vec<String>>;

/// Outcome of a successful directory preview
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResult {
    pub user_count: usize,
    pub group_count: usize,
    pub sample_users: Vec<DirectoryUser>,
    pub sample_groups: Vec<DirectoryGroup>,
    /// Server size limit was hit; counts are a lower bound
    pub truncated: bool,
    pub message: String,
    pub elapsed_ms: u64,
}

impl PreviewResult {
    pub fn new(
        user_count: usize,
        group_count: usize,
        sample_users: Vec<DirectoryUser>,
        sample_groups: Vec<DirectoryGroup>,
        truncated: bool,
        elapsed_ms: u64,
    ) -> Self {
        let mut message = format!("found {} users and {} groups", user_count, group_count);
        if truncated {
            message.push_str(" (size limit reached)");
        }

        Self {
            user_count,
            group_count,
            sample_users,
            sample_groups,
            truncated,
            message,
            elapsed_ms,
        }
    }
}

/// Normalized user entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryUser {
    pub dn: String,
    pub remote_id: String,
    pub common_name: String,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub display_name: String,
}

impl DirectoryUser {
    /// Map a search entry through the configured attribute names
    pub fn from_entry(config: &DirectoryConfig, dn: &str, attrs: &EntryAttributes) -> Self {
        let mut user = Self {
            dn: dn.to_string(),
            remote_id: first_value(attrs, &config.attribute_user_rdn),
            common_name: first_value(attrs, "cn"),
            firstname: first_value(attrs, &config.attribute_user_firstname),
            lastname: first_value(attrs, &config.attribute_user_lastname),
            email: first_value(attrs, &config.attribute_user_email).to_lowercase(),
            display_name: first_value(attrs, &config.attribute_user_display_name),
        };

        if user.firstname.is_empty() || user.lastname.is_empty() {
            let display = user.display_name.trim();
            if !display.is_empty() {
                let (first, last) = match display.split_once(char::is_whitespace) {
                    Some((first, rest)) => (first, rest.trim()),
                    None => (display, ""),
                };
                if user.firstname.is_empty() {
                    user.firstname = first.to_string();
                }
                if user.lastname.is_empty() {
                    user.lastname = last.to_string();
                }
            }
        }

        user
    }
}

/// Normalized group entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryGroup {
    pub dn: String,
    pub name: String,
    pub member_count: usize,
}

impl DirectoryGroup {
    pub fn from_entry(config: &DirectoryConfig, dn: &str, attrs: &EntryAttributes) -> Self {
        let mut name = first_value(attrs, &config.attribute_user_group_name);
        if name.is_empty() {
            name = first_value(attrs, "cn");
        }
        if name.is_empty() {
            name = first_rdn_value(dn).to_string();
        }

        let member_count = if config.attribute_group_member.trim().is_empty() {
            0
        } else {
            values(attrs, &config.attribute_group_member).map_or(0, |v| v.len())
        };

        Self {
            dn: dn.to_string(),
            name,
            member_count,
        }
    }
}

/// Attribute names are case-insensitive
fn values<'a>(attrs: &'a EntryAttributes, name: &str) -> Option<&'a Vec<String>> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    attrs.get(name).or_else(|| {
        attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    })
}

fn first_value(attrs: &EntryAttributes, name: &str) -> String {
    values(attrs, name)
        .and_then(|v| v.first())
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

fn first_rdn_value(dn: &str) -> &str {
    dn.split(',')
        .next()
        .and_then(|rdn| rdn.split_once('='))
        .map(|(_, value)| value.trim())
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> EntryAttributes {
        let mut out = EntryAttributes::new();
        for (name, value) in pairs {
            out.entry(name.to_string())
                .or_default()
                .push(value.to_string());
        }
        out
    }

    #[test]
    fn test_user_normalization() {
        let config = DirectoryConfig::default();
        let entry = attrs(&[
            ("uid", "fry"),
            ("cn", "Philip J. Fry"),
            ("givenname", "Philip"),
            ("sn", "Fry"),
            ("mail", "Fry@PlanetExpress.com"),
        ]);

        let user = DirectoryUser::from_entry(
            &config,
            "cn=Philip J. Fry,ou=people,dc=planetexpress,dc=com",
            &entry,
        );

        assert_eq!(user.remote_id, "fry");
        assert_eq!(user.common_name, "Philip J. Fry");
        assert_eq!(user.firstname, "Philip");
        assert_eq!(user.lastname, "Fry");
        assert_eq!(user.email, "fry@planetexpress.com");
    }

    #[test]
    fn test_display_name_fills_missing_parts() {
        let config = DirectoryConfig {
            attribute_user_display_name: "displayName".to_string(),
            ..Default::default()
        };

        let entry = attrs(&[("uid", "leela"), ("displayName", "Turanga Leela")]);
        let user = DirectoryUser::from_entry(&config, "uid=leela", &entry);
        assert_eq!(user.firstname, "Turanga");
        assert_eq!(user.lastname, "Leela");

        let entry = attrs(&[("sn", "Farnsworth"), ("displayName", "Hubert")]);
        let user = DirectoryUser::from_entry(&config, "uid=prof", &entry);
        assert_eq!(user.firstname, "Hubert");
        assert_eq!(user.lastname, "Farnsworth");

        let user = DirectoryUser::from_entry(&config, "uid=nobody", &EntryAttributes::new());
        assert_eq!(user.firstname, "");
        assert_eq!(user.lastname, "");
    }

    #[test]
    fn test_group_naming() {
        let config = DirectoryConfig::default();

        let entry = attrs(&[
            ("cn", "ship_crew"),
            ("member", "cn=Philip J. Fry,ou=people"),
            ("member", "cn=Turanga Leela,ou=people"),
        ]);
        let group = DirectoryGroup::from_entry(&config, "cn=ship_crew,ou=people", &entry);
        assert_eq!(group.name, "ship_crew");
        assert_eq!(group.member_count, 2);

        let group = DirectoryGroup::from_entry(
            &config,
            "cn=admin_staff,ou=people,dc=planetexpress,dc=com",
            &EntryAttributes::new(),
        );
        assert_eq!(group.name, "admin_staff");
        assert_eq!(group.member_count, 0);
    }

    #[test]
    fn test_message() {
        let result = PreviewResult::new(3, 1, vec![], vec![], false, 12);
        assert_eq!(result.message, "found 3 users and 1 groups");

        let result = PreviewResult::new(1000, 0, vec![], vec![], true, 12);
        assert!(result.message.ends_with("(size limit reached)"));

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["userCount"], 1000);
        assert_eq!(json["elapsedMs"], 12);
    }
}
