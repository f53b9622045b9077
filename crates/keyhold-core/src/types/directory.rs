//! Directory (LDAP / Active Directory) provider configuration

use crate::error::{Result, ValidationErrors};
use crate::filter;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Secret string that never shows up in `Debug` or `Display` output
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Raw value, for the store and the bind call only
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

impl From<&str> for Secret {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Transport security used to reach the directory server
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EncryptionType {
    /// Plain `ldap://`
    None,
    /// `ldap://` upgraded in place
    StartTls,
    /// `ldaps://`
    Tls,
    /// Value we could not map; always rejected by validation
    Unrecognized(String),
}

impl EncryptionType {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => EncryptionType::None,
            "starttls" => EncryptionType::StartTls,
            "tls" | "ldaps" => EncryptionType::Tls,
            _ => EncryptionType::Unrecognized(s.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EncryptionType::None => "none",
            EncryptionType::StartTls => "starttls",
            EncryptionType::Tls => "tls",
            EncryptionType::Unrecognized(s) => s,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, EncryptionType::Unrecognized(_))
    }

    /// URL scheme for the initial connection
    pub fn scheme(&self) -> &'static str {
        match self {
            EncryptionType::Tls => "ldaps",
            _ => "ldap",
        }
    }
}

impl Default for EncryptionType {
    fn default() -> Self {
        EncryptionType::Unrecognized(String::new())
    }
}

impl fmt::Display for EncryptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EncryptionType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EncryptionType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(EncryptionType::parse(&s))
    }
}

/// Connection, credential and attribute-mapping settings for a directory.
///
/// Used both as the persisted configuration and as a preview candidate.
/// Fields missing from a JSON document deserialize to empty values (or to
/// the conventional attribute names for the attribute mappings) so that
/// `validate` can report them one by one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DirectoryConfig {
    pub server_host: String,
    pub server_port: i64,
    pub encryption_type: EncryptionType,
    #[serde(rename = "BaseDN")]
    pub base_dn: String,
    #[serde(rename = "BindDN")]
    pub bind_dn: String,
    pub bind_password: Secret,
    pub user_filter: String,
    pub group_filter: String,
    #[serde(rename = "AttributeUserRDN")]
    pub attribute_user_rdn: String,
    pub attribute_user_firstname: String,
    pub attribute_user_lastname: String,
    pub attribute_user_email: String,
    pub attribute_user_display_name: String,
    pub attribute_user_group_name: String,
    pub attribute_group_member: String,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            server_host: String::new(),
            server_port: 0,
            encryption_type: EncryptionType::default(),
            base_dn: String::new(),
            bind_dn: String::new(),
            bind_password: Secret::default(),
            user_filter: String::new(),
            group_filter: String::new(),
            attribute_user_rdn: "uid".to_string(),
            attribute_user_firstname: "givenName".to_string(),
            attribute_user_lastname: "sn".to_string(),
            attribute_user_email: "mail".to_string(),
            attribute_user_display_name: String::new(),
            attribute_user_group_name: String::new(),
            attribute_group_member: "member".to_string(),
        }
    }
}

impl DirectoryConfig {
    /// Structural validation. Every bad field is reported; no I/O.
    pub fn validate(&self) -> Result<()> {
        let mut errors = ValidationErrors::new();

        let host = self.server_host.trim();
        if host.is_empty() {
            errors.push("ServerHost", "is required");
        } else if host.chars().any(|c| c.is_whitespace() || c == '/') {
            errors.push("ServerHost", "must be a host name or IP address");
        }

        if !(1..=65535).contains(&self.server_port) {
            errors.push("ServerPort", "must be between 1 and 65535");
        }

        match &self.encryption_type {
            EncryptionType::Unrecognized(s) if s.trim().is_empty() => {
                errors.push("EncryptionType", "is required");
            }
            EncryptionType::Unrecognized(s) => {
                errors.push(
                    "EncryptionType",
                    format!("'{}' is not one of none, starttls, tls", s),
                );
            }
            _ => {}
        }

        if self.base_dn.trim().is_empty() {
            errors.push("BaseDN", "is required");
        }
        if self.bind_dn.trim().is_empty() {
            errors.push("BindDN", "is required");
        }
        if self.bind_password.is_empty() {
            errors.push("BindPassword", "is required");
        }

        if self.user_filter.trim().is_empty() {
            errors.push("UserFilter", "is required");
        } else if let Err(e) = filter::validate(&self.user_filter) {
            errors.push("UserFilter", format!("invalid search filter: {}", e));
        }

        if self.has_group_filter() {
            if let Err(e) = filter::validate(&self.group_filter) {
                errors.push("GroupFilter", format!("invalid search filter: {}", e));
            }
        }

        for (field, value) in [
            ("AttributeUserRDN", &self.attribute_user_rdn),
            ("AttributeUserFirstname", &self.attribute_user_firstname),
            ("AttributeUserLastname", &self.attribute_user_lastname),
            ("AttributeUserEmail", &self.attribute_user_email),
        ] {
            check_attribute(&mut errors, field, value, true);
        }

        check_attribute(
            &mut errors,
            "AttributeUserDisplayName",
            &self.attribute_user_display_name,
            false,
        );
        check_attribute(
            &mut errors,
            "AttributeUserGroupName",
            &self.attribute_user_group_name,
            false,
        );
        check_attribute(
            &mut errors,
            "AttributeGroupMember",
            &self.attribute_group_member,
            self.has_group_filter(),
        );

        errors.into_result()
    }

    pub fn has_group_filter(&self) -> bool {
        !self.group_filter.trim().is_empty()
    }

    /// Port as a socket port, if it is in range
    pub fn port(&self) -> Option<u16> {
        u16::try_from(self.server_port).ok().filter(|p| *p != 0)
    }

    /// Connection URL for the initial connect
    pub fn url(&self) -> String {
        let host = self.server_host.trim();
        if host.contains(':') && !host.starts_with('[') {
            format!("{}://[{}]:{}", self.encryption_type.scheme(), host, self.server_port)
        } else {
            format!("{}://{}:{}", self.encryption_type.scheme(), host, self.server_port)
        }
    }

    /// Attributes requested by the user search
    pub fn user_attributes(&self) -> Vec<String> {
        collect_attributes([
            self.attribute_user_rdn.as_str(),
            self.attribute_user_firstname.as_str(),
            self.attribute_user_lastname.as_str(),
            self.attribute_user_email.as_str(),
            self.attribute_user_display_name.as_str(),
            "cn",
        ])
    }

    /// Attributes requested by the group search
    pub fn group_attributes(&self) -> Vec<String> {
        collect_attributes([
            self.attribute_user_group_name.as_str(),
            "cn",
            self.attribute_group_member.as_str(),
        ])
    }

    /// Whether a bind against `self` goes to the same account on the same
    /// server, over the same transport, as a bind against `other`
    pub fn same_bind_target(&self, other: &DirectoryConfig) -> bool {
        self.server_host.trim().eq_ignore_ascii_case(other.server_host.trim())
            && self.server_port == other.server_port
            && self.encryption_type == other.encryption_type
            && self.bind_dn.trim().eq_ignore_ascii_case(other.bind_dn.trim())
    }

    /// Copy with the bind password cleared
    pub fn redacted(&self) -> Self {
        Self {
            bind_password: Secret::default(),
            ..self.clone()
        }
    }
}

fn check_attribute(errors: &mut ValidationErrors, field: &str, value: &str, required: bool) {
    let value = value.trim();
    if value.is_empty() {
        if required {
            errors.push(field, "is required");
        }
    } else if !filter::is_attribute_name(value) {
        errors.push(field, format!("'{}' is not a valid attribute name", value));
    }
}

fn collect_attributes<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for name in names {
        let name = name.trim();
        if !name.is_empty() && !out.iter().any(|n| n.eq_ignore_ascii_case(name)) {
            out.push(name.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planetexpress() -> DirectoryConfig {
        DirectoryConfig {
            server_host: "127.0.0.1".to_string(),
            server_port: 389,
            encryption_type: EncryptionType::StartTls,
            base_dn: "ou=people,dc=planetexpress,dc=com".to_string(),
            bind_dn: "cn=admin,dc=planetexpress,dc=com".to_string(),
            bind_password: Secret::new("GoodNewsEveryone"),
            user_filter: "(|(objectClass=person)(objectClass=user)(objectClass=inetOrgPerson))"
                .to_string(),
            group_filter: "(&(objectClass=group)(|(cn=ship_crew)(cn=admin_staff)))".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(planetexpress().validate().is_ok());
    }

    #[test]
    fn test_each_missing_field_is_named() {
        let cases: [(&str, fn(&mut DirectoryConfig)); 11] = [
            ("ServerHost", |c: &mut DirectoryConfig| c.server_host = "  ".to_string()),
            ("BaseDN", |c: &mut DirectoryConfig| c.base_dn.clear()),
            ("BindDN", |c: &mut DirectoryConfig| c.bind_dn.clear()),
            ("BindPassword", |c: &mut DirectoryConfig| c.bind_password = Secret::default()),
            ("UserFilter", |c: &mut DirectoryConfig| c.user_filter.clear()),
            ("EncryptionType", |c: &mut DirectoryConfig| {
                c.encryption_type = EncryptionType::default()
            }),
            ("AttributeUserRDN", |c: &mut DirectoryConfig| c.attribute_user_rdn.clear()),
            ("AttributeUserFirstname", |c: &mut DirectoryConfig| {
                c.attribute_user_firstname.clear()
            }),
            ("AttributeUserLastname", |c: &mut DirectoryConfig| {
                c.attribute_user_lastname.clear()
            }),
            ("AttributeUserEmail", |c: &mut DirectoryConfig| c.attribute_user_email.clear()),
            ("AttributeGroupMember", |c: &mut DirectoryConfig| c.attribute_group_member.clear()),
        ];

        for (field, mutate) in cases {
            let mut config = planetexpress();
            mutate(&mut config);

            let err = config.validate().unwrap_err();
            let fields = err.field_errors().unwrap();
            assert_eq!(fields.len(), 1, "{}: {:?}", field, fields);
            assert_eq!(fields[0].field, field);
        }
    }

    #[test]
    fn test_group_member_optional_without_group_filter() {
        let mut config = planetexpress();
        config.group_filter.clear();
        config.attribute_group_member.clear();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_port_range() {
        for port in [0, -1, 65536, i64::MAX] {
            let mut config = planetexpress();
            config.server_port = port;
            let err = config.validate().unwrap_err();
            assert_eq!(err.field_errors().unwrap()[0].field, "ServerPort");
            assert_eq!(config.port(), None);
        }

        let mut config = planetexpress();
        config.server_port = 65535;
        assert!(config.validate().is_ok());
        assert_eq!(config.port(), Some(65535));
    }

    #[test]
    fn test_collects_all_errors() {
        let config = DirectoryConfig {
            server_port: 70000,
            user_filter: "(cn=x".to_string(),
            group_filter: "(&)".to_string(),
            ..Default::default()
        };

        let err = config.validate().unwrap_err();
        let fields: Vec<&str> = err
            .field_errors()
            .unwrap()
            .iter()
            .map(|f| f.field.as_str())
            .collect();

        assert_eq!(
            fields,
            vec![
                "ServerHost",
                "ServerPort",
                "EncryptionType",
                "BaseDN",
                "BindDN",
                "BindPassword",
                "UserFilter",
                "GroupFilter",
            ]
        );
    }

    #[test]
    fn test_wire_format() {
        let json = serde_json::json!({
            "ServerType": "ldap",
            "ServerHost": "ldap.example.com",
            "ServerPort": 636,
            "EncryptionType": "ldaps",
            "BaseDN": "dc=example,dc=com",
            "BindDN": "cn=admin,dc=example,dc=com",
            "BindPassword": "hunter2",
            "UserFilter": "(objectClass=person)",
            "AttributeUserRDN": "uid",
            "AttributeUserEmail": "mail",
        });

        let config: DirectoryConfig = serde_json::from_value(json).unwrap();
        assert_eq!(config.encryption_type, EncryptionType::Tls);
        assert_eq!(config.attribute_user_firstname, "givenName");
        assert_eq!(config.bind_password.expose(), "hunter2");
        assert_eq!(config.url(), "ldaps://ldap.example.com:636");
        assert!(config.validate().is_ok());

        let out = serde_json::to_value(&config).unwrap();
        assert_eq!(out["EncryptionType"], "tls");
        assert_eq!(out["BaseDN"], "dc=example,dc=com");
    }

    #[test]
    fn test_unrecognized_encryption_is_rejected() {
        let config: DirectoryConfig =
            serde_json::from_value(serde_json::json!({ "EncryptionType": "ssl3" })).unwrap();
        assert_eq!(
            config.encryption_type,
            EncryptionType::Unrecognized("ssl3".to_string())
        );
        let err = config.validate().unwrap_err();
        let fields = err.field_errors().unwrap();
        assert!(fields
            .iter()
            .any(|f| f.field == "EncryptionType" && f.message.contains("ssl3")));
    }

    #[test]
    fn test_password_never_formatted() {
        let config = planetexpress();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("GoodNewsEveryone"));
        assert!(debug.contains("***"));
        assert!(config.redacted().bind_password.is_empty());

        let mut broken = planetexpress();
        broken.user_filter = "GoodNewsEveryone".to_string();
        broken.server_port = 0;
        let err = broken.validate().unwrap_err();
        assert_eq!(err.field_errors().unwrap().len(), 2);
        assert!(!err.to_string().contains("GoodNewsEveryone"));
    }

    #[test]
    fn test_requested_attributes() {
        let mut config = planetexpress();
        config.attribute_user_display_name = "displayName".to_string();
        assert_eq!(
            config.user_attributes(),
            vec!["uid", "givenName", "sn", "mail", "displayName", "cn"]
        );
        assert_eq!(config.group_attributes(), vec!["cn", "member"]);
    }

    #[test]
    fn test_same_bind_target() {
        let stored = planetexpress();

        let mut edited = stored.redacted();
        edited.base_dn = "dc=planetexpress,dc=com".to_string();
        edited.server_host = "LDAP.example.com ".to_string();
        let mut original = stored.clone();
        original.server_host = "ldap.example.com".to_string();
        assert!(original.same_bind_target(&edited));

        let mut moved = stored.clone();
        moved.server_host = "ldap.evil.example".to_string();
        assert!(!stored.same_bind_target(&moved));

        let mut other_port = stored.clone();
        other_port.server_port = 1389;
        assert!(!stored.same_bind_target(&other_port));

        let mut other_account = stored.clone();
        other_account.bind_dn = "cn=zoidberg,dc=planetexpress,dc=com".to_string();
        assert!(!stored.same_bind_target(&other_account));

        let mut downgraded = stored.clone();
        downgraded.encryption_type = EncryptionType::None;
        assert!(!stored.same_bind_target(&downgraded));
    }

    #[test]
    fn test_ipv6_url() {
        let mut config = planetexpress();
        config.server_host = "::1".to_string();
        assert_eq!(config.url(), "ldap://[::1]:389");
    }
}
