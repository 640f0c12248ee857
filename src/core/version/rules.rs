// ─── Platform Rules ───
// Allow/disallow directives attached to libraries and arguments.

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Operating system names as they appear in version JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsName {
    Windows,
    Osx,
    Linux,
    #[serde(other)]
    Unknown,
}

impl OsName {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            OsName::Windows
        } else if cfg!(target_os = "macos") {
            OsName::Osx
        } else if cfg!(target_os = "linux") {
            OsName::Linux
        } else {
            OsName::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OsName::Windows => "windows",
            OsName::Osx => "osx",
            OsName::Linux => "linux",
            OsName::Unknown => "unknown",
        }
    }
}

/// The machine rules are evaluated against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: OsName,
    /// `std::env::consts::ARCH` style name (`x86`, `x86_64`, `aarch64`).
    pub arch: String,
    pub os_version: Option<String>,
}

impl Platform {
    pub fn new(os: OsName, arch: impl Into<String>) -> Self {
        Self {
            os,
            arch: arch.into(),
            os_version: None,
        }
    }

    /// Detect the running machine.
    pub fn current() -> Self {
        Self {
            os: OsName::current(),
            arch: std::env::consts::ARCH.to_string(),
            os_version: sysinfo::System::os_version(),
        }
    }

    /// `"64"` or `"32"`, substituted for `${arch}` in native classifiers.
    pub fn bits(&self) -> &'static str {
        match self.arch.as_str() {
            "x86" | "arm" => "32",
            _ => "64",
        }
    }
}

/// Feature flags referenced by argument rules (`is_demo_user`,
/// `has_custom_resolution`, ...). Absent features count as `false`.
pub type Features = BTreeMap<String, bool>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Disallow,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<OsName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
    /// Regular expression matched against the OS version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl OsRule {
    pub fn matches(&self, platform: &Platform) -> bool {
        if let Some(name) = self.name {
            if name != platform.os {
                return false;
            }
        }

        if let Some(arch) = &self.arch {
            if arch != &platform.arch {
                return false;
            }
        }

        if let Some(pattern) = &self.version {
            let Some(os_version) = platform.os_version.as_deref() else {
                return false;
            };
            match Regex::new(pattern) {
                Ok(re) => {
                    if !re.is_match(os_version) {
                        return false;
                    }
                }
                Err(e) => {
                    debug!("Ignoring rule with invalid OS version pattern {:?}: {}", pattern, e);
                    return false;
                }
            }
        }

        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub action: RuleAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<OsRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<BTreeMap<String, bool>>,
}

impl Rule {
    pub fn allow() -> Self {
        Self {
            action: RuleAction::Allow,
            os: None,
            features: None,
        }
    }

    pub fn disallow() -> Self {
        Self {
            action: RuleAction::Disallow,
            os: None,
            features: None,
        }
    }

    pub fn on_os(mut self, name: OsName) -> Self {
        self.os.get_or_insert_with(OsRule::default).name = Some(name);
        self
    }

    /// Whether this rule's predicates hold on `platform`.
    pub fn applies(&self, platform: &Platform, features: &Features) -> bool {
        if let Some(os) = &self.os {
            if !os.matches(platform) {
                return false;
            }
        }

        if let Some(required) = &self.features {
            for (name, expected) in required {
                if features.get(name).copied().unwrap_or(false) != *expected {
                    return false;
                }
            }
        }

        true
    }
}

/// Evaluate a rule list for `platform`.
///
/// - Empty list → allowed.
/// - Rules apply in order; the last applying rule decides.
/// - A non-empty list where nothing applies → disallowed.
pub fn allow(rules: &[Rule], platform: &Platform) -> bool {
    allow_with_features(rules, platform, &Features::new())
}

/// Same as [`allow`] with feature flags for argument rules.
pub fn allow_with_features(rules: &[Rule], platform: &Platform, features: &Features) -> bool {
    if rules.is_empty() {
        return true;
    }

    let mut allowed = false;
    for rule in rules {
        if rule.applies(platform, features) {
            allowed = rule.action == RuleAction::Allow;
        }
    }
    allowed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linux() -> Platform {
        Platform::new(OsName::Linux, "x86_64")
    }

    fn osx() -> Platform {
        let mut platform = Platform::new(OsName::Osx, "x86_64");
        platform.os_version = Some("10.5.8".into());
        platform
    }

    #[test]
    fn empty_rules_are_allowed() {
        assert!(allow(&[], &linux()));
    }

    #[test]
    fn allow_only_other_os_is_disallowed() {
        let rules = vec![Rule::allow().on_os(OsName::Osx)];
        assert!(!allow(&rules, &linux()));
        assert!(allow(&rules, &osx()));
    }

    #[test]
    fn last_matching_rule_wins() {
        let rules = vec![Rule::allow(), Rule::disallow().on_os(OsName::Osx)];
        assert!(allow(&rules, &linux()));
        assert!(!allow(&rules, &osx()));

        let conflicting = vec![
            Rule::disallow().on_os(OsName::Linux),
            Rule::allow().on_os(OsName::Linux),
        ];
        assert!(allow(&conflicting, &linux()));
    }

    #[test]
    fn evaluation_is_deterministic() {
        let rules = vec![Rule::allow(), Rule::disallow().on_os(OsName::Linux)];
        let platform = linux();
        let first = allow(&rules, &platform);
        for _ in 0..10 {
            assert_eq!(allow(&rules, &platform), first);
        }
    }

    #[test]
    fn os_version_regex_is_matched() {
        let rules: Vec<Rule> = serde_json::from_value(serde_json::json!([
            {"action": "allow"},
            {"action": "disallow", "os": {"name": "osx", "version": "^10\\.5\\.\\d$"}}
        ]))
        .unwrap();
        assert!(!allow(&rules, &osx()));

        let mut newer = osx();
        newer.os_version = Some("14.1".into());
        assert!(allow(&rules, &newer));
    }

    #[test]
    fn arch_and_unknown_os_names_parse() {
        let rules: Vec<Rule> = serde_json::from_value(serde_json::json!([
            {"action": "allow", "os": {"arch": "x86"}},
            {"action": "allow", "os": {"name": "solaris"}}
        ]))
        .unwrap();
        assert_eq!(rules[1].os.as_ref().unwrap().name, Some(OsName::Unknown));
        assert!(!allow(&rules, &linux()));
        assert!(allow(&rules, &Platform::new(OsName::Linux, "x86")));
    }

    #[test]
    fn feature_rules_require_matching_flags() {
        let rules: Vec<Rule> = serde_json::from_value(serde_json::json!([
            {"action": "allow", "features": {"has_custom_resolution": true}}
        ]))
        .unwrap();
        assert!(!allow(&rules, &linux()));

        let mut features = Features::new();
        features.insert("has_custom_resolution".into(), true);
        assert!(allow_with_features(&rules, &linux(), &features));
    }

    #[test]
    fn bits_follow_arch() {
        assert_eq!(Platform::new(OsName::Windows, "x86").bits(), "32");
        assert_eq!(Platform::new(OsName::Windows, "x86_64").bits(), "64");
    }
}
