//! Field registry — the fixed catalog of onboarding fields.
//!
//! The registry is a deploy-time enumeration: every field the onboarding
//! flow can collect, with its display label, form control, and validation
//! rule. Both the admin assignment editor (to enumerate checkboxes) and the
//! step form runtime (to build per-step validation) read from here. There
//! are no mutation operations.

use std::sync::OnceLock;

use chrono::{NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FieldError;

/// Stable identifier for an onboarding field.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FieldKey {
    AboutMe,
    Birthdate,
    Address,
    SkillLevel,
    Onsite,
    Compensation,
}

impl FieldKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AboutMe => "about_me",
            Self::Birthdate => "birthdate",
            Self::Address => "address",
            Self::SkillLevel => "skill_level",
            Self::Onsite => "onsite",
            Self::Compensation => "compensation",
        }
    }
}

impl std::fmt::Display for FieldKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for FieldKey {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "about_me" => Ok(Self::AboutMe),
            "birthdate" => Ok(Self::Birthdate),
            "address" => Ok(Self::Address),
            "skill_level" => Ok(Self::SkillLevel),
            "onsite" => Ok(Self::Onsite),
            "compensation" => Ok(Self::Compensation),
            _ => Err(format!("Unknown field key: {s}")),
        }
    }
}

/// Which form control renders a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlKind {
    Textarea,
    DateInput,
    AddressGroup,
    Select,
    Radio,
}

/// The allowed skill levels, in rank order.
pub const SKILL_LEVELS: &[&str] = &[
    "Beginner",
    "Intermediate",
    "Advanced",
    "Expert",
    "Master",
];

/// The onsite willingness choices.
pub const ONSITE_CHOICES: &[&str] = &["yes", "no"];

/// Validation rule for a field value.
///
/// Rules are data, not code: the form runtime dispatches over the rule
/// attached to whatever fields are assigned to the active step, so it never
/// needs to know the concrete field set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRule {
    /// Free text bounded by a character count range.
    Text { min: usize, max: usize },
    /// A `YYYY-MM-DD` date that must not be in the future.
    PastDate,
    /// The four-part address group.
    Address,
    /// Exactly one of a fixed set of choices.
    OneOf(&'static [&'static str]),
}

/// One entry in the field registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub key: FieldKey,
    pub label: &'static str,
    pub control: ControlKind,
    pub rule: FieldRule,
}

static FIELDS: [FieldSpec; 6] = [
    FieldSpec {
        key: FieldKey::AboutMe,
        label: "About Me",
        control: ControlKind::Textarea,
        rule: FieldRule::Text { min: 10, max: 500 },
    },
    FieldSpec {
        key: FieldKey::Birthdate,
        label: "Date of Birth",
        control: ControlKind::DateInput,
        rule: FieldRule::PastDate,
    },
    FieldSpec {
        key: FieldKey::Address,
        label: "Address",
        control: ControlKind::AddressGroup,
        rule: FieldRule::Address,
    },
    FieldSpec {
        key: FieldKey::SkillLevel,
        label: "Skill Level",
        control: ControlKind::Select,
        rule: FieldRule::OneOf(SKILL_LEVELS),
    },
    FieldSpec {
        key: FieldKey::Onsite,
        label: "Are you willing to work onsite?",
        control: ControlKind::Radio,
        rule: FieldRule::OneOf(ONSITE_CHOICES),
    },
    FieldSpec {
        key: FieldKey::Compensation,
        label: "Required Compensation",
        control: ControlKind::Textarea,
        rule: FieldRule::Text { min: 1, max: 200 },
    },
];

/// All registered fields, in stable display order.
pub fn all_fields() -> &'static [FieldSpec] {
    &FIELDS
}

/// Look up the spec for a key. Total — every key has exactly one entry.
pub fn spec_for(key: FieldKey) -> &'static FieldSpec {
    match FIELDS.iter().find(|spec| spec.key == key) {
        Some(spec) => spec,
        // FIELDS covers every FieldKey variant.
        None => unreachable!("field registry is missing a key"),
    }
}

/// Validate `values` against the given specs. Returns one error per failing
/// field (or sub-field); an empty vec means all checked fields are valid.
pub fn validate_fields<'a>(
    specs: impl IntoIterator<Item = &'a FieldSpec>,
    values: &serde_json::Map<String, Value>,
) -> Vec<FieldError> {
    let mut errors = Vec::new();
    for spec in specs {
        let value = values.get(spec.key.as_str()).unwrap_or(&Value::Null);
        errors.extend(spec.rule.check(spec, value));
    }
    errors
}

impl FieldRule {
    /// Check a single value against this rule.
    pub fn check(&self, spec: &FieldSpec, value: &Value) -> Vec<FieldError> {
        let key = spec.key.as_str();
        match self {
            Self::Text { min, max } => {
                text_errors(key, spec.label, value.as_str(), *min, *max)
            }
            Self::PastDate => date_errors(key, spec.label, value.as_str()),
            Self::Address => address_errors(value),
            Self::OneOf(choices) => match value.as_str() {
                Some(s) if choices.contains(&s) => Vec::new(),
                Some(_) | None => vec![FieldError::new(
                    key,
                    format!("{} must be one of: {}", spec.label, choices.join(", ")),
                )],
            },
        }
    }
}

fn text_errors(
    key: &str,
    label: &str,
    value: Option<&str>,
    min: usize,
    max: usize,
) -> Vec<FieldError> {
    let text = value.unwrap_or("");
    if text.is_empty() {
        return vec![FieldError::new(key, format!("{label} is required"))];
    }
    let len = text.chars().count();
    if len < min {
        return vec![FieldError::new(
            key,
            format!("{label} must be at least {min} characters long"),
        )];
    }
    if len > max {
        return vec![FieldError::new(
            key,
            format!("{label} must be less than {max} characters"),
        )];
    }
    Vec::new()
}

fn date_errors(key: &str, label: &str, value: Option<&str>) -> Vec<FieldError> {
    let text = value.unwrap_or("");
    if text.is_empty() {
        return vec![FieldError::new(key, format!("{label} is required"))];
    }
    let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") else {
        return vec![FieldError::new(key, format!("{label} must be a valid date"))];
    };
    if date > Utc::now().date_naive() {
        return vec![FieldError::new(
            key,
            format!("{label} cannot be in the future"),
        )];
    }
    Vec::new()
}

fn address_errors(value: &Value) -> Vec<FieldError> {
    let Some(parts) = value.as_object() else {
        return vec![FieldError::new("address", "All address fields are required")];
    };
    let mut errors = Vec::new();
    let get = |name: &str| parts.get(name).and_then(Value::as_str).unwrap_or("");

    let street = get("street_address");
    if street.is_empty() {
        errors.push(FieldError::new(
            "address.street_address",
            "Street address is required",
        ));
    }

    let city = get("city");
    if city.is_empty() {
        errors.push(FieldError::new("address.city", "City is required"));
    } else if city.chars().count() < 2 {
        errors.push(FieldError::new(
            "address.city",
            "City must be at least 2 characters long",
        ));
    } else if city.chars().count() > 50 {
        errors.push(FieldError::new(
            "address.city",
            "City must be less than 50 characters",
        ));
    } else if !city_pattern().is_match(city) {
        errors.push(FieldError::new(
            "address.city",
            "City can only contain letters and spaces",
        ));
    }

    let state = get("state");
    if state.is_empty() {
        errors.push(FieldError::new("address.state", "State is required"));
    } else if state.chars().count() < 2 {
        errors.push(FieldError::new(
            "address.state",
            "State must be at least 2 characters",
        ));
    } else if state.chars().count() > 50 {
        errors.push(FieldError::new(
            "address.state",
            "State must be less than 50 characters",
        ));
    }

    let zipcode = get("zipcode");
    if zipcode.is_empty() {
        errors.push(FieldError::new("address.zipcode", "Zip code is required"));
    } else if !zip_pattern().is_match(zipcode) {
        errors.push(FieldError::new(
            "address.zipcode",
            "Please enter a valid US zip code",
        ));
    }

    errors
}

fn city_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z\s]+$").unwrap())
}

fn zip_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{5}(-\d{4})?$").unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn check_one(key: FieldKey, value: Value) -> Vec<FieldError> {
        let spec = spec_for(key);
        spec.rule.check(spec, &value)
    }

    #[test]
    fn registry_is_stable_and_unique() {
        let fields = all_fields();
        assert_eq!(fields.len(), 6);
        let mut keys: Vec<_> = fields.iter().map(|f| f.key).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), 6, "field keys must be unique");
        // Two calls observe the same order.
        let again: Vec<_> = all_fields().iter().map(|f| f.key).collect();
        assert_eq!(again, fields.iter().map(|f| f.key).collect::<Vec<_>>());
    }

    #[test]
    fn display_matches_serde() {
        for spec in all_fields() {
            let display = spec.key.to_string();
            let json = serde_json::to_string(&spec.key).unwrap();
            assert_eq!(format!("\"{display}\""), json);
            let parsed: FieldKey = display.parse().unwrap();
            assert_eq!(parsed, spec.key);
        }
    }

    #[test]
    fn about_me_length_bounds() {
        assert!(!check_one(FieldKey::AboutMe, json!("short")).is_empty());
        assert!(check_one(FieldKey::AboutMe, json!("long enough text")).is_empty());
        let too_long = "x".repeat(501);
        assert!(!check_one(FieldKey::AboutMe, json!(too_long)).is_empty());
        let errors = check_one(FieldKey::AboutMe, json!(""));
        assert_eq!(errors[0].message, "About Me is required");
    }

    #[test]
    fn birthdate_rejects_future_and_garbage() {
        assert!(check_one(FieldKey::Birthdate, json!("1990-06-15")).is_empty());
        assert!(!check_one(FieldKey::Birthdate, json!("2999-01-01")).is_empty());
        assert!(!check_one(FieldKey::Birthdate, json!("not-a-date")).is_empty());
        assert!(!check_one(FieldKey::Birthdate, Value::Null).is_empty());
    }

    #[test]
    fn skill_level_choices() {
        assert!(check_one(FieldKey::SkillLevel, json!("Beginner")).is_empty());
        assert!(check_one(FieldKey::SkillLevel, json!("Master")).is_empty());
        assert!(!check_one(FieldKey::SkillLevel, json!("Wizard")).is_empty());
        assert!(!check_one(FieldKey::SkillLevel, Value::Null).is_empty());
    }

    #[test]
    fn onsite_is_yes_or_no() {
        assert!(check_one(FieldKey::Onsite, json!("yes")).is_empty());
        assert!(check_one(FieldKey::Onsite, json!("no")).is_empty());
        assert!(!check_one(FieldKey::Onsite, json!("maybe")).is_empty());
    }

    #[test]
    fn address_validates_each_part() {
        let good = json!({
            "street_address": "1 Main St",
            "city": "Springfield",
            "state": "IL",
            "zipcode": "62704"
        });
        assert!(check_one(FieldKey::Address, good).is_empty());

        let bad = json!({
            "street_address": "",
            "city": "X1",
            "state": "I",
            "zipcode": "abcde"
        });
        let errors = check_one(FieldKey::Address, bad);
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"address.street_address"));
        assert!(fields.contains(&"address.city"));
        assert!(fields.contains(&"address.state"));
        assert!(fields.contains(&"address.zipcode"));
    }

    #[test]
    fn zip_accepts_plus_four() {
        let value = json!({
            "street_address": "1 Main St",
            "city": "Springfield",
            "state": "IL",
            "zipcode": "62704-1234"
        });
        assert!(check_one(FieldKey::Address, value).is_empty());
    }

    #[test]
    fn address_requires_an_object() {
        let errors = check_one(FieldKey::Address, json!("1 Main St"));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "address");
    }

    #[test]
    fn validate_fields_scopes_to_given_specs() {
        // Only about_me is checked — a missing birthdate is not an error here.
        let mut values = serde_json::Map::new();
        values.insert("about_me".into(), json!("a perfectly fine bio"));
        let errors = validate_fields([spec_for(FieldKey::AboutMe)], &values);
        assert!(errors.is_empty());

        let errors = validate_fields(
            [spec_for(FieldKey::AboutMe), spec_for(FieldKey::Birthdate)],
            &values,
        );
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "birthdate");
    }
}
