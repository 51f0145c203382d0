//! Policy rules as data, and the validator that compiles them.
//!
//! A [`PolicySet`] is what gets deserialized from TOML or JSON. It is
//! checked once by [`PolicySet::validate`]; only the resulting
//! [`ValidatedPolicySet`] can be attached to the engine, so malformed
//! rules fail at load time instead of during an evaluation.
//!
//! ```toml
//! [[rules]]
//! name = "freeze-breaking"
//! priority = 50
//! when = [{ field = "has_breaking_changes", op = "eq", value = true }]
//! actions = [{ type = "require_approval", role = "release-manager" }]
//! ```

use std::collections::HashSet;
use std::path::Path;

use anyhow::Context as _;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::context::{ContextField, ContextValue, EvaluationContext, FieldKind};
use super::error::{PolicyError, PolicyResult};
use crate::domain::TrustLevel;

/// Comparison operator of a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    /// Regular-expression match; text fields only.
    Matches,
}

impl Op {
    fn is_ordering(self) -> bool {
        matches!(self, Self::Gt | Self::Ge | Self::Lt | Self::Le)
    }

    fn compare<T: PartialOrd>(self, lhs: T, rhs: T) -> bool {
        match self {
            Self::Eq => lhs == rhs,
            Self::Ne => lhs != rhs,
            Self::Gt => lhs > rhs,
            Self::Ge => lhs >= rhs,
            Self::Lt => lhs < rhs,
            Self::Le => lhs <= rhs,
            Self::Matches => false,
        }
    }
}

impl std::fmt::Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Ge => "ge",
            Self::Lt => "lt",
            Self::Le => "le",
            Self::Matches => "matches",
        };
        f.write_str(s)
    }
}

/// Right-hand side of a predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl From<f64> for Literal {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<bool> for Literal {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for Literal {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

/// `field op value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    pub field: ContextField,
    pub op: Op,
    pub value: Literal,
}

impl Predicate {
    pub fn new(field: ContextField, op: Op, value: impl Into<Literal>) -> Self {
        Self {
            field,
            op,
            value: value.into(),
        }
    }
}

/// What a matching rule contributes to the decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Block { reason: String },
    RequireApproval { role: String },
    Approve,
}

fn default_enabled() -> bool {
    true
}

/// A named, prioritized guard plus actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    #[serde(default)]
    pub priority: i64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub description: String,
    /// Conjunction; an empty guard always matches.
    #[serde(default)]
    pub when: Vec<Predicate>,
    pub actions: Vec<Action>,
}

impl Rule {
    pub fn new(name: impl Into<String>, priority: i64) -> Self {
        Self {
            name: name.into(),
            priority,
            enabled: true,
            description: String::new(),
            when: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn when(mut self, field: ContextField, op: Op, value: impl Into<Literal>) -> Self {
        self.when.push(Predicate::new(field, op, value));
        self
    }

    pub fn then(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Unvalidated rules as loaded from configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicySet {
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl PolicySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn from_toml_str(raw: &str) -> PolicyResult<Self> {
        toml::from_str(raw).map_err(|e| PolicyError::Parse(e.to_string()))
    }

    pub fn from_json_str(raw: &str) -> PolicyResult<Self> {
        serde_json::from_str(raw).map_err(|e| PolicyError::Parse(e.to_string()))
    }

    /// Read, parse, and validate a policy file. `.json` files are parsed
    /// as JSON, everything else as TOML.
    pub fn load_file(path: &Path) -> anyhow::Result<ValidatedPolicySet> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading policy file {}", path.display()))?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let set = if is_json {
            Self::from_json_str(&raw)
        } else {
            Self::from_toml_str(&raw)
        }
        .with_context(|| format!("parsing policy file {}", path.display()))?;
        set.validate()
            .with_context(|| format!("validating policy file {}", path.display()))
    }

    /// Check every rule and compile the enabled ones into evaluation order.
    pub fn validate(&self) -> PolicyResult<ValidatedPolicySet> {
        let mut seen = HashSet::new();
        for (index, rule) in self.rules.iter().enumerate() {
            if rule.name.trim().is_empty() {
                return Err(PolicyError::EmptyRuleName { index });
            }
            if !seen.insert(rule.name.as_str()) {
                return Err(PolicyError::DuplicateRule(rule.name.clone()));
            }
        }

        let mut compiled = Vec::new();
        for rule in &self.rules {
            let compiled_rule = CompiledRule::compile(rule)?;
            if rule.enabled {
                compiled.push(compiled_rule);
            }
        }
        compiled.sort_by(|a, b| {
            b.rule
                .priority
                .cmp(&a.rule.priority)
                .then_with(|| a.rule.name.cmp(&b.rule.name))
        });

        let ordered: Vec<&Rule> = compiled.iter().map(|c| &c.rule).collect();
        let canonical =
            serde_json::to_vec(&ordered).map_err(|e| PolicyError::Parse(e.to_string()))?;
        let digest = hex::encode(Sha256::digest(&canonical));

        Ok(ValidatedPolicySet {
            rules: compiled,
            digest,
        })
    }
}

/// Enabled rules in evaluation order (priority desc, name asc).
#[derive(Debug, Clone)]
pub struct ValidatedPolicySet {
    rules: Vec<CompiledRule>,
    digest: String,
}

impl ValidatedPolicySet {
    /// A set with no rules.
    pub fn empty() -> Self {
        let digest = hex::encode(Sha256::digest(b"[]"));
        Self {
            rules: Vec::new(),
            digest,
        }
    }

    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    /// Hex SHA-256 of the canonical JSON of the ordered enabled rules.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for ValidatedPolicySet {
    fn default() -> Self {
        Self::empty()
    }
}

/// A rule whose guard has been type-checked.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    rule: Rule,
    guard: Vec<Guard>,
}

impl CompiledRule {
    fn compile(rule: &Rule) -> PolicyResult<Self> {
        if rule.actions.is_empty() {
            return Err(PolicyError::NoActions {
                rule: rule.name.clone(),
            });
        }
        for action in &rule.actions {
            match action {
                Action::Block { reason } if reason.trim().is_empty() => {
                    return Err(PolicyError::EmptyActionField {
                        rule: rule.name.clone(),
                        field: "reason",
                    })
                }
                Action::RequireApproval { role } if role.trim().is_empty() => {
                    return Err(PolicyError::EmptyActionField {
                        rule: rule.name.clone(),
                        field: "role",
                    })
                }
                _ => {}
            }
        }
        let guard = rule
            .when
            .iter()
            .map(|p| Guard::compile(&rule.name, p))
            .collect::<PolicyResult<Vec<_>>>()?;
        Ok(Self {
            rule: rule.clone(),
            guard,
        })
    }

    pub fn name(&self) -> &str {
        &self.rule.name
    }

    pub fn priority(&self) -> i64 {
        self.rule.priority
    }

    pub fn description(&self) -> &str {
        &self.rule.description
    }

    pub fn actions(&self) -> &[Action] {
        &self.rule.actions
    }

    /// Every predicate holds against `ctx`.
    pub fn matches(&self, ctx: &EvaluationContext) -> bool {
        self.guard.iter().all(|g| g.holds(ctx))
    }
}

#[derive(Debug, Clone)]
enum Guard {
    Number {
        field: ContextField,
        op: Op,
        value: f64,
    },
    Bool {
        field: ContextField,
        op: Op,
        value: bool,
    },
    Text {
        field: ContextField,
        op: Op,
        value: String,
    },
    Pattern {
        field: ContextField,
        regex: Regex,
    },
    Trust {
        field: ContextField,
        op: Op,
        value: TrustLevel,
    },
}

impl Guard {
    fn compile(rule: &str, predicate: &Predicate) -> PolicyResult<Self> {
        let field = predicate.field;
        let op = predicate.op;
        let mismatch = |expected: &'static str| PolicyError::TypeMismatch {
            rule: rule.to_string(),
            field,
            expected,
        };
        let unsupported = || PolicyError::UnsupportedOperator {
            rule: rule.to_string(),
            field,
            op,
        };
        let kind = field.kind();

        if op == Op::Matches && kind != FieldKind::Text {
            return Err(unsupported());
        }

        match (kind, &predicate.value) {
            (FieldKind::Score | FieldKind::Count, Literal::Number(value)) => {
                let value = *value;
                let in_range = value.is_finite()
                    && match kind {
                        FieldKind::Score => (0.0..=1.0).contains(&value),
                        _ => value >= 0.0,
                    };
                if !in_range {
                    return Err(PolicyError::OutOfRange {
                        rule: rule.to_string(),
                        field,
                        value,
                    });
                }
                Ok(Self::Number { field, op, value })
            }
            (FieldKind::Score | FieldKind::Count, _) => Err(mismatch("number")),
            (FieldKind::Bool, Literal::Bool(value)) => {
                if op.is_ordering() {
                    return Err(unsupported());
                }
                Ok(Self::Bool {
                    field,
                    op,
                    value: *value,
                })
            }
            (FieldKind::Bool, _) => Err(mismatch("bool")),
            (FieldKind::Text, Literal::Text(value)) => {
                if op == Op::Matches {
                    let regex = Regex::new(value).map_err(|source| PolicyError::InvalidPattern {
                        rule: rule.to_string(),
                        pattern: value.clone(),
                        source,
                    })?;
                    return Ok(Self::Pattern { field, regex });
                }
                if op.is_ordering() {
                    return Err(unsupported());
                }
                Ok(Self::Text {
                    field,
                    op,
                    value: value.clone(),
                })
            }
            (FieldKind::Text, _) => Err(mismatch("text")),
            (FieldKind::Trust, Literal::Text(name)) => {
                let value = TrustLevel::parse(name).ok_or_else(|| PolicyError::UnknownTrustLevel {
                    rule: rule.to_string(),
                    value: name.clone(),
                })?;
                Ok(Self::Trust { field, op, value })
            }
            (FieldKind::Trust, _) => Err(mismatch("trust level name")),
        }
    }

    fn holds(&self, ctx: &EvaluationContext) -> bool {
        match self {
            Self::Number { field, op, value } => match ctx.get(*field) {
                ContextValue::Number(actual) => op.compare(actual, *value),
                _ => false,
            },
            Self::Bool { field, op, value } => match ctx.get(*field) {
                ContextValue::Bool(actual) => op.compare(actual, *value),
                _ => false,
            },
            Self::Text { field, op, value } => match ctx.get(*field) {
                ContextValue::Text(actual) => op.compare(actual, value.as_str()),
                _ => false,
            },
            Self::Pattern { field, regex } => match ctx.get(*field) {
                ContextValue::Text(actual) => regex.is_match(actual),
                _ => false,
            },
            Self::Trust { field, op, value } => match ctx.get(*field) {
                ContextValue::Trust(actual) => op.compare(actual, *value),
                _ => false,
            },
        }
    }
}
