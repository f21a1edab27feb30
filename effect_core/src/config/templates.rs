//! Effect template files
//!
//! Templates are authored as TOML `[[effect]]` tables or the equivalent JSON
//! `{"effect": [...]}` document. Enum-valued fields are strings and children
//! refer to other effects by name. A file is validated as a whole before
//! anything is registered, so a bad entry never leaves a partial registry.

use super::ConfigError;
use crate::template::{self, EffectTemplate, TemplateRegistry};
use crate::types::{BuffType, CritMode, DamageType, EffectKind, Millis, StackRule, TemplateId};
use crate::EffectError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

/// Container for effect definitions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateFile {
    #[serde(rename = "effect", default)]
    pub effects: Vec<TemplateConfig>,
}

/// One authored effect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateConfig {
    pub name: String,
    pub kind: String,
    #[serde(default)]
    pub buff_type: Option<BuffType>,
    pub magnitude: i32,
    #[serde(default)]
    pub duration_ms: Millis,
    #[serde(default)]
    pub stack_rule: Option<String>,
    #[serde(default)]
    pub snapshot: bool,
    #[serde(default)]
    pub scale_by: Option<ScaleByConfig>,
    #[serde(default)]
    pub precondition: Option<PreconditionConfig>,
    #[serde(default)]
    pub pulse_period_ms: Millis,
    #[serde(default)]
    pub children: Vec<ChildConfig>,
    #[serde(default)]
    pub damage_type: Option<String>,
    #[serde(default)]
    pub crit_mode: Option<String>,
    #[serde(default)]
    pub crit_chance: u8,
    #[serde(default)]
    pub radius: f32,
    #[serde(default)]
    pub group_mask: u32,
    #[serde(default)]
    pub debuff: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleByConfig {
    pub buff_type: BuffType,
    pub percent_per_point: i32,
    #[serde(default)]
    pub snapshot: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreconditionConfig {
    pub buff_type: BuffType,
    pub minimum: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildConfig {
    /// Name of the child effect, in this file or already registered
    pub effect: String,
    #[serde(default)]
    pub delay_ms: Millis,
}

fn parse_name<T: FromStr>(value: &str, effect: &str) -> Result<T, EffectError>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e: T::Err| EffectError::InvalidTemplate(format!("'{}': {}", effect, e)))
}

impl TemplateConfig {
    /// Translate into a template; `names` maps effect names to ids
    fn build(&self, names: &HashMap<&str, TemplateId>) -> Result<EffectTemplate, EffectError> {
        let kind: EffectKind = parse_name(&self.kind, &self.name)?;
        let mut template = match kind {
            EffectKind::StatBuff => {
                let buff_type = self.buff_type.ok_or_else(|| {
                    EffectError::InvalidTemplate(format!("'{}': stat buffs need a buff_type", self.name))
                })?;
                EffectTemplate::stat_buff(&self.name, buff_type, self.magnitude, self.duration_ms)
            }
            EffectKind::DamageOverTime => {
                EffectTemplate::damage_over_time(&self.name, self.magnitude, self.duration_ms)
            }
            EffectKind::Aura => {
                EffectTemplate::aura(&self.name, self.magnitude, self.duration_ms, self.radius)
            }
        };

        if let Some(rule) = &self.stack_rule {
            template = template.with_stack_rule(parse_name::<StackRule>(rule, &self.name)?);
        }
        if let Some(damage_type) = &self.damage_type {
            template = template.with_damage_type(parse_name::<DamageType>(damage_type, &self.name)?);
        }
        let crit_mode = match &self.crit_mode {
            Some(mode) => parse_name::<CritMode>(mode, &self.name)?,
            None => CritMode::default(),
        };
        template = template
            .with_snapshot(self.snapshot)
            .with_pulse_period(self.pulse_period_ms)
            .with_crit(crit_mode, self.crit_chance)
            .with_group_mask(self.group_mask);
        if kind != EffectKind::Aura {
            template.radius = self.radius;
        }
        if let Some(scale) = &self.scale_by {
            template = template.with_scale_by(scale.buff_type, scale.percent_per_point, scale.snapshot);
        }
        if let Some(pre) = &self.precondition {
            template = template.with_precondition(pre.buff_type, pre.minimum);
        }
        if let Some(debuff) = self.debuff {
            template = template.with_debuff(debuff);
        }
        for child in &self.children {
            let id = names.get(child.effect.as_str()).copied().ok_or_else(|| {
                EffectError::InvalidTemplate(format!(
                    "'{}': unknown child effect '{}'",
                    self.name, child.effect
                ))
            })?;
            template = template.with_child(id, child.delay_ms);
        }

        template::validate(&template)?;
        Ok(template)
    }
}

impl TemplateFile {
    /// Register every effect, or none of them
    pub fn register_all(&self, registry: &mut TemplateRegistry) -> Result<Vec<TemplateId>, ConfigError> {
        // Step 1: Names already registered, then this file's in the ids they will get
        let mut names: HashMap<&str, TemplateId> = registry
            .iter()
            .map(|t| (t.name.as_str(), t.id))
            .collect();
        let first = registry.next_id().0;
        for (offset, effect) in self.effects.iter().enumerate() {
            let id = TemplateId(first + offset as u32);
            if names.insert(effect.name.as_str(), id).is_some() {
                return Err(ConfigError::Validation(format!(
                    "duplicate effect name '{}'",
                    effect.name
                )));
            }
        }

        // Step 2: Build and validate everything
        let built = self
            .effects
            .iter()
            .map(|effect| effect.build(&names))
            .collect::<Result<Vec<_>, _>>()?;

        // Step 3: Register
        let mut ids = Vec::with_capacity(built.len());
        for template in built {
            ids.push(registry.register(template)?);
        }
        tracing::debug!(count = ids.len(), "effect templates registered");
        Ok(ids)
    }
}

/// Parse a TOML template file and register its effects
pub fn parse_toml_templates(
    toml: &str,
    registry: &mut TemplateRegistry,
) -> Result<Vec<TemplateId>, ConfigError> {
    let file: TemplateFile = super::parse_toml(toml)?;
    file.register_all(registry)
}

/// Parse a JSON template document and register its effects
pub fn parse_json_templates(
    json: &str,
    registry: &mut TemplateRegistry,
) -> Result<Vec<TemplateId>, ConfigError> {
    let file: TemplateFile = super::parse_json(json)?;
    file.register_all(registry)
}

/// Load a template file, picking the format from its extension
pub fn load_templates(
    path: &Path,
    registry: &mut TemplateRegistry,
) -> Result<Vec<TemplateId>, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => parse_json_templates(&content, registry),
        _ => parse_toml_templates(&content, registry),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOML: &str = r#"
[[effect]]
name = "ignite"
kind = "dot"
magnitude = 12
duration_ms = 3000
pulse_period_ms = 500
stack_rule = "refresh"
damage_type = "fire"
crit_mode = "per_application"
crit_chance = 20
children = [{ effect = "scorch", delay_ms = 250 }]

[[effect]]
name = "scorch"
kind = "aura"
magnitude = 4
duration_ms = 1000
radius = 2.5
group_mask = 1

[[effect]]
name = "fury"
kind = "stat_buff"
buff_type = 0
magnitude = 5
duration_ms = 10000
scale_by = { buff_type = 2, percent_per_point = 10, snapshot = true }
precondition = { buff_type = 3, minimum = 1 }
"#;

    const JSON: &str = r#"{
  "effect": [
    {
      "name": "ignite", "kind": "dot", "magnitude": 12, "duration_ms": 3000,
      "pulse_period_ms": 500, "stack_rule": "refresh", "damage_type": "fire",
      "crit_mode": "per_application", "crit_chance": 20,
      "children": [{ "effect": "scorch", "delay_ms": 250 }]
    },
    {
      "name": "scorch", "kind": "aura", "magnitude": 4, "duration_ms": 1000,
      "radius": 2.5, "group_mask": 1
    },
    {
      "name": "fury", "kind": "stat_buff", "buff_type": 0, "magnitude": 5,
      "duration_ms": 10000,
      "scale_by": { "buff_type": 2, "percent_per_point": 10, "snapshot": true },
      "precondition": { "buff_type": 3, "minimum": 1 }
    }
  ]
}"#;

    #[test]
    fn test_parse_toml_templates() {
        let mut registry = TemplateRegistry::new();
        let ids = parse_toml_templates(TOML, &mut registry).unwrap();
        assert_eq!(ids, vec![TemplateId(0), TemplateId(1), TemplateId(2)]);

        let ignite = registry.find("ignite").unwrap();
        assert_eq!(ignite.kind, EffectKind::DamageOverTime);
        assert_eq!(ignite.stack_rule(), StackRule::Refresh);
        assert_eq!(ignite.damage_type, DamageType::Fire);
        assert_eq!(ignite.crit_mode, CritMode::PerApplication);
        assert_eq!(ignite.children[0].template, TemplateId(1));
        assert_eq!(ignite.children[0].delay, 250);

        let fury = registry.find("fury").unwrap();
        assert_eq!(fury.buff_type, BuffType(0));
        assert_eq!(fury.stack_rule(), StackRule::Add);
        assert!(fury.scale_by.unwrap().snapshot);
        assert_eq!(fury.precondition.unwrap().buff_type, BuffType(3));
    }

    #[test]
    fn test_toml_and_json_agree() {
        let mut from_toml = TemplateRegistry::new();
        let mut from_json = TemplateRegistry::new();
        parse_toml_templates(TOML, &mut from_toml).unwrap();
        parse_json_templates(JSON, &mut from_json).unwrap();
        let a: Vec<_> = from_toml.iter().cloned().collect();
        let b: Vec<_> = from_json.iter().cloned().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_bad_entry_rejects_whole_file() {
        let toml = r#"
[[effect]]
name = "fine"
kind = "dot"
magnitude = 1

[[effect]]
name = "broken"
kind = "dot"
magnitude = 1
stack_rule = "sometimes"
"#;
        let mut registry = TemplateRegistry::new();
        let err = parse_toml_templates(toml, &mut registry).unwrap_err();
        assert!(matches!(err, ConfigError::Template(EffectError::InvalidTemplate(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unknown_child_and_duplicates() {
        let mut registry = TemplateRegistry::new();
        let toml = r#"
[[effect]]
name = "a"
kind = "aura"
magnitude = 1
children = [{ effect = "nowhere" }]
"#;
        assert!(parse_toml_templates(toml, &mut registry).is_err());

        let toml = r#"
[[effect]]
name = "a"
kind = "aura"
magnitude = 1

[[effect]]
name = "a"
kind = "aura"
magnitude = 2
"#;
        assert!(matches!(
            parse_toml_templates(toml, &mut registry),
            Err(ConfigError::Validation(_))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_stat_buff_needs_type() {
        let mut registry = TemplateRegistry::new();
        let json = r#"{"effect": [{"name": "x", "kind": "buff", "magnitude": 1}]}"#;
        assert!(parse_json_templates(json, &mut registry).is_err());
    }

    #[test]
    fn test_children_reference_registered_effects() {
        let mut registry = TemplateRegistry::new();
        parse_toml_templates(TOML, &mut registry).unwrap();
        let toml = r#"
[[effect]]
name = "finisher"
kind = "dot"
magnitude = 30
children = [{ effect = "ignite", delay_ms = 0 }]
"#;
        let ids = parse_toml_templates(toml, &mut registry).unwrap();
        assert_eq!(ids, vec![TemplateId(3)]);
        assert_eq!(registry.get(TemplateId(3)).unwrap().children[0].template, TemplateId(0));
    }

    #[test]
    fn test_load_templates_from_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let toml_path = dir.path().join("effects.toml");
        let json_path = dir.path().join("effects.json");
        std::fs::write(&toml_path, TOML).unwrap();
        std::fs::write(&json_path, JSON).unwrap();

        let mut registry = TemplateRegistry::new();
        assert_eq!(load_templates(&toml_path, &mut registry).unwrap().len(), 3);
        let mut registry = TemplateRegistry::new();
        assert_eq!(load_templates(&json_path, &mut registry).unwrap().len(), 3);
    }
}
