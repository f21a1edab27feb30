//! Effect template registry

mod types;

pub use types::{ChildEffect, EffectTemplate, Precondition, ScaleBy, MAX_CHILDREN};

use crate::types::{EffectKind, StackRule, TemplateId};
use crate::EffectError;

/// Append-only table of immutable effect templates
#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    templates: Vec<EffectTemplate>,
    min_aura_radius: f32,
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        TemplateRegistry {
            templates: Vec::new(),
            min_aura_radius: 1.5,
        }
    }

    /// Radius given to auras registered without one
    pub fn with_min_aura_radius(mut self, radius: f32) -> Self {
        self.min_aura_radius = radius;
        self
    }

    /// Validate, normalize and store a template, returning its sequential id
    pub fn register(&mut self, template: EffectTemplate) -> Result<TemplateId, EffectError> {
        let mut template = template;
        validate(&template)?;

        let id = TemplateId(self.templates.len() as u32);
        template.id = id;

        if template.stack_rule.is_none() {
            template.stack_rule = Some(StackRule::Add);
        }
        match template.kind {
            EffectKind::StatBuff => {}
            EffectKind::DamageOverTime => {
                template.debuff.get_or_insert(true);
            }
            EffectKind::Aura => {
                let positive = template.magnitude > 0;
                template.debuff.get_or_insert(positive);
                if template.radius <= 0.0 {
                    template.radius = self.min_aura_radius;
                }
            }
        }

        self.templates.push(template);
        Ok(id)
    }

    /// Get a template by id
    pub fn get(&self, id: TemplateId) -> Option<&EffectTemplate> {
        self.templates.get(id.index())
    }

    /// Look up the first template registered under `name`
    pub fn find(&self, name: &str) -> Option<&EffectTemplate> {
        self.templates.iter().find(|t| t.name == name)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Id the next registration will receive
    pub fn next_id(&self) -> TemplateId {
        TemplateId(self.templates.len() as u32)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EffectTemplate> {
        self.templates.iter()
    }

    /// Drop every template. Only valid between simulations.
    pub fn reset(&mut self) {
        self.templates.clear();
    }
}

/// Reject templates whose fields cannot describe a runnable effect
pub fn validate(template: &EffectTemplate) -> Result<(), EffectError> {
    let invalid = |msg: String| Err(EffectError::InvalidTemplate(msg));

    if template.crit_chance > 100 {
        return invalid(format!(
            "'{}': crit_chance {} exceeds 100",
            template.name, template.crit_chance
        ));
    }
    if !template.radius.is_finite() || template.radius < 0.0 {
        return invalid(format!("'{}': radius must be finite and non-negative", template.name));
    }
    if template.children.len() > MAX_CHILDREN {
        return invalid(format!(
            "'{}': {} children exceeds the limit of {}",
            template.name,
            template.children.len(),
            MAX_CHILDREN
        ));
    }
    if template.kind != EffectKind::Aura && template.exclusivity_group_mask != 0 {
        return invalid(format!(
            "'{}': exclusivity groups only apply to auras",
            template.name
        ));
    }
    Ok(())
}
