//! Style resolution with fallback.
//!
//! A role the template does not define borrows the rule of its nearest
//! defined neighbour; when the whole chain is empty the hard default
//! (12pt Times New Roman) applies. Generation never fails for lack of
//! style data.

use std::collections::BTreeMap;

use crate::model::{NormalizedTemplateModel, StyleRole, StyleRule};

/// Roles tried, in order, when a role has no rule of its own.
pub fn fallback_chain(role: StyleRole) -> &'static [StyleRole] {
    use StyleRole::*;
    match role {
        Heading3 => &[Heading2, Heading1, Body],
        Heading2 => &[Heading1, Body],
        Heading1 => &[Body],
        Body => &[],
        ListItem => &[Body],
        TableCell => &[Body],
        TableHeader => &[TableCell, Body],
    }
}

/// Where a resolved rule came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleSource {
    /// The template defines the role
    Own,
    /// Borrowed from another role
    Fallback(StyleRole),
    /// Nothing in the chain is defined
    HardDefault,
}

/// Every role resolved against one model.
#[derive(Debug, Clone)]
pub struct StyleSheet {
    rules: BTreeMap<StyleRole, (StyleRule, RuleSource)>,
}

impl StyleSheet {
    /// Resolve all roles of a model.
    pub fn from_model(model: &NormalizedTemplateModel) -> Self {
        let rules = StyleRole::ALL
            .iter()
            .map(|&role| (role, resolve(model, role)))
            .collect();
        Self { rules }
    }

    /// Rule for a role.
    pub fn rule(&self, role: StyleRole) -> &StyleRule {
        // every role is resolved in `from_model`
        &self.rules[&role].0
    }

    /// Where the rule for a role came from.
    pub fn source(&self, role: StyleRole) -> RuleSource {
        self.rules[&role].1
    }

    /// Describe a borrowed rule, for warnings. `None` for own rules.
    pub fn describe_fallback(&self, role: StyleRole) -> Option<String> {
        match self.source(role) {
            RuleSource::Own => None,
            RuleSource::Fallback(from) => Some(format!("no {} style; using {}", role, from)),
            RuleSource::HardDefault => Some(format!(
                "no {} style; using the default {}pt {}",
                role,
                self.rule(role).size,
                self.rule(role).font_family
            )),
        }
    }
}

fn resolve(model: &NormalizedTemplateModel, role: StyleRole) -> (StyleRule, RuleSource) {
    if let Some(rule) = model.style(role) {
        return (rule.clone(), RuleSource::Own);
    }
    for &neighbour in fallback_chain(role) {
        if let Some(rule) = model.style(neighbour) {
            return (rule.clone(), RuleSource::Fallback(neighbour));
        }
    }
    (StyleRule::hard_default(), RuleSource::HardDefault)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PageSetup;

    fn model_with(roles: &[(StyleRole, f32)]) -> NormalizedTemplateModel {
        let mut model = NormalizedTemplateModel::new(PageSetup::letter());
        for (role, size) in roles {
            model.observe_font("Arial", *size);
            model.set_style(*role, StyleRule::new("Arial", *size));
        }
        model
    }

    #[test]
    fn test_table_cell_falls_back_to_body() {
        let sheet = StyleSheet::from_model(&model_with(&[(StyleRole::Body, 10.0)]));
        assert_eq!(sheet.rule(StyleRole::TableCell).size, 10.0);
        assert_eq!(sheet.source(StyleRole::TableCell), RuleSource::Fallback(StyleRole::Body));
        assert_eq!(sheet.source(StyleRole::TableHeader), RuleSource::Fallback(StyleRole::Body));
        assert_eq!(sheet.source(StyleRole::Body), RuleSource::Own);
    }

    #[test]
    fn test_heading_chain() {
        let sheet = StyleSheet::from_model(&model_with(&[
            (StyleRole::Heading1, 20.0),
            (StyleRole::Body, 10.0),
        ]));
        assert_eq!(sheet.rule(StyleRole::Heading3).size, 20.0);
        assert_eq!(sheet.source(StyleRole::Heading2), RuleSource::Fallback(StyleRole::Heading1));
    }

    #[test]
    fn test_header_cell_prefers_table_cell() {
        let sheet = StyleSheet::from_model(&model_with(&[
            (StyleRole::TableCell, 9.0),
            (StyleRole::Body, 10.0),
        ]));
        assert_eq!(sheet.rule(StyleRole::TableHeader).size, 9.0);
    }

    #[test]
    fn test_empty_model_uses_hard_default() {
        let sheet = StyleSheet::from_model(&model_with(&[]));
        let rule = sheet.rule(StyleRole::Heading1);
        assert_eq!(rule.size, 12.0);
        assert!(!rule.bold);
        assert_eq!(rule.font_family, "Times New Roman");
        assert_eq!(sheet.source(StyleRole::Heading1), RuleSource::HardDefault);
        assert!(sheet
            .describe_fallback(StyleRole::Heading1)
            .unwrap()
            .contains("Times New Roman"));
    }
}
