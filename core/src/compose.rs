// core/src/compose.rs
use crate::mapping::{Mapping, MappingSelector};
use crate::theme::{DirectConfig, Theme};
use crate::validator::RepositoryValidator;
use serde::Serialize;
use std::fmt::Write;

pub const CLIENT_SCRIPT_URL: &str = "https://giscus.app/client.js";

pub const REPO_PLACEHOLDER: &str = "[ENTER REPO HERE]";
pub const REPO_ID_PLACEHOLDER: &str = "[ENTER REPO ID HERE]";
pub const CATEGORY_ID_PLACEHOLDER: &str = "[ENTER CATEGORY ID HERE]";
pub const TERM_PLACEHOLDER: &str = "[ENTER TERM HERE]";

/// Everything the embed snippet is rendered from. Derived on demand, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedConfiguration {
    pub repository: String,
    pub repository_id: String,
    pub category_id: String,
    pub mapping: Mapping,
    pub term: String,
    pub theme: Theme,
    pub reactions_enabled: bool,
}

/// Derives the embed configuration from the current validator, mapping and
/// toggle state.
pub fn compose(
    validator: &RepositoryValidator,
    mapping: &MappingSelector,
    direct: &DirectConfig,
) -> EmbedConfiguration {
    EmbedConfiguration {
        repository: validator.repository().to_string(),
        repository_id: validator.repository_id().to_string(),
        category_id: validator.category_id().to_string(),
        mapping: mapping.mapping(),
        // a term stored under another mapping is never emitted
        term: if mapping.requires_term() {
            mapping.term().to_string()
        } else {
            String::new()
        },
        theme: direct.theme,
        reactions_enabled: direct.reactions_enabled,
    }
}

impl EmbedConfiguration {
    /// True once every field the snippet needs has a real value.
    pub fn is_complete(&self) -> bool {
        !self.repository.is_empty()
            && !self.repository_id.is_empty()
            && !self.category_id.is_empty()
            && (!self.mapping.requires_term() || !self.term.is_empty())
    }

    /// Renders the `<script>` tag users paste into their page. Missing values
    /// show up as placeholders so the tag is always complete.
    pub fn render_snippet(&self) -> String {
        let mut out = String::new();
        let mut attr = |name: &str, value: &str| {
            let _ = writeln!(
                out,
                "        {}=\"{}\"",
                name,
                html_escape::encode_double_quoted_attribute(value)
            );
        };

        attr("data-repo", or_placeholder(&self.repository, REPO_PLACEHOLDER));
        attr("data-repo-id", or_placeholder(&self.repository_id, REPO_ID_PLACEHOLDER));
        attr("data-category-id", or_placeholder(&self.category_id, CATEGORY_ID_PLACEHOLDER));
        attr("data-mapping", self.mapping.as_str());
        if self.mapping.requires_term() {
            attr("data-term", or_placeholder(&self.term, TERM_PLACEHOLDER));
        }
        attr("data-reactions-enabled", if self.reactions_enabled { "1" } else { "0" });
        attr("data-theme", self.theme.as_str());

        format!(
            "<script src=\"{CLIENT_SCRIPT_URL}\"\n{out}        crossorigin=\"anonymous\"\n        async>\n</script>\n"
        )
    }
}

fn or_placeholder<'a>(value: &'a str, placeholder: &'a str) -> &'a str {
    if value.is_empty() {
        placeholder
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::{Category, RepositoryInfo};

    fn validated(repo: &str) -> RepositoryValidator {
        let mut validator = RepositoryValidator::new();
        let ticket = validator.submit(repo).unwrap();
        validator.resolve(
            &ticket,
            Ok(RepositoryInfo {
                repository_id: "R_1".to_string(),
                categories: vec![Category {
                    id: "C_1".to_string(),
                    emoji: "💬".to_string(),
                    name: "General".to_string(),
                }],
            }),
        );
        validator
    }

    #[test]
    fn test_all_placeholders_when_empty() {
        let mut mapping = MappingSelector::new();
        mapping.set_mapping(Mapping::Specific);
        let config = compose(&RepositoryValidator::new(), &mapping, &DirectConfig::default());
        let snippet = config.render_snippet();

        assert!(snippet.contains(&format!("data-repo=\"{REPO_PLACEHOLDER}\"")));
        assert!(snippet.contains(&format!("data-repo-id=\"{REPO_ID_PLACEHOLDER}\"")));
        assert!(snippet.contains(&format!("data-category-id=\"{CATEGORY_ID_PLACEHOLDER}\"")));
        assert!(snippet.contains(&format!("data-term=\"{TERM_PLACEHOLDER}\"")));
        assert!(!snippet.contains("=\"\""));
        assert!(!config.is_complete());
    }

    #[test]
    fn test_term_line_only_for_term_mappings() {
        let validator = validated("octo/demo");
        let mut mapping = MappingSelector::new();

        for choice in Mapping::ALL {
            mapping.set_mapping(choice);
            let snippet = compose(&validator, &mapping, &DirectConfig::default()).render_snippet();
            assert_eq!(snippet.contains("data-term="), choice.requires_term(), "{choice}");
        }

        mapping.set_mapping(Mapping::Number);
        mapping.set_term("42");
        let snippet = compose(&validator, &mapping, &DirectConfig::default()).render_snippet();
        assert!(snippet.contains("data-term=\"42\""));
    }

    #[test]
    fn test_term_ignored_outside_term_mappings() {
        let mut mapping = MappingSelector::new();
        mapping.set_term("stray");
        let config = compose(&RepositoryValidator::new(), &mapping, &DirectConfig::default());
        assert_eq!(config.term, "");
    }

    #[test]
    fn test_reactions_render_as_digits() {
        let validator = validated("octo/demo");
        let mapping = MappingSelector::new();
        let mut direct = DirectConfig::default();

        let on = compose(&validator, &mapping, &direct).render_snippet();
        assert!(on.contains("data-reactions-enabled=\"1\""));

        direct.reactions_enabled = false;
        let off = compose(&validator, &mapping, &direct).render_snippet();
        assert!(off.contains("data-reactions-enabled=\"0\""));
    }

    #[test]
    fn test_attribute_order() {
        let mut validator = validated("octo/demo");
        validator.select_category("C_1").unwrap();
        let mut mapping = MappingSelector::new();
        mapping.set_mapping(Mapping::Specific);
        mapping.set_term("intro");
        let direct = DirectConfig {
            theme: Theme::DarkDimmed,
            reactions_enabled: true,
        };

        let snippet = compose(&validator, &mapping, &direct).render_snippet();
        let order = [
            "<script src=",
            "data-repo=",
            "data-repo-id=",
            "data-category-id=",
            "data-mapping=",
            "data-term=",
            "data-reactions-enabled=",
            "data-theme=\"dark_dimmed\"",
            "crossorigin=\"anonymous\"",
            "async>",
            "</script>",
        ];
        let positions: Vec<_> = order.iter().map(|needle| snippet.find(needle).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{snippet}");
    }

    #[test]
    fn test_values_are_escaped() {
        let mut validator = RepositoryValidator::new();
        validator.submit("octo/\"demo\"");
        let mut mapping = MappingSelector::new();
        mapping.set_mapping(Mapping::Specific);
        mapping.set_term("a \"quoted\" term");

        let snippet = compose(&validator, &mapping, &DirectConfig::default()).render_snippet();
        assert!(snippet.contains("data-repo=\"octo/&quot;demo&quot;\""));
        assert!(snippet.contains("data-term=\"a &quot;quoted&quot; term\""));
    }

    #[test]
    fn test_compose_is_deterministic() {
        let validator = validated("octo/demo");
        let mapping = MappingSelector::new();
        let direct = DirectConfig::default();
        assert_eq!(
            compose(&validator, &mapping, &direct).render_snippet(),
            compose(&validator, &mapping, &direct).render_snippet()
        );
    }
}
