//! Prompt Builder
//!
//! Section-based prompt construction shared by the image transform and the
//! two listing paths, plus the templates for each.

use std::collections::BTreeMap;

/// Prompt section types
#[derive(Debug, Clone)]
pub enum PromptSection {
    /// Role definition with expertise area
    Role { expertise: String, task: String },
    /// Numbered objectives
    Objectives(Vec<String>),
    /// Key-value facts, rendered in key order
    Facts(BTreeMap<String, String>),
    /// Raw text section with optional header
    Text {
        header: Option<String>,
        content: String,
    },
    /// Hard restrictions
    Focus {
        target: String,
        restrictions: Vec<String>,
    },
}

/// Prompt builder for consistent prompt construction
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    sections: Vec<PromptSection>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a role definition section
    pub fn role(mut self, expertise: &str, task: &str) -> Self {
        self.sections.push(PromptSection::Role {
            expertise: expertise.to_string(),
            task: task.to_string(),
        });
        self
    }

    /// Add objectives section
    pub fn objectives(mut self, objectives: Vec<&str>) -> Self {
        self.sections.push(PromptSection::Objectives(
            objectives.into_iter().map(String::from).collect(),
        ));
        self
    }

    /// Add facts section; skipped when empty
    pub fn facts(mut self, facts: &BTreeMap<String, String>) -> Self {
        if !facts.is_empty() {
            self.sections.push(PromptSection::Facts(facts.clone()));
        }
        self
    }

    /// Add text section with header
    pub fn section(mut self, header: &str, content: &str) -> Self {
        self.sections.push(PromptSection::Text {
            header: Some(header.to_string()),
            content: content.to_string(),
        });
        self
    }

    /// Add text section
    pub fn text(mut self, content: &str) -> Self {
        self.sections.push(PromptSection::Text {
            header: None,
            content: content.to_string(),
        });
        self
    }

    /// Add focus enforcement section
    pub fn focus(mut self, target: &str, restrictions: Vec<&str>) -> Self {
        self.sections.push(PromptSection::Focus {
            target: target.to_string(),
            restrictions: restrictions.into_iter().map(String::from).collect(),
        });
        self
    }

    /// Build the final prompt string
    pub fn build(self) -> String {
        let mut prompt = String::new();

        for section in self.sections {
            match section {
                PromptSection::Role { expertise, task } => {
                    prompt.push_str("<ROLE>\n");
                    prompt.push_str(&format!(
                        "You are an expert {} specializing in {}.\n",
                        expertise, task
                    ));
                    prompt.push_str("</ROLE>\n\n");
                }
                PromptSection::Objectives(objectives) => {
                    prompt.push_str("<OBJECTIVES>\n");
                    for (i, obj) in objectives.iter().enumerate() {
                        prompt.push_str(&format!("{}. {}\n", i + 1, obj));
                    }
                    prompt.push_str("</OBJECTIVES>\n\n");
                }
                PromptSection::Facts(facts) => {
                    prompt.push_str("# Known Facts\n\n");
                    for (key, value) in facts {
                        prompt.push_str(&format!("**{}**: {}\n", key, value));
                    }
                    prompt.push('\n');
                }
                PromptSection::Text { header, content } => {
                    if let Some(h) = header {
                        prompt.push_str(&format!("# {}\n\n", h));
                    }
                    prompt.push_str(&content);
                    prompt.push_str("\n\n");
                }
                PromptSection::Focus {
                    target,
                    restrictions,
                } => {
                    prompt.push_str("<FOCUS>\n");
                    prompt.push_str(&format!("IMPORTANT: Focus EXCLUSIVELY on: {}\n", target));
                    for restriction in restrictions {
                        prompt.push_str(&format!("- {}\n", restriction));
                    }
                    prompt.push_str("</FOCUS>\n\n");
                }
            }
        }

        prompt.trim_end().to_string()
    }
}

const LISTING_SCHEMA: &str = r#"Respond ONLY with a JSON object:
{"title": "<max 80 chars>", "description": "<2-4 short paragraphs>", "analysis": "<condition, materials, notable details>"}"#;

/// Preset prompt templates for the pipeline
pub struct PromptTemplates;

impl PromptTemplates {
    /// Product photo cleanup for one source image
    pub fn image_transform() -> String {
        PromptBuilder::new()
            .role("product photographer", "marketplace listing photos")
            .objectives(vec![
                "Place the item on a clean, neutral studio background",
                "Keep the item's shape, color, texture and wear exactly as shown",
                "Use soft, even lighting without harsh shadows",
            ])
            .focus(
                "the item in the supplied photo",
                vec![
                    "Do NOT add props, text, logos or watermarks",
                    "Do NOT alter or repair the item itself",
                ],
            )
            .text("Return a single edited image.")
            .build()
    }

    /// Tool-enabled listing copy with market research
    pub fn augmented_listing(facts: &BTreeMap<String, String>) -> String {
        PromptBuilder::new()
            .role("resale copywriter", "second-hand marketplace listings")
            .objectives(vec![
                "Identify the item (brand, model, era) from the facts and photos",
                "Research comparable listings to ground the description",
                "Write a concise, accurate title and description",
            ])
            .facts(facts)
            .focus(
                "facts you can verify",
                vec!["Do NOT invent measurements, materials or provenance"],
            )
            .section("Output", LISTING_SCHEMA)
            .build()
    }

    /// Bare listing copy from local facts only
    pub fn quick_listing(facts: &BTreeMap<String, String>) -> String {
        PromptBuilder::new()
            .role("resale copywriter", "second-hand marketplace listings")
            .objectives(vec!["Write a concise, accurate title and description"])
            .facts(facts)
            .focus(
                "the known facts",
                vec!["Use ONLY the facts above", "Do NOT speculate about value"],
            )
            .section("Output", LISTING_SCHEMA)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_builder() {
        let prompt = PromptBuilder::new()
            .role("copywriter", "listings")
            .objectives(vec!["Goal 1", "Goal 2"])
            .build();

        assert!(prompt.contains("<ROLE>"));
        assert!(prompt.contains("expert copywriter"));
        assert!(prompt.contains("1. Goal 1"));
        assert!(prompt.contains("2. Goal 2"));
    }

    #[test]
    fn test_facts_rendered_in_key_order() {
        let facts = BTreeMap::from([
            ("size".to_string(), "M".to_string()),
            ("brand".to_string(), "Acme".to_string()),
        ]);
        let prompt = PromptTemplates::quick_listing(&facts);

        let brand = prompt.find("**brand**: Acme").unwrap();
        let size = prompt.find("**size**: M").unwrap();
        assert!(brand < size);
        assert!(prompt.contains("\"title\""));
    }

    #[test]
    fn test_empty_facts_section_omitted() {
        let prompt = PromptTemplates::augmented_listing(&BTreeMap::new());
        assert!(!prompt.contains("Known Facts"));
        assert!(prompt.contains("Research comparable listings"));
    }
}
