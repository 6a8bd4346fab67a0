// Prompt building

use crate::config::SeriesConfig;
use crate::driver::TranslationRequest;
use crate::unit::WorkUnit;

/// Renders translation requests for one series
///
/// Glossary and instructions are passed through verbatim; their format is
/// whatever the catalog author wrote.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    system_prompt: String,
}

impl PromptBuilder {
    pub fn new(series: &SeriesConfig) -> Self {
        Self {
            system_prompt: render_system_prompt(series),
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Request for one unit's cleaned source text
    pub fn build(&self, unit: &WorkUnit, source_text: &str) -> TranslationRequest {
        TranslationRequest {
            unit: unit.label(),
            system_prompt: self.system_prompt.clone(),
            user_prompt: source_text.to_string(),
        }
    }
}

fn render_system_prompt(series: &SeriesConfig) -> String {
    let mut prompt = format!(
        "You are a professional literary translator. Translate the following {source} web novel chapter into natural, fluent {target}.\n\
         Preserve paragraph breaks, dialogue and honorifics' meaning. Output only the translated text with no commentary, notes or headings.",
        source = series.source_language,
        target = series.target_language,
    );

    if let Some(title) = series.title.as_deref().filter(|t| !t.trim().is_empty()) {
        prompt.push_str(&format!("\n\nSeries: {}", title.trim()));
    }
    if let Some(instructions) = series.instructions.as_deref().filter(|t| !t.trim().is_empty()) {
        prompt.push_str("\n\nAdditional instructions:\n");
        prompt.push_str(instructions.trim_end());
    }
    if let Some(glossary) = series.glossary.as_deref().filter(|t| !t.trim().is_empty()) {
        prompt.push_str("\n\nUse these term translations consistently:\n");
        prompt.push_str(glossary.trim_end());
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_prompt() {
        let series = SeriesConfig::new("novel");
        let builder = PromptBuilder::new(&series);

        assert!(builder.system_prompt().contains("Korean web novel"));
        assert!(builder.system_prompt().contains("fluent English"));
        assert!(!builder.system_prompt().contains("Additional instructions"));
        assert!(!builder.system_prompt().contains("term translations"));
    }

    #[test]
    fn test_glossary_and_instructions_verbatim() {
        let series = SeriesConfig::new("novel")
            .with_glossary("헌터 = Hunter\n게이트 = Gate\n")
            .with_instructions("Keep sound effects untranslated.");
        let builder = PromptBuilder::new(&series);
        let unit = WorkUnit::new("novel", "chapter-7", "/in/novel/chapter-7.txt");

        let request = builder.build(&unit, "본문");
        assert_eq!(request.unit, "novel/chapter-7");
        assert_eq!(request.user_prompt, "본문");
        assert!(request
            .system_prompt
            .ends_with("Use these term translations consistently:\n헌터 = Hunter\n게이트 = Gate"));
        assert!(request
            .system_prompt
            .contains("Additional instructions:\nKeep sound effects untranslated."));
    }
}
