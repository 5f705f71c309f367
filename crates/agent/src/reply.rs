//! WhatsApp-flavoured plain-text rendering of an advisory.

use krishi_core::{Advisory, Language, Priority};

/// WhatsApp truncates long messages; keep replies under this many characters.
pub const MAX_REPLY_CHARS: usize = 4_000;

const CLARIFICATION: &str = "I could not tell which language you wrote in. Please reply in Hindi \
                             or English and mention your crop and district. / कृपया हिंदी या \
                             अंग्रेज़ी में अपनी फसल और ज़िला बताएं।";

/// The user-facing text of one advisory item, before or after translation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemText {
    pub priority: Priority,
    pub headline: String,
    pub details: Vec<String>,
}

impl ItemText {
    /// Headline followed by details.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.headline.as_str()).chain(self.details.iter().map(String::as_str))
    }
}

pub fn item_texts(advisory: &Advisory) -> Vec<ItemText> {
    advisory
        .items()
        .iter()
        .map(|item| ItemText {
            priority: item.priority,
            headline: item.headline.clone(),
            details: item.details.clone(),
        })
        .collect()
}

fn priority_marker(priority: Priority) -> &'static str {
    match priority {
        Priority::Critical => "🚨",
        Priority::Recommended => "✅",
        Priority::Informational => "ℹ️",
    }
}

fn title(language: Language) -> &'static str {
    match language {
        Language::Hindi => "🌾 *कृषि सलाह*",
        _ => "🌾 *Krishi Advisory*",
    }
}

pub fn render_reply(advisory: &Advisory, items: &[ItemText]) -> String {
    let mut sections = vec![title(advisory.language()).to_string()];

    let context: Vec<String> = advisory
        .region()
        .map(|region| region.display_name())
        .into_iter()
        .chain(advisory.crop().map(|crop| crop.display_name().to_string()))
        .collect();
    if !context.is_empty() {
        sections.push(format!("📍 {}", context.join(" · ")));
    }

    for item in items {
        let mut block = format!("{} *{}*", priority_marker(item.priority), item.headline);
        for detail in &item.details {
            block.push_str("\n• ");
            block.push_str(detail);
        }
        sections.push(block);
    }

    if advisory.needs_clarification() {
        sections.push(format!("_{CLARIFICATION}_"));
    }

    truncate(sections.join("\n\n"))
}

fn truncate(reply: String) -> String {
    if reply.chars().count() <= MAX_REPLY_CHARS {
        return reply;
    }
    let mut shortened: String = reply.chars().take(MAX_REPLY_CHARS - 1).collect();
    shortened.push('…');
    shortened
}
