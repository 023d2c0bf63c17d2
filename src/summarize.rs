// src/summarize.rs
//! Turns a news item into a three-section summary via the inference endpoint.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{BotError, Result};
use crate::feed::types::NewsItem;
use crate::inference::DynInference;

pub const MAX_TITLE_WORDS: usize = 15;
pub const MAX_SUMMARY_LINES: usize = 5;
pub const MAX_COMMENTARY_LINES: usize = 8;

const TEMPLATE: &str = "Analiza la siguiente noticia y responde separando claramente tres secciones, en español:\n\
1. TÍTULO: Un titular corto (máx 15 palabras) que resuma lo más importante.\n\
2. RESUMEN: Qué ha pasado, explicado brevemente (máx 5 líneas).\n\
3. COMENTARIO: Breve análisis del impacto, posibles consecuencias o contexto adicional (máx 8 líneas).\n\n\
Noticia original:\n\"\"\"\n{news}\n\"\"\"";

// Matches "TÍTULO:", "1. **Resumen**:", "COMMENTARY -" and similar headers at line start.
static RE_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?im)^[ \t>#]*(?:\d+\s*[\.\)]\s*)?[*_]*\s*(t[íi]tulo|title|resumen|summary|comentario|commentary)\s*[*_]*\s*[:\-–]\s*[*_]*",
    )
    .expect("header regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Title,
    Summary,
    Commentary,
}

impl Section {
    fn from_label(label: &str) -> Self {
        match label.to_lowercase().as_str() {
            "resumen" | "summary" => Section::Summary,
            "comentario" | "commentary" => Section::Commentary,
            _ => Section::Title,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryText {
    pub title: String,
    pub summary: String,
    pub commentary: String,
}

impl SummaryText {
    /// Parse a model reply. All three sections must be present and non-empty.
    pub fn parse(reply: &str) -> Result<Self> {
        let headers: Vec<(Section, usize, usize)> = RE_HEADER
            .captures_iter(reply)
            .filter_map(|c| {
                let whole = c.get(0)?;
                Some((Section::from_label(c.get(1)?.as_str()), whole.start(), whole.end()))
            })
            .collect();

        let mut title = None;
        let mut summary = None;
        let mut commentary = None;
        for (i, (section, _, body_start)) in headers.iter().enumerate() {
            let body_end = headers.get(i + 1).map(|h| h.1).unwrap_or(reply.len());
            let body = reply[*body_start..body_end].trim();
            if body.is_empty() {
                continue;
            }
            let slot = match section {
                Section::Title => &mut title,
                Section::Summary => &mut summary,
                Section::Commentary => &mut commentary,
            };
            slot.get_or_insert_with(|| body.to_string());
        }

        match (title, summary, commentary) {
            (Some(t), Some(s), Some(c)) => Ok(Self {
                title: cap_words(&strip_decoration(&t), MAX_TITLE_WORDS),
                summary: cap_lines(&s, MAX_SUMMARY_LINES),
                commentary: cap_lines(&c, MAX_COMMENTARY_LINES),
            }),
            (t, s, c) => {
                let missing: Vec<&str> = [
                    ("title", t.is_none()),
                    ("summary", s.is_none()),
                    ("commentary", c.is_none()),
                ]
                .into_iter()
                .filter_map(|(name, miss)| miss.then_some(name))
                .collect();
                Err(BotError::malformed(format!(
                    "reply lacks sections: {}",
                    missing.join(", ")
                )))
            }
        }
    }
}

/// Title loses wrapping quotes/markers and is kept to one line.
fn strip_decoration(s: &str) -> String {
    let first_line = s.lines().next().unwrap_or_default();
    first_line
        .trim()
        .trim_matches(|c: char| matches!(c, '"' | '*' | '_' | '“' | '”'))
        .trim()
        .to_string()
}

fn cap_words(s: &str, max: usize) -> String {
    s.split_whitespace().take(max).collect::<Vec<_>>().join(" ")
}

fn cap_lines(s: &str, max: usize) -> String {
    s.lines()
        .map(str::trim_end)
        .filter(|l| !l.trim().is_empty())
        .take(max)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_prompt(item: &NewsItem) -> String {
    TEMPLATE.replace("{news}", &item.prompt_text())
}

pub struct Summarizer {
    client: DynInference,
}

impl Summarizer {
    pub fn new(client: DynInference) -> Self {
        Self { client }
    }

    pub async fn summarize(&self, item: &NewsItem) -> Result<SummaryText> {
        let reply = self.client.complete(&build_prompt(item)).await?;
        SummaryText::parse(&reply).inspect_err(|e| {
            tracing::warn!(error = %e, link = %item.link, "summary rejected");
        })
    }
}
