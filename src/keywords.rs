// src/keywords.rs
//! Keyword extraction for image prompts.
//!
//! Two strategies feed a [`CompositeExtractor`]:
//! - [`GazetteerMatcher`]: known people and brands found in the text (word-boundary, case-insensitive)
//! - [`LlmConcepts`]: free concepts asked from the language model
//!
//! The composite merges their output (entities first), drops case-insensitive duplicates while
//! keeping first-seen order, truncates to `k_max` and pads up to `k_min`.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::gazetteer::Gazetteer;
use crate::inference::DynInference;

/// Extra padding tokens used once the configured filler is taken.
const PADDING: &[&str] = &["tecnología", "innovación", "futuro", "datos"];

const STYLE_SUFFIX: &str = "stylized, highly detailed, concept art, without text.";

#[async_trait]
pub trait KeywordExtractor: Send + Sync {
    /// Candidate keywords in priority order. Never fails; an unusable source yields nothing.
    async fn extract(&self, text: &str) -> Vec<String>;
    fn name(&self) -> &'static str;
}

/// Matches gazetteer entries against the text.
pub struct GazetteerMatcher {
    patterns: Vec<(String, Regex)>,
}

impl GazetteerMatcher {
    pub fn new(gazetteer: &Gazetteer) -> Self {
        let patterns = gazetteer
            .entries()
            .filter_map(|name| {
                Regex::new(&format!(r"(?i)(?:^|\W){}(?:\W|$)", regex::escape(name)))
                    .ok()
                    .map(|re| (name.to_string(), re))
            })
            .collect();
        Self { patterns }
    }

    /// Entities ordered by where they first appear in `text`.
    pub fn find(&self, text: &str) -> Vec<String> {
        let mut hits: Vec<(usize, &str)> = self
            .patterns
            .iter()
            .filter_map(|(name, re)| re.find(text).map(|m| (m.start(), name.as_str())))
            .collect();
        hits.sort_by_key(|(pos, _)| *pos);
        hits.into_iter().map(|(_, n)| n.to_string()).collect()
    }
}

#[async_trait]
impl KeywordExtractor for GazetteerMatcher {
    async fn extract(&self, text: &str) -> Vec<String> {
        self.find(text)
    }

    fn name(&self) -> &'static str {
        "gazetteer"
    }
}

/// Asks the model for `count` comma-separated keywords.
pub struct LlmConcepts {
    client: DynInference,
    count: usize,
}

impl LlmConcepts {
    pub fn new(client: DynInference, count: usize) -> Self {
        Self {
            client,
            count: count.max(1),
        }
    }

    fn prompt(&self, text: &str) -> String {
        format!(
            "Extrae exactamente {n} palabras clave separadas por comas del siguiente texto. \
             Responde solo con las {n} palabras clave, sin numeración ni explicaciones.\n\n\
             Texto:\n{text}",
            n = self.count
        )
    }
}

#[async_trait]
impl KeywordExtractor for LlmConcepts {
    async fn extract(&self, text: &str) -> Vec<String> {
        match self.client.complete(&self.prompt(text)).await {
            Ok(reply) => clean_llm_keywords(&reply),
            Err(e) => {
                tracing::warn!(error = %e, "keyword extraction failed; using entities only");
                Vec::new()
            }
        }
    }

    fn name(&self) -> &'static str {
        "llm"
    }
}

/// Split a model reply into keywords. Numbering, bullets, quotes and heading lines are dropped.
pub fn clean_llm_keywords(reply: &str) -> Vec<String> {
    static RE_PREFIX: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^\s*(?:\d+\s*[\.\)\-:]|[-*•·])\s*").expect("prefix regex"));
    static RE_HEADING: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)^\s*(?:palabras\s+clave|keywords|aquí|here)\b[^:]*:\s*")
            .expect("heading regex")
    });

    reply
        .lines()
        .map(|line| RE_HEADING.replace(line, "").into_owned())
        .filter(|line| !line.trim_end().ends_with(':'))
        .flat_map(|line| {
            line.split([',', ';'])
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .map(|kw| {
            RE_PREFIX
                .replace(&kw, "")
                .trim()
                .trim_matches(|c: char| matches!(c, '"' | '\'' | '*' | '“' | '”' | '.' | '`'))
                .trim()
                .to_string()
        })
        .filter(|kw| !kw.is_empty() && !kw.ends_with(':') && kw.split_whitespace().count() <= 4)
        .collect()
}

/// Deduplicate (case-insensitive, first seen wins), truncate to `k_max`, pad to `k_min`.
pub fn finalize_keywords(
    candidates: impl IntoIterator<Item = String>,
    k_min: usize,
    k_max: usize,
    filler: &str,
) -> Vec<String> {
    let k_min = k_min.min(k_max);
    let mut seen = HashSet::new();
    let mut out: Vec<String> = candidates
        .into_iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty() && seen.insert(c.to_lowercase()))
        .take(k_max)
        .collect();

    let mut extra = 2usize;
    let mut pads = std::iter::once(filler.to_string())
        .chain(PADDING.iter().map(|s| s.to_string()))
        .chain(std::iter::from_fn(|| {
            let next = format!("{filler} {extra}");
            extra += 1;
            Some(next)
        }));
    while out.len() < k_min {
        let Some(pad) = pads.next() else { break };
        if seen.insert(pad.to_lowercase()) {
            out.push(pad);
        }
    }
    out
}

/// Runs several extractors in order and applies the keyword policy to their combined output.
pub struct CompositeExtractor {
    strategies: Vec<Arc<dyn KeywordExtractor>>,
    k_min: usize,
    k_max: usize,
    filler: String,
}

impl CompositeExtractor {
    pub fn new(k_max: usize, filler: impl Into<String>) -> Self {
        Self {
            strategies: Vec::new(),
            k_min: k_max,
            k_max,
            filler: filler.into(),
        }
    }

    pub fn with_min(mut self, k_min: usize) -> Self {
        self.k_min = k_min;
        self
    }

    pub fn with(mut self, strategy: Arc<dyn KeywordExtractor>) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// Gazetteer entities first, then model concepts.
    pub fn standard(
        gazetteer: &Gazetteer,
        client: DynInference,
        k_max: usize,
        filler: &str,
    ) -> Self {
        Self::new(k_max, filler)
            .with(Arc::new(GazetteerMatcher::new(gazetteer)))
            .with(Arc::new(LlmConcepts::new(client, k_max)))
    }

    pub async fn extract_keywords(&self, text: &str) -> Vec<String> {
        let mut candidates = Vec::new();
        for s in &self.strategies {
            let found = s.extract(text).await;
            tracing::debug!(strategy = s.name(), count = found.len(), "keywords");
            candidates.extend(found);
        }
        finalize_keywords(candidates, self.k_min, self.k_max, &self.filler)
    }
}

#[async_trait]
impl KeywordExtractor for CompositeExtractor {
    async fn extract(&self, text: &str) -> Vec<String> {
        self.extract_keywords(text).await
    }

    fn name(&self) -> &'static str {
        "composite"
    }
}

/// Image prompt: people go to "with", brands to "branding of", everything else to "themes of".
/// The first brand with a gazetteer visual adds that scene as "featuring".
pub fn build_image_prompt(keywords: &[String], gazetteer: &Gazetteer) -> String {
    let mut people = Vec::new();
    let mut brands = Vec::new();
    let mut themes = Vec::new();
    for kw in keywords {
        if gazetteer.is_person(kw) {
            people.push(kw.as_str());
        } else if gazetteer.is_brand(kw) {
            brands.push(kw.as_str());
        } else {
            themes.push(kw.as_str());
        }
    }
    if themes.is_empty() {
        themes.push("artificial intelligence");
    }

    let mut prompt = format!(
        "A cinematic digital painting featuring themes of {}",
        themes.join(", ")
    );
    if !people.is_empty() {
        prompt.push_str(&format!(", with {}", people.join(", ")));
    }
    if !brands.is_empty() {
        prompt.push_str(&format!(", and branding of {}", brands.join(", ")));
        if let Some(scene) = brands.iter().find_map(|b| gazetteer.visual(b)) {
            prompt.push_str(&format!(", featuring {scene}"));
        }
    }
    prompt.push_str(", ");
    prompt.push_str(STYLE_SUFFIX);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::MockInference;

    fn s(v: &[&str]) -> Vec<String> {
        v.iter().map(|x| x.to_string()).collect()
    }

    #[test]
    fn finalize_dedups_and_truncates() {
        let raw = s(&["OpenAI", "agents", "openai", "AGENTS", "robots", "a", "b", "c"]);
        let out = finalize_keywords(raw, 5, 5, "IA");
        assert_eq!(out, s(&["OpenAI", "agents", "robots", "a", "b"]));
    }

    #[test]
    fn finalize_pads_with_distinct_tokens() {
        let out = finalize_keywords(s(&["ia"]), 5, 5, "IA");
        assert_eq!(out, s(&["ia", "tecnología", "innovación", "futuro", "datos"]));

        let out = finalize_keywords(Vec::new(), 7, 7, "IA");
        assert_eq!(out.len(), 7);
        assert_eq!(out[0], "IA");
        assert_eq!(out[6], "IA 3");
    }

    #[test]
    fn cleans_numbered_model_output() {
        let reply = "Palabras clave:\n1. \"agentes\"\n2. OpenAI\n3) *robótica*\n- visión artificial, datos.";
        assert_eq!(
            clean_llm_keywords(reply),
            s(&["agentes", "OpenAI", "robótica", "visión artificial", "datos"])
        );
    }

    #[test]
    fn gazetteer_matches_on_word_boundaries_in_text_order() {
        let g = Gazetteer::default();
        let m = GazetteerMatcher::new(&g);
        let hits = m.find("Sam Altman said OpenAI and nvidia will cooperate; Metaverse is unrelated.");
        assert_eq!(hits, s(&["Sam Altman", "OpenAI", "NVIDIA"]));
    }

    #[tokio::test]
    async fn composite_puts_entities_first() {
        let client: DynInference = Arc::new(MockInference {
            fixed: "agentes, OpenAI, robótica".into(),
        });
        let ex = CompositeExtractor::standard(&Gazetteer::default(), client, 5, "IA");
        let kws = ex.extract_keywords("OpenAI presenta nuevos agentes con Sam Altman").await;
        assert_eq!(kws, s(&["OpenAI", "Sam Altman", "agentes", "robótica", "IA"]));
    }

    #[test]
    fn prompt_routes_keywords_by_kind() {
        let g = Gazetteer::new(Gazetteer::default().people, Gazetteer::default().brands);
        let p = build_image_prompt(&s(&["Sam Altman", "OpenAI", "agentes"]), &g);
        assert_eq!(
            p,
            "A cinematic digital painting featuring themes of agentes, with Sam Altman, \
             and branding of OpenAI, stylized, highly detailed, concept art, without text."
        );
        let p = build_image_prompt(&[], &g);
        assert!(p.contains("themes of artificial intelligence"));
    }

    #[test]
    fn prompt_adds_the_first_brand_visual() {
        let g = Gazetteer::default();
        let p = build_image_prompt(&s(&["Suno", "OpenAI", "música"]), &g);
        assert!(p.contains("and branding of Suno, OpenAI, featuring a music-themed neon district"));
        assert_eq!(p.matches("featuring").count(), 2);
    }
}
