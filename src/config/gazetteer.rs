// src/config/gazetteer.rs
//! Known people and brands used for entity matching in keyword extraction.
//! Loaded from TOML or JSON; falls back to a built-in list.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const ENV_PATH: &str = "GAZETTEER_PATH";

const DEFAULT_PEOPLE: &[&str] = &[
    "Sam Altman",
    "Elon Musk",
    "Sundar Pichai",
    "Demis Hassabis",
    "Mark Zuckerberg",
    "Yann LeCun",
    "Geoffrey Hinton",
    "Emad Mostaque",
    "Ilya Sutskever",
    "Andrew Ng",
    "Fei-Fei Li",
    "Dario Amodei",
    "Richard Socher",
    "Jim Fan",
    "Jensen Huang",
    "Satya Nadella",
    "Tim Cook",
];

const DEFAULT_BRANDS: &[&str] = &[
    "OpenAI",
    "Google",
    "DeepMind",
    "Anthropic",
    "Meta",
    "xAI",
    "Stability AI",
    "Runway",
    "Mistral",
    "Cohere",
    "Hugging Face",
    "Midjourney",
    "Inflection AI",
    "Apple",
    "Amazon",
    "NVIDIA",
    "Microsoft",
    "Gemini",
    "Claude",
    "LLaMA",
    "GPT",
    "ChatGPT",
    "Bard",
    "Copilot",
    "Perplexity",
    "Suno",
];

/// Scene descriptions that stand in for a bare brand name in image prompts.
const DEFAULT_VISUALS: &[(&str, &str)] = &[
    ("OpenAI", "a futuristic street scene with a glowing OpenAI billboard"),
    ("Google", "a cyberpunk plaza with a luminous Google sign"),
    ("NVIDIA", "a digital cityscape featuring an NVIDIA holographic ad"),
    ("Microsoft", "a tech-themed avenue with a Microsoft neon billboard"),
    ("Apple", "a sleek street with a floating Apple logo in the sky"),
    ("Meta", "a metaverse city intersection with Meta brand holograms"),
    ("Anthropic", "a night city view with a glowing Anthropic lab sign"),
    ("Claude", "a futuristic city terminal showing Claude's interface"),
    ("Gemini", "a skyline with Gemini glowing letters above buildings"),
    ("ChatGPT", "a modern AI helpdesk in a public urban plaza"),
    ("Copilot", "a cyber city with a drone projecting Copilot logo"),
    ("Suno", "a music-themed neon district with Suno AI waves visible"),
    ("Perplexity", "a futuristic alleyway with a Perplexity search UI"),
    ("Mistral", "an open-source AI conference outside with Mistral posters"),
    ("LLaMA", "a digital jungle plaza featuring LLaMA virtual ads"),
];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Gazetteer {
    #[serde(default)]
    pub people: Vec<String>,
    #[serde(default)]
    pub brands: Vec<String>,
    /// Brand name → scene description for image prompts.
    #[serde(default)]
    pub visuals: BTreeMap<String, String>,
}

impl Default for Gazetteer {
    fn default() -> Self {
        Self {
            people: DEFAULT_PEOPLE.iter().map(|s| s.to_string()).collect(),
            brands: DEFAULT_BRANDS.iter().map(|s| s.to_string()).collect(),
            visuals: DEFAULT_VISUALS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

impl Gazetteer {
    pub fn new(people: Vec<String>, brands: Vec<String>) -> Self {
        Self {
            people: clean_list(people),
            brands: clean_list(brands),
            visuals: BTreeMap::new(),
        }
    }

    pub fn with_visuals(mut self, visuals: BTreeMap<String, String>) -> Self {
        self.visuals = visuals
            .into_iter()
            .filter_map(|(k, v)| {
                let (k, v) = (k.trim().to_string(), v.trim().to_string());
                (!k.is_empty() && !v.is_empty()).then_some((k, v))
            })
            .collect();
        self
    }

    /// Scene description for `brand`, matched case-insensitively.
    pub fn visual(&self, brand: &str) -> Option<&str> {
        self.visuals
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(brand))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_person(&self, name: &str) -> bool {
        self.people.iter().any(|p| p.eq_ignore_ascii_case(name))
    }

    pub fn is_brand(&self, name: &str) -> bool {
        self.brands.iter().any(|b| b.eq_ignore_ascii_case(name))
    }

    /// People first, then brands, each in list order.
    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.people
            .iter()
            .chain(self.brands.iter())
            .map(String::as_str)
    }
}

/// Load a gazetteer from an explicit path. Supports TOML or JSON.
pub fn load_gazetteer_from(path: &Path) -> Result<Gazetteer> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading gazetteer from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_gazetteer(&content, ext.as_str())
}

/// Load a gazetteer using env var + fallbacks:
/// 1) $GAZETTEER_PATH
/// 2) config/gazetteer.toml
/// 3) config/gazetteer.json
/// 4) built-in defaults
pub fn load_gazetteer_default() -> Result<Gazetteer> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_gazetteer_from(&pb);
        } else {
            return Err(anyhow!("GAZETTEER_PATH points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from("config/gazetteer.toml");
    if toml_p.exists() {
        return load_gazetteer_from(&toml_p);
    }
    let json_p = PathBuf::from("config/gazetteer.json");
    if json_p.exists() {
        return load_gazetteer_from(&json_p);
    }
    Ok(Gazetteer::default())
}

fn parse_gazetteer(s: &str, hint_ext: &str) -> Result<Gazetteer> {
    let parsed = if hint_ext == "toml" {
        toml::from_str::<Gazetteer>(s).map_err(anyhow::Error::from)
    } else {
        serde_json::from_str::<Gazetteer>(s)
            .map_err(anyhow::Error::from)
            .or_else(|_| toml::from_str::<Gazetteer>(s).map_err(anyhow::Error::from))
    };
    let g = parsed.map_err(|_| anyhow!("unsupported gazetteer format"))?;
    Ok(Gazetteer::new(g.people, g.brands).with_visuals(g.visuals))
}

/// Trim, drop blanks, dedup case-insensitively keeping first occurrence and order.
fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for it in items {
        let t = it.trim();
        if t.is_empty() || out.iter().any(|o| o.eq_ignore_ascii_case(t)) {
            continue;
        }
        out.push(t.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs};

    #[test]
    fn both_formats_trim_and_dedup_in_order() {
        let toml = r#"
            people = [" Sam Altman ", "", "sam altman", "Jensen Huang"]
            brands = ["OpenAI"]
        "#;
        let json = r#"{"brands": ["NVIDIA", "  nvidia", "Mistral"]}"#;

        let t = parse_gazetteer(toml, "toml").unwrap();
        assert_eq!(t.people, vec!["Sam Altman", "Jensen Huang"]);
        assert_eq!(t.brands, vec!["OpenAI"]);

        let j = parse_gazetteer(json, "json").unwrap();
        assert!(j.people.is_empty());
        assert_eq!(j.brands, vec!["NVIDIA", "Mistral"]);
        assert!(j.is_brand("mistral"));
        assert!(j.visuals.is_empty());
    }

    #[test]
    fn visuals_are_optional_and_case_insensitive() {
        let toml = r#"
            brands = ["OpenAI", "Suno"]
            [visuals]
            OpenAI = " a neon lab "
            Suno = ""
        "#;
        let g = parse_gazetteer(toml, "toml").unwrap();
        assert_eq!(g.visual("openai"), Some("a neon lab"));
        assert_eq!(g.visual("Suno"), None);
        assert!(Gazetteer::default().visual("NVIDIA").is_some());
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_then_fallbacks() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        env::remove_var(ENV_PATH);

        let g = load_gazetteer_default().unwrap();
        assert_eq!(g, Gazetteer::default());

        let p = tmp.path().join("custom.json");
        fs::write(&p, r#"{"people": ["Ada Lovelace"], "brands": []}"#).unwrap();
        env::set_var(ENV_PATH, p.display().to_string());
        let g2 = load_gazetteer_default().unwrap();
        assert_eq!(g2.people, vec!["Ada Lovelace".to_string()]);
        env::remove_var(ENV_PATH);

        env::set_current_dir(&old).unwrap();
    }
}
