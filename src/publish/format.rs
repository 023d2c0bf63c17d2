// src/publish/format.rs
//! Markdown rendering and the caption/message length policy.

use chrono::{DateTime, Utc};

use crate::summarize::SummaryText;

/// Telegram caption ceiling (characters).
pub const CAPTION_LIMIT: usize = 1024;
/// Telegram text message ceiling (characters).
pub const MESSAGE_LIMIT: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// Bold title line, used as the caption when the full text is too long for one.
    pub title_line: String,
    /// Full Markdown text.
    pub text: String,
    pub image: Option<Vec<u8>>,
}

/// One call to the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Photo { caption: String },
    Text(String),
}

/// Escape legacy-Markdown control characters so model output cannot break formatting.
pub fn escape_markdown(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

pub fn render_message(
    summary: &SummaryText,
    link: &str,
    published_at: DateTime<Utc>,
    image: Option<Vec<u8>>,
) -> OutgoingMessage {
    let title_line = format!("*{}*", escape_markdown(&summary.title));
    let text = format!(
        "{title_line}\n\n{}\n\n_Comentario:_\n{}\n\n🗓 *Publicado:* {}\n🔗 Fuente: {}",
        escape_markdown(&summary.summary),
        escape_markdown(&summary.commentary),
        published_at.format("%d/%m/%Y %H:%M"),
        escape_markdown(link),
    );
    OutgoingMessage {
        title_line,
        text,
        image,
    }
}

/// Short messages ride along as the photo caption; long ones get the title as caption
/// and follow as text messages.
pub fn plan_delivery(message: &OutgoingMessage) -> Vec<Delivery> {
    let fits_caption = message.text.chars().count() <= CAPTION_LIMIT;
    match (&message.image, fits_caption) {
        (Some(_), true) => vec![Delivery::Photo {
            caption: message.text.clone(),
        }],
        (Some(_), false) => {
            let caption = message.title_line.chars().take(CAPTION_LIMIT).collect();
            std::iter::once(Delivery::Photo { caption })
                .chain(split_message(&message.text, MESSAGE_LIMIT).into_iter().map(Delivery::Text))
                .collect()
        }
        (None, _) => split_message(&message.text, MESSAGE_LIMIT)
            .into_iter()
            .map(Delivery::Text)
            .collect(),
    }
}

/// Split on line boundaries into chunks of at most `max` chars; over-long lines are cut hard.
pub fn split_message(text: &str, max: usize) -> Vec<String> {
    let max = max.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for line in text.split('\n') {
        let pieces = hard_split(line, max);
        for piece in pieces {
            let len = piece.chars().count();
            let needed = if current.is_empty() { len } else { len + 1 };
            if current_len + needed > max && !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if !current.is_empty() {
                current.push('\n');
                current_len += 1;
            }
            current.push_str(&piece);
            current_len += len;
        }
    }
    if !current.trim().is_empty() {
        chunks.push(current);
    }
    chunks
}

fn hard_split(line: &str, max: usize) -> Vec<String> {
    if line.chars().count() <= max {
        return vec![line.to_string()];
    }
    let chars: Vec<char> = line.chars().collect();
    let mut pieces = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let mut end = (start + max).min(chars.len());
        // Never end a piece on an escape backslash; it belongs with the next char.
        if end < chars.len() && end - start > 1 && chars[end - 1] == '\\' {
            end -= 1;
        }
        pieces.push(chars[start..end].iter().collect());
        start = end;
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn summary() -> SummaryText {
        SummaryText {
            title: "GPT_5 llega".into(),
            summary: "Resumen *breve*.".into(),
            commentary: "Comentario.".into(),
        }
    }

    #[test]
    fn renders_sections_and_footer() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 7, 9, 5, 0).unwrap();
        let m = render_message(&summary(), "https://x.example/a_b", ts, None);
        assert_eq!(m.title_line, "*GPT\\_5 llega*");
        assert!(m.text.contains("Resumen \\*breve\\*."));
        assert!(m.text.contains("🗓 *Publicado:* 07/03/2025 09:05"));
        assert!(m.text.ends_with("🔗 Fuente: https://x.example/a\\_b"));
    }

    #[test]
    fn short_message_is_a_single_captioned_photo() {
        let m = render_message(&summary(), "https://x", Utc::now(), Some(vec![1]));
        let plan = plan_delivery(&m);
        assert_eq!(plan, vec![Delivery::Photo { caption: m.text.clone() }]);
    }

    #[test]
    fn long_message_uses_title_caption_then_text() {
        let mut m = render_message(&summary(), "https://x", Utc::now(), Some(vec![1]));
        m.text = format!("{}\n{}", m.title_line, "línea\n".repeat(400));
        let plan = plan_delivery(&m);
        assert_eq!(
            plan[0],
            Delivery::Photo {
                caption: m.title_line.clone()
            }
        );
        assert!(plan[1..].iter().all(|d| matches!(d, Delivery::Text(_))));
    }

    #[test]
    fn split_respects_limit_and_lines() {
        let text = "aaaa\nbbbb\ncccc";
        assert_eq!(split_message(text, 9), vec!["aaaa\nbbbb", "cccc"]);

        let long = "x".repeat(10);
        let parts = split_message(&format!("hi\n{long}"), 4);
        assert!(parts.iter().all(|p| p.chars().count() <= 4));
        assert_eq!(parts.concat().replace('\n', ""), format!("hi{long}"));
    }

    #[test]
    fn hard_split_keeps_escapes_with_their_char() {
        let line = escape_markdown("abc_def_ghi_jkl");
        for max in 2..8 {
            let parts = split_message(&line, max);
            assert!(parts.iter().all(|p| !p.ends_with('\\')), "max {max}: {parts:?}");
            assert!(parts.iter().all(|p| p.chars().count() <= max));
            assert_eq!(parts.concat(), line);
        }
    }
}
