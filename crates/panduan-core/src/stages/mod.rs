//! The pipeline stages, in the order the orchestrator runs them.

pub mod clean;
pub mod images;
pub mod persist;
pub mod publish;
pub mod render;
pub mod translate;
pub mod tutorial;
pub mod validate;

pub use clean::CleanStage;
pub use images::ImageValidationStage;
pub use persist::PersistStage;
pub use publish::PublishStage;
pub use render::RenderStage;
pub use translate::TranslateStage;
pub use tutorial::TutorialGateStage;
pub use validate::FinalValidationStage;

use crate::models::ContentBlock;

/// Reads a YES/NO answer from a decision reply.
///
/// Returns `None` when the reply is empty or says neither.
pub(crate) fn parse_verdict(reply: &str) -> Option<bool> {
    let first = reply
        .trim()
        .trim_start_matches(|c: char| !c.is_alphanumeric())
        .split(|c: char| !c.is_alphanumeric())
        .next()?
        .to_ascii_uppercase();
    match first.as_str() {
        "YES" | "Y" | "TRUE" => Some(true),
        "NO" | "N" | "FALSE" => Some(false),
        _ => None,
    }
}

/// Plain text of the blocks, cut to at most `max_chars` characters.
pub(crate) fn excerpt(blocks: &[ContentBlock], max_chars: usize) -> String {
    let text = blocks
        .iter()
        .filter(|b| !b.is_image())
        .map(ContentBlock::plain_text)
        .collect::<Vec<_>>()
        .join("\n");
    text.chars().take(max_chars).collect()
}
