//! Flat HTML rendering of content blocks.
//!
//! Blocks are the canonical representation everywhere in the pipeline;
//! markup is produced only here, at the render and publish boundary.

use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::models::ContentBlock;

pub fn render_block(block: &ContentBlock) -> String {
    match block {
        ContentBlock::Heading { level, text } => {
            let level = (*level).clamp(1, 6);
            format!("<h{level}>{}</h{level}>", encode_text(text))
        }
        ContentBlock::Paragraph { text } => format!("<p>{}</p>", encode_text(text)),
        ContentBlock::List { ordered, items } => {
            let tag = if *ordered { "ol" } else { "ul" };
            let items: String = items
                .iter()
                .map(|item| format!("<li>{}</li>", encode_text(item)))
                .collect();
            format!("<{tag}>{items}</{tag}>")
        }
        ContentBlock::Quote { text } => format!("<blockquote>{}</blockquote>", encode_text(text)),
        ContentBlock::Code { text } => format!("<pre>{}</pre>", encode_text(text)),
        ContentBlock::Image { src, alt } => {
            format!(
                r#"<img src="{}" alt="{}" />"#,
                encode_double_quoted_attribute(src),
                encode_double_quoted_attribute(alt)
            )
        }
    }
}

/// Render blocks in order, concatenated without separators.
pub fn render_blocks(blocks: &[ContentBlock]) -> String {
    blocks.iter().map(render_block).collect()
}

/// Full post body: title heading, link back to the source, then the blocks.
pub fn render_article(title: &str, source_url: &str, blocks: &[ContentBlock]) -> String {
    format!(
        "<h1>{}</h1>\n<p><a href=\"{}\">Original Article Link</a></p>\n{}",
        encode_text(title),
        encode_double_quoted_attribute(source_url),
        render_blocks(blocks)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup_in_text() {
        let block = ContentBlock::Paragraph {
            text: "a < b & \"c\"".into(),
        };
        assert_eq!(render_block(&block), "<p>a &lt; b &amp; \"c\"</p>");
    }

    #[test]
    fn escapes_quotes_in_attributes() {
        let block = ContentBlock::Image {
            src: "https://a.test/i.png?a=1&b=2".into(),
            alt: "say \"hi\" <now>".into(),
        };
        assert_eq!(
            render_block(&block),
            r#"<img src="https://a.test/i.png?a=1&amp;b=2" alt="say &quot;hi&quot; &lt;now&gt;" />"#
        );
    }

    #[test]
    fn renders_blocks_in_order() {
        let blocks = vec![
            ContentBlock::Heading {
                level: 2,
                text: "Intro".into(),
            },
            ContentBlock::Image {
                src: "https://a.test/i.png".into(),
                alt: "tutorial image".into(),
            },
            ContentBlock::List {
                ordered: true,
                items: vec!["one".into(), "two".into()],
            },
        ];
        assert_eq!(
            render_blocks(&blocks),
            r#"<h2>Intro</h2><img src="https://a.test/i.png" alt="tutorial image" /><ol><li>one</li><li>two</li></ol>"#
        );
    }

    #[test]
    fn article_has_title_and_source_link() {
        let html = render_article("Cara Beli", "https://a.test/learn/1", &[]);
        assert!(html.starts_with("<h1>Cara Beli</h1>"));
        assert!(html.contains(r#"<a href="https://a.test/learn/1">"#));
    }
}
