//! HTML to markdown conversion for endpoint descriptions.
//!
//! OpenAPI descriptions are frequently written in HTML. Stored metadata is
//! easier to read (and to embed) as markdown, so the common block and inline
//! tags are rewritten with `lol_html` and everything else is unwrapped to
//! its text.

use html_escape::decode_html_entities;
use lol_html::errors::RewritingError;
use lol_html::html_content::ContentType;
use lol_html::{element, HtmlRewriter, Settings};

/// Convert an HTML fragment to markdown.
///
/// Plain text passes through unchanged. If the rewriter rejects the input,
/// the original text is returned.
pub fn html_to_markdown(html: &str) -> String {
    if !html.contains('<') {
        return decode_entities(html.trim());
    }
    match rewrite(html) {
        Ok(markdown) => tidy(&decode_entities(&markdown)),
        Err(err) => {
            tracing::debug!(error = %err, "html rewrite failed, keeping raw description");
            html.to_string()
        }
    }
}

fn rewrite(html: &str) -> Result<String, RewritingError> {
    let mut output = Vec::with_capacity(html.len());
    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![
                element!("h1, h2, h3, h4, h5, h6", |el| {
                    let level = el.tag_name()[1..].parse::<usize>().unwrap_or(1);
                    el.before(&format!("\n\n{} ", "#".repeat(level)), ContentType::Text);
                    el.after("\n\n", ContentType::Text);
                    Ok(())
                }),
                element!("p, div, ul, ol, table", |el| {
                    el.before("\n\n", ContentType::Text);
                    el.after("\n\n", ContentType::Text);
                    Ok(())
                }),
                element!("tr", |el| {
                    el.after("\n", ContentType::Text);
                    Ok(())
                }),
                element!("td, th", |el| {
                    el.after(" ", ContentType::Text);
                    Ok(())
                }),
                element!("br", |el| {
                    el.after("\n", ContentType::Text);
                    Ok(())
                }),
                element!("li", |el| {
                    el.before("\n- ", ContentType::Text);
                    Ok(())
                }),
                element!("strong, b", |el| {
                    el.before("**", ContentType::Text);
                    el.after("**", ContentType::Text);
                    Ok(())
                }),
                element!("em, i", |el| {
                    el.before("*", ContentType::Text);
                    el.after("*", ContentType::Text);
                    Ok(())
                }),
                element!("pre", |el| {
                    el.before("\n\n```\n", ContentType::Text);
                    el.after("\n```\n\n", ContentType::Text);
                    Ok(())
                }),
                element!("code", |el| {
                    el.before("`", ContentType::Text);
                    el.after("`", ContentType::Text);
                    Ok(())
                }),
                element!("a[href]", |el| {
                    let href = el.get_attribute("href").unwrap_or_default();
                    el.before("[", ContentType::Text);
                    el.after(&format!("]({})", href), ContentType::Text);
                    Ok(())
                }),
                element!("*", |el| {
                    el.remove_and_keep_content();
                    Ok(())
                }),
            ],
            ..Settings::default()
        },
        |chunk: &[u8]| output.extend_from_slice(chunk),
    );
    rewriter.write(html.as_bytes())?;
    rewriter.end()?;
    Ok(String::from_utf8_lossy(&output).into_owned())
}

fn decode_entities(text: &str) -> String {
    decode_html_entities(text).into_owned()
}

/// Trim trailing whitespace and collapse runs of blank lines.
fn tidy(markdown: &str) -> String {
    let mut out = String::with_capacity(markdown.len());
    let mut blank_run = 0;
    for line in markdown.lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
            out.push('\n');
        } else {
            blank_run = 0;
            out.push_str(line);
            out.push('\n');
        }
    }
    out.trim().to_string()
}
