//! Text helpers for markup-bearing strings.

use scraper::Html;

use pagegraph_shared::collapse_whitespace;

/// Decode every HTML character reference in a scraped attribute value.
/// Markup in the value is left as is.
pub(crate) fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    // Raw text inside <textarea> gets references decoded but no tags parsed.
    // The leading newline is eaten by the parser.
    let guarded = s.replace("</", "&lt;/");
    let fragment = Html::parse_fragment(&format!("<textarea>\n{guarded}</textarea>"));
    fragment.root_element().text().collect()
}

/// Strip markup and collapse whitespace. Entities are decoded by the parser.
pub(crate) fn plain_text(markup: &str) -> String {
    let unescaped = markup.replace("\\/", "/");
    if !unescaped.contains('<') && !unescaped.contains('&') {
        return collapse_whitespace(&unescaped);
    }
    let fragment = Html::parse_fragment(&unescaped);
    let text: Vec<&str> = fragment.root_element().text().collect();
    collapse_whitespace(&text.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_named_and_numeric_entities() {
        assert_eq!(
            decode_entities("{&quot;ON&quot;:&#123;&#x7D;}"),
            "{\"ON\":{}}"
        );
        assert_eq!(decode_entities("a &unknown; b"), "a &unknown; b");
    }

    #[test]
    fn decodes_the_full_named_entity_set() {
        assert_eq!(
            decode_entities("{&quot;QC&quot;:&quot;Acc&eacute;l&eacute;ration&rsquo;s Silverado&reg;&quot;}"),
            "{\"QC\":\"Accélération’s Silverado®\"}"
        );
    }

    #[test]
    fn markup_in_values_survives_decoding() {
        assert_eq!(
            decode_entities("&lt;p&gt;Requires <sup>1</sup> equipment.</p>"),
            "<p>Requires <sup>1</sup> equipment.</p>"
        );
    }

    #[test]
    fn plain_text_strips_tags() {
        assert_eq!(
            plain_text("<p>Requires <sup>1</sup> available\u{a0}equipment.</p>\n"),
            "Requires 1 available equipment."
        );
        assert_eq!(plain_text("See dealer for details."), "See dealer for details.");
    }
}
