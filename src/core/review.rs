use crate::core::manifest::ManifestEntry;

const TEMPLATE: &str = include_str!("review.html");
const PLACEHOLDER: &str = "__MANIFEST_JSON__";

/// Static review page with the manifest embedded as a script literal.
pub fn render_review(entries: &[ManifestEntry]) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string_pretty(entries)?;
    // A literal `</script>` inside a string would end the script element.
    let json = json.replace("</", "<\\/");
    Ok(TEMPLATE.replacen(PLACEHOLDER, &json, 1))
}
