//! Instruction text sent to the upstream models.

pub const CHAT_SYSTEM_INSTRUCTION: &str = "You are Lumina, a creative assistant for image \
generation. Help the user shape ideas into vivid image prompts. When you propose a prompt, \
put it under a heading \"**Enhanced Prompt:**\" and, when useful, follow it with \
\"**Style Suggestions:**\" as a bulleted list of short style names.";

/// User turn asking the text model to rewrite `prompt`.
pub fn enhance_request(prompt: &str) -> String {
    format!(
        "Rewrite the following image prompt so it is more descriptive and visually specific. \
Keep the subject and intent unchanged.\n\n\
Original prompt: {}\n\n\
Answer in exactly this format:\n\
**Enhanced Prompt:** <the rewritten prompt>\n\n\
**Style Suggestions:**\n\
* <style one>\n\
* <style two>\n\
* <style three>",
        prompt.trim()
    )
}

pub fn logo_prompt(brand: &str, style: Option<&str>, colors: Option<&str>) -> String {
    let mut prompt = format!(
        "A professional, memorable logo for the brand \"{}\". Clean vector look, centered \
on a plain background, legible at small sizes, no mockup or photo backdrop.",
        brand.trim()
    );
    if let Some(style) = style.map(str::trim).filter(|value| !value.is_empty()) {
        prompt.push_str(&format!(" Style: {style}."));
    }
    if let Some(colors) = colors.map(str::trim).filter(|value| !value.is_empty()) {
        prompt.push_str(&format!(" Color palette: {colors}."));
    }
    prompt
}

/// Image prompt with the negative prompt folded in as an avoidance clause.
pub fn with_negative_prompt(prompt: &str, negative: Option<&str>) -> String {
    match negative.map(str::trim).filter(|value| !value.is_empty()) {
        Some(negative) => format!("{}\n\nAvoid: {negative}", prompt.trim()),
        None => prompt.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enhance_request_asks_for_parseable_sections() {
        let request = enhance_request("  a cat  ");
        assert!(request.contains("Original prompt: a cat\n"));
        assert!(request.contains("**Enhanced Prompt:**"));
        assert!(request.contains("**Style Suggestions:**"));
    }

    #[test]
    fn logo_prompt_includes_optional_parts() {
        let bare = logo_prompt("Acme", None, Some("  "));
        assert!(bare.contains("\"Acme\""));
        assert!(!bare.contains("Style:"));
        assert!(!bare.contains("Color palette"));

        let full = logo_prompt("Acme", Some("art deco"), Some("gold and navy"));
        assert!(full.ends_with("Style: art deco. Color palette: gold and navy."));
    }

    #[test]
    fn negative_prompt_becomes_avoid_clause() {
        assert_eq!(
            with_negative_prompt("a forest", Some("people")),
            "a forest\n\nAvoid: people"
        );
        assert_eq!(with_negative_prompt(" a forest ", Some(" ")), "a forest");
        assert_eq!(with_negative_prompt("a forest", None), "a forest");
    }
}
