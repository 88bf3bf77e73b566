//! Prompt templates sent to the chat-completion provider.

use crate::generator::ChunkRequest;

/// System prompt describing the twelve-element image prompt structure.
pub fn system_prompt(visual_style: &str, dense_mode: bool) -> String {
    let detail_level = if dense_mode {
        "highly detailed and specific"
    } else {
        "concise but descriptive"
    };

    format!(
        "You are an expert at creating image generation prompts for narrated video content.

Your task is to analyze narrative text and generate {detail_level} prompts following a 12-element structure:

1. SHOT TYPE: camera angle and framing (wide shot, medium shot, close-up, extreme close-up, tracking shot, aerial shot, over-the-shoulder)
2. SUBJECT: main characters with physical appearance details (age, build, facial features, posture)
3. ACTION: what the subject is doing, including micro-expressions and body language
4. SETTING: location, architecture, interior/exterior details, time period indicators
5. COMPOSITION: rule of thirds, camera position, visual balance, depth
6. LIGHTING: light source, direction, quality (soft/hard), color temperature
7. MOOD: overall atmosphere and emotional tone
8. KEY DETAILS: important objects, textures, materials, effects (motion blur, depth of field)
9. COLOR PALETTE: specific colors and color relationships (warm/cool, contrasting/harmonious)
10. STYLE: visual style - \"{visual_style}\"
11. TECHNICAL: quality descriptors (8k, highly detailed, cinematic, photorealistic)
12. CHARACTER APPEARANCE: consistent character descriptions if applicable

Generate prompts that are visually rich, cinematically compelling, and appropriate for the {visual_style} style.
Each prompt should be suitable for image generation models such as Midjourney, DALL-E or Stable Diffusion."
    )
}

/// User prompt asking for `requested_count` prompts for one chunk.
pub fn chunk_prompt(request: &ChunkRequest) -> String {
    let mut prompt = format!(
        "Analyze the following narrative text segment (chunk {} of {}) and generate {} image prompts.

TEXT SEGMENT:
{}

Generate exactly {} image prompts following the 12-element structure. Each prompt should:
- Capture a key moment or scene from the text
- Progress chronologically through the segment
- Include all 12 elements (shot type, subject, action, setting, composition, lighting, mood, key details, color palette, style, technical, character appearance)
- Be visually distinct and cinematically compelling
- Match the \"{}\" style

Format each prompt as a single paragraph.
Return ONLY the prompts, one per line, no numbering or extra text.",
        request.chunk_index + 1,
        request.total_chunks,
        request.requested_count,
        request.chunk_text,
        request.requested_count,
        request.visual_style,
    );

    if !request.recent_prompts.is_empty() {
        prompt.push_str(
            "\n\nIMPORTANT: Avoid repetition. Recent prompts for context \
             (generate different shots, angles, and visual elements):\n",
        );
        let listed: Vec<String> = request
            .recent_prompts
            .iter()
            .map(|p| format!("- {p}"))
            .collect();
        prompt.push_str(&listed.join("\n"));
    }

    prompt
}
