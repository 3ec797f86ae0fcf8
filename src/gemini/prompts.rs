// ═══════════════════════════════════════════════════════════════════════════════
// SHARED BUILDING BLOCKS
// ═══════════════════════════════════════════════════════════════════════════════

use crate::library::PromptRecord;
use crate::util::truncate_str;

/// Realism instructions appended to every drafting and rewriting request.
pub const REALISM_RULES: &str = r#"CRITICAL REALISM RULES (the generated image MUST follow ALL of these):
- This must look like a REAL phone photo, NOT an AI render
- Include natural skin texture: visible pores, slight imperfections, natural skin variation
- Slightly asymmetric expression (real faces aren't perfectly symmetric)
- Natural eye reflections matching the environment lighting
- Realistic hair: individual strands visible, not a smooth mass
- Clothing with real fabric texture and natural wrinkles/folds
- Background with realistic depth-of-field blur (bokeh)
- Subtle warm color grading (slightly warm, not perfectly neutral)
- ABSOLUTELY NO airbrushed/plastic/waxy skin
- NO perfect symmetry in face or body
- NO unnaturally smooth textures on any surface
- Include micro-details: tiny fabric creases, slight color variations in skin, natural shadow gradients
- Camera: iPhone 15 Pro Max, f/1.78 aperture, slight lens distortion at edges"#;

const PROMPT_FORMAT: &str = r#"Write the prompt in this exact format:

SUBJECT: [describe the person: face, hair, skin tone, build, clothing from Image 1]
SCENE: [describe the setting to recreate/create]
LIGHTING: [specific lighting direction, quality, color temperature, inspired by references]
CAMERA: [iPhone 15 Pro Max, f/1.78, natural depth-of-field]
EXPRESSION: [specific expression direction]
DETAILS: [specific details to include for maximum realism]
AVOID: [things that would make it look AI-generated]

Be EXTREMELY specific. Every detail matters for realism.
The output must be indistinguishable from a real iPhone photo.
Return only the prompt."#;

/// Characters of each past prompt quoted back to the drafter.
const PAST_PROMPT_CHARS: usize = 200;

// ═══════════════════════════════════════════════════════════════════════════════
// PROMPTS
// ═══════════════════════════════════════════════════════════════════════════════

pub fn analyze_photo(style_menu: &str) -> String {
    format!(
        r#"Analyze this photo in detail. Return ONLY valid JSON with these fields:

{{
    "gender": "male/female/unknown",
    "age_range": "20s/30s/etc",
    "pose": "standing/sitting/close-up/etc",
    "setting": "outdoor park/indoor cafe/street/studio/etc",
    "lighting": {{
        "quality": "good/harsh/flat/backlit/dim",
        "direction": "front/side/overhead/natural/mixed",
        "color_temp": "warm/neutral/cool"
    }},
    "clothing": "brief description of what they're wearing",
    "expression": "smiling/neutral/serious/laughing/etc",
    "background": "brief description",
    "issues": ["quality issues, e.g. overexposed, blurry, harsh shadows"],
    "strengths": ["what's already good about the photo"],
    "search_query": "search query to find similar professional photos on stock sites",
    "style_category": "ID of the best matching aesthetic style from the list below"
}}

The search_query should describe the type of professional photo that would
serve as a good lighting/composition reference.

AVAILABLE AESTHETIC STYLES:
{style_menu}

Choose the ONE style ID that best matches the natural vibe, setting, or
potential of this photo."#
    )
}

/// Task statement for a first draft. `reference_count` images follow the
/// user's photo in the request.
pub fn draft_task(vibe: Option<&str>, reference_count: usize) -> String {
    let refs = match reference_count {
        0 => "No reference photos were found; rely on the original photo alone.".to_string(),
        1 => "- Image 2: a professional REFERENCE photo found on the web".to_string(),
        n => format!("- Images 2-{}: professional REFERENCE photos found on the web", n + 1),
    };

    match vibe {
        Some(vibe) => format!(
            r#"You are an expert prompt engineer for photo-realistic image generation. You have:

- Image 1: the user's ORIGINAL photo (this person's identity must be preserved)
{refs}
  (composition, lighting and setting inspiration ONLY, never their identity)

TASK: Write a detailed image generation prompt that creates a NEW image of the
person from Image 1 in a "{vibe}" setting.

- PRESERVE: the person's face, skin tone, body type and identity from Image 1
- CHANGE: setting, lighting and composition, inspired by the references
- The result must look like a REAL photo taken by a friend with an iPhone"#
        ),
        None => format!(
            r#"You are an expert prompt engineer for photo-realistic image enhancement. You have:

- Image 1: the user's ORIGINAL photo (enhance THIS scene)
{refs}
  (lighting and quality inspiration ONLY)

TASK: Write a detailed ENHANCEMENT prompt that recreates the SAME scene from
Image 1 with much better lighting, framing, natural skin texture (NOT
airbrushed), cleaner background bokeh, and an approachable, attractive feel.

CRITICAL: Keep the SAME clothes, SAME setting, SAME pose, SAME person.
Make it look like a professional photographer was there."#
        ),
    }
}

/// Full drafting instruction: task, precedent prompts, patterns, rules, format.
pub fn draft_prompt(
    task: &str,
    analysis_summary: &str,
    style_instruction: Option<&str>,
    past_prompts: &[PromptRecord],
    patterns: &[String],
) -> String {
    let mut prompt = String::from(task);

    prompt.push_str("\n\nPHOTO ANALYSIS:\n");
    prompt.push_str(analysis_summary);

    if let Some(style) = style_instruction {
        prompt.push_str("\n\nTARGET AESTHETIC:\n");
        prompt.push_str(style);
    }

    if !past_prompts.is_empty() {
        prompt.push_str("\n\nPrompts that worked well for similar photos:\n");
        for past in past_prompts {
            prompt.push_str(&format!(
                "- (score {}): {}...\n",
                past.score,
                truncate_str(&past.prompt, PAST_PROMPT_CHARS)
            ));
        }
    }

    prompt.push_str("\n\nInclude these proven enhancement patterns:\n");
    for pattern in patterns {
        prompt.push_str("- ");
        prompt.push_str(pattern);
        prompt.push('\n');
    }

    prompt.push('\n');
    prompt.push_str(REALISM_RULES);
    prompt.push_str("\n\n");
    prompt.push_str(PROMPT_FORMAT);
    prompt
}

pub fn rewrite_prompt(previous: &str, fix_inputs: &[String], vibe: Option<&str>) -> String {
    let issues = fix_inputs
        .iter()
        .map(|issue| format!("- {}", issue))
        .collect::<Vec<_>>()
        .join("\n");
    let vibe_instruction = match vibe {
        Some(vibe) => format!("The desired vibe is: {}", vibe),
        None => "Enhance the existing scene.".to_string(),
    };

    format!(
        r#"The previous enhancement prompt produced an image with these issues:
{issues}

Original prompt was:
{previous}

Rewrite the prompt to specifically FIX these issues.
Add EXPLICIT instructions to avoid each listed problem.
Keep everything else the same; only fix the problems.

{vibe_instruction}

{REALISM_RULES}

Return only the rewritten prompt."#
    )
}

pub const COMPARE_PHOTOS: &str = r#"You are an expert photo forensics analyst. Image 1 is potentially
AI-generated. Image 2 is the original real photo of the same person.

Evaluate Image 1 on these criteria (1-10 each):

1. REALISM: Does it look like a real phone photo?
2. IDENTITY_MATCH: Same person as Image 2? (face, features, skin tone)
3. NATURALNESS: Does the pose/expression feel candid and natural?
4. ATTRACTIVENESS: Is it dating-app worthy?
5. AI_DETECTION_RISK: How likely would someone suspect AI?
   (1 = definitely looks real, 10 = obviously AI)
6. ENHANCEMENT_QUALITY: Is it clearly better than the original?

Also list SPECIFIC issues if any (e.g. "left hand has 6 fingers",
"skin too smooth on forehead", "eyes lack reflections").

Return ONLY valid JSON:
{
    "realism": X,
    "identity_match": X,
    "naturalness": X,
    "attractiveness": X,
    "ai_detection_risk": X,
    "enhancement_quality": X,
    "overall": X,
    "issues": ["issue1", "issue2"],
    "verdict": "PASS" or "FAIL",
    "fix_suggestions": ["suggestion1", "suggestion2"]
}"#;
