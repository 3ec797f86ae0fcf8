//! Aesthetic presets the photo analysis can pick from.

/// A named look with the instruction text injected into prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StylePreset {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub instruction: &'static str,
    pub keywords: &'static [&'static str],
}

pub const STYLE_PRESETS: &[StylePreset] = &[
    StylePreset {
        id: "1990s_camera_flash",
        name: "1990s Camera Flash",
        description: "Raw, nostalgic point-and-shoot camera feel",
        instruction: "Captured with a 1990s-style camera using a direct front flash. The 35mm lens flash creates a nostalgic glow.",
        keywords: &["1990s-style camera", "direct front flash", "35mm lens flash", "nostalgic glow", "raw aesthetic"],
    },
    StylePreset {
        id: "professional_headshot",
        name: "Professional Studio Headshot",
        description: "Clean, corporate/LinkedIn ready portrait",
        instruction: "Place the subject against a clean, solid dark gray studio photography backdrop with a subtle gradient (vignette effect). Shot on a Sony A7III with an 85mm f/1.4 lens. Use a classic three-point lighting setup. The main key light should create soft, defining shadows on the face. A subtle rim light should separate the subject's shoulders and hair from the dark background.",
        keywords: &["professional studio headshot", "dark gray studio backdrop", "Sony A7III", "85mm f/1.4 lens", "three-point lighting setup", "key light", "rim light", "ultra-realistic", "8k"],
    },
    StylePreset {
        id: "emotional_film",
        name: "Emotional Film Photography",
        description: "Cinematic, soft, golden hour film look",
        instruction: "A cinematic, emotional portrait shot on Kodak Portra 400 film. Warm, nostalgic lighting hitting the side of the face. Apply a subtle film grain and soft focus to create a dreamy, storytelling vibe. High quality, depth of field.",
        keywords: &["cinematic", "emotional portrait", "Kodak Portra 400 film", "warm nostalgic lighting", "film grain", "soft focus", "storytelling vibe"],
    },
    StylePreset {
        id: "2000s_mirror_selfie",
        name: "2000s Mirror Selfie",
        description: "Y2K aesthetic with harsh flash and retro highlights",
        instruction: "Captured as an early-2000s mirror selfie aesthetic. Use harsh super-flash with bright blown-out highlights. Subtle grain, retro highlights, crisp details.",
        keywords: &["early-2000s digital camera aesthetic", "harsh super-flash", "mirror selfie", "subtle grain", "retro highlights"],
    },
    StylePreset {
        id: "hyper_realistic_crowd",
        name: "Hyper-Realistic Cinematic",
        description: "Ultra-sharp, 8k cinematic lighting",
        instruction: "A hyper-realistic, ultra-sharp, full-color large-format cinematic frame. The image must look like a perfectly photographed editorial cover with impeccable lighting. Photorealistic, 8k, shallow depth of field, soft natural fill light + strong golden rim light. High dynamic range, calibrated color grading.",
        keywords: &["hyper-realistic", "ultra-sharp", "large-format image", "cinematic frame", "editorial cover", "impeccable lighting", "8k", "shallow depth of field", "natural fill light", "golden rim light"],
    },
    StylePreset {
        id: "casual_iphone",
        name: "Casual iPhone Snapshot",
        description: "Candid, user-generated content style, natural",
        instruction: "Captured as a casual iPhone photo, NOT professional. Quality should be iPhone camera - good but not studio, realistic social media quality. Natural, slightly grainy iPhone look, not over-processed.",
        keywords: &["casual iPhone selfie", "NOT professional", "realistic social media quality", "slightly grainy iPhone look", "not over-processed"],
    },
];

pub fn find(id: &str) -> Option<&'static StylePreset> {
    STYLE_PRESETS.iter().find(|preset| preset.id == id)
}

/// One line per preset, for the analysis prompt's style menu.
pub fn menu() -> String {
    STYLE_PRESETS
        .iter()
        .map(|p| format!("- ID: {} | Name: {} | Desc: {}", p.id, p.name, p.description))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_findable() {
        for preset in STYLE_PRESETS {
            assert_eq!(find(preset.id), Some(preset));
        }
        let mut ids: Vec<_> = STYLE_PRESETS.iter().map(|p| p.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 6);
        assert!(find("vaporwave").is_none());
    }

    #[test]
    fn menu_lists_every_preset() {
        let menu = menu();
        assert_eq!(menu.lines().count(), STYLE_PRESETS.len());
        assert!(menu.contains("ID: casual_iphone | Name: Casual iPhone Snapshot"));
    }
}
