use rand::{seq::index, Rng};
use serde::Serialize;

/// Value accepted by every selector to mean "no modifier".
pub const NONE: &str = "none";

/// Which selector a modifier value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Style,
    CameraAngle,
    Lighting,
}

macro_rules! modifier_set {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $value:literal, $label:literal, $suffix:literal;)+ }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name { $($variant),+ }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// `None` for "none" and for anything outside the closed set.
            pub fn parse(value: &str) -> Option<Self> {
                match value {
                    $($value => Some(Self::$variant),)+
                    _ => None,
                }
            }

            pub fn as_str(self) -> &'static str {
                match self { $(Self::$variant => $value),+ }
            }

            pub fn label(self) -> &'static str {
                match self { $(Self::$variant => $label),+ }
            }

            pub fn suffix(self) -> &'static str {
                match self { $(Self::$variant => $suffix),+ }
            }
        }
    };
}

modifier_set! {
    /// Art style appended first.
    Style {
        Anime => "anime", "Anime", ", anime style, manga art, vibrant colors, clean lines";
        Realistic => "realistic", "Realistic", ", photorealistic, highly detailed, sharp focus, professional photography";
        ThreeD => "3d", "3D Render", ", 3D render, octane render, cinema 4D, blender, volumetric lighting";
        Watercolor => "watercolor", "Watercolor", ", watercolor painting, soft edges, flowing colors, artistic, textured paper";
        OilPainting => "oil-painting", "Oil Painting", ", oil painting, textured canvas, detailed brushstrokes, rich colors";
        PixelArt => "pixel-art", "Pixel Art", ", pixel art, 8-bit style, retro game aesthetic, limited color palette";
        Sketch => "sketch", "Sketch", ", pencil sketch, hand-drawn, detailed linework, shading, artistic";
    }
}

modifier_set! {
    CameraAngle {
        CloseUp => "close-up", "Close-up", ", close-up shot, detailed, intimate perspective";
        WideAngle => "wide-angle", "Wide Angle", ", wide-angle lens, expansive view, capturing environment";
        Aerial => "aerial", "Aerial View", ", aerial view, bird's eye perspective, from above";
        LowAngle => "low-angle", "Low Angle", ", low angle shot, looking upward, dramatic perspective";
        HighAngle => "high-angle", "High Angle", ", high angle shot, looking downward, overview perspective";
        DutchAngle => "dutch-angle", "Dutch Angle", ", dutch angle, tilted horizon, dynamic composition";
        Fisheye => "fisheye", "Fisheye", ", fisheye lens, distorted perspective, ultra-wide view";
    }
}

modifier_set! {
    Lighting {
        Natural => "natural", "Natural", ", natural lighting, daylight, soft shadows";
        Soft => "soft", "Soft", ", soft lighting, diffused, gentle shadows, flattering";
        Dramatic => "dramatic", "Dramatic", ", dramatic lighting, high contrast, deep shadows, moody";
        Backlit => "backlit", "Backlit", ", backlit, rim lighting, silhouette effect, glowing edges";
        GoldenHour => "golden-hour", "Golden Hour", ", golden hour lighting, warm orange glow, long shadows, sunset";
        BlueHour => "blue-hour", "Blue Hour", ", blue hour lighting, cool blue tones, twilight atmosphere";
        Studio => "studio", "Studio", ", studio lighting, professional setup, controlled environment";
        Neon => "neon", "Neon", ", neon lighting, vibrant colors, urban night, cyberpunk aesthetic";
    }
}

/// Fixed suffix for `value` in `category`, or "" when unrecognized.
pub fn modifier_suffix(category: Category, value: &str) -> &'static str {
    let suffix = match category {
        Category::Style => Style::parse(value).map(Style::suffix),
        Category::CameraAngle => CameraAngle::parse(value).map(CameraAngle::suffix),
        Category::Lighting => Lighting::parse(value).map(Lighting::suffix),
    };
    suffix.unwrap_or("")
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ModifierOption {
    pub value: &'static str,
    pub label: &'static str,
}

/// Selector contents, each list led by the "none" entry.
#[derive(Debug, Clone, Serialize)]
pub struct Catalog {
    pub styles: Vec<ModifierOption>,
    pub camera_angles: Vec<ModifierOption>,
    pub lighting: Vec<ModifierOption>,
}

fn options<T: Copy>(all: &[T], value: fn(T) -> &'static str, label: fn(T) -> &'static str) -> Vec<ModifierOption> {
    std::iter::once(ModifierOption { value: NONE, label: "None" })
        .chain(all.iter().map(|&m| ModifierOption { value: value(m), label: label(m) }))
        .collect()
}

pub fn catalog() -> Catalog {
    Catalog {
        styles: options(Style::ALL, Style::as_str, Style::label),
        camera_angles: options(CameraAngle::ALL, CameraAngle::as_str, CameraAngle::label),
        lighting: options(Lighting::ALL, Lighting::as_str, Lighting::label),
    }
}

pub const RANDOM_PROMPTS: [&str; 20] = [
    "A serene mountain landscape at sunset with a small cabin",
    "A futuristic cityscape with flying vehicles and neon lights",
    "A magical forest with glowing plants and mythical creatures",
    "An underwater scene with colorful coral reefs and exotic fish",
    "A cozy cafe interior with rain falling outside the windows",
    "A space station orbiting a vibrant nebula",
    "A medieval castle on a cliff overlooking the ocean",
    "A cyberpunk street market at night with vendors and holographic signs",
    "A peaceful Japanese garden with cherry blossoms and a koi pond",
    "A desert oasis with palm trees and a clear blue pool",
    "A steampunk airship flying through clouds",
    "A fantasy library with floating books and magical artifacts",
    "A tropical beach at sunrise with crystal clear water",
    "An ancient temple hidden in a dense jungle",
    "A rustic farmhouse in a field of wildflowers",
    "A bustling spice market with colorful stalls and exotic goods",
    "A winter wonderland with snow-covered trees and a frozen lake",
    "A vintage train station with steam locomotives",
    "A mystical portal between two worlds with swirling energy",
    "A cozy treehouse village connected by rope bridges",
];

pub const ENHANCEMENT_PHRASES: [&str; 9] = [
    "highly detailed",
    "professional quality",
    "masterful composition",
    "stunning",
    "intricate details",
    "perfect lighting",
    "award-winning",
    "breathtaking",
    "ultra high resolution",
];

/// Uniform pick from [`RANDOM_PROMPTS`].
pub fn random_prompt<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    RANDOM_PROMPTS[rng.random_range(0..RANDOM_PROMPTS.len())]
}

/// Two or three distinct phrases, sampled without replacement.
pub fn pick_enhancements<R: Rng + ?Sized>(rng: &mut R) -> Vec<&'static str> {
    let count = rng.random_range(2..=3);
    index::sample(rng, ENHANCEMENT_PHRASES.len(), count)
        .into_iter()
        .map(|i| ENHANCEMENT_PHRASES[i])
        .collect()
}

/// Local (non-AI) enhancement: `"{prompt}, {phrase}, {phrase}[, {phrase}]"`.
pub fn enhance_prompt<R: Rng + ?Sized>(prompt: &str, rng: &mut R) -> String {
    format!("{prompt}, {}", pick_enhancements(rng).join(", "))
}
