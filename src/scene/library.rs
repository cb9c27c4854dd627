use crate::analysis::lighting::{Contrast, Exposure, KeySide};
use crate::scene::graph::{DepthLayers, LightingContext, SceneGraph, TimeOfDay, Weather};

static CATALOG: &[SceneGraph] = &[
    SceneGraph {
        id: "studio-seamless",
        version: 1,
        name: "Seamless photo studio",
        architecture: &[
            "curved seamless paper sweep",
            "no visible walls or corners",
        ],
        materials: &["matte warm-grey paper", "polished concrete floor edge"],
        props: &["single apple box at frame edge"],
        depth: DepthLayers {
            foreground: "clean floor with a soft contact shadow under the feet",
            midground: "subject centered on the sweep",
            background: "gradient falloff from light grey to mid grey",
        },
        ambient_life: "none; the studio is empty apart from the subject",
        lighting: LightingContext {
            key: "large octabox 45 degrees camera left, slightly above eye level",
            fill: "white v-flat camera right",
            ambient: "low, neutral",
            key_side: KeySide::Left,
            contrast: Contrast::Soft,
            exposure: Exposure::Balanced,
            color_temperature_k: 5600,
        },
        time_of_day: TimeOfDay::Interior,
        weather: Weather::Indoor,
        avoid: &[
            "visible light stands",
            "colored gels",
            "floating subject without shadow",
        ],
    },
    SceneGraph {
        id: "urban-street",
        version: 1,
        name: "European city street",
        architecture: &[
            "five-storey stone facades with wrought-iron balconies",
            "ground-floor shopfronts with awnings",
            "cobbled pavement receding to a vanishing point",
        ],
        materials: &[
            "limestone",
            "dark painted iron",
            "wet-look cobbles",
            "glass shop windows",
        ],
        props: &[
            "bistro chairs outside a cafe",
            "bicycle leaning on a lamppost",
            "potted olive tree",
        ],
        depth: DepthLayers {
            foreground: "pavement texture in sharp focus around the feet",
            midground: "subject walking or standing on the pavement",
            background: "street continuing with gentle lens blur, distant pedestrians",
        },
        ambient_life: "two or three distant pedestrians out of focus, no one near the subject",
        lighting: LightingContext {
            key: "low sun raking across the street from camera right",
            fill: "skylight bounced off pale facades",
            ambient: "warm, slightly hazy",
            key_side: KeySide::Right,
            contrast: Contrast::Medium,
            exposure: Exposure::Balanced,
            color_temperature_k: 4300,
        },
        time_of_day: TimeOfDay::GoldenHour,
        weather: Weather::Clear,
        avoid: &[
            "cars crossing the subject",
            "legible shop signage",
            "crowds",
        ],
    },
    SceneGraph {
        id: "cafe-interior",
        version: 1,
        name: "Daylit cafe interior",
        architecture: &[
            "tall arched windows",
            "exposed brick wall",
            "timber ceiling beams",
        ],
        materials: &[
            "reclaimed oak",
            "brushed brass",
            "white marble tabletops",
            "terracotta tiles",
        ],
        props: &[
            "espresso cups",
            "hanging pendant lamps",
            "trailing pothos on shelves",
        ],
        depth: DepthLayers {
            foreground: "edge of a marble table, softly defocused",
            midground: "subject seated or standing beside the window",
            background: "counter and shelving with warm bokeh from pendant lamps",
        },
        ambient_life: "barista behind the counter far in the background, out of focus",
        lighting: LightingContext {
            key: "window light from camera left",
            fill: "warm tungsten pendants",
            ambient: "mixed daylight and tungsten",
            key_side: KeySide::Left,
            contrast: Contrast::Soft,
            exposure: Exposure::Balanced,
            color_temperature_k: 4800,
        },
        time_of_day: TimeOfDay::Morning,
        weather: Weather::Indoor,
        avoid: &[
            "steam covering the garment",
            "mirrors reflecting the subject",
            "text on menus",
        ],
    },
    SceneGraph {
        id: "beach-sunset",
        version: 1,
        name: "Beach at sunset",
        architecture: &["open shoreline", "low dunes with beach grass"],
        materials: &["fine wet sand", "shallow surf foam", "driftwood"],
        props: &[
            "a single driftwood log",
            "footprints leading out of frame",
        ],
        depth: DepthLayers {
            foreground: "rippled wet sand with specular highlights",
            midground: "subject standing at the waterline",
            background: "horizon with a low sun and layered cloud bands",
        },
        ambient_life: "distant gulls, no other people",
        lighting: LightingContext {
            key: "low sun behind the subject producing a rim light",
            fill: "warm reflected light from the sand",
            ambient: "orange to magenta sky gradient",
            key_side: KeySide::Back,
            contrast: Contrast::Medium,
            exposure: Exposure::Balanced,
            color_temperature_k: 3200,
        },
        time_of_day: TimeOfDay::GoldenHour,
        weather: Weather::PartlyCloudy,
        avoid: &[
            "silhouetted face",
            "lens flare over the face",
            "tilted horizon",
        ],
    },
    SceneGraph {
        id: "luxury-boutique",
        version: 1,
        name: "Luxury boutique",
        architecture: &[
            "double-height showroom",
            "recessed display niches",
            "wide staircase",
        ],
        materials: &[
            "travertine floor",
            "smoked glass",
            "champagne metal trims",
            "bouclé upholstery",
        ],
        props: &[
            "garment rails with spaced hangers",
            "round ottoman",
            "sculptural floor vase",
        ],
        depth: DepthLayers {
            foreground: "polished floor with a faint reflection of the subject",
            midground: "subject in front of a display niche",
            background: "staircase and rails fading into soft focus",
        },
        ambient_life: "none",
        lighting: LightingContext {
            key: "diffused ceiling panels overhead",
            fill: "warm cove lighting in the niches",
            ambient: "bright, even",
            key_side: KeySide::Overhead,
            contrast: Contrast::Soft,
            exposure: Exposure::Bright,
            color_temperature_k: 3800,
        },
        time_of_day: TimeOfDay::Interior,
        weather: Weather::Indoor,
        avoid: &["brand logos", "mannequins", "price tags"],
    },
    SceneGraph {
        id: "garden-daylight",
        version: 1,
        name: "Formal garden in daylight",
        architecture: &["gravel path between clipped hedges", "stone balustrade"],
        materials: &["pale gravel", "boxwood", "weathered sandstone"],
        props: &["terracotta urns with lavender", "wrought-iron bench"],
        depth: DepthLayers {
            foreground: "gravel path in focus",
            midground: "subject on the path",
            background: "hedges and tree canopy with soft blur",
        },
        ambient_life: "butterflies over the lavender, no people",
        lighting: LightingContext {
            key: "high sun diffused by thin cloud",
            fill: "green-tinted bounce from the hedges, neutralized",
            ambient: "bright open shade",
            key_side: KeySide::Overhead,
            contrast: Contrast::Medium,
            exposure: Exposure::Bright,
            color_temperature_k: 5800,
        },
        time_of_day: TimeOfDay::Midday,
        weather: Weather::PartlyCloudy,
        avoid: &[
            "harsh noon shadows across the eyes",
            "green color cast on skin",
        ],
    },
    SceneGraph {
        id: "rooftop-night",
        version: 1,
        name: "City rooftop at night",
        architecture: &[
            "rooftop terrace with glass balustrade",
            "skyline of lit towers",
        ],
        materials: &["teak decking", "frosted glass", "brushed steel"],
        props: &["string lights overhead", "low lounge seating"],
        depth: DepthLayers {
            foreground: "decking lit by string lights",
            midground: "subject by the balustrade",
            background: "skyline bokeh",
        },
        ambient_life: "distant blurred guests near the bar",
        lighting: LightingContext {
            key: "warm string lights above and camera right",
            fill: "cool city glow",
            ambient: "dark, high contrast",
            key_side: KeySide::Right,
            contrast: Contrast::Hard,
            exposure: Exposure::Low,
            color_temperature_k: 2900,
        },
        time_of_day: TimeOfDay::Night,
        weather: Weather::Clear,
        avoid: &[
            "underexposed face",
            "motion blur on the subject",
            "neon color cast on skin",
        ],
    },
];

/// Look up a catalog scene by id. Case and surrounding whitespace are ignored.
pub fn lookup(id: &str) -> Option<&'static SceneGraph> {
    let id = id.trim();
    CATALOG.iter().find(|s| s.id.eq_ignore_ascii_case(id))
}

pub fn all() -> &'static [SceneGraph] {
    CATALOG
}

pub fn ids() -> impl Iterator<Item = &'static str> {
    CATALOG.iter().map(|s| s.id)
}
