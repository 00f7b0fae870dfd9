//! Glanceable turn-by-turn instructions.
//!
//! Converts the provider's raw steps into compact instructions: an icon
//! class, a short label with the leg distance, and the coordinate where
//! the maneuver happens. Classification is keyword based and works on
//! both English and French instruction texts.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{NavError, Result};
use crate::geo::Coordinate;
use crate::route::RouteStep;

/// Maneuver categories, in classification precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IconClass {
    TurnRight,
    TurnLeft,
    Roundabout,
    Arrive,
    Straight,
    Generic,
}

/// A single simplified instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimplifiedInstruction {
    /// Ordinal of the step within its route, 0-based.
    pub id: usize,
    pub icon: IconClass,
    pub short_label: String,
    /// Provider text, untouched.
    pub full_text: String,
    /// Length of the step in meters.
    pub distance_m: f64,
    /// Where the step begins.
    pub anchor: Coordinate,
}

/// Keywords per category, matched as lowercase substrings. The first
/// category with a hit wins, so a text mentioning both a turn and a
/// roundabout is a turn.
const KEYWORDS: [(IconClass, &[&str]); 5] = [
    (IconClass::TurnRight, &["right", "droite"]),
    (IconClass::TurnLeft, &["left", "gauche"]),
    (IconClass::Roundabout, &["roundabout", "rond-point", "rond point", "giratoire"]),
    (IconClass::Arrive, &["arriv", "destination"]),
    (IconClass::Straight, &["straight", "tout droit", "continu"]),
];

/// "exit 2", "sortie 2", "sortie n°2"
static EXIT_THEN_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:exit|sortie)\s*(?:n[°o]\.?\s*)?(\d{1,2})\b").expect("valid regex")
});

/// "2nd exit", "2e sortie", "2ème sortie"
static NUMBER_THEN_EXIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})\s*(?:st|nd|rd|th|er|re|ère|e|ème|eme)\s+(?:exit|sortie)\b")
        .expect("valid regex")
});

/// "second exit", "deuxième sortie"
static WORD_THEN_EXIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\w+)\s+(?:exit|sortie)\b").expect("valid regex")
});

const ORDINAL_WORDS: [(&str, u32); 12] = [
    ("first", 1),
    ("second", 2),
    ("third", 3),
    ("fourth", 4),
    ("fifth", 5),
    ("sixth", 6),
    ("première", 1),
    ("deuxième", 2),
    ("troisième", 3),
    ("quatrième", 4),
    ("cinquième", 5),
    ("sixième", 6),
];

/// Classify a raw instruction text.
pub fn classify(text: &str) -> IconClass {
    let lower = text.to_lowercase();
    KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| lower.contains(w)))
        .map(|(icon, _)| *icon)
        .unwrap_or(IconClass::Generic)
}

/// Extract the roundabout exit ordinal from a raw instruction text.
pub fn exit_ordinal(text: &str) -> Option<u32> {
    let number = |re: &Regex| {
        re.captures(text)
            .and_then(|c| c[1].parse::<u32>().ok())
            .filter(|n| *n > 0)
    };

    number(&EXIT_THEN_NUMBER)
        .or_else(|| number(&NUMBER_THEN_EXIT))
        .or_else(|| {
            WORD_THEN_EXIT.captures_iter(text).find_map(|c| {
                let word = c[1].to_lowercase();
                ORDINAL_WORDS
                    .iter()
                    .find(|(w, _)| *w == word)
                    .map(|(_, n)| *n)
            })
        })
}

/// English ordinal: 1st, 2nd, 3rd, 4th, 11th, 21st.
pub fn ordinal(n: u32) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}

fn category_label(icon: IconClass) -> &'static str {
    match icon {
        IconClass::TurnRight => "Turn right",
        IconClass::TurnLeft => "Turn left",
        IconClass::Roundabout => "Roundabout",
        IconClass::Arrive => "Arrive",
        IconClass::Straight => "Continue straight",
        IconClass::Generic => "Continue",
    }
}

fn short_label(icon: IconClass, step: &RouteStep) -> String {
    let label = match icon {
        IconClass::Roundabout => match exit_ordinal(&step.instruction).or(step.exit_number) {
            Some(n) => format!("Roundabout, {} exit", ordinal(n)),
            None => category_label(icon).to_string(),
        },
        _ => category_label(icon).to_string(),
    };

    if step.distance_m > 0.0 {
        format!("{label} · {}m", step.distance_m.round() as i64)
    } else {
        label
    }
}

/// Simplify the raw steps of a route.
///
/// Each step is anchored on the polyline vertex at its first way point,
/// or on the route origin when that index is out of range. Steps with a
/// negative or non-finite distance are rejected.
pub fn simplify(steps: &[RouteStep], route_coordinates: &[Coordinate]) -> Result<Vec<SimplifiedInstruction>> {
    let Some(origin) = route_coordinates.first() else {
        return Err(NavError::InvalidInput("route has no coordinates".to_string()));
    };

    steps
        .iter()
        .enumerate()
        .map(|(id, step)| {
            if !step.distance_m.is_finite() || step.distance_m < 0.0 {
                return Err(NavError::MalformedStep {
                    index: id,
                    reason: format!("invalid distance {}", step.distance_m),
                });
            }

            let icon = classify(&step.instruction);
            let anchor = route_coordinates
                .get(step.way_point_index)
                .copied()
                .unwrap_or(*origin);

            Ok(SimplifiedInstruction {
                id,
                icon,
                short_label: short_label(icon, step),
                full_text: step.instruction.clone(),
                distance_m: step.distance_m,
                anchor,
            })
        })
        .collect()
}

/// Remaining distance as shown while riding.
pub fn format_distance(meters: f64) -> String {
    if meters < 100.0 {
        format!("{}m", meters.round() as i64)
    } else if meters < 1000.0 {
        format!("{}m", (meters / 10.0).round() as i64 * 10)
    } else {
        format!("{:.1}km", meters / 1000.0)
    }
}
