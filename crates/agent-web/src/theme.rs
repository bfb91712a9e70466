//! Colour and style helpers for the cards

use crate::state::ClientLocalState;

/// Shift each RGB channel of a `#rrggbb` colour by `percent` of full scale.
///
/// Channels clamp to `0..=255`. Input that is not a hex colour is returned
/// unchanged.
pub fn adjust_brightness(color: &str, percent: i32) -> String {
    let Ok(num) = i32::from_str_radix(color.trim_start_matches('#'), 16) else {
        return color.to_owned();
    };
    #[allow(clippy::cast_possible_truncation)]
    let amount = (2.55 * f64::from(percent)).round() as i32;
    let channel = |shift: u32| ((num >> shift) & 0xFF).saturating_add(amount).clamp(0, 255);

    format!("#{:02x}{:02x}{:02x}", channel(16), channel(8), channel(0))
}

/// Card gradient from `color` to a darker shade of it
pub fn card_gradient(color: &str) -> String {
    format!(
        "background: linear-gradient(135deg, {color} 0%, {} 100%);",
        adjust_brightness(color, -40)
    )
}

/// Accent colour for a weather condition
pub fn theme_color_for(conditions: &str) -> &'static str {
    let conditions = conditions.to_lowercase();
    if conditions.contains("clear") || conditions.contains("sunny") {
        "#667eea"
    } else if conditions.contains("rain") || conditions.contains("storm") {
        "#4A5568"
    } else if conditions.contains("cloud") {
        "#718096"
    } else if conditions.contains("snow") {
        "#63B3ED"
    } else {
        "#764ba2"
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WeatherIcon {
    Sun,
    Rain,
    Cloud,
}

impl WeatherIcon {
    pub fn for_conditions(conditions: &str) -> Self {
        let conditions = conditions.to_lowercase();
        if conditions.contains("clear") || conditions.contains("sunny") {
            Self::Sun
        } else if ["rain", "drizzle", "snow", "thunderstorm"]
            .iter()
            .any(|c| conditions.contains(c))
        {
            Self::Rain
        } else {
            Self::Cloud
        }
    }
}

/// Celsius to Fahrenheit, one decimal
pub fn fahrenheit(celsius: i32) -> String {
    format!("{:.1}", f64::from(celsius) * 9.0 / 5.0 + 32.0)
}

/// Inline style for the full-screen container
pub fn container_style(local: &ClientLocalState) -> String {
    match &local.background_pattern {
        Some(svg) => format!(
            "background-image: url(\"data:image/svg+xml,{}\"); background-color: {}; background-repeat: repeat;",
            urlencoding::encode(svg),
            local.theme_color
        ),
        None => format!("background-color: {};", local.theme_color),
    }
}
