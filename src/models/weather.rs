//! Weather data models

use serde::{Deserialize, Serialize};

/// Current-conditions snapshot used by the batch pipeline
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct CurrentConditions {
    /// Temperature in Celsius
    pub temperature: f64,
    /// Wind speed in m/s
    pub wind_speed: f64,
}

/// Body returned by `GET /get_weather/{city}`
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CityWeather {
    pub city: String,
    /// Temperature in Celsius
    pub temperature: f64,
    pub weather_description: String,
}

impl CurrentConditions {
    #[must_use]
    pub fn format_temperature(&self) -> String {
        format!("{:.1}°C", self.temperature)
    }

    #[must_use]
    pub fn format_wind(&self) -> String {
        format!("{:.1} m/s", self.wind_speed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_conditions() {
        let conditions = CurrentConditions {
            temperature: 21.04,
            wind_speed: 12.3,
        };
        assert_eq!(conditions.format_temperature(), "21.0°C");
        assert_eq!(conditions.format_wind(), "12.3 m/s");
    }
}
