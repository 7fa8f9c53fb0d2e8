use serde::{Deserialize, Serialize};

/// Who the traveler is going with. Exactly one is selected; `Solo` is the default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TravelCompanion {
    #[default]
    Solo,
    WithPartner,
    WithFamily,
    WithFriends,
}

impl TravelCompanion {
    pub const ALL: [TravelCompanion; 4] = [
        Self::Solo,
        Self::WithPartner,
        Self::WithFamily,
        Self::WithFriends,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Solo => "Solo",
            Self::WithPartner => "With Partner",
            Self::WithFamily => "With Family",
            Self::WithFriends => "With Friends",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TravelInterest {
    NatureWildlife,
    RomanticGetaway,
    HistoricalCultural,
    AdventureThrill,
    FoodCulinary,
    LuxuryRelaxation,
}

impl TravelInterest {
    pub const ALL: [TravelInterest; 6] = [
        Self::NatureWildlife,
        Self::RomanticGetaway,
        Self::HistoricalCultural,
        Self::AdventureThrill,
        Self::FoodCulinary,
        Self::LuxuryRelaxation,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::NatureWildlife => "Nature & Wildlife",
            Self::RomanticGetaway => "Romantic Getaway",
            Self::HistoricalCultural => "Historical & Cultural",
            Self::AdventureThrill => "Adventure & Thrill",
            Self::FoodCulinary => "Food & Culinary",
            Self::LuxuryRelaxation => "Luxury & Relaxation",
        }
    }
}

/// Per-request trip preferences. Never stored with the session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TravelPreferences {
    #[serde(default)]
    pub companion: TravelCompanion,
    #[serde(default)]
    pub interests: Vec<TravelInterest>,
}

impl TravelPreferences {
    pub fn new(companion: TravelCompanion) -> Self {
        Self {
            companion,
            interests: Vec::new(),
        }
    }

    pub fn with_interest(mut self, interest: TravelInterest) -> Self {
        if !self.interests.contains(&interest) {
            self.interests.push(interest);
        }
        self
    }

    /// Interests in first-selection order with repeats dropped.
    pub fn distinct_interests(&self) -> Vec<TravelInterest> {
        let mut seen = Vec::with_capacity(self.interests.len());
        for interest in &self.interests {
            if !seen.contains(interest) {
                seen.push(*interest);
            }
        }
        seen
    }

    /// Natural-language preamble, present only when at least one interest is selected.
    pub fn preamble(&self) -> Option<String> {
        let interests = self.distinct_interests();
        if interests.is_empty() {
            return None;
        }

        let labels = interests
            .iter()
            .map(TravelInterest::label)
            .collect::<Vec<_>>()
            .join(", ");

        Some(format!(
            "You are traveling {} and looking for {} experiences.",
            self.companion.label().to_lowercase(),
            labels
        ))
    }

    /// The text actually sent to the query engine for `user_input`.
    pub fn compose_query(&self, user_input: &str) -> String {
        let input = user_input.trim();
        match self.preamble() {
            Some(preamble) => format!("{preamble} {input}"),
            None => input.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PreferenceOption {
    pub value: String,
    pub label: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreferenceOptions {
    pub companions: Vec<PreferenceOption>,
    pub interests: Vec<PreferenceOption>,
    pub default_companion: TravelCompanion,
}

fn wire_name<T: Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

/// Both fixed choice sets, for clients that render pickers.
pub fn preference_options() -> PreferenceOptions {
    PreferenceOptions {
        companions: TravelCompanion::ALL
            .iter()
            .map(|c| PreferenceOption {
                value: wire_name(c),
                label: c.label(),
            })
            .collect(),
        interests: TravelInterest::ALL
            .iter()
            .map(|i| PreferenceOption {
                value: wire_name(i),
                label: i.label(),
            })
            .collect(),
        default_companion: TravelCompanion::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_interests_sends_query_unmodified() {
        let prefs = TravelPreferences::new(TravelCompanion::WithFamily);
        assert!(prefs.preamble().is_none());
        assert_eq!(
            prefs.compose_query("  Best beaches in Bali? "),
            "Best beaches in Bali?"
        );
    }

    #[test]
    fn test_interests_add_preamble() {
        let prefs = TravelPreferences::new(TravelCompanion::WithPartner)
            .with_interest(TravelInterest::RomanticGetaway)
            .with_interest(TravelInterest::FoodCulinary);

        assert_eq!(
            prefs.compose_query("Where should we go?"),
            "You are traveling with partner and looking for Romantic Getaway, Food & Culinary \
             experiences. Where should we go?"
        );
    }

    #[test]
    fn test_duplicate_interests_collapse() {
        let prefs = TravelPreferences {
            companion: TravelCompanion::Solo,
            interests: vec![
                TravelInterest::AdventureThrill,
                TravelInterest::NatureWildlife,
                TravelInterest::AdventureThrill,
            ],
        };
        assert_eq!(
            prefs.preamble().as_deref(),
            Some("You are traveling solo and looking for Adventure & Thrill, Nature & Wildlife experiences.")
        );
    }

    #[test]
    fn test_deserialize_defaults_to_solo() {
        let prefs: TravelPreferences =
            serde_json::from_str(r#"{"interests": ["luxury_relaxation"]}"#).unwrap();
        assert_eq!(prefs.companion, TravelCompanion::Solo);
        assert_eq!(prefs.interests, vec![TravelInterest::LuxuryRelaxation]);
    }

    #[test]
    fn test_options_cover_fixed_sets() {
        let options = preference_options();
        assert_eq!(options.companions.len(), 4);
        assert_eq!(options.interests.len(), 6);
        assert_eq!(options.companions[1].value, "with_partner");
        assert_eq!(options.interests[4].label, "Food & Culinary");
    }
}
