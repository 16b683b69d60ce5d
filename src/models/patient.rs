use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use validator::Validate;

/// One patient record as submitted by a front-end.
///
/// Keys are stable identifiers independent of any display language. Ranges
/// are enforced by the presentation layer through [`Validate`]; the feature
/// encoder itself performs no bounds checking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct RawInput {
    pub gender: Gender,

    #[validate(range(min = 14, max = 100))]
    pub age: u32,

    /// Meters
    #[validate(range(min = 1.0, max = 2.5))]
    pub height: f64,

    /// Kilograms
    #[validate(range(min = 30.0, max = 200.0))]
    pub weight: f64,

    pub family_history: YesNo,

    pub frequent_caloric_food: YesNo,

    /// 1 = never, 3 = always
    #[validate(range(min = 1, max = 3))]
    pub vegetable_frequency: u8,

    #[validate(range(min = 1, max = 4))]
    pub meals_per_day: u8,

    pub snacking_frequency: Frequency,

    pub smoker: YesNo,

    /// 1 = little, 3 = a lot
    #[validate(range(min = 1, max = 3))]
    pub water_intake: u8,

    pub monitors_calories: YesNo,

    /// 0 = none, 3 = high
    #[validate(range(max = 3))]
    pub physical_activity: u8,

    /// 0 = low, 2 = high
    #[validate(range(max = 2))]
    pub screen_time: u8,

    pub alcohol_frequency: Frequency,

    /// Kept as free text: a value outside [`TransportMode`] is carried
    /// through and encodes to an all-zero one-hot block.
    pub transport_mode: String,
}

impl RawInput {
    /// Parse the transport field, `None` when it names no known category
    pub fn transport(&self) -> Option<TransportMode> {
        self.transport_mode.parse().ok()
    }

    pub fn with_transport(mut self, mode: TransportMode) -> Self {
        self.transport_mode = mode.to_string();
        self
    }

    /// Body mass index (kg/m²)
    pub fn bmi(&self) -> f64 {
        self.weight / (self.height * self.height)
    }
}

/// The form's initial state
impl Default for RawInput {
    fn default() -> Self {
        Self {
            gender: Gender::Male,
            age: 25,
            height: 1.70,
            weight: 70.0,
            family_history: YesNo::No,
            frequent_caloric_food: YesNo::No,
            vegetable_frequency: 2,
            meals_per_day: 3,
            snacking_frequency: Frequency::Never,
            smoker: YesNo::No,
            water_intake: 2,
            monitors_calories: YesNo::No,
            physical_activity: 1,
            screen_time: 1,
            alcohol_frequency: Frequency::Never,
            transport_mode: TransportMode::PublicTransport.to_string(),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(ascii_case_insensitive)]
pub enum Gender {
    #[strum(to_string = "male")]
    Male,
    #[strum(to_string = "female")]
    Female,
}

impl Gender {
    pub fn code(&self) -> f64 {
        match self {
            Gender::Male => 1.0,
            Gender::Female => 0.0,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(ascii_case_insensitive)]
pub enum YesNo {
    #[strum(to_string = "yes")]
    Yes,
    #[strum(to_string = "no")]
    No,
}

impl YesNo {
    pub fn code(&self) -> f64 {
        match self {
            YesNo::Yes => 1.0,
            YesNo::No => 0.0,
        }
    }
}

/// Four-level frequency scale shared by snacking and alcohol consumption
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(ascii_case_insensitive)]
pub enum Frequency {
    #[serde(rename = "none", alias = "no")]
    #[strum(to_string = "none", serialize = "no")]
    Never,
    #[strum(to_string = "sometimes")]
    Sometimes,
    #[strum(to_string = "frequently")]
    Frequently,
    #[strum(to_string = "always")]
    Always,
}

impl Frequency {
    pub fn code(&self) -> f64 {
        match self {
            Frequency::Never => 0.0,
            Frequency::Sometimes => 1.0,
            Frequency::Frequently => 2.0,
            Frequency::Always => 3.0,
        }
    }
}

/// Known transport categories, in one-hot column order.
///
/// Parsing is case-insensitive and also accepts the dataset spelling
/// `Public_Transportation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum TransportMode {
    #[strum(to_string = "public_transport", serialize = "public_transportation")]
    PublicTransport,
    #[strum(to_string = "walking")]
    Walking,
    #[strum(to_string = "automobile")]
    Automobile,
    #[strum(to_string = "motorbike")]
    Motorbike,
    #[strum(to_string = "bike")]
    Bike,
}
