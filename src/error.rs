use thiserror::Error;

/// Errors surfaced verbatim to the user by every front end.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("Please enter all fields!")]
    MissingFields,

    #[error("Invalid date format. Use YYYY-MM-DD.")]
    InvalidDate { input: String },

    #[error("Invalid ticker symbol '{input}'")]
    InvalidSymbol { input: String },

    #[error("Start date must be before end date ({start} >= {end})")]
    EmptyRange { start: String, end: String },

    #[error("No data found for the ticker and date range")]
    NoData { symbol: String },

    #[error("Predict date must be after the last trading day ({last})")]
    PredictDateNotAhead { last: String },

    #[error("Predict date must be a trading day (Monday to Friday), got {date}")]
    PredictDateNotTradingDay { date: String },

    #[error("Data length ({len}) must be greater than look_back ({look_back})")]
    NotEnoughData { len: usize, look_back: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_match_user_facing_text() {
        assert_eq!(InputError::MissingFields.to_string(), "Please enter all fields!");
        assert_eq!(
            InputError::InvalidDate { input: "2024/01/01".into() }.to_string(),
            "Invalid date format. Use YYYY-MM-DD."
        );
        assert_eq!(
            InputError::NoData { symbol: "ZZZZ".into() }.to_string(),
            "No data found for the ticker and date range"
        );
        assert_eq!(
            InputError::NotEnoughData { len: 5, look_back: 10 }.to_string(),
            "Data length (5) must be greater than look_back (10)"
        );
    }
}
