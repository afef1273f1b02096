// Metro airport groups: a logical code standing for several concrete airports

use crate::error::SearchError;
use crate::models::validate_location_code;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AirportGroup {
    pub code: String,
    // The first airport is the primary one for query prioritisation
    pub airports: Vec<String>,
}

impl AirportGroup {
    pub fn new(code: &str, airports: &[&str]) -> Self {
        Self {
            code: code.to_uppercase(),
            airports: airports.iter().map(|a| a.to_uppercase()).collect(),
        }
    }
}

// Immutable once the engine is built
#[derive(Debug, Clone, Default)]
pub struct AirportGroups {
    groups: HashMap<String, AirportGroup>,
}

impl AirportGroups {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        Self::from_groups(vec![
            AirportGroup::new("SAO", &["GRU", "CGH", "VCP"]),
            AirportGroup::new("RIO", &["GIG", "SDU"]),
            AirportGroup::new("LON", &["LHR", "LGW", "STN", "LTN", "LCY", "SEN"]),
            AirportGroup::new("PAR", &["CDG", "ORY", "BVA"]),
            AirportGroup::new("NYC", &["JFK", "EWR", "LGA"]),
            AirportGroup::new("MIL", &["MXP", "LIN", "BGY"]),
            AirportGroup::new("ROM", &["FCO", "CIA"]),
            AirportGroup::new("BER", &["BER", "SXF", "TXL"]),
        ])
    }

    pub fn from_groups(groups: Vec<AirportGroup>) -> Self {
        Self {
            groups: groups.into_iter().map(|g| (g.code.clone(), g)).collect(),
        }
    }

    pub fn get(&self, code: &str) -> Option<&AirportGroup> {
        self.groups.get(&code.trim().to_uppercase())
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    // Group code -> its airports in order, bare IATA code -> itself
    pub fn resolve(&self, code: &str) -> Result<Vec<String>, SearchError> {
        validate_location_code(code)?;
        let code = code.trim().to_uppercase();

        match self.groups.get(&code) {
            Some(group) if !group.airports.is_empty() => Ok(group.airports.clone()),
            Some(group) => Err(SearchError::Configuration(format!(
                "Airport group {} has no airports",
                group.code
            ))),
            None => Ok(vec![code]),
        }
    }
}
