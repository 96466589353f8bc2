//! Master-data records owned by collaborators outside the ledger engine.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::common::Identifiable;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Business {
    pub id: Uuid,
    pub designation: String,
    pub name: String,
}

impl Business {
    pub fn new(designation: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            designation: designation.into(),
            name: name.into(),
        }
    }
}

/// Anything that can be rented: an apartment, a carport, a storage unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Rentable {
    pub id: Uuid,
    pub business_id: Uuid,
    pub name: String,
}

impl Rentable {
    pub fn new(business_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            business_id,
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RentalAgreement {
    pub id: Uuid,
    pub business_id: Uuid,
    #[serde(default)]
    pub rentables: Vec<Uuid>,
    pub start: NaiveDate,
    pub stop: NaiveDate,
}

impl RentalAgreement {
    pub fn new(business_id: Uuid, start: NaiveDate, stop: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            business_id,
            rentables: Vec::new(),
            start,
            stop,
        }
    }

    pub fn with_rentable(mut self, rentable_id: Uuid) -> Self {
        self.rentables.push(rentable_id);
        self
    }
}

impl Identifiable for Business {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Identifiable for Rentable {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Identifiable for RentalAgreement {
    fn id(&self) -> Uuid {
        self.id
    }
}
