use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "kebab-case")]
pub enum ListingType {
    Goods,
    ApartmentRent,
    ApartmentShortlet,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    #[default]
    Draft,
    Active,
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub listing_type: ListingType,
    pub price: Decimal,
    pub currency: String,
    #[serde(default)]
    pub status: ListingStatus,
}

impl Listing {
    /// Only apartment listings carry availability windows.
    pub fn is_bookable(&self) -> bool {
        matches!(
            self.listing_type,
            ListingType::ApartmentRent | ListingType::ApartmentShortlet
        )
    }
}
