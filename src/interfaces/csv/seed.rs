use super::record_reader::RecordReader;
use crate::domain::availability::{AvailabilityWindow, DateRange};
use crate::domain::listing::Listing;
use crate::domain::ports::StoreRef;
use crate::domain::transaction::Mutation;
use crate::domain::user::User;
use crate::error::{BookingError, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::io::Read;
use uuid::Uuid;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub users: usize,
    pub listings: usize,
    pub windows: usize,
    pub skipped: usize,
}

/// Bulk loader for users, listings and availability windows.
///
/// Unreadable or invalid rows are reported and skipped; everything that
/// passes is written in a single batch.
pub struct Seeder {
    store: StoreRef,
    mutations: Vec<Mutation>,
    listings: HashMap<Uuid, Listing>,
    report: SeedReport,
}

impl Seeder {
    pub fn new(store: StoreRef) -> Self {
        Self {
            store,
            mutations: Vec::new(),
            listings: HashMap::new(),
            report: SeedReport::default(),
        }
    }

    pub fn users<R: Read>(&mut self, source: R) -> &mut Self {
        for record in RecordReader::<R, User>::new(source).records() {
            match record {
                Ok(user) => {
                    self.mutations.push(Mutation::PutUser(user));
                    self.report.users += 1;
                }
                Err(e) => self.skip("user", &e),
            }
        }
        self
    }

    pub fn listings<R: Read>(&mut self, source: R) -> &mut Self {
        for record in RecordReader::<R, Listing>::new(source).records() {
            match record {
                Ok(listing) => {
                    self.listings.insert(listing.id, listing.clone());
                    self.mutations.push(Mutation::PutListing(listing));
                    self.report.listings += 1;
                }
                Err(e) => self.skip("listing", &e),
            }
        }
        self
    }

    /// Windows must reference a bookable listing, either seeded in this run
    /// or already stored.
    pub async fn availability<R: Read>(&mut self, source: R) -> Result<&mut Self> {
        let records: Vec<Result<AvailabilityWindow>> =
            RecordReader::<R, AvailabilityWindow>::new(source).records().collect();
        for record in records {
            let checked = match record {
                Ok(window) => self.check_window(window).await,
                Err(e) => Err(e),
            };
            match checked {
                Ok(window) => {
                    self.mutations.push(Mutation::PutWindow(window));
                    self.report.windows += 1;
                }
                Err(BookingError::Storage(e)) => return Err(BookingError::Storage(e)),
                Err(e) => self.skip("availability window", &e),
            }
        }
        Ok(self)
    }

    async fn check_window(&mut self, window: AvailabilityWindow) -> Result<AvailabilityWindow> {
        DateRange::new(window.start_date, window.end_date)?;
        let listing = match self.listings.get(&window.listing_id) {
            Some(listing) => listing.clone(),
            None => {
                let listing = self
                    .store
                    .listing(window.listing_id)
                    .await?
                    .ok_or(BookingError::ListingNotFound(window.listing_id))?;
                self.listings.insert(listing.id, listing.clone());
                listing
            }
        };
        if !listing.is_bookable() {
            return Err(BookingError::ListingNotBookable(listing.id));
        }
        Ok(window)
    }

    fn skip(&mut self, what: &str, error: &BookingError) {
        tracing::warn!(record = what, %error, "Skipping seed row");
        self.report.skipped += 1;
    }

    pub async fn commit(self) -> Result<SeedReport> {
        if !self.mutations.is_empty() {
            self.store.apply(self.mutations).await?;
        }
        tracing::info!(
            users = self.report.users,
            listings = self.report.listings,
            windows = self.report.windows,
            skipped = self.report.skipped,
            "Seed data loaded"
        );
        Ok(self.report)
    }
}
