#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal_macros::dec;
use shortlet::application::{
    BookingPolicy, BookingService, Context, HoldSweeper, PayoutService, PointsService,
    ReconciliationHandler,
};
use shortlet::domain::availability::AvailabilityWindow;
use shortlet::domain::gateway::GatewayRegistry;
use shortlet::domain::listing::{Listing, ListingStatus, ListingType};
use shortlet::domain::ports::StoreRef;
use shortlet::domain::transaction::Mutation;
use shortlet::domain::user::User;
use shortlet::infrastructure::clock::ManualClock;
use shortlet::infrastructure::gateways::MockGateway;
use shortlet::infrastructure::in_memory::InMemoryStore;
use shortlet::infrastructure::notifier::RecordingNotifier;
use std::fs::File;
use std::io::{Error, Write};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// A marketplace with one host, one apartment listing and one open window
/// covering April 2024 at 100 per night. The clock starts on 1 March.
pub struct Harness {
    pub store: StoreRef,
    pub clock: Arc<ManualClock>,
    pub gateway: Arc<MockGateway>,
    pub notifier: Arc<RecordingNotifier>,
    pub ctx: Context,
    pub host_id: Uuid,
    pub listing_id: Uuid,
    pub window_id: Uuid,
}

pub fn april(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 4, day, 0, 0, 0).unwrap()
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_policy(BookingPolicy::default()).await
    }

    pub async fn with_policy(policy: BookingPolicy) -> Self {
        let store: StoreRef = Arc::new(InMemoryStore::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
        ));
        let gateway = MockGateway::shared();
        let notifier = Arc::new(RecordingNotifier::new());
        let ctx = Context::new(
            store.clone(),
            GatewayRegistry::new(gateway.clone()),
            notifier.clone(),
            clock.clone(),
            policy,
        );

        let host_id = Uuid::new_v4();
        let listing_id = Uuid::new_v4();
        let window_id = Uuid::new_v4();
        store
            .apply(vec![
                Mutation::PutUser(user(host_id, "host@example.com")),
                Mutation::PutListing(Listing {
                    id: listing_id,
                    owner_id: host_id,
                    title: "Two-bed flat, Lekki Phase 1".to_string(),
                    listing_type: ListingType::ApartmentShortlet,
                    price: dec!(100),
                    currency: "NGN".to_string(),
                    status: ListingStatus::Active,
                }),
                Mutation::PutWindow(AvailabilityWindow {
                    id: window_id,
                    listing_id,
                    start_date: april(1),
                    end_date: april(30),
                    price_per_night: dec!(100),
                    is_blocked: false,
                }),
            ])
            .await
            .unwrap();

        Self {
            store,
            clock,
            gateway,
            notifier,
            ctx,
            host_id,
            listing_id,
            window_id,
        }
    }

    pub async fn add_guest(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.store
            .apply(vec![Mutation::PutUser(user(id, &format!("{id}@example.com")))])
            .await
            .unwrap();
        id
    }

    pub fn bookings(&self) -> BookingService {
        BookingService::new(self.ctx.clone())
    }

    pub fn reconciliation(&self) -> ReconciliationHandler {
        ReconciliationHandler::new(self.ctx.clone())
    }

    pub fn sweeper(&self) -> HoldSweeper {
        HoldSweeper::new(self.ctx.clone())
    }

    pub fn points(&self) -> PointsService {
        PointsService::new(self.ctx.clone())
    }

    pub fn payouts(&self) -> PayoutService {
        PayoutService::new(self.ctx.clone())
    }

    pub async fn window_blocked(&self) -> bool {
        self.store
            .windows(self.listing_id)
            .await
            .unwrap()
            .into_iter()
            .find(|w| w.id == self.window_id)
            .map(|w| w.is_blocked)
            .unwrap()
    }

    /// A signed `charge.*` callback body for `reference`.
    pub fn charge_webhook(&self, event: &str, event_id: &str, reference: &str) -> (Vec<u8>, String) {
        let status = if event.ends_with("failed") {
            "failed"
        } else {
            "success"
        };
        let body = serde_json::json!({
            "event": event,
            "data": { "id": event_id, "reference": reference, "status": status }
        })
        .to_string()
        .into_bytes();
        let signature = self.gateway.sign(&body);
        (body, signature)
    }
}

fn user(id: Uuid, email: &str) -> User {
    User {
        id,
        email: email.to_string(),
        first_name: "Test".to_string(),
        last_name: "Guest".to_string(),
        points: 0,
    }
}

/// Writes seed CSVs for one host, one listing and one April window.
pub fn write_seed_files(dir: &Path, host: Uuid, listing: Uuid) -> Result<(), Error> {
    let mut users = File::create(dir.join("users.csv"))?;
    writeln!(users, "id,email,first_name,last_name,points")?;
    writeln!(users, "{host},host@example.com,Ada,Host,0")?;

    let mut listings = File::create(dir.join("listings.csv"))?;
    writeln!(listings, "id,owner_id,title,listing_type,price,currency,status")?;
    writeln!(
        listings,
        "{listing},{host},Ikoyi studio,apartment-shortlet,100,NGN,active"
    )?;

    write_window_file(&dir.join("availability.csv"), listing)
}

pub fn write_window_file(path: &Path, listing: Uuid) -> Result<(), Error> {
    let mut windows = File::create(path)?;
    writeln!(
        windows,
        "id,listing_id,start_date,end_date,price_per_night,is_blocked"
    )?;
    writeln!(
        windows,
        "{},{listing},2024-04-01T00:00:00Z,2024-04-30T00:00:00Z,100,false",
        Uuid::new_v4()
    )?;
    Ok(())
}
