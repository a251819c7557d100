// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use splitledger::application::LedgerService;
use splitledger::domain::{TripId, UserId};
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = LedgerService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// Test fixture: three friends on one trip
pub struct Group {
    pub alice: UserId,
    pub bob: UserId,
    pub carol: UserId,
    pub trip: TripId,
}

impl Group {
    /// Register Alice, Bob and Carol (ids 1, 2, 3) and a "Lisbon" trip
    pub async fn create(service: &LedgerService) -> Result<Self> {
        let alice = service.register_user("Alice", "alice@example.com").await?;
        let bob = service.register_user("Bob", "bob@example.com").await?;
        let carol = service.register_user("Carol", "carol@example.com").await?;
        let trip = service.create_trip("Lisbon").await?;

        Ok(Self {
            alice: alice.id,
            bob: bob.id,
            carol: carol.id,
            trip: trip.id,
        })
    }

    pub fn everyone(&self) -> Vec<UserId> {
        vec![self.alice, self.bob, self.carol]
    }

    /// Scenario A: Alice pays 30.00 for dinner for all three
    pub async fn dinner(&self, service: &LedgerService) -> Result<()> {
        service
            .record_expense("Dinner", 3000, self.alice, self.trip, &self.everyone())
            .await?;
        Ok(())
    }
}
