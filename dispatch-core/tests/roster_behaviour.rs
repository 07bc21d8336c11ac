//! Behavioural tests for daily roster selection.

use std::cell::RefCell;

use chrono::NaiveDate;
use dispatch_core::roster::select_roster;
use dispatch_core::{Driver, RosterError};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

#[derive(Debug, Default)]
struct RosterWorld {
    pool: RefCell<Vec<Driver>>,
    outcome: RefCell<Option<Result<Vec<Driver>, RosterError>>>,
}

impl RosterWorld {
    #[expect(
        clippy::expect_used,
        reason = "behaviour tests use expect for readable failures"
    )]
    fn roster(&self) -> Vec<Driver> {
        self.outcome
            .borrow()
            .clone()
            .expect("selection should run before assertions")
            .expect("selection should succeed")
    }

    fn select(&self, ids: &[u32]) {
        let tuesday = NaiveDate::from_ymd_opt(2024, 1, 2);
        let outcome = tuesday
            .ok_or(RosterError::UnknownDriver { id: 0 })
            .and_then(|date| select_roster(&self.pool.borrow(), ids, date, 3));
        self.outcome.replace(Some(outcome));
    }
}

#[fixture]
fn world() -> RosterWorld {
    RosterWorld::default()
}

#[given("a driver table where only the first driver holds early duty")]
fn given_pool(world: &RosterWorld) {
    world.pool.replace(vec![
        Driver::new(1, "Ana", "1 Depot Way").with_early_day(true),
        Driver::new(2, "Ben", "2 Depot Way"),
        Driver::new(3, "Cy", "3 Depot Way"),
    ]);
}

#[when("the roster for a Tuesday is selected for the second and third drivers")]
fn when_second_and_third(world: &RosterWorld) {
    world.select(&[2, 3]);
}

#[when("the roster for a Tuesday is selected including an unknown driver")]
fn when_unknown(world: &RosterWorld) {
    world.select(&[1, 42]);
}

#[when("the roster for a Tuesday is selected for the first driver only")]
fn when_first_only(world: &RosterWorld) {
    world.select(&[1]);
}

#[then("both requested drivers are rostered")]
fn then_both_rostered(world: &RosterWorld) {
    let ids: Vec<u32> = world.roster().iter().map(|driver| driver.id).collect();
    assert_eq!(ids, vec![2, 3]);
}

#[then("both requested drivers hold early duty")]
fn then_both_early(world: &RosterWorld) {
    assert!(world.roster().iter().all(|driver| driver.early_day));
}

#[then("the selection fails with an unknown driver error")]
fn then_unknown(world: &RosterWorld) {
    let outcome = world.outcome.borrow().clone();
    assert!(matches!(
        outcome,
        Some(Err(RosterError::UnknownDriver { id: 42 }))
    ));
}

#[then("exactly one rostered driver holds early duty")]
fn then_one_early(world: &RosterWorld) {
    let early = world.roster().iter().filter(|driver| driver.early_day).count();
    assert_eq!(early, 1);
}

#[scenario(path = "tests/features/roster.feature", index = 0)]
fn requested_drivers_rotate(world: RosterWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/roster.feature", index = 1)]
fn unknown_driver_rejected(world: RosterWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/roster.feature", index = 2)]
fn early_duty_drafted(world: RosterWorld) {
    let _ = world;
}
