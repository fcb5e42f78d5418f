#![allow(dead_code)]

use std::sync::Arc;

use synthkit_generate::{MemberTable, RandomContext, Rng, RuleBuilder, SharedRandomness};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Person {
    pub name: String,
    pub age: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Account {
    pub id: u64,
    pub owner: String,
    pub nickname: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Team {
    pub title: String,
    pub lead: Person,
}

pub fn person_registry() -> MemberTable<Person> {
    MemberTable::new()
        .member("name", |p: &mut Person, v: String| p.name = v)
        .member("age", |p: &mut Person, v: u32| p.age = v)
}

pub fn account_registry() -> MemberTable<Account> {
    MemberTable::new()
        .member("id", |a: &mut Account, v: u64| a.id = v)
        .member("owner", |a: &mut Account, v: String| a.owner = v)
        .member("nickname", |a: &mut Account, v: String| a.nickname = v)
}

pub fn team_registry() -> MemberTable<Team> {
    MemberTable::new()
        .member("title", |t: &mut Team, v: String| t.title = v)
        .member("lead", |t: &mut Team, v: Person| t.lead = v)
}

/// Isolated randomness domain so index assertions are not disturbed by
/// other tests running in parallel.
pub fn domain(seed: u64) -> Arc<SharedRandomness> {
    Arc::new(SharedRandomness::seeded(seed))
}

/// Name records `index_global:draw` from the shared stream, age records
/// `index_faker`.
pub fn record_draws<B: RuleBuilder<Person>>(faker: &mut B) {
    faker
        .rule_for("name", |ctx, _| {
            format!("{}:{}", ctx.index_global(), ctx.random::<u64>())
        })
        .expect("name rule")
        .rule_for("age", |ctx, _| ctx.index_faker() as u32)
        .expect("age rule");
}

/// Splits a name written by [`record_draws`] into index and draw.
pub fn split_draw(person: &Person) -> (u64, u64) {
    let (index, draw) = person.name.split_once(':').expect("index:draw");
    (index.parse().expect("index"), draw.parse().expect("draw"))
}

/// First `count` values of the shared stream of a fresh domain.
pub fn shared_stream(seed: u64, count: usize) -> Vec<u64> {
    let mut ctx = RandomContext::new(domain(seed), "en");
    (0..count).map(|_| ctx.random::<u64>()).collect()
}
